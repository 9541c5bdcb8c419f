use pcie_tlp::{classify_dw0, MemRequestKind, TlpWord};

/// Where a transport word is routed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Route {
    /// Word of a memory-write TLP (header or payload continuation).
    Write,
    /// Header word of a memory-read TLP (reads are always single-word).
    Read,
}

/// Per-word TLP classifier.
///
/// Only the first word of a packet carries the format/type bits, so a write
/// classification latches across the packet's remaining words until its last word.
#[derive(Debug, Default)]
pub(crate) struct Classifier {
    write_latched: bool,
}

impl Classifier {
    pub(crate) fn classify(&mut self, word: &TlpWord, bar_enabled: bool) -> Option<Route> {
        if word.is_sop() {
            self.write_latched = false;
            if !bar_enabled {
                return None;
            }
            match classify_dw0(word.dwords[0]) {
                Some((MemRequestKind::Write, _)) => {
                    if !word.is_eop() {
                        self.write_latched = true;
                    }
                    Some(Route::Write)
                }
                Some((MemRequestKind::Read, _)) => Some(Route::Read),
                // Unrecognized header: no state transition, the packet is ignored.
                None => None,
            }
        } else if self.write_latched {
            if word.is_eop() {
                self.write_latched = false;
            }
            Some(Route::Write)
        } else {
            None
        }
    }

    pub(crate) fn reset(&mut self) {
        self.write_latched = false;
    }
}
