use std::collections::VecDeque;

use pcie_tlp::{dword_to_wire, CompletionHeader, TlpWord, TlpWordFlags};

use crate::handler::BarReadResponse;

/// In-progress outbound completion TLP word.
#[derive(Debug)]
struct Assembly {
    dwords: [u32; 4],
    keep: u8,
    /// Next DWORD slot to fill.
    slot: usize,
    sop: bool,
}

impl Assembly {
    fn empty(sop: bool) -> Self {
        Self {
            dwords: [0; 4],
            keep: 0,
            slot: 0,
            sop,
        }
    }
}

/// Response reassembly: repacks per-DWORD read responses into completion TLP words.
///
/// A `first` response opens a new completion packet: the CplD header is rebuilt
/// verbatim from the context token and occupies the word's first three DWORD slots,
/// with the first data DWORD (byte-swapped back to wire order) in the fourth.
/// Subsequent responses extend the fill mask one DWORD at a time; a word is pushed
/// outbound when all four slots fill or the `last` response arrives. The in-flight
/// counter tracks completion packets assembled but not yet drained and backs the
/// transport's has-pending-data status line.
pub(crate) struct Reassembly {
    completer_id: u16,
    cur: Option<Assembly>,
    out: VecDeque<TlpWord>,
    depth: usize,
    almost_full_margin: usize,
    in_flight: u32,
}

impl Reassembly {
    pub(crate) fn new(completer_id: u16, depth: usize, almost_full_margin: usize) -> Self {
        Self {
            completer_id,
            cur: None,
            out: VecDeque::with_capacity(depth),
            depth,
            almost_full_margin,
            in_flight: 0,
        }
    }

    /// The almost-full gate consumed by read-engine stage 3.
    pub(crate) fn has_room(&self) -> bool {
        self.out.len() + self.almost_full_margin <= self.depth
    }

    /// Folds one read response into the current completion word.
    pub(crate) fn push_response(&mut self, resp: BarReadResponse) {
        let ctx = resp.ctx;
        if ctx.first {
            debug_assert!(self.cur.is_none(), "response stream lost a `last` marker");
            let header = CompletionHeader {
                len_dw: ctx.len_dw,
                byte_count: ctx.byte_count,
                completer_id: self.completer_id,
                requester_id: ctx.requester_id,
                tag: ctx.tag,
                lower_addr: ctx.lower_addr,
            }
            .to_dwords();
            let mut asm = Assembly::empty(true);
            asm.dwords[..3].copy_from_slice(&header);
            asm.keep = 0x7;
            asm.slot = 3;
            self.cur = Some(asm);
        } else if self.cur.is_none() {
            // Mid-packet response with no open assembly; the packet was lost to a
            // reset, nothing to attach it to.
            return;
        }

        let asm = self.cur.as_mut().expect("assembly in progress");
        asm.dwords[asm.slot] = dword_to_wire(resp.data);
        asm.keep = asm.keep << 1 | 1;
        asm.slot += 1;

        if asm.slot == 4 || ctx.last {
            let asm = self.cur.take().expect("assembly in progress");
            let mut flags = TlpWordFlags::empty();
            if asm.sop {
                flags |= TlpWordFlags::SOP;
            }
            if ctx.last {
                flags |= TlpWordFlags::EOP;
            }
            let word = TlpWord {
                dwords: asm.dwords,
                keep: asm.keep,
                flags,
                bar: ctx.bar,
            };
            if self.out.len() >= self.depth {
                // Not reachable while the almost-full margin covers a full chunk.
                log::warn!("completion queue full; dropping completion word");
                return;
            }
            self.out.push_back(word);
            if ctx.last {
                self.in_flight += 1;
            } else {
                self.cur = Some(Assembly::empty(false));
            }
        }
    }

    /// Drains one outbound word when the transport is ready.
    pub(crate) fn take(&mut self) -> Option<TlpWord> {
        let word = self.out.pop_front()?;
        if word.is_eop() {
            debug_assert!(self.in_flight > 0);
            self.in_flight = self.in_flight.saturating_sub(1);
        }
        Some(word)
    }

    /// Nonzero in-flight completion packets; the transport's pending-data status.
    pub(crate) fn has_pending(&self) -> bool {
        self.in_flight > 0
    }

    pub(crate) fn reset(&mut self) {
        self.cur = None;
        self.out.clear();
        self.in_flight = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::ReadContext;
    use pcie_tlp::BarIndex;

    fn response(first: bool, last: bool, len_dw: u16, data: u32) -> BarReadResponse {
        BarReadResponse {
            ctx: ReadContext {
                first,
                last,
                len_dw,
                byte_count: len_dw * 4,
                requester_id: 0x00a0,
                tag: 0x05,
                lower_addr: 0x00,
                bar: BarIndex::new(1).unwrap(),
                addr: 0,
            },
            data,
        }
    }

    #[test]
    fn single_dword_completion_is_one_word() {
        let mut rsm = Reassembly::new(0x0100, 16, 8);
        rsm.push_response(response(true, true, 1, 0x1234_5678));
        assert!(rsm.has_pending());

        let word = rsm.take().unwrap();
        assert!(word.is_sop() && word.is_eop());
        assert_eq!(word.keep, 0xf);
        let hdr = CompletionHeader::parse(&[word.dwords[0], word.dwords[1], word.dwords[2]])
            .unwrap();
        assert_eq!(hdr.len_dw, 1);
        assert_eq!(hdr.byte_count, 4);
        assert_eq!(hdr.completer_id, 0x0100);
        assert_eq!(hdr.requester_id, 0x00a0);
        assert_eq!(hdr.tag, 0x05);
        assert_eq!(hdr.lower_addr, 0x00);
        assert_eq!(word.dwords[3], dword_to_wire(0x1234_5678));
        assert!(!rsm.has_pending());
    }

    #[test]
    fn six_dword_completion_packs_into_three_words() {
        let mut rsm = Reassembly::new(0, 16, 8);
        for i in 0..6u32 {
            rsm.push_response(response(i == 0, i == 5, 6, 0xd0 + i));
        }

        let w0 = rsm.take().unwrap();
        assert!(w0.is_sop() && !w0.is_eop());
        assert_eq!(w0.keep, 0xf);
        assert_eq!(w0.dwords[3], dword_to_wire(0xd0));

        let w1 = rsm.take().unwrap();
        assert!(!w1.is_sop() && !w1.is_eop());
        assert_eq!(w1.keep, 0xf);
        assert_eq!(w1.dwords[0], dword_to_wire(0xd1));
        assert_eq!(w1.dwords[3], dword_to_wire(0xd4));

        let w2 = rsm.take().unwrap();
        assert!(!w2.is_sop() && w2.is_eop());
        assert_eq!(w2.keep, 0x1);
        assert_eq!(w2.dwords[0], dword_to_wire(0xd5));
        assert!(rsm.take().is_none());
    }

    #[test]
    fn in_flight_counter_follows_assembly_and_drain() {
        let mut rsm = Reassembly::new(0, 16, 8);
        assert!(!rsm.has_pending());
        rsm.push_response(response(true, true, 1, 1));
        rsm.push_response(response(true, true, 1, 2));
        assert!(rsm.has_pending());
        rsm.take().unwrap();
        assert!(rsm.has_pending());
        rsm.take().unwrap();
        assert!(!rsm.has_pending());
    }

    #[test]
    fn almost_full_gate_tracks_occupancy() {
        let mut rsm = Reassembly::new(0, 4, 2);
        assert!(rsm.has_room());
        rsm.push_response(response(true, true, 1, 0));
        rsm.push_response(response(true, true, 1, 0));
        assert!(rsm.has_room());
        rsm.push_response(response(true, true, 1, 0));
        assert!(!rsm.has_room());
        rsm.take().unwrap();
        assert!(rsm.has_room());
    }
}
