use std::collections::VecDeque;

use pcie_tlp::{dword_from_wire, BarIndex, MemRequestHeader, MemRequestKind, TlpWord};

use crate::handler::BarWriteRequest;

#[derive(Clone, Copy, Debug)]
enum WriteState {
    /// Waiting for (or parsing) the first word of a write TLP.
    Header,
    /// Mid-packet, waiting for the next payload word.
    NextWord,
    /// Walking the kept DWORDs of a buffered word, one request per tick.
    Emit { word: TlpWord, idx: usize },
}

#[derive(Debug)]
struct ActiveWrite {
    bar: BarIndex,
    addr: u32,
    first_be: u8,
    last_be: u8,
    first_emitted: bool,
}

/// The write-request engine.
///
/// Accepts up to one pre-filtered write-TLP word (16 bytes) per tick into a bounded
/// word buffer and emits at most one single-DWORD write request per tick. On buffer
/// overflow the offending packet is dropped whole, silently; this is the accepted
/// lossy contract, the surrounding transport throttles via its own credit mechanism.
pub(crate) struct WriteEngine {
    queue: VecDeque<TlpWord>,
    capacity_words: usize,
    /// Words of the packet currently being ingested that sit at the queue tail,
    /// so an overflow can roll the partial packet back out.
    ingest_words: usize,
    /// Discarding the rest of an overflowed packet.
    dropping: bool,
    state: WriteState,
    active: Option<ActiveWrite>,
}

impl WriteEngine {
    pub(crate) fn new(capacity_words: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity_words),
            capacity_words,
            ingest_words: 0,
            dropping: false,
            state: WriteState::Header,
            active: None,
        }
    }

    /// Buffers one word of a write TLP.
    pub(crate) fn ingest(&mut self, word: TlpWord) {
        if self.dropping {
            if word.is_eop() {
                self.dropping = false;
            }
            return;
        }
        if self.queue.len() >= self.capacity_words {
            log::warn!(
                "write buffer full ({} words); dropping packet",
                self.queue.len()
            );
            let rollback = self.ingest_words.min(self.queue.len());
            for _ in 0..rollback {
                self.queue.pop_back();
            }
            if self.ingest_words > rollback {
                // The overflowing packet already started emitting; abort it so the
                // next header word is not misread as payload.
                self.state = WriteState::Header;
                self.active = None;
            }
            self.ingest_words = 0;
            self.dropping = !word.is_eop();
            return;
        }

        self.queue.push_back(word);
        if word.is_eop() {
            self.ingest_words = 0;
        } else if word.is_sop() {
            self.ingest_words = 1;
        } else {
            self.ingest_words += 1;
        }
    }

    /// Advances one tick, emitting at most one write request.
    pub(crate) fn step(&mut self) -> Option<BarWriteRequest> {
        loop {
            match self.state {
                WriteState::Header => {
                    let word = self.queue.pop_front()?;
                    let Ok(hdr) = MemRequestHeader::parse(&word) else {
                        // Malformed header: no state transition, the word is absorbed.
                        return None;
                    };
                    debug_assert_eq!(hdr.kind, MemRequestKind::Write);
                    self.active = Some(ActiveWrite {
                        bar: word.bar,
                        addr: hdr.addr,
                        first_be: hdr.first_be,
                        last_be: hdr.last_be,
                        first_emitted: false,
                    });
                    if !hdr.four_dw && word.keep & 0x8 != 0 {
                        // 3DW header: payload begins in this word's last DWORD slot.
                        self.state = WriteState::Emit { word, idx: 3 };
                    } else if word.is_eop() {
                        // Header-only packet; nothing to write.
                        self.active = None;
                    } else {
                        self.state = WriteState::NextWord;
                    }
                    // Header parse occupies the cycle.
                    return None;
                }
                WriteState::NextWord => {
                    let word = self.queue.pop_front()?;
                    // A freshly arrived word is consumed the tick it is available.
                    self.state = WriteState::Emit { word, idx: 0 };
                }
                WriteState::Emit { word, idx } => {
                    let mut idx = idx;
                    while idx < 4 && word.keep & (1 << idx) == 0 {
                        idx += 1;
                    }
                    if idx >= 4 {
                        self.state = if word.is_eop() {
                            self.active = None;
                            WriteState::Header
                        } else {
                            WriteState::NextWord
                        };
                        continue;
                    }

                    let active = self.active.as_mut().expect("emit without active packet");
                    let is_last = word.is_eop() && word.last_dword_index() == Some(idx);
                    let byte_enable = if !active.first_emitted {
                        active.first_be
                    } else if is_last {
                        active.last_be
                    } else {
                        0xf
                    };
                    let request = BarWriteRequest {
                        bar: active.bar,
                        addr: active.addr,
                        byte_enable,
                        data: dword_from_wire(word.dwords[idx]),
                    };
                    active.first_emitted = true;
                    active.addr = active.addr.wrapping_add(4);

                    if is_last {
                        self.active = None;
                        self.state = WriteState::Header;
                    } else if idx == 3 {
                        self.state = WriteState::NextWord;
                    } else {
                        self.state = WriteState::Emit { word, idx: idx + 1 };
                    }
                    return Some(request);
                }
            }
        }
    }

    pub(crate) fn reset(&mut self) {
        self.queue.clear();
        self.ingest_words = 0;
        self.dropping = false;
        self.state = WriteState::Header;
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcie_tlp::MemWriteBuilder;

    fn bar(i: u8) -> BarIndex {
        BarIndex::new(i).unwrap()
    }

    fn drain(engine: &mut WriteEngine) -> Vec<BarWriteRequest> {
        let mut out = Vec::new();
        for _ in 0..256 {
            if let Some(req) = engine.step() {
                out.push(req);
            }
        }
        out
    }

    #[test]
    fn single_dword_write_emits_one_request() {
        let mut engine = WriteEngine::new(128);
        let words = MemWriteBuilder {
            bar: bar(3),
            addr: 0x44,
            four_dw: false,
            requester_id: 0,
            tag: 0,
            first_be: 0x5,
            last_be: 0x0,
            data: &[0xcafe_f00d],
        }
        .build();
        for word in words {
            engine.ingest(word);
        }
        let reqs = drain(&mut engine);
        assert_eq!(
            reqs,
            vec![BarWriteRequest {
                bar: bar(3),
                addr: 0x44,
                byte_enable: 0x5,
                data: 0xcafe_f00d,
            }]
        );
    }

    #[test]
    fn byte_enables_split_first_interior_last() {
        let mut engine = WriteEngine::new(128);
        let data: Vec<u32> = (0..5).map(|i| 0x1000 + i).collect();
        let words = MemWriteBuilder {
            bar: bar(0),
            addr: 0x200,
            four_dw: false,
            requester_id: 0,
            tag: 0,
            first_be: 0xc,
            last_be: 0x3,
            data: &data,
        }
        .build();
        for word in words {
            engine.ingest(word);
        }
        let reqs = drain(&mut engine);
        assert_eq!(reqs.len(), 5);
        let enables: Vec<u8> = reqs.iter().map(|r| r.byte_enable).collect();
        assert_eq!(enables, vec![0xc, 0xf, 0xf, 0xf, 0x3]);
        for (i, req) in reqs.iter().enumerate() {
            assert_eq!(req.addr, 0x200 + 4 * i as u32);
            assert_eq!(req.data, 0x1000 + i as u32);
        }
    }

    #[test]
    fn four_dw_header_shifts_payload_by_one_word() {
        let mut engine = WriteEngine::new(128);
        let words = MemWriteBuilder {
            bar: bar(1),
            addr: 0x3000,
            four_dw: true,
            requester_id: 0,
            tag: 0,
            first_be: 0xf,
            last_be: 0xf,
            data: &[7, 8],
        }
        .build();
        for word in words {
            engine.ingest(word);
        }
        let reqs = drain(&mut engine);
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].addr, 0x3000);
        assert_eq!(reqs[0].data, 7);
        assert_eq!(reqs[1].addr, 0x3004);
        assert_eq!(reqs[1].data, 8);
    }

    #[test]
    fn overflow_drops_exactly_the_offending_packet() {
        // Capacity of 4 words: a 2-word packet fits, a following 9-DWORD packet
        // (3 words) overflows after the first word and must vanish whole.
        let mut engine = WriteEngine::new(4);
        let before = MemWriteBuilder {
            bar: bar(0),
            addr: 0x0,
            four_dw: false,
            requester_id: 0,
            tag: 0,
            first_be: 0xf,
            last_be: 0xf,
            data: &[1, 2, 3],
        }
        .build();
        let victim_data: Vec<u32> = (0..9).map(|i| 0xbad0 + i).collect();
        let victim = MemWriteBuilder {
            bar: bar(0),
            addr: 0x100,
            four_dw: false,
            requester_id: 0,
            tag: 0,
            first_be: 0xf,
            last_be: 0xf,
            data: &victim_data,
        }
        .build();
        let after = MemWriteBuilder {
            bar: bar(0),
            addr: 0x40,
            four_dw: false,
            requester_id: 0,
            tag: 0,
            first_be: 0xf,
            last_be: 0xf,
            data: &[9],
        }
        .build();

        for word in before.iter().chain(victim.iter()) {
            engine.ingest(word.clone());
        }
        // Let the first packet drain, then feed the packet after the overflow window.
        let mut reqs = drain(&mut engine);
        for word in &after {
            engine.ingest(word.clone());
        }
        reqs.extend(drain(&mut engine));

        let datas: Vec<u32> = reqs.iter().map(|r| r.data).collect();
        assert_eq!(datas, vec![1, 2, 3, 9]);
        assert!(reqs.iter().all(|r| r.addr < 0x100 || r.addr >= 0x140));
    }
}
