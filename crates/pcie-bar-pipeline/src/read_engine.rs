use std::collections::VecDeque;

use pcie_tlp::{BarIndex, MemRequestHeader, MemRequestKind, TlpWord};

use crate::handler::{BarReadRequest, ReadContext};

/// Maximum DWORDs per completion: the 128-byte read completion boundary.
pub(crate) const CHUNK_DW: u16 = 32;

/// Outbound words a full chunk assembles into: the header word carries the first
/// data DWORD, the remaining 31 pack four per word.
pub(crate) const CHUNK_WORDS: usize = 1 + (CHUNK_DW as usize - 1 + 3) / 4;

/// Queued read request, captured whole from the single-word read TLP header.
#[derive(Clone, Copy, Debug)]
struct QueuedRead {
    bar: BarIndex,
    len_dw: u16,
    requester_id: u16,
    tag: u8,
    first_be: u8,
    // Captured for record completeness; expansion only applies the first-DWORD
    // byte-enable, and the byte count field is fixed per chunk.
    #[allow(dead_code)]
    last_be: u8,
    addr: u32,
}

/// One boundary-aligned sub-request: at most 32 DWORDs, never crossing a 128-byte
/// boundary, mapping 1:1 onto an outbound completion TLP.
#[derive(Clone, Copy, Debug)]
struct Chunk {
    bar: BarIndex,
    len_dw: u16,
    byte_count: u16,
    requester_id: u16,
    tag: u8,
    first_be: u8,
    lower_addr: u8,
    addr: u32,
}

#[derive(Clone, Copy, Debug)]
enum SplitState {
    /// Take the next queued request and emit its leading chunk.
    Fetch,
    /// Emit successive trailing chunks of a multi-chunk request.
    Processing {
        remaining_dw: u16,
        addr: u32,
        bar: BarIndex,
        requester_id: u16,
        tag: u8,
    },
}

#[derive(Clone, Copy, Debug)]
enum ExpandState {
    /// Latch a new chunk when downstream has room.
    Idle,
    /// Walk the latched chunk one DWORD per tick.
    Walk { chunk: Chunk, remaining_dw: u16, addr: u32 },
}

/// The read-request engine: ingest/queue, boundary split, per-DWORD expansion.
///
/// Stage 1 captures read-TLP headers into a bounded queue (overflow drops silently,
/// same contract as the write engine). Stage 2 splits each request into 32-DWORD-max
/// chunks that stop at 128-byte boundaries, through a one-entry pipeline register.
/// Stage 3 walks one chunk at a time, one read request per tick, and only pulls a new
/// chunk while the completion queue reports room; that gate is the single flow-control
/// point of the whole read pipeline.
pub(crate) struct ReadEngine {
    queue: VecDeque<QueuedRead>,
    queue_depth: usize,
    split: SplitState,
    /// Pipeline register decoupling the splitter from expansion.
    split_out: Option<Chunk>,
    expand: ExpandState,
}

impl ReadEngine {
    pub(crate) fn new(queue_depth: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(queue_depth),
            queue_depth,
            split: SplitState::Fetch,
            split_out: None,
            expand: ExpandState::Idle,
        }
    }

    /// Stage 1: captures a read TLP header (reads are single-word, no payload).
    pub(crate) fn ingest(&mut self, word: TlpWord) {
        let Ok(hdr) = MemRequestHeader::parse(&word) else {
            // Malformed header: ignored, no state transition.
            return;
        };
        debug_assert_eq!(hdr.kind, MemRequestKind::Read);
        if self.queue.len() >= self.queue_depth {
            log::warn!(
                "read queue full ({} records); dropping request tag {:#x}",
                self.queue.len(),
                hdr.tag
            );
            return;
        }
        self.queue.push_back(QueuedRead {
            bar: word.bar,
            len_dw: hdr.len_dw,
            requester_id: hdr.requester_id,
            tag: hdr.tag,
            first_be: hdr.first_be,
            last_be: hdr.last_be,
            addr: hdr.addr,
        });
    }

    /// Stage 2: refills the pipeline register with the next chunk.
    pub(crate) fn step_split(&mut self) {
        if self.split_out.is_some() {
            return;
        }
        match self.split {
            SplitState::Fetch => {
                let Some(req) = self.queue.pop_front() else {
                    return;
                };
                // Distance to the next 128-byte boundary; a request starting exactly
                // on a boundary consumes a full chunk.
                let offset_dw = (req.addr >> 2) as u16 & (CHUNK_DW - 1);
                let first_len = req.len_dw.min(CHUNK_DW - offset_dw);
                self.split_out = Some(Chunk {
                    bar: req.bar,
                    len_dw: first_len,
                    byte_count: first_len * 4,
                    requester_id: req.requester_id,
                    tag: req.tag,
                    first_be: req.first_be,
                    lower_addr: lower_addr(req.addr, req.first_be),
                    addr: req.addr,
                });
                if req.len_dw > first_len {
                    self.split = SplitState::Processing {
                        remaining_dw: req.len_dw - first_len,
                        addr: req.addr.wrapping_add(u32::from(first_len) * 4),
                        bar: req.bar,
                        requester_id: req.requester_id,
                        tag: req.tag,
                    };
                }
            }
            SplitState::Processing {
                remaining_dw,
                addr,
                bar,
                requester_id,
                tag,
            } => {
                let len = remaining_dw.min(CHUNK_DW);
                self.split_out = Some(Chunk {
                    bar,
                    len_dw: len,
                    byte_count: len * 4,
                    requester_id,
                    tag,
                    first_be: 0xf,
                    lower_addr: lower_addr(addr, 0xf),
                    addr,
                });
                if remaining_dw > len {
                    self.split = SplitState::Processing {
                        remaining_dw: remaining_dw - len,
                        addr: addr.wrapping_add(u32::from(len) * 4),
                        bar,
                        requester_id,
                        tag,
                    };
                } else {
                    self.split = SplitState::Fetch;
                }
            }
        }
    }

    /// Stage 3: emits at most one per-DWORD read request.
    ///
    /// `downstream_room` is the completion queue's almost-full gate; it is consulted
    /// only when latching a new chunk, so an in-progress chunk always drains at full
    /// rate.
    pub(crate) fn step_expand(&mut self, downstream_room: bool) -> Option<BarReadRequest> {
        match self.expand {
            ExpandState::Idle => {
                if !downstream_room {
                    return None;
                }
                let chunk = self.split_out.take()?;
                let request = expand_request(&chunk, chunk.addr, true, chunk.len_dw == 1);
                if chunk.len_dw > 1 {
                    self.expand = ExpandState::Walk {
                        chunk,
                        remaining_dw: chunk.len_dw - 1,
                        addr: chunk.addr.wrapping_add(4),
                    };
                }
                Some(request)
            }
            ExpandState::Walk {
                chunk,
                remaining_dw,
                addr,
            } => {
                let request = expand_request(&chunk, addr, false, remaining_dw == 1);
                if remaining_dw > 1 {
                    self.expand = ExpandState::Walk {
                        chunk,
                        remaining_dw: remaining_dw - 1,
                        addr: addr.wrapping_add(4),
                    };
                } else {
                    self.expand = ExpandState::Idle;
                }
                Some(request)
            }
        }
    }

    pub(crate) fn reset(&mut self) {
        self.queue.clear();
        self.split = SplitState::Fetch;
        self.split_out = None;
        self.expand = ExpandState::Idle;
    }
}

fn expand_request(chunk: &Chunk, addr: u32, first: bool, last: bool) -> BarReadRequest {
    BarReadRequest {
        ctx: ReadContext {
            first,
            last,
            len_dw: chunk.len_dw,
            byte_count: chunk.byte_count,
            requester_id: chunk.requester_id,
            tag: chunk.tag,
            lower_addr: chunk.lower_addr,
            bar: chunk.bar,
            addr,
        },
        addr,
        byte_enable: if first { chunk.first_be } else { 0xf },
        bar: chunk.bar,
    }
}

/// Low 7 bits of the address of the first enabled byte.
fn lower_addr(addr: u32, first_be: u8) -> u8 {
    let first_byte = if first_be == 0 {
        0
    } else {
        first_be.trailing_zeros() as u8
    };
    (addr as u8 & 0x7c) | first_byte
}
