//! Shared fixtures for the pipeline integration tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use pcie_bar_pipeline::{
    BarController, BarHandler, BarPipelineConfig, BarReadRequest, BarReadResponse,
    BarWriteRequest, ResponsePipe,
};
use pcie_tlp::{dword_from_wire, BarIndex, CompletionHeader, TlpWord};

pub fn bar(index: u8) -> BarIndex {
    BarIndex::new(index).unwrap()
}

pub fn controller() -> BarController {
    BarController::new(BarPipelineConfig::default()).unwrap()
}

/// Records every request it is handed; reads are answered with a fixed pattern.
pub struct RecordingBar {
    pub writes: Rc<RefCell<Vec<BarWriteRequest>>>,
    pub reads: Rc<RefCell<Vec<BarReadRequest>>>,
    pipe: ResponsePipe,
    read_data: u32,
}

impl RecordingBar {
    pub fn new(latency: usize, read_data: u32) -> Self {
        Self {
            writes: Rc::new(RefCell::new(Vec::new())),
            reads: Rc::new(RefCell::new(Vec::new())),
            pipe: ResponsePipe::new(latency),
            read_data,
        }
    }

    pub fn writes_handle(&self) -> Rc<RefCell<Vec<BarWriteRequest>>> {
        Rc::clone(&self.writes)
    }

    pub fn reads_handle(&self) -> Rc<RefCell<Vec<BarReadRequest>>> {
        Rc::clone(&self.reads)
    }
}

impl BarHandler for RecordingBar {
    fn reset(&mut self) {
        self.writes.borrow_mut().clear();
        self.reads.borrow_mut().clear();
        self.pipe.clear();
    }

    fn step(
        &mut self,
        write: Option<&BarWriteRequest>,
        read: Option<&BarReadRequest>,
    ) -> Option<BarReadResponse> {
        if let Some(req) = write {
            self.writes.borrow_mut().push(*req);
        }
        let resp = read.map(|req| {
            self.reads.borrow_mut().push(*req);
            BarReadResponse {
                ctx: req.ctx,
                data: self.read_data,
            }
        });
        self.pipe.shift(resp)
    }
}

/// Feeds one word per tick, then idles, draining completions every tick.
pub fn run(ctrl: &mut BarController, words: &[TlpWord], idle_ticks: usize) -> Vec<TlpWord> {
    let mut out = Vec::new();
    for word in words {
        ctrl.tick(Some(*word));
        out.extend(ctrl.take_completion());
    }
    for _ in 0..idle_ticks {
        ctrl.tick(None);
        out.extend(ctrl.take_completion());
    }
    out
}

/// One decoded completion TLP.
#[derive(Debug, PartialEq, Eq)]
pub struct Completion {
    pub header: CompletionHeader,
    /// Payload in engine (little-endian) order.
    pub data: Vec<u32>,
}

/// Reassembles the outbound word stream into decoded completion packets.
pub fn decode_completions(words: &[TlpWord]) -> Vec<Completion> {
    let mut completions = Vec::new();
    let mut cur: Option<Completion> = None;
    for word in words {
        let mut slot = 0;
        if word.is_sop() {
            assert!(cur.is_none(), "completion interleaved mid-packet");
            let header =
                CompletionHeader::parse(&[word.dwords[0], word.dwords[1], word.dwords[2]])
                    .expect("outbound packet must be a CplD");
            assert_eq!(word.keep & 0x7, 0x7);
            cur = Some(Completion {
                header,
                data: Vec::new(),
            });
            slot = 3;
        }
        let completion = cur.as_mut().expect("continuation without start of packet");
        while slot < 4 && word.keep & (1 << slot) != 0 {
            completion.data.push(dword_from_wire(word.dwords[slot]));
            slot += 1;
        }
        if word.is_eop() {
            completions.push(cur.take().unwrap());
        }
    }
    assert!(cur.is_none(), "truncated completion packet");
    completions
}
