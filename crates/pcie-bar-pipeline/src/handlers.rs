//! Example BAR handlers.
//!
//! These are conformance vehicles for the [`BarHandler`](crate::BarHandler) contract
//! and the fixtures the integration tests are built on; real designs supply their own
//! handler blocks (register files, DMA windows, ...) behind the same trait.

use crate::handler::{
    BarHandler, BarReadRequest, BarReadResponse, BarWriteRequest, ResponsePipe,
};

/// The mandatory filler for unbound slots: accepts everything, never responds.
///
/// Reads addressed to an unbound slot therefore produce no completion at all.
#[derive(Debug, Default)]
pub struct NullBar;

impl NullBar {
    pub fn new() -> Self {
        Self
    }
}

impl BarHandler for NullBar {
    fn reset(&mut self) {}

    fn step(
        &mut self,
        _write: Option<&BarWriteRequest>,
        _read: Option<&BarReadRequest>,
    ) -> Option<BarReadResponse> {
        None
    }
}

/// Zero-initialized memory window.
///
/// Writes land with per-byte byte-enable semantics; reads are served from the window
/// with the address wrapped to its size. Response latency is fixed at construction.
#[derive(Debug)]
pub struct ZeroWriteBar {
    mem: Vec<u8>,
    pipe: ResponsePipe,
}

impl ZeroWriteBar {
    /// Window size in bytes; must be a power of two (the source design uses 4 KiB).
    pub fn new(size: usize, latency: usize) -> Self {
        assert!(size.is_power_of_two(), "window size must be a power of two");
        Self {
            mem: vec![0; size],
            pipe: ResponsePipe::new(latency),
        }
    }

    fn offset(&self, addr: u32) -> usize {
        addr as usize & (self.mem.len() - 1) & !0x3
    }
}

impl BarHandler for ZeroWriteBar {
    fn reset(&mut self) {
        self.mem.fill(0);
        self.pipe.clear();
    }

    fn step(
        &mut self,
        write: Option<&BarWriteRequest>,
        read: Option<&BarReadRequest>,
    ) -> Option<BarReadResponse> {
        if let Some(req) = write {
            let base = self.offset(req.addr);
            let bytes = req.data.to_le_bytes();
            for (i, &byte) in bytes.iter().enumerate() {
                if req.byte_enable & (1 << i) != 0 {
                    self.mem[base + i] = byte;
                }
            }
        }
        let resp = read.map(|req| {
            let base = self.offset(req.addr);
            let data = u32::from_le_bytes(self.mem[base..base + 4].try_into().unwrap());
            BarReadResponse { ctx: req.ctx, data }
        });
        self.pipe.shift(resp)
    }
}

/// Address-loopback test BAR: every read returns its own address, writes are ignored.
#[derive(Debug)]
pub struct LoopbackBar {
    pipe: ResponsePipe,
}

impl LoopbackBar {
    pub fn new(latency: usize) -> Self {
        Self {
            pipe: ResponsePipe::new(latency),
        }
    }
}

impl BarHandler for LoopbackBar {
    fn reset(&mut self) {
        self.pipe.clear();
    }

    fn step(
        &mut self,
        _write: Option<&BarWriteRequest>,
        read: Option<&BarReadRequest>,
    ) -> Option<BarReadResponse> {
        let resp = read.map(|req| BarReadResponse {
            ctx: req.ctx,
            data: req.addr,
        });
        self.pipe.shift(resp)
    }
}
