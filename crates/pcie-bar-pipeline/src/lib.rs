//! Cycle-driven model of a PCIe endpoint's BAR request/response pipeline.
//!
//! The pipeline consumes the transport's 4-DWORD TLP word stream, classifies memory
//! reads and writes targeting mapped BARs, reduces them into single-DWORD requests,
//! dispatches those to per-BAR handler blocks, and reassembles read responses into
//! completion TLPs. It mirrors the hardware structure it models:
//!
//! - [`BarController`]: top-level tick driver and transport-facing surface
//! - write engine: buffered write TLPs, one write request per tick
//! - read engine: ingest queue, 128-byte-boundary splitter, per-DWORD expansion
//! - completion reassembly: CplD header build, 4-DWORD repacking, in-flight tracking
//! - [`BarHandler`]: the contract every pluggable BAR block implements
//!
//! Everything advances exactly one step per [`BarController::tick`]; backpressure is
//! expressed through queue occupancy sampled each tick, never by blocking. Faults stay
//! local and silent: queue overflow drops the offending packet, malformed headers cause
//! no state transition, and neither is surfaced to the transport.

mod classify;
mod completion;
mod config;
mod controller;
mod dispatch;
mod handler;
mod read_engine;
mod write_engine;

pub mod handlers;

pub use config::{BarPipelineConfig, ConfigError};
pub use controller::BarController;
pub use handler::{
    BarHandler, BarReadRequest, BarReadResponse, BarWriteRequest, ReadContext, ResponsePipe,
};
