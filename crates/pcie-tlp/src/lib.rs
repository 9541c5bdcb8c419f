//! Wire-format layer for the PCIe BAR request/response pipeline.
//!
//! The transport delivers TLPs as a stream of fixed 128-bit (4-DWORD) words with a
//! per-DWORD keep mask and sideband start/end/BAR bits. This crate provides:
//!
//! - [`TlpWord`]: the streaming word plus its sideband flags
//! - [`MemRequestHeader`]: parsed memory read/write request headers (3DW and 4DW)
//! - [`CompletionHeader`]: CplD header construction and parsing
//! - [`MemReadBuilder`] / [`MemWriteBuilder`]: packet builders for harnesses and tests
//!
//! Header DWORDs are kept in their natural big-endian field layout (format/type in the
//! top bits of DW0); payload DWORDs are wire byte order and must be swapped to the
//! engine's little-endian order via [`dword_from_wire`] / [`dword_to_wire`].

mod builder;
mod header;
mod word;

pub use builder::{MemReadBuilder, MemWriteBuilder};
pub use header::{
    classify_dw0, CompletionHeader, MemRequestHeader, MemRequestKind, TlpError, MAX_READ_LEN_DW,
};
pub use word::{dword_from_wire, dword_to_wire, BarIndex, TlpWord, TlpWordFlags};
