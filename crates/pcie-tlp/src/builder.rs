//! Request TLP builders.
//!
//! These produce the exact word stream a transport would deliver, and exist for
//! harnesses and tests; the pipeline itself only parses.

use crate::word::{dword_to_wire, BarIndex, TlpWord, TlpWordFlags};

/// Builds the single-word header TLP of a memory read request.
#[derive(Clone, Copy, Debug)]
pub struct MemReadBuilder {
    pub bar: BarIndex,
    /// DWORD-aligned target address.
    pub addr: u32,
    /// Requested length in DWORDs, 1..=1024 (1024 encodes as 0 on the wire).
    pub len_dw: u16,
    pub four_dw: bool,
    pub requester_id: u16,
    pub tag: u8,
    pub first_be: u8,
    pub last_be: u8,
}

impl MemReadBuilder {
    pub fn build(&self) -> TlpWord {
        let fmt_type: u32 = if self.four_dw { 0x20 } else { 0x00 };
        let (dwords, keep) = request_dwords(
            fmt_type,
            self.len_dw,
            self.requester_id,
            self.tag,
            self.first_be,
            self.last_be,
            self.addr,
            self.four_dw,
        );
        TlpWord {
            dwords,
            keep,
            flags: TlpWordFlags::SOP | TlpWordFlags::EOP,
            bar: self.bar,
        }
    }
}

/// Builds the word stream of a memory write request with payload.
#[derive(Clone, Copy, Debug)]
pub struct MemWriteBuilder<'a> {
    pub bar: BarIndex,
    /// DWORD-aligned target address.
    pub addr: u32,
    pub four_dw: bool,
    pub requester_id: u16,
    pub tag: u8,
    pub first_be: u8,
    pub last_be: u8,
    /// Payload in the engine's little-endian order; byte-swapped onto the wire.
    pub data: &'a [u32],
}

impl MemWriteBuilder<'_> {
    pub fn build(&self) -> Vec<TlpWord> {
        assert!(!self.data.is_empty(), "write TLP requires payload");
        let fmt_type: u32 = if self.four_dw { 0x60 } else { 0x40 };
        let (header, _) = request_dwords(
            fmt_type,
            self.data.len() as u16,
            self.requester_id,
            self.tag,
            self.first_be,
            self.last_be,
            self.addr,
            self.four_dw,
        );

        // Flatten header + payload into one DWORD stream, then chop into words.
        let header_len = if self.four_dw { 4 } else { 3 };
        let mut stream: Vec<u32> = header[..header_len].to_vec();
        stream.extend(self.data.iter().map(|&d| dword_to_wire(d)));

        let mut words = Vec::with_capacity(stream.len().div_ceil(4));
        for (i, chunk) in stream.chunks(4).enumerate() {
            let mut dwords = [0u32; 4];
            dwords[..chunk.len()].copy_from_slice(chunk);
            let mut flags = TlpWordFlags::empty();
            if i == 0 {
                flags |= TlpWordFlags::SOP;
            }
            if (i + 1) * 4 >= stream.len() {
                flags |= TlpWordFlags::EOP;
            }
            words.push(TlpWord {
                dwords,
                keep: (1u8 << chunk.len()) - 1,
                flags,
                bar: self.bar,
            });
        }
        words
    }
}

#[allow(clippy::too_many_arguments)]
fn request_dwords(
    fmt_type: u32,
    len_dw: u16,
    requester_id: u16,
    tag: u8,
    first_be: u8,
    last_be: u8,
    addr: u32,
    four_dw: bool,
) -> ([u32; 4], u8) {
    assert!((1..=1024).contains(&len_dw), "length out of range");
    let dw0 = fmt_type << 24 | u32::from(len_dw & 0x3ff);
    let dw1 = u32::from(requester_id) << 16
        | u32::from(tag) << 8
        | u32::from(last_be & 0xf) << 4
        | u32::from(first_be & 0xf);
    if four_dw {
        // High address DWORD is zero: BARs are capped at 4 GiB.
        ([dw0, dw1, 0, addr & !0x3], 0xf)
    } else {
        ([dw0, dw1, addr & !0x3, 0], 0x7)
    }
}
