use thiserror::Error;

use crate::word::TlpWord;

/// Maximum DWORD length a memory read may request (length field 0 on the wire).
pub const MAX_READ_LEN_DW: u16 = 1024;

// Format/type byte (DW0 bits 31:24) of the recognized request encodings.
const FMT_TYPE_MRD_3DW: u8 = 0x00;
const FMT_TYPE_MRD_4DW: u8 = 0x20;
const FMT_TYPE_MWR_3DW: u8 = 0x40;
const FMT_TYPE_MWR_4DW: u8 = 0x60;
const FMT_TYPE_CPLD: u8 = 0x4a;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TlpError {
    #[error("malformed TLP: {0}")]
    Malformed(&'static str),

    #[error("truncated TLP word: {have} header DWORDs present, {need} required")]
    Truncated { have: u32, need: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemRequestKind {
    Read,
    Write,
}

/// Parsed memory read/write request header (the first word of a request TLP).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemRequestHeader {
    pub kind: MemRequestKind,
    /// True for the 4-DWORD (64-bit address) header layout.
    pub four_dw: bool,
    /// Requested length in DWORDs, 1..=1024 (wire value 0 decodes as 1024).
    pub len_dw: u16,
    pub requester_id: u16,
    pub tag: u8,
    pub first_be: u8,
    pub last_be: u8,
    /// DWORD-aligned target address (low 32 bits for 4-DWORD headers).
    pub addr: u32,
}

/// Classifies DW0's format/type byte as one of the recognized request encodings.
///
/// Returns the request kind and whether the header uses the 4-DWORD layout, or `None`
/// for anything that is not a memory read/write request.
pub fn classify_dw0(dw0: u32) -> Option<(MemRequestKind, bool)> {
    match (dw0 >> 24) as u8 {
        FMT_TYPE_MRD_3DW => Some((MemRequestKind::Read, false)),
        FMT_TYPE_MRD_4DW => Some((MemRequestKind::Read, true)),
        FMT_TYPE_MWR_3DW => Some((MemRequestKind::Write, false)),
        FMT_TYPE_MWR_4DW => Some((MemRequestKind::Write, true)),
        _ => None,
    }
}

impl MemRequestHeader {
    /// Parses the first word of a memory request TLP.
    pub fn parse(word: &TlpWord) -> Result<Self, TlpError> {
        let (kind, four_dw) =
            classify_dw0(word.dwords[0]).ok_or(TlpError::Malformed("not a memory request"))?;
        let need = if four_dw { 4 } else { 3 };
        let have = word.dword_count();
        if have < need {
            return Err(TlpError::Truncated { have, need });
        }

        let dw0 = word.dwords[0];
        let dw1 = word.dwords[1];
        let len_field = (dw0 & 0x3ff) as u16;
        let len_dw = if len_field == 0 { MAX_READ_LEN_DW } else { len_field };
        // 64-bit headers carry the high address DWORD first; BARs are capped at 4 GiB
        // so only the low DWORD participates in routing.
        let addr = if four_dw { word.dwords[3] } else { word.dwords[2] };

        Ok(Self {
            kind,
            four_dw,
            len_dw,
            requester_id: (dw1 >> 16) as u16,
            tag: (dw1 >> 8) as u8,
            first_be: (dw1 & 0xf) as u8,
            last_be: ((dw1 >> 4) & 0xf) as u8,
            addr: addr & !0x3,
        })
    }
}

/// Completion-with-data (CplD) header fields the reassembly stage emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompletionHeader {
    /// Payload length of this completion in DWORDs, 1..=32.
    pub len_dw: u16,
    /// Byte count field (12 bits).
    pub byte_count: u16,
    pub completer_id: u16,
    pub requester_id: u16,
    pub tag: u8,
    /// Low 7 bits of the byte address of the first enabled byte.
    pub lower_addr: u8,
}

impl CompletionHeader {
    /// Encodes the three header DWORDs of a CplD TLP.
    pub fn to_dwords(&self) -> [u32; 3] {
        [
            u32::from(FMT_TYPE_CPLD) << 24 | u32::from(self.len_dw & 0x3ff),
            u32::from(self.completer_id) << 16 | u32::from(self.byte_count & 0xfff),
            u32::from(self.requester_id) << 16
                | u32::from(self.tag) << 8
                | u32::from(self.lower_addr & 0x7f),
        ]
    }

    /// Decodes a CplD header, rejecting anything that is not a completion with data.
    pub fn parse(dwords: &[u32; 3]) -> Result<Self, TlpError> {
        if (dwords[0] >> 24) as u8 != FMT_TYPE_CPLD {
            return Err(TlpError::Malformed("not a completion with data"));
        }
        Ok(Self {
            len_dw: (dwords[0] & 0x3ff) as u16,
            byte_count: (dwords[1] & 0xfff) as u16,
            completer_id: (dwords[1] >> 16) as u16,
            requester_id: (dwords[2] >> 16) as u16,
            tag: (dwords[2] >> 8) as u8,
            lower_addr: (dwords[2] & 0x7f) as u8,
        })
    }
}
