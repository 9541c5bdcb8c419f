use bitflags::bitflags;

bitflags! {
    /// Sideband flags carried alongside each streaming word.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct TlpWordFlags: u8 {
        /// First word of a TLP.
        const SOP = 1 << 0;
        /// Last word of a TLP.
        const EOP = 1 << 1;
    }
}

/// BAR slot index, 0 through 6 (slot 6 is conventionally the option-ROM BAR).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BarIndex(u8);

impl BarIndex {
    /// Number of BAR slots the pipeline routes between.
    pub const SLOTS: usize = 7;

    pub const fn new(index: u8) -> Option<Self> {
        if index < Self::SLOTS as u8 {
            Some(Self(index))
        } else {
            None
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// One 128-bit word of the TLP streaming transport.
///
/// `dwords[0]` is the first DWORD on the wire. Header DWORDs hold their fields in the
/// natural layout (format/type in bits 31:24 of DW0); payload DWORDs are raw wire byte
/// order. `keep` marks which of the four DWORDs are meaningful (bit n for `dwords[n]`).
///
/// Words are produced by the transport at most once per tick and consumed the same
/// tick; nothing outside the engines' explicit buffers retains them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TlpWord {
    pub dwords: [u32; 4],
    pub keep: u8,
    pub flags: TlpWordFlags,
    /// Target BAR slot, from the transport's BAR-hit sideband bits.
    pub bar: BarIndex,
}

impl TlpWord {
    pub fn is_sop(&self) -> bool {
        self.flags.contains(TlpWordFlags::SOP)
    }

    pub fn is_eop(&self) -> bool {
        self.flags.contains(TlpWordFlags::EOP)
    }

    /// Number of meaningful DWORDs in this word.
    pub fn dword_count(&self) -> u32 {
        (self.keep & 0xf).count_ones()
    }

    /// Index of the highest meaningful DWORD, or `None` for an empty keep mask.
    pub fn last_dword_index(&self) -> Option<usize> {
        match self.keep & 0xf {
            0 => None,
            keep => Some(7 - keep.leading_zeros() as usize),
        }
    }
}

/// Converts a payload DWORD from wire byte order to the engine's little-endian order.
pub fn dword_from_wire(v: u32) -> u32 {
    v.swap_bytes()
}

/// Converts a payload DWORD from the engine's little-endian order to wire byte order.
pub fn dword_to_wire(v: u32) -> u32 {
    v.swap_bytes()
}
