use std::collections::VecDeque;

use pcie_tlp::BarIndex;

/// Single-DWORD write request delivered to the addressed BAR handler.
///
/// `data` is in the engine's little-endian order; the handler applies `byte_enable`
/// per byte (bit n enables byte n of `data`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BarWriteRequest {
    pub bar: BarIndex,
    pub addr: u32,
    pub byte_enable: u8,
    pub data: u32,
}

/// Bookkeeping threaded from a read request to its response.
///
/// Handlers must treat this as opaque and echo it unchanged; it is the only way the
/// reassembly stage's framing state survives the handler's latency. The fields are
/// captured at expansion time and rebuilt into the completion header verbatim.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadContext {
    /// First DWORD of a completion packet.
    pub first: bool,
    /// Last DWORD of a completion packet.
    pub last: bool,
    /// Completion payload length in DWORDs, 1..=32.
    pub len_dw: u16,
    /// Completion byte count field.
    pub byte_count: u16,
    pub requester_id: u16,
    pub tag: u8,
    /// Low 7 bits of the first enabled byte's address.
    pub lower_addr: u8,
    pub bar: BarIndex,
    /// Target address of this DWORD.
    pub addr: u32,
}

/// Single-DWORD read request round-tripping through exactly one handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BarReadRequest {
    pub ctx: ReadContext,
    pub addr: u32,
    pub byte_enable: u8,
    pub bar: BarIndex,
}

/// A handler's answer to a [`BarReadRequest`], `data` in little-endian order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BarReadResponse {
    pub ctx: ReadContext,
    pub data: u32,
}

/// The contract every pluggable BAR block implements.
///
/// A handler is clocked: [`BarHandler::step`] is called exactly once per pipeline
/// tick, whether or not requests are present. The write request is present only when
/// this handler's slot is addressed; likewise the read request. A response must
/// arrive a fixed, identical number of ticks after its request for every request the
/// handler ever serves; heterogeneous latency corrupts the response merge.
/// [`ResponsePipe`] provides the constant-latency plumbing.
/// At most one handler may return a response on any given tick; the dispatch layer
/// asserts this in debug builds but does not arbitrate.
pub trait BarHandler {
    fn reset(&mut self);

    fn step(
        &mut self,
        write: Option<&BarWriteRequest>,
        read: Option<&BarReadRequest>,
    ) -> Option<BarReadResponse>;
}

/// Fixed-depth response delay line.
///
/// Shifting one slot per tick turns a combinational lookup into a constant-latency
/// response, which is what the latency contract requires.
#[derive(Debug)]
pub struct ResponsePipe {
    slots: VecDeque<Option<BarReadResponse>>,
    latency: usize,
}

impl ResponsePipe {
    /// `latency` is the request-to-response distance in ticks, at least 1.
    pub fn new(latency: usize) -> Self {
        assert!(latency >= 1, "handler latency must be at least one tick");
        Self {
            slots: VecDeque::from(vec![None; latency]),
            latency,
        }
    }

    /// Advances the pipe one tick: enqueues this tick's response (if any) and returns
    /// the one whose latency has elapsed.
    pub fn shift(&mut self, input: Option<BarReadResponse>) -> Option<BarReadResponse> {
        self.slots.push_back(input);
        self.slots.pop_front().flatten()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.slots.resize(self.latency, None);
    }
}
