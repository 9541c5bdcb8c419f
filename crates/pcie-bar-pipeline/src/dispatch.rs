use pcie_tlp::BarIndex;

use crate::handler::{BarHandler, BarReadRequest, BarReadResponse, BarWriteRequest};
use crate::handlers::NullBar;

/// Handler slot array plus the request fan-out / response merge.
///
/// Every slot steps every tick. The write request is presented only to the addressed
/// slot; the read request fans out gated by BAR-index match, so each handler sees
/// only its own traffic. Responses merge by fixed priority (slot 0 wins). Mutual
/// exclusion of responses is a handler-side obligation; the merge does not
/// arbitrate, it only asserts the precondition in debug builds.
pub(crate) struct Dispatch {
    slots: [Box<dyn BarHandler>; BarIndex::SLOTS],
}

impl Dispatch {
    pub(crate) fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Box::new(NullBar::new()) as Box<dyn BarHandler>),
        }
    }

    /// Installs a handler in the given slot, replacing the previous occupant.
    pub(crate) fn bind(&mut self, bar: BarIndex, handler: Box<dyn BarHandler>) {
        self.slots[bar.index()] = handler;
    }

    pub(crate) fn step(
        &mut self,
        write: Option<&BarWriteRequest>,
        read: Option<&BarReadRequest>,
    ) -> Option<BarReadResponse> {
        let mut merged: Option<BarReadResponse> = None;
        for (index, handler) in self.slots.iter_mut().enumerate() {
            let write = write.filter(|req| req.bar.index() == index);
            let read = read.filter(|req| req.bar.index() == index);
            if let Some(resp) = handler.step(write, read) {
                debug_assert!(
                    merged.is_none(),
                    "two BAR handlers asserted a response in the same tick"
                );
                if merged.is_none() {
                    merged = Some(resp);
                }
            }
        }
        merged
    }

    pub(crate) fn reset(&mut self) {
        for handler in &mut self.slots {
            handler.reset();
        }
    }
}
