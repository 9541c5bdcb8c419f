use pcie_tlp::{BarIndex, TlpWord};

use crate::classify::{Classifier, Route};
use crate::completion::Reassembly;
use crate::config::{BarPipelineConfig, ConfigError};
use crate::dispatch::Dispatch;
use crate::handler::BarHandler;
use crate::read_engine::ReadEngine;
use crate::write_engine::WriteEngine;

/// The complete BAR request/response pipeline.
///
/// One [`BarController::tick`] models one clock cycle: at most one inbound transport
/// word is consumed, at most one write request and one read request reach the
/// handlers, and at most one completion word is assembled. The transport drains
/// completions by calling [`BarController::take_completion`] whenever it is ready;
/// [`BarController::has_pending_completions`] is the has-pending-data status line.
pub struct BarController {
    classifier: Classifier,
    write_engine: WriteEngine,
    read_engine: ReadEngine,
    dispatch: Dispatch,
    reassembly: Reassembly,
    bar_enabled: bool,
}

impl BarController {
    pub fn new(config: BarPipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            classifier: Classifier::default(),
            write_engine: WriteEngine::new(config.write_buffer_words),
            read_engine: ReadEngine::new(config.read_queue_depth),
            dispatch: Dispatch::new(),
            reassembly: Reassembly::new(
                config.completer_id,
                config.completion_queue_depth,
                config.completion_almost_full_margin,
            ),
            bar_enabled: true,
        })
    }

    /// Installs a handler in a BAR slot (replacing the null handler it starts with).
    pub fn bind(&mut self, bar: BarIndex, handler: Box<dyn BarHandler>) {
        self.dispatch.bind(bar, handler);
    }

    /// Gates all BAR decoding, mirroring the endpoint's memory-space enable.
    pub fn set_bar_enabled(&mut self, enabled: bool) {
        self.bar_enabled = enabled;
    }

    /// Advances the pipeline one clock cycle, consuming at most one transport word.
    pub fn tick(&mut self, inbound: Option<TlpWord>) {
        if let Some(word) = inbound {
            match self.classifier.classify(&word, self.bar_enabled) {
                Some(Route::Write) => self.write_engine.ingest(word),
                Some(Route::Read) => {
                    // Reads are single-word headers; continuations never route here.
                    if word.is_sop() {
                        self.read_engine.ingest(word);
                    }
                }
                None => {}
            }
        }

        let write = self.write_engine.step();
        let read = self.read_engine.step_expand(self.reassembly.has_room());
        // Refill the stage-2 pipeline register after stage 3 consumed it, preserving
        // the one-cycle decoupling between the two stages.
        self.read_engine.step_split();

        let response = self.dispatch.step(write.as_ref(), read.as_ref());
        if let Some(response) = response {
            self.reassembly.push_response(response);
        }
    }

    /// Drains one outbound completion word; call only when the transport is ready.
    pub fn take_completion(&mut self) -> Option<TlpWord> {
        self.reassembly.take()
    }

    /// True while assembled completion packets are waiting to be drained.
    pub fn has_pending_completions(&self) -> bool {
        self.reassembly.has_pending()
    }

    /// Returns every engine to its power-on state. Handlers stay bound and receive
    /// their own `reset`.
    pub fn reset(&mut self) {
        self.classifier.reset();
        self.write_engine.reset();
        self.read_engine.reset();
        self.reassembly.reset();
        self.dispatch.reset();
        self.bar_enabled = true;
    }
}
