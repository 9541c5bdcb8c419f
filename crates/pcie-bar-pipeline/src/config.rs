use thiserror::Error;

use crate::read_engine::CHUNK_WORDS;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid pipeline configuration: {0}")]
    Invalid(&'static str),
}

/// Sizing and identity parameters of the pipeline.
///
/// Queue depths are implementation parameters, not protocol requirements; the defaults
/// reproduce the source design's effective slack (2 KiB of write buffering, and enough
/// completion-queue headroom that a full 32-DWORD chunk admitted at the almost-full
/// threshold still fits).
#[derive(Clone, Copy, Debug)]
pub struct BarPipelineConfig {
    /// Completer ID placed in completion headers.
    pub completer_id: u16,
    /// Write engine buffer capacity in 4-DWORD words.
    pub write_buffer_words: usize,
    /// Read ingest (stage 1) queue depth in request records.
    pub read_queue_depth: usize,
    /// Outbound completion queue depth in TLP words.
    pub completion_queue_depth: usize,
    /// Almost-full margin of the completion queue. Stage 3 starts a new chunk only
    /// while occupancy stays at or below `completion_queue_depth - margin`; this is
    /// the single flow-control gate of the read pipeline, so the margin must cover a
    /// full chunk's worth of completion words (9: the header word carries the first
    /// data DWORD, the remaining 31 pack four per word).
    pub completion_almost_full_margin: usize,
}

impl Default for BarPipelineConfig {
    fn default() -> Self {
        Self {
            completer_id: 0,
            write_buffer_words: 128,
            read_queue_depth: 16,
            completion_queue_depth: 16,
            completion_almost_full_margin: 9,
        }
    }
}

impl BarPipelineConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.write_buffer_words == 0 {
            return Err(ConfigError::Invalid("write buffer capacity is zero"));
        }
        if self.read_queue_depth == 0 {
            return Err(ConfigError::Invalid("read queue depth is zero"));
        }
        if self.completion_queue_depth == 0 {
            return Err(ConfigError::Invalid("completion queue depth is zero"));
        }
        if self.completion_almost_full_margin < CHUNK_WORDS {
            return Err(ConfigError::Invalid(
                "almost-full margin must cover a full chunk of completion words",
            ));
        }
        if self.completion_almost_full_margin >= self.completion_queue_depth {
            return Err(ConfigError::Invalid(
                "almost-full margin must be smaller than the completion queue",
            ));
        }
        Ok(())
    }
}
