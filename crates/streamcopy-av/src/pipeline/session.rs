//! Teardown guard for one pipeline run.

use std::fmt;

use crate::container::Backend;

/// Lifecycle stage of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Stage {
    #[default]
    Closed,
    Opened,
    OutputConfigured,
    Streaming,
    Finalized,
}

impl Stage {
    pub(crate) fn advance(&mut self, next: Stage) {
        tracing::debug!("Remux stage {} -> {}", self, next);
        *self = next;
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Closed => "closed",
            Stage::Opened => "opened",
            Stage::OutputConfigured => "output-configured",
            Stage::Streaming => "streaming",
            Stage::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

/// Owns the input and output handles of one run and releases them exactly
/// once, whichever stage the run reached.
///
/// The output goes first so its I/O sink is closed before the input it was
/// fed from.
pub(crate) struct Session<B: Backend> {
    pub(crate) input: Option<B::Input>,
    pub(crate) output: Option<B::Output>,
    pub(crate) stage: Stage,
    closed: bool,
}

impl<B: Backend> Session<B> {
    pub(crate) fn new() -> Self {
        Self {
            input: None,
            output: None,
            stage: Stage::Closed,
            closed: false,
        }
    }

    /// Release both handles. Safe to call more than once.
    pub(crate) fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let reached = self.stage;
        drop(self.output.take());
        drop(self.input.take());
        self.stage = Stage::Closed;

        tracing::debug!("Remux session closed after reaching {}", reached);
    }
}

impl<B: Backend> Drop for Session<B> {
    fn drop(&mut self) {
        self.close();
    }
}
