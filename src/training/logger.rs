//! Structured logging for online training.

use serde::{Deserialize, Serialize};

/// Verbosity level for training output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// No output. Samplers usually run inside a renderer's hot loop, so
    /// this is the default.
    #[default]
    Silent,
    /// One line per distribution rebuild.
    Info,
    /// Rebuild lines plus refinement statistics.
    Debug,
}

/// Logger used by the online sampler to report rebuild progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrainingLogger {
    verbosity: Verbosity,
}

impl TrainingLogger {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    /// Log a completed rebuild of the sampling distribution.
    pub fn rebuild(&self, milestone: u64, num_nodes: usize, depth: usize) {
        if self.verbosity >= Verbosity::Info {
            eprintln!(
                "[guidetree] rebuilt sampling distribution at {milestone} samples: \
                 {num_nodes} nodes, depth {depth}"
            );
        }
    }

    /// Log the training tree's shape after refinement.
    pub fn refined(&self, num_nodes: usize, depth: usize) {
        if self.verbosity >= Verbosity::Debug {
            eprintln!("[guidetree] refined training tree: {num_nodes} nodes, depth {depth}");
        }
    }
}
