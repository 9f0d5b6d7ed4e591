//! Online training infrastructure.
//!
//! - [`OnlineSampler`]: double-buffered wrapper that learns while sampling
//! - [`SamplerParams`]: configuration including the uniform mixture weight
//! - [`TrainingLogger`], [`Verbosity`]: structured rebuild logging

mod logger;
mod online;

pub use logger::{TrainingLogger, Verbosity};
pub use online::{OnlineSampler, SamplerParams};
