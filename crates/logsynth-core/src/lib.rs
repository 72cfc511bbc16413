//! Synthetic event logs with realistic long-tailed popularity.
//!
//! - [`sampler`]: rank-biased (Zipfian) key sampling over a precomputed
//!   prefix-sum table, O(log n) per draw.
//! - [`event`]: the event record and its compact one-line text codec.
//! - [`generator`]: session-clustered event streams built from the samplers.

pub mod config;
pub mod error;
pub mod event;
pub mod generator;
pub mod rank;
pub mod sampler;
pub mod session;
pub mod stats;
pub mod weblog;

pub use config::GeneratorConfig;
pub use error::{ConfigError, EventError};
pub use event::{Event, EventReader};
pub use generator::LogGenerator;
pub use rank::RankDistribution;
pub use sampler::{CumulativeTable, WeightedKeySampler};
pub use session::SessionModel;
