pub mod aggregate;
pub mod batch;
pub mod classify;
pub mod config;
pub mod focus;
pub mod merge;
pub mod normalize;
pub mod rank;
pub mod scoring;
pub mod source;
pub mod summary;

pub use batch::{BatchReport, BatchRequest, BatchStats, Engine, PeriodReport};
pub use config::{EngineConfig, ScoreWeights};
pub use source::{ActivitySource, ContributorSnapshot, RawActivity, SourceSchema, TimeWindow};
pub use summary::{ActivityDigest, TextGenerator};
