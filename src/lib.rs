//! lookalike - rank contributors by resemblance to a reference contributor
//!
//! Aggregates per-login activity metrics from issue and commit records,
//! learns one interpretable weight per metric from the reference login's
//! footprint across several repositories, and scores every contributor
//! with a plain weighted sum.
//!
//! # Architecture
//!
//! ```text
//! Dumps → Aggregate → Vectorize → Balance → Learn → Score → Rendering
//!   ↓         ↓           ↓          ↓        ↓       ↓         ↓
//! source   metrics    translation  oversample linear weighted  ANSI
//!  JSON    per login  + labels     per repo   model   sum     bars
//! ```
//!
//! Every stage persists its output through [`cache::ArtifactStore`], so
//! stages can be rerun independently.

pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod rendering;
pub mod scoring;
pub mod source;
pub mod training;
pub mod types;

pub use config::Config;
pub use error::{PipelineError, Result};
pub use metrics::{ContributorMetrics, Metric, MetricMap, Translation, WeightMap};
pub use pipeline::{AggregateOutcome, AggregateStatus, Pipeline, RepoScores};
pub use scoring::{DisplayTransform, ScoreTable, Scorer};
pub use source::{ActivitySource, DumpSource};
pub use types::{CommitRecord, IssueRecord, IssueState, Label, LabeledExample};
