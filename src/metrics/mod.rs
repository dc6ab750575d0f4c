//! Per-contributor activity metrics.
//!
//! - [`schema`]: the fixed, ordered metric list and the name ↔ position
//!   [`Translation`] shared by every repository
//! - [`aggregate`]: folding issue and commit records into metrics per login

pub mod aggregate;
pub mod schema;

pub use aggregate::{Aggregation, Aggregator, RepoMetrics, aggregate, vocabulary, word_count};
pub use schema::{
    COMMIT_AVERAGES, ContributorMetrics, ISSUE_AVERAGES, METRIC_COUNT, Metric, MetricMap,
    Translation, WeightMap, saturate,
};
