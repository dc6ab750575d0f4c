//! Weight learning from per-repository activity.
//!
//! This module turns aggregated metrics into interpretable weights by:
//! 1. Labeling each repository's contributors against the reference login
//! 2. Balancing repositories so each pulls on the weights equally
//! 3. Fitting a linear model and naming its coefficients
//!
//! ## The Pairing Trick
//!
//! There is only one positive example per repository: the reference login.
//! The vectorizer repeats it once per other contributor, so classes are
//! balanced inside every repository before any resampling happens.
//!
//! ## Usage
//!
//! ```bash
//! lookalike vectorize
//! lookalike learn
//! ```

pub mod dataset;
pub mod learner;
pub mod vectorize;

pub use dataset::{CombinedDataset, Dataset};
pub use learner::{
    Evaluation, EvaluationKind, LearnerParams, LearnerStrategy, LinearFit, LinearModel,
    LinearSeparator, SparsePositive, StrategyKind, TrainingReport, WeightLearner,
};
pub use vectorize::vectorize;
