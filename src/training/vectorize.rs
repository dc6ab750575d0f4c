//! Turns one repository's metrics into a labeled dataset.
//!
//! The reference login's vector is the only positive example. It is
//! paired with every other contributor: for each of the N-1 others we emit
//! `(their_vector, 0)` followed by `(reference_vector, 1)`, so a repository
//! with N contributors yields exactly `2 * (N - 1)` examples with both
//! classes balanced by construction.

use crate::error::{PipelineError, Result};
use crate::metrics::{RepoMetrics, Translation};
use crate::types::Label;

use super::dataset::Dataset;

/// Build the dataset for `repo`.
///
/// Fails when `reference` has no metrics in this repository.
pub fn vectorize(
    repo: &str,
    metrics: &RepoMetrics,
    translation: &Translation,
    reference: &str,
) -> Result<Dataset> {
    let reference_metrics = metrics.get(reference).ok_or_else(|| {
        PipelineError::Config(format!(
            "reference login '{reference}' has no activity in {repo}"
        ))
    })?;
    let reference_vector = translation.vectorize(reference_metrics);

    let mut dataset = Dataset::new(repo);
    for (login, m) in metrics {
        if login == reference {
            continue;
        }
        dataset.push(translation.vectorize(m), Label::Other);
        dataset.push(reference_vector.clone(), Label::Reference);
    }
    Ok(dataset)
}
