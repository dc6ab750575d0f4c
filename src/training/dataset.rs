//! Labeled datasets per repository and their balanced combination.
//!
//! ## Balancing
//!
//! Repositories differ wildly in contributor count. Concatenated as-is, a
//! repository with 200 contributors would outweigh one with 5 purely by
//! volume. [`CombinedDataset::balance`] oversamples every shorter dataset
//! (uniformly, with replacement, from its own examples only) up to the
//! length of the longest one, so each repository pulls on the weights
//! equally.
//!
//! ## Deduplication
//!
//! Oversampling and the vectorizer's repeated reference vector both create
//! exact duplicates. [`CombinedDataset::unique`] drops repeated
//! (vector, label) pairs so evaluation is not inflated by them.

use std::collections::HashSet;
use std::ops::Range;

use rand::Rng;
use tracing::{debug, warn};

use crate::types::{FeatureVector, Label, LabeledExample};

/// Labeled examples of one repository.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    pub repo: String,
    pub examples: Vec<LabeledExample>,
}

impl Dataset {
    pub fn new(repo: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            examples: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn push(&mut self, features: FeatureVector, label: Label) {
        self.examples.push(LabeledExample::new(features, label));
    }

    pub fn count(&self, label: Label) -> usize {
        self.examples.iter().filter(|e| e.label == label).count()
    }

    /// Split into the persisted `X` / `y` pair.
    pub fn to_xy(&self) -> (Vec<FeatureVector>, Vec<Label>) {
        self.examples
            .iter()
            .map(|e| (e.features.clone(), e.label))
            .unzip()
    }

    /// Rebuild from `X` / `y`; both must have equal length and every row the given width.
    pub fn from_xy(
        repo: impl Into<String>,
        x: Vec<FeatureVector>,
        y: Vec<Label>,
        width: usize,
    ) -> Result<Self, String> {
        if x.len() != y.len() {
            return Err(format!("X has {} rows but y has {} labels", x.len(), y.len()));
        }
        if let Some((i, row)) = x.iter().enumerate().find(|(_, row)| row.len() != width) {
            return Err(format!("row {i} has {} features, expected {width}", row.len()));
        }
        Ok(Self {
            repo: repo.into(),
            examples: x
                .into_iter()
                .zip(y)
                .map(|(features, label)| LabeledExample::new(features, label))
                .collect(),
        })
    }
}

/// All repositories' datasets, optionally balanced into one training set.
#[derive(Debug, Clone, Default)]
pub struct CombinedDataset {
    datasets: Vec<Dataset>,
    examples: Vec<LabeledExample>,
    /// Each repository's span within `examples`.
    spans: Vec<(String, Range<usize>)>,
}

impl CombinedDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, dataset: Dataset) {
        self.datasets.push(dataset);
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    /// Combined examples; empty until [`balance`](Self::balance) runs.
    pub fn examples(&self) -> &[LabeledExample] {
        &self.examples
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// One repository's slice of the combined examples.
    pub fn contribution(&self, repo: &str) -> Option<&[LabeledExample]> {
        self.spans
            .iter()
            .find(|(name, _)| name == repo)
            .map(|(_, span)| &self.examples[span.clone()])
    }

    /// Oversample every dataset to the longest one's length and concatenate.
    ///
    /// Empty datasets have nothing to draw from and are left out with a
    /// warning. Rebuilds from the original datasets on every call.
    pub fn balance<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let common_length = self.datasets.iter().map(Dataset::len).max().unwrap_or(0);

        self.examples.clear();
        self.spans.clear();

        for dataset in &self.datasets {
            if dataset.is_empty() {
                warn!(repo = %dataset.repo, "no examples to balance; repository left out");
                continue;
            }

            let start = self.examples.len();
            self.examples.extend(dataset.examples.iter().cloned());

            let missing = common_length - dataset.len();
            for _ in 0..missing {
                let i = rng.gen_range(0..dataset.len());
                self.examples.push(dataset.examples[i].clone());
            }
            debug!(repo = %dataset.repo, original = dataset.len(), oversampled = missing, "balanced");

            self.spans.push((dataset.repo.clone(), start..self.examples.len()));
        }
    }

    /// Original (pre-balance) examples with repeated (vector, label) pairs removed.
    ///
    /// First occurrence wins; order is otherwise preserved.
    pub fn unique(&self) -> Vec<LabeledExample> {
        let mut seen: HashSet<(Vec<u64>, Label)> = HashSet::new();
        self.datasets
            .iter()
            .flat_map(|d| d.examples.iter())
            .filter(|e| seen.insert((bit_key(&e.features), e.label)))
            .cloned()
            .collect()
    }
}

/// Exact-equality key for a vector (`-0.0` and `0.0` compare equal).
fn bit_key(features: &[f64]) -> Vec<u64> {
    features
        .iter()
        .map(|&v| if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() })
        .collect()
}
