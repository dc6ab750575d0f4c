//! Applies learned weights to contributor metrics.
//!
//! `score = Σ weight[metric] * value[metric]`
//!
//! Negative weights can be clamped to 0 first: a metric the learner could
//! only use against a login is treated as irrelevant rather than as a
//! penalty. The display transform compresses scores for presentation and
//! never touches the weights.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use tracing::warn;

use crate::metrics::{ContributorMetrics, Metric, RepoMetrics, WeightMap, saturate};

/// Presentation transform for scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayTransform {
    Raw,
    /// Natural log; non-positive scores map to `-inf`.
    #[default]
    Log,
}

impl DisplayTransform {
    pub fn apply(self, score: f64) -> f64 {
        match self {
            DisplayTransform::Raw => score,
            DisplayTransform::Log if score > 0.0 => score.ln(),
            DisplayTransform::Log => f64::NEG_INFINITY,
        }
    }
}

impl FromStr for DisplayTransform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw" => Ok(DisplayTransform::Raw),
            "log" => Ok(DisplayTransform::Log),
            _ => Err(format!("unknown display transform: {s} (expected raw or log)")),
        }
    }
}

/// One login's score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreEntry {
    pub login: String,
    pub score: f64,
    /// Score after the display transform.
    pub display: f64,
}

/// Ranked scores of one repository, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTable {
    pub entries: Vec<ScoreEntry>,
    pub formula: String,
}

/// Persisted form of a [`ScoreTable`]; display values are not stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreArtifact {
    pub formula: String,
    pub scores: BTreeMap<String, f64>,
}

impl From<&ScoreTable> for ScoreArtifact {
    fn from(table: &ScoreTable) -> Self {
        Self {
            formula: table.formula.clone(),
            scores: table
                .entries
                .iter()
                .map(|e| (e.login.clone(), e.score))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scorer {
    weights: WeightMap,
    display: DisplayTransform,
}

impl Scorer {
    pub fn new(weights: &WeightMap, clamp_negative: bool, display: DisplayTransform) -> Self {
        let mut effective = *weights;
        if clamp_negative {
            for &metric in Metric::ALL {
                if effective[metric] < 0.0 {
                    effective[metric] = 0.0;
                }
            }
        }
        Self {
            weights: effective,
            display,
        }
    }

    /// Weights actually applied (after clamping).
    pub fn weights(&self) -> &WeightMap {
        &self.weights
    }

    /// Weighted sum, pinned to `±f64::MAX` on overflow.
    ///
    /// Opposite overflows (possible only without clamping) cancel to NaN;
    /// such a score is logged and reported as 0.
    pub fn score(&self, metrics: &ContributorMetrics) -> f64 {
        let s: f64 = self
            .weights
            .iter()
            .filter(|(_, w)| *w != 0.0)
            .map(|(m, w)| w * metrics[m])
            .sum();
        if s.is_nan() {
            warn!("weighted sum is undefined (opposite overflows); scoring as 0");
        }
        saturate(s)
    }

    /// Metrics with a nonzero applied weight, in schema order.
    pub fn active_metrics(&self) -> Vec<Metric> {
        self.weights
            .iter()
            .filter(|(_, w)| *w != 0.0)
            .map(|(m, _)| m)
            .collect()
    }

    /// Human-readable formula over the nonzero weights.
    pub fn formula(&self) -> String {
        let terms: Vec<String> = self
            .weights
            .iter()
            .filter(|(_, w)| *w != 0.0)
            .map(|(m, w)| format!("{w}*{m}"))
            .collect();
        if terms.is_empty() {
            "0".to_string()
        } else {
            terms.join(" + ")
        }
    }

    /// Score every login, best first; ties break by login.
    pub fn rank(&self, metrics: &RepoMetrics) -> ScoreTable {
        let mut entries: Vec<ScoreEntry> = metrics
            .iter()
            .map(|(login, m)| {
                let score = self.score(m);
                ScoreEntry {
                    login: login.clone(),
                    score,
                    display: self.display.apply(score),
                }
            })
            .collect();
        entries.sort_by(|a, b| {
            b.display
                .total_cmp(&a.display)
                .then_with(|| a.login.cmp(&b.login))
        });
        ScoreTable {
            entries,
            formula: self.formula(),
        }
    }
}
