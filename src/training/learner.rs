//! Linear weight learning over the combined dataset.
//!
//! ## Strategies
//!
//! | Strategy         | Model                                   | Reported evaluation        |
//! |------------------|-----------------------------------------|----------------------------|
//! | SparsePositive   | L1-penalized least squares, w ≥ 0       | R² on deduplicated examples |
//! | LinearSeparator  | Perceptron, no constraint               | In-sample accuracy         |
//!
//! Both expose one coefficient per feature position. [`WeightLearner`]
//! maps positions back to metric names through the [`Translation`], so
//! the resulting [`WeightMap`] always carries every schema metric.
//!
//! ## Why non-negative
//!
//! "Behaves like the reference user" should be explained by a handful of
//! metrics that each push the score up. The L1 penalty keeps the set small;
//! the sign constraint rules out metrics that only count against a login.
//!
//! ## Extreme feature values
//!
//! Saturated composites (see `loc_pow_files`) can make a column's spread
//! overflow f64. Such columns carry no usable signal and get weight 0.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::metrics::{Translation, WeightMap};
use crate::types::{Label, LabeledExample};

use super::dataset::CombinedDataset;

/// What a fit's evaluation value measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationKind {
    /// Coefficient of determination on deduplicated examples.
    R2OnUnique,
    /// Fraction of training examples classified correctly.
    InSampleAccuracy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub kind: EvaluationKind,
    pub value: f64,
    /// Number of examples the value was computed over.
    pub n_examples: usize,
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EvaluationKind::R2OnUnique => {
                write!(f, "R² {:.4} on {} unique examples", self.value, self.n_examples)
            }
            EvaluationKind::InSampleAccuracy => {
                write!(f, "accuracy {:.4} on {} examples", self.value, self.n_examples)
            }
        }
    }
}

/// Raw output of a linear model, positionally aligned with the features.
#[derive(Debug, Clone)]
pub struct LinearFit {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub evaluation: Evaluation,
    pub iterations: usize,
    pub converged: bool,
}

impl LinearFit {
    pub fn decision(&self, features: &[f64]) -> f64 {
        self.intercept + dot(&self.coefficients, features)
    }
}

/// A linear model trainable on a balanced [`CombinedDataset`].
///
/// Callers guarantee a non-empty dataset containing both classes;
/// [`WeightLearner::train`] checks this before fitting.
pub trait LinearModel: Send + Sync {
    fn name(&self) -> &'static str;

    fn fit(&self, data: &CombinedDataset) -> Result<LinearFit>;
}

/// Non-negative lasso solved by cyclic coordinate descent.
///
/// Minimizes `(1 / 2n) * ||y - Xw - b||² + alpha * ||w||₁` subject to
/// `w ≥ 0`, with the intercept `b` handled by centering.
#[derive(Debug, Clone, PartialEq)]
pub struct SparsePositive {
    pub alpha: f64,
    pub max_iter: usize,
    pub tolerance: f64,
}

impl LinearModel for SparsePositive {
    fn name(&self) -> &'static str {
        "sparse-positive"
    }

    fn fit(&self, data: &CombinedDataset) -> Result<LinearFit> {
        let rows = data.examples();
        let width = feature_width(rows)?;
        let n = rows.len() as f64;

        let y: Vec<f64> = rows.iter().map(|e| e.label.value()).collect();
        let y_mean = y.iter().sum::<f64>() / n;
        let x_mean = column_means(rows, width);

        // Column-major centered design matrix
        let columns: Vec<Vec<f64>> = (0..width)
            .map(|j| rows.iter().map(|e| e.features[j] - x_mean[j]).collect())
            .collect();
        let norm_sq: Vec<f64> = columns.iter().map(|c| dot(c, c)).collect();

        let mut w = vec![0.0; width];
        let mut residual: Vec<f64> = y.iter().map(|v| v - y_mean).collect();
        let threshold = self.alpha * n;

        let mut iterations = 0;
        let mut converged = false;
        for _ in 0..self.max_iter {
            iterations += 1;
            let mut max_delta = 0.0f64;
            let mut max_weight = 0.0f64;

            for j in 0..width {
                if !(norm_sq[j].is_finite() && norm_sq[j] > 0.0) {
                    continue;
                }
                let column = &columns[j];
                let old = w[j];
                let rho = dot(column, &residual) + old * norm_sq[j];
                let new = if rho > threshold {
                    (rho - threshold) / norm_sq[j]
                } else {
                    0.0
                };
                if !new.is_finite() {
                    continue;
                }

                let delta = new - old;
                if delta != 0.0 {
                    for (r, x) in residual.iter_mut().zip(column) {
                        *r -= delta * x;
                    }
                    w[j] = new;
                }
                max_delta = max_delta.max(delta.abs());
                max_weight = max_weight.max(new.abs());
            }

            if max_weight == 0.0 || max_delta <= self.tolerance * max_weight {
                converged = true;
                break;
            }
        }

        let intercept = y_mean - dot(&w, &x_mean);
        let mut fit = LinearFit {
            coefficients: w,
            intercept,
            evaluation: Evaluation {
                kind: EvaluationKind::R2OnUnique,
                value: 0.0,
                n_examples: 0,
            },
            iterations,
            converged,
        };

        let unique = data.unique();
        fit.evaluation.value = r_squared(&fit, &unique);
        fit.evaluation.n_examples = unique.len();
        Ok(fit)
    }
}

/// Online perceptron over standardized features.
///
/// Runs full passes until a pass makes no mistakes or `max_iter` passes
/// are spent. Coefficients are mapped back to the original feature scale,
/// which leaves every decision unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSeparator {
    pub max_iter: usize,
    pub learning_rate: f64,
}

impl LinearModel for LinearSeparator {
    fn name(&self) -> &'static str {
        "linear-separator"
    }

    fn fit(&self, data: &CombinedDataset) -> Result<LinearFit> {
        let rows = data.examples();
        let width = feature_width(rows)?;
        let n = rows.len() as f64;

        let mean = column_means(rows, width);
        let scale: Vec<Option<f64>> = (0..width)
            .map(|j| {
                let var = rows
                    .iter()
                    .map(|e| (e.features[j] - mean[j]).powi(2))
                    .sum::<f64>()
                    / n;
                let sd = var.sqrt();
                (sd.is_finite() && sd > 0.0).then_some(sd)
            })
            .collect();

        let standardized: Vec<Vec<f64>> = rows
            .iter()
            .map(|e| {
                (0..width)
                    .map(|j| scale[j].map_or(0.0, |sd| (e.features[j] - mean[j]) / sd))
                    .collect()
            })
            .collect();
        let targets: Vec<f64> = rows
            .iter()
            .map(|e| if e.label == Label::Reference { 1.0 } else { -1.0 })
            .collect();

        let mut w = vec![0.0; width];
        let mut b = 0.0;
        let mut iterations = 0;
        let mut converged = false;
        for _ in 0..self.max_iter {
            iterations += 1;
            let mut mistakes = 0;
            for (z, &t) in standardized.iter().zip(&targets) {
                if t * (b + dot(&w, z)) <= 0.0 {
                    for (wj, zj) in w.iter_mut().zip(z) {
                        *wj += self.learning_rate * t * zj;
                    }
                    b += self.learning_rate * t;
                    mistakes += 1;
                }
            }
            if mistakes == 0 {
                converged = true;
                break;
            }
        }

        let correct = standardized
            .iter()
            .zip(&targets)
            .filter(|(z, t)| (b + dot(&w, z) > 0.0) == (**t > 0.0))
            .count();

        let coefficients: Vec<f64> = w
            .iter()
            .zip(&scale)
            .map(|(wj, sd)| sd.map_or(0.0, |sd| wj / sd))
            .collect();
        let intercept = b - dot(&coefficients, &mean);

        Ok(LinearFit {
            coefficients,
            intercept,
            evaluation: Evaluation {
                kind: EvaluationKind::InSampleAccuracy,
                value: correct as f64 / n,
                n_examples: rows.len(),
            },
            iterations,
            converged,
        })
    }
}

/// Name of a learner strategy as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    #[default]
    SparsePositive,
    LinearSeparator,
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sparse-positive" | "lasso" => Ok(StrategyKind::SparsePositive),
            "linear-separator" | "perceptron" => Ok(StrategyKind::LinearSeparator),
            _ => Err(format!(
                "unknown learner strategy: {s} (expected sparse-positive or linear-separator)"
            )),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::SparsePositive => write!(f, "sparse-positive"),
            StrategyKind::LinearSeparator => write!(f, "linear-separator"),
        }
    }
}

/// Tunables shared by the strategies; each uses the ones it needs.
#[derive(Debug, Clone, PartialEq)]
pub struct LearnerParams {
    pub alpha: f64,
    pub max_iter: usize,
    pub tolerance: f64,
    pub learning_rate: f64,
}

impl Default for LearnerParams {
    fn default() -> Self {
        Self {
            alpha: 0.01,
            max_iter: 1000,
            tolerance: 1e-4,
            learning_rate: 1.0,
        }
    }
}

/// A configured learner strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum LearnerStrategy {
    SparsePositive(SparsePositive),
    LinearSeparator(LinearSeparator),
}

impl LearnerStrategy {
    pub fn new(kind: StrategyKind, params: &LearnerParams) -> Self {
        match kind {
            StrategyKind::SparsePositive => LearnerStrategy::SparsePositive(SparsePositive {
                alpha: params.alpha,
                max_iter: params.max_iter,
                tolerance: params.tolerance,
            }),
            StrategyKind::LinearSeparator => LearnerStrategy::LinearSeparator(LinearSeparator {
                max_iter: params.max_iter,
                learning_rate: params.learning_rate,
            }),
        }
    }

    pub fn model(&self) -> &dyn LinearModel {
        match self {
            LearnerStrategy::SparsePositive(m) => m,
            LearnerStrategy::LinearSeparator(m) => m,
        }
    }
}

impl Default for LearnerStrategy {
    fn default() -> Self {
        Self::new(StrategyKind::default(), &LearnerParams::default())
    }
}

/// Outcome of one training run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub strategy: &'static str,
    pub weights: WeightMap,
    pub intercept: f64,
    pub evaluation: Evaluation,
    pub n_examples: usize,
    pub iterations: usize,
    pub converged: bool,
}

/// Fits the configured strategy and names its coefficients.
#[derive(Debug, Clone)]
pub struct WeightLearner {
    strategy: LearnerStrategy,
    translation: Translation,
}

impl WeightLearner {
    pub fn new(strategy: LearnerStrategy, translation: Translation) -> Self {
        Self {
            strategy,
            translation,
        }
    }

    pub fn train(&self, data: &CombinedDataset) -> Result<TrainingReport> {
        let rows = data.examples();
        if rows.is_empty() {
            return Err(PipelineError::Training(
                "combined dataset is empty (no repository has contributors besides the reference)"
                    .to_string(),
            ));
        }
        let positives = rows.iter().filter(|e| e.label == Label::Reference).count();
        if positives == 0 || positives == rows.len() {
            return Err(PipelineError::Training(
                "combined dataset contains a single class".to_string(),
            ));
        }
        if let Some(row) = rows.iter().find(|e| e.features.len() != self.translation.len()) {
            return Err(PipelineError::Training(format!(
                "feature vector has {} entries but the translation has {}",
                row.features.len(),
                self.translation.len()
            )));
        }

        let model = self.strategy.model();
        let fit = model.fit(data)?;
        if !fit.converged {
            warn!(strategy = model.name(), iterations = fit.iterations, "learner hit its iteration cap");
        }
        if fit.coefficients.iter().any(|c| !c.is_finite()) || !fit.intercept.is_finite() {
            return Err(PipelineError::Training(format!(
                "{} produced non-finite coefficients",
                model.name()
            )));
        }

        let weights = self
            .translation
            .weights_from(&fit.coefficients)
            .map_err(PipelineError::Training)?;
        debug!(strategy = model.name(), evaluation = %fit.evaluation, "trained weights");

        Ok(TrainingReport {
            strategy: model.name(),
            weights,
            intercept: fit.intercept,
            evaluation: fit.evaluation,
            n_examples: rows.len(),
            iterations: fit.iterations,
            converged: fit.converged,
        })
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Running means; stays finite even when raw sums would overflow.
fn column_means(rows: &[LabeledExample], width: usize) -> Vec<f64> {
    let mut mean = vec![0.0; width];
    for (k, e) in rows.iter().enumerate() {
        let k = (k + 1) as f64;
        for (m, x) in mean.iter_mut().zip(&e.features) {
            *m += (x - *m) / k;
        }
    }
    mean
}

fn feature_width(rows: &[LabeledExample]) -> Result<usize> {
    rows.first()
        .map(|e| e.features.len())
        .ok_or_else(|| PipelineError::Training("no examples to fit".to_string()))
}

/// R² of the fit's predictions; a constant target scores 1 if matched exactly, else 0.
fn r_squared(fit: &LinearFit, examples: &[LabeledExample]) -> f64 {
    if examples.is_empty() {
        return 0.0;
    }
    let n = examples.len() as f64;
    let y_mean = examples.iter().map(|e| e.label.value()).sum::<f64>() / n;
    let (ss_res, ss_tot) = examples.iter().fold((0.0, 0.0), |(res, tot), e| {
        let y = e.label.value();
        let pred = fit.decision(&e.features);
        (res + (y - pred).powi(2), tot + (y - y_mean).powi(2))
    });
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}
