//! Run configuration loaded from lookalike.toml.
//!
//! One explicit [`Config`] value is built per run and handed to each stage;
//! nothing reads configuration from global state.
//!
//! ## Example
//!
//! ```toml
//! reference = "seifferth"
//! repos = ["seifferth/pandoc-filters", "jgm/pandoc"]
//! data-dir = "data"
//! seed = 7
//!
//! [learner]
//! strategy = "sparse-positive"
//! alpha = 0.01
//!
//! [scoring]
//! clamp-negative = true
//! display = "log"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{PipelineError, Result};
use crate::scoring::DisplayTransform;
use crate::training::{LearnerParams, LearnerStrategy, StrategyKind};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "lookalike.toml";

/// Default directory for fetched dumps and stage artifacts.
pub const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Clone)]
pub struct Config {
    /// Source file for this config (for display).
    pub source: Option<PathBuf>,

    /// Login whose activity defines the positive class.
    pub reference: String,

    /// Repositories as `owner/name`.
    pub repos: Vec<String>,

    pub data_dir: PathBuf,

    /// Seed for dataset balancing. `None` draws from entropy.
    pub seed: Option<u64>,

    pub learner: LearnerStrategy,

    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringConfig {
    /// Treat negative weights as 0 when scoring.
    pub clamp_negative: bool,
    pub display: DisplayTransform,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            clamp_negative: true,
            display: DisplayTransform::Log,
        }
    }
}

/// Raw config as deserialized from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawConfig {
    reference: Option<String>,
    repos: Option<Vec<String>>,
    data_dir: Option<String>,
    seed: Option<u64>,
    learner: Option<RawLearner>,
    scoring: Option<RawScoring>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawLearner {
    strategy: Option<String>,
    alpha: Option<f64>,
    max_iter: Option<usize>,
    tolerance: Option<f64>,
    learning_rate: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawScoring {
    clamp_negative: Option<bool>,
    display: Option<String>,
}

impl Config {
    /// Load and validate the config file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let mut config = Self::parse(&content)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let reference = raw
            .reference
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .ok_or_else(|| PipelineError::Config("`reference` login is required".to_string()))?;

        let repos = raw.repos.unwrap_or_default();
        if repos.is_empty() {
            return Err(PipelineError::Config("`repos` must list at least one repository".to_string()));
        }
        for repo in &repos {
            if !is_repo_slug(repo) {
                return Err(PipelineError::Config(format!(
                    "repository '{repo}' is not of the form owner/name"
                )));
            }
        }

        let learner = Self::learner_from_raw(raw.learner.unwrap_or_default())?;

        let raw_scoring = raw.scoring.unwrap_or_default();
        let defaults = ScoringConfig::default();
        let scoring = ScoringConfig {
            clamp_negative: raw_scoring.clamp_negative.unwrap_or(defaults.clamp_negative),
            display: match raw_scoring.display {
                Some(d) => d.parse().map_err(PipelineError::Config)?,
                None => defaults.display,
            },
        };

        Ok(Self {
            source: None,
            reference,
            repos,
            data_dir: PathBuf::from(raw.data_dir.as_deref().unwrap_or(DEFAULT_DATA_DIR)),
            seed: raw.seed,
            learner,
            scoring,
        })
    }

    fn learner_from_raw(raw: RawLearner) -> Result<LearnerStrategy> {
        let kind: StrategyKind = match raw.strategy {
            Some(s) => s.parse().map_err(PipelineError::Config)?,
            None => StrategyKind::default(),
        };
        let defaults = LearnerParams::default();
        let params = LearnerParams {
            alpha: raw.alpha.unwrap_or(defaults.alpha),
            max_iter: raw.max_iter.unwrap_or(defaults.max_iter),
            tolerance: raw.tolerance.unwrap_or(defaults.tolerance),
            learning_rate: raw.learning_rate.unwrap_or(defaults.learning_rate),
        };

        if !(params.alpha >= 0.0 && params.alpha.is_finite()) {
            return Err(PipelineError::Config(format!("learner alpha must be >= 0, got {}", params.alpha)));
        }
        if params.max_iter == 0 {
            return Err(PipelineError::Config("learner max-iter must be > 0".to_string()));
        }
        if !(params.tolerance > 0.0) {
            return Err(PipelineError::Config("learner tolerance must be > 0".to_string()));
        }
        if !(params.learning_rate > 0.0) {
            return Err(PipelineError::Config("learner learning-rate must be > 0".to_string()));
        }

        Ok(LearnerStrategy::new(kind, &params))
    }

    /// Format config for verbose display.
    pub fn display_summary(&self) -> String {
        let mut lines = Vec::new();

        if let Some(ref source) = self.source {
            lines.push(format!("   Config: {}", source.display()));
        }
        lines.push(format!("   Reference: {}", self.reference));
        if self.repos.len() <= 3 {
            lines.push(format!("   Repos: {}", self.repos.join(", ")));
        } else {
            lines.push(format!(
                "   Repos: {}, ... (+{} more)",
                self.repos[..2].join(", "),
                self.repos.len() - 2
            ));
        }
        lines.push(format!("   Data: {}", self.data_dir.display()));
        lines.push(format!("   Learner: {}", self.learner.model().name()));

        lines.join("\n")
    }
}

fn is_repo_slug(repo: &str) -> bool {
    let mut parts = repo.split('/');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{LinearSeparator, SparsePositive};

    #[test]
    fn test_minimal_config_defaults() {
        let config = Config::parse("reference = \"me\"\nrepos = [\"o/r\"]\n").unwrap();
        assert_eq!(config.reference, "me");
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.seed, None);
        assert_eq!(config.scoring, ScoringConfig::default());
        assert_eq!(
            config.learner,
            LearnerStrategy::SparsePositive(SparsePositive {
                alpha: 0.01,
                max_iter: 1000,
                tolerance: 1e-4,
            })
        );
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
            reference = "me"
            repos = ["a/b", "c/d"]
            data-dir = "out"
            seed = 3

            [learner]
            strategy = "linear-separator"
            max-iter = 50
            learning-rate = 0.5

            [scoring]
            clamp-negative = false
            display = "raw"
            "#,
        )
        .unwrap();

        assert_eq!(config.repos.len(), 2);
        assert_eq!(config.seed, Some(3));
        assert_eq!(
            config.learner,
            LearnerStrategy::LinearSeparator(LinearSeparator {
                max_iter: 50,
                learning_rate: 0.5,
            })
        );
        assert!(!config.scoring.clamp_negative);
        assert_eq!(config.scoring.display, DisplayTransform::Raw);
    }

    #[test]
    fn test_missing_reference() {
        let err = Config::parse("repos = [\"o/r\"]").unwrap_err();
        assert!(err.to_string().contains("reference"), "got {err}");
    }

    #[test]
    fn test_bad_repo_slug() {
        assert!(Config::parse("reference = \"me\"\nrepos = [\"just-a-name\"]").is_err());
        assert!(Config::parse("reference = \"me\"\nrepos = [\"a/b/c\"]").is_err());
        assert!(Config::parse("reference = \"me\"\nrepos = []").is_err());
    }

    #[test]
    fn test_bad_learner_values() {
        let base = "reference = \"me\"\nrepos = [\"o/r\"]\n[learner]\n";
        assert!(Config::parse(&format!("{base}alpha = -1.0")).is_err());
        assert!(Config::parse(&format!("{base}max-iter = 0")).is_err());
        assert!(Config::parse(&format!("{base}strategy = \"forest\"")).is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(Config::parse("reference = \"me\"\nrepos = [\"o/r\"]\ntoken = \"x\"").is_err());
    }
}
