//! On-disk artifacts shared between pipeline stages.
//!
//! Layout under the data directory:
//!
//! ```text
//! data/
//!   translation.json          # metric name -> vector position (vectorize)
//!   weights.json              # metric name -> weight (learn)
//!   <owner>_<repo>/
//!     issues.json             # fetched issue records (activity source)
//!     commits.json            # fetched commit records (activity source)
//!     metrics.json            # login -> metrics (aggregate)
//!     vectors_X.json          # feature vectors (vectorize)
//!     vectors_y.json          # 0/1 labels (vectorize)
//!     scores.json             # login -> score + formula (score)
//! ```
//!
//! Design decisions:
//! - Writes go to a temp file in the target directory, then an atomic
//!   rename, so a crash never leaves a truncated artifact behind
//! - A missing artifact is reported as a missing prerequisite naming the
//!   stage that writes it; later stages never regenerate earlier output
//! - Maps are pretty-printed for inspection, vectors are compact

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::error::{PipelineError, Result};
use crate::metrics::{RepoMetrics, Translation, WeightMap};
use crate::scoring::ScoreArtifact;
use crate::training::Dataset;
use crate::types::{FeatureVector, Label, repo_dir_name};

pub const ISSUES_FILE: &str = "issues.json";
pub const COMMITS_FILE: &str = "commits.json";
pub const METRICS_FILE: &str = "metrics.json";
pub const VECTORS_X_FILE: &str = "vectors_X.json";
pub const VECTORS_Y_FILE: &str = "vectors_y.json";
pub const SCORES_FILE: &str = "scores.json";
pub const TRANSLATION_FILE: &str = "translation.json";
pub const WEIGHTS_FILE: &str = "weights.json";

/// JSON artifact store rooted at the data directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn repo_dir(&self, repo: &str) -> PathBuf {
        self.root.join(repo_dir_name(repo))
    }

    pub fn repo_file(&self, repo: &str, file: &str) -> PathBuf {
        self.repo_dir(repo).join(file)
    }

    pub fn has_metrics(&self, repo: &str) -> bool {
        self.repo_file(repo, METRICS_FILE).is_file()
    }

    /// Refuses non-finite values, which JSON would store as `null`.
    pub fn save_metrics(&self, repo: &str, metrics: &RepoMetrics) -> Result<()> {
        let path = self.repo_file(repo, METRICS_FILE);
        for (login, m) in metrics {
            if let Some((metric, value)) = m.first_non_finite() {
                return Err(PipelineError::malformed(
                    path,
                    format!("{login} has non-finite {metric} = {value}"),
                ));
            }
        }
        write_json_atomic(&path, metrics, true)
    }

    pub fn load_metrics(&self, repo: &str) -> Result<RepoMetrics> {
        read_json(&self.repo_file(repo, METRICS_FILE), "aggregate")
    }

    pub fn save_dataset(&self, dataset: &Dataset) -> Result<()> {
        let (x, y) = dataset.to_xy();
        write_json_atomic(&self.repo_file(&dataset.repo, VECTORS_X_FILE), &x, false)?;
        write_json_atomic(&self.repo_file(&dataset.repo, VECTORS_Y_FILE), &y, false)
    }

    /// Load a repository's vectors; every row must have `width` features.
    pub fn load_dataset(&self, repo: &str, width: usize) -> Result<Dataset> {
        let x_path = self.repo_file(repo, VECTORS_X_FILE);
        let x: Vec<FeatureVector> = read_json(&x_path, "vectorize")?;
        let y: Vec<Label> = read_json(&self.repo_file(repo, VECTORS_Y_FILE), "vectorize")?;
        Dataset::from_xy(repo, x, y, width).map_err(|reason| PipelineError::malformed(x_path, reason))
    }

    pub fn save_translation(&self, translation: &Translation) -> Result<()> {
        write_json_atomic(&self.root.join(TRANSLATION_FILE), translation, true)
    }

    pub fn load_translation(&self) -> Result<Translation> {
        read_json(&self.root.join(TRANSLATION_FILE), "vectorize")
    }

    pub fn save_weights(&self, weights: &WeightMap) -> Result<()> {
        write_json_atomic(&self.root.join(WEIGHTS_FILE), weights, true)
    }

    pub fn load_weights(&self) -> Result<WeightMap> {
        read_json(&self.root.join(WEIGHTS_FILE), "learn")
    }

    pub fn save_scores(&self, repo: &str, scores: &ScoreArtifact) -> Result<()> {
        write_json_atomic(&self.repo_file(repo, SCORES_FILE), scores, true)
    }
}

/// Read a JSON artifact written by `stage`.
pub fn read_json<T: DeserializeOwned>(path: &Path, stage: &'static str) -> Result<T> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::MissingPrerequisite {
                stage,
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(PipelineError::io(path, e)),
    };
    serde_json::from_str(&content).map_err(|e| PipelineError::malformed(path, e.to_string()))
}

/// Serialize to a sibling temp file, then rename over `path`.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T, pretty: bool) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;

    let tmp = NamedTempFile::new_in(dir).map_err(|e| PipelineError::io(dir, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        if pretty {
            serde_json::to_writer_pretty(&mut writer, value)?;
        } else {
            serde_json::to_writer(&mut writer, value)?;
        }
        writer.flush().map_err(|e| PipelineError::io(tmp.path(), e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| PipelineError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| PipelineError::io(path, e.error))?;
    Ok(())
}
