//! Stage orchestration: aggregate → vectorize → learn → score.
//!
//! Each stage reads the artifacts of the previous one from the
//! [`ArtifactStore`] and writes its own. Repositories are independent until
//! the learn stage, so aggregation and vectorization run them in parallel.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::cache::ArtifactStore;
use crate::config::Config;
use crate::error::Result;
use crate::metrics::{Translation, aggregate};
use crate::scoring::{ScoreArtifact, ScoreTable, Scorer};
use crate::source::ActivitySource;
use crate::training::{CombinedDataset, Dataset, TrainingReport, WeightLearner, vectorize};

/// What the aggregate stage did for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateStatus {
    /// Metrics were already on disk.
    Cached,
    Aggregated { logins: usize, skipped_commits: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateOutcome {
    pub repo: String,
    pub status: AggregateStatus,
}

/// Ranked scores of one repository.
#[derive(Debug, Clone)]
pub struct RepoScores {
    pub repo: String,
    pub table: ScoreTable,
}

pub struct Pipeline<S> {
    config: Config,
    store: ArtifactStore,
    source: S,
}

impl<S: ActivitySource> Pipeline<S> {
    pub fn new(config: Config, source: S) -> Self {
        let store = ArtifactStore::new(&config.data_dir);
        Self {
            config,
            store,
            source,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Fold every repository's records into metrics.
    ///
    /// Repositories whose metrics already exist are skipped unless `refresh`.
    pub fn aggregate(&self, refresh: bool) -> Result<Vec<AggregateOutcome>> {
        self.config
            .repos
            .par_iter()
            .map(|repo| self.aggregate_repo(repo, refresh))
            .collect()
    }

    fn aggregate_repo(&self, repo: &str, refresh: bool) -> Result<AggregateOutcome> {
        if !refresh && self.store.has_metrics(repo) {
            info!(repo, "metrics cached, skipping aggregation");
            return Ok(AggregateOutcome {
                repo: repo.to_string(),
                status: AggregateStatus::Cached,
            });
        }

        let issues = self.source.fetch_issues(repo)?;
        let commits = self.source.fetch_commits(repo)?;
        info!(repo, issues = issues.len(), commits = commits.len(), "aggregating");

        let aggregation = aggregate(&issues, &commits);
        if aggregation.skipped_commits > 0 {
            warn!(
                repo,
                skipped = aggregation.skipped_commits,
                "commits without a resolvable author were skipped"
            );
        }
        self.store.save_metrics(repo, &aggregation.metrics)?;

        Ok(AggregateOutcome {
            repo: repo.to_string(),
            status: AggregateStatus::Aggregated {
                logins: aggregation.metrics.len(),
                skipped_commits: aggregation.skipped_commits,
            },
        })
    }

    /// Build and persist each repository's labeled vectors plus the translation.
    pub fn vectorize(&self) -> Result<Vec<Dataset>> {
        let translation = Translation::canonical();
        let datasets: Vec<Dataset> = self
            .config
            .repos
            .par_iter()
            .map(|repo| {
                let metrics = self.store.load_metrics(repo)?;
                let dataset = vectorize(repo, &metrics, &translation, &self.config.reference)?;
                self.store.save_dataset(&dataset)?;
                info!(repo = %repo, contributors = metrics.len(), examples = dataset.len(), "vectorized");
                Ok(dataset)
            })
            .collect::<Result<_>>()?;

        self.store.save_translation(&translation)?;
        Ok(datasets)
    }

    /// Combine, balance and train, seeding from the config.
    pub fn learn(&self) -> Result<TrainingReport> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.learn_with(&mut rng)
    }

    /// Like [`learn`](Self::learn) with a caller-supplied random source.
    pub fn learn_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<TrainingReport> {
        let translation = self.store.load_translation()?;

        let mut combined = CombinedDataset::new();
        for repo in &self.config.repos {
            combined.add(self.store.load_dataset(repo, translation.len())?);
        }
        combined.balance(rng);
        info!(
            repos = combined.datasets().len(),
            examples = combined.len(),
            "balanced combined dataset"
        );

        let learner = WeightLearner::new(self.config.learner.clone(), translation);
        let report = learner.train(&combined)?;
        self.store.save_weights(&report.weights)?;
        Ok(report)
    }

    /// Score every login of every repository with the persisted weights.
    pub fn score(&self) -> Result<Vec<RepoScores>> {
        let weights = self.store.load_weights()?;
        let scorer = Scorer::new(
            &weights,
            self.config.scoring.clamp_negative,
            self.config.scoring.display,
        );

        self.config
            .repos
            .iter()
            .map(|repo| {
                let metrics = self.store.load_metrics(repo)?;
                let table = scorer.rank(&metrics);
                self.store.save_scores(repo, &ScoreArtifact::from(&table))?;
                Ok(RepoScores {
                    repo: repo.clone(),
                    table,
                })
            })
            .collect()
    }
}
