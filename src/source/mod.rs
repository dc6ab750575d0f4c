//! Where issue and commit records come from.
//!
//! Fetching from the hosting API (pagination, auth, rate limits) happens
//! outside this crate. The pipeline only needs something that hands back
//! already-fetched records for a repository, which is what
//! [`ActivitySource`] describes. [`DumpSource`] reads the JSON dumps that
//! a fetcher leaves in the data directory.

use std::path::PathBuf;

use crate::cache::{COMMITS_FILE, ISSUES_FILE, read_json};
use crate::error::Result;
use crate::types::{CommitRecord, IssueRecord, repo_dir_name};

/// Stage name reported when a dump file is missing.
pub const FETCH_STAGE: &str = "fetch";

/// Supplies the raw records of a repository.
///
/// Implementations must report an unmapped commit author as a record with
/// `author_login: None` rather than failing.
pub trait ActivitySource: Send + Sync {
    fn fetch_issues(&self, repo: &str) -> Result<Vec<IssueRecord>>;

    fn fetch_commits(&self, repo: &str) -> Result<Vec<CommitRecord>>;
}

/// Reads `<root>/<owner>_<repo>/{issues,commits}.json`.
#[derive(Debug, Clone)]
pub struct DumpSource {
    root: PathBuf,
}

impl DumpSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, repo: &str, file: &str) -> PathBuf {
        self.root.join(repo_dir_name(repo)).join(file)
    }
}

impl ActivitySource for DumpSource {
    fn fetch_issues(&self, repo: &str) -> Result<Vec<IssueRecord>> {
        read_json(&self.path(repo, ISSUES_FILE), FETCH_STAGE)
    }

    fn fetch_commits(&self, repo: &str) -> Result<Vec<CommitRecord>> {
        read_json(&self.path(repo, COMMITS_FILE), FETCH_STAGE)
    }
}
