//! Folds raw issue and commit records into one metrics map per login.
//!
//! ## Vocabulary scopes
//!
//! Two vocabulary measures are kept side by side:
//!
//! | Scope  | Field                   | Counts a word ...                    |
//! |--------|-------------------------|--------------------------------------|
//! | Corpus | `body_vocab`, ...       | once across all of a login's items   |
//! | Item   | `body_vocab_filescope`  | once per item it appears in          |
//!
//! Corpus scope needs the actual word sets while folding. They live in the
//! per-login [`Bucket`] and are collapsed to their sizes in [`Aggregator::finish`];
//! nothing downstream ever sees a set.
//!
//! Words are maximal runs of non-whitespace, compared exactly.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use super::schema::{COMMIT_AVERAGES, ContributorMetrics, ISSUE_AVERAGES, Metric, saturate};
use crate::types::{CommitRecord, IssueRecord, IssueState};

/// Aggregated metrics of one repository, keyed by login.
pub type RepoMetrics = BTreeMap<String, ContributorMetrics>;

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Distinct words of a text.
pub fn vocabulary(text: &str) -> HashSet<&str> {
    text.split_whitespace().collect()
}

/// Per-login accumulator, alive only while folding.
#[derive(Debug, Default)]
struct Bucket {
    metrics: ContributorMetrics,
    body_vocab: HashSet<String>,
    title_vocab: HashSet<String>,
    msg_vocab: HashSet<String>,
    patch_vocab: HashSet<String>,
}

impl Bucket {
    fn fold_issue(&mut self, issue: &IssueRecord) {
        let m = &mut self.metrics;
        m.add(Metric::NumIssues, 1.0);
        match issue.state {
            IssueState::Open => m.add(Metric::Open, 1.0),
            IssueState::Closed => m.add(Metric::Closed, 1.0),
        }
        m.add(Metric::NumComments, issue.comment_count as f64);
        m.add(Metric::NumLabels, issue.label_count as f64);

        let body = issue.body_text.as_deref().unwrap_or("");
        let title = issue.title_text.as_str();
        m.add(Metric::Wordcount, word_count(body) as f64);
        m.add(Metric::TitleWordcount, word_count(title) as f64);

        let body_words = vocabulary(body);
        let title_words = vocabulary(title);
        let item_total = body_words.union(&title_words).count();
        m.add(Metric::BodyVocabFilescope, body_words.len() as f64);
        m.add(Metric::TitleVocabFilescope, title_words.len() as f64);
        m.add(Metric::TotalVocabFilescope, item_total as f64);

        self.body_vocab.extend(body_words.into_iter().map(str::to_owned));
        self.title_vocab.extend(title_words.into_iter().map(str::to_owned));
    }

    fn fold_commit(&mut self, commit: &CommitRecord) {
        let m = &mut self.metrics;
        m.add(Metric::NumCommits, 1.0);
        m.add(Metric::LocAdditions, commit.additions as f64);
        m.add(Metric::LocDeletions, commit.deletions as f64);
        m.add(Metric::LocChanges, commit.additions as f64 + commit.deletions as f64);
        m.add(Metric::NumFiles, commit.changed_file_count as f64);

        let changes = commit.total_changes as f64;
        let files = commit.changed_file_count as f64;
        m.add(Metric::LocTimesFiles, changes * files);
        m.add(Metric::LocPowFiles, pow_saturating(changes, files));

        let message = commit.message_text.as_str();
        let msg_words = vocabulary(message);
        m.add(Metric::MsgWordcount, word_count(message) as f64);
        m.add(Metric::MsgVocabFilescope, msg_words.len() as f64);
        self.msg_vocab.extend(msg_words.into_iter().map(str::to_owned));

        // Binary files carry no patch text and contribute nothing.
        for patch in commit.per_file_patch_texts.iter().flatten() {
            let patch_words = vocabulary(patch);
            m.add(Metric::PatchWordcount, word_count(patch) as f64);
            m.add(Metric::PatchVocabFilescope, patch_words.len() as f64);
            self.patch_vocab.extend(patch_words.into_iter().map(str::to_owned));
        }
    }

    /// Collapse word sets to counts and fill in averages.
    fn finish(self) -> ContributorMetrics {
        let mut m = self.metrics;

        let total_vocab = self.body_vocab.len() + self.title_vocab.difference(&self.body_vocab).count();
        m.set(Metric::BodyVocab, self.body_vocab.len() as f64);
        m.set(Metric::TitleVocab, self.title_vocab.len() as f64);
        m.set(Metric::TotalVocab, total_vocab as f64);
        m.set(Metric::MsgVocab, self.msg_vocab.len() as f64);
        m.set(Metric::PatchVocab, self.patch_vocab.len() as f64);

        fill_averages(&mut m, Metric::NumIssues, ISSUE_AVERAGES);
        fill_averages(&mut m, Metric::NumCommits, COMMIT_AVERAGES);
        m
    }
}

/// `base^exp`, pinned to `f64::MAX` instead of overflowing to infinity.
///
/// Large commits touching many files blow past f64 range quickly. Sums of
/// pinned values stay pinned through `MetricMap::add`.
fn pow_saturating(base: f64, exp: f64) -> f64 {
    saturate(base.powf(exp))
}

/// Averages stay 0 when the denominator is 0.
fn fill_averages(m: &mut ContributorMetrics, denominator: Metric, pairs: &[(Metric, Metric)]) {
    let n = m.get(denominator);
    if n == 0.0 {
        return;
    }
    for &(avg, numerator) in pairs {
        m.set(avg, saturate(m.get(numerator) / n));
    }
}

/// Result of folding one repository.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub metrics: RepoMetrics,
    /// Commits whose author could not be resolved to a login.
    pub skipped_commits: usize,
}

/// Sequential fold over one repository's records.
#[derive(Debug, Default)]
pub struct Aggregator {
    buckets: HashMap<String, Bucket>,
    skipped_commits: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold_issue(&mut self, issue: &IssueRecord) {
        self.buckets
            .entry(issue.author_login.clone())
            .or_default()
            .fold_issue(issue);
    }

    /// Commits without an author are counted and otherwise ignored.
    pub fn fold_commit(&mut self, commit: &CommitRecord) {
        match commit.author_login.as_deref() {
            Some(login) if !login.is_empty() => {
                self.buckets.entry(login.to_string()).or_default().fold_commit(commit);
            }
            _ => {
                debug!(commit_message = %commit.message_text, "skipping commit without resolvable author");
                self.skipped_commits += 1;
            }
        }
    }

    pub fn finish(self) -> Aggregation {
        let metrics = self
            .buckets
            .into_iter()
            .map(|(login, bucket)| (login, bucket.finish()))
            .collect();
        Aggregation {
            metrics,
            skipped_commits: self.skipped_commits,
        }
    }
}

/// Fold a whole repository in one call.
pub fn aggregate(issues: &[IssueRecord], commits: &[CommitRecord]) -> Aggregation {
    let mut aggregator = Aggregator::new();
    for issue in issues {
        aggregator.fold_issue(issue);
    }
    for commit in commits {
        aggregator.fold_commit(commit);
    }
    aggregator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(login: &str, state: IssueState, title: &str, body: Option<&str>) -> IssueRecord {
        IssueRecord {
            author_login: login.to_string(),
            state,
            comment_count: 2,
            label_count: 1,
            title_text: title.to_string(),
            body_text: body.map(str::to_string),
        }
    }

    fn commit(login: Option<&str>, adds: u64, dels: u64, files: u64, msg: &str) -> CommitRecord {
        CommitRecord {
            author_login: login.map(str::to_string),
            additions: adds,
            deletions: dels,
            total_changes: adds + dels,
            changed_file_count: files,
            message_text: msg.to_string(),
            per_file_patch_texts: Vec::new(),
        }
    }

    #[test]
    fn test_issue_counts() {
        let issues = vec![
            issue("alice", IssueState::Open, "crash on start", Some("it crashes")),
            issue("alice", IssueState::Closed, "typo", None),
        ];
        let agg = aggregate(&issues, &[]);
        let m = &agg.metrics["alice"];

        assert_eq!(m[Metric::NumIssues], 2.0);
        assert_eq!(m[Metric::Open], 1.0);
        assert_eq!(m[Metric::Closed], 1.0);
        assert_eq!(m[Metric::NumComments], 4.0);
        assert_eq!(m[Metric::NumLabels], 2.0);
        assert_eq!(m[Metric::Wordcount], 2.0);
        assert_eq!(m[Metric::TitleWordcount], 4.0);
        assert!((m[Metric::AvgOpen] - 0.5).abs() < 1e-9);
        assert!((m[Metric::AvgTitleWordcount] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_total_vocab_is_union_not_sum() {
        // "bug" appears in both title and body of the first issue and again
        // in the second issue.
        let issues = vec![
            issue("bob", IssueState::Open, "bug report", Some("bug here")),
            issue("bob", IssueState::Open, "bug", Some("again")),
        ];
        let m = aggregate(&issues, &[]).metrics["bob"];

        // Corpus scope: body {bug, here, again}, title {bug, report}
        assert_eq!(m[Metric::BodyVocab], 3.0);
        assert_eq!(m[Metric::TitleVocab], 2.0);
        assert_eq!(m[Metric::TotalVocab], 4.0, "union is {{bug, here, again, report}}");

        // Item scope: body 2 + 1, title 2 + 1, total 3 + 2
        assert_eq!(m[Metric::BodyVocabFilescope], 3.0);
        assert_eq!(m[Metric::TitleVocabFilescope], 3.0);
        assert_eq!(m[Metric::TotalVocabFilescope], 5.0);
        assert!((m[Metric::AvgTotalVocab] - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_repeated_words_count_once_per_item() {
        let issues = vec![issue("eve", IssueState::Closed, "", Some("ok ok ok"))];
        let m = aggregate(&issues, &[]).metrics["eve"];
        assert_eq!(m[Metric::Wordcount], 3.0);
        assert_eq!(m[Metric::BodyVocab], 1.0);
        assert_eq!(m[Metric::BodyVocabFilescope], 1.0);
    }

    #[test]
    fn test_commit_counts_and_composites() {
        let commits = vec![
            commit(Some("carol"), 3, 1, 2, "fix parser"),
            commit(Some("carol"), 0, 2, 1, "drop dead code"),
        ];
        let m = aggregate(&[], &commits).metrics["carol"];

        assert_eq!(m[Metric::NumCommits], 2.0);
        assert_eq!(m[Metric::LocAdditions], 3.0);
        assert_eq!(m[Metric::LocDeletions], 3.0);
        assert_eq!(m[Metric::LocChanges], 6.0);
        assert_eq!(m[Metric::NumFiles], 3.0);
        // 4*2 + 2*1
        assert_eq!(m[Metric::LocTimesFiles], 10.0);
        // 4^2 + 2^1
        assert_eq!(m[Metric::LocPowFiles], 18.0);
        assert_eq!(m[Metric::MsgWordcount], 5.0);
        assert!((m[Metric::AvgLocChanges] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_pow_saturates() {
        let commits = vec![commit(Some("dave"), 5000, 5000, 500, "vendor everything")];
        let m = aggregate(&[], &commits).metrics["dave"];
        assert_eq!(m[Metric::LocPowFiles], f64::MAX);
        assert!(m[Metric::AvgLocPowFiles].is_finite());
    }

    #[test]
    fn test_pow_sum_stays_finite_across_commits() {
        let commits = vec![
            commit(Some("dave"), 500, 500, 120, "vendor part one"),
            commit(Some("dave"), 500, 500, 120, "vendor part two"),
            commit(Some("dave"), 500, 500, 120, "vendor part three"),
        ];
        let m = aggregate(&[], &commits).metrics["dave"];
        assert_eq!(m[Metric::LocPowFiles], f64::MAX);
        assert!((m[Metric::AvgLocPowFiles] - f64::MAX / 3.0).abs() / f64::MAX < 1e-12);
        assert!(m.first_non_finite().is_none(), "got {:?}", m.first_non_finite());
    }

    #[test]
    fn test_extreme_line_counts_do_not_overflow() {
        let mut c = commit(Some("erin"), 0, 0, 1, "huge");
        c.additions = u64::MAX;
        c.deletions = u64::MAX;
        let m = aggregate(&[], &[c]).metrics["erin"];
        assert!(m[Metric::LocChanges] > 0.0 && m[Metric::LocChanges].is_finite());
    }

    #[test]
    fn test_patch_texts() {
        let mut c = commit(Some("carol"), 2, 0, 3, "add");
        c.per_file_patch_texts = vec![Some("+ a b".into()), None, Some("+ a a".into())];
        let m = aggregate(&[], &[c]).metrics["carol"];

        assert_eq!(m[Metric::PatchWordcount], 6.0);
        assert_eq!(m[Metric::PatchVocab], 3.0, "{{+, a, b}}");
        assert_eq!(m[Metric::PatchVocabFilescope], 5.0, "3 + 2");
    }

    #[test]
    fn test_unresolved_authors_are_skipped() {
        let commits = vec![commit(None, 1, 1, 1, "merge"), commit(Some(""), 1, 0, 1, "x")];
        let agg = aggregate(&[], &commits);
        assert!(agg.metrics.is_empty());
        assert_eq!(agg.skipped_commits, 2);
    }

    #[test]
    fn test_issue_averages_zero_without_issues() {
        let commits = vec![commit(Some("frank"), 10, 0, 1, "init")];
        let m = aggregate(&[], &commits).metrics["frank"];
        for (avg, _) in ISSUE_AVERAGES {
            assert_eq!(m[*avg], 0.0, "{avg} should be 0 without issues");
        }
        assert_eq!(m[Metric::AvgLocAdditions], 10.0);
    }

    #[test]
    fn test_login_in_both_sources_gets_one_vector() {
        let issues = vec![issue("gina", IssueState::Open, "t", Some("b"))];
        let commits = vec![commit(Some("gina"), 1, 0, 1, "m")];
        let agg = aggregate(&issues, &commits);
        assert_eq!(agg.metrics.len(), 1);
        let m = &agg.metrics["gina"];
        assert_eq!(m[Metric::NumIssues], 1.0);
        assert_eq!(m[Metric::NumCommits], 1.0);
    }
}
