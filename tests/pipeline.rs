//! End-to-end pipeline runs over dumps written to a temp directory.

use std::fs;
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tempfile::TempDir;

use lookalike::cache::{METRICS_FILE, SCORES_FILE, TRANSLATION_FILE, VECTORS_X_FILE, VECTORS_Y_FILE, WEIGHTS_FILE};
use lookalike::{AggregateStatus, Config, DumpSource, Metric, Pipeline, PipelineError};

const CONFIG: &str = r#"
reference = "me"
repos = ["acme/tool", "acme/lib"]
seed = 11
"#;

fn issue(login: &str, state: &str, title: &str, body: &str) -> String {
    format!(
        r#"{{"author_login":"{login}","state":"{state}","comment_count":2,"label_count":1,"title_text":"{title}","body_text":"{body}"}}"#
    )
}

fn commit(login: &str, message: &str, additions: u64, patch: &str) -> String {
    format!(
        r#"{{"author_login":"{login}","additions":{additions},"deletions":1,"total_changes":{},"changed_file_count":1,"message_text":"{message}","per_file_patch_texts":["{patch}"]}}"#,
        additions + 1
    )
}

fn write_dump(root: &Path, dir: &str, issues: &[String], commits: &[String]) {
    let repo_dir = root.join(dir);
    fs::create_dir_all(&repo_dir).unwrap();
    fs::write(repo_dir.join("issues.json"), format!("[{}]", issues.join(","))).unwrap();
    fs::write(repo_dir.join("commits.json"), format!("[{}]", commits.join(","))).unwrap();
}

/// "me" matches or out-does every other contributor on every metric, so
/// any non-negative weighting scores "me" highest.
fn setup() -> (TempDir, Pipeline<DumpSource>) {
    let dir = TempDir::new().unwrap();
    write_dump(
        dir.path(),
        "acme_tool",
        &[
            issue("me", "closed", "crash on start up", "stack trace attached here"),
            issue("me", "closed", "add flag for output path", "would help scripting a lot"),
            issue("me", "closed", "docs typo in readme", "see second paragraph please"),
            issue("bob", "closed", "help", "why"),
        ],
        &[
            commit("me", "fix crash on start up when config missing", 20, "+ fn load() {}"),
            commit("me", "add output flag", 12, "+ let out = path;"),
            commit("carol", "wip", 2, "+ x"),
        ],
    );
    write_dump(
        dir.path(),
        "acme_lib",
        &[
            issue("me", "closed", "panic in parser on empty input", "minimal repro below"),
            issue("me", "closed", "expose tokenizer publicly", "needed by downstream tools"),
            issue("dave", "closed", "question", "how"),
        ],
        &[
            commit("me", "handle empty input in parser", 30, "+ if input.is_empty() { return; }"),
            commit("dave", "typo", 1, "+ a"),
        ],
    );

    let mut config = Config::parse(CONFIG).unwrap();
    config.data_dir = dir.path().to_path_buf();
    let source = DumpSource::new(dir.path());
    (dir, Pipeline::new(config, source))
}

#[test]
fn test_full_run_writes_every_artifact() {
    let (dir, pipeline) = setup();

    let outcomes = pipeline.aggregate(false).unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| matches!(o.status, AggregateStatus::Aggregated { .. })));

    let datasets = pipeline.vectorize().unwrap();
    // acme/tool: bob and carol; acme/lib: dave. Two examples per other login.
    let sizes: Vec<usize> = datasets.iter().map(|d| d.len()).collect();
    assert_eq!(sizes, vec![4, 2]);

    let mut rng = StdRng::seed_from_u64(5);
    let report = pipeline.learn_with(&mut rng).unwrap();
    assert_eq!(report.weights.iter().count(), Metric::ALL.len());
    assert!(report.weights.iter().all(|(_, w)| w >= 0.0), "sparse-positive weights must be >= 0");
    assert!(report.weights.iter().any(|(_, w)| w > 0.0), "expected at least one active metric");

    let scores = pipeline.score().unwrap();
    assert_eq!(scores.len(), 2);
    for repo in &scores {
        let me = repo.table.entries.iter().find(|e| e.login == "me").unwrap();
        for other in repo.table.entries.iter().filter(|e| e.login != "me") {
            assert!(me.score >= other.score, "{} outscored me in {}", other.login, repo.repo);
        }
    }

    for file in [METRICS_FILE, VECTORS_X_FILE, VECTORS_Y_FILE, SCORES_FILE] {
        assert!(dir.path().join("acme_tool").join(file).is_file(), "missing {file}");
        assert!(dir.path().join("acme_lib").join(file).is_file(), "missing {file}");
    }
    assert!(dir.path().join(TRANSLATION_FILE).is_file());
    assert!(dir.path().join(WEIGHTS_FILE).is_file());
}

#[test]
fn test_aggregate_uses_cache_unless_refresh() {
    let (_dir, pipeline) = setup();
    pipeline.aggregate(false).unwrap();

    let cached = pipeline.aggregate(false).unwrap();
    assert!(cached.iter().all(|o| o.status == AggregateStatus::Cached));

    let refreshed = pipeline.aggregate(true).unwrap();
    assert!(refreshed.iter().all(|o| o.status != AggregateStatus::Cached));
}

#[test]
fn test_stages_require_prerequisites() {
    let (_dir, pipeline) = setup();

    let err = pipeline.vectorize().unwrap_err();
    assert!(matches!(err, PipelineError::MissingPrerequisite { stage: "aggregate", .. }), "got {err}");

    pipeline.aggregate(false).unwrap();
    let err = pipeline.learn().unwrap_err();
    assert!(matches!(err, PipelineError::MissingPrerequisite { stage: "vectorize", .. }), "got {err}");

    let err = pipeline.score().unwrap_err();
    assert!(matches!(err, PipelineError::MissingPrerequisite { stage: "learn", .. }), "got {err}");
}

#[test]
fn test_reference_missing_from_repo_is_fatal() {
    let (dir, _) = setup();
    let mut config = Config::parse(
        r#"
        reference = "nobody"
        repos = ["acme/tool"]
        "#,
    )
    .unwrap();
    config.data_dir = dir.path().to_path_buf();
    let pipeline = Pipeline::new(config, DumpSource::new(dir.path()));

    pipeline.aggregate(false).unwrap();
    let err = pipeline.vectorize().unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)), "got {err}");
}

#[test]
fn test_missing_dump_names_fetch_stage() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::parse(CONFIG).unwrap();
    config.data_dir = dir.path().to_path_buf();
    let pipeline = Pipeline::new(config, DumpSource::new(dir.path()));

    let err = pipeline.aggregate(false).unwrap_err();
    assert!(matches!(err, PipelineError::MissingPrerequisite { stage: "fetch", .. }), "got {err}");
}
