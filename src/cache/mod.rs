//! Persistent stage artifacts as atomically written JSON files.
//!
//! Aggregated metrics are computed once per repository and reused on later
//! runs; the other artifacts are overwritten by each run of their stage.

mod store;

pub use store::{
    ArtifactStore, COMMITS_FILE, ISSUES_FILE, METRICS_FILE, SCORES_FILE, TRANSLATION_FILE,
    VECTORS_X_FILE, VECTORS_Y_FILE, WEIGHTS_FILE, read_json, write_json_atomic,
};
