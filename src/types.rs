//! Core record types consumed and produced by the pipeline.
//!
//! Records come from an activity source already fetched and are immutable.
//! Anything derived from them (metrics, vectors, weights) lives in the
//! `metrics`, `training` and `scoring` modules.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Issue state as reported by the activity source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

/// One issue, attributed to the login that opened it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub author_login: String,
    pub state: IssueState,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default)]
    pub label_count: u64,
    #[serde(default)]
    pub title_text: String,
    /// Issues may be opened with an empty body; the source reports `null`.
    #[serde(default)]
    pub body_text: Option<String>,
}

/// One commit with its diff statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Absent when the commit author could not be mapped to an account.
    #[serde(default)]
    pub author_login: Option<String>,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub total_changes: u64,
    #[serde(default)]
    pub changed_file_count: u64,
    #[serde(default)]
    pub message_text: String,
    /// One entry per changed file; `None` for files without a textual diff.
    #[serde(default)]
    pub per_file_patch_texts: Vec<Option<String>>,
}

/// Ordered feature values, one per metric in schema order.
pub type FeatureVector = Vec<f64>;

/// Binary class of a training example.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    /// Some other contributor.
    Other = 0,
    /// Behaves like the reference contributor.
    Reference = 1,
}

impl Label {
    pub fn value(self) -> f64 {
        self as u8 as f64
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Label::Other),
            1 => Some(Label::Reference),
            _ => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

impl Serialize for Label {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = u8::deserialize(deserializer)?;
        Label::from_u8(v)
            .ok_or_else(|| serde::de::Error::custom(format!("label must be 0 or 1, got {v}")))
    }
}

/// A feature vector with its class.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledExample {
    pub features: FeatureVector,
    pub label: Label,
}

impl LabeledExample {
    pub fn new(features: FeatureVector, label: Label) -> Self {
        Self { features, label }
    }
}

/// `owner/name` → directory-safe `owner_name`.
pub fn repo_dir_name(repo: &str) -> String {
    repo.replace('/', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_null_body() {
        let json = r#"{"author_login":"alice","state":"closed","comment_count":2,
            "label_count":1,"title_text":"crash on start","body_text":null}"#;
        let issue: IssueRecord = serde_json::from_str(json).unwrap();
        assert_eq!(issue.state, IssueState::Closed);
        assert!(issue.body_text.is_none());
    }

    #[test]
    fn test_commit_without_author() {
        let json = r#"{"additions":3,"deletions":1,"total_changes":4,"changed_file_count":1,
            "message_text":"fix","per_file_patch_texts":[null,"+a"]}"#;
        let commit: CommitRecord = serde_json::from_str(json).unwrap();
        assert!(commit.author_login.is_none());
        assert_eq!(commit.per_file_patch_texts.len(), 2);
    }

    #[test]
    fn test_label_rejects_other_values() {
        assert_eq!(serde_json::from_str::<Label>("1").unwrap(), Label::Reference);
        assert!(serde_json::from_str::<Label>("2").is_err());
    }

    #[test]
    fn test_repo_dir_name() {
        assert_eq!(repo_dir_name("rust-lang/cargo"), "rust-lang_cargo");
    }
}
