//! GitLab API payloads
//!
//! Only the fields that end up in the exported CSV files are modeled. Unknown fields are
//! ignored, and fields GitLab sends as `null` for some records are optional.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

/// A project as returned by the projects and group projects endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Project {
    pub id: u64,
    pub path_with_namespace: String,
}

/// A group or subgroup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Group {
    pub id: u64,
    #[serde(default)]
    pub full_path: String,
}

/// Author block embedded in merge requests and notes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct CommitStats {
    #[serde(default)]
    pub additions: i64,
    #[serde(default)]
    pub deletions: i64,
    #[serde(default)]
    pub total: i64,
}

/// A repository commit, requested with `with_stats=true`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Commit {
    /// Not part of the commit payload; stamped by the fetcher.
    #[serde(default)]
    pub project_id: u64,
    pub id: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub author_email: String,
    pub committed_date: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub stats: CommitStats,
}

/// A merge request from the project merge request listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MergeRequest {
    #[serde(default)]
    pub project_id: u64,
    pub id: u64,
    pub iid: u64,
    #[serde(default)]
    pub title: String,
    /// `opened`, `closed`, `merged` or `locked`; passed through as-is.
    #[serde(default)]
    pub state: String,
    pub author: Option<Author>,
    pub created_at: Option<DateTime<FixedOffset>>,
    pub merged_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub source_branch: String,
    #[serde(default)]
    pub target_branch: String,
    pub sha: Option<String>,
    pub merge_commit_sha: Option<String>,
    pub squash_commit_sha: Option<String>,
}

/// A single comment inside a merge request discussion.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Note {
    #[serde(default)]
    pub project_id: u64,
    pub id: u64,
    pub author: Option<Author>,
    pub created_at: Option<DateTime<FixedOffset>>,
    pub updated_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub body: String,
    /// Set for notes GitLab generates itself, such as "changed the description".
    #[serde(default)]
    pub system: bool,
}

/// A merge request discussion thread.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Discussion {
    #[serde(default)]
    pub notes: Vec<Note>,
}
