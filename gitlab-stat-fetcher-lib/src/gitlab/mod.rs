//! Access to the GitLab REST API
//!
//! # Implementation Model
//!
//! - `client`: authenticated HTTP access to `/api/v4`, with responses classified as
//!   success, not found, or failed
//! - `resolver`: turns project and group URLs into concrete projects
//! - `pager`: bounded worker pool that walks paginated listings until the first empty page
//! - `provider`: the per-project fetch phases built on the pager (commits, merge requests,
//!   discussion notes)
//! - `types`: the subset of the API payloads that gets exported
//!
//! Page workers share an atomic page counter. The first worker to see an empty page marks
//! the resource as exhausted, after which no worker claims new pages. Page failures are
//! logged and treated as empty pages, so a flaky page ends the walk early instead of
//! failing the project.

mod client;
mod pager;
mod provider;
mod resolver;
mod types;

pub use client::Client;
pub use provider::Provider;
pub use resolver::{extract_path, resolve_projects};
pub use types::{Commit, MergeRequest, Note, Project};

#[cfg(test)]
pub use types::{Author, CommitStats};
