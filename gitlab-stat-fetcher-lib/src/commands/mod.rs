//! Command-line interface and orchestration for gitlab-stat-fetcher
//!
//! This module parses arguments, validates them into a `Config`, and drives the
//! per-project pipeline built from the other modules.
//!
//! # Execution Flow
//!
//! 1. Initialize logging and validate the configuration
//! 2. Load the checkpoint of already fetched projects from the data directory
//! 3. Resolve every input URL to its projects; any failure aborts the run
//! 4. For each project not yet fetched: fetch commits, then merge requests, then
//!    discussion notes, append them to the CSV files, print a summary, and record the
//!    project in the checkpoint
//!
//! Operator-facing progress (banners, saved files, summaries) goes to the [`Host`]
//! output stream. Diagnostics go through `log`.

mod common;
mod config;
mod fetch;
mod host;
mod run;

pub use fetch::{FetchArgs, process_projects};
pub use host::Host;
pub use run::run;
