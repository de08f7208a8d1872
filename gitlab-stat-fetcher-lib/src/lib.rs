#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for gitlab-stat-fetcher
//!
//! This library consolidates all functionality for the gitlab-stat-fetcher tool, which
//! pulls commits, merge requests, and merge request discussions out of a GitLab instance
//! and appends them to CSV files.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface, configuration, and the per-project pipeline
//! - [`gitlab`]: API client, wire types, project resolution, and concurrent page fetching
//! - [`checkpoint`]: Record of projects that were already fully fetched
//! - [`reports`]: CSV output

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

#[cfg(any(debug_assertions, test))]
pub mod checkpoint;
#[cfg(not(any(debug_assertions, test)))]
mod checkpoint;

#[cfg(any(debug_assertions, test))]
pub mod commands;
#[cfg(not(any(debug_assertions, test)))]
mod commands;

#[cfg(any(debug_assertions, test))]
pub mod gitlab;
#[cfg(not(any(debug_assertions, test)))]
mod gitlab;

#[cfg(any(debug_assertions, test))]
pub mod reports;
#[cfg(not(any(debug_assertions, test)))]
mod reports;

pub use crate::commands::{Host, run};
