//! Record of projects that were already fetched completely.
//!
//! The checkpoint is a plain text file in the data directory with one `<id> <path>` line
//! per project. Lines are only ever appended, and only after all of a project's CSV files
//! have been written, so a run that dies midway leaves the project to be fetched again.

use crate::Result;
use camino::{Utf8Path, Utf8PathBuf};
use ohno::IntoAppError;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};

const LOG_TARGET: &str = "checkpoint";

/// Name of the checkpoint file inside the data directory.
pub const CHECKPOINT_FILE_NAME: &str = ".fetched_projects";

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: Utf8PathBuf,
}

impl CheckpointStore {
    #[must_use]
    pub fn new(data_dir: &Utf8Path) -> Self {
        Self {
            path: data_dir.join(CHECKPOINT_FILE_NAME),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Read the ids of all fetched projects.
    ///
    /// A missing or unreadable file yields an empty set. Lines whose first field is not
    /// an integer are skipped.
    #[must_use]
    pub fn load(&self) -> HashSet<u64> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return HashSet::new(),
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not read checkpoint file '{}': {e}", self.path);
                return HashSet::new();
            }
        };

        let mut ids = HashSet::new();
        for (index, line) in content.lines().enumerate() {
            let Some(first) = line.split_whitespace().next() else {
                continue;
            };

            match first.parse::<u64>() {
                Ok(id) => {
                    let _ = ids.insert(id);
                }
                Err(_) => {
                    log::warn!(target: LOG_TARGET, "Ignoring malformed line {} in '{}': '{line}'", index + 1, self.path);
                }
            }
        }

        ids
    }

    /// Append a line recording `project_id` as fetched.
    ///
    /// Recording the same project twice is harmless.
    pub fn mark_fetched(&self, project_id: u64, project_path: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .into_app_err_with(|| format!("opening checkpoint file '{}'", self.path))?;

        writeln!(file, "{project_id} {project_path}").into_app_err_with(|| format!("writing checkpoint file '{}'", self.path))?;
        Ok(())
    }
}
