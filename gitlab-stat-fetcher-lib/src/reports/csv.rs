use crate::Result;
use crate::gitlab::{Commit, MergeRequest, Note};
use camino::Utf8Path;
use chrono::{DateTime, FixedOffset, SecondsFormat};
use ohno::IntoAppError;
use std::borrow::Cow;
use std::fs::OpenOptions;

pub const COMMITS_FILE_NAME: &str = "commits.csv";
pub const MERGE_REQUESTS_FILE_NAME: &str = "merge_requests.csv";
pub const NOTES_FILE_NAME: &str = "notes.csv";

/// A record that maps to one row of a fixed-layout CSV file.
pub trait CsvRecord {
    const HEADER: &'static [&'static str];

    fn row(&self) -> Vec<Cow<'_, str>>;
}

impl CsvRecord for Commit {
    const HEADER: &'static [&'static str] = &[
        "project_id",
        "id",
        "author_name",
        "author_email",
        "date",
        "message",
        "additions",
        "deletions",
        "total",
    ];

    fn row(&self) -> Vec<Cow<'_, str>> {
        vec![
            self.project_id.to_string().into(),
            self.id.as_str().into(),
            self.author_name.as_str().into(),
            self.author_email.as_str().into(),
            format_date(self.committed_date).into(),
            single_line(&self.message),
            self.stats.additions.to_string().into(),
            self.stats.deletions.to_string().into(),
            self.stats.total.to_string().into(),
        ]
    }
}

impl CsvRecord for MergeRequest {
    const HEADER: &'static [&'static str] = &[
        "project_id",
        "mr_id",
        "title",
        "state",
        "author_username",
        "author_name",
        "created_at",
        "merged_at",
        "source_branch",
        "target_branch",
        "sha",
        "merge_commit_sha",
        "squash_commit_sha",
    ];

    fn row(&self) -> Vec<Cow<'_, str>> {
        let (username, name) = self.author.as_ref().map_or(("", ""), |a| (a.username.as_str(), a.name.as_str()));

        vec![
            self.project_id.to_string().into(),
            self.id.to_string().into(),
            self.title.as_str().into(),
            self.state.as_str().into(),
            username.into(),
            name.into(),
            format_date(self.created_at).into(),
            format_date(self.merged_at).into(),
            self.source_branch.as_str().into(),
            self.target_branch.as_str().into(),
            self.sha.as_deref().unwrap_or_default().into(),
            self.merge_commit_sha.as_deref().unwrap_or_default().into(),
            self.squash_commit_sha.as_deref().unwrap_or_default().into(),
        ]
    }
}

impl CsvRecord for Note {
    const HEADER: &'static [&'static str] = &[
        "project_id",
        "note_id",
        "author_name",
        "author_username",
        "created_at",
        "updated_at",
        "body",
        "system",
    ];

    fn row(&self) -> Vec<Cow<'_, str>> {
        let (name, username) = self.author.as_ref().map_or(("", ""), |a| (a.name.as_str(), a.username.as_str()));

        vec![
            self.project_id.to_string().into(),
            self.id.to_string().into(),
            name.into(),
            username.into(),
            format_date(self.created_at).into(),
            format_date(self.updated_at).into(),
            single_line(&self.body),
            self.system.to_string().into(),
        ]
    }
}

/// Append `records` to the CSV file at `path`, creating it if needed.
///
/// The header is written only if the file is empty when opened.
pub fn append<R: CsvRecord>(path: &Utf8Path, records: &[R]) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .into_app_err_with(|| format!("opening '{path}'"))?;

    let is_empty = file.metadata().into_app_err_with(|| format!("inspecting '{path}'"))?.len() == 0;

    let mut writer = ::csv::Writer::from_writer(file);
    if is_empty {
        writer.write_record(R::HEADER).into_app_err_with(|| format!("writing header to '{path}'"))?;
    }

    for record in records {
        writer
            .write_record(record.row().iter().map(AsRef::<str>::as_ref))
            .into_app_err_with(|| format!("writing to '{path}'"))?;
    }

    writer.flush().into_app_err_with(|| format!("flushing '{path}'"))?;
    Ok(())
}

/// Replace line breaks so that each record stays on one physical line.
///
/// A `\r\n` pair becomes a single space, as does any lone `\r` or `\n`.
fn single_line(s: &str) -> Cow<'_, str> {
    if s.contains(['\n', '\r']) {
        Cow::Owned(s.replace("\r\n", " ").replace(['\n', '\r'], " "))
    } else {
        Cow::Borrowed(s)
    }
}

fn format_date(date: Option<DateTime<FixedOffset>>) -> String {
    date.map(|d| d.to_rfc3339_opts(SecondsFormat::Secs, true)).unwrap_or_default()
}
