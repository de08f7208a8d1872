//! CSV export of fetched records
//!
//! Each resource kind goes to its own file in the data directory. Files are opened in
//! append mode so that runs over several projects, or several invocations, accumulate
//! into one table per kind. The header row is written only when the file is empty.

mod csv;

pub use self::csv::{COMMITS_FILE_NAME, CsvRecord, MERGE_REQUESTS_FILE_NAME, NOTES_FILE_NAME, append};
