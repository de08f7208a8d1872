use super::client::Client;
use super::pager::{fetch_all_indexed, fetch_all_pages};
use super::types::{Commit, Discussion, MergeRequest, Note};
use chrono::{DateTime, SecondsFormat, Utc};
use core::num::NonZeroUsize;
use std::time::Instant;

const LOG_TARGET: &str = "    gitlab";

/// Page size for every paginated request (GitLab's maximum).
pub const PAGE_SIZE: u32 = 100;

/// Fetches the per-project resources, one concurrent phase per resource kind.
#[derive(Debug, Clone)]
pub struct Provider {
    client: Client,
    workers: NonZeroUsize,
    since: DateTime<Utc>,
}

impl Provider {
    /// `since` bounds commits by commit date and merge requests by creation date.
    #[must_use]
    pub const fn new(client: Client, workers: NonZeroUsize, since: DateTime<Utc>) -> Self {
        Self { client, workers, since }
    }

    pub async fn fetch_commits(&self, project_id: u64) -> Vec<Commit> {
        log::info!(target: LOG_TARGET, "Fetching commits...");
        let start = Instant::now();

        let client = self.client.clone();
        let since = format_since(self.since);
        let commits = fetch_all_pages("commits", self.workers, move |page| {
            let client = client.clone();
            let query = [
                ("with_stats", "true".to_string()),
                ("per_page", PAGE_SIZE.to_string()),
                ("page", page.to_string()),
                ("since", since.clone()),
            ];
            async move {
                let endpoint = format!("projects/{project_id}/repository/commits");
                let (commits, _) = client
                    .get_json::<Vec<Commit>>(&endpoint, &query)
                    .await
                    .into_result("commits")?;
                Ok::<_, ohno::AppError>(commits.into_iter().map(|c| Commit { project_id, ..c }).collect::<Vec<_>>())
            }
        })
        .await;

        log::info!(target: LOG_TARGET, "Fetched {} commits in {:.2?}", commits.len(), start.elapsed());
        commits
    }

    pub async fn fetch_merge_requests(&self, project_id: u64) -> Vec<MergeRequest> {
        log::info!(target: LOG_TARGET, "Fetching merge requests...");
        let start = Instant::now();

        let client = self.client.clone();
        let since = format_since(self.since);
        let merge_requests = fetch_all_pages("merge requests", self.workers, move |page| {
            let client = client.clone();
            let query = [
                ("state", "all".to_string()),
                ("per_page", PAGE_SIZE.to_string()),
                ("page", page.to_string()),
                ("created_after", since.clone()),
            ];
            async move {
                let endpoint = format!("projects/{project_id}/merge_requests");
                let (mrs, _) = client
                    .get_json::<Vec<MergeRequest>>(&endpoint, &query)
                    .await
                    .into_result("merge requests")?;
                Ok::<_, ohno::AppError>(mrs.into_iter().map(|mr| MergeRequest { project_id, ..mr }).collect::<Vec<_>>())
            }
        })
        .await;

        log::info!(target: LOG_TARGET, "Fetched {} MRs in {:.2?}", merge_requests.len(), start.elapsed());
        merge_requests
    }

    /// Fetch the notes of every discussion on the given merge requests (by `iid`).
    ///
    /// One request is made per merge request.
    pub async fn fetch_discussion_notes(&self, project_id: u64, mr_iids: Vec<u64>) -> Vec<Note> {
        log::info!(target: LOG_TARGET, "Fetching discussions...");
        let start = Instant::now();

        let client = self.client.clone();
        let notes = fetch_all_indexed("MRs", self.workers, mr_iids, move |mr_iid| {
            let client = client.clone();
            async move {
                let endpoint = format!("projects/{project_id}/merge_requests/{mr_iid}/discussions");
                let query = [("per_page", PAGE_SIZE.to_string())];
                let (discussions, _) = client
                    .get_json::<Vec<Discussion>>(&endpoint, &query)
                    .await
                    .into_result("discussions")?;
                let notes: Vec<Note> = discussions
                    .into_iter()
                    .flat_map(|d| d.notes)
                    .map(|note| Note { project_id, ..note })
                    .collect();
                Ok::<_, ohno::AppError>(notes)
            }
        })
        .await;

        log::info!(target: LOG_TARGET, "Fetched {} notes in {:.2?}", notes.len(), start.elapsed());
        notes
    }
}

fn format_since(since: DateTime<Utc>) -> String {
    since.to_rfc3339_opts(SecondsFormat::Secs, true)
}
