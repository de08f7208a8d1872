use super::Host;
use super::common::{LogLevel, init_logging};
use super::config::Config;
use crate::Result;
use crate::checkpoint::CheckpointStore;
use crate::gitlab::{Client, Project, Provider, extract_path, resolve_projects};
use crate::reports::{COMMITS_FILE_NAME, CsvRecord, MERGE_REQUESTS_FILE_NAME, NOTES_FILE_NAME, append};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use clap::Args;
use core::time::Duration;
use ohno::{EnrichableExt, IntoAppError, bail};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::time::Instant;

const LOG_TARGET: &str = "     fetch";

/// Per-project duration the fetch is expected to stay under.
const TARGET_DURATION: Duration = Duration::from_secs(5 * 60);

const BANNER_WIDTH: usize = 80;
const SUMMARY_WIDTH: usize = 60;

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Project or group URLs to fetch (groups include their direct subgroups)
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,

    /// Base URL of the GitLab instance
    #[arg(long, value_name = "URL", env = "GITLAB_URL")]
    pub gitlab_url: Option<String>,

    /// GitLab personal access token
    #[arg(long, value_name = "TOKEN", env = "GITLAB_TOKEN", hide_env_values = true)]
    pub gitlab_token: Option<String>,

    /// Directory receiving the CSV files and the checkpoint file
    #[arg(long, value_name = "PATH", env = "DATA_FOLDER")]
    pub data_folder: Option<Utf8PathBuf>,

    /// Number of concurrent requests per fetch phase
    #[arg(long, value_name = "COUNT", env = "GITLAB_WORKERS", default_value_t = 1)]
    pub workers: usize,

    /// Only fetch commits and merge requests created on or after this date (YYYY-MM-DD).
    /// Defaults to 24 months ago.
    #[arg(long, value_name = "DATE", env = "SINCE_DATE")]
    pub since_date: Option<String>,

    /// Skip fetching merge request discussions
    #[arg(long)]
    pub skip_discussions: bool,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ProjectSummary {
    elapsed: Duration,
    commits: usize,
    merge_requests: usize,
    notes: usize,
}

pub async fn process_projects<H: Host>(host: &mut H, args: &FetchArgs) -> Result<()> {
    init_logging(args.log_level);

    let config = Config::from_args(args, Utc::now())?;
    log::info!(target: LOG_TARGET, "Fetching data since: {}", config.since.format("%Y-%m-%d"));
    log::debug!(target: LOG_TARGET, "Configuration: {config:?}");

    fs::create_dir_all(&config.data_dir).into_app_err_with(|| format!("creating data directory '{}'", config.data_dir))?;

    let checkpoint = CheckpointStore::new(&config.data_dir);
    let fetched = checkpoint.load();
    log::debug!(target: LOG_TARGET, "Checkpoint file: {}", checkpoint.path());
    log::info!(target: LOG_TARGET, "Found {} already fetched projects", fetched.len());

    if args.urls.is_empty() {
        bail!("at least one project or group URL is required");
    }

    let client = Client::new(&config.base_url, &config.token)?;
    log::debug!(target: LOG_TARGET, "Using GitLab API at {}", client.api_url());
    let projects = resolve_all(&client, &config, &args.urls).await?;

    let mut seen = HashSet::new();
    let to_fetch: Vec<Project> = projects
        .into_iter()
        .filter(|p| !fetched.contains(&p.id) && seen.insert(p.id))
        .collect();
    log::info!(target: LOG_TARGET, "{} project(s) to fetch", to_fetch.len());

    let provider = Provider::new(client, config.workers, config.since);
    for project in &to_fetch {
        print_banner(host, &format!("Fetching: {} (ID: {})", project.path_with_namespace, project.id));

        let summary = fetch_project(host, &provider, &config, project.id).await;
        print_summary(host, &summary);

        if let Err(e) = checkpoint.mark_fetched(project.id, &project.path_with_namespace) {
            log::error!(target: LOG_TARGET, "Could not record project {} as fetched: {e:#}", project.id);
            let _ = writeln!(host.error(), "Could not record project {} as fetched: {e:#}", project.id);
        }
    }

    print_banner(host, "ALL PROJECTS COMPLETED!");
    Ok(())
}

/// Resolve every input URL, failing on the first one that cannot be resolved.
async fn resolve_all(client: &Client, config: &Config, urls: &[String]) -> Result<Vec<Project>> {
    let mut projects = Vec::new();

    for url in urls {
        let path = extract_path(url, &config.base_url).map_err(|e| e.enrich_with(|| format!("resolving '{url}'")))?;
        let resolved = resolve_projects(client, &path)
            .await
            .map_err(|e| e.enrich_with(|| format!("resolving '{url}'")))?;
        projects.extend(resolved);
    }

    Ok(projects)
}

async fn fetch_project<H: Host>(host: &mut H, provider: &Provider, config: &Config, project_id: u64) -> ProjectSummary {
    let start = Instant::now();

    let commits = provider.fetch_commits(project_id).await;
    let merge_requests = provider.fetch_merge_requests(project_id).await;

    let notes = if config.skip_discussions {
        log::info!(target: LOG_TARGET, "Skipping discussions (--skip-discussions flag set)");
        Vec::new()
    } else {
        let iids = merge_requests.iter().map(|mr| mr.iid).collect();
        provider.fetch_discussion_notes(project_id, iids).await
    };

    log::info!(target: LOG_TARGET, "Writing output files...");
    save(host, &config.data_dir.join(COMMITS_FILE_NAME), &commits);
    save(host, &config.data_dir.join(MERGE_REQUESTS_FILE_NAME), &merge_requests);
    if !notes.is_empty() {
        save(host, &config.data_dir.join(NOTES_FILE_NAME), &notes);
    }

    ProjectSummary {
        elapsed: start.elapsed(),
        commits: commits.len(),
        merge_requests: merge_requests.len(),
        notes: notes.len(),
    }
}

/// Append records to one CSV file. Failures are reported but do not stop the project.
fn save<H: Host, R: CsvRecord>(host: &mut H, path: &Utf8Path, records: &[R]) {
    match append(path, records) {
        Ok(()) => {
            let _ = writeln!(host.output(), "✓ Saved: {path}");
        }
        Err(e) => {
            log::error!(target: LOG_TARGET, "Could not write '{path}': {e:#}");
            let _ = writeln!(host.error(), "Error writing '{path}': {e:#}");
        }
    }
}

fn print_banner<H: Host>(host: &mut H, title: &str) {
    let rule = "=".repeat(BANNER_WIDTH);
    let _ = writeln!(host.output(), "\n{rule}\n{title}\n{rule}");
}

fn print_summary<H: Host>(host: &mut H, summary: &ProjectSummary) {
    let rule = "=".repeat(SUMMARY_WIDTH);
    let mut out = host.output();

    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(out, "FETCH COMPLETE!");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Total time: {:.2?}", summary.elapsed);
    let _ = writeln!(out, "Commits: {}", summary.commits);
    let _ = writeln!(out, "Merge Requests: {}", summary.merge_requests);
    let _ = writeln!(out, "Notes: {}", summary.notes);
    let _ = writeln!(out, "{rule}");

    if summary.elapsed > TARGET_DURATION {
        let _ = writeln!(out, "⚠️  Exceeded 5-minute target");
    } else {
        let _ = writeln!(out, "✓ Completed within 5-minute target");
    }
}
