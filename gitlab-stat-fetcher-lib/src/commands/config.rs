use super::FetchArgs;
use crate::Result;
use camino::Utf8PathBuf;
use chrono::{DateTime, Months, NaiveDate, NaiveTime, Utc};
use core::fmt;
use core::num::NonZeroUsize;
use ohno::{IntoAppError, app_err, bail};
use url::Url;

const LOG_TARGET: &str = "    config";

/// How far back to look when no since-date is given.
const DEFAULT_LOOKBACK: Months = Months::new(24);

const SINCE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Upper bound on concurrent requests per fetch phase.
pub const MAX_WORKERS: usize = 256;

/// Validated settings for one run.
#[derive(Clone)]
pub struct Config {
    pub base_url: Url,
    pub token: String,
    pub data_dir: Utf8PathBuf,
    pub workers: NonZeroUsize,

    /// Lower bound for commit dates and merge request creation dates
    pub since: DateTime<Utc>,

    pub skip_discussions: bool,
}

impl Config {
    /// Validate the command-line arguments.
    ///
    /// `now` anchors the default since-date.
    pub fn from_args(args: &FetchArgs, now: DateTime<Utc>) -> Result<Self> {
        let base_url = args
            .gitlab_url
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| app_err!("missing required configuration: GITLAB_URL (--gitlab-url)"))?;
        let base_url = Url::parse(base_url).into_app_err_with(|| format!("invalid GitLab URL '{base_url}'"))?;

        let token = args
            .gitlab_token
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| app_err!("missing required configuration: GITLAB_TOKEN (--gitlab-token)"))?;

        let data_dir = args
            .data_folder
            .clone()
            .filter(|p| !p.as_str().is_empty())
            .ok_or_else(|| app_err!("missing required configuration: DATA_FOLDER (--data-folder)"))?;

        let workers = NonZeroUsize::new(args.workers).ok_or_else(|| app_err!("the number of workers must be at least 1"))?;
        if workers.get() > MAX_WORKERS {
            bail!("the number of workers must be at most {MAX_WORKERS}, got {workers}");
        }

        Ok(Self {
            base_url,
            token,
            data_dir,
            workers,
            since: since_date(args.since_date.as_deref(), now),
            skip_discussions: args.skip_discussions,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"<redacted>")
            .field("data_dir", &self.data_dir)
            .field("workers", &self.workers)
            .field("since", &self.since)
            .field("skip_discussions", &self.skip_discussions)
            .finish()
    }
}

fn default_since(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_months(DEFAULT_LOOKBACK).unwrap_or(now)
}

/// Midnight UTC of the given `YYYY-MM-DD` date, or the default lookback if unset or invalid.
fn since_date(value: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(value) = value.map(str::trim).filter(|s| !s.is_empty()) else {
        return default_since(now);
    };

    match NaiveDate::parse_from_str(value, SINCE_DATE_FORMAT) {
        Ok(date) => date.and_time(NaiveTime::MIN).and_utc(),
        Err(_) => {
            log::warn!(
                target: LOG_TARGET,
                "Invalid since-date '{value}' (use YYYY-MM-DD), using default ({} months ago)",
                DEFAULT_LOOKBACK.as_u32()
            );
            default_since(now)
        }
    }
}
