//! Export GitLab commit, merge request, and discussion data to CSV files.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use gitlab_stat_fetcher_lib::{Host, run};
use ohno::IntoAppError;
use std::io::Write;
use std::io::{stderr, stdout};

/// Host that writes to the real process streams.
#[derive(Debug, Clone, Default)]
pub struct RealHost;

#[cfg_attr(coverage_nightly, coverage(off))]
impl Host for RealHost {
    fn output(&mut self) -> impl Write {
        stdout()
    }

    fn error(&mut self) -> impl Write {
        stderr()
    }
}

#[tokio::main]
#[cfg_attr(coverage_nightly, coverage(off))]
async fn main() -> Result<(), ohno::AppError> {
    check_env_file(dotenvy::dotenv())?;

    run(&mut RealHost, std::env::args()).await
}

/// Settings may come from a local .env file. A missing file is fine, a malformed one is not.
fn check_env_file<T>(result: dotenvy::Result<T>) -> Result<(), ohno::AppError> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e).into_app_err("loading .env file"),
    }
}
