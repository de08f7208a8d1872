//! Command dispatch logic for gitlab-stat-fetcher

use super::{FetchArgs, process_projects};
use crate::{Host, Result};
use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "gitlab-stat-fetcher", version, author, long_about = None)]
#[command(about = "Export commits, merge requests, and review notes from GitLab projects to CSV")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(flatten)]
    fetch: FetchArgs,
}

/// Parse command-line arguments and run the fetch
///
/// Designed to be called from main.rs with the program arguments.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, if an input URL cannot be
/// resolved, or if the data directory cannot be created
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    let cli = Cli::parse_from(args);
    process_projects(host, &cli.fetch).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_urls_and_flags() {
        let cli = Cli::parse_from([
            "gitlab-stat-fetcher",
            "--skip-discussions",
            "--workers",
            "4",
            "https://gitlab.example/acme",
            "https://gitlab.example/other/proj",
        ]);

        assert_eq!(cli.fetch.urls, ["https://gitlab.example/acme", "https://gitlab.example/other/proj"]);
        assert_eq!(cli.fetch.workers, 4);
        assert!(cli.fetch.skip_discussions);
    }
}
