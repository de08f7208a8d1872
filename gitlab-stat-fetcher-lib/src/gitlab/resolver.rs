//! Turns the URLs given on the command line into the list of projects to fetch.
//!
//! A URL names either a project or a group. Groups expand to the projects of each direct
//! subgroup followed by the group's own projects. Subgroups of subgroups are not visited.

use super::client::{API_PREFIX, ApiResult, Client, encode_path};
use super::provider::PAGE_SIZE;
use super::types::{Group, Project};
use crate::Result;
use ohno::{EnrichableExt, IntoAppError, bail};
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use url::Url;

const LOG_TARGET: &str = "  resolver";

/// Extract the `namespace/name` path from a project or group URL.
///
/// The URL must live on the same host (and port) as `base_url`. When the instance is
/// served under a relative root such as `/gitlab`, that prefix is removed. No network
/// access happens here.
pub fn extract_path(input: &str, base_url: &Url) -> Result<String> {
    let url = Url::parse(input).into_app_err_with(|| format!("invalid URL '{input}'"))?;

    if url.host_str() != base_url.host_str() || url.port_or_known_default() != base_url.port_or_known_default() {
        bail!(
            "URL host {} does not match GitLab base URL host {}",
            host_display(&url),
            host_display(base_url)
        );
    }

    let path = percent_decode_str(url.path())
        .decode_utf8()
        .into_app_err_with(|| format!("invalid path in URL '{input}'"))?;
    let path = path.trim_matches('/');

    let root = relative_root(base_url);
    let path = if root.is_empty() {
        path
    } else {
        match path.strip_prefix(root.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
            _ => bail!("URL '{input}' is not under GitLab base URL {base_url}"),
        }
    };

    if path.is_empty() {
        bail!("URL '{input}' does not name a project or group");
    }

    Ok(path.to_string())
}

/// Path of the web root below the host, without surrounding slashes or the API suffix.
fn relative_root(base_url: &Url) -> String {
    let root = percent_decode_str(base_url.path()).decode_utf8_lossy();
    let root = root.trim_matches('/');
    root.strip_suffix(API_PREFIX).unwrap_or(root).trim_matches('/').to_string()
}

fn host_display(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    }
}

/// Resolve `path` to the projects it names.
///
/// A path that is a project yields exactly that project. Otherwise the path must be a
/// group; any failure while listing the group is returned as an error.
pub async fn resolve_projects(client: &Client, path: &str) -> Result<Vec<Project>> {
    let encoded = encode_path(path);

    match client.get_json::<Project>(&format!("projects/{encoded}"), &[]).await {
        ApiResult::Success(project, _) => {
            log::debug!(target: LOG_TARGET, "'{path}' is project {}", project.id);
            return Ok(vec![project]);
        }
        ApiResult::NotFound => {
            log::debug!(target: LOG_TARGET, "'{path}' is not a project, trying it as a group");
        }
        ApiResult::Failed(e) => {
            log::debug!(target: LOG_TARGET, "Project lookup for '{path}' failed, trying it as a group: {e:#}");
        }
    }

    let (group, _) = client
        .get_json::<Group>(&format!("groups/{encoded}"), &[])
        .await
        .into_result(&format!("group '{path}'"))
        .map_err(|e| e.enrich_with(|| format!("fetching group '{path}'")))?;

    let subgroups: Vec<Group> = list_all(client, &format!("groups/{}/subgroups", group.id))
        .await
        .map_err(|e| e.enrich_with(|| format!("listing subgroups of '{path}'")))?;

    let mut projects = Vec::new();
    for subgroup in &subgroups {
        let subgroup_projects: Vec<Project> = list_all(client, &format!("groups/{}/projects", subgroup.id))
            .await
            .map_err(|e| e.enrich_with(|| format!("listing projects of subgroup '{}'", subgroup.full_path)))?;
        projects.extend(subgroup_projects);
    }

    let group_projects: Vec<Project> = list_all(client, &format!("groups/{}/projects", group.id))
        .await
        .map_err(|e| e.enrich_with(|| format!("listing projects of group '{path}'")))?;
    projects.extend(group_projects);

    log::info!(
        target: LOG_TARGET,
        "Group '{path}' has {} project(s) across {} subgroup(s)",
        projects.len(),
        subgroups.len()
    );

    Ok(projects)
}

/// Sequentially read every page of a listing, following `x-next-page`.
async fn list_all<T: DeserializeOwned>(client: &Client, endpoint: &str) -> Result<Vec<T>> {
    let mut all = Vec::new();
    let mut page = 1_u64;

    loop {
        let query = [("per_page", PAGE_SIZE.to_string()), ("page", page.to_string())];
        let (items, pagination) = client.get_json::<Vec<T>>(endpoint, &query).await.into_result(endpoint)?;
        all.extend(items);

        log::debug!(
            target: LOG_TARGET,
            "Read page {} of {} from '{endpoint}'",
            pagination.page.unwrap_or(page),
            pagination.total_pages.map_or_else(|| "?".to_string(), |total| total.to_string())
        );

        match pagination.next_page {
            Some(next) if next > page => page = next,
            _ => break,
        }
    }

    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://gitlab.example").unwrap()
    }

    #[test]
    fn test_extract_project_path() {
        let path = extract_path("https://gitlab.example/group/proj", &base()).unwrap();
        assert_eq!(path, "group/proj");
    }

    #[test]
    fn test_extract_nested_group_path_with_trailing_slash() {
        let path = extract_path("https://gitlab.example/acme/platform/", &base()).unwrap();
        assert_eq!(path, "acme/platform");
    }

    #[test]
    fn test_extract_decodes_percent_escapes() {
        let path = extract_path("https://gitlab.example/acme/my%20proj", &base()).unwrap();
        assert_eq!(path, "acme/my proj");
    }

    #[test]
    fn test_extract_rejects_host_mismatch() {
        let err = extract_path("https://gitlab.other/group/proj", &base()).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("does not match"), "{message}");
        assert!(message.contains("gitlab.other"), "{message}");
    }

    #[test]
    fn test_extract_rejects_port_mismatch() {
        let base = Url::parse("http://127.0.0.1:8080").unwrap();
        assert!(extract_path("http://127.0.0.1:9090/group/proj", &base).is_err());
    }

    #[test]
    fn test_extract_accepts_explicit_default_port() {
        let path = extract_path("https://gitlab.example:443/group/proj", &base()).unwrap();
        assert_eq!(path, "group/proj");
    }

    #[test]
    fn test_extract_strips_relative_root() {
        let base = Url::parse("https://example.com/gitlab/").unwrap();
        assert_eq!(extract_path("https://example.com/gitlab/acme/web", &base).unwrap(), "acme/web");

        let api_base = Url::parse("https://example.com/gitlab/api/v4").unwrap();
        assert_eq!(extract_path("https://example.com/gitlab/acme/web/", &api_base).unwrap(), "acme/web");
    }

    #[test]
    fn test_extract_keeps_path_when_base_is_api_root() {
        let base = Url::parse("https://gitlab.example/api/v4/").unwrap();
        assert_eq!(extract_path("https://gitlab.example/acme/web", &base).unwrap(), "acme/web");
    }

    #[test]
    fn test_extract_rejects_url_outside_relative_root() {
        let base = Url::parse("https://example.com/gitlab").unwrap();
        let err = extract_path("https://example.com/gitlabber/acme/web", &base).unwrap_err();
        assert!(format!("{err:#}").contains("is not under"), "{err:#}");

        assert!(extract_path("https://example.com/gitlab/", &base).is_err());
    }

    #[test]
    fn test_extract_rejects_invalid_url() {
        assert!(extract_path("not a url", &base()).is_err());
    }

    #[test]
    fn test_extract_rejects_empty_path() {
        assert!(extract_path("https://gitlab.example/", &base()).is_err());
    }
}
