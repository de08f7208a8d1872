//! GitLab REST API client
//!
//! Minimal client for the handful of v4 endpoints the fetcher needs. Responses are
//! classified into [`ApiResult`] so callers can tell a missing resource apart from
//! other failures.

use crate::Result;
use core::time::Duration;
use ohno::app_err;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use url::Url;

/// Per-request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub const API_PREFIX: &str = "api/v4";

/// Characters left alone when encoding a `namespace/project` path into a single
/// URL segment (RFC 3986 unreserved set).
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Pagination metadata from GitLab's `x-*` response headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub page: Option<u64>,
    pub next_page: Option<u64>,
    pub total_pages: Option<u64>,
}

impl Pagination {
    fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            page: header_u64(headers, "x-page"),
            next_page: header_u64(headers, "x-next-page"),
            total_pages: header_u64(headers, "x-total-pages"),
        }
    }
}

/// GitLab sends an empty `x-next-page` on the last page, which maps to `None`.
fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

/// Result of a GitLab API call
#[derive(Debug)]
pub enum ApiResult<T> {
    /// Request succeeded
    Success(T, Pagination),

    /// The requested resource does not exist (404)
    NotFound,

    /// Any other failure, including transport and decoding errors
    Failed(ohno::AppError),
}

impl<T> ApiResult<T> {
    /// Treat anything but success as an error.
    pub fn into_result(self, what: &str) -> Result<(T, Pagination)> {
        match self {
            Self::Success(data, pagination) => Ok((data, pagination)),
            Self::NotFound => Err(app_err!("{what} not found")),
            Self::Failed(e) => Err(e),
        }
    }
}

/// GitLab API client
#[derive(Debug, Clone)]
#[expect(clippy::struct_field_names, reason = "client field stores the underlying HTTP client")]
pub struct Client {
    client: reqwest::Client,
    api_url: String,
}

impl Client {
    /// Create a client for the instance at `base_url`, authenticating with `token`.
    ///
    /// `base_url` may point at the instance root or directly at `/api/v4`.
    pub fn new(base_url: &Url, token: &str) -> Result<Self> {
        let mut auth_val = HeaderValue::from_str(token)?;
        auth_val.set_sensitive(true);

        let mut headers = HeaderMap::new();
        let _ = headers.insert("private-token", auth_val);

        let client = reqwest::Client::builder()
            .user_agent("gitlab-stat-fetcher")
            .default_headers(headers)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_url: api_url(base_url),
        })
    }

    /// Root of the REST API, without a trailing slash.
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// GET `endpoint` (relative to the API root) and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, String)]) -> ApiResult<T> {
        let url = format!("{}/{endpoint}", self.api_url);

        let resp = match self.client.get(&url).query(query).send().await {
            Ok(r) => r,
            Err(e) => return ApiResult::Failed(e.into()),
        };

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return ApiResult::NotFound;
        }

        if !status.is_success() {
            return ApiResult::Failed(app_err!("GitLab returned HTTP {status} for '{url}'"));
        }

        let pagination = Pagination::from_headers(resp.headers());
        match resp.json().await {
            Ok(data) => ApiResult::Success(data, pagination),
            Err(e) => ApiResult::Failed(e.into()),
        }
    }
}

/// Encode a `namespace/name` path so it can be used as a project or group id.
#[must_use]
pub fn encode_path(path: &str) -> String {
    utf8_percent_encode(path, PATH_SEGMENT).to_string()
}

fn api_url(base_url: &Url) -> String {
    let base = base_url.as_str().trim_end_matches('/');
    if base.ends_with(API_PREFIX) {
        base.to_string()
    } else {
        format!("{base}/{API_PREFIX}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_appends_prefix() {
        let url = Url::parse("https://gitlab.example").unwrap();
        assert_eq!(api_url(&url), "https://gitlab.example/api/v4");
    }

    #[test]
    fn test_api_url_keeps_existing_prefix() {
        let url = Url::parse("https://gitlab.example/api/v4/").unwrap();
        assert_eq!(api_url(&url), "https://gitlab.example/api/v4");
    }

    #[test]
    fn test_api_url_with_relative_root() {
        let url = Url::parse("https://example.com/gitlab/").unwrap();
        assert_eq!(api_url(&url), "https://example.com/gitlab/api/v4");
    }

    #[test]
    fn test_encode_path() {
        assert_eq!(encode_path("group/proj"), "group%2Fproj");
        assert_eq!(encode_path("my-group/sub.group/my_proj"), "my-group%2Fsub.group%2Fmy_proj");
    }

    #[test]
    fn test_pagination_from_headers() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-page", HeaderValue::from_static("2"));
        let _ = headers.insert("x-next-page", HeaderValue::from_static("3"));
        let _ = headers.insert("x-total-pages", HeaderValue::from_static("5"));

        let pagination = Pagination::from_headers(&headers);
        assert_eq!(
            pagination,
            Pagination {
                page: Some(2),
                next_page: Some(3),
                total_pages: Some(5),
            }
        );
    }

    #[test]
    fn test_pagination_last_page_has_empty_next() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-page", HeaderValue::from_static("5"));
        let _ = headers.insert("x-next-page", HeaderValue::from_static(""));

        let pagination = Pagination::from_headers(&headers);
        assert_eq!(pagination.next_page, None);
        assert_eq!(pagination.total_pages, None);
    }

    #[test]
    fn test_into_result_not_found() {
        let result: ApiResult<()> = ApiResult::NotFound;
        let err = result.into_result("group 'acme'").unwrap_err();
        assert!(err.to_string().contains("group 'acme' not found"));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot initialize the TLS backend")]
    fn test_client_new() {
        let url = Url::parse("https://gitlab.example").unwrap();
        let client = Client::new(&url, "glpat-test").unwrap();
        assert_eq!(client.api_url(), "https://gitlab.example/api/v4");
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot initialize the TLS backend")]
    fn test_client_rejects_invalid_token() {
        let url = Url::parse("https://gitlab.example").unwrap();
        assert!(Client::new(&url, "bad\ntoken").is_err());
    }
}
