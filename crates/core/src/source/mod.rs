//! Remote code-hosting sources.
//!
//! Every platform implements [`SourceClient`]; the pipeline only ever sees the
//! trait. Shared request plumbing (URL building, status checks, pagination)
//! lives here so both clients follow the same rules.

pub mod codeberg;
pub mod gitlab;
pub mod mapper;
pub mod types;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::{DiscoveryError, FetchError, SourceError};
use crate::models::{CommitRecord, ProjectRef, SourceKind, SourceUser};

pub use codeberg::CodebergClient;
pub use gitlab::GitLabClient;

/// Capability set every remote platform provides.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Which source this client talks to.
    fn kind(&self) -> SourceKind;

    /// List the projects `user` owns or contributed to.
    async fn list_user_projects(&self, user: &str) -> Result<Vec<ProjectRef>, DiscoveryError>;

    /// List every commit in `project` authored by `author`, in page order.
    ///
    /// An empty result is reported as [`FetchError::NoCommits`].
    async fn list_project_commits(
        &self,
        project: &ProjectRef,
        author: &str,
    ) -> Result<Vec<CommitRecord>, FetchError>;
}

/// Resolves the identity behind the configured token.
#[async_trait]
pub trait UserResolver: Send + Sync {
    async fn current_user(&self) -> Result<SourceUser, DiscoveryError>;
}

// ---------------------------------------------------------------------------
// Shared request plumbing
// ---------------------------------------------------------------------------

/// Build the HTTP client shared by all requests of one source.
pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client, SourceError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("activity-importer/", env!("CARGO_PKG_VERSION"))),
    );
    Ok(reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()?)
}

/// Join `segments` onto `base` (escaping each one) and append `query`.
pub(crate) fn api_url(
    base: &str,
    segments: &[&str],
    query: &[(&str, String)],
) -> Result<Url, SourceError> {
    let mut url = Url::parse(base).map_err(|e| SourceError::InvalidUrl {
        url: base.to_string(),
        detail: e.to_string(),
    })?;
    url.path_segments_mut()
        .map_err(|_| SourceError::InvalidUrl {
            url: base.to_string(),
            detail: "URL cannot be a base".into(),
        })?
        .pop_if_empty()
        .extend(segments);
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

/// Send a request and decode a JSON body, turning non-success statuses into
/// [`SourceError::ApiError`] with the response body attached.
pub(crate) async fn get_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, SourceError> {
    let resp = req.send().await?;
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(SourceError::ApiError {
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|e| SourceError::ParseError(e.to_string()))
}

/// Fetch pages `1, 2, ...` until one returns fewer than `page_size` items.
///
/// The first failing page aborts the whole listing.
pub(crate) async fn paginate<T, F, Fut>(
    page_size: u32,
    mut fetch_page: F,
) -> Result<Vec<T>, SourceError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>, SourceError>>,
{
    let mut all = Vec::new();
    let mut page = 1u32;
    loop {
        let items = fetch_page(page).await?;
        let count = items.len();
        all.extend(items);
        debug!(page, count, "fetched page");
        if count < page_size as usize {
            break;
        }
        page += 1;
    }
    Ok(all)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_paginate_stops_on_short_page() {
        let calls = AtomicU32::new(0);
        let items = paginate(3, |page| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(match page {
                    1 => vec![1, 2, 3],
                    2 => vec![4],
                    _ => panic!("requested page {page} after a short page"),
                })
            }
        })
        .await
        .unwrap();
        assert_eq!(items, vec![1, 2, 3, 4]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_paginate_full_page_then_empty_makes_two_requests() {
        let calls = AtomicU32::new(0);
        let items = paginate(2, |page| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(if page == 1 { vec!["a", "b"] } else { vec![] }) }
        })
        .await
        .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_paginate_propagates_page_error() {
        let result: Result<Vec<u8>, _> = paginate(1, |page| async move {
            if page == 1 {
                Ok(vec![1])
            } else {
                Err(SourceError::ApiError {
                    status: 502,
                    body: "bad gateway".into(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(SourceError::ApiError { status: 502, .. })));
    }

    #[test]
    fn test_api_url_escapes_segments_and_query() {
        let url = api_url(
            "https://codeberg.org/",
            &["api", "v1", "repos", "my org", "repo", "commits"],
            &[("author", "a b&c".to_string()), ("page", "1".to_string())],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://codeberg.org/api/v1/repos/my%20org/repo/commits?author=a+b%26c&page=1"
        );
    }

    #[test]
    fn test_api_url_keeps_base_path_prefix() {
        let url = api_url("https://git.example.com/gitea", &["api", "v1", "user"], &[]).unwrap();
        assert_eq!(url.as_str(), "https://git.example.com/gitea/api/v1/user");
    }

    #[test]
    fn test_api_url_rejects_garbage() {
        assert!(matches!(
            api_url("not a url", &["x"], &[]),
            Err(SourceError::InvalidUrl { .. })
        ));
    }
}
