//! Codeberg REST API (v1) client, used as the optional secondary source.
//!
//! Works against any Gitea or Forgejo host; Codeberg is just the default
//! deployment.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use super::mapper::map_codeberg_commit;
use super::types::{CodebergCommit, CodebergRepo};
use super::{api_url, build_http_client, get_json, paginate, SourceClient};
use crate::config::SourceConfig;
use crate::errors::{DiscoveryError, FetchError, SourceError};
use crate::models::{CommitRecord, ProjectRef, SourceKind};

/// Default number of items requested per page.
pub const PAGE_SIZE: u32 = 50;

/// Asynchronous Codeberg/Gitea REST API client.
#[derive(Clone)]
pub struct CodebergClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    page_size: u32,
}

impl CodebergClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(SourceError::NotConfigured("Codeberg base URL"));
        }
        let http = build_http_client(timeout)?;
        info!(base_url = %base_url, "created CodebergClient");
        Ok(Self {
            http,
            base_url,
            token: token.into(),
            page_size: PAGE_SIZE,
        })
    }

    pub fn from_config(config: &SourceConfig, timeout: Duration) -> Result<Self, SourceError> {
        Self::new(&config.base_url, &config.token, timeout)
    }

    /// Override the page size (mainly useful against small fixtures).
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    async fn get_page<T: serde::de::DeserializeOwned>(
        &self,
        segments: &[&str],
        extra: &[(&str, String)],
        page: u32,
    ) -> Result<Vec<T>, SourceError> {
        let mut query: Vec<(&str, String)> = extra.to_vec();
        query.push(("page", page.to_string()));
        query.push(("limit", self.page_size.to_string()));
        let url = api_url(&self.base_url, segments, &query)?;
        get_json(
            self.http
                .get(url)
                .header("Authorization", format!("token {}", self.token)),
        )
        .await
    }

    /// List every repository of `username`, raw.
    pub async fn list_repos(&self, username: &str) -> Result<Vec<CodebergRepo>, SourceError> {
        if username.is_empty() {
            return Err(SourceError::NotConfigured("Codeberg username"));
        }
        let segments = ["api", "v1", "users", username, "repos"];
        paginate(self.page_size, |page| self.get_page(&segments, &[], page)).await
    }
}

#[async_trait]
impl SourceClient for CodebergClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Secondary
    }

    #[instrument(skip(self))]
    async fn list_user_projects(&self, user: &str) -> Result<Vec<ProjectRef>, DiscoveryError> {
        let repos = self
            .list_repos(user)
            .await
            .map_err(|cause| DiscoveryError::Projects {
                source_kind: SourceKind::Secondary,
                user: user.to_string(),
                cause,
            })?;

        let total = repos.len();
        let projects: Vec<ProjectRef> = repos
            .into_iter()
            .filter_map(|repo| {
                let owner = repo.owner_name().to_string();
                if owner.is_empty() || repo.name.is_empty() {
                    debug!(name = %repo.name, "skipping repository without owner or name");
                    return None;
                }
                Some(ProjectRef::Named {
                    owner,
                    name: repo.name,
                })
            })
            .collect();

        debug!(total, usable = projects.len(), "fetched repositories");
        Ok(projects)
    }

    #[instrument(skip(self, project), fields(project = %project))]
    async fn list_project_commits(
        &self,
        project: &ProjectRef,
        author: &str,
    ) -> Result<Vec<CommitRecord>, FetchError> {
        let request_error = |cause| FetchError::Request {
            source_kind: SourceKind::Secondary,
            project: project.to_string(),
            cause,
        };

        let (owner, name) = match project {
            ProjectRef::Named { owner, name } if !owner.is_empty() && !name.is_empty() => {
                (owner.as_str(), name.as_str())
            }
            other => {
                return Err(request_error(SourceError::UnsupportedProject(
                    other.to_string(),
                )))
            }
        };

        let segments = ["api", "v1", "repos", owner, name, "commits"];
        let query = [("author", author.to_string())];
        let commits: Vec<CodebergCommit> =
            paginate(self.page_size, |page| self.get_page(&segments, &query, page))
                .await
                .map_err(request_error)?;

        let total = commits.len();
        let records: Vec<CommitRecord> =
            commits.into_iter().filter_map(map_codeberg_commit).collect();
        if records.len() < total {
            debug!(dropped = total - records.len(), "dropped commits without a hash");
        }
        if records.is_empty() {
            return Err(FetchError::NoCommits {
                source_kind: SourceKind::Secondary,
                project: project.to_string(),
            });
        }
        debug!(count = records.len(), "fetched commits");
        Ok(records)
    }
}
