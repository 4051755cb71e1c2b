//! GitLab REST API (v4) client, used as the primary source.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use super::mapper::map_gitlab_commit;
use super::types::{GitLabCommit, GitLabProject, GitLabUser};
use super::{api_url, build_http_client, get_json, paginate, SourceClient, UserResolver};
use crate::config::SourceConfig;
use crate::errors::{DiscoveryError, FetchError, SourceError};
use crate::models::{CommitRecord, ProjectRef, SourceKind, SourceUser};

/// Default number of items requested per page (GitLab's maximum).
pub const PAGE_SIZE: u32 = 100;

const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// Asynchronous GitLab REST API client.
#[derive(Clone)]
pub struct GitLabClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    page_size: u32,
}

impl GitLabClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(SourceError::NotConfigured("GitLab base URL"));
        }
        let http = build_http_client(timeout)?;
        info!(base_url = %base_url, "created GitLabClient");
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

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let url = api_url(&self.base_url, segments, query)?;
        get_json(self.http.get(url).header(TOKEN_HEADER, &self.token)).await
    }

    fn project_key(project: &ProjectRef) -> String {
        match project {
            ProjectRef::Id(id) => id.to_string(),
            // GitLab accepts the URL-encoded namespace path in place of the id.
            ProjectRef::Named { owner, name } => format!("{}/{}", owner, name),
        }
    }
}

#[async_trait]
impl UserResolver for GitLabClient {
    #[instrument(skip(self))]
    async fn current_user(&self) -> Result<SourceUser, DiscoveryError> {
        let user: GitLabUser = self
            .get(&["api", "v4", "user"], &[])
            .await
            .map_err(|cause| DiscoveryError::User {
                source_kind: SourceKind::Primary,
                cause,
            })?;
        debug!(id = user.id, username = %user.username, "fetched authenticated user");
        Ok(SourceUser {
            id: user.id.to_string(),
            username: user.username,
        })
    }
}

#[async_trait]
impl SourceClient for GitLabClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Primary
    }

    #[instrument(skip(self))]
    async fn list_user_projects(&self, user: &str) -> Result<Vec<ProjectRef>, DiscoveryError> {
        let per_page = self.page_size.to_string();
        let projects: Vec<GitLabProject> = paginate(self.page_size, |page| {
            let query = [("page", page.to_string()), ("per_page", per_page.clone())];
            async move {
                self.get(&["api", "v4", "users", user, "contributed_projects"], &query)
                    .await
            }
        })
        .await
        .map_err(|cause| DiscoveryError::Projects {
            source_kind: SourceKind::Primary,
            user: user.to_string(),
            cause,
        })?;

        debug!(count = projects.len(), "fetched contributed projects");
        Ok(projects.into_iter().map(|p| ProjectRef::Id(p.id)).collect())
    }

    #[instrument(skip(self, project), fields(project = %project))]
    async fn list_project_commits(
        &self,
        project: &ProjectRef,
        author: &str,
    ) -> Result<Vec<CommitRecord>, FetchError> {
        let key = Self::project_key(project);
        let per_page = self.page_size.to_string();
        let commits: Vec<GitLabCommit> = paginate(self.page_size, |page| {
            let query = [
                ("author", author.to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.clone()),
            ];
            let key = key.as_str();
            async move {
                self.get(
                    &["api", "v4", "projects", key, "repository", "commits"],
                    &query,
                )
                .await
            }
        })
        .await
        .map_err(|cause| FetchError::Request {
            source_kind: SourceKind::Primary,
            project: project.to_string(),
            cause,
        })?;

        let records: Vec<CommitRecord> = commits.into_iter().filter_map(map_gitlab_commit).collect();
        if records.is_empty() {
            return Err(FetchError::NoCommits {
                source_kind: SourceKind::Primary,
                project: project.to_string(),
            });
        }
        debug!(count = records.len(), "fetched commits");
        Ok(records)
    }
}
