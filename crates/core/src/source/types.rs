//! Wire payloads returned by the GitLab and Codeberg REST APIs.
//!
//! Only the fields the importer reads are declared, and every one of them is
//! defaulted so that sparse or partially-null responses still decode.

use serde::Deserialize;

// ---------------------------------------------------------------------------
// GitLab (API v4)
// ---------------------------------------------------------------------------

/// `GET /api/v4/user`
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabUser {
    pub id: u64,
    #[serde(default)]
    pub username: String,
}

/// One entry of `GET /api/v4/users/{id}/contributed_projects`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabProject {
    pub id: u64,
    #[serde(default)]
    pub path_with_namespace: String,
}

/// One entry of `GET /api/v4/projects/{id}/repository/commits`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitLabCommit {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub author_email: String,
    #[serde(default)]
    pub authored_date: String,
}

// ---------------------------------------------------------------------------
// Codeberg / Gitea (API v1)
// ---------------------------------------------------------------------------

/// One entry of `GET /api/v1/users/{username}/repos`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodebergRepo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner: CodebergOwner,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodebergOwner {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub username: String,
}

impl CodebergRepo {
    /// Owner identity: `login`, falling back to `username`.
    pub fn owner_name(&self) -> &str {
        if self.owner.login.is_empty() {
            &self.owner.username
        } else {
            &self.owner.login
        }
    }
}

/// One entry of `GET /api/v1/repos/{owner}/{repo}/commits`.
///
/// Author data is nested under `commit.author` but some fields are also
/// duplicated at the top level.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodebergCommit {
    #[serde(default)]
    pub sha: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub commit: Option<CodebergCommitDetail>,
    #[serde(default)]
    pub author: Option<CodebergActor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodebergCommitDetail {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: Option<CodebergActor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodebergActor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub date: String,
}
