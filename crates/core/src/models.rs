//! Domain model types shared by the source clients, the pipeline and the
//! local mirror.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Sources and projects
// ---------------------------------------------------------------------------

/// Which remote platform a piece of data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// GitLab; always enabled.
    Primary,
    /// Codeberg (or any Gitea/Forgejo host); optional.
    Secondary,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "gitlab"),
            Self::Secondary => write!(f, "codeberg"),
        }
    }
}

/// A remote project to query commits from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectRef {
    /// Numeric GitLab project id.
    Id(u64),
    /// Codeberg `owner/name` pair.
    Named { owner: String, name: String },
}

impl std::fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{}", id),
            Self::Named { owner, name } => write!(f, "{}/{}", owner, name),
        }
    }
}

/// The authenticated user on the primary source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUser {
    pub id: String,
    pub username: String,
}

// ---------------------------------------------------------------------------
// Commits
// ---------------------------------------------------------------------------

/// A platform-independent commit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Commit hash on the remote platform. Never empty.
    pub id: String,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub authored_date: DateTime<Utc>,
}

/// All commits fetched for one project, in remote page order.
#[derive(Debug, Clone)]
pub struct CommitBatch {
    pub source: SourceKind,
    pub project: ProjectRef,
    pub records: Vec<CommitRecord>,
}

impl CommitBatch {
    pub fn new(source: SourceKind, project: ProjectRef, records: Vec<CommitRecord>) -> Self {
        Self {
            source,
            project,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Run statistics
// ---------------------------------------------------------------------------

/// What one source's fetch task produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub projects: usize,
    pub batches: usize,
    pub commits: usize,
    pub empty: usize,
    pub failed: usize,
    /// Project discovery failed, so nothing was queried.
    pub discovery_failed: bool,
}

/// Combined fetch statistics for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSummary {
    pub primary: SourceSummary,
    /// `None` when the secondary source is disabled.
    pub secondary: Option<SourceSummary>,
}

impl FetchSummary {
    pub fn total_batches(&self) -> usize {
        self.primary.batches + self.secondary.as_ref().map_or(0, |s| s.batches)
    }
}

/// What the sequential importer did with the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub batches_imported: usize,
    pub batches_failed: usize,
    pub commits_created: usize,
}

/// Run lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    ConfigLoaded,
    UserResolved,
    ProjectsDiscovered,
    NoContributions,
    RepoOpened,
    RepoPulled,
    FetchingAndImporting,
    NoNewCommits,
    Pushed,
    PushFailed,
    /// The importer task died; the repository gate went with it.
    ImportFailed,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::ConfigLoaded => write!(f, "config_loaded"),
            Self::UserResolved => write!(f, "user_resolved"),
            Self::ProjectsDiscovered => write!(f, "projects_discovered"),
            Self::NoContributions => write!(f, "no_contributions"),
            Self::RepoOpened => write!(f, "repo_opened"),
            Self::RepoPulled => write!(f, "repo_pulled"),
            Self::FetchingAndImporting => write!(f, "fetching_and_importing"),
            Self::NoNewCommits => write!(f, "no_new_commits"),
            Self::Pushed => write!(f, "pushed"),
            Self::PushFailed => write!(f, "push_failed"),
            Self::ImportFailed => write!(f, "import_failed"),
        }
    }
}

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The primary source reported no projects for the user.
    NoContributions,
    /// Everything fetched already existed in the mirror.
    NoNewCommits,
    /// New commits were created and pushed.
    Pushed { commits: usize },
}

/// Final report of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub fetch: FetchSummary,
    pub import: ImportSummary,
    pub elapsed: Duration,
}
