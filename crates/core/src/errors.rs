//! Error types for the activity importer core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies the ones that can end a run.

use thiserror::Error;

use crate::models::SourceKind;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the fatal paths of a run.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Import(#[from] ImportError),

    /// A blocking git task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// One or more required environment variables are unset or empty.
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingEnvVars(Vec<String>),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Remote source errors
// ---------------------------------------------------------------------------

/// Transport-level errors talking to a code-hosting platform.
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP-level transport error (network, TLS, timeout).
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The API returned a non-success status code.
    #[error("API error (HTTP {status}): {body}")]
    ApiError { status: u16, body: String },

    /// JSON deserialization failure.
    #[error("response parse error: {0}")]
    ParseError(String),

    /// The base URL could not be turned into a request URL.
    #[error("invalid URL '{url}': {detail}")]
    InvalidUrl { url: String, detail: String },

    /// The client is missing a value it needs to build requests.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// The project reference belongs to a different platform.
    #[error("project reference {0} is not supported by this source")]
    UnsupportedProject(String),
}

/// Failure resolving the user or listing the user's projects.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to resolve {source_kind} user: {cause}")]
    User {
        source_kind: SourceKind,
        #[source]
        cause: SourceError,
    },

    #[error("failed to list {source_kind} projects for '{user}': {cause}")]
    Projects {
        source_kind: SourceKind,
        user: String,
        #[source]
        cause: SourceError,
    },
}

/// Failure fetching one project's commits. Never fatal to a run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to fetch {source_kind} commits for {project}: {cause}")]
    Request {
        source_kind: SourceKind,
        project: String,
        #[source]
        cause: SourceError,
    },

    /// Every page came back empty for this project.
    #[error("no commits found in {source_kind} project {project}")]
    NoCommits {
        source_kind: SourceKind,
        project: String,
    },
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from local mirror (git2) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The repository path does not exist or is not a git repo.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// An operation was attempted before the mirror was opened.
    #[error("local mirror has not been opened")]
    NotOpened,

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// Push was rejected (e.g. non-fast-forward).
    #[error("git push rejected for branch '{branch}': {detail}")]
    PushRejected { branch: String, detail: String },

    /// Local and remote history diverged; a fast-forward pull is impossible.
    #[error("local branch '{0}' has diverged from origin")]
    Diverged(String),

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Import errors
// ---------------------------------------------------------------------------

/// Errors materializing batches as local commits.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Creating commits for one batch failed; the batch is dropped.
    #[error("failed to import {source_kind} batch for {project}: {cause}")]
    Batch {
        source_kind: SourceKind,
        project: String,
        #[source]
        cause: GitError,
    },

    /// The blocking consumer task panicked.
    #[error("importer task failed: {0}")]
    TaskFailed(String),
}
