//! The local mirror repository that imported commits are written to.

pub mod client;
pub mod mirror;

pub use client::{GitClient, PullOutcome};
pub use mirror::LocalMirror;

use crate::errors::GitError;
use crate::models::CommitBatch;

/// Sequential, synchronous access to the mirror repository.
///
/// Implementations are driven from one blocking thread at a time and are
/// moved between tasks, never shared.
pub trait RepositoryGate: Send + 'static {
    /// Open (or create) the repository.
    fn open(&mut self) -> Result<(), GitError>;

    /// Bring the local branch up to date with `origin`.
    fn pull(&mut self) -> Result<(), GitError>;

    /// Create one empty commit per record not already mirrored. Returns the
    /// number of commits created.
    fn create_local_commits(&mut self, batch: &CommitBatch) -> Result<usize, GitError>;

    /// Publish the local branch to `origin`.
    fn push(&mut self) -> Result<(), GitError>;
}
