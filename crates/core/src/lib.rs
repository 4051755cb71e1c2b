//! Activity importer core library.
//!
//! Mirrors a user's commit activity from GitLab (and optionally Codeberg)
//! into a local git repository as empty commits, then pushes it to an origin
//! so the activity shows up on another platform's contribution graph.
//!
//! The building blocks are configuration, the source clients, the fan-in
//! fetch/import pipeline, the git2-backed mirror, and the run engine that
//! ties them together.

pub mod config;
pub mod engine;
pub mod errors;
pub mod git;
pub mod models;
pub mod pipeline;
pub mod source;

// Re-exports for convenience.
pub use config::ImporterConfig;
pub use engine::ImportRun;
pub use git::{LocalMirror, RepositoryGate};
pub use source::{CodebergClient, GitLabClient, SourceClient, UserResolver};
