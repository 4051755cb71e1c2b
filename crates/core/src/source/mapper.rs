//! Conversion from platform commit payloads to [`CommitRecord`].
//!
//! These functions are pure apart from reading the wall clock when a date
//! cannot be parsed.

use chrono::{DateTime, Utc};

use super::types::{CodebergActor, CodebergCommit, GitLabCommit};
use crate::models::CommitRecord;

/// Map a Codeberg commit, preferring nested `commit.author` data over the
/// top-level duplicates.
///
/// Returns `None` when neither `sha` nor `id` is present.
pub fn map_codeberg_commit(commit: CodebergCommit) -> Option<CommitRecord> {
    let id = first_non_empty(commit.sha, commit.id);
    if id.is_empty() {
        return None;
    }

    let (nested_message, nested) = match commit.commit {
        Some(detail) => (detail.message, detail.author.unwrap_or_default()),
        None => (String::new(), CodebergActor::default()),
    };
    let top = commit.author.unwrap_or_default();

    let date = first_non_empty(nested.date, top.date);

    Some(CommitRecord {
        id,
        message: first_non_empty(commit.message, nested_message),
        author_name: first_non_empty(nested.name, top.name),
        author_email: first_non_empty(nested.email, top.email),
        authored_date: parse_authored_date(&date),
    })
}

/// Map a GitLab commit. Returns `None` when the hash is missing.
pub fn map_gitlab_commit(commit: GitLabCommit) -> Option<CommitRecord> {
    if commit.id.is_empty() {
        return None;
    }
    Some(CommitRecord {
        authored_date: parse_authored_date(&commit.authored_date),
        id: commit.id,
        message: commit.message,
        author_name: commit.author_name,
        author_email: commit.author_email,
    })
}

/// Parse an RFC 3339 timestamp, falling back to the current time.
pub fn parse_authored_date(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn first_non_empty(preferred: String, fallback: String) -> String {
    if preferred.is_empty() {
        fallback
    } else {
        preferred
    }
}
