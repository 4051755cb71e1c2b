//! [`RepositoryGate`] backed by a real git2 working copy.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use super::client::GitClient;
use super::RepositoryGate;
use crate::config::{expand_tilde, MirrorConfig};
use crate::errors::GitError;
use crate::models::CommitBatch;

const REMOTE: &str = "origin";

/// Mirror repository whose history records one empty commit per imported
/// remote commit, using the remote hash as the commit message.
pub struct LocalMirror {
    config: MirrorConfig,
    client: Option<GitClient>,
    /// Record ids already present as commit messages. Loaded lazily.
    known: Option<HashSet<String>>,
}

impl LocalMirror {
    pub fn new(config: MirrorConfig) -> Self {
        Self {
            config,
            client: None,
            known: None,
        }
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// The underlying client, once [`RepositoryGate::open`] has succeeded.
    pub fn client(&self) -> Option<&GitClient> {
        self.client.as_ref()
    }

    fn token(&self) -> Option<&str> {
        Some(self.config.origin_token.as_str()).filter(|t| !t.is_empty())
    }

    fn opened(&self) -> Result<&GitClient, GitError> {
        self.client.as_ref().ok_or(GitError::NotOpened)
    }
}

impl RepositoryGate for LocalMirror {
    fn open(&mut self) -> Result<(), GitError> {
        let path = expand_tilde(&self.config.repo_dir);
        let client = if path.join(".git").exists() {
            GitClient::open(&path)?
        } else {
            match GitClient::clone_repo(&self.config.origin_url, &path, self.token()) {
                Ok(client) => client,
                Err(e) => {
                    warn!(error = %e, "clone failed, initializing a new repository");
                    GitClient::init_with_origin(&path, &self.config.branch, &self.config.origin_url)?
                }
            }
        };
        client.switch_to_branch(REMOTE, &self.config.branch)?;
        info!(path = %client.repo_path().display(), "mirror repository ready");
        self.client = Some(client);
        self.known = None;
        Ok(())
    }

    fn pull(&mut self) -> Result<(), GitError> {
        let client = self.opened()?;
        client.pull(REMOTE, &self.config.branch, self.token())?;
        self.known = None;
        Ok(())
    }

    fn create_local_commits(&mut self, batch: &CommitBatch) -> Result<usize, GitError> {
        let client = self.client.as_ref().ok_or(GitError::NotOpened)?;
        if self.known.is_none() {
            self.known = Some(client.commit_messages()?);
        }
        let known = self.known.get_or_insert_with(HashSet::new);

        let mut created = 0;
        for record in &batch.records {
            if known.contains(&record.id) {
                debug!(id = %record.id, "commit already mirrored, skipping");
                continue;
            }
            client.commit_empty(
                &record.id,
                &self.config.committer_name,
                &self.config.committer_email,
                record.authored_date,
            )?;
            known.insert(record.id.clone());
            created += 1;
        }

        info!(
            source = %batch.source,
            project = %batch.project,
            created,
            skipped = batch.len() - created,
            "imported batch"
        );
        Ok(created)
    }

    fn push(&mut self) -> Result<(), GitError> {
        self.opened()?
            .push(REMOTE, &self.config.branch, self.token())
    }
}
