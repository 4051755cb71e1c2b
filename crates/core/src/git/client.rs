//! Local Git repository operations via `git2`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use git2::{
    Commit, Cred, ErrorCode, FetchOptions, Oid, PushOptions, RemoteCallbacks, Repository,
    RepositoryInitOptions, Signature,
};
use tracing::{debug, info, instrument, warn};

use crate::errors::GitError;

/// High-level Git client wrapping a `git2::Repository`.
pub struct GitClient {
    repo: Repository,
    repo_path: PathBuf,
}

/// What a pull did to the local branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// The remote has no such branch yet (empty origin).
    NoRemoteBranch,
    /// The local branch was unborn and now tracks the remote tip.
    Adopted,
    UpToDate,
    FastForwarded,
}

fn auth_callbacks(token: Option<&str>) -> RemoteCallbacks<'static> {
    let mut callbacks = RemoteCallbacks::new();
    if let Some(tok) = token {
        let tok = tok.to_string();
        callbacks.credentials(move |_url, _username, _allowed| {
            Cred::userpass_plaintext("x-access-token", &tok)
        });
    }
    callbacks
}

impl GitClient {
    /// Open an existing Git repository at `repo_path`.
    pub fn open<P: AsRef<Path>>(repo_path: P) -> Result<Self, GitError> {
        let path = repo_path.as_ref();
        info!(path = %path.display(), "opening git repository");
        let repo = Repository::open(path)
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;
        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
        })
    }

    /// Clone a remote repository to `path`.
    #[instrument(skip(token), fields(url = %url, path = %path.display()))]
    pub fn clone_repo(url: &str, path: &Path, token: Option<&str>) -> Result<Self, GitError> {
        info!("cloning git repository");
        let mut fetch_opts = FetchOptions::new();
        fetch_opts.remote_callbacks(auth_callbacks(token));
        let mut builder = git2::build::RepoBuilder::new();
        builder.fetch_options(fetch_opts);
        let repo = builder.clone(url, path)?;
        info!("clone completed");
        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
        })
    }

    /// Initialize a fresh repository on `branch` with `url` as its `origin`.
    #[instrument(fields(path = %path.display()))]
    pub fn init_with_origin(path: &Path, branch: &str, url: &str) -> Result<Self, GitError> {
        std::fs::create_dir_all(path)?;
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head(branch);
        let repo = Repository::init_opts(path, &opts)?;
        repo.remote("origin", url)?;
        info!("initialized new repository");
        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
        })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Make `refs/heads/<branch>` the checked-out branch.
    ///
    /// A missing local branch is created from `<remote>/<branch>` when the
    /// remote has it, otherwise from the current HEAD commit. With no commit
    /// to start from, HEAD is left pointing at the unborn branch.
    pub fn switch_to_branch(&self, remote_name: &str, branch: &str) -> Result<(), GitError> {
        let local_ref = format!("refs/heads/{}", branch);
        match self.repo.find_reference(&local_ref) {
            Ok(_) => {}
            Err(e) if e.code() == ErrorCode::NotFound => {
                let remote_ref = format!("refs/remotes/{}/{}", remote_name, branch);
                let start = match self.repo.find_reference(&remote_ref) {
                    Ok(reference) => Some(reference.peel_to_commit()?),
                    Err(e) if e.code() == ErrorCode::NotFound => self.head_commit()?,
                    Err(e) => return Err(e.into()),
                };
                if let Some(commit) = start {
                    self.repo.branch(branch, &commit, false)?;
                    info!(branch, from = %commit.id(), "created local branch");
                }
            }
            Err(e) => return Err(e.into()),
        }

        self.repo.set_head(&local_ref)?;
        if self.head_commit()?.is_some() {
            self.repo
                .checkout_head(Some(git2::build::CheckoutBuilder::new().force()))?;
        }
        debug!(refname = %local_ref, "switched HEAD");
        Ok(())
    }

    /// The commit HEAD points at, or `None` on an unborn branch.
    pub fn head_commit(&self) -> Result<Option<Commit<'_>>, GitError> {
        match self.repo.head() {
            Ok(head) => Ok(Some(head.peel_to_commit()?)),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Return the SHA of HEAD, if any.
    pub fn head_sha(&self) -> Result<Option<String>, GitError> {
        Ok(self.head_commit()?.map(|c| c.id().to_string()))
    }

    /// Fetch from a named remote.
    #[instrument(skip(self, token))]
    pub fn fetch(&self, remote_name: &str, token: Option<&str>) -> Result<(), GitError> {
        info!(remote = remote_name, "fetching");
        let mut remote = self.repo.find_remote(remote_name)?;
        let mut fetch_opts = FetchOptions::new();
        fetch_opts.remote_callbacks(auth_callbacks(token));
        remote.fetch(&[] as &[&str], Some(&mut fetch_opts), None)?;
        debug!("fetch completed");
        Ok(())
    }

    /// Fetch and fast-forward `branch` to its remote counterpart.
    #[instrument(skip(self, token))]
    pub fn pull(
        &self,
        remote_name: &str,
        branch: &str,
        token: Option<&str>,
    ) -> Result<PullOutcome, GitError> {
        self.fetch(remote_name, token)?;

        let remote_ref = format!("refs/remotes/{}/{}", remote_name, branch);
        let fetch_commit = match self.repo.find_reference(&remote_ref) {
            Ok(reference) => reference.peel_to_commit()?,
            Err(e) if e.code() == ErrorCode::NotFound => {
                info!(remote_ref, "remote branch does not exist yet");
                return Ok(PullOutcome::NoRemoteBranch);
            }
            Err(e) => return Err(e.into()),
        };

        let local_ref = format!("refs/heads/{}", branch);
        let outcome = match self.repo.find_reference(&local_ref) {
            Err(e) if e.code() == ErrorCode::NotFound => {
                self.repo.reference(
                    &local_ref,
                    fetch_commit.id(),
                    false,
                    "activity-importer: adopt remote branch",
                )?;
                PullOutcome::Adopted
            }
            Err(e) => return Err(e.into()),
            Ok(mut local) => {
                let theirs = self.repo.find_annotated_commit(fetch_commit.id())?;
                let (analysis, _) = self.repo.merge_analysis_for_ref(&local, &[&theirs])?;
                if analysis.is_up_to_date() {
                    PullOutcome::UpToDate
                } else if analysis.is_fast_forward() {
                    local.set_target(fetch_commit.id(), "activity-importer: fast-forward pull")?;
                    PullOutcome::FastForwarded
                } else {
                    warn!(branch, "local branch diverged from remote");
                    return Err(GitError::Diverged(branch.to_string()));
                }
            }
        };

        if outcome != PullOutcome::UpToDate {
            self.repo.set_head(&local_ref)?;
            self.repo
                .checkout_head(Some(git2::build::CheckoutBuilder::new().force()))?;
        }
        info!(?outcome, "pull completed");
        Ok(outcome)
    }

    /// Collect the (trimmed) message of every commit reachable from HEAD.
    pub fn commit_messages(&self) -> Result<HashSet<String>, GitError> {
        let mut messages = HashSet::new();
        if self.head_commit()?.is_none() {
            return Ok(messages);
        }
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push_head()?;
        for oid_result in revwalk {
            let commit = self.repo.find_commit(oid_result?)?;
            messages.insert(commit.message().unwrap_or("").trim().to_string());
        }
        debug!(count = messages.len(), "collected commit messages");
        Ok(messages)
    }

    /// Create a commit on HEAD that reuses the parent's tree (or the empty
    /// tree on an unborn branch), so it carries no file changes.
    #[instrument(skip(self, name, email))]
    pub fn commit_empty(
        &self,
        message: &str,
        name: &str,
        email: &str,
        when: DateTime<Utc>,
    ) -> Result<Oid, GitError> {
        let parent = self.head_commit()?;
        let tree = match &parent {
            Some(commit) => commit.tree()?,
            None => {
                let oid = self.repo.treebuilder(None)?.write()?;
                self.repo.find_tree(oid)?
            }
        };
        let signature = Signature::new(name, email, &git2::Time::new(when.timestamp(), 0))?;
        let parents: Vec<&Commit<'_>> = parent.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
        debug!(sha = %oid, "created commit");
        Ok(oid)
    }

    /// Push a local branch to a remote.
    #[instrument(skip(self, token))]
    pub fn push(&self, remote_name: &str, branch: &str, token: Option<&str>) -> Result<(), GitError> {
        info!(remote = remote_name, branch, "pushing");
        let mut remote = self.repo.find_remote(remote_name)?;
        let mut callbacks = auth_callbacks(token);
        let push_error = Arc::new(Mutex::new(None::<String>));
        let push_error_clone = push_error.clone();
        callbacks.push_update_reference(move |refname, status| {
            if let Some(msg) = status {
                warn!(refname, msg, "push rejected");
                *push_error_clone.lock().unwrap_or_else(|e| e.into_inner()) =
                    Some(msg.to_string());
            }
            Ok(())
        });
        let mut push_opts = PushOptions::new();
        push_opts.remote_callbacks(callbacks);
        let refspec = format!("refs/heads/{}:refs/heads/{}", branch, branch);
        remote.push(&[&refspec], Some(&mut push_opts))?;
        let rejected = push_error.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(detail) = rejected {
            return Err(GitError::PushRejected {
                branch: branch.to_string(),
                detail,
            });
        }
        info!("push completed");
        Ok(())
    }
}
