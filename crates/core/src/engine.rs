//! Run orchestration for the activity importer.
//!
//! An [`ImportRun`] walks a single import through its states:
//!
//! 1. Resolve the authenticated primary user and discover their projects.
//! 2. Open the mirror repository and pull it up to date.
//! 3. Fetch every project concurrently while importing batches sequentially.
//! 4. Push, but only if at least one commit was created.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::ImporterConfig;
use crate::errors::{CoreError, GitError};
use crate::git::RepositoryGate;
use crate::models::{FetchSummary, ImportSummary, RunOutcome, RunReport, RunState};
use crate::pipeline::{CommitImporter, FetchCoordinator, ProjectSource, SourceFetch};
use crate::source::{SourceClient, UserResolver};

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// One import run against a repository gate `G`.
pub struct ImportRun<G: RepositoryGate> {
    config: ImporterConfig,
    resolver: Arc<dyn UserResolver>,
    primary: Arc<dyn SourceClient>,
    secondary: Option<Arc<dyn SourceClient>>,
    /// `None` only while a blocking task holds the gate.
    gate: Option<G>,
    state: RunState,
}

impl<G: RepositoryGate> ImportRun<G> {
    pub fn new(
        config: ImporterConfig,
        resolver: Arc<dyn UserResolver>,
        primary: Arc<dyn SourceClient>,
        gate: G,
    ) -> Self {
        Self {
            config,
            resolver,
            primary,
            secondary: None,
            gate: Some(gate),
            state: RunState::Init,
        }
    }

    /// Attach the secondary source client. It is only used when the
    /// configuration enables the secondary source.
    pub fn with_secondary(mut self, client: Arc<dyn SourceClient>) -> Self {
        self.secondary = Some(client);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Give the gate back, e.g. to inspect it after a run. `None` after
    /// [`RunState::ImportFailed`], since the failed importer task owned it.
    pub fn into_gate(self) -> Option<G> {
        self.gate
    }

    fn set_state(&mut self, next: RunState) {
        info!(from = %self.state, to = %next, "state transition");
        self.state = next;
    }

    /// Execute the run. Only user resolution, primary discovery, and the
    /// open, pull and push steps are fatal.
    pub async fn run(&mut self) -> Result<RunReport, CoreError> {
        let started = Instant::now();
        self.set_state(RunState::ConfigLoaded);

        let user = self.resolver.current_user().await?;
        info!(id = %user.id, username = %user.username, "resolved user");
        self.set_state(RunState::UserResolved);

        let projects = self.primary.list_user_projects(&user.id).await?;
        info!(count = projects.len(), "discovered primary projects");
        self.set_state(RunState::ProjectsDiscovered);

        if projects.is_empty() {
            warn!("no contributions found on the primary source");
            self.set_state(RunState::NoContributions);
            return Ok(RunReport {
                outcome: RunOutcome::NoContributions,
                fetch: FetchSummary::default(),
                import: ImportSummary::default(),
                elapsed: started.elapsed(),
            });
        }

        self.with_gate(|gate| gate.open()).await?;
        self.set_state(RunState::RepoOpened);
        self.with_gate(|gate| gate.pull()).await?;
        self.set_state(RunState::RepoPulled);

        self.set_state(RunState::FetchingAndImporting);
        let primary = SourceFetch {
            client: Arc::clone(&self.primary),
            author: self.config.primary.username.clone(),
            projects: ProjectSource::Known(projects),
        };
        let coordinator = FetchCoordinator::new(primary).with_secondary(self.secondary_fetch());

        let gate = self.take_gate()?;
        let (tx, rx) = mpsc::channel(self.config.settings.queue_capacity.max(1));
        let (fetch, imported) = tokio::join!(coordinator.run(tx), CommitImporter::new(gate).run(rx));
        let (gate, import) = match imported {
            Ok(done) => done,
            Err(e) => {
                error!(error = %e, "importer stopped, repository gate lost");
                self.set_state(RunState::ImportFailed);
                return Err(e.into());
            }
        };
        self.gate = Some(gate);

        let outcome = if import.commits_created == 0 {
            info!("no new commits to push");
            self.set_state(RunState::NoNewCommits);
            RunOutcome::NoNewCommits
        } else {
            if let Err(e) = self.with_gate(|gate| gate.push()).await {
                error!(error = %e, commits = import.commits_created, "push failed");
                self.set_state(RunState::PushFailed);
                return Err(e);
            }
            self.set_state(RunState::Pushed);
            RunOutcome::Pushed {
                commits: import.commits_created,
            }
        };

        let elapsed = started.elapsed();
        info!(?outcome, ?elapsed, "run finished");
        Ok(RunReport {
            outcome,
            fetch,
            import,
            elapsed,
        })
    }

    fn secondary_fetch(&self) -> Option<SourceFetch> {
        match (&self.secondary, &self.config.secondary) {
            (Some(client), Some(source)) => Some(SourceFetch {
                client: Arc::clone(client),
                author: source.username.clone(),
                projects: ProjectSource::Discover {
                    user: source.username.clone(),
                },
            }),
            (Some(_), None) => {
                debug!("secondary client supplied but not configured, ignoring");
                None
            }
            _ => None,
        }
    }

    fn take_gate(&mut self) -> Result<G, CoreError> {
        self.gate
            .take()
            .ok_or_else(|| CoreError::Task("repository gate is unavailable".into()))
    }

    /// Run a synchronous gate operation on the blocking pool.
    async fn with_gate<T, F>(&mut self, op: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut G) -> Result<T, GitError> + Send + 'static,
        T: Send + 'static,
    {
        let mut gate = self.take_gate()?;
        let (gate, result) = tokio::task::spawn_blocking(move || {
            let result = op(&mut gate);
            (gate, result)
        })
        .await
        .map_err(|e| CoreError::Task(e.to_string()))?;
        self.gate = Some(gate);
        Ok(result?)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::config::{ImporterSection, MirrorConfig, SourceConfig};
    use crate::errors::{DiscoveryError, FetchError, ImportError, SourceError};
    use crate::models::{CommitBatch, CommitRecord, ProjectRef, SourceKind, SourceUser};

    fn config() -> ImporterConfig {
        ImporterConfig {
            primary: SourceConfig {
                base_url: "https://gitlab.example.com".into(),
                token: "t".into(),
                username: "me".into(),
            },
            secondary: None,
            mirror: MirrorConfig {
                repo_dir: PathBuf::from("unused"),
                branch: "main".into(),
                origin_url: "https://example.com/r.git".into(),
                origin_token: "o".into(),
                committer_name: "me".into(),
                committer_email: "me@example.com".into(),
            },
            settings: ImporterSection::default(),
        }
    }

    struct Resolver(bool);

    #[async_trait]
    impl UserResolver for Resolver {
        async fn current_user(&self) -> Result<SourceUser, DiscoveryError> {
            if self.0 {
                Ok(SourceUser {
                    id: "7".into(),
                    username: "me".into(),
                })
            } else {
                Err(DiscoveryError::User {
                    source_kind: SourceKind::Primary,
                    cause: SourceError::ApiError {
                        status: 401,
                        body: "401 Unauthorized".into(),
                    },
                })
            }
        }
    }

    /// Every project yields one commit whose id is the project id.
    #[derive(Default)]
    struct Projects {
        ids: Vec<u64>,
        fail_discovery: bool,
        fetches: Arc<AtomicUsize>,
    }

    impl Projects {
        fn new(ids: Vec<u64>) -> Self {
            Self {
                ids,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl SourceClient for Projects {
        fn kind(&self) -> SourceKind {
            SourceKind::Primary
        }

        async fn list_user_projects(&self, user: &str) -> Result<Vec<ProjectRef>, DiscoveryError> {
            if self.fail_discovery {
                return Err(DiscoveryError::Projects {
                    source_kind: SourceKind::Primary,
                    user: user.to_string(),
                    cause: SourceError::ApiError {
                        status: 503,
                        body: "unavailable".into(),
                    },
                });
            }
            Ok(self.ids.iter().copied().map(ProjectRef::Id).collect())
        }

        async fn list_project_commits(
            &self,
            project: &ProjectRef,
            _author: &str,
        ) -> Result<Vec<CommitRecord>, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(vec![CommitRecord {
                id: project.to_string(),
                message: String::new(),
                author_name: "me".into(),
                author_email: "me@example.com".into(),
                authored_date: chrono::Utc::now(),
            }])
        }
    }

    #[derive(Clone, Default)]
    struct Gate {
        pushes: Arc<AtomicUsize>,
        fail_pull: bool,
        fail_push: bool,
        panic_on_import: bool,
        existing: bool,
    }

    impl RepositoryGate for Gate {
        fn open(&mut self) -> Result<(), GitError> {
            Ok(())
        }
        fn pull(&mut self) -> Result<(), GitError> {
            if self.fail_pull {
                return Err(GitError::Diverged("main".into()));
            }
            Ok(())
        }
        fn create_local_commits(&mut self, batch: &CommitBatch) -> Result<usize, GitError> {
            if self.panic_on_import {
                panic!("repository vanished");
            }
            Ok(if self.existing { 0 } else { batch.len() })
        }
        fn push(&mut self) -> Result<(), GitError> {
            self.pushes.fetch_add(1, Ordering::SeqCst);
            if self.fail_push {
                return Err(GitError::PushRejected {
                    branch: "main".into(),
                    detail: "non-fast-forward".into(),
                });
            }
            Ok(())
        }
    }

    fn run_with(projects: Vec<u64>, gate: Gate, resolves: bool) -> ImportRun<Gate> {
        run_with_source(Projects::new(projects), gate, resolves)
    }

    fn run_with_source(source: Projects, gate: Gate, resolves: bool) -> ImportRun<Gate> {
        ImportRun::new(
            config(),
            Arc::new(Resolver(resolves)),
            Arc::new(source),
            gate,
        )
    }

    #[tokio::test]
    async fn test_pushes_when_commits_created() {
        let gate = Gate::default();
        let pushes = gate.pushes.clone();
        let mut run = run_with(vec![1, 2, 3], gate, true);

        let report = run.run().await.unwrap();
        assert_eq!(report.outcome, RunOutcome::Pushed { commits: 3 });
        assert_eq!(report.fetch.primary.batches, 3);
        assert_eq!(run.state(), RunState::Pushed);
        assert_eq!(pushes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_new_commits_skips_push() {
        let gate = Gate {
            existing: true,
            ..Default::default()
        };
        let pushes = gate.pushes.clone();
        let mut run = run_with(vec![1], gate, true);

        let report = run.run().await.unwrap();
        assert_eq!(report.outcome, RunOutcome::NoNewCommits);
        assert_eq!(run.state(), RunState::NoNewCommits);
        assert_eq!(pushes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_projects_means_no_contributions() {
        let gate = Gate::default();
        let pushes = gate.pushes.clone();
        let mut run = run_with(Vec::new(), gate, true);

        let report = run.run().await.unwrap();
        assert_eq!(report.outcome, RunOutcome::NoContributions);
        assert_eq!(run.state(), RunState::NoContributions);
        assert_eq!(pushes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_user_resolution_failure_is_fatal() {
        let mut run = run_with(vec![1], Gate::default(), false);
        let err = run.run().await.unwrap_err();
        assert!(matches!(err, CoreError::Discovery(DiscoveryError::User { .. })));
        assert_eq!(run.state(), RunState::ConfigLoaded);
    }

    #[tokio::test]
    async fn test_push_failure_is_fatal() {
        let gate = Gate {
            fail_push: true,
            ..Default::default()
        };
        let mut run = run_with(vec![1], gate, true);
        let err = run.run().await.unwrap_err();
        assert!(matches!(err, CoreError::Git(GitError::PushRejected { .. })));
        assert_eq!(run.state(), RunState::PushFailed);
        assert!(run.into_gate().is_some());
    }

    #[tokio::test]
    async fn test_primary_discovery_failure_is_fatal() {
        let source = Projects {
            ids: vec![1],
            fail_discovery: true,
            ..Default::default()
        };
        let fetches = source.fetches.clone();
        let gate = Gate::default();
        let pushes = gate.pushes.clone();
        let mut run = run_with_source(source, gate, true);

        let err = run.run().await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Discovery(DiscoveryError::Projects {
                source_kind: SourceKind::Primary,
                ..
            })
        ));
        assert_eq!(run.state(), RunState::UserResolved);
        assert_eq!(fetches.load(Ordering::SeqCst), 0);
        assert_eq!(pushes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pull_failure_stops_before_fetching() {
        let source = Projects::new(vec![1, 2]);
        let fetches = source.fetches.clone();
        let gate = Gate {
            fail_pull: true,
            ..Default::default()
        };
        let pushes = gate.pushes.clone();
        let mut run = run_with_source(source, gate, true);

        let err = run.run().await.unwrap_err();
        assert!(matches!(err, CoreError::Git(GitError::Diverged(_))));
        assert_eq!(run.state(), RunState::RepoOpened);
        assert_eq!(fetches.load(Ordering::SeqCst), 0);
        assert_eq!(pushes.load(Ordering::SeqCst), 0);
        assert!(run.into_gate().is_some());
    }

    #[tokio::test]
    async fn test_importer_failure_ends_in_terminal_state() {
        let gate = Gate {
            panic_on_import: true,
            ..Default::default()
        };
        let pushes = gate.pushes.clone();
        let mut run = run_with(vec![1], gate, true);

        let err = run.run().await.unwrap_err();
        assert!(matches!(err, CoreError::Import(ImportError::TaskFailed(_))));
        assert_eq!(run.state(), RunState::ImportFailed);
        assert_eq!(pushes.load(Ordering::SeqCst), 0);
        assert!(run.into_gate().is_none());
    }
}
