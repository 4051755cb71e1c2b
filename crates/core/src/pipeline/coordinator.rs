//! Concurrent fetching of every project of every enabled source.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::FetchError;
use crate::models::{CommitBatch, FetchSummary, ProjectRef, SourceKind, SourceSummary};
use crate::source::SourceClient;

/// Where a source's project list comes from.
#[derive(Debug, Clone)]
pub enum ProjectSource {
    /// Already discovered by the caller.
    Known(Vec<ProjectRef>),
    /// Discovered by the source task itself; failure skips the source.
    Discover { user: String },
}

/// One source to fetch from.
#[derive(Clone)]
pub struct SourceFetch {
    pub client: Arc<dyn SourceClient>,
    /// Author filter passed to every commit listing.
    pub author: String,
    pub projects: ProjectSource,
}

/// Result of one project task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProjectOutcome {
    Delivered(usize),
    Empty,
    Failed,
}

/// Fans out one task per source and one task per project, sending each
/// non-empty batch to the import queue as soon as it is complete.
pub struct FetchCoordinator {
    primary: SourceFetch,
    secondary: Option<SourceFetch>,
}

impl FetchCoordinator {
    pub fn new(primary: SourceFetch) -> Self {
        Self {
            primary,
            secondary: None,
        }
    }

    pub fn with_secondary(mut self, secondary: Option<SourceFetch>) -> Self {
        self.secondary = secondary;
        self
    }

    /// Run every fetch to completion, then close the queue by dropping `tx`.
    pub async fn run(self, tx: mpsc::Sender<CommitBatch>) -> FetchSummary {
        let primary = tokio::spawn(fetch_source(self.primary, tx.clone()));
        let secondary = self
            .secondary
            .map(|fetch| tokio::spawn(fetch_source(fetch, tx.clone())));

        let primary = join_source(SourceKind::Primary, primary).await;
        let secondary = match secondary {
            Some(handle) => Some(join_source(SourceKind::Secondary, handle).await),
            None => {
                debug!("secondary source disabled");
                None
            }
        };

        drop(tx);
        let summary = FetchSummary { primary, secondary };
        info!(batches = summary.total_batches(), "all fetch tasks finished");
        summary
    }
}

async fn join_source(kind: SourceKind, handle: JoinHandle<SourceSummary>) -> SourceSummary {
    match handle.await {
        Ok(summary) => summary,
        Err(e) => {
            error!(source = %kind, error = %e, "source fetch task panicked");
            SourceSummary {
                failed: 1,
                ..Default::default()
            }
        }
    }
}

async fn fetch_source(fetch: SourceFetch, tx: mpsc::Sender<CommitBatch>) -> SourceSummary {
    let kind = fetch.client.kind();
    let projects = match fetch.projects {
        ProjectSource::Known(projects) => projects,
        ProjectSource::Discover { user } => match fetch.client.list_user_projects(&user).await {
            Ok(projects) => projects,
            Err(e) => {
                warn!(source = %kind, error = %e, "project discovery failed, skipping source");
                return SourceSummary {
                    discovery_failed: true,
                    ..Default::default()
                };
            }
        },
    };
    info!(source = %kind, projects = projects.len(), "fetching commits");

    let handles: Vec<JoinHandle<ProjectOutcome>> = projects
        .into_iter()
        .map(|project| {
            tokio::spawn(fetch_project(
                Arc::clone(&fetch.client),
                project,
                fetch.author.clone(),
                tx.clone(),
            ))
        })
        .collect();
    drop(tx);

    let mut summary = SourceSummary {
        projects: handles.len(),
        ..Default::default()
    };
    for handle in handles {
        match handle.await {
            Ok(ProjectOutcome::Delivered(commits)) => {
                summary.batches += 1;
                summary.commits += commits;
            }
            Ok(ProjectOutcome::Empty) => summary.empty += 1,
            Ok(ProjectOutcome::Failed) => summary.failed += 1,
            Err(e) => {
                error!(source = %kind, error = %e, "project fetch task panicked");
                summary.failed += 1;
            }
        }
    }

    if summary.batches == 0 {
        warn!(source = %kind, "source delivered no commits");
    } else {
        info!(
            source = %kind,
            batches = summary.batches,
            commits = summary.commits,
            failed = summary.failed,
            "source finished"
        );
    }
    summary
}

async fn fetch_project(
    client: Arc<dyn SourceClient>,
    project: ProjectRef,
    author: String,
    tx: mpsc::Sender<CommitBatch>,
) -> ProjectOutcome {
    let kind = client.kind();
    match client.list_project_commits(&project, &author).await {
        Ok(records) if records.is_empty() => ProjectOutcome::Empty,
        Ok(records) => {
            let count = records.len();
            debug!(source = %kind, project = %project, count, "queueing batch");
            if tx.send(CommitBatch::new(kind, project, records)).await.is_err() {
                error!(source = %kind, "import queue closed, batch dropped");
                return ProjectOutcome::Failed;
            }
            ProjectOutcome::Delivered(count)
        }
        Err(FetchError::NoCommits { .. }) => {
            debug!(source = %kind, project = %project, "no commits found");
            ProjectOutcome::Empty
        }
        Err(e) => {
            error!(source = %kind, project = %project, error = %e, "failed to fetch commits");
            ProjectOutcome::Failed
        }
    }
}
