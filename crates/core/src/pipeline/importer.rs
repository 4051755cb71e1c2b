//! Sequential consumer that turns queued batches into local commits.

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::errors::ImportError;
use crate::git::RepositoryGate;
use crate::models::{CommitBatch, ImportSummary};

/// Drains the import queue on a blocking thread, one batch at a time, in
/// arrival order.
pub struct CommitImporter<G: RepositoryGate> {
    gate: G,
}

impl<G: RepositoryGate> CommitImporter<G> {
    pub fn new(gate: G) -> Self {
        Self { gate }
    }

    /// Consume the queue until every sender is gone, then hand the gate back.
    pub async fn run(
        self,
        rx: mpsc::Receiver<CommitBatch>,
    ) -> Result<(G, ImportSummary), ImportError> {
        tokio::task::spawn_blocking(move || self.drain(rx))
            .await
            .map_err(|e| ImportError::TaskFailed(e.to_string()))
    }

    /// Blocking body of [`run`](Self::run). Must not be called from an async
    /// context.
    pub fn drain(mut self, mut rx: mpsc::Receiver<CommitBatch>) -> (G, ImportSummary) {
        let mut summary = ImportSummary::default();
        while let Some(batch) = rx.blocking_recv() {
            match self.gate.create_local_commits(&batch) {
                Ok(created) => {
                    summary.batches_imported += 1;
                    summary.commits_created += created;
                }
                Err(cause) => {
                    let err = ImportError::Batch {
                        source_kind: batch.source,
                        project: batch.project.to_string(),
                        cause,
                    };
                    error!(error = %err, "batch import failed");
                    summary.batches_failed += 1;
                }
            }
        }
        info!(
            imported = summary.batches_imported,
            failed = summary.batches_failed,
            commits = summary.commits_created,
            "import queue drained"
        );
        (self.gate, summary)
    }
}
