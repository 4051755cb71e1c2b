//! Fan-in pipeline between the sources and the local mirror.
//!
//! ```text
//! primary ─┬─ project task ─┐
//!          └─ project task ─┤
//!                           ├─ mpsc queue ─► CommitImporter ─► RepositoryGate
//! secondary ── project task ┘
//! ```
//!
//! Fetching is fully concurrent; importing is strictly sequential. The queue
//! closes when the coordinator drops its sender after every producer task has
//! been joined, which is the importer's only stop signal.

pub mod coordinator;
pub mod importer;

pub use coordinator::{FetchCoordinator, ProjectSource, SourceFetch};
pub use importer::CommitImporter;
