pub mod client;
pub mod config;
pub mod conflict_commands;
pub mod conflict_store;
pub mod db_utils;
pub mod hunks;
pub mod merge;
pub mod models;
pub mod reconciler;
pub mod revision_log;
pub mod server;
pub mod session;
pub mod sqlite_store;
pub mod store;
pub mod transport;

pub use merge::{merge3, MergeResult};
pub use reconciler::{EditAttempt, ReconcileError, SaveOutcome, UpdateReconciler};
pub use store::{InMemoryDocumentStore, StoreError, VersionedDocumentStore, WriteOutcome};
