//! Three-phase versioned publish of aggregates to the remote read-store.
//!
//! Items are version-free upserts. Usage and pair statistics are staged
//! under an opaque version token and become visible only when the commit
//! atomically swaps the active-version pointer; any failure rolls the staged
//! version back so readers never observe a half-updated store.

mod client;
mod runner;

pub use client::{ChunkSizes, HttpRemoteClient, ItemsOutcome, RemoteClient};
pub use runner::{format_progress, run_sync, SyncOptions, SyncPhase, SyncProgress, SyncResult};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid auth token; never retried.
    #[error("Unauthorized: invalid auth token")]
    Unauthorized,
    #[error("Server error: {status}")]
    Server { status: u16 },
    #[error("Remote rejected request: {status} - {body}")]
    Rejected { status: u16, body: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}
