//! The cache engine: a byte-bounded in-memory content cache fronted by a
//! single-threaded coordinator, with one serialized store agent and one
//! short-lived miss reader per cache miss.

mod coordinator;
pub mod path;
mod store;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::fs::FileReader;
use crate::settings::Settings;

use coordinator::Coordinator;

/// Depth of the request queues feeding the coordinator.
const REQUEST_QUEUE_DEPTH: usize = 64;

/// Immutable cache parameters, fixed at startup.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum total bytes the store may hold.
    pub capacity: u64,
    /// How long a request waits for its backing read before timing out.
    pub timeout: Duration,
    /// Document root handed to the backing reader.
    pub root: PathBuf,
}

impl CacheConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            capacity: settings.capacity,
            timeout: settings.read_timeout(),
            root: settings.document_root.clone(),
        }
    }
}

/// The answer to a file request. Exactly one of these is delivered per
/// request.
#[derive(Debug, Clone)]
pub enum FileResponse {
    Ok { name: String, bytes: Bytes },
    FileError { name: String },
    Timeout { name: String },
}

/// A point-in-time view of the store, formatted for the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatus {
    pub items: usize,
    pub total_bytes: u64,
    pub capacity: u64,
}

impl fmt::Display for CacheStatus {
    // The square brackets around the byte count are part of the contract;
    // external tooling extracts it with `\[(.*?)\]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} items in the cache totaling [{}] bytes out of a maximum of {} bytes",
            self.items, self.total_bytes, self.capacity
        )
    }
}

/// A sanitized file request awaiting its single response.
#[derive(Debug)]
pub(crate) struct FileRequest {
    pub(crate) name: String,
    pub(crate) reply: oneshot::Sender<FileResponse>,
}

/// Cloneable handle to a running cache. All interaction with the cache goes
/// through these channel endpoints; the coordinator and store tasks shut
/// down once every handle is dropped.
#[derive(Clone)]
pub struct CacheHandle {
    file_tx: mpsc::Sender<FileRequest>,
    status_tx: mpsc::Sender<oneshot::Sender<CacheStatus>>,
    clear_tx: mpsc::Sender<oneshot::Sender<()>>,
}

impl CacheHandle {
    /// Starts the coordinator (and its store agent) and returns the handle
    /// the HTTP adapter talks to.
    pub fn spawn(config: CacheConfig, reader: Arc<dyn FileReader>) -> Self {
        let (file_tx, file_rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let (status_tx, status_rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let (clear_tx, clear_rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let coordinator = Coordinator::new(Arc::new(config), reader, file_rx, status_rx, clear_rx);
        tokio::spawn(coordinator.run());
        Self {
            file_tx,
            status_tx,
            clear_tx,
        }
    }

    /// Sanitizes `raw_path` and fetches the named file, from cache or from
    /// the backing reader. Paths that sanitize to nothing are answered with
    /// a file error without consulting the cache.
    pub async fn fetch(&self, raw_path: &str) -> Result<FileResponse> {
        let name = match path::sanitize(raw_path) {
            Ok(name) => name,
            Err(_) => {
                return Ok(FileResponse::FileError {
                    name: raw_path.to_string(),
                });
            }
        };
        let (reply, response) = oneshot::channel();
        self.file_tx
            .send(FileRequest { name, reply })
            .await
            .context("cache coordinator is not running")?;
        response
            .await
            .context("cache dropped the request without answering")
    }

    pub async fn status(&self) -> Result<CacheStatus> {
        let (reply, response) = oneshot::channel();
        self.status_tx
            .send(reply)
            .await
            .context("cache coordinator is not running")?;
        response
            .await
            .context("cache dropped the status request without answering")
    }

    /// Clears the cache by tearing down the store and standing up an empty
    /// one. Resolves once the replacement store is accepting operations.
    /// Concurrent clears are not supported.
    pub async fn clear(&self) -> Result<()> {
        let (reply, done) = oneshot::channel();
        self.clear_tx
            .send(reply)
            .await
            .context("cache coordinator is not running")?;
        done.await
            .context("cache dropped the clear request without answering")
    }
}
