use std::sync::Arc;

use anyhow::{Result, anyhow};
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::fs::FileReader;

use super::store::{self, StoreOp};
use super::{CacheConfig, CacheStatus, FileRequest, FileResponse};

/// Depth of the store agent's op queue. Writes from miss readers queue here
/// while the agent works; the queue survives clears.
const OP_QUEUE_DEPTH: usize = 64;

struct StoreAgent {
    close_tx: mpsc::Sender<()>,
    handle: JoinHandle<mpsc::Receiver<StoreOp>>,
}

impl StoreAgent {
    fn spawn(capacity: u64, ops: mpsc::Receiver<StoreOp>) -> Self {
        let (close_tx, close_rx) = mpsc::channel(1);
        let handle = tokio::spawn(store::run_agent(capacity, ops, close_rx));
        Self { close_tx, handle }
    }
}

pub(super) struct Coordinator {
    config: Arc<CacheConfig>,
    reader: Arc<dyn FileReader>,
    file_rx: mpsc::Receiver<FileRequest>,
    status_rx: mpsc::Receiver<oneshot::Sender<CacheStatus>>,
    clear_rx: mpsc::Receiver<oneshot::Sender<()>>,
}

impl Coordinator {
    pub(super) fn new(
        config: Arc<CacheConfig>,
        reader: Arc<dyn FileReader>,
        file_rx: mpsc::Receiver<FileRequest>,
        status_rx: mpsc::Receiver<oneshot::Sender<CacheStatus>>,
        clear_rx: mpsc::Receiver<oneshot::Sender<()>>,
    ) -> Self {
        Self {
            config,
            reader,
            file_rx,
            status_rx,
            clear_rx,
        }
    }

    /// Dispatches file, status and clear requests until every handle is
    /// dropped. The store agent is private to this task; only miss readers
    /// share its op queue (for their deferred writes).
    pub(super) async fn run(mut self) {
        let (ops_tx, ops_rx) = mpsc::channel(OP_QUEUE_DEPTH);
        let mut agent = StoreAgent::spawn(self.config.capacity, ops_rx);

        loop {
            tokio::select! {
                request = self.file_rx.recv() => match request {
                    Some(request) => self.handle_file(request, &ops_tx).await,
                    None => break,
                },
                reply = self.status_rx.recv() => match reply {
                    Some(reply) => self.handle_status(reply, &ops_tx).await,
                    None => break,
                },
                reply = self.clear_rx.recv() => match reply {
                    Some(reply) => {
                        agent = match clear_store(agent, self.config.capacity).await {
                            Ok(agent) => agent,
                            Err(err) => {
                                error!(error = %err, "cache clear failed; shutting down");
                                return;
                            }
                        };
                        let _ = reply.send(());
                    }
                    None => break,
                },
            }
        }

        // All handles are gone; retire the agent.
        let _ = agent.close_tx.send(()).await;
        let _ = agent.handle.await;
    }

    async fn handle_file(&self, request: FileRequest, ops_tx: &mpsc::Sender<StoreOp>) {
        let FileRequest { name, reply } = request;
        let (read_tx, read_rx) = oneshot::channel();
        let lookup = ops_tx
            .send(StoreOp::Read {
                name: name.clone(),
                reply: read_tx,
            })
            .await;
        if lookup.is_err() {
            let _ = reply.send(FileResponse::FileError { name });
            return;
        }
        match read_rx.await {
            Ok(Some(entry)) => {
                debug!(name, "cache hit");
                let _ = reply.send(FileResponse::Ok {
                    name,
                    bytes: entry.bytes,
                });
            }
            Ok(None) => {
                debug!(name, "cache miss");
                spawn_miss_reader(
                    FileRequest { name, reply },
                    self.reader.clone(),
                    self.config.clone(),
                    ops_tx.clone(),
                );
            }
            Err(_) => {
                // The lookup was discarded (a clear raced it); the request
                // must still get an answer.
                let _ = reply.send(FileResponse::FileError { name });
            }
        }
    }

    async fn handle_status(
        &self,
        reply: oneshot::Sender<CacheStatus>,
        ops_tx: &mpsc::Sender<StoreOp>,
    ) {
        let (stats_tx, stats_rx) = oneshot::channel();
        if ops_tx
            .send(StoreOp::Stats { reply: stats_tx })
            .await
            .is_err()
        {
            return;
        }
        if let Ok(stats) = stats_rx.await {
            let _ = reply.send(CacheStatus {
                items: stats.items,
                total_bytes: stats.total_bytes,
                capacity: self.config.capacity,
            });
        }
    }
}

/// Tears the store down and stands up an empty replacement: close sentinel
/// first, then a non-blocking drain of whatever operations were still
/// queued, then a fresh agent on the same queue. Writes from in-flight miss
/// readers that arrive mid-drain are discarded; later ones reach the new
/// store.
async fn clear_store(agent: StoreAgent, capacity: u64) -> Result<StoreAgent> {
    let _ = agent.close_tx.send(()).await;
    let mut ops = agent
        .handle
        .await
        .map_err(|err| anyhow!("store agent task failed: {err}"))?;
    let mut discarded = 0usize;
    while ops.try_recv().is_ok() {
        discarded += 1;
    }
    debug!(discarded, "cache cleared");
    Ok(StoreAgent::spawn(capacity, ops))
}

/// Handles one cache miss: performs the backing read in its own task, races
/// it against the request deadline, and answers the caller exactly once.
/// A timed-out read is not abandoned; the reader waits it out so a late
/// success still populates the store. Failed reads never touch the store.
fn spawn_miss_reader(
    request: FileRequest,
    reader: Arc<dyn FileReader>,
    config: Arc<CacheConfig>,
    ops_tx: mpsc::Sender<StoreOp>,
) {
    tokio::spawn(async move {
        let FileRequest { name, reply } = request;

        let mut read_task = {
            let reader = reader.clone();
            let root = config.root.clone();
            let name = name.clone();
            tokio::spawn(async move { reader.read_file(&root, &name).await })
        };

        match tokio::time::timeout(config.timeout, &mut read_task).await {
            Ok(joined) => match flatten_read(joined) {
                Ok(bytes) => {
                    let bytes = Bytes::from(bytes);
                    // Enqueue the write before replying so a status request
                    // issued after the response observes the entry.
                    let _ = ops_tx
                        .send(StoreOp::Write {
                            name: name.clone(),
                            bytes: bytes.clone(),
                        })
                        .await;
                    let _ = reply.send(FileResponse::Ok { name, bytes });
                }
                Err(err) => {
                    debug!(name, error = %err, "backing read failed");
                    let _ = reply.send(FileResponse::FileError { name });
                }
            },
            Err(_) => {
                debug!(name, "backing read deadline elapsed");
                let _ = reply.send(FileResponse::Timeout { name: name.clone() });
                match flatten_read(read_task.await) {
                    Ok(bytes) => {
                        let _ = ops_tx
                            .send(StoreOp::Write {
                                name,
                                bytes: Bytes::from(bytes),
                            })
                            .await;
                    }
                    Err(err) => {
                        debug!(name, error = %err, "backing read failed after timeout");
                    }
                }
            }
        }
    });
}

fn flatten_read(
    joined: Result<std::io::Result<Vec<u8>>, tokio::task::JoinError>,
) -> std::io::Result<Vec<u8>> {
    joined.map_err(std::io::Error::other)?
}
