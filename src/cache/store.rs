use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// A cached file. Published entries are immutable; a re-cache under the same
/// name replaces the entry wholesale.
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub bytes: Bytes,
}

impl Entry {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub items: usize,
    pub total_bytes: u64,
}

/// One message on the store agent's input queue. Reads and stats carry their
/// own reply channel; writes are fire-and-forget from miss readers.
#[derive(Debug)]
pub(crate) enum StoreOp {
    Read {
        name: String,
        reply: oneshot::Sender<Option<Entry>>,
    },
    Write {
        name: String,
        bytes: Bytes,
    },
    Stats {
        reply: oneshot::Sender<StoreStats>,
    },
}

/// The cache table and its byte accounting. Owned exclusively by the agent
/// task; serializing every operation through the agent's queue is the only
/// synchronization.
#[derive(Debug)]
pub(crate) struct Store {
    entries: HashMap<String, Entry>,
    total_bytes: u64,
    capacity: u64,
}

impl Store {
    pub(crate) fn new(capacity: u64) -> Self {
        Self {
            entries: HashMap::new(),
            total_bytes: 0,
            capacity,
        }
    }

    pub(crate) fn read(&self, name: &str) -> Option<Entry> {
        self.entries.get(name).cloned()
    }

    /// Insert-or-replace with capacity enforcement. Oversized payloads are
    /// dropped without disturbing existing entries; otherwise arbitrary
    /// victims are evicted until the new entry fits.
    pub(crate) fn write(&mut self, name: String, bytes: Bytes) {
        let size = bytes.len() as u64;
        if size > self.capacity {
            debug!(name, size, capacity = self.capacity, "skipping oversized entry");
            return;
        }
        if let Some(old) = self.entries.remove(&name) {
            self.total_bytes -= old.size();
        }
        while self.total_bytes + size > self.capacity {
            let victim = match self.entries.keys().next() {
                Some(key) => key.clone(),
                None => break,
            };
            if let Some(evicted) = self.entries.remove(&victim) {
                self.total_bytes -= evicted.size();
                debug!(name = victim, size = evicted.size(), "evicted entry");
            }
        }
        debug!(name, size, "caching entry");
        self.total_bytes += size;
        self.entries.insert(name.clone(), Entry { name, bytes });
    }

    pub(crate) fn stats(&self) -> StoreStats {
        StoreStats {
            items: self.entries.len(),
            total_bytes: self.total_bytes,
        }
    }

    fn apply(&mut self, op: StoreOp) {
        match op {
            StoreOp::Read { name, reply } => {
                let _ = reply.send(self.read(&name));
            }
            StoreOp::Write { name, bytes } => self.write(name, bytes),
            StoreOp::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
    }
}

/// Runs a store agent until it is told to close (or every sender is gone).
/// The close signal wins over queued operations, and the op receiver is
/// handed back so the coordinator can drain it and seed a fresh agent on the
/// same queue.
pub(crate) async fn run_agent(
    capacity: u64,
    mut ops: mpsc::Receiver<StoreOp>,
    mut close: mpsc::Receiver<()>,
) -> mpsc::Receiver<StoreOp> {
    let mut store = Store::new(capacity);
    loop {
        tokio::select! {
            biased;
            _ = close.recv() => return ops,
            op = ops.recv() => match op {
                Some(op) => store.apply(op),
                None => return ops,
            },
        }
    }
}
