use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration as StdDuration;

use async_trait::async_trait;

use stashd::fs::FileReader;

type Script = Box<dyn Fn(&str) -> io::Result<Vec<u8>> + Send + Sync>;

/// Backing reader driven by a closure, standing in for the filesystem the
/// way the production reader would. Counts reads and optionally sleeps
/// before answering.
pub struct ScriptedReader {
    reads: AtomicUsize,
    delay: Option<StdDuration>,
    script: Script,
}

impl ScriptedReader {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&str) -> io::Result<Vec<u8>> + Send + Sync + 'static,
    {
        Self {
            reads: AtomicUsize::new(0),
            delay: None,
            script: Box::new(script),
        }
    }

    /// Reader answering `FID:<name tail>` for every `./<tail>` request.
    pub fn fid() -> Self {
        Self::new(|name| Ok(format!("FID:{}", name.trim_start_matches("./")).into_bytes()))
    }

    pub fn with_delay(mut self, delay: StdDuration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileReader for ScriptedReader {
    async fn read_file(&self, _root: &Path, name: &str) -> io::Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.script)(name)
    }
}
