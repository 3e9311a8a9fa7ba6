use std::io;
use std::path::Path;

use async_trait::async_trait;

/// The backing read primitive. The cache core never touches the filesystem
/// directly; everything goes through this seam so tests can substitute
/// slow, failing, or counting readers.
#[async_trait]
pub trait FileReader: Send + Sync + 'static {
    /// Reads the file named by `name` (a `./`-relative sanitized path)
    /// under `root` and returns its full contents.
    async fn read_file(&self, root: &Path, name: &str) -> io::Result<Vec<u8>>;
}

/// Production reader backed by `tokio::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskReader;

#[async_trait]
impl FileReader for DiskReader {
    async fn read_file(&self, root: &Path, name: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(root.join(name)).await
    }
}
