use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use stashd::{
    cache::{CacheConfig, CacheHandle},
    cli::LogFormat,
    fs::{DiskReader, FileReader},
    server::{self, AppContext},
    settings::Settings,
};

use super::net::{find_free_port, wait_for_listener};

fn default_test_settings(port: u16, document_root: PathBuf) -> Settings {
    Settings {
        port,
        capacity: 1_000_000,
        timeout: 2,
        document_root,
        debug: false,
        log: LogFormat::Text,
        max_request_header_size: 32 * 1024,
        keepalive_idle_timeout: 10,
        request_header_timeout: 5,
        client_write_timeout: 10,
    }
}

pub struct ServerHarness {
    pub addr: SocketAddr,
    pub settings: Arc<Settings>,
    pub cache: CacheHandle,
    _docroot: Option<TempDir>,
    handle: JoinHandle<()>,
}

impl ServerHarness {
    pub async fn shutdown(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}

pub struct ServerHarnessBuilder {
    capacity: u64,
    timeout: u64,
    reader: Option<Arc<dyn FileReader>>,
    docroot: Option<TempDir>,
}

impl ServerHarnessBuilder {
    pub fn new() -> Self {
        Self {
            capacity: 1_000_000,
            timeout: 2,
            reader: None,
            docroot: None,
        }
    }

    pub fn capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn timeout_secs(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn reader(mut self, reader: Arc<dyn FileReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    /// Creates a temporary document root containing `files` and serves it
    /// with the production disk reader.
    pub fn with_files(mut self, files: &[(&str, &[u8])]) -> Result<Self> {
        let docroot = TempDir::new()?;
        for (name, contents) in files {
            let path = docroot.path().join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, contents)?;
        }
        self.docroot = Some(docroot);
        Ok(self)
    }

    pub async fn spawn(self) -> Result<ServerHarness> {
        let port = find_free_port()?;
        let document_root = self
            .docroot
            .as_ref()
            .map(|dir| dir.path().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let mut settings = default_test_settings(port, document_root);
        settings.capacity = self.capacity;
        settings.timeout = self.timeout;
        let settings = Arc::new(settings);

        let reader = self
            .reader
            .unwrap_or_else(|| Arc::new(DiskReader) as Arc<dyn FileReader>);
        let cache = CacheHandle::spawn(CacheConfig::from_settings(&settings), reader);

        let app = AppContext::new(settings.clone(), cache.clone());
        let handle = tokio::spawn(async move {
            if let Err(err) = server::run(app).await {
                tracing::error!(error = ?err, "server run failed");
            }
        });

        let addr: SocketAddr = format!("127.0.0.1:{port}").parse().expect("valid address");
        wait_for_listener(addr).await?;

        Ok(ServerHarness {
            addr,
            settings,
            cache,
            _docroot: self.docroot,
            handle,
        })
    }
}

impl Default for ServerHarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}
