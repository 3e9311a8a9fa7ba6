pub mod cache;
pub mod cli;
pub mod fs;
pub mod logging;
pub mod server;
pub mod settings;
pub mod util;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::cache::{CacheConfig, CacheHandle};
use crate::fs::DiskReader;
use crate::server::AppContext;
use crate::settings::Settings;

pub async fn run(settings: Settings) -> Result<()> {
    let settings = Arc::new(settings);
    info!(
        port = settings.port,
        capacity = settings.capacity,
        timeout = settings.timeout,
        document_root = %settings.document_root.display(),
        "server starting"
    );

    let cache = CacheHandle::spawn(
        CacheConfig::from_settings(&settings),
        Arc::new(DiskReader),
    );
    let app = AppContext::new(settings, cache);
    server::run(app).await
}
