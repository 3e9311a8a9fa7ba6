//! The HTTP adapter: translates HTTP/1.1 requests into cache operations and
//! cache responses back into HTTP responses.

mod codec;
mod conn;
pub mod content_type;
pub mod listener;
mod respond;

use std::sync::Arc;

use anyhow::Result;
use http::StatusCode;

use crate::cache::CacheHandle;
use crate::settings::Settings;

/// Status answered when the backing read fails (or the path is unusable).
pub const FILE_ERROR_STATUS: StatusCode = StatusCode::NOT_FOUND;
/// Status answered when the backing read outlives the request deadline.
pub const TIMEOUT_STATUS: StatusCode = StatusCode::REQUEST_TIMEOUT;

pub const FILE_ERROR_BODY: &[u8] = b"file error\n";
pub const TIMEOUT_BODY: &[u8] = b"timeout\n";
pub const CACHE_CLEARED_BODY: &[u8] = b"cache cleared\n";

pub(crate) const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

pub(crate) const CACHE_CLEAR_PREFIX: &str = "/cache/clear/";
pub(crate) const CACHE_STATUS_PREFIX: &str = "/cache/";

#[derive(Clone)]
pub struct AppContext {
    pub settings: Arc<Settings>,
    pub cache: CacheHandle,
}

impl AppContext {
    pub fn new(settings: Arc<Settings>, cache: CacheHandle) -> Self {
        Self { settings, cache }
    }
}

pub async fn run(app: AppContext) -> Result<()> {
    listener::start_listener(app).await
}
