use std::time::Duration;

use anyhow::Result;
use http::StatusCode;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::util::{timeout_with_context, write_all_with_timeout};

/// Writes a complete HTTP/1.1 response and returns the number of bytes put
/// on the wire.
pub(super) async fn send_response<S>(
    stream: &mut S,
    status: StatusCode,
    content_type: &str,
    body: &[u8],
    close: bool,
    timeout_dur: Duration,
) -> Result<u64>
where
    S: AsyncWrite + Unpin,
{
    let reason = status.canonical_reason().unwrap_or("Unknown");
    let mut header = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nContent-Type: {}\r\n",
        status.as_u16(),
        reason,
        body.len(),
        content_type
    );
    if close {
        header.push_str("Connection: close\r\n");
    }
    header.push_str("\r\n");

    write_all_with_timeout(
        stream,
        header.as_bytes(),
        timeout_dur,
        "writing response header",
    )
    .await?;
    let mut written = header.len() as u64;
    if !body.is_empty() {
        write_all_with_timeout(stream, body, timeout_dur, "writing response body").await?;
        written += body.len() as u64;
    }
    timeout_with_context(timeout_dur, stream.flush(), "flushing response").await?;
    Ok(written)
}
