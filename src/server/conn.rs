use std::net::SocketAddr;
use std::time::Instant;

use anyhow::Result;
use http::{Method, StatusCode};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::cache::FileResponse;
use crate::logging::AccessLogBuilder;

use super::codec::{RequestHead, read_request_head};
use super::content_type::content_type_for;
use super::respond::send_response;
use super::{
    AppContext, CACHE_CLEAR_PREFIX, CACHE_CLEARED_BODY, CACHE_STATUS_PREFIX, FILE_ERROR_BODY,
    FILE_ERROR_STATUS, TEXT_PLAIN, TIMEOUT_BODY, TIMEOUT_STATUS,
};

pub(super) async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    app: AppContext,
) -> Result<()> {
    serve_loop(stream, peer, app).await
}

async fn serve_loop<S>(stream: S, peer: SocketAddr, app: AppContext) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let keepalive_timeout = app.settings.keepalive_idle();
    let header_timeout = app.settings.header_timeout();
    let write_timeout = app.settings.write_timeout();
    let max_header_bytes = app.settings.max_request_header_size;
    let mut reader = BufReader::new(stream);

    loop {
        let start = Instant::now();
        let head = match read_request_head(
            &mut reader,
            peer,
            keepalive_timeout,
            header_timeout,
            max_header_bytes,
        )
        .await
        {
            Ok(Some(head)) => head,
            Ok(None) => break,
            Err(err) => {
                let message = err.to_string();
                if message.starts_with("timed out") {
                    warn!(peer = %peer, error = %err, "client request timed out");
                    break;
                }
                warn!(peer = %peer, error = %err, "invalid request");
                let bytes_out = send_response(
                    reader.get_mut(),
                    StatusCode::BAD_REQUEST,
                    TEXT_PLAIN,
                    b"invalid request\n",
                    true,
                    write_timeout,
                )
                .await?;
                AccessLogBuilder::new(peer)
                    .method("UNKNOWN")
                    .status(StatusCode::BAD_REQUEST)
                    .outcome("ERROR")
                    .bytes_out(bytes_out)
                    .elapsed(start.elapsed())
                    .log();
                break;
            }
        };

        let close = head.connection_close;
        handle_request(&mut reader, peer, &app, head, start).await?;
        if close {
            break;
        }
    }

    Ok(())
}

async fn handle_request<S>(
    reader: &mut BufReader<S>,
    peer: SocketAddr,
    app: &AppContext,
    head: RequestHead,
    start: Instant,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let RequestHead {
        method,
        target,
        connection_close,
    } = head;
    let write_timeout = app.settings.write_timeout();
    // The request target may carry a query or fragment; only the path names
    // a file.
    let path = target
        .split(['?', '#'])
        .next()
        .unwrap_or(target.as_str())
        .to_string();
    let log = AccessLogBuilder::new(peer)
        .method(method.as_str())
        .path(path.clone());
    let stream = reader.get_mut();

    if method != Method::GET {
        let bytes_out = send_response(
            stream,
            StatusCode::METHOD_NOT_ALLOWED,
            TEXT_PLAIN,
            b"method not allowed\n",
            connection_close,
            write_timeout,
        )
        .await?;
        log.status(StatusCode::METHOD_NOT_ALLOWED)
            .outcome("ERROR")
            .bytes_out(bytes_out)
            .elapsed(start.elapsed())
            .log();
        return Ok(());
    }

    if path.starts_with(CACHE_CLEAR_PREFIX) {
        app.cache.clear().await?;
        let bytes_out = send_response(
            stream,
            StatusCode::OK,
            TEXT_PLAIN,
            CACHE_CLEARED_BODY,
            connection_close,
            write_timeout,
        )
        .await?;
        log.status(StatusCode::OK)
            .outcome("CLEARED")
            .bytes_out(bytes_out)
            .elapsed(start.elapsed())
            .log();
        return Ok(());
    }

    if path.starts_with(CACHE_STATUS_PREFIX) {
        let status = app.cache.status().await?;
        let body = status.to_string();
        let bytes_out = send_response(
            stream,
            StatusCode::OK,
            TEXT_PLAIN,
            body.as_bytes(),
            connection_close,
            write_timeout,
        )
        .await?;
        log.status(StatusCode::OK)
            .outcome("STATUS")
            .bytes_out(bytes_out)
            .elapsed(start.elapsed())
            .log();
        return Ok(());
    }

    debug!(peer = %peer, path, "requesting file");
    let response = app.cache.fetch(&path).await?;
    let (status, outcome, bytes_out) = match &response {
        FileResponse::Ok { name, bytes } => {
            let written = send_response(
                stream,
                StatusCode::OK,
                content_type_for(name),
                bytes,
                connection_close,
                write_timeout,
            )
            .await?;
            (StatusCode::OK, "OK", written)
        }
        FileResponse::FileError { name } => {
            debug!(peer = %peer, name, "file error");
            let written = send_response(
                stream,
                FILE_ERROR_STATUS,
                TEXT_PLAIN,
                FILE_ERROR_BODY,
                connection_close,
                write_timeout,
            )
            .await?;
            (FILE_ERROR_STATUS, "FILE_ERROR", written)
        }
        FileResponse::Timeout { name } => {
            debug!(peer = %peer, name, "request timed out");
            let written = send_response(
                stream,
                TIMEOUT_STATUS,
                TEXT_PLAIN,
                TIMEOUT_BODY,
                connection_close,
                write_timeout,
            )
            .await?;
            (TIMEOUT_STATUS, "TIMEOUT", written)
        }
    };
    log.status(status)
        .outcome(outcome)
        .bytes_out(bytes_out)
        .elapsed(start.elapsed())
        .log();
    Ok(())
}
