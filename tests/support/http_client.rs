use std::net::SocketAddr;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result, anyhow, bail};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

const CLIENT_IO_TIMEOUT: StdDuration = StdDuration::from_secs(10);

#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Extracts the bracketed byte count from a cache status body.
    pub fn bracketed_bytes(&self) -> Result<u64> {
        let body = self.body_str();
        let open = body.find('[').context("status body missing '['")?;
        let close = body[open..]
            .find(']')
            .context("status body missing ']'")?
            + open;
        body[open + 1..close]
            .parse()
            .with_context(|| format!("unparseable byte count in {body:?}"))
    }
}

/// Issues one GET on a fresh connection and reads the full response.
pub async fn get(addr: SocketAddr, path: &str) -> Result<HttpResponse> {
    let mut stream = TcpStream::connect(addr).await?;
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    timeout(CLIENT_IO_TIMEOUT, stream.write_all(request.as_bytes()))
        .await
        .map_err(|_| anyhow!("timed out sending request for {path}"))??;
    let mut reader = BufReader::new(stream);
    read_response(&mut reader).await
}

/// Sends raw bytes on a fresh connection and reads the full response.
pub async fn send_raw(addr: SocketAddr, request: &[u8]) -> Result<HttpResponse> {
    let mut stream = TcpStream::connect(addr).await?;
    timeout(CLIENT_IO_TIMEOUT, stream.write_all(request))
        .await
        .map_err(|_| anyhow!("timed out sending raw request"))??;
    let mut reader = BufReader::new(stream);
    read_response(&mut reader).await
}

/// Reads one response head plus a Content-Length body; usable repeatedly on
/// a keep-alive connection.
pub async fn read_response<S>(reader: &mut BufReader<S>) -> Result<HttpResponse>
where
    S: AsyncRead + Unpin,
{
    let mut line = String::new();
    let read = timeout(CLIENT_IO_TIMEOUT, reader.read_line(&mut line))
        .await
        .map_err(|_| anyhow!("timed out reading status line"))??;
    if read == 0 {
        bail!("connection closed before status line");
    }
    let status = line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| anyhow!("missing status code in {line:?}"))?
        .parse::<u16>()
        .context("invalid status code")?;

    let mut headers = Vec::new();
    let mut content_length = 0usize;
    loop {
        line.clear();
        let read = timeout(CLIENT_IO_TIMEOUT, reader.read_line(&mut line))
            .await
            .map_err(|_| anyhow!("timed out reading headers"))??;
        if read == 0 {
            bail!("connection closed during headers");
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        let (name, value) = trimmed
            .split_once(':')
            .ok_or_else(|| anyhow!("malformed response header {trimmed:?}"))?;
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.trim().parse().context("invalid Content-Length")?;
        }
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let mut body = vec![0u8; content_length];
    timeout(CLIENT_IO_TIMEOUT, reader.read_exact(&mut body))
        .await
        .map_err(|_| anyhow!("timed out reading body"))??;

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}
