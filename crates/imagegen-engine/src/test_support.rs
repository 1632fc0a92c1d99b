//! Throwaway local HTTP endpoints for exercising the network code in tests.

use std::net::SocketAddr;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub(crate) struct CannedResponse {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

impl CannedResponse {
    pub(crate) fn json(status: u16, body: Value) -> Self {
        Self::bytes(status, "application/json", body.to_string().into_bytes())
    }

    pub(crate) fn text(status: u16, body: &str) -> Self {
        Self::bytes(status, "text/html", body.as_bytes().to_vec())
    }

    pub(crate) fn bytes(status: u16, content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type,
            body,
        }
    }
}

pub(crate) struct OnceServer {
    address: SocketAddr,
    handle: JoinHandle<anyhow::Result<String>>,
}

impl OnceServer {
    pub(crate) fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.address, path)
    }

    /// Raw request text (head and body) the server received.
    pub(crate) async fn request(self) -> anyhow::Result<String> {
        self.handle.await?
    }
}

pub(crate) struct SilentServer {
    address: SocketAddr,
    handle: JoinHandle<anyhow::Result<bool>>,
}

impl SilentServer {
    pub(crate) fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.address, path)
    }

    /// Resolves once the client side has closed the connection.
    pub(crate) async fn closed(self) -> anyhow::Result<bool> {
        self.handle.await?
    }
}

/// Answers exactly one request with `response`.
pub(crate) async fn serve_once(response: CannedResponse) -> anyhow::Result<OnceServer> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await?;
        let raw = read_request(&mut stream).await?;
        let reason = reqwest::StatusCode::from_u16(response.status)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("Unknown");
        let head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            response.status,
            reason,
            response.content_type,
            response.body.len()
        );
        stream.write_all(head.as_bytes()).await?;
        stream.write_all(&response.body).await?;
        stream.shutdown().await?;
        Ok::<String, anyhow::Error>(raw)
    });
    Ok(OnceServer { address, handle })
}

/// Accepts one connection, reads the request and never answers.
pub(crate) async fn serve_silent() -> anyhow::Result<SilentServer> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await?;
        let mut buf = [0u8; 4096];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return Ok::<bool, anyhow::Error>(true),
                Ok(_) => continue,
            }
        }
    });
    Ok(SilentServer { address, handle })
}

/// An address nothing is listening on.
pub(crate) async fn unused_address() -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    drop(listener);
    Ok(address)
}

async fn read_request(stream: &mut TcpStream) -> anyhow::Result<String> {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let read = stream.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..read]);
        let text = String::from_utf8_lossy(&raw);
        if let Some((head, body)) = text.split_once("\r\n\r\n") {
            if body.len() >= content_length(head) {
                break;
            }
        }
    }
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}
