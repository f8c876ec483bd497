//! Wire codec and one-shot connection helpers
//!
//! Messages are serialized as length-prefixed JSON: a big-endian u32
//! byte count followed by one tagged object. Connections are one-shot:
//! a command is connect → write → close, a heartbeat poll is connect →
//! read one snapshot → close. A synchronized fan-out additionally
//! primes its connection with warm-up frames before the payload, so
//! the server side drains a connection rather than reading once.

use crate::metrics::BufferMetrics;
use crate::protocol::Request;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

/// Upper bound on a single message body, guards against corrupt length
/// prefixes
pub const MAX_MESSAGE_BYTES: u32 = 16 * 1024 * 1024;

/// Budget for reading one request off an accepted connection
pub const ACCEPT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Write one length-prefixed message
pub async fn write_message<T, W>(writer: &mut W, message: &T) -> Result<()>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(message)?;
    if body.len() as u64 > MAX_MESSAGE_BYTES as u64 {
        return Err(Error::Transport(format!(
            "message of {} bytes exceeds limit",
            body.len()
        )));
    }
    writer.write_all(&(body.len() as u32).to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed message
pub async fn read_message<T, R>(reader: &mut R) -> Result<T>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix).await?;
    let len = u32::from_be_bytes(prefix);
    if len > MAX_MESSAGE_BYTES {
        return Err(Error::Transport(format!(
            "message length {} exceeds limit",
            len
        )));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Send one request over a fresh connection, then close
pub async fn send_request(addr: &str, request: &Request, timeout: Duration) -> Result<()> {
    let io = async {
        let mut stream = TcpStream::connect(addr).await?;
        write_message(&mut stream, request).await?;
        stream.shutdown().await?;
        Ok(())
    };
    match tokio::time::timeout(timeout, io).await {
        Ok(result) => {
            trace!("sent {} to {}", request, addr);
            result
        }
        Err(_) => Err(Error::Timeout(format!(
            "sending {} to {} exceeded {:?}",
            request, addr, timeout
        ))),
    }
}

/// Poll one metrics snapshot over a fresh connection, then close
pub async fn fetch_metrics(addr: &str, timeout: Duration) -> Result<BufferMetrics> {
    let io = async {
        let mut stream = TcpStream::connect(addr).await?;
        read_message(&mut stream).await
    };
    match tokio::time::timeout(timeout, io).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!(
            "heartbeat poll of {} exceeded {:?}",
            addr, timeout
        ))),
    }
}

/// Accept connections on a command port and queue the requests they
/// carry
///
/// The caller binds the listener so the port is owned before any task
/// starts. Each accepted connection is drained until the peer closes:
/// a synchronized fan-out primes the socket with warm-up frames before
/// the real payload, so warm-ups are discarded here at the wire level
/// and never reach the dispatcher. A malformed or dawdling peer is
/// logged and dropped, never fatal to the loop.
pub async fn serve_requests(
    listener: TcpListener,
    tx: mpsc::UnboundedSender<Request>,
    cancel: CancellationToken,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("command listener on {}", addr);
    }
    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            accepted = listener.accept() => accepted,
        };
        let (mut stream, peer) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                warn!("command accept failed: {}", e);
                continue;
            }
        };
        let tx = tx.clone();
        tokio::spawn(async move {
            loop {
                let read =
                    tokio::time::timeout(ACCEPT_READ_TIMEOUT, read_message(&mut stream)).await;
                match read {
                    Ok(Ok(Request::WarmUp)) => {
                        trace!("warm-up from {} discarded", peer);
                    }
                    Ok(Ok(request)) => {
                        let _ = tx.send(request);
                    }
                    Ok(Err(Error::Io(e))) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                        return;
                    }
                    Ok(Err(e)) => {
                        warn!("bad request from {}: {}", peer, e);
                        return;
                    }
                    Err(_) => {
                        warn!("request from {} timed out", peer);
                        return;
                    }
                }
            }
        });
    }
}
