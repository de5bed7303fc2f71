//! Controller command server
//!
//! Each connection gets its own task that reads a line, runs it through the
//! hub and writes one reply line, until the peer hangs up. A line longer
//! than the limit is answered with `ERR line too long` and the connection is
//! closed.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use super::listener::bind;
use crate::config::NetworkConfig;
use crate::constants::MAX_COMMAND_LINE;
use crate::error::ProtocolError;
use crate::hub::Hub;
use crate::protocol::{self, Reply};

/// Most we read past an overlong line before hanging up
const DISCARD_LIMIT: u64 = 64 * 1024;

pub struct CommandServer {
    listener: TcpListener,
    hub: Arc<Hub>,
    reply_timeout: Duration,
}

enum Line {
    Text(String),
    TooLong,
    Closed,
}

impl CommandServer {
    pub fn bind(config: &NetworkConfig, hub: Arc<Hub>) -> std::io::Result<Self> {
        Ok(Self {
            listener: bind(config.command_addr, config.backlog)?,
            hub,
            reply_timeout: Duration::from_secs(config.reply_timeout_secs),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Command server listening on {}",
            self.local_addr().map(|a| a.to_string()).unwrap_or_default()
        );

        loop {
            let (stream, peer) = tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!("Command accept failed: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        continue;
                    }
                },
                _ = shutdown.changed() => break,
            };

            tracing::debug!("Controller connected from {}", peer);
            let hub = self.hub.clone();
            let reply_timeout = self.reply_timeout;
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = serve(stream, hub, reply_timeout, shutdown).await {
                    tracing::debug!("Controller {} dropped: {}", peer, e);
                }
                tracing::debug!("Controller {} disconnected", peer);
            });
        }

        tracing::info!("Command server stopped");
    }
}

async fn serve(
    stream: TcpStream,
    hub: Arc<Hub>,
    reply_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);

    loop {
        let line = tokio::select! {
            line = read_line(&mut reader, MAX_COMMAND_LINE) => line?,
            _ = shutdown.changed() => return Ok(()),
        };

        let reply = match line {
            Line::Closed => return Ok(()),
            Line::TooLong => {
                send(&mut write, &Reply::from(ProtocolError::LineTooLong), reply_timeout).await?;
                write.shutdown().await?;
                // unread input would turn our close into a reset
                discard_line(&mut reader, reply_timeout).await;
                return Ok(());
            }
            Line::Text(text) => match protocol::parse(&text) {
                Ok(command) => hub.execute(command).await,
                Err(e) => Reply::from(e),
            },
        };
        send(&mut write, &reply, reply_timeout).await?;
    }
}

async fn read_line<R>(reader: &mut R, max: usize) -> std::io::Result<Line>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = reader.take(max as u64 + 1).read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(Line::Closed);
    }
    if n > max {
        return Ok(Line::TooLong);
    }
    if buf.last() != Some(&b'\n') {
        // peer hung up mid-line; a partial command is never run
        return Ok(Line::Closed);
    }
    Ok(Line::Text(String::from_utf8_lossy(&buf).into_owned()))
}

async fn discard_line<R>(reader: &mut R, limit: Duration)
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut sink = Vec::new();
    let _ = tokio::time::timeout(
        limit,
        reader.take(DISCARD_LIMIT).read_until(b'\n', &mut sink),
    )
    .await;
}

async fn send(write: &mut OwnedWriteHalf, reply: &Reply, limit: Duration) -> std::io::Result<()> {
    let line = format!("{}\n", reply);
    tokio::time::timeout(limit, write.write_all(line.as_bytes()))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "reply timed out"))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_line_limits() {
        let data: &[u8] = b"PING\nSTATUS\n";
        let mut reader = BufReader::new(data);
        assert!(matches!(read_line(&mut reader, 16).await.unwrap(), Line::Text(t) if t == "PING\n"));
        assert!(matches!(read_line(&mut reader, 16).await.unwrap(), Line::Text(t) if t == "STATUS\n"));
        assert!(matches!(read_line(&mut reader, 16).await.unwrap(), Line::Closed));

        let partial: &[u8] = b"SPEED 350";
        let mut reader = BufReader::new(partial);
        assert!(matches!(read_line(&mut reader, 16).await.unwrap(), Line::Closed));

        let long = vec![b'A'; 40];
        let mut reader = BufReader::new(long.as_slice());
        assert!(matches!(read_line(&mut reader, 16).await.unwrap(), Line::TooLong));
    }
}
