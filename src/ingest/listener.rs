//! Satellite listener
//!
//! One task per connection reads a single bounded line under a timeout.
//! Anything that goes wrong is logged and the connection dropped; the accept
//! loop itself only stops on shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use super::activity::ActivityLog;
use super::event::SatelliteEvent;
use crate::config::NetworkConfig;
use crate::constants::MAX_SATELLITE_LINE;
use crate::error::IngestError;
use crate::network::listener::bind;
use crate::voice::Announcer;

pub struct SatelliteListener {
    listener: TcpListener,
    log: Arc<ActivityLog>,
    announcer: Option<Arc<Announcer>>,
    read_timeout: Duration,
}

impl SatelliteListener {
    pub fn bind(
        config: &NetworkConfig,
        log: Arc<ActivityLog>,
        announcer: Option<Arc<Announcer>>,
    ) -> std::io::Result<Self> {
        let listener = bind(config.satellite_addr, config.backlog)?;
        Ok(Self {
            listener,
            log,
            announcer,
            read_timeout: Duration::from_secs(config.satellite_read_timeout_secs),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Satellite ingest listening on {}",
            self.local_addr().map(|a| a.to_string()).unwrap_or_default()
        );

        loop {
            let (stream, peer) = tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!("Satellite accept failed: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        continue;
                    }
                },
                _ = shutdown.changed() => break,
            };

            let log = self.log.clone();
            let announcer = self.announcer.clone();
            let read_timeout = self.read_timeout;
            tokio::spawn(async move {
                match receive(stream, read_timeout).await {
                    Ok(event) => {
                        tracing::info!(
                            "Satellite {} ({}) at {}: {:?} strength {:.1} battery {}%",
                            event.id,
                            peer,
                            event.location,
                            event.kind,
                            event.strength,
                            event.battery
                        );
                        let (device, kind) = (event.device, event.kind);
                        log.record(event);
                        if let (true, Some(announcer)) = (kind.is_alerting(), announcer) {
                            announcer.announce_event(device, kind);
                        }
                    }
                    Err(e) => tracing::warn!("Dropped satellite message from {}: {}", peer, e),
                }
            });
        }

        tracing::info!("Satellite ingest stopped");
    }
}

/// Read and parse the one line a satellite sends
async fn receive(stream: TcpStream, read_timeout: Duration) -> Result<SatelliteEvent, IngestError> {
    let line = tokio::time::timeout(read_timeout, read_line(stream, MAX_SATELLITE_LINE))
        .await
        .map_err(|_| IngestError::Timeout)??;
    SatelliteEvent::parse(&line)
}

async fn read_line(stream: TcpStream, max: usize) -> Result<String, IngestError> {
    let mut reader = BufReader::new(stream.take(max as u64 + 1));
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Err(IngestError::Truncated);
    }
    if n > max {
        return Err(IngestError::TooLarge(max));
    }
    String::from_utf8(buf).map_err(|e| IngestError::Malformed(e.to_string()))
}
