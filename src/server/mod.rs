//! Connection listener - one session task per accepted connection.
//!
//! Binds the first free port from the configured preference list and accepts
//! forever. Sessions share nothing but the read-only strategy registry.

pub mod protocol;
pub mod session;

pub use session::{Request, Session, State};

use crate::archive::StrategyRegistry;
use crate::config::ServerConfig;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};

/// Back-off after a failed accept (e.g. file descriptor exhaustion)
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Bind the first port in `ports` that is not already taken on `host`.
pub async fn bind_first_free(host: &str, ports: &[u16]) -> Result<TcpListener> {
    for &port in ports {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) => tracing::debug!(host, port, error = %e, "port unavailable"),
        }
    }
    anyhow::bail!("No free port available on {} among {:?}", host, ports)
}

/// Accept connections forever, spawning an independent session for each.
pub async fn serve(listener: TcpListener, registry: Arc<StrategyRegistry>) -> Result<()> {
    let local = listener
        .local_addr()
        .context("Failed to read listener address")?;
    tracing::info!(address = %local, "accepting connections");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                continue;
            }
        };

        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            handle_connection(stream, peer, registry).await;
        });
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, registry: Arc<StrategyRegistry>) {
    tracing::info!(%peer, "session started");

    let (read_half, write_half) = stream.into_split();
    let session =
        Session::new(BufReader::new(read_half), write_half, registry).with_peer(peer.to_string());

    // Transport faults end this session only
    match session.run().await {
        Ok(()) => tracing::info!(%peer, "session ended"),
        Err(e) => tracing::info!(%peer, error = %format!("{:#}", e), "session dropped"),
    }
}

/// Build the registry, bind and serve according to `config`.
pub async fn run(config: &ServerConfig) -> Result<()> {
    let registry = Arc::new(StrategyRegistry::new(&config.rar_binary));
    let listener = bind_first_free(&config.bind, &config.ports)
        .await
        .context("Failed to start server")?;
    serve(listener, registry).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_skips_taken_port() {
        let taken = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let taken_port = taken.local_addr().unwrap().port();

        let listener = bind_first_free("127.0.0.1", &[taken_port, 0]).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), taken_port);
    }

    #[tokio::test]
    async fn test_bind_fails_when_all_taken() {
        let taken = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let taken_port = taken.local_addr().unwrap().port();

        assert!(bind_first_free("127.0.0.1", &[taken_port]).await.is_err());
        assert!(bind_first_free("127.0.0.1", &[]).await.is_err());
    }
}
