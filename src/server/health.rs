//! Health probe endpoint
//!
//! A minimal liveness server for container platforms: every connection gets
//! a fixed 200 plain-text response. No request parsing, no shared state with
//! the rest of the system.

use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

const RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\nConnection: close\r\n\r\nOK";

/// Serve liveness probes on `port` until shutdown is signalled.
pub async fn run_health_server(
    port: u16,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    log::info!("Health check server started on port {}", port);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((mut stream, _)) => {
                        tokio::spawn(async move {
                            let _ = stream.write_all(RESPONSE).await;
                            let _ = stream.shutdown().await;
                        });
                    }
                    Err(e) => {
                        log::warn!("Health probe accept failed: {}", e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                log::info!("Health check server stopping");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_probe_gets_fixed_200() {
        // Port 0 is not used so the test binds an ephemeral listener itself
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let server = tokio::spawn(run_health_server(port, shutdown_rx));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        let response = String::from_utf8(response).unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.ends_with("OK"));

        shutdown_tx.send(()).unwrap();
        let _ = tokio::time::timeout(std::time::Duration::from_secs(2), server).await;
    }

    #[tokio::test]
    async fn test_server_stops_on_shutdown() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let server = tokio::spawn(run_health_server(port, shutdown_rx));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        shutdown_tx.send(()).unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_secs(2), server).await;
        assert!(result.is_ok(), "server should exit on shutdown signal");
    }
}
