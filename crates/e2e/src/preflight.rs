//! Target reachability check before a browser is launched

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone)]
pub struct PreflightConfig {
    /// Total time to keep retrying
    pub timeout: Duration,
    pub interval: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            interval: Duration::from_millis(500),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Wait for `url` to answer with a non-server-error status
pub async fn check_reachable(url: &str, config: &PreflightConfig) -> E2eResult<()> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?;

    let deadline = Instant::now() + config.timeout;
    let mut attempts = 0;

    loop {
        attempts += 1;

        match client.get(url).send().await {
            Ok(resp) if !resp.status().is_server_error() => {
                info!("Target {} reachable ({})", url, resp.status());
                return Ok(());
            }
            Ok(resp) => {
                warn!("Target returned {}", resp.status());
            }
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for {} to become reachable...", url);
                }
                if !e.is_connect() {
                    warn!("Preflight error: {}", e);
                }
            }
        }

        let now = Instant::now();
        if now >= deadline {
            break;
        }
        sleep(config.interval.min(deadline - now)).await;
    }

    Err(E2eError::Unreachable {
        url: url.to_string(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn quick() -> PreflightConfig {
        PreflightConfig {
            timeout: Duration::from_millis(200),
            interval: Duration::from_millis(50),
            request_timeout: Duration::from_millis(100),
        }
    }

    async fn serve_status(status: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!("HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n", status);
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_reachable_target() {
        let url = serve_status("200 OK").await;
        check_reachable(&url, &quick()).await.unwrap();
    }

    #[tokio::test]
    async fn test_server_errors_count_as_unreachable() {
        let url = serve_status("503 Service Unavailable").await;
        let err = check_reachable(&url, &quick()).await.unwrap_err();
        assert!(matches!(err, E2eError::Unreachable { attempts, .. } if attempts >= 2));
    }

    #[tokio::test]
    async fn test_closed_port() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = check_reachable(&format!("http://127.0.0.1:{}/", port), &quick())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unreachable"));
    }
}
