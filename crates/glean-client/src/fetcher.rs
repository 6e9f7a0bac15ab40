use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use glean_core::error::HarvestError;
use glean_core::traits::Fetcher;
use glean_core::util::origin_key;
use reqwest::Client;
use url::Url;

const DEFAULT_USER_AGENT: &str = "glean/0.1 (name harvester)";

/// HTTP fetcher using reqwest.
///
/// Keeps one `Client` ("session") per origin so repeated snapshots of the
/// same generator page reuse connections. Sessions are created lazily and
/// shared by every clone of the fetcher, so all workers see the same map.
#[derive(Clone)]
pub struct ReqwestFetcher {
    sessions: Arc<Mutex<HashMap<String, Client>>>,
    timeout: Duration,
    user_agent: String,
}

impl ReqwestFetcher {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            timeout,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Number of distinct origins a session has been opened for.
    pub fn session_count(&self) -> usize {
        self.lock_sessions().len()
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<String, Client>> {
        self.sessions.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned session map mutex");
            poisoned.into_inner()
        })
    }

    /// Return the session for the URL's origin, creating it on first use.
    ///
    /// Lookup and insert happen under one lock so two workers racing on a
    /// new origin end up sharing a single session.
    fn session(&self, url: &Url) -> Result<Client, HarvestError> {
        let key = origin_key(url)
            .ok_or_else(|| HarvestError::Http(format!("URL has no host: {url}")))?;

        let mut sessions = self.lock_sessions();
        if let Some(client) = sessions.get(&key) {
            return Ok(client.clone());
        }

        tracing::debug!(origin = %key, "Opening session");
        let client = Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .build()
            .map_err(|e| HarvestError::Http(e.to_string()))?;
        sessions.insert(key, client.clone());
        Ok(client)
    }
}

impl Default for ReqwestFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<String, HarvestError> {
        let parsed =
            Url::parse(url).map_err(|e| HarvestError::Http(format!("Invalid URL {url}: {e}")))?;
        let client = self.session(&parsed)?;

        let response = client.get(parsed).send().await.map_err(|e| {
            if e.is_timeout() {
                HarvestError::Timeout(self.timeout)
            } else if e.is_connect() {
                HarvestError::Network(format!("Connection failed: {e}"))
            } else {
                HarvestError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::Http(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                HarvestError::Timeout(self.timeout)
            } else {
                HarvestError::Http(format!("Failed to read response body: {e}"))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Serve every connection with the same canned HTTP response.
    async fn serve(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn fetch_returns_body() {
        let base = serve("200 OK", "<div id=\"result\">Aldric</div>").await;
        let fetcher = ReqwestFetcher::new();

        let html = fetcher.fetch(&format!("{base}/names")).await.unwrap();
        assert!(html.contains("Aldric"));
    }

    #[tokio::test]
    async fn non_success_status_is_http_error() {
        let base = serve("503 Service Unavailable", "busy").await;
        let fetcher = ReqwestFetcher::new();

        let err = fetcher.fetch(&format!("{base}/names")).await.unwrap_err();
        assert!(matches!(err, HarvestError::Http(ref msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn refused_connection_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = ReqwestFetcher::new()
            .fetch(&format!("http://{addr}/"))
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Network(_)));
    }

    #[tokio::test]
    async fn unresponsive_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let fetcher = ReqwestFetcher::with_timeout(Duration::from_millis(100));
        let err = fetcher.fetch(&format!("http://{addr}/")).await.unwrap_err();
        assert!(matches!(err, HarvestError::Timeout(_)));
    }

    #[tokio::test]
    async fn sessions_are_shared_per_origin() {
        let first = serve("200 OK", "a").await;
        let second = serve("200 OK", "b").await;
        let fetcher = ReqwestFetcher::new();

        let mut tasks = Vec::new();
        for i in 0..8 {
            let fetcher = fetcher.clone();
            let url = format!("{first}/page/{i}");
            tasks.push(tokio::spawn(async move { fetcher.fetch(&url).await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(fetcher.session_count(), 1);

        fetcher.fetch(&format!("{second}/")).await.unwrap();
        assert_eq!(fetcher.session_count(), 2);
    }

    #[tokio::test]
    async fn invalid_url_is_rejected() {
        let err = ReqwestFetcher::new().fetch("not a url").await.unwrap_err();
        assert!(matches!(err, HarvestError::Http(_)));
    }
}
