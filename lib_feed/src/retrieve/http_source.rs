//! # HTTP Transaction Source
//!
//! A thin `reqwest` wrapper issuing a single GET against the live feed
//! endpoint. Unlike the generic API clients it has no retry middleware: the
//! fetcher's rate limit is the only pacing, and a failed call simply sends the
//! feed into fallback until the next allowed attempt.

use crate::configs::FeedConfig;
use crate::errors::{FeedError, FetchFailure};
use crate::retrieve::payload::TransactionPage;
use crate::retrieve::source::TransactionSource;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Url;
use std::time::Duration;

/// reqwest-backed [`TransactionSource`].
pub struct HttpSource {
    /// Shared client, reused across polls for connection pooling.
    inner: reqwest::Client,
    /// Absolute endpoint URL.
    url: Url,
    /// Reported in timeout failures.
    timeout: Duration,
}

impl HttpSource {
    /// Creates a source for `config.source_url`.
    ///
    /// # Errors
    /// Returns [`FeedError::InvalidConfig`] if the URL is not absolute, or
    /// [`FeedError::HttpClient`] if the client cannot be built.
    pub fn new(config: &FeedConfig) -> Result<Self, FeedError> {
        let url = Url::parse(&config.source_url)
            .map_err(|e| FeedError::InvalidConfig(format!("sourceUrl '{}': {}", config.source_url, e)))?;

        let inner = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            inner,
            url,
            timeout: config.fetch_timeout(),
        })
    }

    fn classify(&self, err: reqwest::Error) -> FetchFailure {
        if err.is_timeout() {
            FetchFailure::Timeout(self.timeout.as_millis() as u64)
        } else {
            FetchFailure::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl TransactionSource for HttpSource {
    async fn fetch(&self) -> Result<TransactionPage, FetchFailure> {
        let response = self
            .inner
            .get(self.url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            log::debug!("Live source {} answered {}", self.url, status);
            return Err(FetchFailure::HttpStatus(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        TransactionPage::from_json(&body).map_err(|e| FetchFailure::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serves exactly one canned HTTP response on a random local port.
    fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to random port");
        let port = listener.local_addr().unwrap().port();

        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let response = format!(
                    "{}\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });

        format!("http://127.0.0.1:{}/unconfirmed-transactions", port)
    }

    fn config_for(url: String) -> FeedConfig {
        FeedConfig {
            source_url: url,
            fetch_timeout_ms: 500,
            ..FeedConfig::default()
        }
    }

    #[test]
    fn test_relative_url_is_rejected() {
        let config = config_for("not a url".into());
        assert!(matches!(HttpSource::new(&config), Err(FeedError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_fetch_parses_success_body() {
        let url = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"txs":[{"hash":"abc","out":[{"addr":"1Dest","value":50000000}]}]}"#,
        );
        let source = HttpSource::new(&config_for(url)).unwrap();

        let page = source.fetch().await.unwrap();
        let candidates = page.candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].hash, "abc");
    }

    #[tokio::test]
    async fn test_fetch_maps_non_2xx_status() {
        let url = serve_once("HTTP/1.1 429 Too Many Requests", "{}");
        let source = HttpSource::new(&config_for(url)).unwrap();
        assert_eq!(source.fetch().await.unwrap_err(), FetchFailure::HttpStatus(429));
    }

    #[tokio::test]
    async fn test_fetch_maps_malformed_body() {
        let url = serve_once("HTTP/1.1 200 OK", r#"{"unexpected":true}"#);
        let source = HttpSource::new(&config_for(url)).unwrap();
        assert!(matches!(source.fetch().await, Err(FetchFailure::Malformed(_))));
    }

    #[tokio::test]
    async fn test_fetch_times_out_on_silent_server() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            // Hold the connection open without answering.
            if let Ok((stream, _)) = listener.accept() {
                thread::sleep(Duration::from_secs(2));
                drop(stream);
            }
        });

        let source = HttpSource::new(&config_for(format!("http://127.0.0.1:{}/", port))).unwrap();
        assert_eq!(source.fetch().await.unwrap_err(), FetchFailure::Timeout(500));
    }
}
