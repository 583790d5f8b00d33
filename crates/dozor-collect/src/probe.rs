//! Concurrent HTTP probing with TLS peer-certificate expiry (§4.2.4).

use crate::error::CollectError;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use rustls_pki_types::ServerName;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::debug;

/// Bound on the number of URLs probed in one call (§4.2.4).
pub const MAX_PROBE_URLS: usize = 20;
const CONCURRENCY: usize = 8;

#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub url: String,
    pub status: Option<u16>,
    pub latency_ms: u64,
    pub error: Option<String>,
    pub cert_not_after: Option<DateTime<Utc>>,
    pub cert_days_until_expiry: Option<i64>,
}

fn tls_config() -> Arc<rustls::ClientConfig> {
    let roots = rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    Arc::new(rustls::ClientConfig::builder().with_root_certificates(roots).with_no_client_auth())
}

async fn fetch_peer_cert_expiry(host: &str, port: u16) -> Option<(DateTime<Utc>, i64)> {
    let config = tls_config();
    let connector = tokio_rustls::TlsConnector::from(config);
    let server_name = ServerName::try_from(host.to_string()).ok()?;

    let stream = TcpStream::connect((host, port)).await.ok()?;
    let tls_stream = connector.connect(server_name, stream).await.ok()?;
    let (_, session) = tls_stream.get_ref();
    let certs = session.peer_certificates()?;
    let leaf = certs.first()?;

    let (_, parsed) = x509_parser::parse_x509_certificate(leaf.as_ref()).ok()?;
    let not_after = parsed.validity().not_after;
    let not_after_utc = DateTime::from_timestamp(not_after.timestamp(), 0)?;
    let days = (not_after_utc - Utc::now()).num_days();
    Some((not_after_utc, days))
}

/// Probes each url in `urls` with a bounded-concurrency GET, capturing
/// status, latency, and (for https) peer-certificate expiry.
pub async fn probe_urls(urls: &[String], timeout: Duration) -> Vec<ProbeResult> {
    let client = reqwest::Client::builder().timeout(timeout).build().unwrap_or_default();
    let urls: Vec<String> = urls.iter().take(MAX_PROBE_URLS).cloned().collect();

    stream::iter(urls)
        .map(|url| {
            let client = client.clone();
            async move { probe_one(&client, &url).await }
        })
        .buffer_unordered(CONCURRENCY)
        .collect()
        .await
}

async fn probe_one(client: &reqwest::Client, url: &str) -> ProbeResult {
    let start = Instant::now();
    let response = client.get(url).send().await;
    let latency_ms = start.elapsed().as_millis() as u64;

    let (status, error) = match &response {
        Ok(r) => (Some(r.status().as_u16()), None),
        Err(e) => (None, Some(e.to_string())),
    };

    let mut cert_not_after = None;
    let mut cert_days_until_expiry = None;
    if let Ok(parsed) = url::Url::parse(url) {
        if parsed.scheme() == "https" {
            if let Some(host) = parsed.host_str() {
                let port = parsed.port().unwrap_or(443);
                if let Some((not_after, days)) = fetch_peer_cert_expiry(host, port).await {
                    cert_not_after = Some(not_after);
                    cert_days_until_expiry = Some(days);
                } else {
                    debug!(url, "could not fetch peer certificate");
                }
            }
        }
    }

    ProbeResult { url: url.to_string(), status, latency_ms, error, cert_not_after, cert_days_until_expiry }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn probe_urls_respects_the_twenty_url_cap() {
        let urls: Vec<String> = (0..30).map(|i| format!("http://127.0.0.1:1/{i}")).collect();
        let results = probe_urls(&urls, Duration::from_millis(50)).await;
        assert_eq!(results.len(), MAX_PROBE_URLS);
    }

    #[tokio::test]
    async fn probe_one_records_error_on_connection_failure() {
        let client = reqwest::Client::builder().timeout(Duration::from_millis(200)).build().unwrap();
        let result = probe_one(&client, "http://127.0.0.1:1/").await;
        assert!(result.status.is_none());
        assert!(result.error.is_some());
    }
}
