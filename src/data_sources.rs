use crate::{
    config::{CrawlConfig, PROVIDER_MAX_PAGE_SIZE},
    error::FetchError,
    types::{RawAddrPage, Transaction},
};
use anyhow::Context;
use reqwest::Client;
use std::{fmt::Display, thread, time::Duration};
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// TransactionSource
///
/// Anything that can list the transactions touching an address.
///
/// Implementations return at most `max_txs` transactions, in the provider's
/// native order. A failure only concerns the one address asked for.
pub trait TransactionSource {
    fn fetch_transactions(
        &self,
        address: &str,
        max_txs: usize,
    ) -> Result<Vec<Transaction>, FetchError>;
}

/// BlockchainInfoSource
///
/// Pages through the blockchain.info `rawaddr` endpoint.
///
/// The crawler is synchronous, so the source owns a small tokio runtime and
/// blocks on every request. One `reqwest::Client` is reused for the whole
/// crawl so connections stay pooled.
#[derive(Debug)]
pub struct BlockchainInfoSource {
    runtime: Runtime,
    client: Client,
    base_url: String,
    page_size: usize,
    request_delay: Duration,
}

impl Display for BlockchainInfoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlockchainInfoSource({})", self.base_url)
    }
}

impl BlockchainInfoSource {
    pub fn new(config: &CrawlConfig) -> anyhow::Result<Self> {
        let runtime = Runtime::new().context("Failed to start HTTP runtime")?;

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            runtime,
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size.clamp(1, PROVIDER_MAX_PAGE_SIZE),
            request_delay: config.request_delay,
        })
    }

    fn fetch_page(
        &self,
        address: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>, FetchError> {
        let url = format!("{}/rawaddr/{}", self.base_url, address);

        self.runtime.block_on(async {
            let response = self
                .client
                .get(&url)
                .query(&[("limit", limit), ("offset", offset)])
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    address: address.to_string(),
                    status,
                });
            }

            let body = response.text().await?;
            let page: RawAddrPage = serde_json::from_str(&body)?;
            Ok(page.txs)
        })
    }
}

impl TransactionSource for BlockchainInfoSource {
    fn fetch_transactions(
        &self,
        address: &str,
        max_txs: usize,
    ) -> Result<Vec<Transaction>, FetchError> {
        let limit = self.page_size;
        let mut txs: Vec<Transaction> = Vec::new();
        let mut offset = 0;

        while txs.len() < max_txs {
            let batch = self.fetch_page(address, limit, offset)?;
            let batch_len = batch.len();
            debug!("{}: {} txs at offset {}", address, batch_len, offset);
            txs.extend(batch);

            // A short page means the history is exhausted
            if batch_len < limit {
                break;
            }
            offset += limit;
            thread::sleep(self.request_delay);
        }

        txs.truncate(max_txs);
        info!("Fetched {} transactions for {}", txs.len(), address);
        Ok(txs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    fn tx_json(n: usize) -> Value {
        json!({
            "hash": format!("tx{n}"),
            "inputs": [{ "prev_out": { "addr": "A", "value": 1000 } }],
            "out": [{ "addr": format!("B{n}"), "value": 500 }]
        })
    }

    fn page(range: std::ops::Range<usize>) -> Value {
        json!({ "txs": range.map(tx_json).collect::<Vec<_>>() })
    }

    fn mount_page(rt: &Runtime, server: &MockServer, offset: usize, body: Value) {
        rt.block_on(
            Mock::given(method("GET"))
                .and(path("/rawaddr/A"))
                .and(query_param("offset", offset.to_string()))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(server),
        );
    }

    fn source_for(server: &MockServer, page_size: usize) -> BlockchainInfoSource {
        source_with_delay(server, page_size, Duration::ZERO)
    }

    fn source_with_delay(
        server: &MockServer,
        page_size: usize,
        delay: Duration,
    ) -> BlockchainInfoSource {
        let config = CrawlConfig::default()
            .with_api_base_url(server.uri())
            .with_page_size(page_size)
            .with_request_delay(delay);
        BlockchainInfoSource::new(&config).unwrap()
    }

    fn request_count(rt: &Runtime, server: &MockServer) -> usize {
        rt.block_on(server.received_requests())
            .map(|requests| requests.len())
            .unwrap_or(0)
    }

    #[test]
    fn pages_until_short_page() {
        let rt = Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        mount_page(&rt, &server, 0, page(0..2));
        mount_page(&rt, &server, 2, page(2..4));
        mount_page(&rt, &server, 4, page(4..5));

        let source = source_for(&server, 2);
        let txs = source.fetch_transactions("A", 100).unwrap();

        assert_eq!(txs.len(), 5);
        assert_eq!(txs[0].hash.as_deref(), Some("tx0"));
        assert_eq!(txs[4].hash.as_deref(), Some("tx4"));
        assert_eq!(request_count(&rt, &server), 3);
    }

    #[test]
    fn waits_between_pages() {
        let rt = Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        mount_page(&rt, &server, 0, page(0..2));
        mount_page(&rt, &server, 2, page(2..4));
        mount_page(&rt, &server, 4, page(4..5));

        let delay = Duration::from_millis(30);
        let source = source_with_delay(&server, 2, delay);
        let started = std::time::Instant::now();
        let txs = source.fetch_transactions("A", 100).unwrap();
        let elapsed = started.elapsed();

        assert_eq!(txs.len(), 5);
        // One wait after each full page
        assert!(elapsed >= delay * 2, "three pages took only {elapsed:?}");
    }

    #[test]
    fn stops_and_truncates_at_max_txs() {
        let rt = Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        mount_page(&rt, &server, 0, page(0..2));
        mount_page(&rt, &server, 2, page(2..4));
        mount_page(&rt, &server, 4, page(4..6));

        let source = source_for(&server, 2);
        let txs = source.fetch_transactions("A", 3).unwrap();

        assert_eq!(txs.len(), 3);
        assert_eq!(request_count(&rt, &server), 2);
    }

    #[test]
    fn sends_limit_and_offset() {
        let rt = Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("GET"))
                .and(path("/rawaddr/A"))
                .and(query_param("limit", "50"))
                .and(query_param("offset", "0"))
                .respond_with(ResponseTemplate::new(200).set_body_json(page(0..1)))
                .mount(&server),
        );

        let source = source_for(&server, 50);
        let txs = source.fetch_transactions("A", 50).unwrap();
        assert_eq!(txs.len(), 1);
    }

    #[test]
    fn non_success_status_is_a_fetch_error() {
        let rt = Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("GET"))
                .and(path("/rawaddr/A"))
                .respond_with(ResponseTemplate::new(429))
                .mount(&server),
        );

        let source = source_for(&server, 50);
        let err = source.fetch_transactions("A", 50).unwrap_err();
        assert!(matches!(err, FetchError::Status { status, .. } if status.as_u16() == 429));
    }

    #[test]
    fn malformed_body_is_a_fetch_error() {
        let rt = Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("GET"))
                .and(path("/rawaddr/A"))
                .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
                .mount(&server),
        );

        let source = source_for(&server, 50);
        let err = source.fetch_transactions("A", 50).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn missing_fields_decode_as_unresolvable() {
        let rt = Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        mount_page(
            &rt,
            &server,
            0,
            json!({ "txs": [{ "inputs": [{}], "out": [{ "value": 10 }] }] }),
        );

        let source = source_for(&server, 50);
        let txs = source.fetch_transactions("A", 50).unwrap();
        assert_eq!(txs.len(), 1);
        assert!(txs[0].inputs[0].address().is_none());
        assert!(txs[0].out[0].address().is_none());
    }
}
