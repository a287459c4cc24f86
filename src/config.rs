use crate::error::ConfigError;
use std::{path::PathBuf, time::Duration};

/// Largest page blockchain.info serves for `rawaddr`.
pub const PROVIDER_MAX_PAGE_SIZE: usize = 50;

pub const DEFAULT_API_BASE_URL: &str = "https://blockchain.info";
pub const DEFAULT_SEED_ADDRESS: &str = "1dice8EMZmqKvrGE4Qc9bUFf9PX3xaYDp";
pub const DEFAULT_USER_AGENT: &str = "btc-address-graph/1.0";

///
/// CrawlConfig
///
/// Static parameters for one crawl. Built once at startup and passed into
/// the crawler and the fetcher; nothing reads globals.
///
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub seed_address: String,
    /// 0 expands only the seed, 1 its direct successors, and so on.
    pub max_depth: usize,
    pub max_txs_per_address: usize,
    pub max_nodes: usize,
    /// Sleep between page requests and between expanded addresses.
    pub request_delay: Duration,
    pub output_path: PathBuf,
    pub api_base_url: String,
    pub page_size: usize,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            seed_address: DEFAULT_SEED_ADDRESS.to_string(),
            max_depth: 2,
            max_txs_per_address: 50,
            max_nodes: 5000,
            request_delay: Duration::from_secs(1),
            output_path: PathBuf::from("btc_address_graph.png"),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            page_size: PROVIDER_MAX_PAGE_SIZE,
            request_timeout: Duration::from_secs(20),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl CrawlConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.seed_address.trim().is_empty() {
            return Err(ConfigError::EmptySeed);
        }
        if self.page_size == 0 || self.page_size > PROVIDER_MAX_PAGE_SIZE {
            return Err(ConfigError::PageSize {
                got: self.page_size,
                max: PROVIDER_MAX_PAGE_SIZE,
            });
        }
        if self.max_nodes == 0 {
            return Err(ConfigError::ZeroNodeCap);
        }
        Ok(())
    }

    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed_address = seed.into();
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    pub fn with_max_txs_per_address(mut self, max_txs: usize) -> Self {
        self.max_txs_per_address = max_txs;
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CrawlConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.max_nodes, 5000);
        assert_eq!(config.page_size, 50);
    }

    #[test]
    fn rejects_empty_seed() {
        let config = CrawlConfig::default().with_seed("  ");
        assert_eq!(config.validate(), Err(ConfigError::EmptySeed));
    }

    #[test]
    fn rejects_page_size_outside_provider_limit() {
        let too_big = CrawlConfig::default().with_page_size(51);
        assert_eq!(
            too_big.validate(),
            Err(ConfigError::PageSize { got: 51, max: 50 })
        );

        let zero = CrawlConfig::default().with_page_size(0);
        assert!(zero.validate().is_err());
    }

    #[test]
    fn rejects_zero_node_cap() {
        let config = CrawlConfig::default().with_max_nodes(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroNodeCap));
    }
}
