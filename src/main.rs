use anyhow::{Context, Result};
use btcgraph::{
    config::*, data_sources::*, graph_utils::*, summary::*, traversal::*,
};
use clap::Parser;
use std::{path::PathBuf, time::Duration};
use tracing::{info, warn};

#[derive(Parser, Debug)]
struct Args {
    #[arg(short, long, default_value = DEFAULT_SEED_ADDRESS)]
    seed_address: String,
    /// 0 = only the seed, 1 = its direct successors, and so on
    #[arg(short = 'd', long, default_value = "2")]
    max_depth: usize,
    #[arg(short = 't', long, default_value = "50")]
    max_txs_per_address: usize,
    #[arg(short = 'n', long, default_value = "5000")]
    max_nodes: usize,
    /// Seconds to wait between API requests
    #[arg(long, default_value = "1.0")]
    request_sleep: f64,
    /// .png, .svg or .dot
    #[arg(short, long, default_value = "btc_address_graph.png")]
    out: PathBuf,
    #[arg(long, default_value = DEFAULT_API_BASE_URL)]
    api_base_url: String,
    #[arg(long, default_value = "50")]
    page_size: usize,
    #[arg(long, default_value = "20")]
    timeout_secs: u64,
    /// How many flows and addresses to list in the summary
    #[arg(long, default_value = "10")]
    top: usize,
}

impl Args {
    fn into_config(self) -> Result<CrawlConfig> {
        let request_delay = Duration::try_from_secs_f64(self.request_sleep)
            .with_context(|| format!("invalid --request-sleep {}", self.request_sleep))?;

        Ok(CrawlConfig {
            seed_address: self.seed_address,
            max_depth: self.max_depth,
            max_txs_per_address: self.max_txs_per_address,
            max_nodes: self.max_nodes,
            request_delay,
            output_path: self.out,
            api_base_url: self.api_base_url,
            page_size: self.page_size,
            request_timeout: Duration::from_secs(self.timeout_secs),
            ..CrawlConfig::default()
        })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("Starting btcgraph");
    let args = Args::parse();
    let top = args.top;
    let config = args.into_config()?;
    config.validate()?;
    info!("Seed address: {}", config.seed_address);
    if config.max_depth > 3 {
        warn!(
            "Max depth {} can take a very long time at {:?} per request",
            config.max_depth, config.request_delay
        )
    }

    let source = BlockchainInfoSource::new(&config)?;
    info!("Using {}", source);

    let output_path = config.output_path.clone();
    let crawler = Crawler::new(source, config);
    let outcome = crawler.crawl();

    if outcome.stats.fetch_failures > 0 {
        warn!(
            "{} of {} addresses could not be fetched",
            outcome.stats.fetch_failures, outcome.stats.addresses_expanded
        );
    }

    let summary = FlowSummary::from_outcome(&outcome, top);
    print!("{}", summary);

    render_graph(&outcome.graph, &outcome.node_amount, &output_path)?;

    Ok(())
}
