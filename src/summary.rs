use crate::{graph_utils::find_closed_loops, traversal::CrawlOutcome, types::Address};
use petgraph::visit::EdgeRef;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedFlow {
    pub from: Address,
    pub to: Address,
    pub weight: f64,
}

impl Display for AggregatedFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.36} -> {:.36} {:.8} BTC", self.from, self.to, self.weight)
    }
}

/// FlowSummary
///
/// A short report over a finished crawl: graph size, the heaviest edges, the
/// addresses with the most flow through them, and how many closed loops the
/// graph contains.
#[derive(Debug, Clone)]
pub struct FlowSummary {
    pub node_count: usize,
    pub edge_count: usize,
    pub closed_loops: usize,
    pub top_flows: Vec<AggregatedFlow>,
    pub top_addresses: Vec<(Address, f64)>,
}

impl FlowSummary {
    pub fn from_outcome(outcome: &CrawlOutcome, limit: usize) -> Self {
        let graph = &outcome.graph;

        let mut flows: Vec<AggregatedFlow> = graph
            .edge_references()
            .map(|edge| AggregatedFlow {
                from: graph[edge.source()].clone(),
                to: graph[edge.target()].clone(),
                weight: edge.weight().weight,
            })
            .collect();
        flows.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then_with(|| a.from.cmp(&b.from))
                .then_with(|| a.to.cmp(&b.to))
        });
        flows.truncate(limit);

        // Only addresses that made it into the graph
        let mut addresses: Vec<(Address, f64)> = graph
            .node_weights()
            .map(|addr| (addr.clone(), outcome.amount(addr)))
            .collect();
        addresses.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        addresses.truncate(limit);

        Self {
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            closed_loops: find_closed_loops(graph).len(),
            top_flows: flows,
            top_addresses: addresses,
        }
    }
}

impl Display for FlowSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Nodes: {}, Edges: {}", self.node_count, self.edge_count)?;
        writeln!(f, "Closed loops: {}", self.closed_loops)?;
        if !self.top_flows.is_empty() {
            writeln!(f, "Top flows:")?;
            for flow in &self.top_flows {
                writeln!(f, "  {}", flow)?;
            }
        }
        if !self.top_addresses.is_empty() {
            writeln!(f, "Top addresses:")?;
            for (addr, amount) in &self.top_addresses {
                writeln!(f, "  {:.36} {:.8} BTC", addr, amount)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::CrawlConfig,
        data_sources::TransactionSource,
        error::FetchError,
        traversal::Crawler,
        types::Transaction,
    };
    use std::time::Duration;

    struct Fixed(Vec<Transaction>);

    impl TransactionSource for Fixed {
        fn fetch_transactions(&self, _: &str, _: usize) -> Result<Vec<Transaction>, FetchError> {
            Ok(self.0.clone())
        }
    }

    fn outcome() -> CrawlOutcome {
        let source = Fixed(vec![Transaction::from_parts(
            &["A"],
            &[("B", 100_000_000), ("C", 50_000_000), ("D", 300_000_000)],
        )]);
        let config = CrawlConfig::default()
            .with_seed("A")
            .with_max_depth(0)
            .with_request_delay(Duration::ZERO);
        Crawler::new(source, config).crawl()
    }

    #[test]
    fn flows_are_sorted_heaviest_first() {
        let summary = FlowSummary::from_outcome(&outcome(), 2);

        assert_eq!(summary.node_count, 4);
        assert_eq!(summary.edge_count, 3);
        assert_eq!(summary.top_flows.len(), 2);
        assert_eq!(summary.top_flows[0].to, "D");
        assert_eq!(summary.top_flows[1].to, "B");
        assert_eq!(summary.top_addresses[0].0, "A");
        assert_eq!(summary.closed_loops, 0);
    }

    #[test]
    fn display_reports_counts() {
        let text = FlowSummary::from_outcome(&outcome(), 10).to_string();
        assert!(text.starts_with("Nodes: 4, Edges: 3"));
        assert!(text.contains("A -> D 3.00000000 BTC"));
    }
}
