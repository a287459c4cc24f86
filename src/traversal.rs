use crate::{
    attribution::address_edges_from_transactions,
    config::CrawlConfig,
    data_sources::TransactionSource,
    types::{Address, AddressGraph, FlowEdge, Frontier},
};
use petgraph::graph::NodeIndex;
use std::{
    collections::{HashMap, HashSet},
    thread,
};
use tracing::{debug, info, warn};

/// Counters collected while crawling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlStats {
    pub addresses_expanded: usize,
    pub fetch_failures: usize,
    pub transactions_seen: usize,
    pub edges_attributed: usize,
    pub hit_node_cap: bool,
}

///
/// CrawlOutcome
///
/// The finished graph plus the flow tables it was built from.
///
/// `edge_weights` can hold pairs that never made it into `graph` because an
/// endpoint arrived after the node cap was reached.
///
#[derive(Debug)]
pub struct CrawlOutcome {
    pub graph: AddressGraph,
    /// Node index of every address in `graph`.
    pub addr_idx_map: HashMap<Address, NodeIndex>,
    pub node_amount: HashMap<Address, f64>,
    pub edge_weights: HashMap<(Address, Address), f64>,
    pub stats: CrawlStats,
}

impl CrawlOutcome {
    pub fn node_index(&self, address: &str) -> Option<NodeIndex> {
        self.addr_idx_map.get(address).copied()
    }

    /// Weight of the `source -> destination` edge in the graph, if present.
    pub fn edge_weight(&self, source: &str, destination: &str) -> Option<f64> {
        let from = self.node_index(source)?;
        let to = self.node_index(destination)?;
        self.graph
            .find_edge(from, to)
            .map(|edge| self.graph[edge].weight)
    }

    pub fn amount(&self, address: &str) -> f64 {
        self.node_amount.get(address).copied().unwrap_or(0.0)
    }
}

/// Crawler
///
/// Breadth-first expansion of an address graph from a seed.
///
/// Only destinations of attributed edges are followed, but flow is credited
/// to both ends of every edge seen.
pub struct Crawler<S: TransactionSource> {
    source: S,
    config: CrawlConfig,
}

impl<S: TransactionSource> Crawler<S> {
    pub fn new(source: S, config: CrawlConfig) -> Self {
        Self { source, config }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Crawls outward from the configured seed address.
    pub fn crawl(&self) -> CrawlOutcome {
        let seed = self.config.seed_address.as_str();
        let max_nodes = self.config.max_nodes;
        let max_depth = self.config.max_depth;
        // Sized from the node cap
        let capacity = max_nodes.min(1 << 16);

        let mut graph = AddressGraph::with_capacity(capacity, capacity);
        // addr_idx_map maps addresses to their node index so edges can be inserted
        let mut addr_idx_map: HashMap<Address, NodeIndex> = HashMap::with_capacity(capacity);
        let mut visited: HashSet<Address> = HashSet::with_capacity(capacity);
        let mut edge_weights: HashMap<(Address, Address), f64> = HashMap::with_capacity(capacity);
        let mut node_amount: HashMap<Address, f64> = HashMap::with_capacity(capacity);
        let mut stats = CrawlStats::default();

        let mut frontier = Frontier::new();
        frontier.push_back((seed.to_string(), 0));

        info!(
            "Crawling from {} (max depth {}, max nodes {})",
            seed, max_depth, max_nodes
        );

        while let Some((addr, depth)) = frontier.pop_front() {
            if graph.node_count() >= max_nodes {
                stats.hit_node_cap = true;
                info!("Node cap of {} reached, stopping", max_nodes);
                break;
            }
            if visited.contains(&addr) {
                continue;
            }
            visited.insert(addr.clone());
            admit_node(&mut graph, &mut addr_idx_map, &addr, max_nodes);
            stats.addresses_expanded += 1;

            let txs = match self
                .source
                .fetch_transactions(&addr, self.config.max_txs_per_address)
            {
                Ok(txs) => txs,
                Err(err) => {
                    warn!("fetch {} failed: {}", addr, err);
                    stats.fetch_failures += 1;
                    continue;
                }
            };
            stats.transactions_seen += txs.len();

            let edges = address_edges_from_transactions(&txs);
            stats.edges_attributed += edges.len();
            debug!(
                "{} (depth {}): {} txs -> {} edges",
                addr,
                depth,
                txs.len(),
                edges.len()
            );

            // Pairs touched by this batch, and successors in first-seen order
            let mut touched: Vec<(Address, Address)> = Vec::new();
            let mut touched_set: HashSet<(Address, Address)> = HashSet::new();
            let mut to_enqueue: Vec<Address> = Vec::new();
            let mut to_enqueue_set: HashSet<Address> = HashSet::new();

            for edge in edges {
                let key = (edge.source.clone(), edge.destination.clone());
                *edge_weights.entry(key.clone()).or_insert(0.0) += edge.weight;
                *node_amount.entry(edge.source.clone()).or_insert(0.0) += edge.weight;
                *node_amount.entry(edge.destination.clone()).or_insert(0.0) += edge.weight;

                if touched_set.insert(key.clone()) {
                    touched.push(key);
                }
                if depth < max_depth && to_enqueue_set.insert(edge.destination.clone()) {
                    to_enqueue.push(edge.destination);
                }
            }

            for (from, to) in touched {
                let weight = edge_weights[&(from.clone(), to.clone())];
                if let Some((from_idx, to_idx)) =
                    admit_pair(&mut graph, &mut addr_idx_map, &from, &to, max_nodes)
                {
                    graph.update_edge(from_idx, to_idx, FlowEdge { weight });
                }
            }

            for next in to_enqueue {
                if !visited.contains(&next) && graph.node_count() < max_nodes {
                    frontier.push_back((next, depth + 1));
                }
            }

            thread::sleep(self.config.request_delay);
        }

        if graph.node_count() >= max_nodes {
            stats.hit_node_cap = true;
        }

        info!(
            "Crawl finished: {} addresses expanded, {} failures, {} nodes, {} edges",
            stats.addresses_expanded,
            stats.fetch_failures,
            graph.node_count(),
            graph.edge_count()
        );

        CrawlOutcome {
            graph,
            addr_idx_map,
            node_amount,
            edge_weights,
            stats,
        }
    }
}

/// Returns the node for `address`, adding it if the graph still has room.
fn admit_node(
    graph: &mut AddressGraph,
    addr_idx_map: &mut HashMap<Address, NodeIndex>,
    address: &str,
    max_nodes: usize,
) -> Option<NodeIndex> {
    if let Some(idx) = addr_idx_map.get(address) {
        return Some(*idx);
    }
    if graph.node_count() >= max_nodes {
        return None;
    }
    let idx = graph.add_node(address.to_string());
    addr_idx_map.insert(address.to_string(), idx);
    Some(idx)
}

/// Returns both endpoint nodes, adding the missing ones only if all of them
/// fit under the cap. Either both endpoints are in the graph or neither is added.
fn admit_pair(
    graph: &mut AddressGraph,
    addr_idx_map: &mut HashMap<Address, NodeIndex>,
    from: &str,
    to: &str,
    max_nodes: usize,
) -> Option<(NodeIndex, NodeIndex)> {
    let mut missing = 0;
    if !addr_idx_map.contains_key(from) {
        missing += 1;
    }
    if from != to && !addr_idx_map.contains_key(to) {
        missing += 1;
    }
    if graph.node_count() + missing > max_nodes {
        return None;
    }
    let from_idx = admit_node(graph, addr_idx_map, from, max_nodes)?;
    let to_idx = admit_node(graph, addr_idx_map, to, max_nodes)?;
    Some((from_idx, to_idx))
}
