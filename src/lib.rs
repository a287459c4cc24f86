// Basic types used throughout btcgraph
pub mod types;

// Static crawl parameters
pub mod config;
// Fetch and config errors
pub mod error;

// TransactionSource trait and the blockchain.info connector
pub mod data_sources;
// Haircut attribution of transaction outputs to inputs
pub mod attribution;
// Module for building the address graph from a TransactionSource
pub mod traversal;

// Types and functions for summarizing a crawl
pub mod summary;

// Rendering and loop detection over the address graph
pub mod graph_utils;
