use petgraph::{Directed, graph::Graph};
use serde::Deserialize;
use std::{
    collections::VecDeque,
    fmt::{Debug, Display},
};

/// Satoshis in one BTC. Output values arrive in satoshis.
pub const SATOSHIS_PER_BTC: f64 = 100_000_000.0;

///
/// Address
///
/// An opaque address string as reported by the ledger API.
///
pub type Address = String;

///
/// AddressGraph
///
/// Directed graph where nodes are addresses and edges carry the estimated
/// flow between two addresses. See `FlowEdge`.
pub type AddressGraph = Graph<Address, FlowEdge, Directed>;

///
/// Frontier
///
/// Queue of addresses to expand.
///
/// The first element is the address, and the second element is the depth.
///
pub type Frontier = VecDeque<(Address, usize)>;

///
/// FlowEdge
///
/// Accumulated estimated flow, in BTC, from source to destination.
///
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlowEdge {
    pub weight: f64,
}

impl Display for FlowEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.8} BTC", self.weight)
    }
}

///
/// AttributedEdge
///
/// One share of a transaction output credited to one of its inputs.
///
#[derive(Debug, Clone, PartialEq)]
pub struct AttributedEdge {
    pub source: Address,
    pub destination: Address,
    pub weight: f64,
}

impl AttributedEdge {
    pub fn new(source: Address, destination: Address, weight: f64) -> Self {
        Self {
            source,
            destination,
            weight,
        }
    }
}

impl Display for AttributedEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> {} ({:.8} BTC)",
            self.source, self.destination, self.weight
        )
    }
}

/// Previous output spent by an input. Coinbase and some script types have none.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrevOut {
    #[serde(default)]
    pub addr: Option<Address>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxInput {
    #[serde(default)]
    pub prev_out: Option<PrevOut>,
}

impl TxInput {
    pub fn address(&self) -> Option<&str> {
        self.prev_out
            .as_ref()
            .and_then(|prev| prev.addr.as_deref())
            .filter(|addr| !addr.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxOutput {
    #[serde(default)]
    pub addr: Option<Address>,
    /// Value in satoshis.
    #[serde(default)]
    pub value: Option<i64>,
}

impl TxOutput {
    pub fn address(&self) -> Option<&str> {
        self.addr.as_deref().filter(|addr| !addr.is_empty())
    }

    pub fn value_btc(&self) -> f64 {
        self.value.unwrap_or(0) as f64 / SATOSHIS_PER_BTC
    }
}

///
/// Transaction
///
/// A transaction as returned by the `rawaddr` endpoint, reduced to the fields
/// the flow attribution needs.
///
#[derive(Clone, Default, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub inputs: Vec<TxInput>,
    #[serde(default)]
    pub out: Vec<TxOutput>,
}

impl Transaction {
    /// Builds a transaction from plain `(address)` inputs and
    /// `(address, satoshis)` outputs.
    pub fn from_parts(inputs: &[&str], outputs: &[(&str, i64)]) -> Self {
        Self {
            hash: None,
            inputs: inputs
                .iter()
                .map(|addr| TxInput {
                    prev_out: Some(PrevOut {
                        addr: Some(addr.to_string()),
                    }),
                })
                .collect(),
            out: outputs
                .iter()
                .map(|(addr, value)| TxOutput {
                    addr: Some(addr.to_string()),
                    value: Some(*value),
                })
                .collect(),
        }
    }
}

impl Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Transaction {{ hash: {}, inputs: {}, outputs: {} }}",
            self.hash.as_deref().unwrap_or("?"),
            self.inputs.len(),
            self.out.len()
        )
    }
}

/// One page of the `rawaddr` response.
#[derive(Debug, Default, Deserialize)]
pub struct RawAddrPage {
    #[serde(default)]
    pub txs: Vec<Transaction>,
}
