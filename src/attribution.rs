use crate::types::{Address, AttributedEdge, Transaction};

/// Converts a batch of transactions into address-to-address edges.
///
/// Haircut attribution: every output's value is split evenly over the
/// resolvable inputs, and each (input, output) pair gets one share. Inputs are
/// counted per occurrence, so an address spending two outputs in the same
/// transaction receives two shares.
///
/// Transactions with no resolvable input or no positive, addressed output
/// contribute nothing.
pub fn address_edges_from_transactions(transactions: &[Transaction]) -> Vec<AttributedEdge> {
    let mut edges = Vec::new();

    for tx in transactions {
        let inputs: Vec<&str> = tx.inputs.iter().filter_map(|i| i.address()).collect();

        let outputs: Vec<(&str, f64)> = tx
            .out
            .iter()
            .filter_map(|o| o.address().map(|addr| (addr, o.value_btc())))
            .filter(|(_, value)| *value > 0.0)
            .collect();

        if inputs.is_empty() || outputs.is_empty() {
            continue;
        }

        let denom = inputs.len().max(1) as f64;
        for input in &inputs {
            for (output, value) in &outputs {
                edges.push(AttributedEdge::new(
                    Address::from(*input),
                    Address::from(*output),
                    value / denom,
                ));
            }
        }
    }

    edges
}
