use crate::types::{Address, AddressGraph};
use anyhow::{Context, Result};
use graphviz_rust::{
    cmd::{CommandArg, Format},
    exec, parse,
    printer::PrinterContext,
};
use petgraph::{
    Direction,
    algo::tarjan_scc,
    graph::{EdgeIndex, NodeIndex},
    visit::EdgeRef,
};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

/// Above this many edges the drawing keeps only every n-th edge.
pub const MAX_RENDERED_EDGES: usize = 8000;

const NODE_COLOR: &str = "#1740FA";
const EDGE_COLOR: &str = "#00000026";

/// Image formats the renderer can produce, picked from the output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Dot,
    Svg,
    Png,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("dot") | Some("gv") => OutputFormat::Dot,
            Some("svg") => OutputFormat::Svg,
            _ => OutputFormat::Png,
        }
    }
}

/// Escape an address for use inside a quoted DOT id.
pub fn escape_dot_id(id: &str) -> String {
    id.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Total degree, counting both directions.
pub fn degree(graph: &AddressGraph, node: NodeIndex) -> usize {
    graph.edges_directed(node, Direction::Outgoing).count()
        + graph.edges_directed(node, Direction::Incoming).count()
}

/// Marker area for a node: grows with the square root of its degree and the
/// log of the flow through it, capped at 300.
pub fn node_size(degree: usize, amount: f64) -> f64 {
    let size = 30.0 + 6.0 * (degree as f64).sqrt() + 4.0 * amount.max(0.0).ln_1p();
    size.min(300.0)
}

/// Edges to draw. Past `max_edges` a fixed stride of `len / max_edges` is
/// taken from the edge list.
pub fn sample_edges(graph: &AddressGraph, max_edges: usize) -> Vec<EdgeIndex> {
    let edges: Vec<EdgeIndex> = graph.edge_indices().collect();
    if edges.len() <= max_edges {
        return edges;
    }
    let step = (edges.len() / max_edges.max(1)).max(1);
    edges.into_iter().step_by(step).collect()
}

/// Write the graph into a DOT string laid out with neato's Kamada-Kawai mode.
///
/// Nodes carry no label; their diameter comes from `node_size`.
pub fn write_graph_to_dot(graph: &AddressGraph, node_amount: &HashMap<Address, f64>) -> String {
    let mut dot = String::new();
    dot.push_str("digraph AddressGraph {\n");
    dot.push_str(
        "  graph [layout=neato, mode=KK, overlap=true, outputorder=edgesfirst, size=\"10,10\", dpi=180];\n",
    );
    dot.push_str(&format!(
        "  node [shape=circle, style=filled, fixedsize=true, label=\"\", color=\"{NODE_COLOR}\", fillcolor=\"{NODE_COLOR}\"];\n"
    ));
    dot.push_str(&format!(
        "  edge [arrowhead=none, penwidth=0.5, color=\"{EDGE_COLOR}\"];\n\n"
    ));

    for node_idx in graph.node_indices() {
        let address = &graph[node_idx];
        let amount = node_amount.get(address).copied().unwrap_or(0.0);
        // matplotlib sizes are areas in points^2, graphviz wants inches
        let diameter = node_size(degree(graph, node_idx), amount).sqrt() / 72.0;
        dot.push_str(&format!(
            "  \"{}\" [width={:.3}, tooltip=\"{:.8} BTC\"];\n",
            escape_dot_id(address),
            diameter,
            amount
        ));
    }

    dot.push('\n');

    for edge_idx in sample_edges(graph, MAX_RENDERED_EDGES) {
        if let Some((from_idx, to_idx)) = graph.edge_endpoints(edge_idx) {
            dot.push_str(&format!(
                "  \"{}\" -> \"{}\" [weight={:.8}];\n",
                escape_dot_id(&graph[from_idx]),
                escape_dot_id(&graph[to_idx]),
                graph[edge_idx].weight
            ));
        }
    }

    dot.push_str("}\n");
    dot
}

/// Render the graph to `path`. The extension picks the format: `.dot` writes
/// DOT text, `.svg` and anything else go through Graphviz.
///
/// Image output requires graphviz installed.
pub fn render_graph(
    graph: &AddressGraph,
    node_amount: &HashMap<Address, f64>,
    path: &Path,
) -> Result<PathBuf> {
    let dot = write_graph_to_dot(graph, node_amount);

    let format = match OutputFormat::from_path(path) {
        OutputFormat::Dot => {
            fs::write(path, &dot)
                .with_context(|| format!("Failed to write DOT to {}", path.display()))?;
            info!("Graph saved to: {}", path.display());
            return Ok(path.to_path_buf());
        }
        OutputFormat::Svg => Format::Svg,
        OutputFormat::Png => Format::Png,
    };

    info!("Computing layout (neato, Kamada-Kawai)...");
    let graph_ast = parse(&dot)
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to parse generated DOT")?;

    let image = exec(
        graph_ast,
        &mut PrinterContext::default(),
        vec![CommandArg::Format(format)],
    )
    .context("Failed to run graphviz")?;

    fs::write(path, &image)
        .with_context(|| format!("Failed to write image to {}", path.display()))?;
    info!("Graph saved to: {}", path.display());
    Ok(path.to_path_buf())
}

/// Strongly connected groups of more than one address, each as its own graph.
/// These are places where funds flowed back to where they came from.
pub fn find_closed_loops(graph: &AddressGraph) -> Vec<AddressGraph> {
    let mut closed_loops = Vec::new();

    let mut components = tarjan_scc(graph);
    components.retain(|scc| scc.len() > 1);

    for scc in components {
        let mut index_mapping = HashMap::new();
        let mut loop_graph = AddressGraph::new();

        for node in &scc {
            let new_idx = loop_graph.add_node(graph[*node].clone());
            index_mapping.insert(*node, new_idx);
        }

        for edge in graph.edge_references() {
            if let (Some(source), Some(target)) = (
                index_mapping.get(&edge.source()),
                index_mapping.get(&edge.target()),
            ) {
                loop_graph.add_edge(*source, *target, *edge.weight());
            }
        }

        closed_loops.push(loop_graph);
    }

    closed_loops
}
