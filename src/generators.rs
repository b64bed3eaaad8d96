//! Graph generators producing `UnGraph<NodeId, ()>` with node ids `"0".."n-1"`.
//!
//! Generators draw from the caller's [`RandomSource`], so a seeded source
//! yields the same graph every time.

use std::collections::{BTreeSet, HashMap};

use petgraph::graph::{NodeIndex, UnGraph};
use rand::Rng;

use crate::error::ValidationError;
use crate::graph::NodeId;
use crate::random::RandomSource;

/// Generated or loaded undirected graph.
pub type NetworkGraph = UnGraph<NodeId, ()>;

fn invalid(reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidGenerator { reason: reason.into() }
}

fn with_nodes(n: usize, edges_hint: usize) -> (NetworkGraph, Vec<NodeIndex>) {
    let mut graph = NetworkGraph::with_capacity(n, edges_hint);
    let nodes = (0..n).map(|i| graph.add_node(NodeId::from(i))).collect();
    (graph, nodes)
}

/// Complete graph on `n` nodes.
pub fn complete(n: usize) -> Result<NetworkGraph, ValidationError> {
    if n == 0 {
        return Err(invalid("complete graph needs at least one node"));
    }
    let (mut graph, nodes) = with_nodes(n, n * (n - 1) / 2);
    for (i, &a) in nodes.iter().enumerate() {
        for &b in &nodes[i + 1..] {
            graph.add_edge(a, b, ());
        }
    }
    Ok(graph)
}

/// G(n, p) random graph: every pair is joined independently with probability `p`.
pub fn erdos_renyi(n: usize, p: f64, rng: &mut RandomSource) -> Result<NetworkGraph, ValidationError> {
    if n == 0 {
        return Err(invalid("G(n, p) needs at least one node"));
    }
    if !(0.0..=1.0).contains(&p) {
        return Err(invalid(format!("edge probability {p} is outside [0, 1]")));
    }
    let (mut graph, nodes) = with_nodes(n, 0);
    for (i, &a) in nodes.iter().enumerate() {
        for &b in &nodes[i + 1..] {
            if rng.chance(p) {
                graph.add_edge(a, b, ());
            }
        }
    }
    tracing::debug!(nodes = n, p, edges = graph.edge_count(), "erdos-renyi graph generated");
    Ok(graph)
}

/// Barabási–Albert preferential-attachment graph.
///
/// Starts from a star on `m + 1` nodes; every further node attaches to `m`
/// distinct existing nodes chosen with probability proportional to degree.
pub fn barabasi_albert(n: usize, m: usize, rng: &mut RandomSource) -> Result<NetworkGraph, ValidationError> {
    if m == 0 || m >= n {
        return Err(invalid(format!(
            "preferential attachment needs 1 <= m < n, got m = {m}, n = {n}"
        )));
    }
    let (mut graph, nodes) = with_nodes(n, (n - m) * m);

    // One entry per edge endpoint, so uniform picks are degree-proportional.
    let mut endpoints: Vec<usize> = Vec::with_capacity(2 * (n - m) * m);
    for leaf in 1..=m {
        graph.add_edge(nodes[0], nodes[leaf], ());
        endpoints.push(0);
        endpoints.push(leaf);
    }

    for source in m + 1..n {
        let mut targets = BTreeSet::new();
        while targets.len() < m {
            targets.insert(endpoints[rng.gen_range(0..endpoints.len())]);
        }
        for &target in &targets {
            graph.add_edge(nodes[source], nodes[target], ());
            endpoints.push(target);
            endpoints.push(source);
        }
    }
    tracing::debug!(nodes = n, m, edges = graph.edge_count(), "barabasi-albert graph generated");
    Ok(graph)
}

/// Builds a graph from explicit nodes and edges.
///
/// Edge endpoints missing from `nodes` are added. Repeated edges collapse into one.
pub fn from_edge_list<N, E, A, B>(nodes: N, edges: E) -> NetworkGraph
where
    N: IntoIterator,
    N::Item: Into<NodeId>,
    E: IntoIterator<Item = (A, B)>,
    A: Into<NodeId>,
    B: Into<NodeId>,
{
    let mut graph = NetworkGraph::new_undirected();
    let mut index: HashMap<NodeId, NodeIndex> = HashMap::new();
    let mut ensure = |graph: &mut NetworkGraph, id: NodeId| {
        *index.entry(id.clone()).or_insert_with(|| graph.add_node(id))
    };

    for node in nodes {
        ensure(&mut graph, node.into());
    }
    for (a, b) in edges {
        let a = ensure(&mut graph, a.into());
        let b = ensure(&mut graph, b.into());
        graph.update_edge(a, b, ());
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_graph_has_every_pair() {
        let g = complete(5).unwrap();
        assert_eq!(g.node_count(), 5);
        assert_eq!(g.edge_count(), 10);
        assert_eq!(g[NodeIndex::new(3)].as_str(), "3");
        assert!(complete(0).is_err());
    }

    #[test]
    fn erdos_renyi_extremes() {
        let mut rng = RandomSource::seeded(0);
        assert_eq!(erdos_renyi(10, 0.0, &mut rng).unwrap().edge_count(), 0);
        assert_eq!(erdos_renyi(10, 1.0, &mut rng).unwrap().edge_count(), 45);
        assert!(matches!(
            erdos_renyi(10, 1.5, &mut rng),
            Err(ValidationError::InvalidGenerator { .. })
        ));
    }

    #[test]
    fn erdos_renyi_is_reproducible() {
        let a = erdos_renyi(50, 0.1, &mut RandomSource::seeded(42)).unwrap();
        let b = erdos_renyi(50, 0.1, &mut RandomSource::seeded(42)).unwrap();
        let edges = |g: &NetworkGraph| {
            g.edge_indices()
                .filter_map(|e| g.edge_endpoints(e))
                .map(|(x, y)| (x.index(), y.index()))
                .collect::<Vec<_>>()
        };
        assert_eq!(edges(&a), edges(&b));
    }

    #[test]
    fn barabasi_albert_edge_count() {
        let mut rng = RandomSource::seeded(7);
        let g = barabasi_albert(100, 3, &mut rng).unwrap();
        assert_eq!(g.node_count(), 100);
        // star of m edges, then m edges per additional node
        assert_eq!(g.edge_count(), 3 + (100 - 4) * 3);
        assert!(barabasi_albert(3, 3, &mut rng).is_err());
        assert!(barabasi_albert(3, 0, &mut rng).is_err());
    }

    #[test]
    fn edge_list_adds_missing_endpoints() {
        let g = from_edge_list(["a", "b"], [("a", "c"), ("c", "a"), ("b", "c")]);
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 2);
    }
}
