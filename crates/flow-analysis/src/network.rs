//! Global transaction-network metrics.
//!
//! Builds one directed graph over every cleaned transfer (one node per
//! address, parallel transfers collapsed to a single edge, last weight
//! wins) and computes whole-network measures: density, self-loops,
//! reciprocity, clustering, and path-length statistics. Path metrics use
//! the undirected projection; on a disconnected projection they are taken
//! over the largest connected component.

use std::collections::{HashMap, HashSet, VecDeque};

use flow_data::Transfer;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use tracing::debug;

/// Whole-network metrics report.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NetworkMetrics {
    pub node_count: usize,
    pub edge_count: usize,
    /// Directed density: e / (n·(n−1)).
    pub density: f64,
    pub self_loops: usize,
    /// Fraction of non-loop directed edges whose reverse edge exists.
    pub reciprocity: f64,
    /// Average clustering coefficient of the undirected projection.
    pub avg_clustering: f64,
    /// Diameter of the largest connected component (undirected).
    pub diameter: usize,
    /// Average shortest-path length over ordered pairs in the largest
    /// connected component (undirected).
    pub avg_path_length: f64,
    /// Node count of the largest connected component.
    pub largest_component_size: usize,
}

/// Build the global transaction graph. Transfers with an empty side are
/// skipped; repeated (sender, receiver) pairs collapse to one edge whose
/// weight is the last transfer's normalized amount.
pub fn build_network<'a, I>(transfers: I) -> DiGraph<String, f64>
where
    I: IntoIterator<Item = &'a Transfer>,
{
    let mut graph: DiGraph<String, f64> = DiGraph::new();
    let mut addr_to_ix: HashMap<String, NodeIndex> = HashMap::new();

    for transfer in transfers {
        if transfer.from.is_empty() || transfer.to.is_empty() {
            continue;
        }
        let from_ix = *addr_to_ix
            .entry(transfer.from.clone())
            .or_insert_with(|| graph.add_node(transfer.from.clone()));
        let to_ix = *addr_to_ix
            .entry(transfer.to.clone())
            .or_insert_with(|| graph.add_node(transfer.to.clone()));

        graph.update_edge(from_ix, to_ix, transfer.amount.unwrap_or(0.0));
    }

    debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "built transaction network"
    );
    graph
}

/// Compute all metrics for a built network.
pub fn compute_metrics(graph: &DiGraph<String, f64>) -> NetworkMetrics {
    let node_count = graph.node_count();
    let edge_count = graph.edge_count();

    let density = if node_count > 1 {
        edge_count as f64 / (node_count as f64 * (node_count as f64 - 1.0))
    } else {
        0.0
    };

    let directed_edges: HashSet<(usize, usize)> = graph
        .edge_references()
        .map(|e| (e.source().index(), e.target().index()))
        .collect();

    let self_loops = directed_edges.iter().filter(|(u, v)| u == v).count();

    let non_loop: Vec<&(usize, usize)> =
        directed_edges.iter().filter(|(u, v)| u != v).collect();
    let reciprocal = non_loop
        .iter()
        .filter(|(u, v)| directed_edges.contains(&(*v, *u)))
        .count();
    let reciprocity = if non_loop.is_empty() {
        0.0
    } else {
        reciprocal as f64 / non_loop.len() as f64
    };

    // Undirected simple projection, self-loops excluded.
    let mut neighbors: Vec<HashSet<usize>> = vec![HashSet::new(); node_count];
    for (u, v) in directed_edges.iter().filter(|(u, v)| u != v) {
        neighbors[*u].insert(*v);
        neighbors[*v].insert(*u);
    }

    let avg_clustering = average_clustering(&neighbors);
    let (component, largest_component_size) = largest_component(&neighbors);
    let (diameter, avg_path_length) = path_metrics(&neighbors, &component);

    NetworkMetrics {
        node_count,
        edge_count,
        density,
        self_loops,
        reciprocity,
        avg_clustering,
        diameter,
        avg_path_length,
        largest_component_size,
    }
}

/// Mean of per-node clustering coefficients: links among a node's
/// neighbors over the possible neighbor pairs. Degree-<2 nodes contribute 0.
fn average_clustering(neighbors: &[HashSet<usize>]) -> f64 {
    if neighbors.is_empty() {
        return 0.0;
    }

    let mut total = 0.0;
    for adjacent in neighbors {
        let degree = adjacent.len();
        if degree < 2 {
            continue;
        }
        let nodes: Vec<usize> = adjacent.iter().copied().collect();
        let mut links = 0usize;
        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                if neighbors[nodes[i]].contains(&nodes[j]) {
                    links += 1;
                }
            }
        }
        total += 2.0 * links as f64 / (degree as f64 * (degree as f64 - 1.0));
    }

    total / neighbors.len() as f64
}

/// Largest connected component of the undirected projection.
fn largest_component(neighbors: &[HashSet<usize>]) -> (Vec<usize>, usize) {
    let n = neighbors.len();
    let mut seen = vec![false; n];
    let mut largest: Vec<usize> = Vec::new();

    for start in 0..n {
        if seen[start] {
            continue;
        }
        let mut component = vec![start];
        seen[start] = true;
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for &next in &neighbors[node] {
                if !seen[next] {
                    seen[next] = true;
                    component.push(next);
                    queue.push_back(next);
                }
            }
        }
        if component.len() > largest.len() {
            largest = component;
        }
    }

    let size = largest.len();
    (largest, size)
}

/// Diameter and average shortest-path length within one component, via BFS
/// from every member. Average is over ordered pairs.
fn path_metrics(neighbors: &[HashSet<usize>], component: &[usize]) -> (usize, f64) {
    if component.len() < 2 {
        return (0, 0.0);
    }

    let members: HashSet<usize> = component.iter().copied().collect();
    let mut diameter = 0usize;
    let mut distance_sum = 0u64;

    for &start in component {
        let mut dist: HashMap<usize, usize> = HashMap::from([(start, 0)]);
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            let d = dist[&node];
            for &next in &neighbors[node] {
                if members.contains(&next) && !dist.contains_key(&next) {
                    dist.insert(next, d + 1);
                    queue.push_back(next);
                }
            }
        }
        for (&node, &d) in &dist {
            if node != start {
                diameter = diameter.max(d);
                distance_sum += d as u64;
            }
        }
    }

    let pairs = component.len() as f64 * (component.len() as f64 - 1.0);
    (diameter, distance_sum as f64 / pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(from: &str, to: &str) -> Transfer {
        Transfer {
            timestamp: 1_700_000_000,
            hash: format!("0x{from}{to}"),
            from: from.to_string(),
            to: to.to_string(),
            value: String::new(),
            contract_address: None,
            token_symbol: "ETH".to_string(),
            decimals: 18,
            amount: Some(1.0),
        }
    }

    #[test]
    fn parallel_transfers_collapse_to_one_edge() {
        let transfers = vec![transfer("a", "b"), transfer("a", "b")];
        let graph = build_network(&transfers);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn reciprocity_of_mutual_pair_is_one() {
        let transfers = vec![transfer("a", "b"), transfer("b", "a")];
        let metrics = compute_metrics(&build_network(&transfers));
        assert!((metrics.reciprocity - 1.0).abs() < 1e-12);

        let one_way = vec![transfer("a", "b")];
        let metrics = compute_metrics(&build_network(&one_way));
        assert_eq!(metrics.reciprocity, 0.0);
    }

    #[test]
    fn density_of_full_pair_graph() {
        // Two nodes with both directed edges: density 2 / (2·1) = 1.
        let transfers = vec![transfer("a", "b"), transfer("b", "a")];
        let metrics = compute_metrics(&build_network(&transfers));
        assert!((metrics.density - 1.0).abs() < 1e-12);
    }

    #[test]
    fn self_loops_counted_and_excluded_from_paths() {
        let transfers = vec![transfer("a", "a"), transfer("a", "b")];
        let metrics = compute_metrics(&build_network(&transfers));
        assert_eq!(metrics.self_loops, 1);
        assert_eq!(metrics.diameter, 1);
    }

    #[test]
    fn triangle_clustering_is_one() {
        let transfers = vec![transfer("a", "b"), transfer("b", "c"), transfer("c", "a")];
        let metrics = compute_metrics(&build_network(&transfers));
        assert!((metrics.avg_clustering - 1.0).abs() < 1e-12);
    }

    #[test]
    fn path_graph_diameter_and_average() {
        // a-b-c undirected path: diameter 2, mean over ordered pairs
        // (1+2+1+1+2+1)/6 = 4/3.
        let transfers = vec![transfer("a", "b"), transfer("b", "c")];
        let metrics = compute_metrics(&build_network(&transfers));
        assert_eq!(metrics.diameter, 2);
        assert!((metrics.avg_path_length - 4.0 / 3.0).abs() < 1e-12);
        assert_eq!(metrics.largest_component_size, 3);
    }

    #[test]
    fn disconnected_graph_uses_largest_component() {
        let transfers = vec![
            transfer("a", "b"),
            transfer("b", "c"),
            transfer("x", "y"),
        ];
        let metrics = compute_metrics(&build_network(&transfers));
        assert_eq!(metrics.largest_component_size, 3);
        assert_eq!(metrics.diameter, 2);
    }

    #[test]
    fn empty_network_is_all_zero() {
        let metrics = compute_metrics(&build_network(std::iter::empty::<&Transfer>()));
        assert_eq!(metrics.node_count, 0);
        assert_eq!(metrics.density, 0.0);
        assert_eq!(metrics.avg_clustering, 0.0);
        assert_eq!(metrics.diameter, 0);
    }
}
