use std::collections::{HashMap, VecDeque};

use apiflow_core::error::{FlowError, Result};
use apiflow_core::types::{Edge, Node};

/// Order nodes so that every edge's source comes before its target (Kahn's algorithm).
///
/// Ties are broken by declared node order, so the same graph always yields
/// the same order. Fails with `CycleDetected` naming the nodes that could not
/// be scheduled, or `DanglingEdge` if an edge names a missing node.
pub fn topological_order(nodes: &[Node], edges: &[Edge]) -> Result<Vec<String>> {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    let mut in_degree = vec![0usize; nodes.len()];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];

    for edge in edges {
        let lookup = |id: &str| {
            index.get(id).copied().ok_or_else(|| FlowError::DanglingEdge {
                edge: edge.id.clone(),
                node: id.to_string(),
            })
        };
        let source = lookup(edge.source.as_str())?;
        let target = lookup(edge.target.as_str())?;
        successors[source].push(target);
        in_degree[target] += 1;
    }

    let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(i) = queue.pop_front() {
        order.push(nodes[i].id.clone());
        for &next in &successors[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() != nodes.len() {
        let cyclic = nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| in_degree[*i] > 0)
            .map(|(_, n)| n.id.clone())
            .collect();
        return Err(FlowError::CycleDetected { nodes: cyclic });
    }

    Ok(order)
}
