//! Edge connectivity between shapes
//!
//! Two shapes are connected when they share a congruent edge and resolve
//! to the same parent group. Clusters are the connected components of
//! that relation.

use std::collections::{BTreeSet, HashMap, VecDeque};

use crumble_geometry::PolyEdge;

/// One shape as seen by the connectivity search
#[derive(Debug, Clone)]
pub struct ConnectivityNode<K, P> {
    pub key: K,
    /// Resolved parent group, if any
    pub parent: Option<P>,
    pub edges: Vec<PolyEdge>,
}

/// Partition nodes into clusters connected through shared edges.
///
/// Every node lands in exactly one cluster. Nodes without a matching
/// neighbor form singleton clusters. Cluster and member order follow the
/// input order.
pub fn partition_by_shared_edges<K: Copy, P: PartialEq>(
    nodes: &[ConnectivityNode<K, P>],
) -> Vec<Vec<K>> {
    let mut by_edge: HashMap<PolyEdge, Vec<usize>> = HashMap::new();
    for (index, node) in nodes.iter().enumerate() {
        for edge in &node.edges {
            by_edge.entry(*edge).or_default().push(index);
        }
    }

    let mut remaining: BTreeSet<usize> = (0..nodes.len()).collect();
    let mut clusters = Vec::new();
    let mut queue = VecDeque::new();

    while let Some(seed) = remaining.pop_first() {
        let mut members = vec![seed];
        queue.push_back(seed);

        while let Some(current) = queue.pop_front() {
            for edge in &nodes[current].edges {
                let Some(neighbors) = by_edge.get(edge) else {
                    continue;
                };
                for &neighbor in neighbors {
                    if !remaining.contains(&neighbor) {
                        continue;
                    }
                    if nodes[neighbor].parent != nodes[current].parent {
                        continue;
                    }
                    remaining.remove(&neighbor);
                    members.push(neighbor);
                    queue.push_back(neighbor);
                }
            }
        }

        members.sort_unstable();
        clusters.push(members.into_iter().map(|i| nodes[i].key).collect());
    }

    log::trace!(
        "Connectivity: {} nodes -> {} clusters",
        nodes.len(),
        clusters.len()
    );
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crumble_geometry::edge::contour_edges;
    use crumble_geometry::Contour;
    use glam::Vec2;

    fn node(key: u32, parent: Option<u8>, min: Vec2, max: Vec2) -> ConnectivityNode<u32, u8> {
        ConnectivityNode {
            key,
            parent,
            edges: contour_edges(&Contour::rect(min, max)).collect(),
        }
    }

    #[test]
    fn test_shared_edge_joins() {
        let nodes = vec![
            node(0, None, Vec2::ZERO, Vec2::ONE),
            node(1, None, Vec2::new(1.0, 0.0), Vec2::new(2.0, 1.0)),
            node(2, None, Vec2::new(5.0, 0.0), Vec2::new(6.0, 1.0)),
        ];
        let clusters = partition_by_shared_edges(&nodes);
        assert_eq!(clusters, vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_chain_is_transitive() {
        let nodes: Vec<_> = (0..5)
            .map(|i| {
                let x = i as f32;
                node(i, Some(1), Vec2::new(x, 0.0), Vec2::new(x + 1.0, 1.0))
            })
            .rev()
            .collect();
        let clusters = partition_by_shared_edges(&nodes);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 5);
    }

    #[test]
    fn test_different_parents_stay_apart() {
        let nodes = vec![
            node(0, Some(1), Vec2::ZERO, Vec2::ONE),
            node(1, Some(2), Vec2::new(1.0, 0.0), Vec2::new(2.0, 1.0)),
        ];
        assert_eq!(partition_by_shared_edges(&nodes).len(), 2);
    }

    #[test]
    fn test_corner_touch_is_not_connected() {
        let nodes = vec![
            node(0, None, Vec2::ZERO, Vec2::ONE),
            node(1, None, Vec2::ONE, Vec2::splat(2.0)),
        ];
        assert_eq!(partition_by_shared_edges(&nodes).len(), 2);
    }

    #[test]
    fn test_partition_covers_every_node_once() {
        let nodes: Vec<_> = (0..20)
            .map(|i| {
                let x = (i % 7) as f32 * 1.0;
                let y = (i / 7) as f32 * 3.0;
                node(i, Some((i % 2) as u8), Vec2::new(x, y), Vec2::new(x + 1.0, y + 1.0))
            })
            .collect();
        let clusters = partition_by_shared_edges(&nodes);
        let mut seen: Vec<u32> = clusters.into_iter().flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }
}
