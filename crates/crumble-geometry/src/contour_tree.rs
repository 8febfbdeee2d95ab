//! Contour soup nesting analysis
//!
//! Contour extractors hand us an unordered list of closed contours. Nesting
//! depth decides their role: even depth contours are solid outlines, odd
//! depth contours are holes of their parent. Islands inside holes start a
//! new cluster at the next even depth.

use crate::{Contour, Winding};

/// One solid outline with the holes directly inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct ContourCluster {
    /// Clockwise outer contour
    pub outer: Contour,
    /// Counter-clockwise holes
    pub holes: Vec<Contour>,
}

impl ContourCluster {
    pub fn area(&self) -> f32 {
        self.outer.area() - self.holes.iter().map(Contour::area).sum::<f32>()
    }
}

/// Group a contour soup into outer + holes clusters.
///
/// Contours with fewer than three points or no area are ignored. The tree
/// is walked with an explicit worklist, so deep nesting cannot overflow the
/// stack.
pub fn build_contour_tree(soup: Vec<Contour>) -> Vec<ContourCluster> {
    let contours: Vec<Contour> = soup
        .into_iter()
        .filter(|c| c.is_valid() && c.area() > f32::EPSILON)
        .collect();
    if contours.is_empty() {
        return Vec::new();
    }

    let areas: Vec<f32> = contours.iter().map(Contour::area).collect();

    // Largest first, so every potential parent precedes its children
    let mut order: Vec<usize> = (0..contours.len()).collect();
    order.sort_by(|&a, &b| areas[b].total_cmp(&areas[a]));

    let mut parent: Vec<Option<usize>> = vec![None; contours.len()];
    for (rank, &i) in order.iter().enumerate() {
        let sample = contours[i].points()[0];
        // Smallest enclosing contour is the direct parent
        parent[i] = order[..rank]
            .iter()
            .rev()
            .copied()
            .find(|&j| areas[j] > areas[i] && contours[j].contains_point(sample));
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); contours.len()];
    let mut roots = Vec::new();
    for &i in &order {
        match parent[i] {
            Some(p) => children[p].push(i),
            None => roots.push(i),
        }
    }

    let mut clusters = Vec::new();
    let mut worklist: Vec<(Vec<usize>, usize)> = vec![(roots, 0)];
    while let Some((nodes, depth)) = worklist.pop() {
        let next: Vec<usize> = nodes
            .iter()
            .flat_map(|&n| children[n].iter().copied())
            .collect();

        if depth % 2 == 0 {
            for &n in &nodes {
                clusters.push(ContourCluster {
                    outer: contours[n].clone().with_winding(Winding::Clockwise),
                    holes: children[n]
                        .iter()
                        .map(|&h| contours[h].clone().with_winding(Winding::CounterClockwise))
                        .collect(),
                });
            }
        }

        if !next.is_empty() {
            worklist.push((next, depth + 1));
        }
    }

    log::trace!(
        "Contour tree: {} contours -> {} clusters",
        contours.len(),
        clusters.len()
    );

    clusters
}
