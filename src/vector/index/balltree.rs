//! Ball-Tree index.
//!
//! Every node is a hypersphere: the centroid of the points beneath it and a
//! radius equal to the largest centroid-to-point distance. Internal nodes
//! split their points between two seeds: seed A is the point farthest from
//! the centroid, seed B the point farthest from A. Each point joins the nearer
//! seed (ties go to A). Nodes with at most `leaf_size` points, or with radius
//! zero, become leaves.
//!
//! During a query a node is skipped when `dist(query, centroid) - radius`
//! already exceeds the current k-th best distance. The bound follows from the
//! triangle inequality and is independent of any coordinate axis.

use crate::vector::core::distance::euclidean_distance;
use crate::vector::index::{Neighbor, NeighborHeap, PointSet};

#[derive(Debug, Clone)]
struct BallNode {
    centroid: Vec<f32>,
    radius: f32,
    /// Range into `BallTree::order`.
    start: u32,
    end: u32,
    children: Option<(u32, u32)>,
}

/// Ball-Tree over a [`PointSet`].
#[derive(Debug, Clone)]
pub struct BallTree {
    points: PointSet,
    /// Point indices permuted so every node owns a contiguous range.
    order: Vec<u32>,
    nodes: Vec<BallNode>,
}

impl BallTree {
    /// Build the tree. Points start in key order so the shape is deterministic.
    pub fn build(points: PointSet, leaf_size: usize) -> Self {
        let leaf_size = leaf_size.max(1);
        let mut order: Vec<u32> = points.indices().collect();
        order.sort_unstable_by(|&a, &b| points.key(a).cmp(points.key(b)));

        let mut nodes = Vec::new();
        if !order.is_empty() {
            let end = order.len();
            build_node(&points, &mut order, 0, end, leaf_size, &mut nodes);
        }

        Self {
            points,
            order,
            nodes,
        }
    }

    pub fn points(&self) -> &PointSet {
        &self.points
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Pruned k-nearest-neighbor search, nearer child first.
    pub fn query(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        let mut heap = NeighborHeap::new(&self.points, k);
        if !self.nodes.is_empty() {
            self.search(0, query, &mut heap);
        }
        heap.into_neighbors()
    }

    fn search(&self, node_id: u32, query: &[f32], heap: &mut NeighborHeap<'_>) {
        let node = &self.nodes[node_id as usize];

        match node.children {
            None => {
                for &index in &self.order[node.start as usize..node.end as usize] {
                    heap.offer(euclidean_distance(query, self.points.point(index)), index);
                }
            }
            Some((left, right)) => {
                let left_bound = self.lower_bound(left, query);
                let right_bound = self.lower_bound(right, query);
                let visits = if left_bound <= right_bound {
                    [(left, left_bound), (right, right_bound)]
                } else {
                    [(right, right_bound), (left, left_bound)]
                };

                for (child, bound) in visits {
                    if heap.admits(bound) {
                        self.search(child, query, heap);
                    }
                }
            }
        }
    }

    /// Smallest possible distance from `query` to any point inside the node.
    fn lower_bound(&self, node_id: u32, query: &[f32]) -> f32 {
        let node = &self.nodes[node_id as usize];
        euclidean_distance(query, &node.centroid) - node.radius
    }
}

fn build_node(
    points: &PointSet,
    order: &mut [u32],
    start: usize,
    end: usize,
    leaf_size: usize,
    nodes: &mut Vec<BallNode>,
) -> u32 {
    let members = &order[start..end];
    let centroid = centroid(points, members);
    let radius = members
        .iter()
        .map(|&i| euclidean_distance(&centroid, points.point(i)))
        .fold(0.0_f32, f32::max);

    let id = nodes.len() as u32;
    nodes.push(BallNode {
        centroid,
        radius,
        start: start as u32,
        end: end as u32,
        children: None,
    });

    if end - start <= leaf_size || radius == 0.0 {
        return id;
    }

    let split = start + partition(points, &mut order[start..end], &nodes[id as usize].centroid);
    let left = build_node(points, order, start, split, leaf_size, nodes);
    let right = build_node(points, order, split, end, leaf_size, nodes);
    nodes[id as usize].children = Some((left, right));
    id
}

fn centroid(points: &PointSet, members: &[u32]) -> Vec<f32> {
    let mut sums = vec![0.0_f64; points.dimension()];
    for &i in members {
        for (sum, &x) in sums.iter_mut().zip(points.point(i)) {
            *sum += f64::from(x);
        }
    }
    let count = members.len() as f64;
    sums.into_iter().map(|s| (s / count) as f32).collect()
}

/// Index of the member farthest from `from`; the first one wins ties.
fn farthest(points: &PointSet, members: &[u32], from: &[f32]) -> u32 {
    let mut best = members[0];
    let mut best_distance = f32::NEG_INFINITY;
    for &i in members {
        let distance = euclidean_distance(from, points.point(i));
        if distance > best_distance {
            best = i;
            best_distance = distance;
        }
    }
    best
}

/// Reorder `members` so those nearer seed A come first (stable), returning
/// the size of that group. A one-sided split falls back to halving.
fn partition(points: &PointSet, members: &mut [u32], centroid: &[f32]) -> usize {
    let seed_a = farthest(points, members, centroid);
    let seed_b = farthest(points, members, points.point(seed_a));
    let a = points.point(seed_a);
    let b = points.point(seed_b);

    let (near_a, near_b): (Vec<u32>, Vec<u32>) = members
        .iter()
        .partition(|&&i| euclidean_distance(a, points.point(i)) <= euclidean_distance(b, points.point(i)));

    let split = near_a.len();
    if split == 0 || split == members.len() {
        return members.len() / 2;
    }

    members[..split].copy_from_slice(&near_a);
    members[split..].copy_from_slice(&near_b);
    split
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::index::ChunkKey;
    use crate::vector::index::flat::FlatIndex;

    fn clustered_points() -> PointSet {
        let mut points = PointSet::new(3);
        let centers = [[0.0, 0.0, 0.0], [10.0, 10.0, 10.0], [-8.0, 4.0, 2.0]];
        for (c, center) in centers.iter().enumerate() {
            for i in 0..30 {
                let offset = (i as f32) * 0.05;
                points
                    .push(
                        ChunkKey::new(format!("doc{c}"), format!("c{c}-{i:02}")),
                        &[center[0] + offset, center[1] - offset, center[2] + offset * 0.5],
                    )
                    .unwrap();
            }
        }
        points
    }

    #[test]
    fn test_balltree_splits_until_leaf_size() {
        let tree = BallTree::build(clustered_points(), 4);
        assert!(tree.node_count() > 1);
        for node in &tree.nodes {
            if node.children.is_none() {
                assert!(node.end - node.start <= 4 || node.radius == 0.0);
            }
        }
    }

    #[test]
    fn test_balltree_radius_covers_members() {
        let tree = BallTree::build(clustered_points(), 8);
        for node in &tree.nodes {
            for &i in &tree.order[node.start as usize..node.end as usize] {
                let d = euclidean_distance(&node.centroid, tree.points.point(i));
                assert!(d <= node.radius);
            }
        }
    }

    #[test]
    fn test_balltree_matches_flat() {
        let tree = BallTree::build(clustered_points(), 4);
        let flat = FlatIndex::build(clustered_points(), usize::MAX);

        for query in [[0.5, -0.5, 0.2], [10.0, 10.0, 10.0], [-3.0, 2.0, 1.0], [100.0, 0.0, 0.0]] {
            for k in [1, 5, 31, 90, 200] {
                assert_eq!(tree.query(&query, k), flat.query(&query, k));
            }
        }
    }

    #[test]
    fn test_balltree_identical_points_form_a_leaf() {
        let mut points = PointSet::new(2);
        for i in 0..40 {
            points
                .push(ChunkKey::new("d", format!("c{i:02}")), &[2.0, 2.0])
                .unwrap();
        }
        let tree = BallTree::build(points, 2);
        assert_eq!(tree.node_count(), 1);
        let ids: Vec<String> = tree
            .query(&[0.0, 0.0], 2)
            .into_iter()
            .map(|n| n.key.chunk_id)
            .collect();
        assert_eq!(ids, vec!["c00", "c01"]);
    }
}
