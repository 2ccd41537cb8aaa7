//! KD-Tree index.
//!
//! The split axis cycles round-robin with depth (`depth % dimension`) and
//! every node splits at the median point along that axis, so the tree is
//! balanced with depth `O(log n)`. The median is chosen by
//! `(coordinate, key)` order, which pins the tree shape for a given point set.
//!
//! Nodes live in a flat arena addressed by `u32`. Each node owns exactly one
//! point; its left subtree holds points whose coordinate on the node's axis is
//! `<=` the split value and its right subtree points that are `>=`.

use crate::vector::core::distance::euclidean_distance;
use crate::vector::index::{Neighbor, NeighborHeap, PointSet};

#[derive(Debug, Clone)]
struct KdNode {
    point: u32,
    axis: u32,
    left: Option<u32>,
    right: Option<u32>,
}

/// Balanced KD-Tree over a [`PointSet`].
#[derive(Debug, Clone)]
pub struct KdTree {
    points: PointSet,
    nodes: Vec<KdNode>,
    root: Option<u32>,
}

impl KdTree {
    /// Build the tree; `O(n log n)` using linear-time median selection.
    pub fn build(points: PointSet) -> Self {
        let mut order: Vec<u32> = points.indices().collect();
        let mut nodes = Vec::with_capacity(points.len());
        let root = build_node(&points, &mut nodes, &mut order, 0);

        Self {
            points,
            nodes,
            root,
        }
    }

    pub fn points(&self) -> &PointSet {
        &self.points
    }

    /// Depth of the deepest leaf (0 for an empty tree).
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[KdNode], node: Option<u32>) -> usize {
            match node {
                None => 0,
                Some(id) => {
                    let node = &nodes[id as usize];
                    1 + walk(nodes, node.left).max(walk(nodes, node.right))
                }
            }
        }
        walk(&self.nodes, self.root)
    }

    /// Branch-and-bound k-nearest-neighbor search.
    pub fn query(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        let mut heap = NeighborHeap::new(&self.points, k);
        if let Some(root) = self.root {
            self.search(root, query, &mut heap);
        }
        heap.into_neighbors()
    }

    fn search(&self, node_id: u32, query: &[f32], heap: &mut NeighborHeap<'_>) {
        let node = &self.nodes[node_id as usize];
        let point = self.points.point(node.point);
        heap.offer(euclidean_distance(query, point), node.point);

        let axis = node.axis as usize;
        let diff = query[axis] - point[axis];
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(near) = near {
            self.search(near, query, heap);
        }
        // The far side can only hold a result if the k-th best sphere crosses
        // the splitting hyperplane.
        if let Some(far) = far
            && heap.admits(diff.abs())
        {
            self.search(far, query, heap);
        }
    }
}

fn build_node(
    points: &PointSet,
    nodes: &mut Vec<KdNode>,
    order: &mut [u32],
    depth: usize,
) -> Option<u32> {
    if order.is_empty() {
        return None;
    }

    let axis = depth % points.dimension();
    let median = order.len() / 2;
    order.select_nth_unstable_by(median, |&a, &b| {
        points.point(a)[axis]
            .total_cmp(&points.point(b)[axis])
            .then_with(|| points.key(a).cmp(points.key(b)))
    });

    let id = nodes.len() as u32;
    nodes.push(KdNode {
        point: order[median],
        axis: axis as u32,
        left: None,
        right: None,
    });

    let (lower, rest) = order.split_at_mut(median);
    let upper = &mut rest[1..];
    let left = build_node(points, nodes, lower, depth + 1);
    let right = build_node(points, nodes, upper, depth + 1);

    let node = &mut nodes[id as usize];
    node.left = left;
    node.right = right;
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::index::ChunkKey;
    use crate::vector::index::flat::FlatIndex;

    fn grid_points() -> PointSet {
        let mut points = PointSet::new(2);
        for x in 0..10 {
            for y in 0..10 {
                points
                    .push(
                        ChunkKey::new("grid", format!("p{x}{y}")),
                        &[x as f32, y as f32],
                    )
                    .unwrap();
            }
        }
        points
    }

    #[test]
    fn test_kdtree_is_balanced() {
        let tree = KdTree::build(grid_points());
        // 100 points: a perfectly balanced tree has depth 7.
        assert_eq!(tree.depth(), 7);
        assert_eq!(tree.nodes.len(), 100);
    }

    #[test]
    fn test_kdtree_matches_flat_on_grid() {
        let tree = KdTree::build(grid_points());
        let flat = FlatIndex::build(grid_points(), usize::MAX);

        for query in [[4.5, 4.5], [0.0, 0.0], [9.9, -3.0], [2.2, 7.7]] {
            for k in [1, 4, 9, 100, 250] {
                assert_eq!(tree.query(&query, k), flat.query(&query, k));
            }
        }
    }

    #[test]
    fn test_kdtree_handles_duplicate_coordinates() {
        let mut points = PointSet::new(2);
        for i in 0..20 {
            points
                .push(ChunkKey::new("dup", format!("c{i:02}")), &[1.0, 1.0])
                .unwrap();
        }
        let tree = KdTree::build(points);
        let result = tree.query(&[1.0, 1.0], 3);
        let ids: Vec<&str> = result.iter().map(|n| n.key.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["c00", "c01", "c02"]);
    }

    #[test]
    fn test_kdtree_single_point() {
        let mut points = PointSet::new(3);
        points
            .push(ChunkKey::new("d", "only"), &[1.0, 2.0, 3.0])
            .unwrap();
        let tree = KdTree::build(points);
        let result = tree.query(&[1.0, 2.0, 3.0], 1);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].distance, 0.0);
    }
}
