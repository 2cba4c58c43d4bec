//! Read-only undirected graph in Compressed Sparse Row form.

/// Dense, integer-indexed adjacency of an undirected simple graph.
/// Each edge is stored in both endpoints' neighbour lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphView {
    pub node_count: usize,
    /// Offsets into `targets`. Size = node_count + 1
    pub offsets: Vec<usize>,
    /// Neighbour indices, sorted within each node's slice.
    pub targets: Vec<usize>,
}

impl GraphView {
    /// Build from undirected `(u, v)` pairs. Self-loops and repeated pairs
    /// are dropped.
    pub fn from_edges(node_count: usize, edges: &[(usize, usize)]) -> Self {
        let mut adjacency = vec![Vec::new(); node_count];
        for &(u, v) in edges {
            if u != v && u < node_count && v < node_count {
                adjacency[u].push(v);
                adjacency[v].push(u);
            }
        }

        let mut offsets = Vec::with_capacity(node_count + 1);
        let mut targets = Vec::new();
        offsets.push(0);
        for mut neighbours in adjacency {
            neighbours.sort_unstable();
            neighbours.dedup();
            targets.extend(neighbours);
            offsets.push(targets.len());
        }
        GraphView { node_count, offsets, targets }
    }

    pub fn degree(&self, idx: usize) -> usize {
        self.offsets[idx + 1] - self.offsets[idx]
    }

    pub fn neighbours(&self, idx: usize) -> &[usize] {
        &self.targets[self.offsets[idx]..self.offsets[idx + 1]]
    }

    pub fn edge_count(&self) -> usize {
        self.targets.len() / 2
    }

    pub fn has_edge(&self, u: usize, v: usize) -> bool {
        self.neighbours(u).binary_search(&v).is_ok()
    }

    /// Local clustering coefficient: closed triangles over possible ones.
    pub fn clustering(&self, idx: usize) -> f64 {
        let nbrs = self.neighbours(idx);
        let k = nbrs.len();
        if k < 2 {
            return 0.0;
        }
        let mut links = 0usize;
        for (a, &u) in nbrs.iter().enumerate() {
            for &v in &nbrs[a + 1..] {
                if self.has_edge(u, v) {
                    links += 1;
                }
            }
        }
        2.0 * links as f64 / (k * (k - 1)) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_edges_drops_loops_and_duplicates() {
        let g = GraphView::from_edges(3, &[(0, 1), (1, 0), (2, 2), (1, 2)]);
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.neighbours(1), &[0, 2]);
        assert_eq!(g.degree(2), 1);
    }

    #[test]
    fn test_clustering_triangle_plus_tail() {
        // Triangle 0-1-2 with a tail 2-3.
        let g = GraphView::from_edges(4, &[(0, 1), (1, 2), (0, 2), (2, 3)]);
        assert_eq!(g.clustering(0), 1.0);
        assert!((g.clustering(2) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(g.clustering(3), 0.0);
    }
}
