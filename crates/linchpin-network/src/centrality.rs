//! Node centrality on an unweighted undirected [`GraphView`].
//!
//! All four metrics are normalised to [0, 1]:
//! - degree: deg / (n − 1)
//! - betweenness: Brandes, divided by the (n − 1)(n − 2) / 2 node pairs
//! - closeness: Wasserman–Faust, scaled by the reachable fraction
//! - eigenvector: power iteration on A + I, scaled so the maximum is 1

use std::collections::VecDeque;

use rayon::prelude::*;

use crate::graph::GraphView;

#[derive(Debug, Clone, PartialEq)]
pub struct CentralityScores {
    pub degree: Vec<f64>,
    pub betweenness: Vec<f64>,
    pub closeness: Vec<f64>,
    pub eigenvector: Vec<f64>,
    /// False when power iteration hit `max_iter`; eigenvector is then all 0.
    pub eigenvector_converged: bool,
}

pub fn compute_centrality(view: &GraphView, max_iter: usize, tolerance: f64) -> CentralityScores {
    let n = view.node_count;
    if n <= 1 {
        return CentralityScores {
            degree: vec![0.0; n],
            betweenness: vec![0.0; n],
            closeness: vec![0.0; n],
            eigenvector: vec![0.0; n],
            eigenvector_converged: true,
        };
    }
    let (eigenvector, converged) = match eigenvector_centrality(view, max_iter, tolerance) {
        Some(v) => (v, true),
        None => (vec![0.0; n], false),
    };
    CentralityScores {
        degree: degree_centrality(view),
        betweenness: betweenness_centrality(view),
        closeness: closeness_centrality(view),
        eigenvector,
        eigenvector_converged: converged,
    }
}

pub fn degree_centrality(view: &GraphView) -> Vec<f64> {
    let n = view.node_count;
    if n <= 1 {
        return vec![0.0; n];
    }
    (0..n)
        .map(|i| (view.degree(i) as f64 / (n - 1) as f64).clamp(0.0, 1.0))
        .collect()
}

/// Single-source shortest-path dependencies (Brandes accumulation phase).
fn source_dependencies(view: &GraphView, s: usize) -> Vec<f64> {
    let n = view.node_count;
    let mut stack = Vec::with_capacity(n);
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut sigma = vec![0.0f64; n];
    let mut dist = vec![usize::MAX; n];
    sigma[s] = 1.0;
    dist[s] = 0;

    let mut queue = VecDeque::from([s]);
    while let Some(v) = queue.pop_front() {
        stack.push(v);
        for &w in view.neighbours(v) {
            if dist[w] == usize::MAX {
                dist[w] = dist[v] + 1;
                queue.push_back(w);
            }
            if dist[w] == dist[v] + 1 {
                sigma[w] += sigma[v];
                predecessors[w].push(v);
            }
        }
    }

    let mut delta = vec![0.0f64; n];
    while let Some(w) = stack.pop() {
        for &v in &predecessors[w] {
            delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
        }
    }
    delta[s] = 0.0;
    delta
}

pub fn betweenness_centrality(view: &GraphView) -> Vec<f64> {
    let n = view.node_count;
    if n <= 2 {
        return vec![0.0; n];
    }
    let per_source: Vec<Vec<f64>> = (0..n).into_par_iter().map(|s| source_dependencies(view, s)).collect();
    // Summed in source order so the result does not depend on the pool size.
    let mut raw = vec![0.0; n];
    for d in per_source {
        for (a, x) in raw.iter_mut().zip(d) {
            *a += x;
        }
    }
    // Each unordered pair is visited from both ends.
    let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
    raw.into_iter().map(|b| (b * scale).clamp(0.0, 1.0)).collect()
}

fn bfs_distances(view: &GraphView, s: usize) -> Vec<usize> {
    let mut dist = vec![usize::MAX; view.node_count];
    dist[s] = 0;
    let mut queue = VecDeque::from([s]);
    while let Some(v) = queue.pop_front() {
        for &w in view.neighbours(v) {
            if dist[w] == usize::MAX {
                dist[w] = dist[v] + 1;
                queue.push_back(w);
            }
        }
    }
    dist
}

pub fn closeness_centrality(view: &GraphView) -> Vec<f64> {
    let n = view.node_count;
    if n <= 1 {
        return vec![0.0; n];
    }
    (0..n)
        .into_par_iter()
        .map(|s| {
            let dist = bfs_distances(view, s);
            let (reached, total) = dist
                .iter()
                .filter(|&&d| d != usize::MAX && d > 0)
                .fold((0usize, 0usize), |(r, t), &d| (r + 1, t + d));
            if total == 0 {
                return 0.0;
            }
            let r = reached as f64;
            ((r / total as f64) * (r / (n - 1) as f64)).clamp(0.0, 1.0)
        })
        .collect()
}

/// Principal eigenvector of A + I, max-scaled. `None` when iteration does
/// not converge within `max_iter`. A graph without edges yields all zeros.
pub fn eigenvector_centrality(view: &GraphView, max_iter: usize, tolerance: f64) -> Option<Vec<f64>> {
    let n = view.node_count;
    if n == 0 || view.edge_count() == 0 {
        return Some(vec![0.0; n]);
    }

    let mut x = vec![1.0 / n as f64; n];
    for _ in 0..max_iter {
        let mut next: Vec<f64> = (0..n)
            .map(|i| x[i] + view.neighbours(i).iter().map(|&j| x[j]).sum::<f64>())
            .collect();
        let norm = next.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm == 0.0 {
            return Some(vec![0.0; n]);
        }
        for v in next.iter_mut() {
            *v /= norm;
        }
        let err: f64 = next.iter().zip(&x).map(|(a, b)| (a - b).abs()).sum();
        x = next;
        if err < n as f64 * tolerance {
            let max = x.iter().cloned().fold(0.0f64, f64::max);
            if max <= 0.0 {
                return Some(vec![0.0; n]);
            }
            return Some(x.iter().map(|v| (v / max).clamp(0.0, 1.0)).collect());
        }
    }
    None
}
