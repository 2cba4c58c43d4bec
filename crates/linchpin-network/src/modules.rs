//! Network modules: Louvain communities of the retained-edge graph.
//!
//! Deterministic variant: nodes are visited in index order, a node moves only
//! on a strictly positive modularity gain, and ties go to the lowest
//! community id. Levels are aggregated until no node moves.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use linchpin_common::Compartment;

use crate::graph::GraphView;

const MAX_PASSES: usize = 100;
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkModule {
    pub module_id: usize,
    pub size: usize,
    /// Member gene ids, sorted.
    pub members: Vec<String>,
    pub dominant_compartment: Compartment,
    pub compartment_diversity: usize,
    pub cross_dimensional: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModulePartition {
    /// Modules with at least `min_size` members.
    pub modules: Vec<NetworkModule>,
    /// Community of every node, numbered by first appearance.
    pub membership: Vec<usize>,
    /// Modularity of the full partition, small communities included.
    pub modularity: f64,
}

/// Weighted adjacency with self-loops for aggregated communities.
type Adjacency = Vec<BTreeMap<usize, f64>>;

fn local_moving(adj: &Adjacency, resolution: f64) -> (Vec<usize>, bool) {
    let n = adj.len();
    let k: Vec<f64> = adj.iter().map(|row| row.values().sum()).collect();
    let m2: f64 = k.iter().sum();
    let mut community: Vec<usize> = (0..n).collect();
    if m2 <= 0.0 {
        return (community, false);
    }
    let mut tot = k.clone();
    let mut improved = false;

    for _ in 0..MAX_PASSES {
        let mut moved = false;
        for i in 0..n {
            let current = community[i];
            let mut links: BTreeMap<usize, f64> = BTreeMap::new();
            for (&j, &w) in &adj[i] {
                if j != i {
                    *links.entry(community[j]).or_default() += w;
                }
            }
            tot[current] -= k[i];

            let gain = |c: usize, w: f64| w - resolution * tot[c] * k[i] / m2;
            let mut best = current;
            let mut best_gain = gain(current, links.get(&current).copied().unwrap_or(0.0));
            for (&c, &w) in &links {
                let g = gain(c, w);
                if g > best_gain + MIN_GAIN {
                    best = c;
                    best_gain = g;
                }
            }

            tot[best] += k[i];
            if best != current {
                community[i] = best;
                moved = true;
                improved = true;
            }
        }
        if !moved {
            break;
        }
    }
    (community, improved)
}

/// Relabels to 0.. in order of first appearance; returns the label count.
fn renumber(labels: &mut [usize]) -> usize {
    let mut map: BTreeMap<usize, usize> = BTreeMap::new();
    for label in labels.iter_mut() {
        let next = map.len();
        *label = *map.entry(*label).or_insert(next);
    }
    map.len()
}

fn aggregate(adj: &Adjacency, community: &[usize], count: usize) -> Adjacency {
    let mut next: Adjacency = vec![BTreeMap::new(); count];
    for (i, row) in adj.iter().enumerate() {
        for (&j, &w) in row {
            *next[community[i]].entry(community[j]).or_default() += w;
        }
    }
    next
}

/// Louvain community of every node. Isolated nodes stay singletons.
pub fn louvain(view: &GraphView, resolution: f64) -> Vec<usize> {
    let n = view.node_count;
    let mut adj: Adjacency = (0..n)
        .map(|i| view.neighbours(i).iter().map(|&j| (j, 1.0)).collect())
        .collect();
    let mut membership: Vec<usize> = (0..n).collect();

    loop {
        let (mut community, improved) = local_moving(&adj, resolution);
        if !improved {
            break;
        }
        let count = renumber(&mut community);
        for m in membership.iter_mut() {
            *m = community[*m];
        }
        if count == adj.len() {
            break;
        }
        adj = aggregate(&adj, &community, count);
    }
    renumber(&mut membership);
    membership
}

/// Newman modularity of `membership` on the unweighted graph.
pub fn modularity(view: &GraphView, membership: &[usize], resolution: f64) -> f64 {
    let m2 = view.targets.len() as f64;
    if m2 == 0.0 {
        return 0.0;
    }
    let mut internal: BTreeMap<usize, f64> = BTreeMap::new();
    let mut degree: BTreeMap<usize, f64> = BTreeMap::new();
    for u in 0..view.node_count {
        *degree.entry(membership[u]).or_default() += view.degree(u) as f64;
        for &v in view.neighbours(u) {
            if membership[v] == membership[u] {
                // each internal edge is seen from both ends
                *internal.entry(membership[u]).or_default() += 1.0;
            }
        }
    }
    degree
        .iter()
        .map(|(c, d)| internal.get(c).copied().unwrap_or(0.0) / m2 - resolution * (d / m2).powi(2))
        .sum()
}

/// Louvain communities with at least `min_size` members, numbered from 1 in
/// order of size (desc) then first member id. Ties for the dominant
/// compartment go to the compartment listed first.
pub fn detect_modules(
    view: &GraphView,
    genes: &[String],
    compartments: &[Compartment],
    min_size: usize,
    resolution: f64,
) -> ModulePartition {
    let membership = louvain(view, resolution);
    let modularity = modularity(view, &membership, resolution);

    let mut communities: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &c) in membership.iter().enumerate() {
        communities.entry(c).or_default().push(i);
    }

    let mut groups: Vec<Vec<usize>> = communities
        .into_values()
        .filter(|members| members.len() >= min_size.max(1))
        .collect();
    for g in groups.iter_mut() {
        g.sort_by(|&a, &b| genes[a].cmp(&genes[b]));
    }
    groups.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| genes[a[0]].cmp(&genes[b[0]])));

    let modules = groups
        .into_iter()
        .enumerate()
        .map(|(k, members)| {
            let mut counts: BTreeMap<Compartment, usize> = BTreeMap::new();
            for &m in &members {
                *counts.entry(compartments[m]).or_default() += 1;
            }
            let dominant = counts
                .iter()
                .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
                .map(|(c, _)| *c)
                .unwrap_or(compartments[members[0]]);
            NetworkModule {
                module_id: k + 1,
                size: members.len(),
                members: members.iter().map(|&m| genes[m].clone()).collect(),
                dominant_compartment: dominant,
                compartment_diversity: counts.len(),
                cross_dimensional: counts.len() > 1,
            }
        })
        .collect();

    ModulePartition { modules, membership, modularity }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| ((b'A' + i as u8) as char).to_string()).collect()
    }

    /// Two 4-cliques joined by the single edge D-E.
    fn bridged_cliques() -> GraphView {
        let mut edges = Vec::new();
        for base in [0, 4] {
            for i in base..base + 4 {
                for j in (i + 1)..base + 4 {
                    edges.push((i, j));
                }
            }
        }
        edges.push((3, 4));
        GraphView::from_edges(8, &edges)
    }

    #[test]
    fn test_bridged_cliques_split_into_two_modules() {
        let g = bridged_cliques();
        let comps = vec![Compartment::TumorCells; 8];
        let partition = detect_modules(&g, &names(8), &comps, 3, 1.0);

        assert_eq!(partition.modules.len(), 2);
        assert_eq!(partition.modules[0].members, vec!["A", "B", "C", "D"]);
        assert_eq!(partition.modules[1].members, vec!["E", "F", "G", "H"]);
        assert_eq!(partition.membership, vec![0, 0, 0, 0, 1, 1, 1, 1]);
        // 2 * (12/26 - (13/26)^2)
        assert!((partition.modularity - (24.0 / 26.0 - 0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_louvain_beats_connected_components() {
        let g = bridged_cliques();
        let split = louvain(&g, 1.0);
        let single = vec![0; 8];
        assert!(modularity(&g, &split, 1.0) > modularity(&g, &single, 1.0));
        assert_eq!(modularity(&g, &single, 1.0), 0.0);
    }

    #[test]
    fn test_components_filtered_and_described() {
        let genes = names(6);
        let comps = vec![
            Compartment::TumorCells,
            Compartment::TumorCells,
            Compartment::Ecm,
            Compartment::Cytokines,
            Compartment::Cytokines,
            Compartment::Ecm,
        ];
        // A-B-C chain, D-E pair, F isolated
        let g = GraphView::from_edges(6, &[(0, 1), (1, 2), (3, 4)]);
        let partition = detect_modules(&g, &genes, &comps, 3, 1.0);
        assert_eq!(partition.modules.len(), 1);
        let m = &partition.modules[0];
        assert_eq!(m.members, vec!["A", "B", "C"]);
        assert_eq!(m.dominant_compartment, Compartment::TumorCells);
        assert_eq!(m.compartment_diversity, 2);
        assert!(m.cross_dimensional);
        // F stays on its own
        assert_eq!(partition.membership[5], 2);

        assert_eq!(detect_modules(&g, &genes, &comps, 2, 1.0).modules.len(), 2);
    }

    #[test]
    fn test_edgeless_graph_has_no_modules() {
        let g = GraphView::from_edges(4, &[]);
        let partition = detect_modules(&g, &names(4), &[Compartment::Ecm; 4], 1, 1.0);
        assert_eq!(partition.membership, vec![0, 1, 2, 3]);
        assert_eq!(partition.modules.len(), 4);
        assert_eq!(partition.modularity, 0.0);
    }
}
