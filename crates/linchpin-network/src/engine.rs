//! Stage 2 engine.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use linchpin_common::{
    CentralityRecord, ClinicalTable, Compartment, DataQualityFlag, DifferentialResult,
    ExpressionMatrix, NetworkEdge, QualityKind, Stage,
};

use crate::centrality::compute_centrality;
use crate::config::NetworkConfig;
use crate::correlation::{correlation_matrix, CorrelationMatrix};
use crate::eigengene::{module_trait_associations, ModuleEigengene, ModuleTraitAssociation};
use crate::graph::GraphView;
use crate::modules::{detect_modules, NetworkModule};
use crate::universe::{select_universe, UniverseGene};

/// Edge statistics for one unordered pair of distinct compartments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossDimensionalSummary {
    pub compartment_1: Compartment,
    pub compartment_2: Compartment,
    pub n_connections: usize,
    pub mean_correlation: f64,
    pub max_correlation: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkOutput {
    /// Ordered by gene id; node index i is `universe[i]`.
    pub universe: Vec<UniverseGene>,
    pub correlation: CorrelationMatrix,
    /// Ordered by (gene_a, gene_b).
    pub edges: Vec<NetworkEdge>,
    /// One row per universe gene, in universe order.
    pub centrality: Vec<CentralityRecord>,
    pub cross_summary: Vec<CrossDimensionalSummary>,
    pub modules: Vec<NetworkModule>,
    /// Louvain modularity of the whole partition.
    pub modularity: f64,
    /// Expression sample ids; eigengene values follow this order.
    pub samples: Vec<String>,
    /// In module order; modules without expression variation are absent.
    pub eigengenes: Vec<ModuleEigengene>,
    pub module_traits: Vec<ModuleTraitAssociation>,
    pub graph: GraphView,
    pub flags: Vec<DataQualityFlag>,
    index: HashMap<String, usize>,
}

impl NetworkOutput {
    pub fn cross_dimensional_edges(&self) -> impl Iterator<Item = &NetworkEdge> {
        self.edges.iter().filter(|e| e.is_cross_dimensional())
    }

    pub fn node_index(&self, gene: &str) -> Option<usize> {
        self.index.get(gene).copied()
    }

    /// Edges incident to `gene`, in edge order.
    pub fn edges_of<'a>(&'a self, gene: &'a str) -> impl Iterator<Item = &'a NetworkEdge> + 'a {
        self.edges.iter().filter(move |e| e.gene_a == gene || e.gene_b == gene)
    }

    pub fn clustering(&self, gene: &str) -> f64 {
        self.node_index(gene).map(|i| self.graph.clustering(i)).unwrap_or(0.0)
    }

    pub fn degree(&self, gene: &str) -> usize {
        self.node_index(gene).map(|i| self.graph.degree(i)).unwrap_or(0)
    }
}

fn cross_summary(edges: &[NetworkEdge]) -> Vec<CrossDimensionalSummary> {
    let mut pairs: BTreeMap<(Compartment, Compartment), Vec<f64>> = BTreeMap::new();
    for e in edges.iter().filter(|e| e.is_cross_dimensional()) {
        let key = if e.compartment_a <= e.compartment_b {
            (e.compartment_a, e.compartment_b)
        } else {
            (e.compartment_b, e.compartment_a)
        };
        pairs.entry(key).or_default().push(e.correlation);
    }

    let mut summary: Vec<CrossDimensionalSummary> = pairs
        .into_iter()
        .map(|((c1, c2), rs)| CrossDimensionalSummary {
            compartment_1: c1,
            compartment_2: c2,
            n_connections: rs.len(),
            mean_correlation: rs.iter().sum::<f64>() / rs.len() as f64,
            max_correlation: rs.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        })
        .collect();
    summary.sort_by(|a, b| {
        b.n_connections
            .cmp(&a.n_connections)
            .then_with(|| a.compartment_1.as_str().cmp(b.compartment_1.as_str()))
            .then_with(|| a.compartment_2.as_str().cmp(b.compartment_2.as_str()))
    });
    summary
}

/// Run Stage 2 on the Stage 1 rows. Never fails: an empty universe yields
/// empty tables and a warning flag. `clinical` supplies the survival times
/// that module eigengenes are tested against.
pub fn run_network<'a, I>(
    stage1: I,
    expression: &ExpressionMatrix,
    clinical: &ClinicalTable,
    config: &NetworkConfig,
) -> NetworkOutput
where
    I: IntoIterator<Item = &'a DifferentialResult>,
{
    let universe = select_universe(stage1, config);
    let mut flags = Vec::new();
    if universe.is_empty() {
        warn!("Stage 2: no gene passed the significance filter; network is empty");
        flags.push(DataQualityFlag::new(
            Stage::Network,
            QualityKind::EmptyUniverse,
            format!("no gene with adjusted p < {}", config.alpha),
        ));
    }

    let genes: Vec<String> = universe.iter().map(|g| g.gene_id.clone()).collect();
    let compartments: Vec<Compartment> = universe.iter().map(|g| g.compartment).collect();
    let n = genes.len();
    info!(genes = n, method = ?config.correlation_method, "Stage 2: building correlation network");

    let correlation = correlation_matrix(&genes, expression, config.correlation_method);

    let mut edges = Vec::new();
    let mut pairs = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            let r = correlation.get(i, j);
            if r.abs() >= config.correlation_threshold {
                pairs.push((i, j));
                edges.push(NetworkEdge {
                    gene_a: genes[i].clone(),
                    gene_b: genes[j].clone(),
                    correlation: r,
                    compartment_a: compartments[i],
                    compartment_b: compartments[j],
                });
            }
        }
    }
    let graph = GraphView::from_edges(n, &pairs);

    let scores = compute_centrality(&graph, config.eigenvector_max_iter, config.eigenvector_tolerance);
    if !scores.eigenvector_converged {
        warn!(
            max_iter = config.eigenvector_max_iter,
            "Eigenvector centrality did not converge; set to 0"
        );
        flags.push(DataQualityFlag::new(
            Stage::Network,
            QualityKind::EigenvectorNotConverged,
            format!("power iteration did not converge in {} iterations", config.eigenvector_max_iter),
        ));
    }

    let centrality: Vec<CentralityRecord> = (0..n)
        .map(|i| CentralityRecord {
            gene_id: genes[i].clone(),
            compartment: compartments[i],
            degree_centrality: scores.degree[i],
            betweenness_centrality: scores.betweenness[i],
            closeness_centrality: scores.closeness[i],
            eigenvector_centrality: scores.eigenvector[i],
        })
        .collect();

    let cross_summary = cross_summary(&edges);
    let partition = detect_modules(
        &graph,
        &genes,
        &compartments,
        config.min_module_size,
        config.module_resolution,
    );
    let (eigengenes, module_traits, trait_flags) =
        module_trait_associations(&partition.modules, expression, clinical, config.alpha);
    flags.extend(trait_flags);
    debug!(
        cross_pairs = cross_summary.len(),
        modules = partition.modules.len(),
        modularity = partition.modularity,
        survival_linked = module_traits.iter().filter(|t| t.significant).count(),
        "Cross-dimensional structure summarised"
    );
    info!(
        nodes = n,
        edges = edges.len(),
        cross_edges = edges.iter().filter(|e| e.is_cross_dimensional()).count(),
        "Stage 2 complete"
    );

    let index = genes.iter().enumerate().map(|(i, g)| (g.clone(), i)).collect();
    NetworkOutput {
        universe,
        correlation,
        edges,
        centrality,
        cross_summary,
        modules: partition.modules,
        modularity: partition.modularity,
        samples: expression.samples().to_vec(),
        eigengenes,
        module_traits,
        graph,
        flags,
        index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use linchpin_common::Sample;

    fn significant(gene: &str, c: Compartment) -> DifferentialResult {
        DifferentialResult {
            gene_id: gene.into(),
            compartment: c,
            effect_size: 1.0,
            p_value: 0.001,
            adjusted_p_value: 0.01,
            n_group_a: 4,
            n_group_b: 4,
        }
    }

    fn fixture() -> (Vec<DifferentialResult>, ExpressionMatrix, ClinicalTable) {
        let samples: Vec<String> = (0..8).map(|i| format!("S{i}")).collect();
        let base = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let rev: Vec<f64> = base.iter().rev().cloned().collect();
        let noise = vec![3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        let clinical = ClinicalTable::new(
            samples
                .iter()
                .enumerate()
                .map(|(i, s)| Sample::new(s.as_str(), 12.0 * (i + 1) as f64, i % 3 == 0))
                .collect(),
        )
        .unwrap();
        let m = ExpressionMatrix::from_rows(
            samples,
            vec![
                ("TP53".into(), base.clone()),
                ("IL6".into(), base.iter().map(|v| v * 2.0).collect()),
                ("FN1".into(), rev),
                ("CD8A".into(), noise),
            ],
        )
        .unwrap();
        let stage1 = vec![
            significant("TP53", Compartment::TumorCells),
            significant("IL6", Compartment::Cytokines),
            significant("FN1", Compartment::Ecm),
            significant("CD8A", Compartment::ImmuneCells),
        ];
        (stage1, m, clinical)
    }

    #[test]
    fn test_edges_ordered_unique_no_loops() {
        let (stage1, m, clinical) = fixture();
        let out = run_network(&stage1, &m, &clinical, &NetworkConfig::default());
        let mut seen = HashSet::new();
        for e in &out.edges {
            assert!(e.gene_a < e.gene_b);
            assert!(seen.insert((e.gene_a.clone(), e.gene_b.clone())));
            assert!(e.correlation.abs() >= 0.4);
        }
        // TP53, IL6 and FN1 are perfectly (anti-)correlated
        assert_eq!(out.edges.iter().filter(|e| e.correlation.abs() > 0.999).count(), 3);
        assert_eq!(out.cross_dimensional_edges().count(), out.edges.len());
    }

    #[test]
    fn test_centrality_rows_cover_universe_and_bounded() {
        let (stage1, m, clinical) = fixture();
        let out = run_network(&stage1, &m, &clinical, &NetworkConfig::default());
        assert_eq!(out.centrality.len(), 4);
        for c in &out.centrality {
            for v in [c.degree_centrality, c.betweenness_centrality, c.closeness_centrality, c.eigenvector_centrality] {
                assert!((0.0..=1.0).contains(&v));
            }
            if out.degree(&c.gene_id) == 0 {
                assert_eq!(c.degree_centrality, 0.0);
            }
        }
        assert!(out.degree("TP53") >= 2);
    }

    #[test]
    fn test_cross_summary_ordering() {
        let (stage1, m, clinical) = fixture();
        let out = run_network(&stage1, &m, &clinical, &NetworkConfig::default());
        for w in out.cross_summary.windows(2) {
            assert!(w[0].n_connections >= w[1].n_connections);
        }
        let total: usize = out.cross_summary.iter().map(|s| s.n_connections).sum();
        assert_eq!(total, out.cross_dimensional_edges().count());
    }

    #[test]
    fn test_empty_universe_is_warning_only() {
        let (mut stage1, m, clinical) = fixture();
        for r in stage1.iter_mut() {
            r.adjusted_p_value = 0.9;
        }
        let out = run_network(&stage1, &m, &clinical, &NetworkConfig::default());
        assert!(out.edges.is_empty() && out.centrality.is_empty());
        assert_eq!(out.flags[0].kind, QualityKind::EmptyUniverse);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let (stage1, m, clinical) = fixture();
        let strict = NetworkConfig { correlation_threshold: 1.0, ..Default::default() };
        let loose = NetworkConfig { correlation_threshold: 0.01, ..Default::default() };
        let a = run_network(&stage1, &m, &clinical, &strict);
        let b = run_network(&stage1, &m, &clinical, &loose);
        assert!(a.edges.len() <= b.edges.len());
    }

    #[test]
    fn test_eigenvector_cap_flags_and_zeroes() {
        let (stage1, m, clinical) = fixture();
        let capped = NetworkConfig { eigenvector_max_iter: 1, ..Default::default() };
        let out = run_network(&stage1, &m, &clinical, &capped);
        assert!(!out.edges.is_empty());
        let flag = out
            .flags
            .iter()
            .find(|f| f.kind == QualityKind::EigenvectorNotConverged)
            .unwrap();
        assert_eq!(flag.stage, Stage::Network);
        assert!(out.centrality.iter().all(|c| c.eigenvector_centrality == 0.0));
        // the other metrics are unaffected
        assert!(out.centrality.iter().any(|c| c.degree_centrality > 0.0));

        let full = run_network(&stage1, &m, &clinical, &NetworkConfig::default());
        assert!(full.flags.iter().all(|f| f.kind != QualityKind::EigenvectorNotConverged));
    }

    #[test]
    fn test_correlated_triple_forms_survival_linked_module() {
        let (stage1, m, clinical) = fixture();
        // CD8A reaches |rho| = 0.5 with the triple; keep only the perfect edges
        let config = NetworkConfig { correlation_threshold: 0.9, ..Default::default() };
        let out = run_network(&stage1, &m, &clinical, &config);
        assert_eq!(out.modules.len(), 1);
        assert_eq!(out.modules[0].members, vec!["FN1", "IL6", "TP53"]);
        assert_eq!(out.modules[0].compartment_diversity, 3);

        assert_eq!(out.eigengenes.len(), 1);
        assert_eq!(out.eigengenes[0].values.len(), m.n_samples());
        let traits = &out.module_traits[0];
        assert_eq!(traits.module_id, 1);
        assert_eq!(traits.n_samples, 8);
        // survival rises across samples exactly as TP53 does
        assert!((traits.os_time_correlation - 1.0).abs() < 1e-12);
        assert!(traits.significant);
    }
}
