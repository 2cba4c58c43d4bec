/// Core entity types flowing through the three analysis stages.
/// Inputs (samples, expression, mutations, compartments) are read-only;
/// each stage produces its own immutable result rows.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LinchpinError, Result};

// ---------------------------------------------------------------------------
// Compartment
// ---------------------------------------------------------------------------

/// One of the five fixed biological gene categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compartment {
    TumorCells,
    ImmuneCells,
    StromalCells,
    Ecm,
    Cytokines,
}

impl Compartment {
    pub const ALL: [Compartment; 5] = [
        Compartment::TumorCells,
        Compartment::ImmuneCells,
        Compartment::StromalCells,
        Compartment::Ecm,
        Compartment::Cytokines,
    ];

    /// Identifier used in table names and CSV cells.
    pub fn as_str(&self) -> &'static str {
        match self {
            Compartment::TumorCells   => "tumor_cells",
            Compartment::ImmuneCells  => "immune_cells",
            Compartment::StromalCells => "stromal_cells",
            Compartment::Ecm          => "ecm",
            Compartment::Cytokines    => "cytokines",
        }
    }

    /// Parse a compartment label. Accepts the canonical identifiers and the
    /// short forms commonly found in reference sheets.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tumor_cells" | "tumor" | "tumour" | "tumour_cells"  => Some(Compartment::TumorCells),
            "immune_cells" | "immune"                             => Some(Compartment::ImmuneCells),
            "stromal_cells" | "stromal" | "caf"                   => Some(Compartment::StromalCells),
            "ecm" | "extracellular_matrix"                        => Some(Compartment::Ecm),
            "cytokines" | "cytokine"                              => Some(Compartment::Cytokines),
            _ => None,
        }
    }
}

impl fmt::Display for Compartment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Clinical samples
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub sample_id: String,
    /// Overall survival time, non-negative.
    pub os_time: f64,
    /// Overall survival event indicator (death observed).
    pub os_event: bool,
    /// Stratification covariates (stage, grade, demographics, ...).
    #[serde(default)]
    pub covariates: BTreeMap<String, String>,
}

impl Sample {
    pub fn new(sample_id: impl Into<String>, os_time: f64, os_event: bool) -> Self {
        Self {
            sample_id: sample_id.into(),
            os_time,
            os_event,
            covariates: BTreeMap::new(),
        }
    }

    pub fn with_covariate(mut self, key: &str, value: &str) -> Self {
        self.covariates.insert(key.to_string(), value.to_string());
        self
    }
}

/// Clinical records indexed by sample identifier.
#[derive(Debug, Clone, Default)]
pub struct ClinicalTable {
    samples: Vec<Sample>,
    index: HashMap<String, usize>,
}

impl ClinicalTable {
    /// Build the table; duplicate sample identifiers are rejected.
    pub fn new(samples: Vec<Sample>) -> Result<Self> {
        let mut index = HashMap::with_capacity(samples.len());
        for (i, s) in samples.iter().enumerate() {
            if !(s.os_time.is_finite() && s.os_time >= 0.0) {
                return Err(LinchpinError::InputValidation(format!(
                    "sample {} has invalid os_time {}",
                    s.sample_id, s.os_time
                )));
            }
            if index.insert(s.sample_id.clone(), i).is_some() {
                return Err(LinchpinError::InputValidation(format!(
                    "duplicate sample_id {} in clinical table",
                    s.sample_id
                )));
            }
        }
        Ok(Self { samples, index })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn get(&self, sample_id: &str) -> Option<&Sample> {
        self.index.get(sample_id).map(|&i| &self.samples[i])
    }

    pub fn contains(&self, sample_id: &str) -> bool {
        self.index.contains_key(sample_id)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Expression matrix
// ---------------------------------------------------------------------------

/// Genes × samples, log-scale values stored row-major. Missing cells are NaN.
#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    genes: Vec<String>,
    samples: Vec<String>,
    values: Vec<f64>,
    gene_index: HashMap<String, usize>,
}

impl ExpressionMatrix {
    pub fn new(genes: Vec<String>, samples: Vec<String>, values: Vec<f64>) -> Result<Self> {
        if values.len() != genes.len() * samples.len() {
            return Err(LinchpinError::InputValidation(format!(
                "expression matrix has {} values, expected {} genes x {} samples",
                values.len(),
                genes.len(),
                samples.len()
            )));
        }

        let mut seen_samples = std::collections::HashSet::with_capacity(samples.len());
        for s in &samples {
            if !seen_samples.insert(s.as_str()) {
                return Err(LinchpinError::InputValidation(format!(
                    "duplicate sample column {s} in expression matrix"
                )));
            }
        }

        let mut gene_index = HashMap::with_capacity(genes.len());
        for (i, g) in genes.iter().enumerate() {
            if gene_index.insert(g.clone(), i).is_some() {
                return Err(LinchpinError::InputValidation(format!(
                    "duplicate gene {g} in expression matrix"
                )));
            }
        }

        Ok(Self { genes, samples, values, gene_index })
    }

    /// Build from per-gene rows, convenient for tests and fixtures.
    pub fn from_rows(samples: Vec<String>, rows: Vec<(String, Vec<f64>)>) -> Result<Self> {
        let mut genes = Vec::with_capacity(rows.len());
        let mut values = Vec::with_capacity(rows.len() * samples.len());
        for (gene, row) in rows {
            if row.len() != samples.len() {
                return Err(LinchpinError::InputValidation(format!(
                    "gene {gene} has {} values for {} samples",
                    row.len(),
                    samples.len()
                )));
            }
            genes.push(gene);
            values.extend(row);
        }
        Self::new(genes, samples, values)
    }

    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn n_genes(&self) -> usize {
        self.genes.len()
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn gene_position(&self, gene: &str) -> Option<usize> {
        self.gene_index.get(gene).copied()
    }

    pub fn row(&self, gene_idx: usize) -> &[f64] {
        let n = self.samples.len();
        &self.values[gene_idx * n..(gene_idx + 1) * n]
    }

    pub fn gene_values(&self, gene: &str) -> Option<&[f64]> {
        self.gene_position(gene).map(|i| self.row(i))
    }
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub sample_id: String,
    pub gene: String,
    pub mutation_type: String,
    pub variant_class: String,
}

// ---------------------------------------------------------------------------
// Compartment assignment
// ---------------------------------------------------------------------------

/// Static gene → compartment reference. Each gene belongs to exactly one
/// compartment, so the assignment partitions the gene universe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompartmentAssignment {
    map: BTreeMap<String, Compartment>,
}

impl CompartmentAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (gene, compartment) pairs. Repeating a pair is harmless;
    /// assigning one gene to two compartments is an input error.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Compartment)>,
        S: Into<String>,
    {
        let mut assignment = Self::new();
        for (gene, compartment) in pairs {
            assignment.assign(gene, compartment)?;
        }
        Ok(assignment)
    }

    pub fn assign(&mut self, gene: impl Into<String>, compartment: Compartment) -> Result<()> {
        let gene = gene.into();
        match self.map.get(&gene) {
            Some(existing) if *existing != compartment => Err(LinchpinError::InputValidation(format!(
                "gene {gene} assigned to both {existing} and {compartment}"
            ))),
            _ => {
                self.map.insert(gene, compartment);
                Ok(())
            }
        }
    }

    pub fn compartment_of(&self, gene: &str) -> Option<Compartment> {
        self.map.get(gene).copied()
    }

    /// Genes of one compartment, in identifier order.
    pub fn genes_in(&self, compartment: Compartment) -> Vec<&str> {
        self.map
            .iter()
            .filter(|(_, c)| **c == compartment)
            .map(|(g, _)| g.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Compartment)> {
        self.map.iter().map(|(g, c)| (g.as_str(), *c))
    }
}

// ---------------------------------------------------------------------------
// Stage outputs
// ---------------------------------------------------------------------------

/// Stage 1 row: one gene tested within its compartment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferentialResult {
    pub gene_id: String,
    pub compartment: Compartment,
    /// log2 fold change, group A minus group B.
    pub effect_size: f64,
    pub p_value: f64,
    pub adjusted_p_value: f64,
    pub n_group_a: usize,
    pub n_group_b: usize,
}

/// Stage 2 row: undirected edge with `gene_a < gene_b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEdge {
    pub gene_a: String,
    pub gene_b: String,
    pub correlation: f64,
    pub compartment_a: Compartment,
    pub compartment_b: Compartment,
}

impl NetworkEdge {
    pub fn is_cross_dimensional(&self) -> bool {
        self.compartment_a != self.compartment_b
    }

    /// The endpoint opposite `gene`, if `gene` is on this edge.
    pub fn other(&self, gene: &str) -> Option<(&str, Compartment)> {
        if self.gene_a == gene {
            Some((self.gene_b.as_str(), self.compartment_b))
        } else if self.gene_b == gene {
            Some((self.gene_a.as_str(), self.compartment_a))
        } else {
            None
        }
    }
}

/// Stage 2 row: structural importance of one gene, every metric in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentralityRecord {
    pub gene_id: String,
    pub compartment: Compartment,
    pub degree_centrality: f64,
    pub betweenness_centrality: f64,
    pub closeness_centrality: f64,
    pub eigenvector_centrality: f64,
}

/// Stage 3 row: the terminal ranked artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinchpinScore {
    pub rank: usize,
    pub gene_id: String,
    pub compartment: Compartment,
    pub prognostic_score: f64,
    pub network_hub_score: f64,
    pub cross_domain_score: f64,
    pub regulator_score: f64,
    pub linchpin_score: f64,
    pub druggable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compartment_roundtrip() {
        for c in Compartment::ALL {
            assert_eq!(Compartment::parse(c.as_str()), Some(c));
        }
        assert_eq!(Compartment::parse("Tumour"), Some(Compartment::TumorCells));
        assert_eq!(Compartment::parse("ECM"), Some(Compartment::Ecm));
        assert_eq!(Compartment::parse("vasculature"), None);
    }

    #[test]
    fn test_assignment_rejects_conflicts() {
        let mut a = CompartmentAssignment::new();
        a.assign("TP53", Compartment::TumorCells).unwrap();
        a.assign("TP53", Compartment::TumorCells).unwrap();
        assert!(a.assign("TP53", Compartment::Ecm).is_err());
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn test_genes_in_sorted() {
        let a = CompartmentAssignment::from_pairs([
            ("MYC", Compartment::TumorCells),
            ("EGFR", Compartment::TumorCells),
            ("CD8A", Compartment::ImmuneCells),
        ])
        .unwrap();
        assert_eq!(a.genes_in(Compartment::TumorCells), vec!["EGFR", "MYC"]);
    }

    #[test]
    fn test_expression_matrix_shape_checked() {
        let samples = vec!["S1".to_string(), "S2".to_string()];
        assert!(ExpressionMatrix::new(vec!["A".into()], samples.clone(), vec![1.0]).is_err());
        let m = ExpressionMatrix::new(vec!["A".into(), "B".into()], samples, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(m.gene_values("B"), Some(&[3.0, 4.0][..]));
    }

    #[test]
    fn test_clinical_rejects_negative_time() {
        let err = ClinicalTable::new(vec![Sample::new("S1", -1.0, true)]);
        assert!(matches!(err, Err(LinchpinError::InputValidation(_))));
    }

    #[test]
    fn test_edge_other_endpoint() {
        let e = NetworkEdge {
            gene_a: "A".into(),
            gene_b: "B".into(),
            correlation: 0.7,
            compartment_a: Compartment::TumorCells,
            compartment_b: Compartment::Ecm,
        };
        assert!(e.is_cross_dimensional());
        assert_eq!(e.other("A"), Some(("B", Compartment::Ecm)));
        assert_eq!(e.other("C"), None);
    }
}
