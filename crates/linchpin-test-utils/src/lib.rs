//! linchpin-test-utils — Seeded synthetic cohorts for tests.
//!
//! The default cohort has 50 samples and 100 genes split evenly over the
//! five compartments. The first half of the samples (by index) have short
//! survival and form Stage 1 group A under the survival-median split.
//!
//! Planted structure:
//! - `TUM001`..`TUM003` are 3-fold (log2 ≈ 1.585) higher in group A.
//! - `CYT001` follows `TUM001`; `ECM001` mirrors `TUM002`.
//! - `STR020` is constant.

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use linchpin_common::reference::{DrugTarget, RegulatorClass};
use linchpin_common::{
    ClinicalTable, Compartment, CompartmentAssignment, ExpressionMatrix, MutationRecord, Result,
    Sample,
};
use linchpin_io::{format_float, TableWriter};

pub const SIGNAL_GENES: [&str; 3] = ["TUM001", "TUM002", "TUM003"];
pub const CONSTANT_GENE: &str = "STR020";
pub const FOLLOWER_GENE: &str = "CYT001";
pub const MIRROR_GENE: &str = "ECM001";

/// log2(3)
pub const SIGNAL_SHIFT: f64 = 1.584_962_500_721_156;

fn prefix(c: Compartment) -> &'static str {
    match c {
        Compartment::TumorCells => "TUM",
        Compartment::ImmuneCells => "IMM",
        Compartment::StromalCells => "STR",
        Compartment::Ecm => "ECM",
        Compartment::Cytokines => "CYT",
    }
}

/// One draw from N(mean, sd²); an invalid `sd` yields `mean`.
pub fn normal(rng: &mut StdRng, mean: f64, sd: f64) -> f64 {
    Normal::new(mean, sd).map(|d| d.sample(rng)).unwrap_or(mean)
}

#[derive(Debug, Clone)]
pub struct CohortBuilder {
    seed: u64,
    n_samples: usize,
    genes_per_compartment: usize,
    signal_sd: f64,
    background_sd: f64,
}

impl Default for CohortBuilder {
    fn default() -> Self {
        Self {
            seed: 42,
            n_samples: 50,
            genes_per_compartment: 20,
            signal_sd: 0.3,
            background_sd: 1.0,
        }
    }
}

impl CohortBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn samples(mut self, n: usize) -> Self {
        self.n_samples = n.max(4);
        self
    }

    pub fn genes_per_compartment(mut self, n: usize) -> Self {
        self.genes_per_compartment = n.max(3);
        self
    }

    pub fn build(&self) -> SyntheticCohort {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let n = self.n_samples;
        let half = n / 2;
        let sample_ids: Vec<String> = (1..=n).map(|i| format!("P{i:03}")).collect();

        let samples: Vec<Sample> = sample_ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                if i < half {
                    Sample::new(id.as_str(), 5.0 + i as f64, true)
                        .with_covariate("stage", if i % 2 == 0 { "III" } else { "IV" })
                } else {
                    Sample::new(id.as_str(), 60.0 + i as f64, i % 3 == 0)
                        .with_covariate("stage", if i % 2 == 0 { "I" } else { "II" })
                }
            })
            .collect();
        let in_group_a = |s: usize| s < half;

        let mut rows: Vec<(String, Vec<f64>)> = Vec::new();
        let mut assignment = Vec::new();
        for c in Compartment::ALL {
            for k in 1..=self.genes_per_compartment {
                let gene = format!("{}{k:03}", prefix(c));
                assignment.push((gene.clone(), c));
                let baseline = 4.0 + rng.gen_range(0.0..4.0);
                let values: Vec<f64> = if gene == CONSTANT_GENE {
                    vec![5.0; n]
                } else if SIGNAL_GENES.contains(&gene.as_str()) {
                    (0..n)
                        .map(|s| {
                            let shift = if in_group_a(s) { SIGNAL_SHIFT } else { 0.0 };
                            normal(&mut rng, baseline + shift, self.signal_sd)
                        })
                        .collect()
                } else {
                    (0..n).map(|_| normal(&mut rng, baseline, self.background_sd)).collect()
                };
                rows.push((gene, values));
            }
        }

        // Partners are derived after every row exists so they track the final signal.
        let row_of = |rows: &[(String, Vec<f64>)], g: &str| rows.iter().position(|(id, _)| id == g);
        if let (Some(src), Some(dst)) = (row_of(&rows, "TUM001"), row_of(&rows, FOLLOWER_GENE)) {
            let values: Vec<f64> = rows[src].1.iter().map(|v| v + 0.5 + normal(&mut rng, 0.0, 0.1)).collect();
            rows[dst].1 = values;
        }
        if let (Some(src), Some(dst)) = (row_of(&rows, "TUM002"), row_of(&rows, MIRROR_GENE)) {
            let values: Vec<f64> = rows[src].1.iter().map(|v| 14.0 - v + normal(&mut rng, 0.0, 0.1)).collect();
            rows[dst].1 = values;
        }

        let mut mutations = Vec::new();
        for (s, id) in sample_ids.iter().enumerate() {
            if s % 4 == 0 {
                mutations.push(mutation(id, "TUM001", "missense", "SNV"));
            }
            if s % 10 == 0 {
                mutations.push(mutation(id, "IMM002", "nonsense", "SNV"));
            }
        }

        SyntheticCohort {
            sample_ids,
            samples,
            rows,
            assignment,
            mutations,
            druggable: vec![
                DrugTarget {
                    gene_id: "TUM001".into(),
                    druggable: true,
                    drugs: vec!["drug-a".into(), "drug-b".into()],
                    target_class: "kinase".into(),
                },
                DrugTarget {
                    gene_id: FOLLOWER_GENE.into(),
                    druggable: false,
                    drugs: vec![],
                    target_class: "cytokine".into(),
                },
            ],
            regulators: vec![("TUM002".into(), RegulatorClass::TranscriptionFactor)],
        }
    }
}

fn mutation(sample: &str, gene: &str, mutation_type: &str, variant_class: &str) -> MutationRecord {
    MutationRecord {
        sample_id: sample.into(),
        gene: gene.into(),
        mutation_type: mutation_type.into(),
        variant_class: variant_class.into(),
    }
}

/// In-memory cohort plus writers for the canonical input files.
#[derive(Debug, Clone)]
pub struct SyntheticCohort {
    pub sample_ids: Vec<String>,
    pub samples: Vec<Sample>,
    pub rows: Vec<(String, Vec<f64>)>,
    pub assignment: Vec<(String, Compartment)>,
    pub mutations: Vec<MutationRecord>,
    pub druggable: Vec<DrugTarget>,
    pub regulators: Vec<(String, RegulatorClass)>,
}

impl SyntheticCohort {
    pub fn expression(&self) -> Result<ExpressionMatrix> {
        ExpressionMatrix::from_rows(self.sample_ids.clone(), self.rows.clone())
    }

    pub fn clinical(&self) -> Result<ClinicalTable> {
        ClinicalTable::new(self.samples.clone())
    }

    pub fn compartments(&self) -> Result<CompartmentAssignment> {
        CompartmentAssignment::from_pairs(self.assignment.iter().map(|(g, c)| (g.as_str(), *c)))
    }

    pub fn write_expression(&self, path: &Path) -> Result<()> {
        let mut headers = vec!["gene_id"];
        headers.extend(self.sample_ids.iter().map(String::as_str));
        let mut w = TableWriter::create(path, &headers)?;
        for (gene, values) in &self.rows {
            let mut row = vec![gene.clone()];
            row.extend(values.iter().map(|v| format_float(*v)));
            w.write_row(&row)?;
        }
        w.finish()?;
        Ok(())
    }

    pub fn write_clinical(&self, path: &Path) -> Result<()> {
        let mut w = TableWriter::create(path, &["sample_id", "os_time", "os_status", "stage"])?;
        for s in &self.samples {
            let stage = s.covariates.get("stage").cloned().unwrap_or_default();
            w.write_row([
                s.sample_id.clone(),
                format_float(s.os_time),
                if s.os_event { "1".to_string() } else { "0".to_string() },
                stage,
            ])?;
        }
        w.finish()?;
        Ok(())
    }

    pub fn write_mutations(&self, path: &Path) -> Result<()> {
        let mut w = TableWriter::create(path, &["sample_id", "gene", "mutation_type", "variant_class"])?;
        for m in &self.mutations {
            w.write_row([&m.sample_id, &m.gene, &m.mutation_type, &m.variant_class])?;
        }
        w.finish()?;
        Ok(())
    }

    pub fn write_compartments(&self, path: &Path) -> Result<()> {
        let mut w = TableWriter::create(path, &["gene_id", "compartment"])?;
        for (gene, c) in &self.assignment {
            w.write_row([gene.as_str(), c.as_str()])?;
        }
        w.finish()?;
        Ok(())
    }

    pub fn write_druggable(&self, path: &Path) -> Result<()> {
        let mut w = TableWriter::create(path, &["gene_id", "druggable", "drugs", "target_class"])?;
        for t in &self.druggable {
            w.write_row([
                t.gene_id.clone(),
                t.druggable.to_string(),
                t.drugs.join(";"),
                t.target_class.clone(),
            ])?;
        }
        w.finish()?;
        Ok(())
    }

    pub fn write_regulators(&self, path: &Path) -> Result<()> {
        let mut w = TableWriter::create(path, &["gene_id", "regulator_class"])?;
        for (gene, class) in &self.regulators {
            w.write_row([gene.as_str(), class.as_str()])?;
        }
        w.finish()?;
        Ok(())
    }

    /// Every input file under its canonical name in `dir`.
    pub fn write_all(&self, dir: &Path) -> Result<()> {
        self.write_expression(&dir.join(linchpin_io::EXPRESSION_FILE))?;
        self.write_clinical(&dir.join(linchpin_io::CLINICAL_FILE))?;
        self.write_mutations(&dir.join(linchpin_io::MUTATIONS_FILE))?;
        self.write_compartments(&dir.join(linchpin_io::COMPARTMENTS_FILE))?;
        self.write_druggable(&dir.join(linchpin_io::DRUGGABLE_FILE))?;
        self.write_regulators(&dir.join(linchpin_io::REGULATORS_FILE))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cohort_shape() {
        let cohort = CohortBuilder::new().build();
        let m = cohort.expression().unwrap();
        assert_eq!(m.n_samples(), 50);
        assert_eq!(m.n_genes(), 100);
        assert_eq!(cohort.compartments().unwrap().genes_in(Compartment::Ecm).len(), 20);
        assert!(m.gene_values(CONSTANT_GENE).unwrap().iter().all(|v| *v == 5.0));
    }

    #[test]
    fn test_normal_draws_match_parameters() {
        let mut rng = StdRng::seed_from_u64(1);
        let draws: Vec<f64> = (0..20_000).map(|_| normal(&mut rng, 3.0, 0.5)).collect();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (draws.len() - 1) as f64;
        assert!((mean - 3.0).abs() < 0.02, "{mean}");
        assert!((var.sqrt() - 0.5).abs() < 0.02, "{}", var.sqrt());
        assert_eq!(normal(&mut rng, 2.0, -1.0), 2.0);
    }

    #[test]
    fn test_seed_is_deterministic() {
        let a = CohortBuilder::new().seed(7).build();
        let b = CohortBuilder::new().seed(7).build();
        assert_eq!(a.rows, b.rows);
        let c = CohortBuilder::new().seed(8).build();
        assert_ne!(a.rows, c.rows);
    }

    #[test]
    fn test_signal_genes_shifted_in_group_a() {
        let cohort = CohortBuilder::new().build();
        let m = cohort.expression().unwrap();
        for gene in SIGNAL_GENES {
            let v = m.gene_values(gene).unwrap();
            let a: f64 = v[..25].iter().sum::<f64>() / 25.0;
            let b: f64 = v[25..].iter().sum::<f64>() / 25.0;
            assert!((a - b - SIGNAL_SHIFT).abs() < 0.4, "{gene}: {}", a - b);
        }
    }
}
