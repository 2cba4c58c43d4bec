//! Persistence of stage outputs.
//!
//! Every table is written in canonical order so identical inputs give
//! byte-identical files regardless of worker count.

use std::path::{Path, PathBuf};

use tracing::debug;

use linchpin_common::quality::sort_flags;
use linchpin_common::{Compartment, DataQualityFlag, Result};
use linchpin_differential::DifferentialOutput;
use linchpin_io::{format_float, write_json, TableWriter};
use linchpin_network::NetworkOutput;
use linchpin_ranker::LinchpinOutput;

use crate::summary::PipelineSummary;

pub const CORRELATION_MATRIX_FILE: &str = "correlation_matrix.csv";
pub const CENTRALITY_FILE: &str = "network_centrality.csv";
pub const EDGES_FILE: &str = "network_edges.csv";
pub const CROSS_CONNECTIONS_FILE: &str = "cross_dimensional_connections.csv";
pub const CROSS_SUMMARY_FILE: &str = "cross_dimensional_summary.csv";
pub const MODULES_FILE: &str = "network_modules.csv";
pub const MODULE_EIGENGENES_FILE: &str = "module_eigengenes.csv";
pub const MODULE_TRAITS_FILE: &str = "module_trait_correlations.csv";
pub const SCORES_FILE: &str = "linchpin_scores.csv";
pub const DRUGGABILITY_FILE: &str = "druggability_assessment.csv";
pub const MASTER_REGULATORS_FILE: &str = "master_regulators.csv";
pub const EVIDENCE_CARDS_FILE: &str = "evidence_cards.json";
pub const DATA_QUALITY_FILE: &str = "data_quality.csv";
pub const SUMMARY_FILE: &str = "pipeline_summary.json";

pub fn stage1_file_name(compartment: Compartment) -> String {
    format!("stage1_{}_results.csv", compartment.as_str())
}

/// Where stage outputs go. Each method persists one stage completely.
pub trait ResultStore: Send + Sync {
    fn write_stage1(&self, output: &DifferentialOutput) -> Result<()>;
    fn write_stage2(&self, output: &NetworkOutput) -> Result<()>;
    fn write_stage3(&self, output: &LinchpinOutput) -> Result<()>;
    fn write_data_quality(&self, flags: &[DataQualityFlag]) -> Result<()>;
    fn write_summary(&self, summary: &PipelineSummary) -> Result<()>;
}

/// CSV/JSON files in one results directory. Re-runs overwrite.
#[derive(Debug, Clone)]
pub struct CsvResultStore {
    dir: PathBuf,
    write_correlation_matrix: bool,
}

impl CsvResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_correlation_matrix: true,
        }
    }

    pub fn with_correlation_matrix(mut self, enabled: bool) -> Self {
        self.write_correlation_matrix = enabled;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

fn compartment_or_empty(c: Option<Compartment>) -> &'static str {
    c.map(|c| c.as_str()).unwrap_or("")
}

impl ResultStore for CsvResultStore {
    fn write_stage1(&self, output: &DifferentialOutput) -> Result<()> {
        for compartment in Compartment::ALL {
            let mut w = TableWriter::create(
                &self.path(&stage1_file_name(compartment)),
                &["gene_id", "log2fc", "p_value", "adj_p_value"],
            )?;
            for r in output.results_for(compartment) {
                w.write_row([
                    r.gene_id.clone(),
                    format_float(r.effect_size),
                    format_float(r.p_value),
                    format_float(r.adjusted_p_value),
                ])?;
            }
            w.finish()?;
        }
        debug!(dir = %self.dir.display(), "Stage 1 tables written");
        Ok(())
    }

    fn write_stage2(&self, output: &NetworkOutput) -> Result<()> {
        if self.write_correlation_matrix {
            let genes = output.correlation.genes();
            let mut headers = vec!["gene_id"];
            headers.extend(genes.iter().map(String::as_str));
            let mut w = TableWriter::create(&self.path(CORRELATION_MATRIX_FILE), &headers)?;
            for (i, gene) in genes.iter().enumerate() {
                let mut row = vec![gene.clone()];
                row.extend(output.correlation.row(i).iter().map(|v| format_float(*v)));
                w.write_row(&row)?;
            }
            w.finish()?;
        }

        let mut w = TableWriter::create(
            &self.path(CENTRALITY_FILE),
            &[
                "gene_id",
                "compartment",
                "degree_centrality",
                "betweenness_centrality",
                "closeness_centrality",
                "eigenvector_centrality",
            ],
        )?;
        for c in &output.centrality {
            w.write_row([
                c.gene_id.clone(),
                c.compartment.as_str().to_string(),
                format_float(c.degree_centrality),
                format_float(c.betweenness_centrality),
                format_float(c.closeness_centrality),
                format_float(c.eigenvector_centrality),
            ])?;
        }
        w.finish()?;

        let mut all = TableWriter::create(
            &self.path(EDGES_FILE),
            &["gene_a", "gene_b", "correlation", "compartment_a", "compartment_b", "cross_dimensional"],
        )?;
        let mut cross = TableWriter::create(
            &self.path(CROSS_CONNECTIONS_FILE),
            &["gene1", "gene2", "correlation", "dimension1", "dimension2"],
        )?;
        for e in &output.edges {
            all.write_row([
                e.gene_a.clone(),
                e.gene_b.clone(),
                format_float(e.correlation),
                e.compartment_a.as_str().to_string(),
                e.compartment_b.as_str().to_string(),
                e.is_cross_dimensional().to_string(),
            ])?;
            if e.is_cross_dimensional() {
                cross.write_row([
                    e.gene_a.clone(),
                    e.gene_b.clone(),
                    format_float(e.correlation),
                    e.compartment_a.as_str().to_string(),
                    e.compartment_b.as_str().to_string(),
                ])?;
            }
        }
        all.finish()?;
        cross.finish()?;

        let mut w = TableWriter::create(
            &self.path(CROSS_SUMMARY_FILE),
            &["dimension1", "dimension2", "n_connections", "mean_correlation", "max_correlation"],
        )?;
        for s in &output.cross_summary {
            w.write_row([
                s.compartment_1.as_str().to_string(),
                s.compartment_2.as_str().to_string(),
                s.n_connections.to_string(),
                format_float(s.mean_correlation),
                format_float(s.max_correlation),
            ])?;
        }
        w.finish()?;

        let mut w = TableWriter::create(
            &self.path(MODULES_FILE),
            &["module_id", "size", "dominant_compartment", "compartment_diversity", "cross_dimensional", "members"],
        )?;
        for m in &output.modules {
            w.write_row([
                m.module_id.to_string(),
                m.size.to_string(),
                m.dominant_compartment.as_str().to_string(),
                m.compartment_diversity.to_string(),
                m.cross_dimensional.to_string(),
                m.members.join(";"),
            ])?;
        }
        w.finish()?;

        // one row per sample, one column per module eigengene
        let columns: Vec<String> = output.eigengenes.iter().map(|e| format!("ME{}", e.module_id)).collect();
        let mut headers = vec!["sample_id"];
        headers.extend(columns.iter().map(String::as_str));
        let mut w = TableWriter::create(&self.path(MODULE_EIGENGENES_FILE), &headers)?;
        if !output.eigengenes.is_empty() {
            for (s, sample) in output.samples.iter().enumerate() {
                let mut row = vec![sample.clone()];
                row.extend(output.eigengenes.iter().map(|e| format_float(e.values[s])));
                w.write_row(&row)?;
            }
        }
        w.finish()?;

        let mut w = TableWriter::create(
            &self.path(MODULE_TRAITS_FILE),
            &["module_id", "size", "n_samples", "os_time_correlation", "p_value", "significant"],
        )?;
        for t in &output.module_traits {
            w.write_row([
                t.module_id.to_string(),
                t.size.to_string(),
                t.n_samples.to_string(),
                format_float(t.os_time_correlation),
                format_float(t.p_value),
                t.significant.to_string(),
            ])?;
        }
        w.finish()?;
        debug!(dir = %self.dir.display(), "Stage 2 tables written");
        Ok(())
    }

    fn write_stage3(&self, output: &LinchpinOutput) -> Result<()> {
        let mut w = TableWriter::create(
            &self.path(SCORES_FILE),
            &[
                "rank",
                "gene_id",
                "compartment",
                "prognostic_score",
                "network_hub_score",
                "cross_domain_score",
                "regulator_score",
                "linchpin_score",
                "druggable",
            ],
        )?;
        for s in &output.scores {
            w.write_row([
                s.rank.to_string(),
                s.gene_id.clone(),
                s.compartment.as_str().to_string(),
                format_float(s.prognostic_score),
                format_float(s.network_hub_score),
                format_float(s.cross_domain_score),
                format_float(s.regulator_score),
                format_float(s.linchpin_score),
                s.druggable.to_string(),
            ])?;
        }
        w.finish()?;

        let mut w = TableWriter::create(
            &self.path(DRUGGABILITY_FILE),
            &["rank", "gene_id", "compartment", "linchpin_score", "druggable", "in_reference", "target_class", "drugs"],
        )?;
        for d in &output.druggability {
            w.write_row([
                d.rank.to_string(),
                d.gene_id.clone(),
                d.compartment.as_str().to_string(),
                format_float(d.linchpin_score),
                d.druggable.to_string(),
                d.in_reference.to_string(),
                d.target_class.clone().unwrap_or_default(),
                d.drugs.join(";"),
            ])?;
        }
        w.finish()?;

        let mut w = TableWriter::create(
            &self.path(MASTER_REGULATORS_FILE),
            &[
                "rank",
                "gene_id",
                "compartment",
                "regulator_class",
                "evidence_source",
                "mutation_frequency",
                "regulator_score",
            ],
        )?;
        for m in &output.master_regulators {
            w.write_row([
                m.rank.to_string(),
                m.gene_id.clone(),
                m.compartment.as_str().to_string(),
                m.regulator_class.map(|c| c.as_str()).unwrap_or("").to_string(),
                m.evidence_source.as_str().to_string(),
                format_float(m.mutation_frequency),
                format_float(m.regulator_score),
            ])?;
        }
        w.finish()?;

        write_json(&self.path(EVIDENCE_CARDS_FILE), &output.evidence_cards)?;
        debug!(dir = %self.dir.display(), "Stage 3 tables written");
        Ok(())
    }

    fn write_data_quality(&self, flags: &[DataQualityFlag]) -> Result<()> {
        let mut w = TableWriter::create(
            &self.path(DATA_QUALITY_FILE),
            &["stage", "gene_id", "compartment", "kind", "message"],
        )?;
        let mut sorted = flags.to_vec();
        sort_flags(&mut sorted);
        for f in &sorted {
            w.write_row([
                f.stage.as_str(),
                f.gene_id.as_deref().unwrap_or(""),
                compartment_or_empty(f.compartment),
                f.kind.as_str(),
                f.message.as_str(),
            ])?;
        }
        w.finish()?;
        Ok(())
    }

    fn write_summary(&self, summary: &PipelineSummary) -> Result<()> {
        write_json(&self.path(SUMMARY_FILE), summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linchpin_common::{QualityKind, Stage};

    #[test]
    fn test_data_quality_written_in_canonical_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvResultStore::new(dir.path());
        let flags = vec![
            DataQualityFlag::new(Stage::Linchpin, QualityKind::MissingSurvival, "no events").for_gene("B"),
            DataQualityFlag::new(Stage::Input, QualityKind::MalformedRow, "line 3"),
            DataQualityFlag::new(Stage::Linchpin, QualityKind::MissingSurvival, "no events")
                .for_gene("A")
                .in_compartment(Compartment::Ecm),
        ];
        store.write_data_quality(&flags).unwrap();
        let text = std::fs::read_to_string(dir.path().join(DATA_QUALITY_FILE)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "stage,gene_id,compartment,kind,message");
        assert_eq!(lines[1], "input,,,malformed_row,line 3");
        assert_eq!(lines[2], "stage3_linchpin,A,ecm,missing_survival,no events");
        assert_eq!(lines[3], "stage3_linchpin,B,,missing_survival,no events");
    }

    #[test]
    fn test_stage1_file_names() {
        assert_eq!(stage1_file_name(Compartment::TumorCells), "stage1_tumor_cells_results.csv");
        assert_eq!(stage1_file_name(Compartment::Ecm), "stage1_ecm_results.csv");
    }
}
