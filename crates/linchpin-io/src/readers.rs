//! CSV readers for the six input tables.
//!
//! Missing required columns are fatal. A malformed row is dropped (or, for
//! expression cells, read as NaN) and recorded as a data-quality flag.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, info, warn};

use linchpin_common::reference::{DrugTarget, DruggableTargets, RegulatorClass, RegulatorReference};
use linchpin_common::{
    ClinicalTable, Compartment, CompartmentAssignment, DataQualityFlag, ExpressionMatrix,
    LinchpinError, MutationRecord, QualityKind, Result, Sample, Stage,
};

/// A parsed table together with the row-level problems found while reading it.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub value: T,
    pub flags: Vec<DataQualityFlag>,
}

impl<T> Loaded<T> {
    fn new(value: T, flags: Vec<DataQualityFlag>) -> Self {
        Self { value, flags }
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        LinchpinError::InputValidation(format!("cannot open {}: {e}", path.display()))
    })
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(input)
}

fn malformed(table: &str, line: usize, message: impl AsRef<str>) -> DataQualityFlag {
    DataQualityFlag::new(
        Stage::Input,
        QualityKind::MalformedRow,
        format!("{table} row {line}: {}", message.as_ref()),
    )
}

/// Resolve required column positions (case-insensitive).
fn require_columns(table: &str, headers: &StringRecord, required: &[&str]) -> Result<Vec<usize>> {
    let lower: Vec<String> = headers.iter().map(|h| h.to_ascii_lowercase()).collect();
    required
        .iter()
        .map(|name| {
            lower.iter().position(|h| h == name).ok_or_else(|| {
                LinchpinError::InputValidation(format!("{table}: missing required column '{name}'"))
            })
        })
        .collect()
}

fn optional_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}

fn parse_event(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" | "dead" | "deceased" => Some(true),
        "0" | "0.0" | "false" | "alive" | "living" => Some(false),
        _ => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" | "" => Some(false),
        _ => None,
    }
}

// ── Expression ───────────────────────────────────────────────────────────────

pub fn read_expression(path: &Path) -> Result<Loaded<ExpressionMatrix>> {
    debug!("Loading expression matrix from {:?}", path);
    read_expression_from(open(path)?)
}

/// First column is the gene id, the header row holds sample ids.
/// Unparsable cells become NaN.
pub fn read_expression_from<R: Read>(input: R) -> Result<Loaded<ExpressionMatrix>> {
    let mut rdr = reader(input);
    let headers = rdr.headers()?.clone();
    if headers.len() < 2 {
        return Err(LinchpinError::InputValidation(
            "expression: need a gene column and at least one sample column".into(),
        ));
    }
    let samples: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut flags = Vec::new();
    let mut genes = Vec::new();
    let mut values = Vec::new();
    let mut seen = HashSet::new();
    let mut unparsable = 0usize;

    for (i, result) in rdr.records().enumerate() {
        let line = i + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                flags.push(malformed("expression", line, e.to_string()));
                continue;
            }
        };
        let gene = record.get(0).unwrap_or_default().to_string();
        if gene.is_empty() {
            flags.push(malformed("expression", line, "empty gene id"));
            continue;
        }
        if record.len() != headers.len() {
            flags.push(
                malformed("expression", line, format!("{} fields, expected {}", record.len(), headers.len()))
                    .for_gene(gene.as_str()),
            );
            continue;
        }
        if !seen.insert(gene.clone()) {
            flags.push(malformed("expression", line, "duplicate gene row ignored").for_gene(gene.as_str()));
            continue;
        }
        for cell in record.iter().skip(1) {
            let v = match cell.parse::<f64>() {
                Ok(v) => v,
                Err(_) => {
                    if !cell.is_empty() && !cell.eq_ignore_ascii_case("nan") && !cell.eq_ignore_ascii_case("na") {
                        unparsable += 1;
                    }
                    f64::NAN
                }
            };
            values.push(v);
        }
        genes.push(gene);
    }

    if unparsable > 0 {
        warn!(cells = unparsable, "Unparsable expression cells read as NaN");
    }
    info!("Loaded expression for {} genes x {} samples", genes.len(), samples.len());
    Ok(Loaded::new(ExpressionMatrix::new(genes, samples, values)?, flags))
}

// ── Clinical ─────────────────────────────────────────────────────────────────

pub fn read_clinical(path: &Path) -> Result<Loaded<ClinicalTable>> {
    debug!("Loading clinical table from {:?}", path);
    read_clinical_from(open(path)?)
}

/// `sample_id, os_time, os_status` plus any number of covariate columns.
pub fn read_clinical_from<R: Read>(input: R) -> Result<Loaded<ClinicalTable>> {
    let mut rdr = reader(input);
    let headers = rdr.headers()?.clone();
    let cols = require_columns("clinical", &headers, &["sample_id", "os_time", "os_status"])?;
    let (id_col, time_col, status_col) = (cols[0], cols[1], cols[2]);
    let covariate_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| !cols.contains(i))
        .map(|(i, h)| (i, h.to_string()))
        .collect();

    let mut flags = Vec::new();
    let mut samples = Vec::new();
    let mut seen = HashSet::new();
    for (i, result) in rdr.records().enumerate() {
        let line = i + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                flags.push(malformed("clinical", line, e.to_string()));
                continue;
            }
        };
        let id = record.get(id_col).unwrap_or_default();
        if id.is_empty() {
            flags.push(malformed("clinical", line, "empty sample_id"));
            continue;
        }
        let time = record.get(time_col).and_then(|t| t.parse::<f64>().ok());
        let Some(time) = time.filter(|t| t.is_finite() && *t >= 0.0) else {
            flags.push(malformed("clinical", line, format!("sample {id}: invalid os_time")));
            continue;
        };
        let Some(event) = record.get(status_col).and_then(parse_event) else {
            flags.push(malformed("clinical", line, format!("sample {id}: invalid os_status")));
            continue;
        };
        if !seen.insert(id.to_string()) {
            flags.push(malformed("clinical", line, format!("duplicate sample {id} ignored")));
            continue;
        }
        let mut sample = Sample::new(id, time, event);
        for (col, name) in &covariate_cols {
            if let Some(v) = record.get(*col).filter(|v| !v.is_empty()) {
                sample = sample.with_covariate(name, v);
            }
        }
        samples.push(sample);
    }

    info!("Loaded {} clinical samples", samples.len());
    Ok(Loaded::new(ClinicalTable::new(samples)?, flags))
}

// ── Mutations ────────────────────────────────────────────────────────────────

/// A missing file is an empty mutation table.
pub fn read_mutations(path: &Path) -> Result<Loaded<Vec<MutationRecord>>> {
    if !path.exists() {
        debug!("No mutation table at {:?}; continuing without mutations", path);
        return Ok(Loaded::new(Vec::new(), Vec::new()));
    }
    read_mutations_from(open(path)?)
}

pub fn read_mutations_from<R: Read>(input: R) -> Result<Loaded<Vec<MutationRecord>>> {
    let mut rdr = reader(input);
    let headers = rdr.headers()?.clone();
    if headers.iter().all(str::is_empty) {
        return Ok(Loaded::new(Vec::new(), Vec::new()));
    }
    let cols = require_columns("mutations", &headers, &["sample_id", "gene"])?;
    let type_col = optional_column(&headers, "mutation_type");
    let class_col = optional_column(&headers, "variant_class");

    let mut flags = Vec::new();
    let mut records = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let line = i + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                flags.push(malformed("mutations", line, e.to_string()));
                continue;
            }
        };
        let sample_id = record.get(cols[0]).unwrap_or_default();
        let gene = record.get(cols[1]).unwrap_or_default();
        if sample_id.is_empty() || gene.is_empty() {
            flags.push(malformed("mutations", line, "empty sample_id or gene"));
            continue;
        }
        let field = |c: Option<usize>| c.and_then(|c| record.get(c)).unwrap_or_default().to_string();
        records.push(MutationRecord {
            sample_id: sample_id.to_string(),
            gene: gene.to_string(),
            mutation_type: field(type_col),
            variant_class: field(class_col),
        });
    }
    info!("Loaded {} mutation records", records.len());
    Ok(Loaded::new(records, flags))
}

// ── Reference tables ─────────────────────────────────────────────────────────

pub fn read_compartments(path: &Path) -> Result<Loaded<CompartmentAssignment>> {
    read_compartments_from(open(path)?)
}

/// `gene_id, compartment`. A gene listed under two compartments is fatal.
pub fn read_compartments_from<R: Read>(input: R) -> Result<Loaded<CompartmentAssignment>> {
    let mut rdr = reader(input);
    let headers = rdr.headers()?.clone();
    let cols = require_columns("compartments", &headers, &["gene_id", "compartment"])?;

    let mut flags = Vec::new();
    let mut assignment = CompartmentAssignment::new();
    for (i, result) in rdr.records().enumerate() {
        let line = i + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                flags.push(malformed("compartments", line, e.to_string()));
                continue;
            }
        };
        let gene = record.get(cols[0]).unwrap_or_default();
        let label = record.get(cols[1]).unwrap_or_default();
        match (gene.is_empty(), Compartment::parse(label)) {
            (false, Some(c)) => assignment.assign(gene, c)?,
            _ => flags.push(malformed("compartments", line, format!("unknown compartment '{label}'"))),
        }
    }
    debug!("Loaded compartment assignment for {} genes", assignment.len());
    Ok(Loaded::new(assignment, flags))
}

pub fn read_druggable(path: &Path) -> Result<Loaded<DruggableTargets>> {
    read_druggable_from(open(path)?)
}

/// `gene_id, druggable, drugs, target_class`; drugs are `;`-separated.
pub fn read_druggable_from<R: Read>(input: R) -> Result<Loaded<DruggableTargets>> {
    let mut rdr = reader(input);
    let headers = rdr.headers()?.clone();
    let cols = require_columns("druggable_targets", &headers, &["gene_id", "druggable"])?;
    let drugs_col = optional_column(&headers, "drugs");
    let class_col = optional_column(&headers, "target_class");

    let mut flags = Vec::new();
    let mut targets = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let line = i + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                flags.push(malformed("druggable_targets", line, e.to_string()));
                continue;
            }
        };
        let gene = record.get(cols[0]).unwrap_or_default();
        let Some(druggable) = record.get(cols[1]).and_then(parse_bool).filter(|_| !gene.is_empty()) else {
            flags.push(malformed("druggable_targets", line, "invalid gene_id or druggable flag"));
            continue;
        };
        let drugs = drugs_col
            .and_then(|c| record.get(c))
            .map(|d| d.split(';').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();
        targets.push(DrugTarget {
            gene_id: gene.to_string(),
            druggable,
            drugs,
            target_class: class_col.and_then(|c| record.get(c)).unwrap_or_default().to_string(),
        });
    }
    Ok(Loaded::new(DruggableTargets::from_targets(targets), flags))
}

pub fn read_regulators(path: &Path) -> Result<Loaded<RegulatorReference>> {
    read_regulators_from(open(path)?)
}

/// `gene_id, regulator_class`. Unknown classes are kept as `other`.
pub fn read_regulators_from<R: Read>(input: R) -> Result<Loaded<RegulatorReference>> {
    let mut rdr = reader(input);
    let headers = rdr.headers()?.clone();
    let cols = require_columns("regulators", &headers, &["gene_id"])?;
    let class_col = optional_column(&headers, "regulator_class");

    let mut flags = Vec::new();
    let mut pairs: HashMap<String, RegulatorClass> = HashMap::new();
    for (i, result) in rdr.records().enumerate() {
        let line = i + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                flags.push(malformed("regulators", line, e.to_string()));
                continue;
            }
        };
        let gene = record.get(cols[0]).unwrap_or_default();
        if gene.is_empty() {
            flags.push(malformed("regulators", line, "empty gene_id"));
            continue;
        }
        let class = class_col
            .and_then(|c| record.get(c))
            .map(RegulatorClass::parse)
            .unwrap_or(RegulatorClass::Other);
        pairs.insert(gene.to_string(), class);
    }
    Ok(Loaded::new(RegulatorReference::from_pairs(pairs), flags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_expression_nan_cells_and_short_rows() {
        let csv = "gene,S1,S2,S3\nTP53,1.0,x,3.0\nMYC,1,2\nEGFR,,2.5,NA\n";
        let loaded = read_expression_from(csv.as_bytes()).unwrap();
        let m = &loaded.value;
        assert_eq!(m.genes(), &["TP53".to_string(), "EGFR".to_string()]);
        assert!(m.gene_values("TP53").unwrap()[1].is_nan());
        assert_eq!(m.gene_values("EGFR").unwrap()[1], 2.5);
        assert_eq!(loaded.flags.len(), 1);
        assert_eq!(loaded.flags[0].gene_id.as_deref(), Some("MYC"));
    }

    #[test]
    fn test_clinical_missing_column_is_fatal() {
        let csv = "sample_id,os_time\nS1,10\n";
        assert!(matches!(
            read_clinical_from(csv.as_bytes()),
            Err(LinchpinError::InputValidation(_))
        ));
    }

    #[test]
    fn test_clinical_bad_rows_flagged_and_covariates_kept() {
        let csv = "sample_id,os_time,os_status,stage\nS1,10.5,1,III\nS2,abc,0,II\nS3,4,0,\n";
        let loaded = read_clinical_from(csv.as_bytes()).unwrap();
        assert_eq!(loaded.value.len(), 2);
        assert_eq!(loaded.flags.len(), 1);
        let s1 = loaded.value.get("S1").unwrap();
        assert!(s1.os_event);
        assert_eq!(s1.covariates.get("stage").map(String::as_str), Some("III"));
        assert!(loaded.value.get("S3").unwrap().covariates.is_empty());
    }

    #[test]
    fn test_mutations_optional_columns() {
        let csv = "sample_id,gene\nS1,TP53\n,KRAS\n";
        let loaded = read_mutations_from(csv.as_bytes()).unwrap();
        assert_eq!(loaded.value.len(), 1);
        assert_eq!(loaded.value[0].mutation_type, "");
        assert_eq!(loaded.flags.len(), 1);
    }

    #[test]
    fn test_mutations_empty_input() {
        let loaded = read_mutations_from("".as_bytes()).unwrap();
        assert!(loaded.value.is_empty());
    }

    #[test]
    fn test_compartments_conflict_fatal_unknown_flagged() {
        let ok = "gene_id,compartment\nTP53,tumor_cells\nXYZ,vasculature\n";
        let loaded = read_compartments_from(ok.as_bytes()).unwrap();
        assert_eq!(loaded.value.len(), 1);
        assert_eq!(loaded.flags.len(), 1);

        let conflict = "gene_id,compartment\nTP53,tumor_cells\nTP53,ecm\n";
        assert!(read_compartments_from(conflict.as_bytes()).is_err());
    }

    #[test]
    fn test_druggable_drug_list_split() {
        let csv = "gene_id,druggable,drugs,target_class\nEGFR,true,Erlotinib; Gefitinib,Kinase inhibitor\nMYC,0,,TF\n";
        let loaded = read_druggable_from(csv.as_bytes()).unwrap();
        let egfr = loaded.value.lookup("EGFR").unwrap();
        assert_eq!(egfr.drugs, vec!["Erlotinib".to_string(), "Gefitinib".to_string()]);
        assert!(!loaded.value.lookup("MYC").unwrap().druggable);
    }

    #[test]
    fn test_regulators_unknown_class_is_other() {
        let csv = "gene_id,regulator_class\nEZH2,epigenetic\nFOO,bar\n";
        let loaded = read_regulators_from(csv.as_bytes()).unwrap();
        assert_eq!(loaded.value.class_of("EZH2"), Some(RegulatorClass::Epigenetic));
        assert_eq!(loaded.value.class_of("FOO"), Some(RegulatorClass::Other));
    }
}
