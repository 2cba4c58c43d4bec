//! Built-in static reference data: compartment gene sets, druggable targets
//! and known regulators.
//!
//! These are the defaults used when no reference file is supplied. They are
//! deliberately small curated lists; production runs are expected to pass
//! their own reference tables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entities::{Compartment, CompartmentAssignment};
use crate::error::Result;

// ── Compartments ─────────────────────────────────────────────────────────────

const TUMOR_CELL_GENES: &[&str] = &[
    "TP53", "KRAS", "MYC", "EGFR", "BRAF", "PIK3CA", "CTNNB1", "PTEN", "RB1", "APC",
    "BRCA1", "AKT1", "MTOR", "CDK4", "ATM", "TERT", "ARID1A", "AXIN1",
];

const IMMUNE_CELL_GENES: &[&str] = &[
    "CD8A", "CD8B", "GZMB", "PRF1", "CD4", "IL2", "IL5", "CD40LG", "FOXP3", "CTLA4",
    "IL2RA", "KLRK1", "NCR1", "FCGR3A", "CD19", "MS4A1", "CD86", "CD163", "MRC1", "ARG1",
    "CXCR2", "FCGR3B", "CSF3R", "CD274", "PDCD1", "LAG3", "HAVCR2",
];

const STROMAL_CELL_GENES: &[&str] = &[
    "FAP", "ACTA2", "PDPN", "VIM", "S100A4", "MYL9", "TPM1", "TPM2", "PDGFRA", "PDGFRB",
    "HAS2", "CD34", "SLPI", "CFD",
];

const ECM_GENES: &[&str] = &[
    "COL1A1", "COL3A1", "COL4A1", "FN1", "LAMB1", "MMP2", "MMP9", "MMP14", "TIMP1", "TIMP2",
    "SPARC", "THBS1", "POSTN", "COMP", "SPP1",
];

const CYTOKINE_GENES: &[&str] = &[
    "IL6", "TNF", "IL1B", "IFNG", "IL12A", "IL10", "TGFB1", "TGFB2", "TGFBR1", "TGFBR2",
    "IL4", "IL13", "VEGFA", "PDGFA", "FGF2", "EGF", "IGF1", "CCL2", "CXCL8", "CXCL10",
    "CXCL12", "CCL5",
];

/// Default gene → compartment assignment. Genes shared between signatures
/// (e.g. TGFB1, COL1A1) are listed in exactly one compartment.
pub fn default_compartments() -> Result<CompartmentAssignment> {
    let sets: [(Compartment, &[&str]); 5] = [
        (Compartment::TumorCells, TUMOR_CELL_GENES),
        (Compartment::ImmuneCells, IMMUNE_CELL_GENES),
        (Compartment::StromalCells, STROMAL_CELL_GENES),
        (Compartment::Ecm, ECM_GENES),
        (Compartment::Cytokines, CYTOKINE_GENES),
    ];
    CompartmentAssignment::from_pairs(
        sets.iter()
            .flat_map(|(c, genes)| genes.iter().map(move |g| (g.to_string(), *c))),
    )
}

// ── Druggable targets ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugTarget {
    pub gene_id: String,
    pub druggable: bool,
    #[serde(default)]
    pub drugs: Vec<String>,
    pub target_class: String,
}

/// Curated set of druggable targets keyed by gene. Lookups never fail.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DruggableTargets {
    targets: BTreeMap<String, DrugTarget>,
}

impl DruggableTargets {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_targets(targets: impl IntoIterator<Item = DrugTarget>) -> Self {
        Self {
            targets: targets.into_iter().map(|t| (t.gene_id.clone(), t)).collect(),
        }
    }

    pub fn builtin() -> Self {
        let entry = |gene: &str, druggable: bool, drugs: &[&str], class: &str| DrugTarget {
            gene_id: gene.to_string(),
            druggable,
            drugs: drugs.iter().map(|d| d.to_string()).collect(),
            target_class: class.to_string(),
        };
        Self::from_targets([
            entry("TP53", true, &["Nutlin-3", "PRIMA-1"], "Tumor suppressor modulator"),
            entry("EGFR", true, &["Erlotinib", "Gefitinib"], "Kinase inhibitor"),
            entry("VEGFA", true, &["Bevacizumab", "Sorafenib"], "Angiogenesis inhibitor"),
            entry("TGFB1", true, &["Galunisertib", "Fresolimumab"], "TGF-beta inhibitor"),
            entry("IL6", true, &["Tocilizumab", "Siltuximab"], "Cytokine inhibitor"),
            entry("PIK3CA", true, &["Alpelisib", "Copanlisib"], "PI3K inhibitor"),
            entry("MTOR", true, &["Everolimus", "Sirolimus"], "mTOR inhibitor"),
            entry("CDK4", true, &["Palbociclib", "Ribociclib"], "CDK4/6 inhibitor"),
            entry("PDCD1", true, &["Nivolumab", "Pembrolizumab"], "Immune checkpoint inhibitor"),
            entry("CD274", true, &["Atezolizumab", "Durvalumab"], "Immune checkpoint inhibitor"),
            entry("CTLA4", true, &["Ipilimumab", "Tremelimumab"], "Immune checkpoint inhibitor"),
            entry("MYC", false, &[], "Transcription factor (challenging)"),
            entry("CTNNB1", false, &[], "Protein-protein interaction"),
        ])
    }

    pub fn lookup(&self, gene: &str) -> Option<&DrugTarget> {
        self.targets.get(gene)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

// ── Regulators ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegulatorClass {
    TranscriptionFactor,
    Kinase,
    GrowthFactor,
    Epigenetic,
    Other,
}

impl RegulatorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegulatorClass::TranscriptionFactor => "transcription_factor",
            RegulatorClass::Kinase              => "kinase",
            RegulatorClass::GrowthFactor        => "growth_factor",
            RegulatorClass::Epigenetic          => "epigenetic",
            RegulatorClass::Other               => "other",
        }
    }

    /// Unknown labels map to `Other` rather than failing.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "transcription_factor" | "tf" => RegulatorClass::TranscriptionFactor,
            "kinase"                      => RegulatorClass::Kinase,
            "growth_factor"               => RegulatorClass::GrowthFactor,
            "epigenetic"                  => RegulatorClass::Epigenetic,
            _                             => RegulatorClass::Other,
        }
    }
}

/// Known regulatory genes (transcription factors, kinases, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegulatorReference {
    regulators: BTreeMap<String, RegulatorClass>,
}

impl RegulatorReference {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, RegulatorClass)>,
        S: Into<String>,
    {
        Self {
            regulators: pairs.into_iter().map(|(g, c)| (g.into(), c)).collect(),
        }
    }

    pub fn builtin() -> Self {
        use RegulatorClass::*;
        let mut pairs: Vec<(&str, RegulatorClass)> = Vec::new();
        for g in ["TP53", "MYC", "CTNNB1", "JUN", "FOS", "STAT3", "NF1", "ETS1", "FOXP3"] {
            pairs.push((g, TranscriptionFactor));
        }
        for g in ["PIK3CA", "EGFR", "MTOR", "AKT1", "MAPK1", "CDK4", "ATM", "BRAF"] {
            pairs.push((g, Kinase));
        }
        for g in ["TGFB1", "VEGFA", "IL6", "TNF", "IFNG"] {
            pairs.push((g, GrowthFactor));
        }
        for g in ["DNMT1", "HDAC1", "EZH2", "KMT2A", "ARID1A"] {
            pairs.push((g, Epigenetic));
        }
        Self::from_pairs(pairs)
    }

    pub fn class_of(&self, gene: &str) -> Option<RegulatorClass> {
        self.regulators.get(gene).copied()
    }

    pub fn len(&self) -> usize {
        self.regulators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regulators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_compartments_partition() {
        let a = default_compartments().expect("built-in sets must not overlap");
        let total: usize = Compartment::ALL.iter().map(|c| a.genes_in(*c).len()).sum();
        assert_eq!(total, a.len());
        assert_eq!(a.compartment_of("TGFB1"), Some(Compartment::Cytokines));
        assert_eq!(a.compartment_of("COL1A1"), Some(Compartment::Ecm));
    }

    #[test]
    fn test_druggable_lookup_absent_is_none() {
        let d = DruggableTargets::builtin();
        assert!(d.lookup("EGFR").unwrap().druggable);
        assert!(!d.lookup("MYC").unwrap().druggable);
        assert!(d.lookup("NOTAGENE").is_none());
    }

    #[test]
    fn test_regulator_class_parse() {
        assert_eq!(RegulatorClass::parse("TF"), RegulatorClass::TranscriptionFactor);
        assert_eq!(RegulatorClass::parse("mystery"), RegulatorClass::Other);
        assert_eq!(RegulatorReference::builtin().class_of("EZH2"), Some(RegulatorClass::Epigenetic));
    }
}
