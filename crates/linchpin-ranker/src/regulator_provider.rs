//! Trait for regulator annotation access, plus mutation frequencies.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use linchpin_common::reference::{RegulatorClass, RegulatorReference};
use linchpin_common::{ClinicalTable, MutationRecord};

/// Trait for looking up a gene's regulator annotation.
///
/// Implementations can use:
/// - The built-in regulator list
/// - A user-supplied `regulators.csv`
/// - Mock data (testing)
pub trait RegulatorProvider: Send + Sync {
    /// Regulator class of a gene. None if the gene is not annotated.
    fn regulator_class(&self, gene: &str) -> Option<RegulatorClass>;

    fn is_regulator(&self, gene: &str) -> bool {
        self.regulator_class(gene).is_some()
    }
}

impl RegulatorProvider for RegulatorReference {
    fn regulator_class(&self, gene: &str) -> Option<RegulatorClass> {
        self.class_of(gene)
    }
}

// ── Mock Implementation for Testing ────────────────────────────────────────

pub struct MockRegulatorProvider {
    data: HashMap<String, RegulatorClass>,
}

impl MockRegulatorProvider {
    pub fn new() -> Self {
        Self { data: HashMap::new() }
    }

    pub fn with(mut self, gene: &str, class: RegulatorClass) -> Self {
        self.data.insert(gene.to_string(), class);
        self
    }
}

impl Default for MockRegulatorProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RegulatorProvider for MockRegulatorProvider {
    fn regulator_class(&self, gene: &str) -> Option<RegulatorClass> {
        self.data.get(gene).copied()
    }
}

// ── Mutation frequency ─────────────────────────────────────────────────────

/// Fraction of clinical samples carrying at least one mutation in each gene.
/// Records for samples outside the clinical table are ignored.
pub fn mutation_frequencies(mutations: &[MutationRecord], clinical: &ClinicalTable) -> BTreeMap<String, f64> {
    if clinical.is_empty() {
        return BTreeMap::new();
    }
    let mut carriers: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for m in mutations.iter().filter(|m| clinical.contains(&m.sample_id)) {
        carriers.entry(m.gene.as_str()).or_default().insert(m.sample_id.as_str());
    }
    let n = clinical.len() as f64;
    carriers
        .into_iter()
        .map(|(gene, samples)| (gene.to_string(), samples.len() as f64 / n))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use linchpin_common::Sample;

    fn mutation(sample: &str, gene: &str) -> MutationRecord {
        MutationRecord {
            sample_id: sample.into(),
            gene: gene.into(),
            mutation_type: "missense".into(),
            variant_class: "SNV".into(),
        }
    }

    #[test]
    fn test_mutation_frequency_counts_carriers_once() {
        let clinical = ClinicalTable::new(
            (1..=4).map(|i| Sample::new(format!("S{i}"), 10.0, true)).collect(),
        )
        .unwrap();
        let muts = vec![
            mutation("S1", "TP53"),
            mutation("S1", "TP53"),
            mutation("S2", "TP53"),
            mutation("S3", "KRAS"),
            mutation("GHOST", "KRAS"),
        ];
        let freq = mutation_frequencies(&muts, &clinical);
        assert_eq!(freq["TP53"], 0.5);
        assert_eq!(freq["KRAS"], 0.25);
    }

    #[test]
    fn test_mock_and_reference_providers() {
        let mock = MockRegulatorProvider::new().with("MYC", RegulatorClass::TranscriptionFactor);
        assert!(mock.is_regulator("MYC"));
        assert!(!mock.is_regulator("CD8A"));
        assert!(!RegulatorReference::empty().is_regulator("MYC"));
    }
}
