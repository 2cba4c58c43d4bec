//! Trait for druggability data access.
//!
//! Decouples Stage 3 from where the druggable-target reference comes from,
//! so the built-in list, a user CSV or a test fixture are interchangeable.

use std::collections::HashMap;

use linchpin_common::reference::{DrugTarget, DruggableTargets};

/// Trait for looking up whether a gene is a known drug target.
pub trait DruggabilityProvider: Send + Sync {
    /// Reference entry for a gene. None if the gene is not in the reference.
    fn target(&self, gene: &str) -> Option<DrugTarget>;

    /// True only when the gene is in the reference and marked druggable.
    fn is_druggable(&self, gene: &str) -> bool {
        self.target(gene).map(|t| t.druggable).unwrap_or(false)
    }
}

impl DruggabilityProvider for DruggableTargets {
    fn target(&self, gene: &str) -> Option<DrugTarget> {
        self.lookup(gene).cloned()
    }
}

// ── Mock Implementation for Testing ────────────────────────────────────────

/// Mock provider with hardcoded targets for unit tests.
pub struct MockDruggabilityProvider {
    data: HashMap<String, DrugTarget>,
}

impl MockDruggabilityProvider {
    pub fn new() -> Self {
        Self { data: HashMap::new() }
    }

    /// Add a gene with its druggability flag and known drugs.
    pub fn with(mut self, gene: &str, druggable: bool, drugs: &[&str]) -> Self {
        self.data.insert(
            gene.to_string(),
            DrugTarget {
                gene_id: gene.to_string(),
                druggable,
                drugs: drugs.iter().map(|d| d.to_string()).collect(),
                target_class: "mock".to_string(),
            },
        );
        self
    }
}

impl Default for MockDruggabilityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DruggabilityProvider for MockDruggabilityProvider {
    fn target(&self, gene: &str) -> Option<DrugTarget> {
        self.data.get(gene).cloned()
    }
}
