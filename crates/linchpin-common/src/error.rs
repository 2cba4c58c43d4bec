use thiserror::Error;

use crate::entities::Compartment;

#[derive(Debug, Error)]
pub enum LinchpinError {
    /// Malformed or missing required input. Fatal to the whole run.
    #[error("Input validation error: {0}")]
    InputValidation(String),

    /// Too few samples in one contrast group. Skips only the affected compartment.
    #[error(
        "Insufficient samples for {compartment}: group A has {group_a}, group B has {group_b} (minimum {minimum} per group)"
    )]
    InsufficientSamples {
        compartment: Compartment,
        group_a: usize,
        group_b: usize,
        minimum: usize,
    },

    #[error("Empty gene universe: {0}")]
    EmptyUniverse(String),

    #[error("Computation error: {0}")]
    Computation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid job state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// A whole stage failed; dependants are not run.
    #[error("Stage {stage} failed: {message}")]
    Stage { stage: String, message: String },

    #[error("Analysis cancelled before {0}")]
    Cancelled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, LinchpinError>;
