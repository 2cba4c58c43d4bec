//! linchpin-network — Stage 2: cross-compartment correlation network.
//!
//! Builds a gene-gene correlation graph over the significant Stage 1 genes,
//! scores every node's structural importance, summarises the edges that
//! cross compartment boundaries and relates Louvain modules to survival.

pub mod centrality;
pub mod config;
pub mod correlation;
pub mod eigengene;
pub mod engine;
pub mod graph;
pub mod modules;
pub mod universe;

pub use centrality::{compute_centrality, CentralityScores};
pub use config::NetworkConfig;
pub use correlation::{correlation_matrix, CorrelationMatrix};
pub use eigengene::{module_eigengene, module_trait_associations, ModuleEigengene, ModuleTraitAssociation};
pub use engine::{run_network, CrossDimensionalSummary, NetworkOutput};
pub use graph::GraphView;
pub use modules::{detect_modules, louvain, modularity, ModulePartition, NetworkModule};
pub use universe::{select_universe, UniverseGene};
