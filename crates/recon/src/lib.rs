//! `nutslink-recon`: reconciliation engine for hierarchical region
//! classifications.
//!
//! Pure engine crate: receives pre-loaded classification and geometry rows
//! plus a name directory service, returns the region graph, the equivalence
//! links and a report of every discrepancy found on the way. No HTTP and no
//! filesystem access beyond parsing text handed to it.

pub mod checker;
pub mod code_table;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod hierarchy;
pub mod load;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod report;

pub use code_table::CodeTable;
pub use config::ReconConfig;
pub use directory::{NameDirectoryService, StaticDirectory};
pub use engine::{run, ReconResult};
pub use error::ReconError;
pub use hierarchy::HierarchyGraph;
pub use model::{NameDirectoryEntry, ReconInput, TerritoryKind};
pub use report::{ReconSummary, ReconWarning, ReconciliationReport};
