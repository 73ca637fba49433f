//! Catalog image reconciliation
//!
//! Matches catalog products against vision-analysis evidence for their
//! images and writes corrected image references back into the catalog.

pub mod ai_provider;
pub mod analyzer;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod matcher;
pub mod normalizer;
pub mod patcher;
pub mod report;
pub mod scanner;

pub use coordinator::{collect_evidence, Coordinator, EvidenceSource, RunOptions};
pub use error::{ReconcileError, Result};
pub use report::RunReport;
