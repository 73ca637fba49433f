//! Catalog Reconcile Common Library
//!
//! Data model, taxonomy and provider-response helpers shared by the
//! reconciliation engine and its adapters

pub mod types;
pub mod taxonomy;
pub mod error;
pub mod parser;
pub mod prompts;

pub use types::{AnalysisRecord, MatchScore, Packaging, PackagingKind, Product, Reassignment};
pub use taxonomy::{CategoryTag, VariantCue};
pub use error::{Error, Result};
pub use parser::{extract_json, parse_payload};
pub use prompts::build_analysis_prompt;
