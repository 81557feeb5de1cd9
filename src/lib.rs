//! Nonprofit Audit Engine
//!
//! A deterministic validation and trend-analysis engine for nonprofit
//! tax-filing extractions that:
//! - Validates and normalizes extracted filings (nested or flat payloads)
//! - Runs a fixed battery of reconciliation checks (LLM excluded)
//! - Aggregates findings into severities and section summaries
//! - Computes multi-year snapshots and trend metrics (growth, ratios, CAGR)
//! - Merges model narrative without letting it alter computed figures
//!
//! PIPELINE:
//! PAYLOAD → VALIDATE → CHECK / MEASURE → NARRATE → FORCE-WRITE → REPORT

pub mod aggregate;
pub mod checks;
pub mod error;
pub mod filing;
pub mod gemini;
pub mod metrics;
pub mod models;
pub mod narrative;
pub mod registry;
pub mod report;

pub use error::Result;

// Re-export common types
pub use filing::Filing;
pub use models::*;
