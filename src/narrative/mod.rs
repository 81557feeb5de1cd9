//! Narrative collaborator seam
//!
//! The narrator turns deterministic findings and metrics into prose and
//! may propose additional findings, insights and recommendations. It
//! never owns a number: the report assemblers recompute and force-write
//! every deterministic field after the narrator returns.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::{Finding, TrendInsight, TrendMetric, YearlySnapshot};
use crate::Result;

pub mod gemini;
pub use gemini::GeminiNarrator;

/// Context handed to the narrator for a single-filing audit
#[derive(Debug, Clone, Serialize)]
pub struct AuditContext {
    pub organization_name: String,
    pub organization_ein: String,
    pub findings: Vec<Finding>,
    /// Extraction metadata passed through from the payload (source,
    /// return_year, ...)
    pub metadata: Map<String, Value>,
}

/// Context handed to the narrator for multi-year performance analysis
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisContext {
    pub organization_name: String,
    pub organization_ein: String,
    pub series: Vec<YearlySnapshot>,
    pub key_metrics: Vec<TrendMetric>,
    /// Deterministic headline notes (CAGR, latest surplus)
    pub notes: Vec<String>,
}

/// Model-proposed audit draft. Proposed findings are merged after the
/// deterministic set, so the model can refine but never suppress.
#[derive(Debug, Clone, Default)]
pub struct AuditDraft {
    pub organization_name: Option<String>,
    pub organization_ein: Option<String>,
    pub findings: Vec<Finding>,
    pub notes: Option<String>,
}

/// Model-proposed performance draft; narrative fields only
#[derive(Debug, Clone, Default)]
pub struct PerformanceDraft {
    pub insights: Vec<TrendInsight>,
    pub recommendations: Vec<String>,
    pub outlook: Option<String>,
}

/// Trait for narrative generation (LLM controlled)
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn narrate_audit(&self, context: &AuditContext) -> Result<AuditDraft>;

    async fn narrate_performance(&self, context: &AnalysisContext) -> Result<PerformanceDraft>;
}

/// Mock narrator for development & testing
/// Keeps the engine functional without LLM dependency
pub struct MockNarrator;

#[async_trait]
impl Narrator for MockNarrator {
    async fn narrate_audit(&self, _context: &AuditContext) -> Result<AuditDraft> {
        Ok(AuditDraft::default())
    }

    async fn narrate_performance(&self, context: &AnalysisContext) -> Result<PerformanceDraft> {
        let insights = context
            .key_metrics
            .iter()
            .map(|metric| TrendInsight {
                category: metric.name.clone(),
                direction: metric.direction,
                summary: format!(
                    "{} classified as {} across {} year(s).",
                    metric.name,
                    metric.direction,
                    metric.points.len()
                ),
                confidence: 0.7,
            })
            .collect();

        Ok(PerformanceDraft {
            insights,
            recommendations: Vec::new(),
            outlook: None,
        })
    }
}
