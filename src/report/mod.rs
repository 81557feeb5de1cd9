//! Report assembly
//!
//! Deterministic computation runs first, the narrator runs second, and
//! every deterministic field is recomputed from the merged finding set
//! and force-written into the final report. The model can refine a
//! finding or add narrative, but it cannot suppress a deterministic
//! finding by omitting it, alter the aggregated severity, or replace the
//! computed metrics.

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::aggregate::{
    aggregate_findings, build_section_summaries, compose_overall_summary, merge_findings,
};
use crate::checks::{verify_ein, CheckEngine};
use crate::error::Result;
use crate::filing::Filing;
use crate::metrics::{build_key_metrics, build_snapshots, collect_filing_years, year_from_value};
use crate::models::{AuditReport, PerformanceReport, TrendMetric};
use crate::narrative::{AnalysisContext, AuditContext, AuditDraft, Narrator, PerformanceDraft};
use crate::registry::EinRegistry;

/// Extraction metadata as an owned map, empty when absent or mis-typed
fn payload_metadata(payload: &Value) -> Map<String, Value> {
    payload
        .get("metadata")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// Audit a single filing payload (either a bare filing or an
/// `{extraction, metadata?}` wrapper).
pub async fn build_audit_report(
    payload: &Value,
    engine: &CheckEngine,
    registry: &dyn EinRegistry,
    narrator: &dyn Narrator,
) -> Result<AuditReport> {
    let extraction = payload.get("extraction").unwrap_or(payload);
    let filing = Filing::from_value(extraction)?;
    let source_digest = filing.fingerprint();

    info!(
        ein = %filing.organization.ein,
        name = %filing.organization.legal_name,
        "Audit: running deterministic checks"
    );

    let mut deterministic = engine.run(&filing);
    deterministic.push(verify_ein(registry, &filing.organization.ein).await);

    let metadata = payload_metadata(payload);

    let context = AuditContext {
        organization_name: filing.organization.legal_name.clone(),
        organization_ein: filing.organization.ein.clone(),
        findings: deterministic.clone(),
        metadata: metadata.clone(),
    };

    let draft = match narrator.narrate_audit(&context).await {
        Ok(draft) => draft,
        Err(e) => {
            warn!(error = %e, "Narrator failed; report stays deterministic");
            AuditDraft::default()
        }
    };

    // Merge and recompute; the deterministic side always wins on the
    // aggregated fields.
    let findings = merge_findings(deterministic, draft.findings);
    let overall_severity = aggregate_findings(&findings);
    let sections = build_section_summaries(&findings);
    let overall_summary = compose_overall_summary(&findings);

    let year = metadata.get("return_year").and_then(year_from_value);

    let notes = draft.notes.or_else(|| {
        metadata
            .get("source")
            .and_then(Value::as_str)
            .map(|source| format!("Reviewed data source: {}.", source))
    });

    // Identity comes from the filing whenever it carries one
    let organization_name = if filing.organization.legal_name.is_empty() {
        draft.organization_name.unwrap_or_default()
    } else {
        filing.organization.legal_name.clone()
    };
    let organization_ein = if filing.organization.ein.is_empty() {
        draft.organization_ein.unwrap_or_default()
    } else {
        filing.organization.ein.clone()
    };

    info!(
        ein = %organization_ein,
        severity = %overall_severity,
        finding_count = findings.len(),
        "Audit report assembled"
    );

    Ok(AuditReport {
        report_id: Uuid::new_v4(),
        organization_ein,
        organization_name,
        year,
        overall_severity,
        findings,
        sections,
        overall_summary: Some(overall_summary),
        notes,
        source_digest,
        generated_at: Utc::now(),
    })
}

/// Deterministic headline notes handed to the narrator as context
fn headline_notes(metrics: &[TrendMetric]) -> Vec<String> {
    let mut notes = Vec::new();

    if let Some(revenue) = metrics.first() {
        if let Some(cagr) = revenue.cagr {
            notes.push(format!("Revenue CAGR: {:.2}%", cagr * 100.0));
        }
    }
    if let Some(expenses) = metrics.get(1) {
        if let Some(cagr) = expenses.cagr {
            notes.push(format!("Expense CAGR: {:.2}%", cagr * 100.0));
        }
    }
    if let Some(surplus) = metrics.iter().find(|m| m.name == "Operating Surplus") {
        if let Some(point) = surplus.points.last() {
            notes.push(format!("Latest operating surplus: {:.0}", point.value));
        }
    }

    notes
}

/// Analyze a multi-year batch of filing payloads for one organization.
pub async fn build_performance_report(
    payloads: &[Value],
    narrator: &dyn Narrator,
) -> Result<PerformanceReport> {
    let years = collect_filing_years(payloads)?;

    let organization_name = years[0].filing.organization.legal_name.clone();
    let organization_ein = years[0].filing.organization.ein.clone();
    let years_analyzed: Vec<i32> = years.iter().map(|entry| entry.year).collect();
    let source_digests: Vec<String> = years.iter().map(|entry| entry.filing.fingerprint()).collect();

    info!(
        ein = %organization_ein,
        year_count = years_analyzed.len(),
        "Performance analysis: building snapshots"
    );

    let snapshots = build_snapshots(&years);
    let key_metrics = build_key_metrics(&snapshots);
    let notes = headline_notes(&key_metrics);

    let context = AnalysisContext {
        organization_name: organization_name.clone(),
        organization_ein: organization_ein.clone(),
        series: snapshots,
        key_metrics: key_metrics.clone(),
        notes,
    };

    let draft = match narrator.narrate_performance(&context).await {
        Ok(draft) => draft,
        Err(e) => {
            warn!(error = %e, "Narrator failed; report stays deterministic");
            PerformanceDraft::default()
        }
    };

    info!(
        ein = %organization_ein,
        metric_count = key_metrics.len(),
        insight_count = draft.insights.len(),
        "Performance report assembled"
    );

    // years_analyzed and key_metrics are force-written from the
    // deterministic computation, whatever the draft contained.
    Ok(PerformanceReport {
        report_id: Uuid::new_v4(),
        organization_name,
        organization_ein,
        years_analyzed,
        key_metrics,
        insights: draft.insights,
        recommendations: draft.recommendations,
        outlook: draft.outlook.unwrap_or_else(|| "Pending analysis".to_string()),
        source_digests,
        generated_at: Utc::now(),
    })
}

//
// ================= Tests =================
//
