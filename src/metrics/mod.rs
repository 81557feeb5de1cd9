//! Multi-year metrics engine
//!
//! Turns an ordered run of filings for one organization into per-year
//! snapshots (growth, ratios, surplus) and named trend metrics with
//! direction classification and CAGR. Everything here is synchronous and
//! pure; the narrative collaborator only ever consumes these numbers, it
//! never produces them.

use serde_json::Value;
use tracing::debug;

use crate::error::{AuditError, Result};
use crate::filing::Filing;
use crate::models::{TrendDirection, TrendMetric, TrendMetricPoint, YearlySnapshot};

/// One filing tagged with its resolved fiscal year
#[derive(Debug, Clone)]
pub struct FilingYear {
    pub year: i32,
    pub filing: Filing,
}

//
// ================= Numeric helpers =================
//

/// Year-over-year growth; undefined when there is no usable prior value
/// (missing or zero, to avoid division by zero).
pub fn growth(current: f64, previous: Option<f64>) -> Option<f64> {
    match previous {
        Some(prev) if prev != 0.0 => Some((current - prev) / prev),
        _ => None,
    }
}

/// Ratio that is undefined instead of infinite on a zero denominator
pub fn safe_ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

/// Classify the overall direction of a value series. A span within 2% of
/// the starting value is stable; a series that swings sign in at least
/// half its interior deltas is volatile; otherwise the endpoint delta
/// decides.
fn direction_from_points(values: &[f64]) -> TrendDirection {
    if values.len() < 2 {
        return TrendDirection::Stable;
    }

    let start = values[0];
    let end = values[values.len() - 1];
    let delta = end - start;

    let tolerance = if start != 0.0 { start.abs() * 0.02 } else { 0.01 };
    if delta.abs() <= tolerance {
        return TrendDirection::Stable;
    }

    if values.len() > 2 {
        let swings = (1..values.len() - 1)
            .filter(|&idx| (values[idx] - values[idx - 1]) * (values[idx + 1] - values[idx]) < 0.0)
            .count();
        if swings >= values.len() / 2 {
            return TrendDirection::Volatile;
        }
    }

    if delta > 0.0 {
        TrendDirection::Improving
    } else {
        TrendDirection::Declining
    }
}

/// Compound annual growth rate; undefined unless both endpoints are
/// strictly positive and at least one period elapsed.
fn cagr(start: f64, end: f64, periods: usize) -> Option<f64> {
    if start <= 0.0 || end <= 0.0 || periods == 0 {
        return None;
    }
    Some((end / start).powf(1.0 / periods as f64) - 1.0)
}

//
// ================= Snapshots =================
//

/// Per-year snapshots over a year-sorted run of filings
pub fn build_snapshots(years: &[FilingYear]) -> Vec<YearlySnapshot> {
    let mut snapshots = Vec::with_capacity(years.len());
    let mut previous_revenue: Option<f64> = None;
    let mut previous_expenses: Option<f64> = None;

    for entry in years {
        let revenue = entry.filing.revenue.total_revenue;
        let expenses = entry.filing.expenses.total_expenses;
        let program = entry.filing.expenses.program_services_expenses;
        let admin = entry.filing.expenses.management_general_expenses;
        let fundraising = entry.filing.expenses.fundraising_expenses;

        snapshots.push(YearlySnapshot {
            year: entry.year,
            total_revenue: revenue,
            total_expenses: expenses,
            revenue_growth: growth(revenue, previous_revenue),
            expense_growth: growth(expenses, previous_expenses),
            surplus: revenue - expenses,
            program_ratio: safe_ratio(program, expenses),
            admin_ratio: safe_ratio(admin, expenses),
            fundraising_ratio: safe_ratio(fundraising, expenses),
            net_margin: safe_ratio(revenue - expenses, revenue),
        });

        previous_revenue = Some(revenue);
        previous_expenses = Some(expenses);
    }

    snapshots
}

//
// ================= Trend metrics =================
//

/// Build one named metric from a (year, value) series. Missing values are
/// defaulted to 0.0 before the series feeds growth, direction and CAGR
/// math; for the ratio metrics this biases the series toward zero when a
/// year has no expense data in a category, which is deliberate and must
/// not be corrected here (it would change audit outcomes).
fn metric_from_series(
    name: &str,
    unit: &str,
    description: &str,
    values: Vec<(i32, Option<f64>)>,
) -> TrendMetric {
    let mut points: Vec<TrendMetricPoint> = values
        .into_iter()
        .map(|(year, value)| TrendMetricPoint {
            year,
            value: value.unwrap_or(0.0),
            growth: None,
        })
        .collect();

    for idx in 1..points.len() {
        let prev = points[idx - 1].value;
        points[idx].growth = growth(points[idx].value, Some(prev));
    }

    let data: Vec<f64> = points.iter().map(|point| point.value).collect();
    let direction = direction_from_points(&data);
    let cagr_value = if points.len() >= 2 {
        cagr(points[0].value, points[points.len() - 1].value, points.len() - 1)
    } else {
        None
    };

    TrendMetric {
        name: name.to_string(),
        unit: unit.to_string(),
        description: description.to_string(),
        points,
        cagr: cagr_value,
        direction,
        notes: None,
    }
}

/// The six named metrics derived from a snapshot run
pub fn build_key_metrics(snapshots: &[YearlySnapshot]) -> Vec<TrendMetric> {
    if snapshots.is_empty() {
        return Vec::new();
    }

    let mut metrics = vec![
        metric_from_series(
            "Total Revenue",
            "USD",
            "Reported total revenue in Part I.",
            snapshots
                .iter()
                .map(|snap| (snap.year, Some(snap.total_revenue)))
                .collect(),
        ),
        metric_from_series(
            "Total Expenses",
            "USD",
            "Reported total expenses in Part I.",
            snapshots
                .iter()
                .map(|snap| (snap.year, Some(snap.total_expenses)))
                .collect(),
        ),
        metric_from_series(
            "Operating Surplus",
            "USD",
            "Difference between total revenue and total expenses.",
            snapshots
                .iter()
                .map(|snap| (snap.year, Some(snap.surplus)))
                .collect(),
        ),
        metric_from_series(
            "Program Service Ratio",
            "Ratio",
            "Program service expenses divided by total expenses.",
            snapshots
                .iter()
                .map(|snap| (snap.year, snap.program_ratio))
                .collect(),
        ),
        metric_from_series(
            "Administrative Ratio",
            "Ratio",
            "Management & general expenses divided by total expenses.",
            snapshots
                .iter()
                .map(|snap| (snap.year, snap.admin_ratio))
                .collect(),
        ),
        metric_from_series(
            "Fundraising Ratio",
            "Ratio",
            "Fundraising expenses divided by total expenses.",
            snapshots
                .iter()
                .map(|snap| (snap.year, snap.fundraising_ratio))
                .collect(),
        ),
    ];

    for metric in &mut metrics {
        if metric.name.ends_with("Ratio") {
            metric.notes = Some("Higher values indicate greater spending share.".to_string());
        } else if metric.name == "Operating Surplus" {
            metric.notes = Some("Positive surplus implies revenues exceeded expenses.".to_string());
        }
    }

    metrics
}

//
// ================= Year resolution & batch assembly =================
//

/// Integer coercion for year-like payload values. Numbers truncate;
/// strings must parse as integers after trimming.
pub(crate) fn year_from_value(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(|v| v as i32)
            .or_else(|| n.as_f64().map(|f| f as i32)),
        Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    }
}

/// Resolve the fiscal year for one payload entry. Candidates are tried in
/// a fixed order: explicit year-ish fields on the entry, then the entry's
/// metadata map, then the filing's own calendar year.
pub fn resolve_year(entry: &Value, filing: &Filing) -> Option<i32> {
    const ENTRY_KEYS: &[&str] = &["calendar_year", "year", "tax_year", "return_year"];
    const METADATA_KEYS: &[&str] = &["return_year", "tax_year"];

    for key in ENTRY_KEYS {
        if let Some(year) = entry.get(key).and_then(year_from_value) {
            return Some(year);
        }
    }

    if let Some(metadata) = entry.get("metadata").and_then(Value::as_object) {
        for key in METADATA_KEYS {
            if let Some(year) = metadata.get(*key).and_then(year_from_value) {
                return Some(year);
            }
        }
    }

    filing.organization.calendar_year
}

/// Validate a performance-report batch and sort it by year. Each entry is
/// either a bare filing payload or an `{extraction, metadata?, ...}`
/// wrapper; all entries must belong to one organization. Duplicate years
/// are kept as-is (stable sort), the caller owns one-filing-per-year.
pub fn collect_filing_years(payloads: &[Value]) -> Result<Vec<FilingYear>> {
    if payloads.is_empty() {
        return Err(AuditError::Batch(
            "at least one payload entry is required for performance analysis".to_string(),
        ));
    }

    let mut years: Vec<FilingYear> = Vec::with_capacity(payloads.len());
    let mut batch_ein: Option<String> = None;

    for (index, entry) in payloads.iter().enumerate() {
        if !entry.is_object() {
            return Err(AuditError::Batch(format!(
                "entry {} must be a JSON object",
                index
            )));
        }

        let extraction = entry.get("extraction").unwrap_or(entry);
        let filing = Filing::from_value(extraction)?;

        let year = resolve_year(entry, &filing).ok_or_else(|| {
            AuditError::Batch(format!("entry {} has no resolvable fiscal year", index))
        })?;

        match &batch_ein {
            None => batch_ein = Some(filing.organization.ein.clone()),
            Some(ein) if *ein != filing.organization.ein => {
                return Err(AuditError::Batch(format!(
                    "entry {} belongs to EIN {} but the batch started with EIN {}",
                    index, filing.organization.ein, ein
                )));
            }
            _ => {}
        }

        years.push(FilingYear { year, filing });
    }

    years.sort_by_key(|entry| entry.year);

    debug!(
        entry_count = years.len(),
        first_year = years.first().map(|e| e.year),
        last_year = years.last().map(|e| e.year),
        "Filing batch assembled"
    );

    Ok(years)
}

//
// ================= Tests =================
//
