//! Core data models for the audit engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

//
// ================= Severity =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Severity {
    Pass,
    Warning,
    Error,
}

impl Severity {
    fn rank(&self) -> u8 {
        match self {
            Severity::Pass => 1,
            Severity::Warning => 2,
            Severity::Error => 3,
        }
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Pass => "Pass",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        };
        write!(f, "{}", s)
    }
}

//
// ================= Findings =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub check_id: String,
    pub category: String,
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub mitigation: Option<String>,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

/// Per-category rollup of findings. Recomputed whenever the finding set
/// changes; never stored apart from the findings it summarizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSummary {
    pub section: String,
    pub severity: Severity,
    pub summary: String,
    pub confidence: f64,
}

//
// ================= Trend Metrics =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
    Volatile,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrendDirection::Improving => "Improving",
            TrendDirection::Declining => "Declining",
            TrendDirection::Stable => "Stable",
            TrendDirection::Volatile => "Volatile",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendMetricPoint {
    pub year: i32,
    pub value: f64,
    /// Year-over-year growth expressed as a decimal; None for the first point
    #[serde(default)]
    pub growth: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendMetric {
    pub name: String,
    pub unit: String,
    pub description: String,
    pub points: Vec<TrendMetricPoint>,
    /// Compound annual growth rate across the analyzed span
    #[serde(default)]
    pub cagr: Option<f64>,
    pub direction: TrendDirection,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendInsight {
    pub category: String,
    pub direction: TrendDirection,
    pub summary: String,
    pub confidence: f64,
}

//
// ================= Yearly Snapshot =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearlySnapshot {
    pub year: i32,
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub revenue_growth: Option<f64>,
    pub expense_growth: Option<f64>,
    pub surplus: f64,
    pub program_ratio: Option<f64>,
    pub admin_ratio: Option<f64>,
    pub fundraising_ratio: Option<f64>,
    pub net_margin: Option<f64>,
}

//
// ================= Reports =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub report_id: Uuid,
    pub organization_ein: String,
    pub organization_name: String,
    pub year: Option<i32>,
    pub overall_severity: Severity,
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub sections: Vec<SectionSummary>,
    #[serde(default)]
    pub overall_summary: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// SHA-256 of the validated filing this report was computed from
    pub source_digest: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub report_id: Uuid,
    pub organization_name: String,
    pub organization_ein: String,
    pub years_analyzed: Vec<i32>,
    pub key_metrics: Vec<TrendMetric>,
    #[serde(default)]
    pub insights: Vec<TrendInsight>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub outlook: String,
    /// SHA-256 of each validated filing, in analyzed-year order
    pub source_digests: Vec<String>,
    pub generated_at: DateTime<Utc>,
}
