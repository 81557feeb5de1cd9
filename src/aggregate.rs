//! Finding aggregation
//!
//! Rolls individual findings up into an overall severity, per-category
//! section summaries, and a one-line textual summary, and merges
//! deterministic findings with model-proposed ones. All of it is pure and
//! reproducible; summaries are derived views, never stored apart from the
//! findings they summarize.

use std::collections::HashMap;

use crate::models::{Finding, SectionSummary, Severity};

/// Overall severity is the maximum over all findings; no findings means
/// nothing failed.
pub fn aggregate_findings(findings: &[Finding]) -> Severity {
    findings
        .iter()
        .map(|finding| finding.severity)
        .max()
        .unwrap_or(Severity::Pass)
}

/// Counts per severity for one group of findings
fn severity_counts(findings: &[&Finding]) -> (usize, usize, usize) {
    let mut passes = 0;
    let mut warnings = 0;
    let mut errors = 0;
    for finding in findings {
        match finding.severity {
            Severity::Pass => passes += 1,
            Severity::Warning => warnings += 1,
            Severity::Error => errors += 1,
        }
    }
    (passes, warnings, errors)
}

/// Tally string for a group, zero counts omitted
fn tally(passes: usize, warnings: usize, errors: usize) -> String {
    let mut parts = Vec::new();
    if passes > 0 {
        parts.push(format!("{} passes", passes));
    }
    if warnings > 0 {
        parts.push(format!("{} warnings", warnings));
    }
    if errors > 0 {
        parts.push(format!("{} errors", errors));
    }
    parts.join(", ")
}

/// Group findings by category and summarize each group. Output is sorted
/// by severity descending, then category name ascending (case-insensitive)
/// so repeated runs produce identical section order.
pub fn build_section_summaries(findings: &[Finding]) -> Vec<SectionSummary> {
    let mut grouped: Vec<(String, Vec<&Finding>)> = Vec::new();
    let mut index_by_category: HashMap<&str, usize> = HashMap::new();

    for finding in findings {
        match index_by_category.get(finding.category.as_str()) {
            Some(&idx) => grouped[idx].1.push(finding),
            None => {
                index_by_category.insert(finding.category.as_str(), grouped.len());
                grouped.push((finding.category.clone(), vec![finding]));
            }
        }
    }

    let mut summaries: Vec<SectionSummary> = grouped
        .into_iter()
        .map(|(category, group)| {
            let (passes, warnings, errors) = severity_counts(&group);
            let severity = group
                .iter()
                .map(|finding| finding.severity)
                .max()
                .unwrap_or(Severity::Pass);
            let confidence =
                group.iter().map(|finding| finding.confidence).sum::<f64>() / group.len() as f64;

            SectionSummary {
                summary: format!("{} review: {}.", category, tally(passes, warnings, errors)),
                section: category,
                severity,
                confidence,
            }
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.section.to_lowercase().cmp(&b.section.to_lowercase()))
    });

    summaries
}

/// One-sentence rollup of the whole finding set
pub fn compose_overall_summary(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return "No automated findings generated.".to_string();
    }

    let refs: Vec<&Finding> = findings.iter().collect();
    let (passes, warnings, errors) = severity_counts(&refs);

    let mut parts = Vec::new();
    if errors > 0 {
        parts.push(format!("{} error(s)", errors));
    }
    if warnings > 0 {
        parts.push(format!("{} warning(s)", warnings));
    }
    if passes > 0 {
        parts.push(format!("{} check(s) passed", passes));
    }

    format!("Overall results: {}.", parts.join(", "))
}

/// Merge an additional finding set into a base set. Later entries win on
/// check-id collision but keep the position of the finding they replace,
/// so deterministic ordering survives model-proposed overrides.
pub fn merge_findings(base: Vec<Finding>, added: Vec<Finding>) -> Vec<Finding> {
    let mut merged: Vec<Finding> = Vec::with_capacity(base.len() + added.len());
    let mut index_by_id: HashMap<String, usize> = HashMap::new();

    for finding in base.into_iter().chain(added) {
        match index_by_id.get(finding.check_id.as_str()) {
            Some(&idx) => merged[idx] = finding,
            None => {
                index_by_id.insert(finding.check_id.clone(), merged.len());
                merged.push(finding);
            }
        }
    }

    merged
}

//
// ================= Tests =================
//

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(check_id: &str, category: &str, severity: Severity, confidence: f64) -> Finding {
        Finding {
            check_id: check_id.to_string(),
            category: category.to_string(),
            severity,
            message: format!("{} message", check_id),
            mitigation: None,
            confidence,
        }
    }

    #[test]
    fn test_aggregate_empty_is_pass() {
        assert_eq!(aggregate_findings(&[]), Severity::Pass);
    }

    #[test]
    fn test_aggregate_takes_maximum_severity() {
        let findings = vec![
            finding("a", "Revenue", Severity::Pass, 0.9),
            finding("b", "Revenue", Severity::Error, 0.9),
            finding("c", "Governance", Severity::Warning, 0.9),
        ];
        assert_eq!(aggregate_findings(&findings), Severity::Error);

        let warnings_only = vec![
            finding("a", "Revenue", Severity::Pass, 0.9),
            finding("b", "Revenue", Severity::Warning, 0.9),
        ];
        assert_eq!(aggregate_findings(&warnings_only), Severity::Warning);
    }

    #[test]
    fn test_section_summaries_sorted_and_tallied() {
        let findings = vec![
            finding("rev", "Revenue", Severity::Pass, 0.9),
            finding("gov1", "Governance", Severity::Warning, 0.5),
            finding("gov2", "Governance", Severity::Warning, 0.7),
            finding("exp", "Expenses", Severity::Error, 0.95),
        ];

        let summaries = build_section_summaries(&findings);
        assert_eq!(summaries.len(), 3);

        // severity descending, then name ascending
        assert_eq!(summaries[0].section, "Expenses");
        assert_eq!(summaries[1].section, "Governance");
        assert_eq!(summaries[2].section, "Revenue");

        assert_eq!(summaries[1].summary, "Governance review: 2 warnings.");
        assert!((summaries[1].confidence - 0.6).abs() < 1e-9);

        // zero counts are omitted from the tally
        assert_eq!(summaries[0].summary, "Expenses review: 1 errors.");
        assert_eq!(summaries[2].summary, "Revenue review: 1 passes.");
    }

    #[test]
    fn test_overall_summary_text() {
        assert_eq!(
            compose_overall_summary(&[]),
            "No automated findings generated."
        );

        let findings = vec![
            finding("a", "Revenue", Severity::Pass, 0.9),
            finding("b", "Expenses", Severity::Error, 0.9),
            finding("c", "Governance", Severity::Warning, 0.6),
            finding("d", "Governance", Severity::Warning, 0.6),
        ];
        assert_eq!(
            compose_overall_summary(&findings),
            "Overall results: 1 error(s), 2 warning(s), 1 check(s) passed."
        );
    }

    #[test]
    fn test_merge_last_write_wins_in_place() {
        let base = vec![
            finding("rev", "Revenue", Severity::Pass, 0.95),
            finding("exp", "Expenses", Severity::Pass, 0.95),
        ];
        let added = vec![
            finding("rev", "Revenue", Severity::Error, 0.8),
            finding("model_extra", "Narrative", Severity::Warning, 0.4),
        ];

        let merged = merge_findings(base, added);
        assert_eq!(merged.len(), 3);

        // the override keeps its original position
        assert_eq!(merged[0].check_id, "rev");
        assert_eq!(merged[0].severity, Severity::Error);
        assert_eq!(merged[1].check_id, "exp");
        assert_eq!(merged[2].check_id, "model_extra");
    }

    #[test]
    fn test_merge_with_self_is_idempotent() {
        let base = vec![
            finding("rev", "Revenue", Severity::Pass, 0.95),
            finding("exp", "Expenses", Severity::Error, 0.95),
        ];

        let merged = merge_findings(base.clone(), base.clone());
        assert_eq!(merged.len(), base.len());
        for (merged_finding, original) in merged.iter().zip(&base) {
            assert_eq!(merged_finding.check_id, original.check_id);
            assert_eq!(merged_finding.severity, original.severity);
        }
    }
}
