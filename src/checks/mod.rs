//! Reconciliation check engine
//!
//! Rules-based validation of a single filing. Every rule is a pure
//! function of the filing and produces findings with fixed confidence
//! levels; execution order never affects results. The EIN check is the
//! one exception with a network dependency and lives behind the
//! registry seam.

use tracing::{debug, info, warn};

use crate::filing::Filing;
use crate::models::{Finding, Severity};
use crate::registry::EinRegistry;

/// Absolute currency-unit tolerance for total reconciliation
const RECONCILIATION_TOLERANCE: f64 = 1.0;

/// Aggregate weekly board hours below this are flagged
const MIN_BOARD_HOURS: f64 = 5.0;

/// Confidence reported when the registry cannot be reached
const DEGRADED_REGISTRY_CONFIDENCE: f64 = 0.2;

/// Trait for a deterministic filing check
pub trait FilingCheck: Send + Sync {
    fn name(&self) -> &'static str;

    /// Most checks emit exactly one finding; the governance check emits
    /// one per missing policy disclosure.
    fn run(&self, filing: &Filing) -> Vec<Finding>;
}

/// Check engine that runs the fixed battery (SYNC — no async overhead)
pub struct CheckEngine {
    rules: Vec<Box<dyn FilingCheck>>,
}

impl CheckEngine {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add_rule(&mut self, rule: Box<dyn FilingCheck>) {
        self.rules.push(rule);
    }

    /// Engine with the standard battery, in reporting order
    pub fn with_default_rules() -> Self {
        let mut engine = Self::new();
        engine.add_rule(Box::new(RevenueTotalsCheck));
        engine.add_rule(Box::new(ExpenseTotalsCheck));
        engine.add_rule(Box::new(FundraisingAlignmentCheck));
        engine.add_rule(Box::new(BalanceSheetCheck));
        engine.add_rule(Box::new(BoardEngagementCheck));
        engine.add_rule(Box::new(OperationalDetailsCheck));
        engine.add_rule(Box::new(GovernancePoliciesCheck));
        engine
    }

    pub fn run(&self, filing: &Filing) -> Vec<Finding> {
        let mut findings = Vec::with_capacity(self.rules.len());

        for rule in &self.rules {
            let produced = rule.run(filing);
            debug!(rule = rule.name(), produced = produced.len(), "Check ran");
            findings.extend(produced);
        }

        info!(
            rule_count = self.rules.len(),
            finding_count = findings.len(),
            "Check battery completed"
        );

        findings
    }
}

impl Default for CheckEngine {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

//
// ================= Formatting helpers =================
//

/// "$5,227.00"-style currency rendering for finding messages
fn usd(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if negative {
        format!("-${}.{:02}", grouped, frac)
    } else {
        format!("${}.{:02}", grouped, frac)
    }
}

/// "conflict_of_interest_policy" → "Conflict Of Interest Policy"
fn field_label(field: &str) -> String {
    field
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

//
// ================= Reconciliation checks =================
//

/// Revenue categories must sum to the reported total within tolerance
pub struct RevenueTotalsCheck;

impl FilingCheck for RevenueTotalsCheck {
    fn name(&self) -> &'static str {
        "revenue_totals"
    }

    fn run(&self, filing: &Filing) -> Vec<Finding> {
        let subtotal = filing.revenue.category_sum();
        let total = filing.revenue.total_revenue;

        let finding = if (subtotal - total).abs() <= RECONCILIATION_TOLERANCE {
            Finding {
                check_id: "revenue_totals".to_string(),
                category: "Revenue".to_string(),
                severity: Severity::Pass,
                message: format!(
                    "Revenue categories sum ({}) matches total revenue.",
                    usd(subtotal)
                ),
                mitigation: Some(
                    "Maintain detailed support for each revenue source to preserve reconciliation trail."
                        .to_string(),
                ),
                confidence: 0.95,
            }
        } else {
            Finding {
                check_id: "revenue_totals".to_string(),
                category: "Revenue".to_string(),
                severity: Severity::Error,
                message: format!(
                    "Revenue categories sum ({}) does not equal reported total ({}).",
                    usd(subtotal),
                    usd(total)
                ),
                mitigation: Some(
                    "Recalculate revenue totals and correct line items or Schedule A before filing."
                        .to_string(),
                ),
                confidence: 0.95,
            }
        };

        vec![finding]
    }
}

/// Functional expense categories must sum to the reported total
pub struct ExpenseTotalsCheck;

impl FilingCheck for ExpenseTotalsCheck {
    fn name(&self) -> &'static str {
        "expense_totals"
    }

    fn run(&self, filing: &Filing) -> Vec<Finding> {
        let subtotal = filing.expenses.functional_sum();
        let total = filing.expenses.total_expenses;

        let finding = if (subtotal - total).abs() <= RECONCILIATION_TOLERANCE {
            Finding {
                check_id: "expense_totals".to_string(),
                category: "Expenses".to_string(),
                severity: Severity::Pass,
                message: "Functional expenses match total expenses.".to_string(),
                mitigation: Some(
                    "Keep functional allocation workpapers to support the reconciliation."
                        .to_string(),
                ),
                confidence: 0.95,
            }
        } else {
            Finding {
                check_id: "expense_totals".to_string(),
                category: "Expenses".to_string(),
                severity: Severity::Error,
                message: format!(
                    "Functional expenses ({}) do not reconcile to total expenses ({}).",
                    usd(subtotal),
                    usd(total)
                ),
                mitigation: Some(
                    "Review Part I, lines 23-27 and reclassify functional expenses to tie to Part II totals."
                        .to_string(),
                ),
                confidence: 0.95,
            }
        };

        vec![finding]
    }
}

/// Reported fundraising expense vs. fundraising-event expense
pub struct FundraisingAlignmentCheck;

impl FilingCheck for FundraisingAlignmentCheck {
    fn name(&self) -> &'static str {
        "fundraising_alignment"
    }

    fn run(&self, filing: &Filing) -> Vec<Finding> {
        let reported = filing.expenses.fundraising_expenses;
        let event = filing.fundraising.total_fundraising_event_expenses;
        let difference = (reported - event).abs();

        if difference <= RECONCILIATION_TOLERANCE {
            return vec![Finding {
                check_id: "fundraising_alignment".to_string(),
                category: "Fundraising".to_string(),
                severity: Severity::Pass,
                message: "Fundraising functional expenses align with reported event expenses."
                    .to_string(),
                mitigation: Some(
                    "Retain event ledgers and allocations to support matching totals.".to_string(),
                ),
                confidence: 0.9,
            }];
        }

        // Within 10% of reported fundraising expense is a warning,
        // anything wider is an error.
        let severity = if reported != 0.0 && difference <= reported * 0.1 {
            Severity::Warning
        } else {
            Severity::Error
        };

        vec![Finding {
            check_id: "fundraising_alignment".to_string(),
            category: "Fundraising".to_string(),
            severity,
            message: format!(
                "Fundraising functional expenses ({}) differ from reported event expenses ({}) by {}.",
                usd(reported),
                usd(event),
                usd(difference)
            ),
            mitigation: Some(
                "Reconcile Schedule G and Part I allocations to eliminate the variance.".to_string(),
            ),
            confidence: 0.85,
        }]
    }
}

/// Balance sheet section must not be empty
pub struct BalanceSheetCheck;

impl FilingCheck for BalanceSheetCheck {
    fn name(&self) -> &'static str {
        "balance_sheet_presence"
    }

    fn run(&self, filing: &Filing) -> Vec<Finding> {
        let finding = if !filing.balance_sheet.is_empty() {
            Finding {
                check_id: "balance_sheet_present".to_string(),
                category: "Balance Sheet".to_string(),
                severity: Severity::Pass,
                message: "Balance sheet data is present.".to_string(),
                mitigation: Some("Ensure ending net assets tie to Part I, line 30.".to_string()),
                confidence: 0.7,
            }
        } else {
            Finding {
                check_id: "balance_sheet_absent".to_string(),
                category: "Balance Sheet".to_string(),
                severity: Severity::Warning,
                message: "Balance sheet section is empty; confirm Part II filing requirements."
                    .to_string(),
                mitigation: Some(
                    "Populate assets, liabilities, and net assets or attach supporting schedules."
                        .to_string(),
                ),
                confidence: 0.6,
            }
        };

        vec![finding]
    }
}

/// Aggregate reported officer hours as a governance-engagement signal
pub struct BoardEngagementCheck;

impl FilingCheck for BoardEngagementCheck {
    fn name(&self) -> &'static str {
        "board_hours"
    }

    fn run(&self, filing: &Filing) -> Vec<Finding> {
        let total_hours: f64 = filing
            .officers
            .iter()
            .filter_map(|officer| officer.average_hours_per_week)
            .sum();

        let finding = if total_hours >= MIN_BOARD_HOURS {
            Finding {
                check_id: "board_hours".to_string(),
                category: "Governance".to_string(),
                severity: Severity::Pass,
                message: "Officer and director time commitments appear reasonable.".to_string(),
                mitigation: Some(
                    "Continue documenting board attendance and oversight responsibilities."
                        .to_string(),
                ),
                confidence: 0.7,
            }
        } else {
            Finding {
                check_id: "board_hours".to_string(),
                category: "Governance".to_string(),
                severity: Severity::Warning,
                message: format!(
                    "Aggregate reported board hours ({:.1} per week) are low; confirm entries reflect actual governance involvement.",
                    total_hours
                ),
                mitigation: Some(
                    "Verify hours in Part VII; update if officers volunteer significant time."
                        .to_string(),
                ),
                confidence: 0.6,
            }
        };

        vec![finding]
    }
}

/// Fundraising-method narrative must be present
pub struct OperationalDetailsCheck;

impl FilingCheck for OperationalDetailsCheck {
    fn name(&self) -> &'static str {
        "operational_details"
    }

    fn run(&self, filing: &Filing) -> Vec<Finding> {
        let descriptors = filing.operations.fundraising_method_descriptions.trim();

        let finding = if !descriptors.is_empty() {
            Finding {
                check_id: "fundraising_methods_documented".to_string(),
                category: "Operations".to_string(),
                severity: Severity::Pass,
                message: "Fundraising method descriptions provided.".to_string(),
                mitigation: Some(
                    "Update narratives annually to reflect any new campaigns or joint ventures."
                        .to_string(),
                ),
                confidence: 0.65,
            }
        } else {
            Finding {
                check_id: "fundraising_methods_missing".to_string(),
                category: "Operations".to_string(),
                severity: Severity::Warning,
                message: "Fundraising method descriptions are blank.".to_string(),
                mitigation: Some(
                    "Add a brief Schedule G narrative describing major fundraising approaches."
                        .to_string(),
                ),
                confidence: 0.55,
            }
        };

        vec![finding]
    }
}

/// Governance policy disclosures; one finding per missing field
pub struct GovernancePoliciesCheck;

impl FilingCheck for GovernancePoliciesCheck {
    fn name(&self) -> &'static str {
        "governance_policies"
    }

    fn run(&self, filing: &Filing) -> Vec<Finding> {
        let gm = &filing.governance;
        let mut findings = Vec::new();

        let policy_fields: [(&str, &str, &str); 3] = [
            (
                "conflict_of_interest_policy",
                gm.conflict_of_interest_policy.as_str(),
                "Document the policy in Part VI or adopt one prior to filing.",
            ),
            (
                "whistleblower_policy",
                gm.whistleblower_policy.as_str(),
                "Document whistleblower protections for staff and volunteers.",
            ),
            (
                "document_retention_policy",
                gm.document_retention_policy.as_str(),
                "Adopt and document a record retention policy.",
            ),
        ];

        let affirmative_fields: [(&str, &str, &str); 2] = [
            (
                "financial_statements_reviewed",
                gm.financial_statements_reviewed.as_str(),
                "Capture whether the board reviewed or audited year-end financials.",
            ),
            (
                "form_990_provided_to_governing_body",
                gm.form_990_provided_to_governing_body.as_str(),
                "Provide Form 990 to the board before submission and note the date of review.",
            ),
        ];

        for (field, value, mitigation) in policy_fields {
            let trimmed = value.trim();
            let denied = matches!(trimmed.to_lowercase().as_str(), "no" | "n" | "false");
            if trimmed.is_empty() || denied {
                findings.push(Finding {
                    check_id: format!("{}_missing", field),
                    category: "Governance".to_string(),
                    severity: Severity::Warning,
                    message: format!("{} not reported or marked 'No'.", field_label(field)),
                    mitigation: Some(mitigation.to_string()),
                    confidence: 0.55,
                });
            }
        }

        for (field, value, mitigation) in affirmative_fields {
            if value.trim().is_empty() {
                findings.push(Finding {
                    check_id: format!("{}_blank", field),
                    category: "Governance".to_string(),
                    severity: Severity::Warning,
                    message: format!("{} left blank.", field_label(field)),
                    mitigation: Some(mitigation.to_string()),
                    confidence: 0.5,
                });
            }
        }

        findings
    }
}

//
// ================= EIN verification =================
//

/// Confirm the filing's EIN against the external registry. Fails open:
/// an unreachable registry degrades to an unverified warning, never an
/// error.
pub async fn verify_ein(registry: &dyn EinRegistry, ein: &str) -> Finding {
    match registry.lookup(ein).await {
        Ok(verdict) if verdict.confirmed => Finding {
            check_id: "irs_ein_match".to_string(),
            category: "Compliance".to_string(),
            severity: Severity::Pass,
            message: "EIN confirmed against IRS index.".to_string(),
            mitigation: Some("Document verification in the filing workpapers.".to_string()),
            confidence: verdict.confidence,
        },
        Ok(verdict) => Finding {
            check_id: "irs_ein_match".to_string(),
            category: "Compliance".to_string(),
            severity: Severity::Warning,
            message: format!("EIN {} could not be confirmed. {}", ein, verdict.note),
            mitigation: Some(
                "Verify the EIN against the IRS EO BMF or IRS determination letter.".to_string(),
            ),
            confidence: verdict.confidence,
        },
        Err(e) => {
            warn!(error = %e, "EIN registry lookup failed; degrading to unverified");
            Finding {
                check_id: "irs_ein_match".to_string(),
                category: "Compliance".to_string(),
                severity: Severity::Warning,
                message: format!(
                    "EIN {} could not be confirmed. Registry lookup unavailable.",
                    ein
                ),
                mitigation: Some(
                    "Verify the EIN against the IRS EO BMF or IRS determination letter."
                        .to_string(),
                ),
                confidence: DEGRADED_REGISTRY_CONFIDENCE,
            }
        }
    }
}

//
// ================= Tests =================
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filing::normalize::test_support::sample_filing;
    use crate::registry::OfflineRegistry;

    #[test]
    fn test_revenue_reconciliation_pass_and_flip() {
        let filing = sample_filing();
        let findings = RevenueTotalsCheck.run(&filing);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Pass);
        assert_eq!(findings[0].confidence, 0.95);

        // perturbing one category beyond the tolerance flips to Error
        let mut off = filing.clone();
        off.revenue.other_revenue += 2.0;
        let findings = RevenueTotalsCheck.run(&off);
        assert_eq!(findings[0].severity, Severity::Error);
        assert!(findings[0].message.contains("$5,229.00"));

        // exactly one unit of drift stays within tolerance
        let mut near = filing.clone();
        near.revenue.other_revenue += 1.0;
        assert_eq!(RevenueTotalsCheck.run(&near)[0].severity, Severity::Pass);
    }

    #[test]
    fn test_expense_reconciliation() {
        let filing = sample_filing();
        assert_eq!(ExpenseTotalsCheck.run(&filing)[0].severity, Severity::Pass);

        let mut off = filing.clone();
        off.expenses.program_services_expenses = 500.0;
        let finding = &ExpenseTotalsCheck.run(&off)[0];
        assert_eq!(finding.severity, Severity::Error);
        assert!(finding.message.contains("$2,604.00"));
        assert!(finding.message.contains("$2,104.00"));
    }

    #[test]
    fn test_fundraising_alignment_bands() {
        // exact difference of one unit passes
        let mut filing = sample_filing();
        filing.expenses.fundraising_expenses = 1000.0;
        filing.fundraising.total_fundraising_event_expenses = 999.0;
        assert_eq!(
            FundraisingAlignmentCheck.run(&filing)[0].severity,
            Severity::Pass
        );

        // 9% of $1,000 is a warning
        filing.fundraising.total_fundraising_event_expenses = 910.0;
        assert_eq!(
            FundraisingAlignmentCheck.run(&filing)[0].severity,
            Severity::Warning
        );

        // 11% of $1,000 is an error
        filing.fundraising.total_fundraising_event_expenses = 890.0;
        assert_eq!(
            FundraisingAlignmentCheck.run(&filing)[0].severity,
            Severity::Error
        );

        // zero reported fundraising cannot earn the percentage band
        filing.expenses.fundraising_expenses = 0.0;
        filing.fundraising.total_fundraising_event_expenses = 50.0;
        assert_eq!(
            FundraisingAlignmentCheck.run(&filing)[0].severity,
            Severity::Error
        );
    }

    #[test]
    fn test_balance_sheet_presence() {
        let filing = sample_filing();
        let finding = &BalanceSheetCheck.run(&filing)[0];
        assert_eq!(finding.check_id, "balance_sheet_absent");
        assert_eq!(finding.severity, Severity::Warning);

        let mut populated = filing.clone();
        populated
            .balance_sheet
            .insert("total_assets".to_string(), serde_json::json!(125000));
        let finding = &BalanceSheetCheck.run(&populated)[0];
        assert_eq!(finding.check_id, "balance_sheet_present");
        assert_eq!(finding.severity, Severity::Pass);
    }

    #[test]
    fn test_board_engagement_threshold() {
        // four officers at 0.1 hours each
        let filing = sample_filing();
        let finding = &BoardEngagementCheck.run(&filing)[0];
        assert_eq!(finding.severity, Severity::Warning);
        assert!(finding.message.contains("0.4 per week"));

        let mut engaged = filing.clone();
        for officer in &mut engaged.officers {
            officer.average_hours_per_week = Some(2.0);
        }
        assert_eq!(BoardEngagementCheck.run(&engaged)[0].severity, Severity::Pass);

        // None hours are ignored, not treated as zero
        let mut partial = filing.clone();
        partial.officers[0].average_hours_per_week = None;
        partial.officers[1].average_hours_per_week = Some(5.0);
        assert_eq!(BoardEngagementCheck.run(&partial)[0].severity, Severity::Pass);
    }

    #[test]
    fn test_operational_details() {
        let filing = sample_filing();
        let finding = &OperationalDetailsCheck.run(&filing)[0];
        assert_eq!(finding.check_id, "fundraising_methods_missing");
        assert_eq!(finding.severity, Severity::Warning);

        let mut documented = filing.clone();
        documented.operations.fundraising_method_descriptions =
            "Annual gala and online campaigns".to_string();
        let finding = &OperationalDetailsCheck.run(&documented)[0];
        assert_eq!(finding.check_id, "fundraising_methods_documented");
        assert_eq!(finding.severity, Severity::Pass);
    }

    #[test]
    fn test_governance_policies_multi_finding() {
        let filing = sample_filing();
        let findings = GovernancePoliciesCheck.run(&filing);
        // three blank policies + two blank affirmative disclosures
        assert_eq!(findings.len(), 5);
        assert!(findings
            .iter()
            .any(|f| f.check_id == "conflict_of_interest_policy_missing"));
        assert!(findings
            .iter()
            .any(|f| f.check_id == "form_990_provided_to_governing_body_blank"));

        // an explicit "No" is flagged the same as blank
        let mut denied = filing.clone();
        denied.governance.whistleblower_policy = " NO ".to_string();
        assert!(GovernancePoliciesCheck
            .run(&denied)
            .iter()
            .any(|f| f.check_id == "whistleblower_policy_missing"));

        // affirmative answers clear the policy findings
        let mut disclosed = filing.clone();
        disclosed.governance.conflict_of_interest_policy = "Yes".to_string();
        disclosed.governance.whistleblower_policy = "Yes".to_string();
        disclosed.governance.document_retention_policy = "Yes".to_string();
        disclosed.governance.financial_statements_reviewed = "Reviewed".to_string();
        disclosed.governance.form_990_provided_to_governing_body = "Yes".to_string();
        assert!(GovernancePoliciesCheck.run(&disclosed).is_empty());
    }

    #[test]
    fn test_default_battery_covers_all_rules() {
        let engine = CheckEngine::with_default_rules();
        let findings = engine.run(&sample_filing());
        // six single-finding checks plus five governance findings
        assert_eq!(findings.len(), 11);
    }

    #[test]
    fn test_field_label() {
        assert_eq!(
            field_label("conflict_of_interest_policy"),
            "Conflict Of Interest Policy"
        );
        assert_eq!(
            field_label("form_990_provided_to_governing_body"),
            "Form 990 Provided To Governing Body"
        );
    }

    #[test]
    fn test_usd_formatting() {
        assert_eq!(usd(5227.0), "$5,227.00");
        assert_eq!(usd(1234567.891), "$1,234,567.89");
        assert_eq!(usd(0.0), "$0.00");
        assert_eq!(usd(-950.5), "-$950.50");
    }

    #[tokio::test]
    async fn test_verify_ein_degrades_gracefully() {
        let registry = OfflineRegistry;
        let finding = verify_ein(&registry, "84-2674654").await;
        assert_eq!(finding.check_id, "irs_ein_match");
        assert_eq!(finding.severity, Severity::Warning);
        assert_eq!(finding.confidence, 0.2);
        assert!(finding.message.contains("84-2674654"));
    }
}
