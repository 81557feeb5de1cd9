//! Payload normalization
//!
//! The extraction collaborator usually emits the nested filing shape, but
//! flatter sources deliver a single map of leaf fields. An explicit adapter
//! lifts flat payloads into the nested shape (missing fields default to
//! empty string / zero) before schema validation; nested payloads go
//! straight to serde. Anything that fails validation is rejected before a
//! single check runs.

use serde_json::{json, Map, Value};

use crate::error::{AuditError, Result};

use super::Filing;

/// Section keys that mark a payload as already nested
const SECTION_KEYS: &[&str] = &[
    "core_organization_metadata",
    "revenue_breakdown",
    "expenses_breakdown",
    "governance_management_disclosure",
];

impl Filing {
    /// Construct a validated filing from a loosely-typed payload,
    /// normalizing flat payloads first.
    pub fn from_value(value: &Value) -> Result<Filing> {
        let object = value.as_object().ok_or_else(|| {
            AuditError::Validation("filing payload must be a JSON object".to_string())
        })?;

        let candidate = if is_nested(object) {
            value.clone()
        } else {
            lift_flat_payload(object)
        };

        serde_json::from_value(candidate).map_err(|e| {
            AuditError::Validation(format!("filing payload failed schema validation: {}", e))
        })
    }
}

fn is_nested(object: &Map<String, Value>) -> bool {
    SECTION_KEYS.iter().any(|key| object.contains_key(*key))
}

/// String field from a flat payload, empty when missing
fn text(object: &Map<String, Value>, key: &str) -> Value {
    match object.get(key) {
        Some(Value::String(s)) => Value::String(s.clone()),
        Some(Value::Number(n)) => Value::String(n.to_string()),
        _ => Value::String(String::new()),
    }
}

/// Numeric field from a flat payload, zero when missing or non-numeric
fn num(object: &Map<String, Value>, key: &str) -> Value {
    match object.get(key) {
        Some(Value::Number(n)) => Value::Number(n.clone()),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| json!(0.0)),
        _ => json!(0.0),
    }
}

/// Pass-through for list/map sections a flat payload may still carry whole
fn section(object: &Map<String, Value>, key: &str, default: Value) -> Value {
    object.get(key).cloned().unwrap_or(default)
}

/// Year field, coerced to an integer or null
fn calendar_year(object: &Map<String, Value>) -> Value {
    match object.get("calendar_year") {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(Value::from)
            .unwrap_or(Value::Null),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn lift_flat_payload(o: &Map<String, Value>) -> Value {
    json!({
        "core_organization_metadata": {
            "ein": text(o, "ein"),
            "legal_name": text(o, "legal_name"),
            "phone_number": text(o, "phone_number"),
            "website_url": text(o, "website_url"),
            "return_type": text(o, "return_type"),
            "amended_return": text(o, "amended_return"),
            "group_exemption_number": text(o, "group_exemption_number"),
            "subsection_code": text(o, "subsection_code"),
            "ruling_date": text(o, "ruling_date"),
            "accounting_method": text(o, "accounting_method"),
            "organization_type": text(o, "organization_type"),
            "year_of_formation": text(o, "year_of_formation"),
            "incorporation_state": text(o, "incorporation_state"),
            "calendar_year": calendar_year(o),
        },
        "revenue_breakdown": {
            "total_revenue": num(o, "total_revenue"),
            "contributions_gifts_grants": num(o, "contributions_gifts_grants"),
            "program_service_revenue": num(o, "program_service_revenue"),
            "membership_dues": num(o, "membership_dues"),
            "investment_income": num(o, "investment_income"),
            "gains_losses_sales_assets": num(o, "gains_losses_sales_assets"),
            "rental_income": num(o, "rental_income"),
            "related_organizations_revenue": num(o, "related_organizations_revenue"),
            "gaming_revenue": num(o, "gaming_revenue"),
            "other_revenue": num(o, "other_revenue"),
            "government_grants": num(o, "government_grants"),
            "foreign_contributions": num(o, "foreign_contributions"),
        },
        "expenses_breakdown": {
            "total_expenses": num(o, "total_expenses"),
            "program_services_expenses": num(o, "program_services_expenses"),
            "management_general_expenses": num(o, "management_general_expenses"),
            "fundraising_expenses": num(o, "fundraising_expenses"),
            "grants_us_organizations": num(o, "grants_us_organizations"),
            "grants_us_individuals": num(o, "grants_us_individuals"),
            "grants_foreign_organizations": num(o, "grants_foreign_organizations"),
            "grants_foreign_individuals": num(o, "grants_foreign_individuals"),
            "compensation_officers": num(o, "compensation_officers"),
            "compensation_other_staff": num(o, "compensation_other_staff"),
            "payroll_taxes_benefits": num(o, "payroll_taxes_benefits"),
            "professional_fees": num(o, "professional_fees"),
            "office_occupancy_costs": num(o, "office_occupancy_costs"),
            "information_technology_costs": num(o, "information_technology_costs"),
            "travel_conference_expenses": num(o, "travel_conference_expenses"),
            "depreciation_amortization": num(o, "depreciation_amortization"),
            "insurance": num(o, "insurance"),
        },
        "balance_sheet": section(o, "balance_sheet", json!({})),
        "officers_directors_trustees_key_employees":
            section(o, "officers_directors_trustees_key_employees", json!([])),
        "governance_management_disclosure": {
            "governing_body_size": num(o, "governing_body_size"),
            "independent_members": num(o, "independent_members"),
            "financial_statements_reviewed": text(o, "financial_statements_reviewed"),
            "form_990_provided_to_governing_body": text(o, "form_990_provided_to_governing_body"),
            "conflict_of_interest_policy": text(o, "conflict_of_interest_policy"),
            "whistleblower_policy": text(o, "whistleblower_policy"),
            "document_retention_policy": text(o, "document_retention_policy"),
            "ceo_compensation_review_process": text(o, "ceo_compensation_review_process"),
            "public_disclosure_practices": text(o, "public_disclosure_practices"),
        },
        "program_service_accomplishments":
            section(o, "program_service_accomplishments", json!([])),
        "fundraising_grantmaking": {
            "total_fundraising_event_revenue": num(o, "total_fundraising_event_revenue"),
            "total_fundraising_event_expenses": num(o, "total_fundraising_event_expenses"),
            "professional_fundraiser_fees": num(o, "professional_fundraiser_fees"),
        },
        "functional_operational_data": {
            "number_of_employees": num(o, "number_of_employees"),
            "number_of_volunteers": num(o, "number_of_volunteers"),
            "occupancy_costs": num(o, "occupancy_costs"),
            "fundraising_method_descriptions": text(o, "fundraising_method_descriptions"),
            "joint_ventures_disregarded_entities": text(o, "joint_ventures_disregarded_entities"),
        },
        "compensation_details": {
            "base_compensation": num(o, "base_compensation"),
            "bonus": num(o, "bonus"),
            "incentive": num(o, "incentive"),
            "other": num(o, "other"),
            "non_fixed_compensation": text(o, "non_fixed_compensation"),
            "first_class_travel": text(o, "first_class_travel"),
            "housing_allowance": text(o, "housing_allowance"),
            "expense_account_usage": text(o, "expense_account_usage"),
            "supplemental_retirement": text(o, "supplemental_retirement"),
        },
        "political_lobbying_activities": {
            "lobbying_expenditures_direct": num(o, "lobbying_expenditures_direct"),
            "lobbying_expenditures_grassroots": num(o, "lobbying_expenditures_grassroots"),
            "election_501h_status": text(o, "election_501h_status"),
            "political_campaign_expenditures": num(o, "political_campaign_expenditures"),
            "related_organizations_affiliates": text(o, "related_organizations_affiliates"),
        },
        "investments_endowment": {
            "investment_types": text(o, "investment_types"),
            "donor_restricted_endowment_values": num(o, "donor_restricted_endowment_values"),
            "net_appreciation_depreciation": num(o, "net_appreciation_depreciation"),
            "related_organization_transactions": text(o, "related_organization_transactions"),
            "loans_to_from_related_parties": text(o, "loans_to_from_related_parties"),
        },
        "tax_compliance_penalties": {
            "penalties_excise_taxes_reported": text(o, "penalties_excise_taxes_reported"),
            "unrelated_business_income_disclosure": text(o, "unrelated_business_income_disclosure"),
            "foreign_bank_account_reporting": text(o, "foreign_bank_account_reporting"),
            "schedule_o_narrative_explanations": text(o, "schedule_o_narrative_explanations"),
        },
    })
}

#[cfg(test)]
pub mod test_support {
    use serde_json::{json, Value};

    use crate::filing::Filing;

    /// Nested payload for a small scholarship fund: revenue reconciles,
    /// functional expenses reconcile, balance sheet empty, board hours low.
    pub fn sample_payload() -> Value {
        json!({
            "core_organization_metadata": {
                "ein": "84-2674654",
                "legal_name": "RIVERBEND MEMORIAL SCHOLARSHIP FUND",
                "phone_number": "(262) 555-0300",
                "website_url": "",
                "return_type": "990-PF",
                "amended_return": "No",
                "group_exemption_number": "",
                "subsection_code": "501(c)(3)",
                "ruling_date": "",
                "accounting_method": "Cash",
                "organization_type": "corporation",
                "year_of_formation": "",
                "incorporation_state": "WI"
            },
            "revenue_breakdown": {
                "total_revenue": 5227,
                "contributions_gifts_grants": 5227,
                "program_service_revenue": 0,
                "membership_dues": 0,
                "investment_income": 0,
                "gains_losses_sales_assets": 0,
                "rental_income": 0,
                "related_organizations_revenue": 0,
                "gaming_revenue": 0,
                "other_revenue": 0,
                "government_grants": 0,
                "foreign_contributions": 0
            },
            "expenses_breakdown": {
                "total_expenses": 2104,
                "program_services_expenses": 0,
                "management_general_expenses": 0,
                "fundraising_expenses": 2104,
                "grants_us_organizations": 0,
                "grants_us_individuals": 0,
                "grants_foreign_organizations": 0,
                "grants_foreign_individuals": 0,
                "compensation_officers": 0,
                "compensation_other_staff": 0,
                "payroll_taxes_benefits": 0,
                "professional_fees": 0,
                "office_occupancy_costs": 0,
                "information_technology_costs": 0,
                "travel_conference_expenses": 0,
                "depreciation_amortization": 0,
                "insurance": 0
            },
            "balance_sheet": {},
            "officers_directors_trustees_key_employees": [
                {
                    "name": "MARGARET ELLISON",
                    "title_position": "PRESIDENT",
                    "average_hours_per_week": 0.1,
                    "related_party_transactions": "",
                    "former_officer": "",
                    "governance_role": ""
                },
                {
                    "name": "DANIEL OKAFOR",
                    "title_position": "VICE PRESIDENT",
                    "average_hours_per_week": 0.1,
                    "related_party_transactions": "",
                    "former_officer": "",
                    "governance_role": ""
                },
                {
                    "name": "PRIYA NARAYAN",
                    "title_position": "TREASURER",
                    "average_hours_per_week": 0.1,
                    "related_party_transactions": "",
                    "former_officer": "",
                    "governance_role": ""
                },
                {
                    "name": "THOMAS REYES",
                    "title_position": "SECRETARY",
                    "average_hours_per_week": 0.1,
                    "related_party_transactions": "",
                    "former_officer": "",
                    "governance_role": ""
                }
            ],
            "governance_management_disclosure": {
                "governing_body_size": 4,
                "independent_members": 4,
                "financial_statements_reviewed": "",
                "form_990_provided_to_governing_body": "",
                "conflict_of_interest_policy": "",
                "whistleblower_policy": "",
                "document_retention_policy": "",
                "ceo_compensation_review_process": "",
                "public_disclosure_practices": "Yes"
            },
            "program_service_accomplishments": [],
            "fundraising_grantmaking": {
                "total_fundraising_event_revenue": 0,
                "total_fundraising_event_expenses": 2104,
                "professional_fundraiser_fees": 0
            },
            "functional_operational_data": {
                "number_of_employees": 0,
                "number_of_volunteers": 0,
                "occupancy_costs": 0,
                "fundraising_method_descriptions": "",
                "joint_ventures_disregarded_entities": ""
            },
            "compensation_details": {
                "base_compensation": 0,
                "bonus": 0,
                "incentive": 0,
                "other": 0,
                "non_fixed_compensation": "",
                "first_class_travel": "",
                "housing_allowance": "",
                "expense_account_usage": "",
                "supplemental_retirement": ""
            },
            "political_lobbying_activities": {
                "lobbying_expenditures_direct": 0,
                "lobbying_expenditures_grassroots": 0,
                "election_501h_status": "",
                "political_campaign_expenditures": 0,
                "related_organizations_affiliates": ""
            },
            "investments_endowment": {
                "investment_types": "",
                "donor_restricted_endowment_values": 0,
                "net_appreciation_depreciation": 0,
                "related_organization_transactions": "",
                "loans_to_from_related_parties": ""
            },
            "tax_compliance_penalties": {
                "penalties_excise_taxes_reported": "No",
                "unrelated_business_income_disclosure": "No",
                "foreign_bank_account_reporting": "No",
                "schedule_o_narrative_explanations": ""
            }
        })
    }

    pub fn sample_filing() -> Filing {
        Filing::from_value(&sample_payload()).expect("sample payload must validate")
    }
}
