//! The filing data model
//!
//! One organization's one-fiscal-year structured disclosure, as produced by
//! the document-extraction collaborator. Validated at construction and
//! immutable afterwards; every check is a pure function of this type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::io::Write;

pub mod normalize;

//
// ================= Organization =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationProfile {
    pub ein: String,
    pub legal_name: String,
    pub phone_number: String,
    pub website_url: String,
    pub return_type: String,
    pub amended_return: String,
    pub group_exemption_number: String,
    pub subsection_code: String,
    pub ruling_date: String,
    pub accounting_method: String,
    pub organization_type: String,
    pub year_of_formation: String,
    pub incorporation_state: String,
    /// Fiscal year of the filing when the extractor supplies one; last
    /// resort of year resolution for multi-year batches
    #[serde(default)]
    pub calendar_year: Option<i32>,
}

//
// ================= Revenue =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueBreakdown {
    pub total_revenue: f64,
    pub contributions_gifts_grants: f64,
    pub program_service_revenue: f64,
    pub membership_dues: f64,
    pub investment_income: f64,
    pub gains_losses_sales_assets: f64,
    pub rental_income: f64,
    pub related_organizations_revenue: f64,
    pub gaming_revenue: f64,
    pub other_revenue: f64,
    pub government_grants: f64,
    pub foreign_contributions: f64,
}

impl RevenueBreakdown {
    /// Sum of every revenue category excluding the reported total
    pub fn category_sum(&self) -> f64 {
        self.contributions_gifts_grants
            + self.program_service_revenue
            + self.membership_dues
            + self.investment_income
            + self.gains_losses_sales_assets
            + self.rental_income
            + self.related_organizations_revenue
            + self.gaming_revenue
            + self.other_revenue
            + self.government_grants
            + self.foreign_contributions
    }
}

//
// ================= Expenses =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpensesBreakdown {
    pub total_expenses: f64,
    pub program_services_expenses: f64,
    pub management_general_expenses: f64,
    pub fundraising_expenses: f64,
    pub grants_us_organizations: f64,
    pub grants_us_individuals: f64,
    pub grants_foreign_organizations: f64,
    pub grants_foreign_individuals: f64,
    pub compensation_officers: f64,
    pub compensation_other_staff: f64,
    pub payroll_taxes_benefits: f64,
    pub professional_fees: f64,
    pub office_occupancy_costs: f64,
    pub information_technology_costs: f64,
    pub travel_conference_expenses: f64,
    pub depreciation_amortization: f64,
    pub insurance: f64,
}

impl ExpensesBreakdown {
    /// Sum of the three functional categories reconciled against the total
    pub fn functional_sum(&self) -> f64 {
        self.program_services_expenses
            + self.management_general_expenses
            + self.fundraising_expenses
    }
}

//
// ================= Personnel & Governance =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Officer {
    pub name: String,
    pub title_position: String,
    #[serde(default)]
    pub average_hours_per_week: Option<f64>,
    pub related_party_transactions: String,
    pub former_officer: String,
    pub governance_role: String,
}

/// Policy flags are free text rather than booleans; the source forms report
/// them inconsistently ("Yes", "No", "X", blank)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceDisclosure {
    pub governing_body_size: f64,
    pub independent_members: f64,
    pub financial_statements_reviewed: String,
    pub form_990_provided_to_governing_body: String,
    pub conflict_of_interest_policy: String,
    pub whistleblower_policy: String,
    pub document_retention_policy: String,
    pub ceo_compensation_review_process: String,
    pub public_disclosure_practices: String,
}

//
// ================= Programs & Operations =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramAccomplishment {
    pub program_name: String,
    pub program_description: String,
    pub expenses: f64,
    pub grants: f64,
    pub revenue_generated: f64,
    pub quantitative_outputs: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundraisingActivity {
    pub total_fundraising_event_revenue: f64,
    pub total_fundraising_event_expenses: f64,
    pub professional_fundraiser_fees: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationalData {
    pub number_of_employees: f64,
    pub number_of_volunteers: f64,
    pub occupancy_costs: f64,
    pub fundraising_method_descriptions: String,
    pub joint_ventures_disregarded_entities: String,
}

//
// ================= Compensation, Lobbying, Investments, Compliance =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationDetail {
    pub base_compensation: f64,
    pub bonus: f64,
    pub incentive: f64,
    pub other: f64,
    pub non_fixed_compensation: String,
    pub first_class_travel: String,
    pub housing_allowance: String,
    pub expense_account_usage: String,
    pub supplemental_retirement: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbyingActivity {
    pub lobbying_expenditures_direct: f64,
    pub lobbying_expenditures_grassroots: f64,
    pub election_501h_status: String,
    pub political_campaign_expenditures: f64,
    pub related_organizations_affiliates: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentDetail {
    pub investment_types: String,
    pub donor_restricted_endowment_values: f64,
    pub net_appreciation_depreciation: f64,
    pub related_organization_transactions: String,
    pub loans_to_from_related_parties: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxCompliance {
    pub penalties_excise_taxes_reported: String,
    pub unrelated_business_income_disclosure: String,
    pub foreign_bank_account_reporting: String,
    pub schedule_o_narrative_explanations: String,
}

//
// ================= Filing =================
//

/// One fiscal year's extracted filing. Field names are bound to the
/// extraction wire format via serde renames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filing {
    #[serde(rename = "core_organization_metadata")]
    pub organization: OrganizationProfile,
    #[serde(rename = "revenue_breakdown")]
    pub revenue: RevenueBreakdown,
    #[serde(rename = "expenses_breakdown")]
    pub expenses: ExpensesBreakdown,
    pub balance_sheet: Map<String, Value>,
    #[serde(rename = "officers_directors_trustees_key_employees")]
    pub officers: Vec<Officer>,
    #[serde(rename = "governance_management_disclosure")]
    pub governance: GovernanceDisclosure,
    #[serde(rename = "program_service_accomplishments")]
    pub programs: Vec<ProgramAccomplishment>,
    #[serde(rename = "fundraising_grantmaking")]
    pub fundraising: FundraisingActivity,
    #[serde(rename = "functional_operational_data")]
    pub operations: OperationalData,
    #[serde(rename = "compensation_details")]
    pub compensation: CompensationDetail,
    #[serde(rename = "political_lobbying_activities")]
    pub lobbying: LobbyingActivity,
    #[serde(rename = "investments_endowment")]
    pub investments: InvestmentDetail,
    #[serde(rename = "tax_compliance_penalties")]
    pub tax_compliance: TaxCompliance,
}

impl Filing {
    /// SHA256 fingerprint of the validated filing, used to tie reports
    /// back to their exact input. Streams JSON directly into the hasher.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();

        if serde_json::to_writer(&mut HashWriter(&mut hasher), self).is_err() {
            return String::new();
        }

        hex::encode(hasher.finalize())
    }
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
