//! Gemini-powered narrator
//!
//! Serializes the deterministic context into the prompt, demands
//! JSON-only output, and parses the draft leniently: malformed finding
//! entries are skipped and confidences clamped rather than failing the
//! whole narration.

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::error::AuditError;
use crate::gemini::GeminiClient;
use crate::models::{Finding, Severity, TrendDirection, TrendInsight};
use crate::Result;

use super::{AnalysisContext, AuditContext, AuditDraft, Narrator, PerformanceDraft};

pub struct GeminiNarrator {
    client: GeminiClient,
}

const AUDIT_SYSTEM_PROMPT: &str = "You are a Form 990 auditor. Review the extraction summary and \
deterministic checks supplied in the prompt. Validate or adjust the findings, add any additional \
issues with mitigation guidance, and keep severity one of `Pass`, `Warning`, `Error` with a \
confidence between 0 and 1. Ground every statement in supplied data; do not invent financial \
figures. Return ONLY valid JSON, no explanation text.";

const ANALYSIS_SYSTEM_PROMPT: &str = "You are a nonprofit financial analyst. You receive \
multi-year filing data summarized into deterministic metrics (series, ratios, surplus, CAGR). \
Highlight performance trends, governance implications, and forward-looking risks. Focus on \
numeric trends: revenue growth, expense discipline, surplus stability, program-vs-admin mix, and \
fundraising efficiency. Only cite facts available in the provided series; do not invent figures. \
Return ONLY valid JSON, no explanation text.";

impl GeminiNarrator {
    pub fn new(api_key: String) -> Self {
        Self {
            client: GeminiClient::new(api_key),
        }
    }

    fn build_audit_prompt(context: &AuditContext) -> Result<String> {
        let context_json = serde_json::to_string_pretty(context)?;
        Ok(format!(
            r#"Review the filing context and deterministic findings below. Confirm or adjust
findings, add any additional issues, and supply overall notes.

CONTEXT:
{}

JSON format:

{{
  "findings": [
    {{
      "check_id": "...",
      "category": "...",
      "severity": "Pass|Warning|Error",
      "message": "...",
      "mitigation": "...",
      "confidence": 0.8
    }}
  ],
  "notes": "..."
}}
"#,
            context_json
        ))
    }

    fn build_analysis_prompt(context: &AnalysisContext) -> Result<String> {
        let context_json = serde_json::to_string_pretty(context)?;
        Ok(format!(
            r#"Analyze the multi-year financial context below. Quantify notable trends, call out
risks or strengths, and supply actionable recommendations with a balanced outlook.

CONTEXT:
{}

JSON format:

{{
  "insights": [
    {{
      "category": "...",
      "direction": "Improving|Declining|Stable|Volatile",
      "summary": "...",
      "confidence": 0.7
    }}
  ],
  "recommendations": ["..."],
  "outlook": "..."
}}
"#,
            context_json
        ))
    }
}

#[async_trait]
impl Narrator for GeminiNarrator {
    async fn narrate_audit(&self, context: &AuditContext) -> Result<AuditDraft> {
        let prompt = Self::build_audit_prompt(context)?;
        let (response, _confidence) = self.client.generate(AUDIT_SYSTEM_PROMPT, &prompt).await?;
        parse_audit_draft(&response)
    }

    async fn narrate_performance(&self, context: &AnalysisContext) -> Result<PerformanceDraft> {
        let prompt = Self::build_analysis_prompt(context)?;
        let (response, _confidence) = self
            .client
            .generate(ANALYSIS_SYSTEM_PROMPT, &prompt)
            .await?;
        parse_performance_draft(&response)
    }
}

//
// ================= Draft parsing =================
//

fn strip_fences(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

fn parse_severity(value: &str) -> Option<Severity> {
    match value.trim().to_lowercase().as_str() {
        "pass" => Some(Severity::Pass),
        "warning" => Some(Severity::Warning),
        "error" => Some(Severity::Error),
        _ => None,
    }
}

fn parse_direction(value: &str) -> Option<TrendDirection> {
    match value.trim().to_lowercase().as_str() {
        "improving" => Some(TrendDirection::Improving),
        "declining" => Some(TrendDirection::Declining),
        "stable" => Some(TrendDirection::Stable),
        "volatile" => Some(TrendDirection::Volatile),
        _ => None,
    }
}

fn clamped_confidence(entry: &Value, default: f64) -> f64 {
    entry
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(default)
        .clamp(0.0, 1.0)
}

/// One proposed finding; None when required fields are missing
fn parse_finding(entry: &Value) -> Option<Finding> {
    let check_id = entry.get("check_id")?.as_str()?.to_string();
    let category = entry.get("category")?.as_str()?.to_string();
    let severity = parse_severity(entry.get("severity")?.as_str()?)?;
    let message = entry.get("message")?.as_str()?.to_string();
    let mitigation = entry
        .get("mitigation")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(Finding {
        check_id,
        category,
        severity,
        message,
        mitigation,
        confidence: clamped_confidence(entry, 0.5),
    })
}

fn parse_audit_draft(response: &str) -> Result<AuditDraft> {
    let cleaned = strip_fences(response);

    let json: Value = serde_json::from_str(cleaned).map_err(|e| {
        AuditError::Llm(format!(
            "Failed to parse audit draft: {} | raw={}",
            e, response
        ))
    })?;

    let mut findings = Vec::new();
    if let Some(entries) = json.get("findings").and_then(Value::as_array) {
        for entry in entries {
            match parse_finding(entry) {
                Some(finding) => findings.push(finding),
                None => warn!("Skipping malformed finding in audit draft"),
            }
        }
    }

    Ok(AuditDraft {
        organization_name: json
            .get("organization_name")
            .and_then(Value::as_str)
            .map(str::to_string),
        organization_ein: json
            .get("organization_ein")
            .and_then(Value::as_str)
            .map(str::to_string),
        findings,
        notes: json.get("notes").and_then(Value::as_str).map(str::to_string),
    })
}

fn parse_performance_draft(response: &str) -> Result<PerformanceDraft> {
    let cleaned = strip_fences(response);

    let json: Value = serde_json::from_str(cleaned).map_err(|e| {
        AuditError::Llm(format!(
            "Failed to parse performance draft: {} | raw={}",
            e, response
        ))
    })?;

    let mut insights = Vec::new();
    if let Some(entries) = json.get("insights").and_then(Value::as_array) {
        for entry in entries {
            let category = entry.get("category").and_then(Value::as_str);
            let summary = entry.get("summary").and_then(Value::as_str);
            let (Some(category), Some(summary)) = (category, summary) else {
                warn!("Skipping malformed insight in performance draft");
                continue;
            };

            // an unknown direction keeps the insight, classified Stable
            let direction = entry
                .get("direction")
                .and_then(Value::as_str)
                .and_then(parse_direction)
                .unwrap_or(TrendDirection::Stable);

            insights.push(TrendInsight {
                category: category.to_string(),
                direction,
                summary: summary.to_string(),
                confidence: clamped_confidence(entry, 0.7),
            });
        }
    }

    let recommendations = json
        .get("recommendations")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    Ok(PerformanceDraft {
        insights,
        recommendations,
        outlook: json
            .get("outlook")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_audit_draft_with_fences() {
        let response = r#"```json
{
  "findings": [
    {
      "check_id": "revenue_totals",
      "category": "Revenue",
      "severity": "Warning",
      "message": "Totals reconcile but rely on a single contribution line.",
      "mitigation": "Break out major gifts.",
      "confidence": 1.7
    },
    {"check_id": "missing_everything"}
  ],
  "notes": "Concentrated revenue base."
}
```"#;

        let draft = parse_audit_draft(response).unwrap();
        // malformed second entry is dropped
        assert_eq!(draft.findings.len(), 1);
        assert_eq!(draft.findings[0].check_id, "revenue_totals");
        assert_eq!(draft.findings[0].severity, Severity::Warning);
        // out-of-range confidence clamped
        assert_eq!(draft.findings[0].confidence, 1.0);
        assert_eq!(draft.notes.as_deref(), Some("Concentrated revenue base."));
    }

    #[test]
    fn test_parse_audit_draft_rejects_non_json() {
        assert!(parse_audit_draft("the filing looks fine to me").is_err());
    }

    #[test]
    fn test_parse_performance_draft() {
        let response = r#"{
  "insights": [
    {"category": "Total Revenue", "direction": "Improving", "summary": "Revenue up 10%.", "confidence": 0.8},
    {"category": "Operating Surplus", "direction": "sideways", "summary": "Surplus flat."}
  ],
  "recommendations": ["Diversify revenue sources."],
  "outlook": "Stable with upside."
}"#;

        let draft = parse_performance_draft(response).unwrap();
        assert_eq!(draft.insights.len(), 2);
        assert_eq!(draft.insights[0].direction, TrendDirection::Improving);
        // unrecognized direction defaults to Stable
        assert_eq!(draft.insights[1].direction, TrendDirection::Stable);
        assert_eq!(draft.insights[1].confidence, 0.7);
        assert_eq!(draft.recommendations.len(), 1);
        assert_eq!(draft.outlook.as_deref(), Some("Stable with upside."));
    }

    #[test]
    fn test_severity_and_direction_parsing() {
        assert_eq!(parse_severity(" error "), Some(Severity::Error));
        assert_eq!(parse_severity("PASS"), Some(Severity::Pass));
        assert_eq!(parse_severity("critical"), None);
        assert_eq!(parse_direction("Volatile"), Some(TrendDirection::Volatile));
        assert_eq!(parse_direction("unknown"), None);
    }
}
