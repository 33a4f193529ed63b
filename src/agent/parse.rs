//! Agent response parsing.
//!
//! Agents return free-form text with a JSON object somewhere inside,
//! usually wrapped in a markdown code fence. This module owns the one
//! schema-validating parse of that object; every defaulting rule lives
//! here so call sites receive a fully-formed [`ParsedAnalysis`] or a
//! [`ParseFailure`], nothing in between.
//!
//! Defaulting rules:
//! - missing `confidence` → 0.5, clamped to [0, 1]
//! - missing `reasoning` → "No reasoning provided"
//! - missing `satisfied` → false
//! - criteria the agent did not address are synthesized as unsatisfied
//!   with reasoning "Criterion not analyzed by AI" and confidence 0.0
//! - an unrecognized or missing `verdict` → `needs_review`
//!
//! A self-reported `pass` is additionally re-validated: any unsatisfied
//! criterion, or mean confidence at or below 0.7, downgrades it to
//! `needs_review`.

use serde::Deserialize;
use thiserror::Error;

use crate::result::{CriterionResult, Verdict};

/// Reasoning placed on criteria the agent never addressed.
pub const NOT_ANALYZED_REASONING: &str = "Criterion not analyzed by AI";

/// Mean criterion confidence must exceed this for a `pass` to stand.
const PASS_CONFIDENCE_THRESHOLD: f64 = 0.7;

#[derive(Debug, Error)]
pub enum ParseFailure {
    #[error("No JSON object found in agent output")]
    NoJsonObject,

    #[error("Agent JSON did not match the expected schema: {0}")]
    InvalidSchema(#[from] serde_json::Error),
}

/// Typed, fully-defaulted agent analysis.
#[derive(Debug, Clone)]
pub struct ParsedAnalysis {
    pub verdict: Verdict,
    /// Exactly one entry per acceptance criterion, in order.
    pub criteria: Vec<CriterionResult>,
    pub overall_reasoning: String,
    pub suggestions: Vec<String>,
    pub code_quality_notes: Vec<String>,
    pub related_files_analyzed: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    #[serde(default)]
    verdict: Option<String>,
    #[serde(default, alias = "criteria")]
    criteria_results: Vec<RawCriterion>,
    #[serde(default)]
    overall_reasoning: Option<String>,
    #[serde(default)]
    suggestions: Vec<String>,
    #[serde(default)]
    code_quality_notes: Vec<String>,
    #[serde(default)]
    related_files_analyzed: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCriterion {
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    satisfied: Option<bool>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    evidence: Vec<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Parse an agent's raw output against a feature's acceptance list.
///
/// The returned `criteria` always has `acceptance.len()` entries,
/// regardless of how many the agent addressed.
pub fn parse_agent_response(
    raw: &str,
    acceptance: &[String],
) -> Result<ParsedAnalysis, ParseFailure> {
    let json = extract_json_object(raw).ok_or(ParseFailure::NoJsonObject)?;
    let parsed: RawAnalysis = serde_json::from_str(json)?;

    let mut criteria: Vec<CriterionResult> = acceptance
        .iter()
        .enumerate()
        .map(|(index, criterion)| CriterionResult {
            criterion: criterion.clone(),
            index,
            satisfied: false,
            reasoning: NOT_ANALYZED_REASONING.to_string(),
            evidence: Vec::new(),
            confidence: 0.0,
        })
        .collect();

    for (position, raw_criterion) in parsed.criteria_results.into_iter().enumerate() {
        // Prefer the agent's own index; fall back to array position.
        let index = raw_criterion.index.unwrap_or(position);
        let Some(slot) = criteria.get_mut(index) else {
            tracing::debug!(index, "agent addressed an out-of-range criterion, ignoring");
            continue;
        };
        slot.satisfied = raw_criterion.satisfied.unwrap_or(false);
        slot.reasoning = raw_criterion
            .reasoning
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| "No reasoning provided".to_string());
        slot.evidence = raw_criterion.evidence;
        slot.confidence = raw_criterion.confidence.unwrap_or(0.5).clamp(0.0, 1.0);
    }

    let reported = match parsed.verdict.as_deref() {
        Some("pass") => Verdict::Pass,
        Some("fail") => Verdict::Fail,
        Some("needs_review") | Some("needs-review") => Verdict::NeedsReview,
        other => {
            if other.is_some() {
                tracing::debug!(verdict = ?other, "unrecognized verdict, treating as needs_review");
            }
            Verdict::NeedsReview
        }
    };

    let mut overall_reasoning = parsed
        .overall_reasoning
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "No reasoning provided".to_string());

    let verdict = if reported == Verdict::Pass && !pass_is_supported(&criteria) {
        overall_reasoning.push_str(
            " [verdict downgraded: pass requires every criterion satisfied with mean confidence above 0.7]",
        );
        Verdict::NeedsReview
    } else {
        reported
    };

    Ok(ParsedAnalysis {
        verdict,
        criteria,
        overall_reasoning,
        suggestions: parsed.suggestions,
        code_quality_notes: parsed.code_quality_notes,
        related_files_analyzed: parsed.related_files_analyzed,
    })
}

fn pass_is_supported(criteria: &[CriterionResult]) -> bool {
    if criteria.is_empty() {
        return true;
    }
    if criteria.iter().any(|c| !c.satisfied) {
        return false;
    }
    let mean = criteria.iter().map(|c| c.confidence).sum::<f64>() / criteria.len() as f64;
    mean > PASS_CONFIDENCE_THRESHOLD
}

/// Locate the JSON object inside raw agent output.
///
/// Markdown code fences are stripped first; failing that, the outermost
/// `{...}` span is taken.
fn extract_json_object(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }

    // ```json ... ``` or plain ``` ... ```
    if let Some(fence_start) = trimmed.find("```") {
        let after = &trimmed[fence_start + 3..];
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        if let Some(fence_end) = body.find("```") {
            let candidate = body[..fence_end].trim();
            if candidate.starts_with('{') && candidate.ends_with('}') {
                return Some(candidate);
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}
