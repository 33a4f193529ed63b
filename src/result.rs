//! Verification result model.
//!
//! A `VerificationResult` is assembled once per verification attempt and
//! never mutated afterwards; the store only appends. Persisted field names
//! are camelCase to stay compatible with the legacy store format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checks::AutomatedCheckResult;

/// Terminal classification of one run.
///
/// `NeedsReview` is deliberately distinct from `Fail`: it covers parse
/// failures, exhausted retries, and low-confidence analysis, so downstream
/// tooling can treat "couldn't tell" differently from "definitely broken".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    NeedsReview,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Verdict::Pass => "pass",
            Verdict::Fail => "fail",
            Verdict::NeedsReview => "needs_review",
        };
        f.write_str(s)
    }
}

/// Judgment for one acceptance criterion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionResult {
    /// Copy of the feature's acceptance text at this index.
    pub criterion: String,
    pub index: usize,
    pub satisfied: bool,
    pub reasoning: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    /// Self-reported confidence in [0, 1].
    pub confidence: f64,
}

/// One complete verification attempt. Write-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub feature_id: String,
    pub timestamp: DateTime<Utc>,
    pub commit_hash: String,
    #[serde(default)]
    pub changed_files: Vec<String>,
    #[serde(default)]
    pub diff_summary: String,
    #[serde(default)]
    pub automated_checks: Vec<AutomatedCheckResult>,
    /// Always exactly one entry per acceptance criterion.
    #[serde(default)]
    pub criteria_results: Vec<CriterionResult>,
    pub verdict: Verdict,
    /// Agent name, or "tdd"/"none" when no agent judged the feature.
    pub verified_by: String,
    #[serde(default)]
    pub overall_reasoning: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub code_quality_notes: Vec<String>,
    #[serde(default)]
    pub related_files_analyzed: Vec<String>,
}

/// A `VerificationResult` tagged with its sequential run number, as
/// persisted under `ai/verification/<featureId>/<NNN>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_number: u32,
    #[serde(flatten)]
    pub result: VerificationResult,
}
