//! Prompt assembly for AI verification.
//!
//! Both builders end with the same response contract: a single JSON
//! object the parser in `agent::parse` knows how to read.

use crate::checks::AutomatedCheckResult;
use crate::feature::Feature;

use super::context::GitDiffContext;

const RESPONSE_CONTRACT: &str = r#"Respond with a single JSON object (no surrounding prose) of this shape:
{
  "verdict": "pass" | "fail" | "needs_review",
  "criteriaResults": [
    {"index": <criterion index>, "satisfied": true|false, "reasoning": "...", "evidence": ["..."], "confidence": 0.0-1.0}
  ],
  "overallReasoning": "...",
  "suggestions": ["..."],
  "codeQualityNotes": ["..."],
  "relatedFilesAnalyzed": ["..."]
}
Only report "pass" when every criterion is satisfied with confidence above 0.7."#;

/// Prompt for diff-based verification: the agent judges a precomputed
/// change set against the feature's acceptance criteria.
pub fn build_diff_prompt(
    feature: &Feature,
    git: &GitDiffContext,
    checks: &[AutomatedCheckResult],
    related_files: &[(String, String)],
) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "You are verifying whether feature \"{}\" satisfies its acceptance criteria.\n\n\
         ## Feature\n{}\n\n## Acceptance criteria\n{}\n",
        feature.id,
        feature.description,
        format_criteria(feature),
    ));

    prompt.push_str(&format!(
        "\n## Automated checks\n{}\n\n## Changed files (commit {})\n{}\n\n## Diff\n```diff\n{}\n```\n",
        summarize_checks(checks),
        git.commit_hash,
        if git.files.is_empty() {
            "(none)".to_string()
        } else {
            git.files.join("\n")
        },
        git.diff,
    ));

    if !related_files.is_empty() {
        prompt.push_str("\n## Related file contents\n");
        for (path, content) in related_files {
            prompt.push_str(&format!("\n### {path}\n```\n{content}\n```\n"));
        }
    }

    prompt.push('\n');
    prompt.push_str(RESPONSE_CONTRACT);
    prompt
}

/// Prompt for autonomous verification: no diff is supplied; the agent
/// explores the repository itself.
pub fn build_autonomous_prompt(feature: &Feature, checks: &[AutomatedCheckResult]) -> String {
    format!(
        "You are verifying whether feature \"{}\" is correctly implemented in the repository \
         you are currently in. Explore the codebase yourself: read the relevant source files, \
         tests, and configuration before judging.\n\n\
         ## Feature\n{}\n\n## Acceptance criteria\n{}\n\n## Automated checks\n{}\n\n{}",
        feature.id,
        feature.description,
        format_criteria(feature),
        summarize_checks(checks),
        RESPONSE_CONTRACT,
    )
}

fn format_criteria(feature: &Feature) -> String {
    if feature.acceptance.is_empty() {
        return "(no acceptance criteria declared)".to_string();
    }
    feature
        .acceptance
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{i}. {c}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One line per check with pass/fail and the tail of failing output.
pub fn summarize_checks(checks: &[AutomatedCheckResult]) -> String {
    if checks.is_empty() {
        return "(no automated checks were run)".to_string();
    }
    checks
        .iter()
        .map(|check| {
            if check.success {
                format!("- {}: passed ({}ms)", check.check_type, check.duration)
            } else {
                let tail: String = check
                    .output
                    .lines()
                    .rev()
                    .take(5)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect::<Vec<_>>()
                    .join(" | ");
                format!("- {}: FAILED: {}", check.check_type, tail)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
