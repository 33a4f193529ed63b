//! Human-readable rendering of a run record, written beside the
//! structured JSON as `<NNN>.md`.

use crate::result::RunRecord;

pub fn render_markdown(record: &RunRecord) -> String {
    let result = &record.result;
    let mut out = String::new();

    out.push_str(&format!(
        "# Verification Run {:03}: {}\n\n",
        record.run_number, result.feature_id
    ));
    out.push_str(&format!("- **Verdict**: {}\n", result.verdict));
    out.push_str(&format!("- **Verified by**: {}\n", result.verified_by));
    out.push_str(&format!(
        "- **Timestamp**: {}\n",
        result.timestamp.to_rfc3339()
    ));
    out.push_str(&format!("- **Commit**: {}\n", result.commit_hash));
    if !result.changed_files.is_empty() {
        out.push_str(&format!(
            "- **Changed files**: {}\n",
            result.changed_files.join(", ")
        ));
    }
    out.push('\n');

    if !result.automated_checks.is_empty() {
        out.push_str("## Automated checks\n\n");
        out.push_str("| Check | Result | Duration |\n|---|---|---|\n");
        for check in &result.automated_checks {
            out.push_str(&format!(
                "| {} | {} | {}ms |\n",
                check.check_type,
                if check.success { "pass" } else { "fail" },
                check.duration
            ));
        }
        out.push('\n');
    }

    if !result.criteria_results.is_empty() {
        out.push_str("## Acceptance criteria\n\n");
        for criterion in &result.criteria_results {
            out.push_str(&format!(
                "{}. {} **{}** (confidence {:.2})\n   {}\n",
                criterion.index + 1,
                if criterion.satisfied { "[x]" } else { "[ ]" },
                criterion.criterion,
                criterion.confidence,
                criterion.reasoning
            ));
            for evidence in &criterion.evidence {
                out.push_str(&format!("   - {evidence}\n"));
            }
        }
        out.push('\n');
    }

    if !result.overall_reasoning.is_empty() {
        out.push_str("## Reasoning\n\n");
        out.push_str(&result.overall_reasoning);
        out.push_str("\n\n");
    }

    if !result.suggestions.is_empty() {
        out.push_str("## Suggestions\n\n");
        for suggestion in &result.suggestions {
            out.push_str(&format!("- {suggestion}\n"));
        }
        out.push('\n');
    }

    if !result.code_quality_notes.is_empty() {
        out.push_str("## Code quality notes\n\n");
        for note in &result.code_quality_notes {
            out.push_str(&format!("- {note}\n"));
        }
        out.push('\n');
    }

    out
}
