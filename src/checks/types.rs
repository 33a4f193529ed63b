use serde::{Deserialize, Serialize};

/// The kind of automated check a result belongs to.
///
/// The order of the variants is the canonical execution order in
/// sequential mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckType {
    Test,
    Typecheck,
    Lint,
    Build,
    E2e,
    InitScript,
}

impl CheckType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckType::Test => "test",
            CheckType::Typecheck => "typecheck",
            CheckType::Lint => "lint",
            CheckType::Build => "build",
            CheckType::E2e => "e2e",
            CheckType::InitScript => "init-script",
        }
    }
}

impl std::fmt::Display for CheckType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one automated check. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomatedCheckResult {
    #[serde(rename = "type")]
    pub check_type: CheckType,
    pub success: bool,
    /// Combined stdout and stderr of the check command.
    pub output: String,
    /// Wall-clock duration in milliseconds.
    pub duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_count: Option<u32>,
}

impl AutomatedCheckResult {
    /// Synthesize a result for a check that was never executed.
    pub fn skipped(check_type: CheckType, reason: &str) -> Self {
        Self {
            check_type,
            success: false,
            output: reason.to_string(),
            duration: 0,
            error_count: None,
        }
    }
}

/// How the unit-test check should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TestMode {
    /// Run the full test command.
    #[default]
    Full,
    /// Run the externally supplied selective command, falling back to the
    /// full command if none was supplied.
    Quick,
    /// Omit the test check entirely.
    Skip,
}

/// How E2E scenarios are selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum E2eMode {
    /// Run the full E2E command.
    #[default]
    Full,
    /// Run only scenarios tagged `@smoke`.
    Smoke,
    /// Run scenarios matching the feature's tags.
    Tags,
}

/// Options for one scheduler invocation.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub test_mode: TestMode,
    /// Pre-resolved selective test command for quick mode, supplied by the
    /// external test-pattern collaborator.
    pub selective_test_command: Option<String>,
    pub skip_e2e: bool,
    pub e2e_mode: E2eMode,
    /// Feature tags, used when `e2e_mode` is `Tags`.
    pub e2e_tags: Vec<String>,
    /// Fan out non-E2E checks concurrently.
    pub parallel: bool,
}

/// One check ready to execute: a type, a shell command, and whether the
/// subprocess needs `CI=true` (test frameworks otherwise default to
/// interactive/watch mode).
#[derive(Debug, Clone, PartialEq)]
pub struct CheckDefinition {
    pub check_type: CheckType,
    pub command: String,
    pub inject_ci: bool,
}

impl CheckDefinition {
    pub fn new(check_type: CheckType, command: impl Into<String>) -> Self {
        let inject_ci = matches!(check_type, CheckType::Test | CheckType::E2e);
        Self {
            check_type,
            command: command.into(),
            inject_ci,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_type_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&CheckType::Typecheck).unwrap(),
            "\"typecheck\""
        );
        assert_eq!(
            serde_json::to_string(&CheckType::InitScript).unwrap(),
            "\"init-script\""
        );
        let parsed: CheckType = serde_json::from_str("\"e2e\"").unwrap();
        assert_eq!(parsed, CheckType::E2e);
    }

    #[test]
    fn test_check_type_ordering_matches_execution_order() {
        let mut types = vec![
            CheckType::E2e,
            CheckType::Build,
            CheckType::Test,
            CheckType::Lint,
            CheckType::Typecheck,
        ];
        types.sort();
        assert_eq!(
            types,
            vec![
                CheckType::Test,
                CheckType::Typecheck,
                CheckType::Lint,
                CheckType::Build,
                CheckType::E2e,
            ]
        );
    }

    #[test]
    fn test_result_serializes_type_field() {
        let result = AutomatedCheckResult {
            check_type: CheckType::Lint,
            success: false,
            output: "3 problems".into(),
            duration: 1200,
            error_count: Some(3),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "lint");
        assert_eq!(json["errorCount"], 3);
        assert_eq!(json["duration"], 1200);
    }

    #[test]
    fn test_ci_injected_only_for_test_and_e2e() {
        assert!(CheckDefinition::new(CheckType::Test, "npm test").inject_ci);
        assert!(CheckDefinition::new(CheckType::E2e, "npx playwright test").inject_ci);
        assert!(!CheckDefinition::new(CheckType::Lint, "npm run lint").inject_ci);
        assert!(!CheckDefinition::new(CheckType::Build, "npm run build").inject_ci);
        assert!(!CheckDefinition::new(CheckType::Typecheck, "tsc --noEmit").inject_ci);
    }

    #[test]
    fn test_skipped_result_shape() {
        let result = AutomatedCheckResult::skipped(CheckType::E2e, "Skipped: unit tests failed");
        assert!(!result.success);
        assert_eq!(result.output, "Skipped: unit tests failed");
        assert_eq!(result.duration, 0);
    }
}
