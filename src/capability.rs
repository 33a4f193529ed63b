//! Resolved project capabilities.
//!
//! Capability *detection* lives in external tooling; this crate consumes an
//! already-resolved `Capabilities` value, usually loaded from a JSON file.
//! Every enabled check comes with a fully-formed shell command.

use serde::{Deserialize, Serialize};
use std::path::Path;

use anyhow::{Context, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    #[serde(default)]
    pub has_tests: bool,
    #[serde(default)]
    pub test_command: Option<String>,
    #[serde(default)]
    pub has_type_check: bool,
    #[serde(default)]
    pub type_check_command: Option<String>,
    #[serde(default)]
    pub has_lint: bool,
    #[serde(default)]
    pub lint_command: Option<String>,
    #[serde(default)]
    pub has_build: bool,
    #[serde(default)]
    pub build_command: Option<String>,
    #[serde(default)]
    pub e2e_info: E2eInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct E2eInfo {
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub framework: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    /// Template with a `{tags}` placeholder for tag-filtered runs.
    #[serde(default)]
    pub grep_template: Option<String>,
}

impl E2eInfo {
    /// Resolve the E2E command for a tag-filtered run, falling back to the
    /// plain command when no template or tags are given.
    pub fn command_for_tags(&self, tags: &[String]) -> Option<String> {
        if tags.is_empty() {
            return self.command.clone();
        }
        match &self.grep_template {
            Some(template) => Some(template.replace("{tags}", &tags.join("|"))),
            None => self.command.clone(),
        }
    }
}

/// Load a capabilities file produced by the detection tooling.
pub fn load_capabilities(path: &Path) -> Result<Capabilities> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read capabilities file at {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid capabilities file at {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_capabilities() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("capabilities.json");
        fs::write(
            &path,
            r#"{
                "hasTests": true,
                "testCommand": "npm test",
                "hasLint": true,
                "lintCommand": "npm run lint",
                "e2eInfo": {"available": true, "framework": "playwright", "command": "npx playwright test", "grepTemplate": "npx playwright test --grep \"{tags}\""}
            }"#,
        )
        .unwrap();

        let caps = load_capabilities(&path).unwrap();
        assert!(caps.has_tests);
        assert_eq!(caps.test_command.as_deref(), Some("npm test"));
        assert!(!caps.has_build);
        assert!(caps.e2e_info.available);
    }

    #[test]
    fn test_command_for_tags_uses_template() {
        let info = E2eInfo {
            available: true,
            framework: None,
            command: Some("npx playwright test".into()),
            grep_template: Some("npx playwright test --grep \"{tags}\"".into()),
        };
        assert_eq!(
            info.command_for_tags(&["@auth".into(), "@smoke".into()]).unwrap(),
            "npx playwright test --grep \"@auth|@smoke\""
        );
        // No tags falls back to the plain command
        assert_eq!(
            info.command_for_tags(&[]).unwrap(),
            "npx playwright test"
        );
    }

    #[test]
    fn test_command_for_tags_without_template() {
        let info = E2eInfo {
            available: true,
            framework: None,
            command: Some("npm run e2e".into()),
            grep_template: None,
        };
        assert_eq!(info.command_for_tags(&["@x".into()]).unwrap(), "npm run e2e");
    }
}
