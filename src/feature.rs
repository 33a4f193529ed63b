//! Feature definitions consumed by the verifier.
//!
//! Features are owned by external tooling and read from a JSON file; this
//! crate never mutates them. Field names are camelCase on disk because the
//! files are shared with the wider toolchain.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::VerifyError;

/// A unit of work with an ordered list of acceptance criteria.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub module: Option<String>,
    /// Ordered acceptance-criteria statements. The verifier always produces
    /// exactly one `CriterionResult` per entry.
    #[serde(default)]
    pub acceptance: Vec<String>,
    #[serde(default)]
    pub test_requirements: Option<TestRequirements>,
    /// Explicit test selection pattern, when the feature declares one.
    #[serde(default)]
    pub test_pattern: Option<String>,
    /// Tags used to select E2E scenarios for this feature.
    #[serde(default)]
    pub e2e_tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRequirements {
    #[serde(default)]
    pub unit: TestRequirement,
    #[serde(default)]
    pub e2e: TestRequirement,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRequirement {
    #[serde(default)]
    pub required: bool,
}

impl Feature {
    /// Whether this feature declares deterministic test requirements,
    /// which selects TDD-only verification over AI analysis.
    pub fn requires_tdd(&self) -> bool {
        self.test_requirements
            .as_ref()
            .map(|t| t.unit.required || t.e2e.required)
            .unwrap_or(false)
    }
}

/// Load the features file and find one feature by id.
pub fn load_feature(path: &Path, id: &str) -> Result<Feature, VerifyError> {
    let features = load_features(path)?;
    features
        .into_iter()
        .find(|f| f.id == id)
        .ok_or_else(|| VerifyError::FeatureNotFound { id: id.to_string() })
}

/// Load all features from a JSON array file.
pub fn load_features(path: &Path) -> Result<Vec<Feature>, VerifyError> {
    let raw = std::fs::read_to_string(path).map_err(|source| VerifyError::FeaturesReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| VerifyError::FeaturesInvalid {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn sample_json() -> &'static str {
        r#"[
            {
                "id": "auth-01",
                "description": "Login with email and password",
                "module": "auth",
                "acceptance": ["User can log in", "Invalid password rejected"],
                "testRequirements": {"unit": {"required": true}, "e2e": {"required": false}}
            },
            {
                "id": "ui-02",
                "description": "Dark mode toggle",
                "acceptance": ["Toggle persists across reloads"]
            }
        ]"#
    }

    #[test]
    fn test_load_features_parses_camel_case() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("features.json");
        fs::write(&path, sample_json()).unwrap();

        let features = load_features(&path).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].id, "auth-01");
        assert_eq!(features[0].acceptance.len(), 2);
        assert!(features[0].requires_tdd());
        assert!(!features[1].requires_tdd());
        assert!(features[1].test_requirements.is_none());
    }

    #[test]
    fn test_load_feature_by_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("features.json");
        fs::write(&path, sample_json()).unwrap();

        let feature = load_feature(&path, "ui-02").unwrap();
        assert_eq!(feature.description, "Dark mode toggle");

        let missing = load_feature(&path, "nope");
        assert!(matches!(missing, Err(VerifyError::FeatureNotFound { .. })));
    }

    #[test]
    fn test_requires_tdd_when_e2e_required_only() {
        let feature = Feature {
            id: "f".into(),
            description: "d".into(),
            module: None,
            acceptance: vec![],
            test_requirements: Some(TestRequirements {
                unit: TestRequirement { required: false },
                e2e: TestRequirement { required: true },
            }),
            test_pattern: None,
            e2e_tags: vec![],
        };
        assert!(feature.requires_tdd());
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("features.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            load_features(&path),
            Err(VerifyError::FeaturesInvalid { .. })
        ));
    }
}
