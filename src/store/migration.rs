//! Lazy migration of the legacy single-file store.
//!
//! Earlier tooling kept every feature's latest result in one
//! `results.json` object keyed by feature id. The migration rewrites each
//! embedded result as that feature's run `001`, builds the index from
//! scratch, and renames the original to `results.json.bak`. It triggers
//! on the first store operation that sees `results.json` without an
//! `index.json`; once `index.json` exists the migration is a no-op.

use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::StoreError;
use crate::result::{RunRecord, Verdict, VerificationResult};

use super::render::render_markdown;
use super::{FeatureIndex, FeatureIndexEntry};

/// Distinguishes "nothing to migrate" from "migration ran", including a
/// migration that salvaged zero features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// No legacy file, or the store is already indexed.
    NotNeeded,
    /// Migration ran; the count is the number of features successfully
    /// rewritten (failed features are logged and skipped).
    Migrated(usize),
}

/// Migrate a legacy store directory if the trigger condition holds.
///
/// A write failure for one feature is caught, logged, and skipped;
/// migration continues for the remaining features. Failure to write the
/// final index or to back up the legacy file does error out, since the
/// store would otherwise re-trigger migration over partial state.
pub fn migrate_legacy_store(store_dir: &Path) -> Result<MigrationOutcome, StoreError> {
    let legacy_path = store_dir.join("results.json");
    let index_path = store_dir.join("index.json");
    if !legacy_path.exists() || index_path.exists() {
        return Ok(MigrationOutcome::NotNeeded);
    }

    tracing::info!(path = %legacy_path.display(), "migrating legacy verification store");

    let raw = std::fs::read_to_string(&legacy_path).map_err(|source| StoreError::ReadFailed {
        path: legacy_path.clone(),
        source,
    })?;
    let legacy: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            path: legacy_path.clone(),
            source,
        })?;

    let mut index = FeatureIndex::default();
    let mut migrated = 0usize;

    for (feature_id, value) in legacy {
        match migrate_one(store_dir, &feature_id, value) {
            Ok(entry) => {
                index.features.insert(feature_id, entry);
                migrated += 1;
            }
            Err(e) => {
                tracing::warn!(
                    feature_id = %feature_id,
                    error = %e,
                    "skipping feature during legacy migration"
                );
            }
        }
    }

    let json = serde_json::to_string_pretty(&index).map_err(|source| {
        StoreError::SerializeFailed {
            feature_id: "index".to_string(),
            source,
        }
    })?;
    std::fs::write(&index_path, json).map_err(|source| StoreError::WriteFailed {
        path: index_path,
        source,
    })?;

    let backup_path = store_dir.join("results.json.bak");
    std::fs::rename(&legacy_path, &backup_path).map_err(|source| StoreError::BackupFailed {
        path: backup_path,
        source,
    })?;

    tracing::info!(migrated, "legacy store migration complete");
    Ok(MigrationOutcome::Migrated(migrated))
}

fn migrate_one(
    store_dir: &Path,
    feature_id: &str,
    value: serde_json::Value,
) -> Result<FeatureIndexEntry, StoreError> {
    let result: VerificationResult =
        serde_json::from_value(value).map_err(|source| StoreError::SerializeFailed {
            feature_id: feature_id.to_string(),
            source,
        })?;

    let feature_dir = store_dir.join(feature_id);
    std::fs::create_dir_all(&feature_dir).map_err(|source| StoreError::DirCreateFailed {
        path: feature_dir.clone(),
        source,
    })?;

    let record = RunRecord {
        run_number: 1,
        result,
    };

    let json_path = feature_dir.join("001.json");
    let json =
        serde_json::to_string_pretty(&record).map_err(|source| StoreError::SerializeFailed {
            feature_id: feature_id.to_string(),
            source,
        })?;
    std::fs::write(&json_path, json).map_err(|source| StoreError::WriteFailed {
        path: json_path,
        source,
    })?;

    let md_path = feature_dir.join("001.md");
    std::fs::write(&md_path, render_markdown(&record)).map_err(|source| {
        StoreError::WriteFailed {
            path: md_path,
            source,
        }
    })?;

    let mut entry = FeatureIndexEntry {
        feature_id: feature_id.to_string(),
        latest_run: 1,
        latest_timestamp: record.result.timestamp,
        latest_verdict: record.result.verdict,
        total_runs: 1,
        pass_count: 0,
        fail_count: 0,
    };
    match record.result.verdict {
        Verdict::Pass => entry.pass_count = 1,
        Verdict::Fail => entry.fail_count = 1,
        Verdict::NeedsReview => {}
    }
    Ok(entry)
}
