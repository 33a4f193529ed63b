//! Durable per-feature result store.
//!
//! Layout under the project root:
//!
//! ```text
//! ai/verification/
//!   index.json                  aggregate index across features
//!   <featureId>/
//!     001.json  001.md          one structured + one rendered file per run
//!     002.json  002.md
//! ```
//!
//! Runs are numbered contiguously from 001 per feature. A legacy
//! single-file format (`results.json`) is migrated lazily by the first
//! read or write that notices it; see [`migration`].

mod migration;
mod render;

pub use migration::{MigrationOutcome, migrate_legacy_store};
pub use render::render_markdown;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;
use crate::result::{RunRecord, Verdict, VerificationResult};

/// Store location relative to the project root.
pub const STORE_SUBDIR: &str = "ai/verification";

/// Aggregate index, one entry per feature, kept consistent with the run
/// records by incremental update on every save.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureIndex {
    #[serde(default)]
    pub features: BTreeMap<String, FeatureIndexEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureIndexEntry {
    pub feature_id: String,
    pub latest_run: u32,
    pub latest_timestamp: DateTime<Utc>,
    pub latest_verdict: Verdict,
    pub total_runs: u32,
    /// Verdict tallies; `needs_review` runs increment neither, so
    /// `pass_count + fail_count <= total_runs`.
    pub pass_count: u32,
    pub fail_count: u32,
}

impl FeatureIndexEntry {
    fn first(result: &VerificationResult, run_number: u32) -> Self {
        let mut entry = Self {
            feature_id: result.feature_id.clone(),
            latest_run: run_number,
            latest_timestamp: result.timestamp,
            latest_verdict: result.verdict,
            total_runs: 0,
            pass_count: 0,
            fail_count: 0,
        };
        entry.tally(result, run_number);
        entry
    }

    fn tally(&mut self, result: &VerificationResult, run_number: u32) {
        self.total_runs += 1;
        match result.verdict {
            Verdict::Pass => self.pass_count += 1,
            Verdict::Fail => self.fail_count += 1,
            Verdict::NeedsReview => {}
        }
        self.latest_run = run_number;
        self.latest_timestamp = result.timestamp;
        self.latest_verdict = result.verdict;
    }
}

/// File-backed result store rooted at a project directory.
///
/// `save` is an unsynchronized read-modify-write of the run listing and
/// the index: the design assumes a single writer per feature at a time.
/// Two concurrent saves for the same feature can compute the same run
/// number and silently overwrite each other.
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn store_dir(&self) -> PathBuf {
        self.root.join(STORE_SUBDIR)
    }

    fn index_path(&self) -> PathBuf {
        self.store_dir().join("index.json")
    }

    fn feature_dir(&self, feature_id: &str) -> PathBuf {
        self.store_dir().join(feature_id)
    }

    /// Persist one verification attempt as the feature's next run.
    ///
    /// Writes `<NNN>.json` and `<NNN>.md` under the same number, then
    /// updates the index. Returns the tagged record.
    pub fn save(&self, result: &VerificationResult) -> Result<RunRecord, StoreError> {
        self.migrate_if_needed()?;

        let feature_dir = self.feature_dir(&result.feature_id);
        std::fs::create_dir_all(&feature_dir).map_err(|source| StoreError::DirCreateFailed {
            path: feature_dir.clone(),
            source,
        })?;

        let run_number = next_run_number(&feature_dir);
        let record = RunRecord {
            run_number,
            result: result.clone(),
        };

        let json_path = feature_dir.join(format!("{run_number:03}.json"));
        let json = serde_json::to_string_pretty(&record).map_err(|source| {
            StoreError::SerializeFailed {
                feature_id: result.feature_id.clone(),
                source,
            }
        })?;
        std::fs::write(&json_path, json).map_err(|source| StoreError::WriteFailed {
            path: json_path,
            source,
        })?;

        let md_path = feature_dir.join(format!("{run_number:03}.md"));
        std::fs::write(&md_path, render_markdown(&record)).map_err(|source| {
            StoreError::WriteFailed {
                path: md_path,
                source,
            }
        })?;

        let mut index = self.read_index_or_default()?;
        match index.features.get_mut(&result.feature_id) {
            Some(entry) => entry.tally(result, run_number),
            None => {
                index.features.insert(
                    result.feature_id.clone(),
                    FeatureIndexEntry::first(result, run_number),
                );
            }
        }
        self.write_index(&index)?;

        tracing::info!(
            feature_id = %result.feature_id,
            run_number,
            verdict = %result.verdict,
            "saved verification run"
        );
        Ok(record)
    }

    /// Load the aggregate index, migrating a legacy store first if present.
    pub fn load_index(&self) -> Result<FeatureIndex, StoreError> {
        self.migrate_if_needed()?;
        self.read_index_or_default()
    }

    /// All runs for a feature in run-number order. Corrupt run files are
    /// skipped with a warning rather than failing the whole history.
    pub fn get_history(&self, feature_id: &str) -> Result<Vec<RunRecord>, StoreError> {
        self.migrate_if_needed()?;

        let feature_dir = self.feature_dir(feature_id);
        if !feature_dir.exists() {
            return Ok(Vec::new());
        }

        // Sort by the parsed run number, not the path: a lexical sort puts
        // 1000.json before 999.json.
        let mut paths: Vec<(u32, PathBuf)> = std::fs::read_dir(&feature_dir)
            .map_err(|source| StoreError::ReadFailed {
                path: feature_dir.clone(),
                source,
            })?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension()? != "json" {
                    return None;
                }
                let run = path.file_stem()?.to_str()?.parse::<u32>().ok()?;
                Some((run, path))
            })
            .collect();
        paths.sort_by_key(|(run, _)| *run);

        let mut records = Vec::with_capacity(paths.len());
        for (_, path) in paths {
            let raw = std::fs::read_to_string(&path).map_err(|source| StoreError::ReadFailed {
                path: path.clone(),
                source,
            })?;
            match serde_json::from_str::<RunRecord>(&raw) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping corrupt run file");
                }
            }
        }
        Ok(records)
    }

    /// The index entry for one feature, if it has any recorded runs.
    pub fn get_summary(&self, feature_id: &str) -> Result<Option<FeatureIndexEntry>, StoreError> {
        Ok(self.load_index()?.features.get(feature_id).cloned())
    }

    /// Run the lazy legacy migration against this store's directory.
    pub fn migrate_if_needed(&self) -> Result<MigrationOutcome, StoreError> {
        migrate_legacy_store(&self.store_dir())
    }

    fn read_index_or_default(&self) -> Result<FeatureIndex, StoreError> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(FeatureIndex::default());
        }
        let raw = std::fs::read_to_string(&path).map_err(|source| StoreError::ReadFailed {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt { path, source })
    }

    fn write_index(&self, index: &FeatureIndex) -> Result<(), StoreError> {
        let path = self.index_path();
        let json =
            serde_json::to_string_pretty(index).map_err(|source| StoreError::SerializeFailed {
                feature_id: "index".to_string(),
                source,
            })?;
        std::fs::write(&path, json).map_err(|source| StoreError::WriteFailed { path, source })
    }
}

/// Next run number for a feature directory: `max(existing) + 1`, or 1 when
/// no run files exist.
fn next_run_number(feature_dir: &Path) -> u32 {
    let Ok(entries) = std::fs::read_dir(feature_dir) else {
        return 1;
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let path = entry.path();
            if path.extension()? != "json" {
                return None;
            }
            path.file_stem()?.to_str()?.parse::<u32>().ok()
        })
        .max()
        .map(|max| max + 1)
        .unwrap_or(1)
}
