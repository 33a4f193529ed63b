//! Verification context acquisition.
//!
//! Git is a collaborator, not a dependency of correctness: when the
//! repository is missing or broken the provider degrades to placeholder
//! values and verification proceeds without diff context.

use std::path::Path;

use git2::{DiffFormat, DiffOptions, Repository};

/// Diff context handed to the AI prompt builder.
#[derive(Debug, Clone)]
pub struct GitDiffContext {
    pub diff: String,
    pub files: Vec<String>,
    pub commit_hash: String,
}

impl GitDiffContext {
    /// Placeholder values used whenever git is unavailable.
    pub fn unavailable() -> Self {
        Self {
            diff: "Unable to get git diff".to_string(),
            files: Vec::new(),
            commit_hash: "unknown".to_string(),
        }
    }
}

/// Supplies diff context for a working directory. Implementations must
/// degrade to [`GitDiffContext::unavailable`] instead of erroring.
pub trait GitContextProvider: Send + Sync {
    fn get_diff(&self, cwd: &Path) -> GitDiffContext;
}

/// libgit2-backed provider: HEAD commit hash plus the working-tree diff
/// against HEAD (untracked files included).
pub struct Git2Context;

impl GitContextProvider for Git2Context {
    fn get_diff(&self, cwd: &Path) -> GitDiffContext {
        match collect_diff(cwd) {
            Ok(context) => context,
            Err(e) => {
                tracing::debug!(error = %e, "git context unavailable, using placeholders");
                GitDiffContext::unavailable()
            }
        }
    }
}

fn collect_diff(cwd: &Path) -> Result<GitDiffContext, git2::Error> {
    let repo = Repository::open(cwd)?;

    let head_commit = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
    let commit_hash = head_commit
        .as_ref()
        .map(|c| c.id().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let head_tree = head_commit.and_then(|c| c.tree().ok());

    let mut opts = DiffOptions::new();
    opts.include_untracked(true);

    let diff = repo.diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut opts))?;

    let mut files = Vec::new();
    for delta in diff.deltas() {
        if let Some(path) = delta.new_file().path() {
            files.push(path.to_string_lossy().to_string());
        }
    }

    let mut patch = Vec::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        match line.origin() {
            '+' | '-' | ' ' => patch.push(line.origin() as u8),
            _ => {}
        }
        patch.extend_from_slice(line.content());
        true
    })?;

    Ok(GitDiffContext {
        diff: String::from_utf8_lossy(&patch).to_string(),
        files,
        commit_hash,
    })
}

/// Per-file content cap for prompt context.
const MAX_FILE_CHARS: usize = 20_000;
/// At most this many related files are read into the prompt.
const MAX_RELATED_FILES: usize = 10;

/// Read related file contents for the AI prompt.
///
/// Paths are resolved against the project root and rejected if they
/// escape it after canonicalization. Unreadable and missing files are
/// skipped silently. Returns (relative path, content) pairs.
pub fn read_related_files(root: &Path, paths: &[String]) -> Vec<(String, String)> {
    let Ok(canonical_root) = root.canonicalize() else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for path in paths.iter().take(MAX_RELATED_FILES) {
        let candidate = canonical_root.join(path);
        let Ok(resolved) = candidate.canonicalize() else {
            continue;
        };
        if !resolved.starts_with(&canonical_root) {
            tracing::warn!(path = %path, "rejecting path outside project root");
            continue;
        }
        let Ok(mut content) = std::fs::read_to_string(&resolved) else {
            continue;
        };
        if content.len() > MAX_FILE_CHARS {
            let mut cut = MAX_FILE_CHARS;
            while !content.is_char_boundary(cut) {
                cut -= 1;
            }
            content.truncate(cut);
            content.push_str("\n... [truncated]");
        }
        out.push((path.clone(), content));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_non_repo_degrades_to_placeholders() {
        let dir = tempdir().unwrap();
        let context = Git2Context.get_diff(dir.path());
        assert_eq!(context.commit_hash, "unknown");
        assert_eq!(context.diff, "Unable to get git diff");
        assert!(context.files.is_empty());
    }

    #[test]
    fn test_repo_with_changes_reports_files_and_hash() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "test").unwrap();
        config.set_str("user.email", "test@test.com").unwrap();
        drop(config);

        fs::write(dir.path().join("a.txt"), "one\n").unwrap();
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("test", "test@test.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[])
            .unwrap();
        drop(tree);
        drop(repo);

        fs::write(dir.path().join("a.txt"), "one\ntwo\n").unwrap();
        fs::write(dir.path().join("b.txt"), "new\n").unwrap();

        let context = Git2Context.get_diff(dir.path());
        assert_eq!(context.commit_hash.len(), 40);
        assert!(context.files.iter().any(|f| f.ends_with("a.txt")));
        assert!(context.files.iter().any(|f| f.ends_with("b.txt")));
        assert!(context.diff.contains("+two"));
    }

    #[test]
    fn test_unborn_repo_uses_unknown_hash() {
        let dir = tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        fs::write(dir.path().join("a.txt"), "x\n").unwrap();
        let context = Git2Context.get_diff(dir.path());
        assert_eq!(context.commit_hash, "unknown");
        assert!(context.files.iter().any(|f| f.ends_with("a.txt")));
    }

    #[test]
    fn test_read_related_files_skips_missing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("present.rs"), "fn main() {}").unwrap();
        let files = read_related_files(
            dir.path(),
            &["present.rs".to_string(), "missing.rs".to_string()],
        );
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0, "present.rs");
        assert!(files[0].1.contains("fn main"));
    }

    #[test]
    fn test_read_related_files_rejects_traversal() {
        let outer = tempdir().unwrap();
        let root = outer.path().join("project");
        fs::create_dir_all(&root).unwrap();
        fs::write(outer.path().join("secret.txt"), "secret").unwrap();

        let files = read_related_files(&root, &["../secret.txt".to_string()]);
        assert!(files.is_empty());
    }

    #[test]
    fn test_read_related_files_truncates_large_content() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("big.txt"), "x".repeat(MAX_FILE_CHARS * 2)).unwrap();
        let files = read_related_files(dir.path(), &["big.txt".to_string()]);
        assert_eq!(files.len(), 1);
        assert!(files[0].1.ends_with("[truncated]"));
        assert!(files[0].1.len() < MAX_FILE_CHARS + 100);
    }
}
