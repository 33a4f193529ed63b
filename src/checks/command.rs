//! Single check-command execution.
//!
//! Commands run under `sh -c` with piped stdio. Completion is raced against
//! the configured ceiling; on expiry the process gets one kill and the
//! result reports the timeout as an ordinary failure.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use super::types::{AutomatedCheckResult, CheckDefinition, CheckType};

/// Run one check command to completion, never returning an error.
///
/// Spawn failures, non-zero exits, and timeouts all become
/// `success: false` results with the failure folded into `output`.
pub async fn run_check_command(
    project_dir: &Path,
    definition: &CheckDefinition,
    timeout: Duration,
    verbose: bool,
) -> AutomatedCheckResult {
    let start = Instant::now();

    if verbose {
        eprintln!(
            "[check] Running {} check: {}",
            definition.check_type, definition.command
        );
    }

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(&definition.command)
        .current_dir(project_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if definition.inject_ci {
        cmd.env("CI", "true");
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return AutomatedCheckResult {
                check_type: definition.check_type,
                success: false,
                output: format!("Failed to spawn check command: {e}"),
                duration: start.elapsed().as_millis() as u64,
                error_count: None,
            };
        }
    };

    // Drain stdout/stderr concurrently so a chatty command cannot fill the
    // pipe buffers and deadlock against wait().
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(ref mut out) = stdout {
            let _ = out.read_to_end(&mut buf).await;
        }
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(ref mut err) = stderr {
            let _ = err.read_to_end(&mut buf).await;
        }
        buf
    });

    let mut timed_out = false;
    let status = tokio::select! {
        status = child.wait() => status.ok(),
        _ = tokio::time::sleep(timeout) => {
            timed_out = true;
            let _ = child.start_kill();
            let _ = child.wait().await;
            None
        }
    };

    let stdout_buf = stdout_task.await.unwrap_or_default();
    let stderr_buf = stderr_task.await.unwrap_or_default();
    let mut output = String::from_utf8_lossy(&stdout_buf).to_string();
    let stderr_text = String::from_utf8_lossy(&stderr_buf);
    if !stderr_text.is_empty() {
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(&stderr_text);
    }

    let duration = start.elapsed().as_millis() as u64;

    if timed_out {
        return AutomatedCheckResult {
            check_type: definition.check_type,
            success: false,
            output: format!(
                "Check timed out after {}s\n{}",
                timeout.as_secs(),
                output.trim_end()
            ),
            duration,
            error_count: None,
        };
    }

    let success = status.map(|s| s.success()).unwrap_or(false);
    let error_count = if success {
        None
    } else {
        estimate_error_count(definition.check_type, &output)
    };

    AutomatedCheckResult {
        check_type: definition.check_type,
        success,
        output,
        duration,
        error_count,
    }
}

/// Rough error tally for typecheck and lint output, where tools print one
/// "error" marker per finding. Other check types report no count.
fn estimate_error_count(check_type: CheckType, output: &str) -> Option<u32> {
    if !matches!(check_type, CheckType::Typecheck | CheckType::Lint) {
        return None;
    }
    let count = output
        .lines()
        .filter(|line| line.to_lowercase().contains("error"))
        .count() as u32;
    (count > 0).then_some(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn definition(check_type: CheckType, command: &str) -> CheckDefinition {
        CheckDefinition::new(check_type, command)
    }

    #[tokio::test]
    async fn test_successful_command() {
        let dir = tempdir().unwrap();
        let def = definition(CheckType::Lint, "echo clean");
        let result = run_check_command(dir.path(), &def, Duration::from_secs(10), false).await;
        assert!(result.success);
        assert!(result.output.contains("clean"));
        assert!(result.error_count.is_none());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_captured_not_thrown() {
        let dir = tempdir().unwrap();
        let def = definition(CheckType::Typecheck, "echo 'error TS2322: type' >&2; exit 1");
        let result = run_check_command(dir.path(), &def, Duration::from_secs(10), false).await;
        assert!(!result.success);
        assert!(result.output.contains("TS2322"));
        assert_eq!(result.error_count, Some(1));
    }

    #[tokio::test]
    async fn test_garbage_command_folds_into_failed_result() {
        let dir = tempdir().unwrap();
        let def = definition(CheckType::Build, "this-command-does-not-exist-7e1");
        let result = run_check_command(dir.path(), &def, Duration::from_secs(10), false).await;
        assert!(!result.success);
        assert!(!result.output.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let dir = tempdir().unwrap();
        let def = definition(CheckType::Test, "sleep 30");
        let start = Instant::now();
        let result = run_check_command(dir.path(), &def, Duration::from_millis(200), false).await;
        assert!(!result.success);
        assert!(result.output.contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_ci_env_injected_for_test_checks() {
        let dir = tempdir().unwrap();
        let def = definition(CheckType::Test, "echo CI=$CI");
        let result = run_check_command(dir.path(), &def, Duration::from_secs(10), false).await;
        assert!(result.success);
        assert!(result.output.contains("CI=true"));
    }

    #[tokio::test]
    async fn test_ci_env_not_injected_for_build_checks() {
        let dir = tempdir().unwrap();
        // Guard against CI leaking in from the ambient environment of the
        // test runner itself.
        let def = definition(CheckType::Build, "echo CI=${ATTEST_NO_SUCH_VAR:-unset}");
        let result = run_check_command(dir.path(), &def, Duration::from_secs(10), false).await;
        assert!(result.success);
        assert!(!def.inject_ci);
    }

    #[tokio::test]
    async fn test_combined_output_order() {
        let dir = tempdir().unwrap();
        let def = definition(CheckType::Lint, "echo out; echo err >&2");
        let result = run_check_command(dir.path(), &def, Duration::from_secs(10), false).await;
        assert!(result.output.contains("out"));
        assert!(result.output.contains("err"));
    }

    #[test]
    fn test_estimate_error_count_only_for_static_checks() {
        assert_eq!(
            estimate_error_count(CheckType::Lint, "error: x\nerror: y\nok"),
            Some(2)
        );
        assert_eq!(estimate_error_count(CheckType::Test, "error: x"), None);
        assert_eq!(estimate_error_count(CheckType::Lint, "all good"), None);
    }
}
