use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::agent::AgentDescriptor;

/// Per-operation timeout ceilings.
///
/// Each operation has its own named environment override; there is
/// deliberately no blanket "timeout" variable. Overrides are read exactly
/// once, when the config is constructed; core modules never touch the
/// environment themselves.
#[derive(Debug, Clone)]
pub struct TimeoutTable {
    /// Ceiling for one automated check command (default 5 minutes).
    pub check: Duration,
    /// Ceiling for one diff-based AI verification call (default 10 minutes).
    pub ai_verify: Duration,
    /// Ceiling for one autonomous exploration call. `None` means unbounded:
    /// the agent explores the repository at its own pace.
    pub autonomous: Option<Duration>,
}

impl Default for TimeoutTable {
    fn default() -> Self {
        Self {
            check: Duration::from_secs(300),
            ai_verify: Duration::from_secs(600),
            autonomous: None,
        }
    }
}

impl TimeoutTable {
    /// Build the table from the process environment.
    ///
    /// Recognized variables (all in whole seconds):
    /// - `ATTEST_CHECK_TIMEOUT_SECS`
    /// - `ATTEST_AI_TIMEOUT_SECS`
    /// - `ATTEST_AUTONOMOUS_TIMEOUT_SECS` (0 means unbounded)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            check: env_secs("ATTEST_CHECK_TIMEOUT_SECS").unwrap_or(defaults.check),
            ai_verify: env_secs("ATTEST_AI_TIMEOUT_SECS").unwrap_or(defaults.ai_verify),
            autonomous: match std::env::var("ATTEST_AUTONOMOUS_TIMEOUT_SECS") {
                Ok(v) => match v.parse::<u64>() {
                    Ok(0) => None,
                    Ok(secs) => Some(Duration::from_secs(secs)),
                    Err(_) => defaults.autonomous,
                },
                Err(_) => defaults.autonomous,
            },
        }
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Runtime configuration for the verifier.
///
/// Constructed once at process start and threaded through every
/// constructor. Immutable afterwards.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Project root; all check commands and agent processes run here, and
    /// the result store lives under `<project_dir>/ai/verification/`.
    pub project_dir: PathBuf,
    pub verbose: bool,
    pub timeouts: TimeoutTable,
    /// Known agents in preference order.
    pub agents: Vec<AgentDescriptor>,
}

impl VerifierConfig {
    pub fn new(project_dir: PathBuf, verbose: bool) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;

        Ok(Self {
            project_dir,
            verbose,
            timeouts: TimeoutTable::from_env(),
            agents: AgentDescriptor::default_roster(),
        })
    }

    /// Resolve an agent descriptor by name.
    pub fn agent(&self, name: &str) -> Option<&AgentDescriptor> {
        self.agents.iter().find(|a| a.name == name)
    }

    /// Names of all known agents, in preference order.
    pub fn agent_names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name.clone()).collect()
    }
}
