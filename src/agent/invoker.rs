//! Agent process invocation.
//!
//! One invocation spawns the agent's argv, feeds it the prompt (stdin or
//! trailing argument), and races delivery-plus-completion against a
//! timeout. On expiry
//! the child gets a single kill; there is no second, more forceful
//! termination step. Invocation failures resolve as data on
//! [`AgentInvocation`], never as panics, so the retry layer can classify
//! them.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// Static description of one known agent.
#[derive(Debug, Clone)]
pub struct AgentDescriptor {
    pub name: String,
    /// Argv template; element 0 is the executable.
    pub command: Vec<String>,
    /// Deliver the prompt via stdin; otherwise append it as the final
    /// command-line argument.
    pub prompt_via_stdin: bool,
}

impl AgentDescriptor {
    pub fn new(name: &str, command: &[&str], prompt_via_stdin: bool) -> Self {
        Self {
            name: name.to_string(),
            command: command.iter().map(|s| s.to_string()).collect(),
            prompt_via_stdin,
        }
    }

    /// The built-in roster, in preference order.
    pub fn default_roster() -> Vec<Self> {
        vec![
            AgentDescriptor::new("claude", &["claude", "--print", "--dangerously-skip-permissions"], true),
            AgentDescriptor::new("codex", &["codex", "exec", "--full-auto"], false),
            AgentDescriptor::new("gemini", &["gemini", "--yolo", "-p"], false),
        ]
    }
}

/// Result of one agent invocation (or of the multi-agent fallback).
#[derive(Debug, Clone)]
pub struct AgentInvocation {
    pub success: bool,
    /// Combined stdout and stderr.
    pub output: String,
    pub error: Option<String>,
    /// Which agent actually ran, or "none" if none could be invoked.
    pub agent_used: String,
}

impl AgentInvocation {
    pub fn failure(agent_used: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
            agent_used: agent_used.to_string(),
        }
    }
}

/// Options for one invocation.
#[derive(Debug, Clone)]
pub struct InvokeOptions {
    pub cwd: PathBuf,
    /// `None` means no ceiling: the agent runs until it exits.
    pub timeout: Option<Duration>,
    pub verbose: bool,
}

/// Spawns agent processes and handles preference-ordered fallback.
pub struct AgentInvoker {
    roster: Vec<AgentDescriptor>,
}

impl AgentInvoker {
    pub fn new(roster: Vec<AgentDescriptor>) -> Self {
        Self { roster }
    }

    /// Whether the agent's executable resolves on this platform.
    ///
    /// Probed fresh on every call; availability can change while the
    /// process runs (installs, PATH edits), so nothing is cached.
    pub fn is_available(agent: &AgentDescriptor) -> bool {
        agent
            .command
            .first()
            .map(|exe| which::which(exe).is_ok())
            .unwrap_or(false)
    }

    /// Invoke a single agent with the given prompt.
    pub async fn invoke(
        &self,
        agent: &AgentDescriptor,
        prompt: &str,
        options: &InvokeOptions,
    ) -> AgentInvocation {
        let Some(exe) = agent.command.first() else {
            return AgentInvocation::failure(&agent.name, "Agent has an empty command template");
        };

        let mut cmd = Command::new(exe);
        cmd.args(&agent.command[1..]);
        if !agent.prompt_via_stdin {
            cmd.arg(prompt);
        }
        cmd.current_dir(&options.cwd)
            .stdin(if agent.prompt_via_stdin {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if options.verbose {
            eprintln!("[agent] Spawning {} in {:?}", agent.name, options.cwd);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return AgentInvocation::failure(
                    &agent.name,
                    format!("Failed to spawn agent '{}': {e}", agent.name),
                );
            }
        };

        // Drain stdout/stderr from the start: an agent that floods its
        // output before reading stdin would otherwise deadlock against
        // prompt delivery on full pipe buffers.
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

        enum Delivery {
            Completed(std::io::Result<std::process::ExitStatus>),
            WriteFailed(std::io::Error),
        }

        let stdin = child.stdin.take();

        // Prompt delivery and completion race the timeout as one unit: a
        // prompt larger than the pipe buffer blocks the write until the
        // agent drains it, so delivery must be covered by the same ceiling
        // as the wait. Resolve once.
        let mut timed_out = false;
        let outcome = {
            let deliver_and_wait = async {
                if let Some(mut stdin) = stdin {
                    if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                        return Delivery::WriteFailed(e);
                    }
                    // Dropping stdin closes the pipe so the agent sees EOF.
                    drop(stdin);
                }
                Delivery::Completed(child.wait().await)
            };
            tokio::pin!(deliver_and_wait);
            match options.timeout {
                Some(timeout) => {
                    tokio::select! {
                        outcome = &mut deliver_and_wait => Some(outcome),
                        _ = tokio::time::sleep(timeout) => {
                            timed_out = true;
                            None
                        }
                    }
                }
                None => Some(deliver_and_wait.await),
            }
        };

        if timed_out || matches!(outcome, Some(Delivery::WriteFailed(_))) {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }

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

        if timed_out {
            return AgentInvocation {
                success: false,
                output,
                error: Some("Agent timed out".to_string()),
                agent_used: agent.name.clone(),
            };
        }

        match outcome {
            Some(Delivery::Completed(Ok(status))) if status.success() => AgentInvocation {
                success: true,
                output,
                error: None,
                agent_used: agent.name.clone(),
            },
            Some(Delivery::Completed(Ok(status))) => AgentInvocation {
                success: false,
                output: output.clone(),
                error: Some(format!(
                    "Agent '{}' exited with code {}: {}",
                    agent.name,
                    status.code().unwrap_or(-1),
                    truncate(&output, 500),
                )),
                agent_used: agent.name.clone(),
            },
            Some(Delivery::WriteFailed(e)) => AgentInvocation {
                success: false,
                output,
                error: Some(format!("Failed to write prompt to agent stdin: {e}")),
                agent_used: agent.name.clone(),
            },
            Some(Delivery::Completed(Err(_))) | None => AgentInvocation {
                success: false,
                output,
                error: Some(format!("Failed to wait for agent '{}'", agent.name)),
                agent_used: agent.name.clone(),
            },
        }
    }

    /// Try agents from a preference-ordered name list, one at a time.
    ///
    /// Unknown and unavailable names are skipped (availability is probed per
    /// call). Agents are never raced against each other; the first success
    /// wins. If every candidate fails or none is available, the last error
    /// (or a no-agents message) is returned.
    pub async fn call_any_available(
        &self,
        preferred: &[String],
        prompt: &str,
        options: &InvokeOptions,
    ) -> AgentInvocation {
        let mut last_failure: Option<AgentInvocation> = None;

        for name in preferred {
            let Some(agent) = self.roster.iter().find(|a| &a.name == name) else {
                tracing::debug!(agent = %name, "skipping unknown agent");
                continue;
            };
            if !Self::is_available(agent) {
                tracing::debug!(agent = %name, "agent executable not found, skipping");
                continue;
            }

            let invocation = self.invoke(agent, prompt, options).await;
            if invocation.success {
                return invocation;
            }
            tracing::warn!(
                agent = %name,
                error = invocation.error.as_deref().unwrap_or(""),
                "agent invocation failed, trying next"
            );
            last_failure = Some(invocation);
        }

        last_failure.unwrap_or_else(|| {
            AgentInvocation::failure("none", "No AI agents available or all agents failed")
        })
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
