//! Top-level verification orchestration.

mod context;
mod prompts;
mod runner;

pub use context::{Git2Context, GitContextProvider, GitDiffContext, read_related_files};
pub use prompts::{build_autonomous_prompt, build_diff_prompt};
pub use runner::{AiFlavor, VerificationMode, VerificationOrchestrator, VerifyOptions};
