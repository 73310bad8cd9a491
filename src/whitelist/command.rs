//! Invoking the external whitelist program.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::WhitelistRequest;
use crate::error::WhitelistError;

/// Applies whitelist requests to the outside world.
#[async_trait]
pub trait Whitelister: Send + Sync {
    async fn apply(&self, request: &WhitelistRequest) -> Result<(), WhitelistError>;
}

/// Runs an external program once per request:
///
/// ```text
/// <program> [args...] [--remove] [--comment <text>] <address>...
/// ```
///
/// `args` are passed through unchanged on every call (for example a flag
/// that disables firewall rule creation).
#[derive(Debug, Clone)]
pub struct CommandWhitelister {
    program: String,
    args: Vec<String>,
}

impl CommandWhitelister {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Full argument list for one request.
    pub fn arguments(&self, request: &WhitelistRequest) -> Vec<String> {
        let mut args = self.args.clone();
        if request.remove {
            args.push("--remove".to_string());
        }
        if let Some(comment) = &request.comment {
            args.push("--comment".to_string());
            args.push(comment.clone());
        }
        args.extend(request.addresses.iter().cloned());
        args
    }
}

#[async_trait]
impl Whitelister for CommandWhitelister {
    async fn apply(&self, request: &WhitelistRequest) -> Result<(), WhitelistError> {
        let args = self.arguments(request);
        debug!(program = %self.program, ?args, "running whitelist command");

        let status = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| WhitelistError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(WhitelistError::ExitStatus {
                program: self.program.clone(),
                status,
            });
        }

        Ok(())
    }
}
