//! Local execution backend.
//!
//! Used for hosts flagged `local: true`: commands run through `bash` on
//! this machine and uploads are plain file writes.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::fs;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ExecError, Result};

use super::executor::{CommandOutput, Executor};

/// Default reload command on a workstation.
pub const LOCAL_RESTART_COMMAND: &str = "sudo apachectl graceful";

/// Runs commands on this machine.
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    /// Command that reloads the web server.
    restart_command: String,
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalExecutor {
    /// Creates a local executor with the default reload command.
    #[must_use]
    pub fn new() -> Self {
        Self {
            restart_command: LOCAL_RESTART_COMMAND.to_string(),
        }
    }

    /// Overrides the reload command.
    #[must_use]
    pub fn with_restart_command(mut self, command: impl Into<String>) -> Self {
        self.restart_command = command.into();
        self
    }
}

/// Expands a leading `~` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        debug!("[local] {command}");

        let output = Command::new("bash")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ExecError::Spawn {
                program: String::from("bash"),
                message: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(ExecError::CommandFailed {
                target: self.target(),
                command: command.to_string(),
                status: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            }
            .into());
        }

        Ok(CommandOutput { stdout, stderr })
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(fs::try_exists(expand_home(path)).await?)
    }

    async fn upload(&self, content: &[u8], path: &str) -> Result<()> {
        let target = expand_home(path);
        debug!("[local] writing {} bytes to {}", content.len(), target.display());

        let upload_error = |e: std::io::Error| ExecError::Upload {
            path: path.to_string(),
            message: e.to_string(),
        };

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(upload_error)?;
        }
        fs::write(&target, content).await.map_err(upload_error)?;
        Ok(())
    }

    async fn restart(&self) -> Result<()> {
        self.run(&self.restart_command).await.map_err(|e| {
            ExecError::Restart {
                target: self.target(),
                message: e.to_string(),
            }
        })?;
        Ok(())
    }

    fn target(&self) -> String {
        String::from("local")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StitchError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let executor = LocalExecutor::new();
        let output = executor.run("echo hello").await.expect("echo failed");
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_non_zero_exit_fails() {
        let executor = LocalExecutor::new();
        let err = executor.run("echo oops >&2; exit 3").await.unwrap_err();
        match err {
            StitchError::Exec(ExecError::CommandFailed { status, stderr, .. }) => {
                assert_eq!(status, 3);
                assert_eq!(stderr, "oops");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_upload_creates_parents_and_exists() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let path = temp.path().join("a/b/settings.py");
        let path = path.to_str().expect("utf-8 path");
        let executor = LocalExecutor::new();

        assert!(!executor.exists(path).await.unwrap());
        executor.upload(b"DEBUG = True\n", path).await.unwrap();
        assert!(executor.exists(path).await.unwrap());
        assert_eq!(std::fs::read_to_string(path).unwrap(), "DEBUG = True\n");
    }

    #[tokio::test]
    async fn test_restart_uses_configured_command() {
        let ok = LocalExecutor::new().with_restart_command("true");
        assert!(ok.restart().await.is_ok());

        let failing = LocalExecutor::new().with_restart_command("false");
        assert!(matches!(
            failing.restart().await.unwrap_err(),
            StitchError::Exec(ExecError::Restart { .. })
        ));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/srv/envs"), PathBuf::from("/srv/envs"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/envs"), home.join("envs"));
        }
    }
}
