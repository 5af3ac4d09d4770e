//! Remote execution backend over the system `ssh` client.

use async_trait::async_trait;
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::HostEntry;
use crate::error::{ExecError, Result};

use super::executor::{CommandOutput, Executor, parent_path, shell_quote};

/// Default reload command on a Debian-style server.
pub const REMOTE_RESTART_COMMAND: &str = "sudo apache2ctl graceful";

/// Exit status `ssh` uses for its own failures.
const SSH_FAILURE: i32 = 255;

/// Runs commands on a remote host.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    /// `[user@]hostname`.
    destination: String,
    /// Non-default SSH port.
    port: Option<u16>,
    /// Command that reloads the web server.
    restart_command: String,
}

impl SshExecutor {
    /// Creates an executor for `destination` (`[user@]hostname`).
    #[must_use]
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            port: None,
            restart_command: REMOTE_RESTART_COMMAND.to_string(),
        }
    }

    /// Creates an executor from a host entry.
    #[must_use]
    pub fn for_host(host: &HostEntry) -> Self {
        let destination = host.ssh_user.as_ref().map_or_else(
            || host.hostname.clone(),
            |user| format!("{user}@{}", host.hostname),
        );
        let mut executor = Self::new(destination);
        executor.port = host.ssh_port;
        if let Some(command) = &host.restart_command {
            executor.restart_command.clone_from(command);
        }
        executor
    }

    /// Arguments passed to `ssh` to run `remote` on the host.
    #[must_use]
    pub fn ssh_args(&self, remote: &str) -> Vec<String> {
        let mut args = vec![
            String::from("-o"),
            String::from("BatchMode=yes"),
        ];
        if let Some(port) = self.port {
            args.push(String::from("-p"));
            args.push(port.to_string());
        }
        args.push(self.destination.clone());
        args.push(String::from("--"));
        args.push(remote.to_string());
        args
    }

    /// Runs `remote` and returns the raw process output.
    async fn exec(&self, remote: &str, stdin: Option<&[u8]>) -> Result<Output> {
        let mut command = Command::new("ssh");
        command
            .args(self.ssh_args(remote))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let spawn_error = |e: std::io::Error| ExecError::Spawn {
            program: String::from("ssh"),
            message: e.to_string(),
        };

        let mut child = command.spawn().map_err(spawn_error)?;
        if let (Some(content), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(content).await?;
            pipe.shutdown().await?;
        }
        Ok(child.wait_with_output().await.map_err(spawn_error)?)
    }

    fn failure(&self, command: &str, output: &Output) -> ExecError {
        ExecError::CommandFailed {
            target: self.target(),
            command: command.to_string(),
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }
}

#[async_trait]
impl Executor for SshExecutor {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        debug!("[{}] {command}", self.destination);

        let remote = format!("bash -c {}", shell_quote(command));
        let output = self.exec(&remote, None).await?;
        if !output.status.success() {
            return Err(self.failure(command, &output).into());
        }

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let check = format!("test -e {}", shell_quote(path));
        let output = self.exec(&check, None).await?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(code) if code != SSH_FAILURE => Ok(false),
            _ => Err(self.failure(&check, &output).into()),
        }
    }

    async fn upload(&self, content: &[u8], path: &str) -> Result<()> {
        debug!("[{}] writing {} bytes to {path}", self.destination, content.len());

        let remote = format!(
            "mkdir -p {} && cat > {}",
            shell_quote(parent_path(path)),
            shell_quote(path)
        );
        let output = self.exec(&remote, Some(content)).await?;
        if !output.status.success() {
            return Err(ExecError::Upload {
                path: path.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }
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
        self.destination.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(yaml: &str) -> HostEntry {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_args_for_plain_host() {
        let executor = SshExecutor::for_host(&host("hostname: h1.example.com"));
        assert_eq!(
            executor.ssh_args("uptime"),
            vec!["-o", "BatchMode=yes", "h1.example.com", "--", "uptime"]
        );
        assert_eq!(executor.restart_command, REMOTE_RESTART_COMMAND);
    }

    #[test]
    fn test_args_with_user_port_and_restart() {
        let executor = SshExecutor::for_host(&host(
            "hostname: h1.example.com\nssh_user: deploy\nssh_port: 2222\nrestart_command: sudo systemctl reload apache2",
        ));
        assert_eq!(executor.target(), "deploy@h1.example.com");
        assert_eq!(
            executor.ssh_args("uptime"),
            vec!["-o", "BatchMode=yes", "-p", "2222", "deploy@h1.example.com", "--", "uptime"]
        );
        assert_eq!(executor.restart_command, "sudo systemctl reload apache2");
    }
}
