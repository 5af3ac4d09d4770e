//! Executor trait definition.
//!
//! This module defines the common interface for running commands and
//! placing files on a target host, whether that host is this machine or a
//! remote one reached over SSH.

use async_trait::async_trait;

use crate::error::Result;

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Creates an output with only stdout set.
    #[must_use]
    pub fn stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Returns the last non-empty line of stdout, trimmed.
    ///
    /// Shell setup (virtualenvwrapper hooks, motd) may print before the
    /// command itself, so single-value queries read the last line.
    #[must_use]
    pub fn last_line(&self) -> Option<&str> {
        self.stdout
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
    }
}

/// Trait for execution backends.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Executor: Send + Sync {
    /// Runs a shell command.
    ///
    /// Fails with `ExecError::CommandFailed` on a non-zero exit.
    async fn run(&self, command: &str) -> Result<CommandOutput>;

    /// Checks whether a path exists.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Writes `content` to `path`, replacing any existing file.
    async fn upload(&self, content: &[u8], path: &str) -> Result<()>;

    /// Reloads the web server.
    async fn restart(&self) -> Result<()>;

    /// Describes the target for logs and error messages.
    fn target(&self) -> String;
}

#[async_trait]
impl Executor for Box<dyn Executor> {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        (**self).run(command).await
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        (**self).exists(path).await
    }

    async fn upload(&self, content: &[u8], path: &str) -> Result<()> {
        (**self).upload(content, path).await
    }

    async fn restart(&self) -> Result<()> {
        (**self).restart().await
    }

    fn target(&self) -> String {
        (**self).target()
    }
}

/// Quotes a string for a POSIX shell.
///
/// Plain words pass through unchanged. A leading `~/` is left unquoted so
/// the shell still expands it.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    if let Some(rest) = value.strip_prefix("~/") {
        return if rest.is_empty() {
            String::from("~/")
        } else {
            format!("~/{}", shell_quote(rest))
        };
    }

    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=@%+,".contains(c));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Joins remote path segments with `/`.
#[must_use]
pub fn join_path(base: &str, segment: &str) -> String {
    if base.is_empty() {
        return segment.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        segment.trim_start_matches('/')
    )
}

/// Returns the parent directory of a remote path.
#[must_use]
pub fn parent_path(path: &str) -> &str {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => ".",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote_plain() {
        assert_eq!(shell_quote("/srv/envs/blog"), "/srv/envs/blog");
        assert_eq!(shell_quote("git@github.com:me/blog.git"), "git@github.com:me/blog.git");
    }

    #[test]
    fn test_shell_quote_special() {
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("$(rm -rf /)"), "'$(rm -rf /)'");
    }

    #[test]
    fn test_shell_quote_keeps_tilde() {
        assert_eq!(shell_quote("~/envs/my site"), "~/'envs/my site'");
        assert_eq!(shell_quote("~/envs"), "~/envs");
    }

    #[test]
    fn test_join_and_parent() {
        assert_eq!(join_path("/srv/envs/", "blog"), "/srv/envs/blog");
        assert_eq!(join_path("/srv", "/x"), "/srv/x");
        assert_eq!(parent_path("/srv/envs/blog/settings.py"), "/srv/envs/blog");
        assert_eq!(parent_path("/settings.py"), "/");
        assert_eq!(parent_path("settings.py"), ".");
    }

    #[test]
    fn test_last_line() {
        let out = CommandOutput::stdout("hook output\n/srv/lib/site-packages\n\n");
        assert_eq!(out.last_line(), Some("/srv/lib/site-packages"));
        assert_eq!(CommandOutput::default().last_line(), None);
    }
}
