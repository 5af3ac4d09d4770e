//! In-memory executor that records what operations ask of a host.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use crate::error::{ExecError, Result};

use super::executor::{CommandOutput, Executor};

#[derive(Debug, Clone)]
enum Effect {
    Create(String),
    Respond(String),
    Fail,
}

#[derive(Debug, Default)]
struct Recorded {
    commands: Vec<String>,
    paths: BTreeSet<String>,
    uploads: BTreeMap<String, Vec<u8>>,
    restarts: usize,
}

/// Test executor keeping a simulated filesystem and a command log.
///
/// Rules match when a command contains their needle and apply in the order
/// they were added.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    rules: Vec<(String, Effect)>,
    recorded: Mutex<Recorded>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `path` as already present.
    pub fn with_path(self, path: &str) -> Self {
        self.recorded.lock().unwrap().paths.insert(path.to_string());
        self
    }

    /// Makes commands containing `needle` create `path`.
    pub fn creates_on(mut self, needle: &str, path: &str) -> Self {
        self.rules
            .push((needle.to_string(), Effect::Create(path.to_string())));
        self
    }

    /// Makes commands containing `needle` print `stdout`.
    pub fn responds(mut self, needle: &str, stdout: &str) -> Self {
        self.rules
            .push((needle.to_string(), Effect::Respond(stdout.to_string())));
        self
    }

    /// Makes commands containing `needle` exit non-zero.
    pub fn fails_on(mut self, needle: &str) -> Self {
        self.rules.push((needle.to_string(), Effect::Fail));
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.recorded.lock().unwrap().commands.clone()
    }

    /// Number of recorded commands containing `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.commands().iter().filter(|c| c.contains(needle)).count()
    }

    pub fn uploaded(&self, path: &str) -> Option<String> {
        self.recorded
            .lock()
            .unwrap()
            .uploads
            .get(path)
            .map(|content| String::from_utf8_lossy(content).into_owned())
    }

    pub fn upload_paths(&self) -> Vec<String> {
        self.recorded.lock().unwrap().uploads.keys().cloned().collect()
    }

    pub fn restarts(&self) -> usize {
        self.recorded.lock().unwrap().restarts
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        let mut recorded = self.recorded.lock().unwrap();
        recorded.commands.push(command.to_string());

        if let Some(dirs) = command.strip_prefix("mkdir -p ") {
            for dir in dirs.split_whitespace() {
                recorded.paths.insert(dir.trim_matches('\'').to_string());
            }
        }

        let mut output = CommandOutput::default();
        for (needle, effect) in &self.rules {
            if !command.contains(needle.as_str()) {
                continue;
            }
            match effect {
                Effect::Create(path) => {
                    recorded.paths.insert(path.clone());
                }
                Effect::Respond(stdout) => output = CommandOutput::stdout(stdout.clone()),
                Effect::Fail => {
                    return Err(ExecError::CommandFailed {
                        target: self.target(),
                        command: command.to_string(),
                        status: 1,
                        stderr: String::from("simulated failure"),
                    }
                    .into());
                }
            }
        }
        Ok(output)
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.recorded.lock().unwrap().paths.contains(path))
    }

    async fn upload(&self, content: &[u8], path: &str) -> Result<()> {
        let mut recorded = self.recorded.lock().unwrap();
        recorded.paths.insert(path.to_string());
        recorded.uploads.insert(path.to_string(), content.to_vec());
        Ok(())
    }

    async fn restart(&self) -> Result<()> {
        self.recorded.lock().unwrap().restarts += 1;
        Ok(())
    }

    fn target(&self) -> String {
        String::from("recording")
    }
}
