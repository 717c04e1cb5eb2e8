use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::PackError;

/// One external invocation: program, arguments, environment overrides and
/// working directory. Variables not listed are inherited from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub envs: Vec<(String, OsString)>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: &str, value: impl Into<OsString>) -> Self {
        self.envs.push((key.to_string(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env_value(&self, key: &str) -> Option<&OsString> {
        self.envs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command.envs(self.envs.iter().map(|(k, v)| (k, v)));
        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }
        command
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Runs external tools (git, go) for the pipeline.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion; a non-zero exit is an error.
    async fn run(&self, spec: &CommandSpec) -> Result<()>;
}

/// Spawns real child processes and forwards their output to the log.
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<()> {
        info!(command = %spec, "Running");

        let mut child = spec
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| anyhow!("Failed to spawn {}: {}", spec.program.display(), e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("Failed to get stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("Failed to get stderr"))?;

        tokio::join!(forward_lines(stdout, "stdout"), forward_lines(stderr, "stderr"));

        let status = child
            .wait()
            .await
            .map_err(|e| anyhow!("Failed to wait for {}: {}", spec.program.display(), e))?;

        if status.success() {
            Ok(())
        } else {
            Err(PackError::CommandFailed {
                command: spec.to_string(),
                status,
            }
            .into())
        }
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(stream: R, name: &'static str) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(stream = name, "{}", line);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every command instead of running it. Commands whose program
    /// path ends with `fail_program` fail.
    #[derive(Default)]
    pub struct RecordingRunner {
        commands: Mutex<Vec<CommandSpec>>,
        fail_program: Option<String>,
    }

    impl RecordingRunner {
        pub fn failing_on(program: &str) -> Self {
            Self {
                commands: Mutex::default(),
                fail_program: Some(program.to_string()),
            }
        }

        pub fn commands(&self) -> Vec<CommandSpec> {
            self.commands.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run(&self, spec: &CommandSpec) -> Result<()> {
            self.commands.lock().unwrap().push(spec.clone());
            match &self.fail_program {
                Some(program) if spec.program.ends_with(program) => {
                    Err(anyhow!("{} failed", spec))
                }
                _ => Ok(()),
            }
        }
    }
}
