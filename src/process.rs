use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{error, info};

/// External command line: program plus arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Classified result of one external command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The process ran to completion; `code` is `None` when killed by a signal
    Completed {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    /// The timeout expired before the process exited
    TimedOut { timeout: Duration },
    /// The executable could not be found
    NotFound { program: String },
    /// Spawning or waiting failed for another reason
    Failed { details: String },
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        matches!(self, Self::Completed { code: Some(0), .. })
    }

    /// Diagnostic text: stdout on success, a descriptive error otherwise
    pub fn message(&self) -> String {
        match self {
            Self::Completed {
                code: Some(0),
                stdout,
                ..
            } => stdout.trim().to_string(),
            Self::Completed { code, stderr, .. } => format!(
                "Error: {} (Code: {})",
                stderr.trim(),
                code.map_or_else(|| "signal".to_string(), |c| c.to_string())
            ),
            Self::TimedOut { .. } => "Error: Command timed out".to_string(),
            Self::NotFound { program } => format!(
                "Error: Command {} not found. Ensure it's installed and in PATH.",
                program
            ),
            Self::Failed { details } => format!("Error: Exception {}", details),
        }
    }
}

/// Single seam through which every external tool is invoked
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: &CommandSpec, timeout: Duration) -> ProcessOutcome;
}

/// Runs commands as child processes of this one
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, command: &CommandSpec, timeout: Duration) -> ProcessOutcome {
        info!("Running command: {}", command);

        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the handle on timeout kills the child
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                error!("Command not found: {}", command.program);
                return ProcessOutcome::NotFound {
                    program: command.program.clone(),
                };
            }
            Err(e) => {
                error!("Exception running command {}: {}", command, e);
                return ProcessOutcome::Failed {
                    details: e.to_string(),
                };
            }
        };

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                error!("Exception running command {}: {}", command, e);
                return ProcessOutcome::Failed {
                    details: e.to_string(),
                };
            }
            Err(_) => {
                error!("Command timed out after {:?}: {}", timeout, command);
                return ProcessOutcome::TimedOut { timeout };
            }
        };

        let outcome = ProcessOutcome::Completed {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if outcome.success() {
            info!("Command successful: {}. Output: {}", command, outcome.message());
        } else {
            error!("Command failed: {}: {}", command, outcome.message());
        }

        outcome
    }
}
