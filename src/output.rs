//! Text output adapters for Wayland.
//!
//! Two delivery mechanisms:
//! - Clipboard: `wl-copy` puts the transcript on the clipboard.
//! - Type: `wtype` injects the text as keystrokes; terminals instead get
//!   clipboard + a ctrl-shift-v paste, since most terminals ignore synthetic
//!   typing of arbitrary text.
//!
//! The `CommandExecutor` trait enables full testability without external
//! tools installed.

use crate::error::{Result, SpeakError};
use serde::{Deserialize, Serialize};
use std::process::{Command, Stdio};

/// Output method tag carried by `start`/`toggle` commands and configuration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputMethod {
    #[default]
    Clipboard,
    Type,
}

impl OutputMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMethod::Clipboard => "clipboard",
            OutputMethod::Type => "type",
        }
    }
}

/// Trait for executing system commands.
///
/// Object-safe, Send + Sync for use in concurrent contexts. Enables
/// testability by allowing mock implementations.
pub trait CommandExecutor: Send + Sync {
    /// Execute a command with arguments, optionally piping text to stdin.
    fn execute(&self, command: &str, args: &[&str], stdin: Option<&str>) -> Result<()>;
}

/// Production command executor using std::process::Command.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn execute(&self, command: &str, args: &[&str], stdin: Option<&str>) -> Result<()> {
        let mut cmd = Command::new(command);
        cmd.args(args).stderr(Stdio::null());

        let status = if let Some(text) = stdin {
            use std::io::Write;
            cmd.stdin(Stdio::piped());
            let mut child = cmd.spawn().map_err(|e| spawn_error(command, e))?;
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(text.as_bytes())
                    .map_err(|e| SpeakError::OutputFailed {
                        message: format!("Failed to write to {} stdin: {}", command, e),
                    })?;
            }
            child.wait().map_err(|e| SpeakError::OutputFailed {
                message: format!("Failed to wait for {}: {}", command, e),
            })?
        } else {
            cmd.status().map_err(|e| spawn_error(command, e))?
        };

        if !status.success() {
            return Err(SpeakError::OutputFailed {
                message: format!("{} exited with status {:?}", command, status.code()),
            });
        }

        Ok(())
    }
}

fn spawn_error(command: &str, e: std::io::Error) -> SpeakError {
    if e.kind() == std::io::ErrorKind::NotFound {
        SpeakError::OutputToolNotFound {
            tool: command.to_string(),
        }
    } else {
        SpeakError::OutputFailed {
            message: format!("Failed to execute {}: {}", command, e),
        }
    }
}

/// One transcript delivery mechanism.
pub trait OutputAdapter: Send {
    fn deliver(&self, text: &str) -> Result<()>;
}

/// Copies the transcript to the Wayland clipboard via `wl-copy`.
pub struct ClipboardOutput<E: CommandExecutor = SystemCommandExecutor> {
    executor: E,
}

impl ClipboardOutput {
    pub fn new() -> Self {
        Self {
            executor: SystemCommandExecutor,
        }
    }
}

impl Default for ClipboardOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: CommandExecutor> ClipboardOutput<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }
}

impl<E: CommandExecutor> OutputAdapter for ClipboardOutput<E> {
    fn deliver(&self, text: &str) -> Result<()> {
        // Text goes through stdin so arbitrary content never hits argv.
        self.executor.execute("wl-copy", &[], Some(text))
    }
}

/// Injects the transcript as keystrokes via `wtype`.
///
/// For terminal apps the text is routed through the clipboard and pasted
/// with ctrl-shift-v instead.
pub struct TypeOutput<E: CommandExecutor = SystemCommandExecutor> {
    executor: E,
    is_terminal: bool,
}

impl TypeOutput {
    pub fn new(is_terminal: bool) -> Self {
        Self {
            executor: SystemCommandExecutor,
            is_terminal,
        }
    }
}

impl<E: CommandExecutor> TypeOutput<E> {
    pub fn with_executor(executor: E, is_terminal: bool) -> Self {
        Self {
            executor,
            is_terminal,
        }
    }
}

impl<E: CommandExecutor> OutputAdapter for TypeOutput<E> {
    fn deliver(&self, text: &str) -> Result<()> {
        if self.is_terminal {
            self.executor.execute("wl-copy", &[], Some(text))?;
            self.executor
                .execute("wtype", &["-M", "ctrl", "-M", "shift", "-k", "v"], None)
        } else {
            self.executor.execute("wtype", &["-d", "0", text], None)
        }
    }
}

/// Build the adapter for a method tag and terminal classification.
pub fn make_output(method: OutputMethod, is_terminal: bool) -> Box<dyn OutputAdapter> {
    match method {
        OutputMethod::Clipboard => Box::new(ClipboardOutput::new()),
        OutputMethod::Type => Box::new(TypeOutput::new(is_terminal)),
    }
}

/// Factory signature the daemon core uses, injectable for tests.
pub type OutputFactory = Box<dyn Fn(OutputMethod, bool) -> Box<dyn OutputAdapter> + Send>;
