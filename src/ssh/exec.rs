// ABOUTME: Remote command execution with return-code marker framing.
// ABOUTME: Appends an echoed exit status to each command and interprets the captured output.

use super::error::{Error, Result};
use super::session::Session;
use super::transport::{ExecOutput, Transport};
use std::collections::HashMap;

const MARKER_PREFIX: &str = "[return_code:";
const MARKER_SUFFIX: char = ']';

/// How pty dimensions are expressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TerminalUnits {
    #[default]
    Chars,
    Pixels,
}

/// Channel settings for a remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOptions {
    /// Terminal type for a pty; empty requests no pty.
    pub pty: String,
    pub env: HashMap<String, String>,
    pub width: u32,
    pub height: u32,
    pub units: TerminalUnits,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            pty: String::new(),
            env: HashMap::new(),
            width: 80,
            height: 25,
            units: TerminalUnits::Chars,
        }
    }
}

impl ExecOptions {
    pub fn pty(mut self, term: impl Into<String>) -> Self {
        self.pty = term.into();
        self
    }

    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    pub fn size(mut self, width: u32, height: u32, units: TerminalUnits) -> Self {
        self.width = width;
        self.height = height;
        self.units = units;
        self
    }

    pub fn wants_pty(&self) -> bool {
        !self.pty.is_empty()
    }
}

/// Outcome of a successful remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Standard output with the return-code marker removed.
    pub stdout: String,
    pub stderr: String,
    /// Exit code from the marker, or the channel's exit status if the marker was missing.
    pub exit_code: Option<u32>,
}

/// Append the shell snippet that echoes the command's exit status.
pub fn with_return_code_marker(command: &str) -> String {
    format!("{command};echo \"{MARKER_PREFIX}$?{MARKER_SUFFIX}\"")
}

/// Locate the first `[return_code:N]` in `stdout`.
///
/// Returns the marker text between the brackets as written and its numeric value.
/// A marker whose payload is not a non-negative integer counts as absent.
pub fn find_return_code(stdout: &str) -> Option<(&str, u32)> {
    let start = stdout.find(MARKER_PREFIX)? + MARKER_PREFIX.len();
    let len = stdout[start..].find(MARKER_SUFFIX)?;
    let raw = &stdout[start..start + len];
    let code = raw.parse::<u32>().ok()?;
    Some((raw, code))
}

/// Remove every `[return_code:<raw>]` line from `stdout`.
///
/// The line may end in `\n` or, under a pty, `\r\n`.
pub fn strip_return_code(stdout: &str, raw: &str) -> String {
    let marker = format!("{MARKER_PREFIX}{raw}{MARKER_SUFFIX}");
    stdout
        .replace(&format!("{marker}\r\n"), "")
        .replace(&format!("{marker}\n"), "")
}

/// Decide success or failure for a finished command.
///
/// Any stderr output fails the command, whatever its exit status.
pub fn interpret(output: ExecOutput) -> Result<CommandResult> {
    if !output.stderr.is_empty() {
        let exit_code = find_return_code(&output.stdout)
            .map(|(_, code)| code)
            .or(output.exit_status);
        return Err(Error::Execution {
            message: output.stderr,
            exit_code,
        });
    }

    let Some((raw, code)) = find_return_code(&output.stdout) else {
        tracing::debug!("no return code marker in command output");
        return Ok(CommandResult {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.exit_status,
        });
    };

    let stdout = strip_return_code(&output.stdout, raw);
    if code > 0 {
        return Err(Error::Execution {
            message: stdout,
            exit_code: Some(code),
        });
    }

    Ok(CommandResult {
        stdout,
        stderr: output.stderr,
        exit_code: Some(code),
    })
}

impl<T: Transport> Session<T> {
    /// Execute a command on the remote host and wait for its output.
    pub async fn exec(&mut self, command: &str, options: &ExecOptions) -> Result<CommandResult> {
        let framed = with_return_code_marker(command);
        tracing::debug!(host = %self.host(), command, "executing remote command");

        let output = self
            .channel_transport()?
            .exec(&framed, options)
            .await
            .map_err(Error::Channel)?;

        interpret(output)
    }

    /// Start a command and return without reading its output.
    pub async fn exec_detached(&mut self, command: &str, options: &ExecOptions) -> Result<()> {
        let framed = with_return_code_marker(command);
        tracing::debug!(host = %self.host(), command, "starting detached remote command");

        self.channel_transport()?
            .exec_detached(&framed, options)
            .await
            .map_err(Error::Channel)
    }
}
