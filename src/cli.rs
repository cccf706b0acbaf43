// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines the host argument, output flags and all subcommands.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sshkit")]
#[command(about = "Run commands and manage files on a remote host over SSH")]
#[command(version)]
pub struct Cli {
    /// Hosts file (default: sshkit.yml in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print only command output and errors
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Emit JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Host name from the hosts file, or user@host[:port]
    pub host: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a command on the remote host
    Exec {
        /// Request a pty with this terminal type (e.g. xterm)
        #[arg(long)]
        pty: Option<String>,

        /// Environment variable for the command, as NAME=VALUE
        #[arg(short, long = "env", value_parser = parse_env_pair)]
        env: Vec<(String, String)>,

        /// Start the command and return without waiting for output
        #[arg(short, long)]
        detach: bool,

        /// Command and arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Upload a file with SCP
    Put {
        local: PathBuf,
        remote: String,

        /// Octal permissions for the remote file
        #[arg(short, long, default_value = "644", value_parser = parse_mode)]
        mode: u32,
    },

    /// Download a file with SCP
    Get { remote: String, local: PathBuf },

    /// Change permissions of a remote path
    Chmod {
        #[arg(value_parser = parse_mode)]
        mode: u32,
        path: String,
    },

    /// Create a remote directory
    Mkdir {
        path: String,

        /// Octal permissions for the new directory
        #[arg(short, long, default_value = "777", value_parser = parse_mode)]
        mode: u32,

        /// Create missing parent directories
        #[arg(short, long)]
        parents: bool,
    },

    /// Remove an empty remote directory
    Rmdir { path: String },

    /// Remove a remote file
    Rm { path: String },
}

/// Parse an octal permission string such as `755` or `0644`.
pub fn parse_mode(s: &str) -> Result<u32, String> {
    let digits = s.strip_prefix("0o").unwrap_or(s);
    let mode = u32::from_str_radix(digits, 8).map_err(|_| format!("invalid octal mode: {s}"))?;
    if mode > 0o7777 {
        return Err(format!("mode out of range: {s}"));
    }
    Ok(mode)
}

fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got: {s}"))?;
    if name.is_empty() {
        return Err(format!("empty variable name in: {s}"));
    }
    Ok((name.to_string(), value.to_string()))
}
