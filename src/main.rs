// ABOUTME: Entry point for the sshkit CLI application.
// ABOUTME: Parses arguments, opens a session to the chosen host and runs one operation.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use sshkit::config::Config;
use sshkit::error::Result;
use sshkit::output::{Output, OutputMode};
use sshkit::ssh::{ExecOptions, RusshTransport, Session};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let output = Output::new(mode);

    if let Err(e) = run(cli, &output).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::discover_or_default(&env::current_dir()?)?,
    };

    let host = config.resolve_host(&cli.host)?;
    let session_config = host.session_config()?;

    output.progress(&format!("→ Connecting to {}:{}...", host.host, host.port));
    let mut session = Session::open(session_config).await?;

    let result = dispatch(&mut session, cli.command, output).await;

    // Report the operation's error ahead of a disconnect failure.
    let disconnected = session.disconnect().await;
    result?;
    disconnected?;
    Ok(())
}

async fn dispatch(
    session: &mut Session<RusshTransport>,
    command: Commands,
    output: &Output,
) -> Result<()> {
    match command {
        Commands::Exec {
            pty,
            env,
            detach,
            command,
        } => {
            let mut options = ExecOptions::default();
            if let Some(term) = pty {
                options = options.pty(term);
            }
            for (name, value) in env {
                options = options.env(name, value);
            }

            let command = command.join(" ");
            if detach {
                session.exec_detached(&command, &options).await?;
                output.success(&format!("Started: {command}"));
            } else {
                let result = session.exec(&command, &options).await?;
                output.command_output(&result);
            }
        }
        Commands::Put {
            local,
            remote,
            mode,
        } => {
            session.scp_send(&local, &remote, mode).await?;
            output.success(&format!("Uploaded {} → {}", local.display(), remote));
        }
        Commands::Get { remote, local } => {
            session.scp_recv(&remote, &local).await?;
            output.success(&format!("Downloaded {} → {}", remote, local.display()));
        }
        Commands::Chmod { mode, path } => {
            session.init_sftp().await?;
            session.chmod(&path, mode).await?;
            output.success(&format!("Changed mode of {path} to {mode:o}"));
        }
        Commands::Mkdir {
            path,
            mode,
            parents,
        } => {
            session.init_sftp().await?;
            session.mkdir(&path, mode, parents).await?;
            output.success(&format!("Created {path}"));
        }
        Commands::Rmdir { path } => {
            session.init_sftp().await?;
            session.rmdir(&path).await?;
            output.success(&format!("Removed directory {path}"));
        }
        Commands::Rm { path } => {
            session.init_sftp().await?;
            session.unlink(&path).await?;
            output.success(&format!("Removed {path}"));
        }
    }
    Ok(())
}
