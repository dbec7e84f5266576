// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use sshmon::{
    cli::{Cli, Commands},
    config::Profile,
    monitor::{LineMonitor, MonitorOutcome},
    ssh::{RemoteSession, SshSession, SshTransport},
    utils::init_logging,
};

/// Exit code when the remote side reported no exit status.
const EXIT_NO_STATUS: i32 = 255;

/// Exit code after Ctrl-C, following the shell convention.
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let profile = Profile::load_or_default(cli.config.as_deref())
        .await?
        .merge(cli.profile_overrides());
    tracing::debug!("Effective profile: {:?}", profile);

    let code = match &cli.command {
        Commands::Exec { command } => run_exec(profile, &command.join(" ")).await?,
        Commands::Watch { script, .. } => run_watch(profile, script).await?,
    };
    std::process::exit(code);
}

fn open_session(profile: Profile) -> Result<SshSession> {
    let identity = profile.into_identity()?;
    Ok(RemoteSession::new(SshTransport::default(), identity))
}

async fn run_exec(profile: Profile, command: &str) -> Result<i32> {
    let mut session = open_session(profile)?;

    let result = session.execute(command).await;
    if let Err(e) = session.disconnect().await {
        tracing::warn!("Ignoring error while disconnecting: {}", e);
    }
    let output = result.with_context(|| format!("Failed to execute '{command}'"))?;

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&output.stdout).await?;
    stdout.flush().await?;
    let mut stderr = tokio::io::stderr();
    stderr.write_all(&output.stderr).await?;
    stderr.flush().await?;

    Ok(output
        .exit_status
        .map_or(EXIT_NO_STATUS, |status| status as i32))
}

async fn run_watch(profile: Profile, script_path: &Path) -> Result<i32> {
    let script = tokio::fs::File::open(script_path)
        .await
        .with_context(|| format!("Failed to open script {}", script_path.display()))?;
    let poll_interval = profile.poll_interval();
    let max_line_bytes = profile.max_line_bytes();
    let session = open_session(profile)?;

    let handle = LineMonitor::new(session, script)
        .max_line_bytes(max_line_bytes)
        .spawn();

    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let report = handle
        .follow(poll_interval, interrupted, |line| println!("{line}"))
        .await
        .context("Monitor task panicked")?;

    let code = match &report.outcome {
        MonitorOutcome::Sentinel => {
            eprintln!("Script finished ({} lines)", report.lines_published);
            0
        }
        MonitorOutcome::EndOfStream => {
            eprintln!(
                "Shell ended without end-of-text marker ({} lines)",
                report.lines_published
            );
            0
        }
        MonitorOutcome::Cancelled => {
            eprintln!("Interrupted");
            EXIT_INTERRUPTED
        }
        MonitorOutcome::Failed(e) => {
            eprintln!("Monitor failed: {e}");
            1
        }
    };
    Ok(code)
}
