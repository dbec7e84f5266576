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

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Profile;

#[derive(Parser, Debug)]
#[command(
    name = "sshmon",
    version,
    about = "Run remote commands over SSH and monitor remote shell scripts",
    long_about = "sshmon runs one-shot commands on a remote host, or feeds a script to a remote shell\nand follows its output line by line until the script writes the end-of-text byte (0x03).\nConnection settings come from a YAML profile and can be overridden by the flags below.",
    after_help = "EXAMPLES:\n  Run a command:          sshmon -H build.example.com -l ci -i ~/.ssh/id_ed25519 exec uname -a\n  Follow a script:        sshmon -H build.example.com watch --script deploy.sh\n  Use another profile:    sshmon -F ./staging.yaml watch --script smoke.sh --poll-interval-ms 500\n\nThe script signals completion by printing the end-of-text byte, e.g. printf '\\003'."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'F',
        long,
        global = true,
        help = "Profile file path [default: ~/.config/sshmon/config.yaml]\nA missing file is treated as an empty profile"
    )]
    pub config: Option<PathBuf>,

    #[arg(short = 'H', long, global = true, help = "Remote hostname or address")]
    pub host: Option<String>,

    #[arg(short = 'p', long, global = true, help = "Remote SSH port [default: 22]")]
    pub port: Option<u16>,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Remote username [default: current user]"
    )]
    pub user: Option<String>,

    #[arg(
        short = 'i',
        long,
        global = true,
        help = "Private key file for authentication (takes precedence over --password)"
    )]
    pub identity: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "SSHMON_PASSWORD",
        hide_env_values = true,
        help = "Password for authentication"
    )]
    pub password: Option<String>,

    #[arg(
        long,
        global = true,
        env = "SSHMON_PASSPHRASE",
        hide_env_values = true,
        help = "Passphrase of the private key"
    )]
    pub passphrase: Option<String>,

    #[arg(
        long,
        global = true,
        help = "known_hosts file to load [default: ~/.ssh/known_hosts when checking is strict]"
    )]
    pub known_hosts: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        help = "Host key checking mode (yes/no) [default: yes]\n  yes - Reject hosts missing from known_hosts\n  no  - Accept any host key (testing only)"
    )]
    pub strict_host_key_checking: Option<String>,

    #[arg(
        long,
        global = true,
        help = "Connect and authentication timeout in milliseconds (0 waits indefinitely)"
    )]
    pub timeout_ms: Option<u64>,

    #[arg(
        short = 'v',
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Execute a command on the remote host",
        long_about = "Runs the command on a fresh exec channel and waits for it to finish.\nStdout and stderr are copied verbatim to the local stdout and stderr.\n\nExit code: the remote exit status, or 255 when none was reported"
    )]
    Exec {
        #[arg(
            required = true,
            trailing_var_arg = true,
            allow_hyphen_values = true,
            help = "Command and arguments, joined with spaces"
        )]
        command: Vec<String>,
    },

    #[command(
        about = "Run a script in a remote shell and follow its output",
        long_about = "Feeds the script to an interactive remote shell and prints the most recent output\nline whenever it changes. Stops when the script prints the end-of-text byte (0x03),\nwhen the shell ends, or on Ctrl-C.\n\nExit codes: 0 (finished), 1 (failed), 130 (interrupted)"
    )]
    Watch {
        #[arg(short = 's', long, help = "Local script file fed to the remote shell")]
        script: PathBuf,

        #[arg(long, help = "How often to sample the latest line [default: 2000]")]
        poll_interval_ms: Option<u64>,

        #[arg(long, help = "Publish lines longer than this in pieces [default: 65536]")]
        max_line_bytes: Option<usize>,
    },
}

impl Cli {
    /// Profile fields set on the command line, to be merged over the file.
    pub fn profile_overrides(&self) -> Profile {
        let (poll_interval_ms, max_line_bytes) = match &self.command {
            Commands::Watch {
                poll_interval_ms,
                max_line_bytes,
                ..
            } => (*poll_interval_ms, *max_line_bytes),
            Commands::Exec { .. } => (None, None),
        };

        Profile {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            private_key: self.identity.clone(),
            passphrase: self.passphrase.clone(),
            known_hosts: self.known_hosts.clone(),
            strict_host_key_checking: self.strict_host_key_checking.clone(),
            timeout_ms: self.timeout_ms,
            max_line_bytes,
            poll_interval_ms,
        }
    }
}
