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

//! One-shot command execution over an exec channel.

use super::error::TransportError;
use super::session::RemoteSession;
use super::transport::{ChannelEvent, ChannelKind, RemoteChannel, Transport};

/// Initial capacity for the stdout buffer; it grows without bound.
const SSH_CMD_BUFFER_SIZE: usize = 8192;

/// Small initial capacity for stderr, which is usually short.
const SSH_RESPONSE_BUFFER_SIZE: usize = 1024;

/// Result of a remote command execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exactly the bytes the command wrote to stdout.
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `None` when the channel closed without reporting a status.
    pub exit_status: Option<u32>,
}

impl CommandOutput {
    /// Convert stdout to a UTF-8 string
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Convert stderr to a UTF-8 string
    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Check if the command execution was successful (exit status 0)
    pub fn is_success(&self) -> bool {
        self.exit_status == Some(0)
    }
}

impl<T: Transport> RemoteSession<T> {
    /// Execute a remote command and collect its output.
    ///
    /// Connects first if the session is not live. Every call opens a fresh
    /// exec channel, so `cd`, variables and alike do not carry over between
    /// calls. The channel is closed once reading stops, whatever the outcome;
    /// on failure the partial output is discarded.
    pub async fn execute(&mut self, command: &str) -> Result<CommandOutput, TransportError> {
        self.ensure_connected().await?;

        tracing::debug!("Executing command: {}", command);
        let mut channel = self
            .open_channel(&ChannelKind::Exec(command.to_string()))
            .await?;

        let outcome = read_to_end(&mut channel).await;

        if let Err(e) = channel.close().await {
            tracing::debug!("Closing exec channel failed: {}", e);
        }

        match &outcome {
            Ok(output) => tracing::debug!(
                "Command finished with status {:?} ({} bytes of output)",
                output.exit_status,
                output.stdout.len()
            ),
            Err(e) => tracing::error!("Executing '{}' failed: {}", command, e),
        }
        outcome
    }
}

async fn read_to_end<C: RemoteChannel>(channel: &mut C) -> Result<CommandOutput, TransportError> {
    let mut stdout = Vec::with_capacity(SSH_CMD_BUFFER_SIZE);
    let mut stderr = Vec::with_capacity(SSH_RESPONSE_BUFFER_SIZE);
    let mut exit_status = None;

    while let Some(event) = channel.recv().await? {
        match event {
            ChannelEvent::Data(data) => stdout.extend_from_slice(&data),
            ChannelEvent::ExtendedData { ext, data } => {
                if ext == 1 {
                    stderr.extend_from_slice(&data);
                }
            }
            // The exit status may arrive before the last data, so keep reading.
            ChannelEvent::ExitStatus(status) => exit_status = Some(status),
            // EOF is permitted to precede data; only Close ends the channel.
            ChannelEvent::Eof => {}
            ChannelEvent::Close => break,
        }
    }

    Ok(CommandOutput {
        stdout,
        stderr,
        exit_status,
    })
}
