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

//! Abstraction over the secure transport.
//!
//! The session, executor and shell bridge only see these traits. The russh
//! implementation lives in [`super::tokio_client`]; tests drive the same code
//! with a scripted transport.

use async_trait::async_trait;
use std::fmt;

use super::error::{StreamError, TransportError};
use super::identity::SessionIdentity;
use super::known_hosts::ServerCheckMethod;

/// The kind of channel to open on a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelKind {
    /// One-shot command execution.
    Exec(String),
    /// Interactive shell reading its commands from stdin.
    Shell,
}

impl ChannelKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Exec(_) => "exec",
            Self::Shell => "shell",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Something the remote end sent on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Data(Vec<u8>),
    /// Extended data; `ext == 1` is stderr.
    ExtendedData { ext: u32, data: Vec<u8> },
    ExitStatus(u32),
    Eof,
    Close,
}

/// Opens authenticated sessions.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;

    /// Handshake, verify the host key per `server_check`, then authenticate.
    async fn connect(
        &self,
        identity: &SessionIdentity,
        server_check: &ServerCheckMethod,
    ) -> Result<Self::Connection, TransportError>;
}

/// A live, authenticated session.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    type Channel: RemoteChannel;

    async fn open_channel(&self, kind: &ChannelKind) -> Result<Self::Channel, TransportError>;

    fn is_closed(&self) -> bool;

    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// One multiplexed channel of a session.
#[async_trait]
pub trait RemoteChannel: Send + 'static {
    /// Write bytes to the remote process's stdin.
    async fn send(&mut self, data: &[u8]) -> Result<(), StreamError>;

    /// Signal that no more stdin will follow.
    async fn send_eof(&mut self) -> Result<(), StreamError>;

    /// Next event from the remote side. `Ok(None)` once the channel has ended.
    ///
    /// Must be cancel safe: dropping the future loses no event.
    async fn recv(&mut self) -> Result<Option<ChannelEvent>, StreamError>;

    async fn close(&mut self) -> Result<(), StreamError>;
}

/// Channel type produced by a transport's connections.
pub type ChannelOf<T> = <<T as Transport>::Connection as Connection>::Channel;
