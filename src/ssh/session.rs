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

//! Transport session lifecycle.
//!
//! [`RemoteSession`] owns the identity, the trust decision and the single
//! live connection. Command execution lives in [`super::executor`] and the
//! shell bridge in [`super::shell`]; both share this connection and therefore
//! the same authentication semantics.

use super::error::TransportError;
use super::identity::SessionIdentity;
use super::known_hosts::prepare_trust;
use super::shell::{ShellChannel, ShellHandle};
use super::transport::{ChannelKind, ChannelOf, Connection, Transport};

/// A session to one remote host.
///
/// Holds at most one live connection and at most one retained shell channel.
pub struct RemoteSession<T: Transport> {
    transport: T,
    identity: SessionIdentity,
    connection: Option<T::Connection>,
    pub(super) shell: Option<ShellChannel>,
}

impl<T: Transport> RemoteSession<T> {
    pub fn new(transport: T, identity: SessionIdentity) -> Self {
        Self {
            transport,
            identity,
            connection: None,
            shell: None,
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// Mutable access for the identity setters. Changes apply on the next `connect`.
    pub fn identity_mut(&mut self) -> &mut SessionIdentity {
        &mut self.identity
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Establish trust, open the session and authenticate.
    ///
    /// Calling this on a live session is a no-op. On failure no connection is
    /// retained.
    pub async fn connect(&mut self) -> Result<(), TransportError> {
        if self.is_connected() {
            tracing::debug!("Session to {} already connected", self.identity.hostname());
            return Ok(());
        }
        // A handle that reports closed is stale; drop it before reconnecting.
        self.connection = None;

        self.identity.validate()?;
        let server_check = prepare_trust(&self.identity).await?;

        tracing::debug!(
            "Connecting to {}@{}:{}",
            self.identity.username(),
            self.identity.hostname(),
            self.identity.port()
        );
        match self.transport.connect(&self.identity, &server_check).await {
            Ok(connection) => {
                self.connection = Some(connection);
                tracing::info!(
                    "Connected to {}:{}",
                    self.identity.hostname(),
                    self.identity.port()
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    "Connecting to {}:{} failed: {}",
                    self.identity.hostname(),
                    self.identity.port(),
                    e
                );
                Err(e)
            }
        }
    }

    /// Close the retained shell (if any) and the session.
    ///
    /// Idempotent: disconnecting a session that was never connected, or was
    /// already disconnected, succeeds without doing anything.
    pub async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.close_shell().await;

        let Some(connection) = self.connection.take() else {
            return Ok(());
        };
        if connection.is_closed() {
            tracing::debug!("Session was already closed by the remote side");
            return Ok(());
        }

        connection.disconnect().await?;
        tracing::info!("Disconnected from {}", self.identity.hostname());
        Ok(())
    }

    /// Whether a connection exists and has not been closed.
    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|connection| !connection.is_closed())
    }

    /// Open a channel on the live session.
    ///
    /// Fails with [`TransportError::NotConnected`] when there is no live
    /// session; this method never connects on its own.
    pub async fn open_channel(&self, kind: &ChannelKind) -> Result<ChannelOf<T>, TransportError> {
        match &self.connection {
            Some(connection) if !connection.is_closed() => connection.open_channel(kind).await,
            _ => Err(TransportError::NotConnected),
        }
    }

    /// Connect if there is no live session.
    ///
    /// This is the lazy-connect policy used by `execute` and `open_shell`.
    pub(super) async fn ensure_connected(&mut self) -> Result<(), TransportError> {
        if !self.is_connected() {
            tracing::debug!("Session not connected, connecting on demand");
            self.connect().await?;
        }
        Ok(())
    }

    /// Handle to the currently retained shell channel.
    pub fn shell_handle(&self) -> Option<ShellHandle> {
        self.shell.as_ref().map(|shell| shell.handle().clone())
    }

    /// Disconnect the retained shell channel, if any.
    pub async fn close_shell(&mut self) {
        if let Some(shell) = self.shell.take() {
            shell.disconnect().await;
        }
    }
}

impl<T: Transport + std::fmt::Debug> std::fmt::Debug for RemoteSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSession")
            .field("transport", &self.transport)
            .field("identity", &self.identity)
            .field("connected", &self.is_connected())
            .field("shell", &self.shell_handle())
            .finish()
    }
}
