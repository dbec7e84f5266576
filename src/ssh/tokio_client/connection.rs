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

//! SSH connection management and establishment.
//!
//! This module handles the low-level SSH connection establishment,
//! including address resolution, connection attempts, and initial handshake.

use async_trait::async_trait;
use russh::client::{Config, Handle, Handler};
use std::fmt::Debug;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use super::channel::SshChannel;
use crate::ssh::error::TransportError;
use crate::ssh::identity::SessionIdentity;
use crate::ssh::known_hosts::ServerCheckMethod;
use crate::ssh::transport::{ChannelKind, Connection, Transport};

/// russh-backed [`Transport`].
///
/// # Examples
///
/// ```no_run
/// use sshmon::ssh::{RemoteSession, SessionIdentity, SshTransport};
/// #[tokio::main]
/// async fn main() -> Result<(), sshmon::ssh::TransportError> {
///     let identity = SessionIdentity::with_password("root", "root", "10.10.10.2", 22);
///     let mut session = RemoteSession::new(SshTransport::default(), identity);
///
///     let output = session.execute("echo Hello SSH").await?;
///     assert_eq!(output.stdout_string(), "Hello SSH\n");
///
///     session.disconnect().await
/// }
/// ```
#[derive(Clone)]
pub struct SshTransport {
    config: Arc<Config>,
}

impl SshTransport {
    /// Use a non default [`russh::client::Config`].
    pub fn with_config(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl Default for SshTransport {
    fn default() -> Self {
        Self::with_config(Config::default())
    }
}

impl Debug for SshTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTransport").finish_non_exhaustive()
    }
}

impl SshTransport {
    async fn handshake(
        &self,
        identity: &SessionIdentity,
        server_check: &ServerCheckMethod,
    ) -> Result<SshConnection, TransportError> {
        let credential = identity.validate()?;
        let hostname = identity.hostname().to_string();

        let socket_addrs: Vec<SocketAddr> =
            tokio::net::lookup_host((hostname.as_str(), identity.port()))
                .await
                .map_err(|source| TransportError::AddressInvalid {
                    host: hostname.clone(),
                    source,
                })?
                .collect();

        // Connection code inspired from std::net::TcpStream::connect and std::net::each_addr
        let mut connect_res = Err(TransportError::AddressInvalid {
            host: hostname.clone(),
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                "could not resolve to any addresses",
            ),
        });
        for socket_addr in socket_addrs {
            let handler = ClientHandler::new(hostname.clone(), socket_addr, server_check.clone());
            match russh::client::connect(self.config.clone(), socket_addr, handler).await {
                Ok(h) => {
                    connect_res = Ok((socket_addr, h));
                    break;
                }
                Err(e) => {
                    tracing::debug!("Connection attempt to {} failed: {}", socket_addr, e);
                    connect_res = Err(e);
                }
            }
        }
        let (address, mut handle) = connect_res?;

        super::authentication::authenticate(&mut handle, identity.username(), credential).await?;

        Ok(SshConnection {
            handle,
            username: identity.username().to_string(),
            address,
        })
    }
}

#[async_trait]
impl Transport for SshTransport {
    type Connection = SshConnection;

    async fn connect(
        &self,
        identity: &SessionIdentity,
        server_check: &ServerCheckMethod,
    ) -> Result<SshConnection, TransportError> {
        match identity.timeout() {
            Some(timeout) => tokio::time::timeout(timeout, self.handshake(identity, server_check))
                .await
                .map_err(|_| TransportError::ConnectTimeout {
                    host: identity.hostname().to_string(),
                    port: identity.port(),
                    timeout_ms: identity.timeout_ms(),
                })?,
            None => self.handshake(identity, server_check).await,
        }
    }
}

/// A ssh connection to a remote server.
pub struct SshConnection {
    handle: Handle<ClientHandler>,
    username: String,
    address: SocketAddr,
}

impl Debug for SshConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConnection")
            .field("username", &self.username)
            .field("address", &self.address)
            .field("handle", &"Handle<ClientHandler>")
            .finish()
    }
}

#[async_trait]
impl Connection for SshConnection {
    type Channel = SshChannel;

    async fn open_channel(&self, kind: &ChannelKind) -> Result<SshChannel, TransportError> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| TransportError::ChannelOpen {
                kind: kind.name(),
                reason: e.to_string(),
            })?;

        SshChannel::start(channel, kind).await
    }

    fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.handle
            .disconnect(russh::Disconnect::ByApplication, "", "")
            .await
            .map_err(TransportError::Ssh)
    }
}

/// SSH client handler for managing server key verification.
#[derive(Debug, Clone)]
pub struct ClientHandler {
    hostname: String,
    host: SocketAddr,
    server_check: ServerCheckMethod,
}

impl ClientHandler {
    /// Create a new client handler.
    pub fn new(hostname: String, host: SocketAddr, server_check: ServerCheckMethod) -> Self {
        Self {
            hostname,
            host,
            server_check,
        }
    }
}

impl Handler for ClientHandler {
    type Error = TransportError;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        match &self.server_check {
            ServerCheckMethod::NoCheck => Ok(true),
            ServerCheckMethod::KnownHostsFile(known_hosts_path) => {
                let result = russh::keys::check_known_hosts_path(
                    &self.hostname,
                    self.host.port(),
                    server_public_key,
                    known_hosts_path,
                )
                .map_err(|_| TransportError::ServerCheckFailed)?;

                Ok(result)
            }
            ServerCheckMethod::DefaultKnownHostsFile => {
                let result = russh::keys::check_known_hosts(
                    &self.hostname,
                    self.host.port(),
                    server_public_key,
                )
                .map_err(|_| TransportError::ServerCheckFailed)?;

                Ok(result)
            }
        }
    }
}
