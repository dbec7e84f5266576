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

//! Credentials and host identity for a single transport session.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use zeroize::Zeroizing;

use super::error::TransportError;
use super::known_hosts::StrictHostKeyChecking;

pub const DEFAULT_SSH_PORT: u16 = 22;

/// The credential presented during authentication.
///
/// Exactly one credential is active at a time.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Password(Zeroizing<String>),
    PrivateKeyFile {
        path: PathBuf,
        passphrase: Option<Zeroizing<String>>,
    },
}

impl Credential {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Password(_) => "password",
            Self::PrivateKeyFile { .. } => "private key",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(<redacted>)"),
            Self::PrivateKeyFile { path, passphrase } => f
                .debug_struct("PrivateKeyFile")
                .field("path", path)
                .field("passphrase", &passphrase.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

/// Who connects, where, and how trust is established.
///
/// Fields only change through the explicit setters below.
#[derive(Clone)]
pub struct SessionIdentity {
    username: String,
    credential: Option<Credential>,
    /// Passphrase remembered separately so it survives `set_private_key`.
    passphrase: Option<Zeroizing<String>>,
    known_hosts: Option<PathBuf>,
    host_key_checking: StrictHostKeyChecking,
    hostname: String,
    port: u16,
    timeout_ms: u64,
}

impl SessionIdentity {
    /// Identity authenticating with a password.
    pub fn with_password(
        username: impl Into<String>,
        password: impl Into<String>,
        hostname: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            username: username.into(),
            credential: Some(Credential::Password(Zeroizing::new(password.into()))),
            passphrase: None,
            known_hosts: None,
            host_key_checking: StrictHostKeyChecking::default(),
            hostname: hostname.into(),
            port,
            timeout_ms: 0,
        }
    }

    /// Identity authenticating with a private key file.
    pub fn with_private_key(
        username: impl Into<String>,
        key_path: impl AsRef<Path>,
        passphrase: Option<&str>,
        hostname: impl Into<String>,
        port: u16,
    ) -> Self {
        let passphrase = passphrase.map(|p| Zeroizing::new(p.to_string()));
        Self {
            username: username.into(),
            credential: Some(Credential::PrivateKeyFile {
                path: key_path.as_ref().to_path_buf(),
                passphrase: passphrase.clone(),
            }),
            passphrase,
            known_hosts: None,
            host_key_checking: StrictHostKeyChecking::default(),
            hostname: hostname.into(),
            port,
            timeout_ms: 0,
        }
    }

    /// Identity with host fields only; a credential must be set before connecting.
    pub fn new(username: impl Into<String>, hostname: impl Into<String>, port: u16) -> Self {
        Self {
            username: username.into(),
            credential: None,
            passphrase: None,
            known_hosts: None,
            host_key_checking: StrictHostKeyChecking::default(),
            hostname: hostname.into(),
            port,
            timeout_ms: 0,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn known_hosts(&self) -> Option<&Path> {
        self.known_hosts.as_deref()
    }

    pub fn host_key_checking(&self) -> StrictHostKeyChecking {
        self.host_key_checking
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Connect timeout, `None` when configured as 0.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = username.into();
    }

    /// Make password authentication the active credential.
    pub fn set_password(&mut self, password: impl Into<String>) {
        self.credential = Some(Credential::Password(Zeroizing::new(password.into())));
    }

    /// Make key authentication the active credential, reusing any stored passphrase.
    pub fn set_private_key(&mut self, key_path: impl AsRef<Path>) {
        self.credential = Some(Credential::PrivateKeyFile {
            path: key_path.as_ref().to_path_buf(),
            passphrase: self.passphrase.clone(),
        });
    }

    pub fn set_passphrase(&mut self, passphrase: Option<&str>) {
        self.passphrase = passphrase.map(|p| Zeroizing::new(p.to_string()));
        if let Some(Credential::PrivateKeyFile { passphrase, .. }) = &mut self.credential {
            *passphrase = self.passphrase.clone();
        }
    }

    pub fn set_known_hosts(&mut self, path: Option<PathBuf>) {
        self.known_hosts = path;
    }

    pub fn set_host_key_checking(&mut self, mode: StrictHostKeyChecking) {
        self.host_key_checking = mode;
    }

    pub fn set_hostname(&mut self, hostname: impl Into<String>) {
        self.hostname = hostname.into();
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    pub fn set_timeout_ms(&mut self, timeout_ms: u64) {
        self.timeout_ms = timeout_ms;
    }

    /// Check that everything `connect` needs is populated.
    pub fn validate(&self) -> Result<&Credential, TransportError> {
        if self.username.trim().is_empty() {
            return Err(TransportError::IncompleteIdentity("username"));
        }
        if self.hostname.trim().is_empty() {
            return Err(TransportError::IncompleteIdentity("hostname"));
        }
        if self.port == 0 {
            return Err(TransportError::IncompleteIdentity("port"));
        }
        self.credential
            .as_ref()
            .ok_or(TransportError::IncompleteIdentity("credential"))
    }
}

impl fmt::Debug for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIdentity")
            .field("username", &self.username)
            .field("credential", &self.credential)
            .field("known_hosts", &self.known_hosts)
            .field("host_key_checking", &self.host_key_checking)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}
