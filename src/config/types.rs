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

//! Configuration type definitions.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::loader::DEFAULT_POLL_INTERVAL_MS;
use super::utils::{expand_tilde, get_current_username};
use crate::monitor::DEFAULT_MAX_LINE_BYTES;
use crate::ssh::{SessionIdentity, StrictHostKeyChecking, DEFAULT_SSH_PORT};

/// Connection profile, read from YAML and overridden by command-line flags.
///
/// Every field is optional so that a profile and its overrides can be
/// layered with [`Profile::merge`].
#[derive(Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Profile {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Takes precedence over `password` when both are set.
    pub private_key: Option<PathBuf>,
    pub passphrase: Option<String>,
    pub known_hosts: Option<PathBuf>,
    /// `yes` or `no`; anything else means `yes`.
    pub strict_host_key_checking: Option<String>,
    /// Connect and authentication timeout; `0` waits indefinitely.
    pub timeout_ms: Option<u64>,
    pub max_line_bytes: Option<usize>,
    pub poll_interval_ms: Option<u64>,
}

impl Profile {
    /// Layer `overrides` on top of this profile: every field set in
    /// `overrides` wins.
    pub fn merge(self, overrides: Profile) -> Profile {
        Profile {
            host: overrides.host.or(self.host),
            port: overrides.port.or(self.port),
            user: overrides.user.or(self.user),
            password: overrides.password.or(self.password),
            private_key: overrides.private_key.or(self.private_key),
            passphrase: overrides.passphrase.or(self.passphrase),
            known_hosts: overrides.known_hosts.or(self.known_hosts),
            strict_host_key_checking: overrides
                .strict_host_key_checking
                .or(self.strict_host_key_checking),
            timeout_ms: overrides.timeout_ms.or(self.timeout_ms),
            max_line_bytes: overrides.max_line_bytes.or(self.max_line_bytes),
            poll_interval_ms: overrides.poll_interval_ms.or(self.poll_interval_ms),
        }
    }

    pub fn max_line_bytes(&self) -> usize {
        self.max_line_bytes.unwrap_or(DEFAULT_MAX_LINE_BYTES)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(
            self.poll_interval_ms
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS)
                .max(1),
        )
    }

    pub fn host_key_checking(&self) -> StrictHostKeyChecking {
        self.strict_host_key_checking
            .as_deref()
            .and_then(|mode| mode.parse().ok())
            .unwrap_or_default()
    }

    /// Build the session identity, naming the first missing field.
    ///
    /// The user falls back to the local login name.
    pub fn into_identity(self) -> Result<SessionIdentity> {
        let Some(host) = self.host.clone().filter(|h| !h.is_empty()) else {
            bail!("No host configured. Pass --host or set 'host' in the profile.");
        };
        let Some(user) = self.user.clone().or_else(get_current_username) else {
            bail!("No user configured. Pass --user or set 'user' in the profile.");
        };
        let port = self.port.unwrap_or(DEFAULT_SSH_PORT);

        let mut identity = match (&self.private_key, &self.password) {
            (Some(key), _) => SessionIdentity::with_private_key(
                &user,
                expand_tilde(key),
                self.passphrase.as_deref(),
                &host,
                port,
            ),
            (None, Some(password)) => SessionIdentity::with_password(&user, password, &host, port),
            (None, None) => bail!(
                "No credential configured. Pass --identity or --password, or set 'private_key' or 'password' in the profile."
            ),
        };

        identity.set_known_hosts(self.known_hosts.as_deref().map(expand_tilde));
        identity.set_host_key_checking(self.host_key_checking());
        identity.set_timeout_ms(self.timeout_ms.unwrap_or(0));
        Ok(identity)
    }
}

impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |secret: &Option<String>| secret.as_ref().map(|_| "<redacted>");
        f.debug_struct("Profile")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &redact(&self.password))
            .field("private_key", &self.private_key)
            .field("passphrase", &redact(&self.passphrase))
            .field("known_hosts", &self.known_hosts)
            .field("strict_host_key_checking", &self.strict_host_key_checking)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_line_bytes", &self.max_line_bytes)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .finish()
    }
}
