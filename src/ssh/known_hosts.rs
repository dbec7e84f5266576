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

use directories::BaseDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::error::TransportError;
use super::identity::SessionIdentity;
use crate::config::expand_tilde;

/// How the server's host key is verified during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServerCheckMethod {
    NoCheck,
    KnownHostsFile(PathBuf),
    DefaultKnownHostsFile,
}

/// Mode for host key checking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrictHostKeyChecking {
    /// Always verify host keys (fail on unknown/changed)
    #[default]
    Yes,
    /// Load the trust store but accept any host key
    No,
}

impl FromStr for StrictHostKeyChecking {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "no" | "false" => Self::No,
            _ => Self::Yes,
        })
    }
}

/// Get the default known_hosts file path
pub fn get_default_known_hosts_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.home_dir().join(".ssh").join("known_hosts"))
}

/// Read a known_hosts file and return the number of host entries in it.
pub async fn load_trust_store(path: &Path) -> Result<usize, TransportError> {
    let content =
        tokio::fs::read_to_string(path)
            .await
            .map_err(|source| TransportError::TrustStore {
                path: path.to_path_buf(),
                source,
            })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .count())
}

/// Load the identity's trust store and decide how the host key is checked.
///
/// A configured known_hosts path is always loaded, even when checking is
/// relaxed, so an unreadable file fails the connect attempt up front.
pub async fn prepare_trust(identity: &SessionIdentity) -> Result<ServerCheckMethod, TransportError> {
    let mode = identity.host_key_checking();

    match identity.known_hosts() {
        Some(path) => {
            let path = expand_tilde(path);
            let entries = load_trust_store(&path).await?;
            tracing::debug!("Loaded {} known host entries from {:?}", entries, path);

            Ok(match mode {
                StrictHostKeyChecking::Yes => ServerCheckMethod::KnownHostsFile(path),
                StrictHostKeyChecking::No => {
                    tracing::debug!("Host key checking disabled (strict mode = no)");
                    ServerCheckMethod::NoCheck
                }
            })
        }
        None => match mode {
            StrictHostKeyChecking::Yes => {
                let path =
                    get_default_known_hosts_path().ok_or(TransportError::TrustStoreUnavailable)?;
                let entries = load_trust_store(&path).await?;
                tracing::debug!(
                    "Using default known_hosts file {:?} ({} entries, strict mode)",
                    path,
                    entries
                );
                Ok(ServerCheckMethod::DefaultKnownHostsFile)
            }
            StrictHostKeyChecking::No => {
                tracing::warn!("No known_hosts file configured, host key verification disabled");
                Ok(ServerCheckMethod::NoCheck)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn identity() -> SessionIdentity {
        SessionIdentity::with_password("deploy", "secret", "example.com", 22)
    }

    #[test]
    fn test_strict_host_key_checking_from_str() {
        assert_eq!(
            StrictHostKeyChecking::from_str("yes").unwrap(),
            StrictHostKeyChecking::Yes
        );
        assert_eq!(
            StrictHostKeyChecking::from_str("TRUE").unwrap(),
            StrictHostKeyChecking::Yes
        );
        assert_eq!(
            StrictHostKeyChecking::from_str("no").unwrap(),
            StrictHostKeyChecking::No
        );
        assert_eq!(
            StrictHostKeyChecking::from_str("false").unwrap(),
            StrictHostKeyChecking::No
        );
        assert_eq!(
            StrictHostKeyChecking::from_str("invalid").unwrap(),
            StrictHostKeyChecking::Yes
        );
    }

    #[test]
    fn test_strict_host_key_checking_default() {
        assert_eq!(StrictHostKeyChecking::default(), StrictHostKeyChecking::Yes);
    }

    #[tokio::test]
    async fn test_load_trust_store_counts_entries() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "example.com ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIA").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "[example.com]:2222 ssh-rsa AAAAB3NzaC1yc2E").unwrap();

        assert_eq!(load_trust_store(file.path()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_configured_file_enforced_in_strict_mode() {
        let file = NamedTempFile::new().unwrap();
        let mut identity = identity();
        identity.set_known_hosts(Some(file.path().to_path_buf()));

        let method = prepare_trust(&identity).await.unwrap();
        assert_eq!(
            method,
            ServerCheckMethod::KnownHostsFile(file.path().to_path_buf())
        );
    }

    #[tokio::test]
    async fn test_configured_file_loaded_even_when_relaxed() {
        let dir = tempfile::tempdir().unwrap();
        let mut identity = identity();
        identity.set_host_key_checking(StrictHostKeyChecking::No);
        identity.set_known_hosts(Some(dir.path().join("missing_known_hosts")));

        let err = prepare_trust(&identity).await.unwrap_err();
        assert!(matches!(err, TransportError::TrustStore { .. }));
    }

    #[tokio::test]
    async fn test_relaxed_mode_without_file_skips_check() {
        let mut identity = identity();
        identity.set_host_key_checking(StrictHostKeyChecking::No);

        assert_eq!(
            prepare_trust(&identity).await.unwrap(),
            ServerCheckMethod::NoCheck
        );
    }
}
