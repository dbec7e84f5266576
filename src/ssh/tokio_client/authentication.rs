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

//! SSH authentication for an established handshake.
//!
//! Supports the two credentials a [`SessionIdentity`] can carry:
//! - Password authentication
//! - Private key file authentication (optionally passphrase protected)
//!
//! [`SessionIdentity`]: crate::ssh::SessionIdentity

use russh::client::{Handle, Handler};
use std::sync::Arc;

use crate::ssh::error::TransportError;
use crate::ssh::identity::Credential;

/// Perform authentication with the given credential on a fresh handle.
pub(super) async fn authenticate<H: Handler>(
    handle: &mut Handle<H>,
    username: &str,
    credential: &Credential,
) -> Result<(), TransportError> {
    match credential {
        Credential::Password(password) => {
            let is_authentificated = handle
                .authenticate_password(username, password.as_str())
                .await?;
            if !is_authentificated.success() {
                return Err(TransportError::PasswordWrong);
            }
        }
        Credential::PrivateKeyFile { path, passphrase } => {
            let cprivk =
                russh::keys::load_secret_key(path, passphrase.as_ref().map(|p| p.as_str()))?;
            let is_authentificated = handle
                .authenticate_publickey(
                    username,
                    russh::keys::PrivateKeyWithHashAlg::new(
                        Arc::new(cprivk),
                        handle.best_supported_rsa_hash().await?.flatten(),
                    ),
                )
                .await?;
            if !is_authentificated.success() {
                return Err(TransportError::KeyAuthFailed);
            }
        }
    }

    tracing::debug!("Authenticated as {} using {}", username, credential.kind());
    Ok(())
}
