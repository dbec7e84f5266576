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

//! Error types for the transport session and its channel streams.
//!
//! # Error Categories
//!
//! - [`TransportError`]: authentication, handshake, trust-store and
//!   channel-open failures. Terminal for the current operation, never retried.
//! - [`StreamError`]: I/O faults while moving bytes through a channel or the
//!   shell output pipe.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while establishing or using a transport session.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A required identity field was not populated before `connect`.
    #[error("session identity is incomplete: {0} is not set")]
    IncompleteIdentity(&'static str),

    /// The known-hosts file could not be read.
    #[error("failed to read known hosts file {}: {source}", path.display())]
    TrustStore {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No known-hosts path was configured and none could be derived.
    #[error("no known hosts file available for strict host key checking")]
    TrustStoreUnavailable,

    /// The host name did not resolve to any usable address.
    #[error("unable to resolve {host}: {source}")]
    AddressInvalid {
        host: String,
        #[source]
        source: io::Error,
    },

    /// Handshake and authentication did not finish within the configured timeout.
    #[error("connection to {host}:{port} timed out after {timeout_ms} ms")]
    ConnectTimeout {
        host: String,
        port: u16,
        timeout_ms: u64,
    },

    /// The server's host key did not match the trust store.
    #[error("host key verification failed")]
    ServerCheckFailed,

    #[error("password authentication was rejected")]
    PasswordWrong,

    #[error("public key authentication was rejected")]
    KeyAuthFailed,

    /// The private key could not be loaded or decrypted.
    #[error("unable to load private key: {0}")]
    KeyInvalid(#[from] russh::keys::Error),

    /// An operation that needs a live session was invoked without one.
    #[error("session is not connected")]
    NotConnected,

    /// The server refused or failed to set up a channel.
    #[error("failed to open {kind} channel: {reason}")]
    ChannelOpen { kind: &'static str, reason: String },

    /// Reading or writing a channel failed mid-operation.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Any other protocol-level failure reported by russh.
    #[error("SSH protocol error: {0}")]
    Ssh(#[from] russh::Error),
}

/// Failures while moving bytes through a channel or pipe.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("I/O error on {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    /// The remote side went away while data was still being exchanged.
    #[error("channel closed unexpectedly")]
    ChannelClosed,

    #[error("SSH channel error: {0}")]
    Protocol(#[source] russh::Error),
}

impl StreamError {
    pub fn io(context: &'static str, source: io::Error) -> Self {
        Self::Io { context, source }
    }
}
