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

//! The russh implementation of the transport traits.
//!
//! The heart of this module is [`SshTransport`]. It resolves the host,
//! performs the handshake and host key check, and authenticates, producing
//! an [`SshConnection`] whose channels are [`SshChannel`]s.

mod authentication;
mod channel;
mod connection;

pub use channel::SshChannel;
pub use connection::{ClientHandler, SshConnection, SshTransport};

// Re-export russh types commonly used with this module
pub use russh::client::Config;
