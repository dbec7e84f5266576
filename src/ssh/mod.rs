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

//! SSH transport session, command execution and the shell stream bridge.

mod error;
mod executor;
mod identity;
pub mod known_hosts;
#[cfg(test)]
pub(crate) mod mock;
mod session;
mod shell;
pub mod tokio_client;
pub mod transport;

pub use error::{StreamError, TransportError};
pub use executor::CommandOutput;
pub use identity::{Credential, SessionIdentity, DEFAULT_SSH_PORT};
pub use known_hosts::{ServerCheckMethod, StrictHostKeyChecking};
pub use session::RemoteSession;
pub use shell::{ShellHandle, ShellOutput};
pub use tokio_client::{SshChannel, SshConnection, SshTransport};
pub use transport::{ChannelEvent, ChannelKind, ChannelOf, Connection, RemoteChannel, Transport};

/// A session over the russh-backed transport.
pub type SshSession = RemoteSession<SshTransport>;
