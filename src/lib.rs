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

//! Remote command execution and shell output monitoring over SSH.
//!
//! [`ssh::RemoteSession`] runs one-shot commands and bridges interactive
//! shells into plain byte streams; [`monitor::LineMonitor`] watches such a
//! stream in the background and keeps the latest output line.

pub mod cli;
pub mod config;
pub mod monitor;
pub mod ssh;
pub mod utils;

pub use cli::Cli;
pub use config::Profile;
pub use monitor::{LineMonitor, MonitorHandle, MonitorOutcome, MonitorReport, MonitorState};
pub use ssh::{CommandOutput, RemoteSession, SessionIdentity, SshSession, SshTransport, TransportError};
