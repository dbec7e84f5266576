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

//! SSH channel operations for exec and shell channels.

use async_trait::async_trait;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use std::collections::VecDeque;

use crate::ssh::error::{StreamError, TransportError};
use crate::ssh::transport::{ChannelEvent, ChannelKind, RemoteChannel};

/// A russh session channel that has been asked to run a command or a shell.
pub struct SshChannel {
    inner: Channel<Msg>,
    /// Events that arrived while waiting for the request reply.
    early: VecDeque<ChannelEvent>,
}

impl SshChannel {
    /// Issue the request for `kind` and wait for the server to accept it.
    pub(super) async fn start(
        channel: Channel<Msg>,
        kind: &ChannelKind,
    ) -> Result<Self, TransportError> {
        let mut channel = Self {
            inner: channel,
            early: VecDeque::new(),
        };

        match kind {
            ChannelKind::Exec(command) => channel.inner.exec(true, command.as_str()).await?,
            ChannelKind::Shell => channel.inner.request_shell(true).await?,
        }
        channel.await_reply(kind).await?;

        tracing::debug!("Opened {} channel {:?}", kind, channel.inner.id());
        Ok(channel)
    }

    async fn await_reply(&mut self, kind: &ChannelKind) -> Result<(), TransportError> {
        loop {
            match self.inner.wait().await {
                Some(ChannelMsg::Success) => return Ok(()),
                Some(ChannelMsg::Failure) => {
                    return Err(TransportError::ChannelOpen {
                        kind: kind.name(),
                        reason: "request rejected by server".to_string(),
                    })
                }
                Some(msg) => {
                    if let Some(event) = translate(msg) {
                        self.early.push_back(event);
                    }
                }
                None => {
                    return Err(TransportError::ChannelOpen {
                        kind: kind.name(),
                        reason: "channel closed before the request was answered".to_string(),
                    })
                }
            }
        }
    }
}

fn translate(msg: ChannelMsg) -> Option<ChannelEvent> {
    match msg {
        ChannelMsg::Data { data } => Some(ChannelEvent::Data(data.to_vec())),
        ChannelMsg::ExtendedData { data, ext } => Some(ChannelEvent::ExtendedData {
            ext,
            data: data.to_vec(),
        }),
        ChannelMsg::ExitStatus { exit_status } => Some(ChannelEvent::ExitStatus(exit_status)),
        ChannelMsg::Eof => Some(ChannelEvent::Eof),
        ChannelMsg::Close => Some(ChannelEvent::Close),
        _ => None,
    }
}

#[async_trait]
impl RemoteChannel for SshChannel {
    async fn send(&mut self, data: &[u8]) -> Result<(), StreamError> {
        self.inner.data(data).await.map_err(StreamError::Protocol)
    }

    async fn send_eof(&mut self) -> Result<(), StreamError> {
        self.inner.eof().await.map_err(StreamError::Protocol)
    }

    async fn recv(&mut self) -> Result<Option<ChannelEvent>, StreamError> {
        if let Some(event) = self.early.pop_front() {
            return Ok(Some(event));
        }
        // Window adjustments and request replies carry nothing for the caller.
        while let Some(msg) = self.inner.wait().await {
            if let Some(event) = translate(msg) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.inner.close().await.map_err(StreamError::Protocol)
    }
}
