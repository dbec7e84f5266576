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

//! Scripted in-memory transport used by the unit tests.
//!
//! Every connection and channel it hands out is recorded so tests can assert
//! on connects, disconnects, channel closes and the exact bytes a remote
//! process would have read from stdin.

use async_trait::async_trait;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;

use super::error::{StreamError, TransportError};
use super::identity::SessionIdentity;
use super::known_hosts::ServerCheckMethod;
use super::transport::{ChannelEvent, ChannelKind, Connection, RemoteChannel, Transport};

/// An event a mock channel will deliver, or an injected read fault.
#[derive(Debug, Clone)]
pub enum MockEvent {
    Event(ChannelEvent),
    Fault,
}

impl MockEvent {
    pub fn data(bytes: impl AsRef<[u8]>) -> Self {
        Self::Event(ChannelEvent::Data(bytes.as_ref().to_vec()))
    }
}

#[derive(Default)]
struct MockState {
    reject_auth: bool,
    fail_shell_open: bool,
    exec_events: Vec<MockEvent>,
    shell_output: Vec<MockEvent>,
    connect_attempts: usize,
    connects: usize,
    disconnects: usize,
    connections: Vec<Arc<AtomicBool>>,
    channels: Vec<MockChannelControl>,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MockTransport")
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every authentication attempt.
    pub fn reject_auth(self) -> Self {
        self.state.lock().unwrap().reject_auth = true;
        self
    }

    /// Refuse to open shell channels.
    pub fn fail_shell_open(self) -> Self {
        self.state.lock().unwrap().fail_shell_open = true;
        self
    }

    /// Events every exec channel delivers before ending.
    pub fn with_exec_events(self, events: Vec<MockEvent>) -> Self {
        self.state.lock().unwrap().exec_events = events;
        self
    }

    /// Output every shell channel delivers right after opening. The channel
    /// stays open afterwards until closed by either side.
    pub fn with_shell_output(self, events: Vec<MockEvent>) -> Self {
        self.state.lock().unwrap().shell_output = events;
        self
    }

    pub fn connect_attempts(&self) -> usize {
        self.state.lock().unwrap().connect_attempts
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn disconnects(&self) -> usize {
        self.state.lock().unwrap().disconnects
    }

    /// Controls for every channel opened so far, in open order.
    pub fn channels(&self) -> Vec<MockChannelControl> {
        self.state.lock().unwrap().channels.clone()
    }

    /// Simulate the server dropping every live connection.
    pub fn drop_connections(&self) {
        for closed in &self.state.lock().unwrap().connections {
            closed.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Connection = MockConnection;

    async fn connect(
        &self,
        _identity: &SessionIdentity,
        _server_check: &ServerCheckMethod,
    ) -> Result<MockConnection, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.connect_attempts += 1;
        if state.reject_auth {
            return Err(TransportError::PasswordWrong);
        }
        state.connects += 1;
        let closed = Arc::new(AtomicBool::new(false));
        state.connections.push(closed.clone());
        Ok(MockConnection {
            state: self.state.clone(),
            closed,
        })
    }
}

pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Connection for MockConnection {
    type Channel = MockChannel;

    async fn open_channel(&self, kind: &ChannelKind) -> Result<MockChannel, TransportError> {
        let mut state = self.state.lock().unwrap();
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        if *kind == ChannelKind::Shell && state.fail_shell_open {
            return Err(TransportError::ChannelOpen {
                kind: kind.name(),
                reason: "administratively prohibited".to_string(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let preload = match kind {
            ChannelKind::Exec(_) => state.exec_events.clone(),
            ChannelKind::Shell => state.shell_output.clone(),
        };
        for event in preload {
            let _ = tx.send(event);
        }

        let shared = Arc::new(ChannelShared {
            input: Mutex::new(Vec::new()),
            eof: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            // Exec channels end once their scripted events are drained.
            sender: Mutex::new(matches!(kind, ChannelKind::Shell).then_some(tx)),
        });
        state.channels.push(MockChannelControl {
            kind: kind.clone(),
            shared: shared.clone(),
        });

        Ok(MockChannel { events: rx, shared })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        self.state.lock().unwrap().disconnects += 1;
        Ok(())
    }
}

#[derive(Debug)]
struct ChannelShared {
    input: Mutex<Vec<u8>>,
    eof: AtomicBool,
    closed: AtomicBool,
    close_calls: AtomicUsize,
    sender: Mutex<Option<mpsc::UnboundedSender<MockEvent>>>,
}

/// Test-side view of one opened channel.
#[derive(Clone)]
pub struct MockChannelControl {
    kind: ChannelKind,
    shared: Arc<ChannelShared>,
}

impl MockChannelControl {
    pub fn kind(&self) -> &ChannelKind {
        &self.kind
    }

    /// Everything written to the channel's stdin so far.
    pub fn input(&self) -> Vec<u8> {
        self.shared.input.lock().unwrap().clone()
    }

    pub fn eof_received(&self) -> bool {
        self.shared.eof.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.shared.close_calls.load(Ordering::SeqCst)
    }

    /// Deliver more output from the remote side.
    pub fn emit(&self, bytes: impl AsRef<[u8]>) {
        self.push(MockEvent::data(bytes));
    }

    /// Make the next read fail.
    pub fn fault(&self) {
        self.push(MockEvent::Fault);
    }

    /// Remote side closes: remaining events drain, then the channel ends.
    pub fn hang_up(&self) {
        self.shared.sender.lock().unwrap().take();
    }

    fn push(&self, event: MockEvent) {
        if let Some(tx) = self.shared.sender.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }
}

#[derive(Debug)]
pub struct MockChannel {
    events: mpsc::UnboundedReceiver<MockEvent>,
    shared: Arc<ChannelShared>,
}

#[async_trait]
impl RemoteChannel for MockChannel {
    async fn send(&mut self, data: &[u8]) -> Result<(), StreamError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(StreamError::ChannelClosed);
        }
        self.shared.input.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    async fn send_eof(&mut self) -> Result<(), StreamError> {
        self.shared.eof.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<ChannelEvent>, StreamError> {
        match self.events.recv().await {
            Some(MockEvent::Event(event)) => Ok(Some(event)),
            Some(MockEvent::Fault) => Err(StreamError::io(
                "mock channel",
                io::Error::new(io::ErrorKind::ConnectionReset, "injected fault"),
            )),
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.shared.close_calls.fetch_add(1, Ordering::SeqCst);
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.sender.lock().unwrap().take();
        Ok(())
    }
}

/// Script source that yields `prefix` and then fails every further read.
#[derive(Debug)]
pub struct FailingReader {
    prefix: Option<Vec<u8>>,
}

impl FailingReader {
    pub fn after(prefix: impl AsRef<[u8]>) -> Self {
        Self {
            prefix: Some(prefix.as_ref().to_vec()),
        }
    }
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.prefix.take() {
            Some(prefix) => {
                buf.put_slice(&prefix);
                Poll::Ready(Ok(()))
            }
            None => Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "disk gone"))),
        }
    }
}
