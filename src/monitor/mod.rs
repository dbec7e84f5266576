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

//! Background line monitor for a remote shell.
//!
//! A [`LineMonitor`] owns a [`RemoteSession`]: it connects, starts a shell
//! fed by a script, and publishes every decoded output line into a
//! single-slot mailbox. Readers only ever see the most recent line; lines
//! overwritten before anyone looked are simply gone. The monitor stops on the
//! end-of-text sentinel, on end of stream, on a fault, or when asked to, and
//! every path runs the same cleanup exactly once before the task ends.

pub mod decoder;

pub use decoder::{LineDecoder, LineEvent, DEFAULT_MAX_LINE_BYTES, END_OF_TEXT};

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::ssh::{RemoteSession, StreamError, Transport, TransportError};

/// Lifecycle of a monitor task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Connecting and opening the shell.
    Starting,
    /// The shell is open and lines are being published.
    Streaming,
    /// Cleanup has finished; no more lines will be published.
    Stopped,
}

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Failed to start the remote shell: {0}")]
    Transport(#[from] TransportError),

    #[error("Shell output stream failed: {0}")]
    Stream(#[from] StreamError),
}

/// Why the monitor stopped.
#[derive(Debug)]
pub enum MonitorOutcome {
    /// The remote side wrote the end-of-text sentinel.
    Sentinel,
    /// [`MonitorHandle::stop`] was called.
    Cancelled,
    /// The output ended without a sentinel.
    EndOfStream,
    Failed(MonitorError),
}

impl MonitorOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// What a finished monitor hands back.
#[derive(Debug)]
pub struct MonitorReport<T: Transport> {
    pub outcome: MonitorOutcome,
    pub lines_published: u64,
    /// Mailbox content at the time the monitor stopped.
    pub last_line: Option<String>,
    /// The session, already disconnected, for reuse or inspection.
    pub session: RemoteSession<T>,
}

/// Configures and starts a monitor.
pub struct LineMonitor<T: Transport> {
    session: RemoteSession<T>,
    script: Box<dyn AsyncRead + Send + Unpin>,
    max_line_bytes: usize,
}

impl<T: Transport> LineMonitor<T> {
    /// Monitor the shell that `session` opens with `script` as its stdin.
    pub fn new<R>(session: RemoteSession<T>, script: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            session,
            script: Box::new(script),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }

    /// Lines longer than this are published in pieces.
    pub fn max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    /// Start the monitor task. Must be called from within a Tokio runtime.
    pub fn spawn(self) -> MonitorHandle<T> {
        let (latest_tx, latest_rx) = watch::channel(None);
        let (state_tx, state_rx) = watch::channel(MonitorState::Starting);
        let cancel = CancellationToken::new();
        let established = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(run(
            self,
            cancel.clone(),
            latest_tx,
            state_tx,
            established.clone(),
        ));

        MonitorHandle {
            latest: latest_rx,
            state: state_rx,
            cancel,
            established,
            task,
        }
    }
}

/// Caller's side of a running monitor.
pub struct MonitorHandle<T: Transport> {
    latest: watch::Receiver<Option<String>>,
    state: watch::Receiver<MonitorState>,
    cancel: CancellationToken,
    established: Arc<AtomicBool>,
    task: JoinHandle<MonitorReport<T>>,
}

impl<T: Transport> MonitorHandle<T> {
    /// The most recently published line, if any line was published yet.
    pub fn latest_line(&self) -> Option<String> {
        self.latest.borrow().clone()
    }

    /// Wait for a line newer than the last one this handle returned.
    ///
    /// Returns `None` once the monitor has stopped and every published line
    /// has been seen. Intermediate lines may be skipped.
    pub async fn next_line(&mut self) -> Option<String> {
        self.latest.changed().await.ok()?;
        self.latest.borrow_and_update().clone()
    }

    pub fn state(&self) -> MonitorState {
        *self.state.borrow()
    }

    pub fn is_streaming(&self) -> bool {
        self.state() == MonitorState::Streaming
    }

    /// Wait until the shell is open or the monitor gave up.
    ///
    /// Returns whether the shell was established, which stays true even if
    /// the monitor has already stopped again.
    pub async fn wait_until_streaming(&self) -> bool {
        let mut state = self.state.clone();
        let _ = state.wait_for(|s| *s != MonitorState::Starting).await;
        self.established.load(Ordering::SeqCst)
    }

    /// Ask the monitor to stop. Cleanup happens on the monitor task; use
    /// [`MonitorHandle::join`] to wait for it.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the monitor to finish and take back its session.
    pub async fn join(self) -> Result<MonitorReport<T>, JoinError> {
        self.task.await
    }

    /// Sample the latest line every `poll_interval` and hand each new value
    /// to `on_line` until the monitor finishes.
    ///
    /// `shutdown` is watched from the start, including while the session is
    /// still connecting; when it completes the monitor is stopped. The final
    /// line is always delivered before the report is returned.
    pub async fn follow<S, F>(
        self,
        poll_interval: Duration,
        shutdown: S,
        mut on_line: F,
    ) -> Result<MonitorReport<T>, JoinError>
    where
        S: Future<Output = ()>,
        F: FnMut(&str),
    {
        tokio::pin!(shutdown);
        let mut shown: Option<String> = None;

        let streaming = tokio::select! {
            streaming = self.wait_until_streaming() => streaming,
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested before the shell started");
                self.stop();
                false
            }
        };

        if streaming {
            let mut ticker = tokio::time::interval(poll_interval.max(Duration::from_millis(1)));
            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        tracing::info!("Shutdown requested, stopping monitor");
                        self.stop();
                        break;
                    }
                    _ = ticker.tick() => {
                        let latest = self.latest_line();
                        if latest != shown {
                            if let Some(line) = &latest {
                                on_line(line);
                            }
                            shown = latest;
                        }
                        if self.is_finished() {
                            break;
                        }
                    }
                }
            }
        }

        let report = self.join().await?;
        if report.last_line != shown {
            if let Some(line) = &report.last_line {
                on_line(line);
            }
        }
        Ok(report)
    }
}

async fn run<T: Transport>(
    monitor: LineMonitor<T>,
    cancel: CancellationToken,
    latest: watch::Sender<Option<String>>,
    state: watch::Sender<MonitorState>,
    established: Arc<AtomicBool>,
) -> MonitorReport<T> {
    let LineMonitor {
        mut session,
        script,
        max_line_bytes,
    } = monitor;
    let mut lines_published = 0u64;

    let outcome = stream_lines(
        &mut session,
        script,
        max_line_bytes,
        &cancel,
        &latest,
        &state,
        &established,
        &mut lines_published,
    )
    .await;

    match &outcome {
        MonitorOutcome::Failed(e) => tracing::error!("Monitor failed: {}", e),
        other => tracing::info!(
            "Monitor finished ({:?}) after {} lines",
            other,
            lines_published
        ),
    }

    // The one and only cleanup pass.
    session.close_shell().await;
    if let Err(e) = session.disconnect().await {
        tracing::warn!("Ignoring error while disconnecting: {}", e);
    }
    state.send_replace(MonitorState::Stopped);

    let last_line = latest.borrow().clone();
    MonitorReport {
        outcome,
        lines_published,
        last_line,
        session,
    }
}

#[allow(clippy::too_many_arguments)]
async fn stream_lines<T: Transport>(
    session: &mut RemoteSession<T>,
    script: Box<dyn AsyncRead + Send + Unpin>,
    max_line_bytes: usize,
    cancel: &CancellationToken,
    latest: &watch::Sender<Option<String>>,
    state: &watch::Sender<MonitorState>,
    established: &AtomicBool,
    lines_published: &mut u64,
) -> MonitorOutcome {
    if cancel.is_cancelled() {
        return MonitorOutcome::Cancelled;
    }

    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return MonitorOutcome::Cancelled,
        opened = open(session, script) => opened,
    };
    let output = match opened {
        Ok(output) => output,
        Err(e) => return MonitorOutcome::Failed(e.into()),
    };

    established.store(true, Ordering::SeqCst);
    state.send_replace(MonitorState::Streaming);
    tracing::debug!("Monitoring shell {}", output.shell_id());

    let mut decoder = LineDecoder::new(output).with_max_line_bytes(max_line_bytes);
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return MonitorOutcome::Cancelled,
            event = decoder.next_event() => event,
        };

        match event {
            Ok(LineEvent::Line(line)) => {
                tracing::debug!("{}", line);
                latest.send_replace(Some(line));
                *lines_published += 1;
            }
            Ok(LineEvent::Sentinel) => return MonitorOutcome::Sentinel,
            Ok(LineEvent::EndOfStream) => return MonitorOutcome::EndOfStream,
            Err(e) => {
                return MonitorOutcome::Failed(StreamError::io("reading shell output", e).into())
            }
        }
    }
}

async fn open<T: Transport>(
    session: &mut RemoteSession<T>,
    script: Box<dyn AsyncRead + Send + Unpin>,
) -> Result<crate::ssh::ShellOutput, TransportError> {
    session.connect().await?;
    session.open_shell(script).await
}
