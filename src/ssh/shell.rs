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

//! Bridge between an interactive shell channel and an ordinary byte stream.
//!
//! The channel delivers output as discrete messages. A pump task per shell
//! copies the caller's script into the channel's stdin and the channel's
//! stdout/stderr into an in-process pipe, so consumers only ever see a plain
//! [`AsyncRead`].

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::error::TransportError;
use super::session::RemoteSession;
use super::transport::{ChannelEvent, ChannelKind, RemoteChannel, Transport};

/// Capacity of the in-process pipe between the channel and its reader.
/// A full pipe applies backpressure to the channel.
const SHELL_PIPE_CAPACITY: usize = 64 * 1024;

/// Chunk size for forwarding script bytes to the remote stdin.
const SCRIPT_CHUNK_SIZE: usize = 4096;

static NEXT_SHELL_ID: AtomicU64 = AtomicU64::new(1);

/// Cloneable view of a retained shell channel.
#[derive(Debug, Clone)]
pub struct ShellHandle {
    id: u64,
    cancel: CancellationToken,
    finished: Arc<AtomicBool>,
}

impl ShellHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// False once the channel has been disconnected or has ended.
    pub fn is_connected(&self) -> bool {
        !self.cancel.is_cancelled() && !self.finished.load(Ordering::SeqCst)
    }
}

/// The retained shell: its handle plus the pump task that owns the channel.
pub(crate) struct ShellChannel {
    handle: ShellHandle,
    pump: JoinHandle<()>,
}

impl ShellChannel {
    pub(crate) fn handle(&self) -> &ShellHandle {
        &self.handle
    }

    /// Stop the pump and wait until it has closed the channel.
    pub(crate) async fn disconnect(self) {
        self.handle.cancel.cancel();
        if let Err(e) = self.pump.await {
            tracing::warn!("Shell {} pump task ended abnormally: {}", self.handle.id, e);
        }
        tracing::debug!("Shell channel {} disconnected", self.handle.id);
    }
}

/// Why the pump stopped abnormally, surfaced to the pipe's reader.
type FaultSlot = Arc<Mutex<Option<String>>>;

/// Read side of the shell output pipe.
///
/// Reaches end of stream once the shell channel has ended or been
/// disconnected. If the channel failed instead, the read that would have
/// returned end of stream fails with [`io::ErrorKind::BrokenPipe`].
#[derive(Debug)]
pub struct ShellOutput {
    reader: DuplexStream,
    shell_id: u64,
    fault: FaultSlot,
}

impl ShellOutput {
    pub fn shell_id(&self) -> u64 {
        self.shell_id
    }
}

impl AsyncRead for ShellOutput {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        ready!(Pin::new(&mut self.reader).poll_read(cx, buf))?;

        let at_eof = buf.filled().len() == before && buf.remaining() > 0;
        if at_eof {
            if let Some(reason) = self.fault.lock().ok().and_then(|mut fault| fault.take()) {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, reason)));
            }
        }
        Poll::Ready(Ok(()))
    }
}

impl<T: Transport> RemoteSession<T> {
    /// Start an interactive shell that reads `script` as its stdin.
    ///
    /// Connects first if the session is not live. A previously retained shell
    /// is disconnected before the new one is opened, so at most one shell is
    /// live per session. On failure nothing is retained and `script` is
    /// dropped.
    pub async fn open_shell<R>(&mut self, script: R) -> Result<ShellOutput, TransportError>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.ensure_connected().await?;

        if let Some(previous) = self.shell.take() {
            tracing::debug!(
                "Disconnecting shell {} before opening a new one",
                previous.handle().id()
            );
            previous.disconnect().await;
        }

        let channel = self.open_channel(&ChannelKind::Shell).await?;

        let id = NEXT_SHELL_ID.fetch_add(1, Ordering::Relaxed);
        let (writer, reader) = tokio::io::duplex(SHELL_PIPE_CAPACITY);
        let handle = ShellHandle {
            id,
            cancel: CancellationToken::new(),
            finished: Arc::new(AtomicBool::new(false)),
        };

        let fault = FaultSlot::default();

        let pump = tokio::spawn(pump(
            id,
            channel,
            script,
            writer,
            handle.cancel.clone(),
            handle.finished.clone(),
            fault.clone(),
        ));
        self.shell = Some(ShellChannel { handle, pump });

        tracing::info!("Shell {} opened on {}", id, self.identity().hostname());
        Ok(ShellOutput {
            reader,
            shell_id: id,
            fault,
        })
    }
}

/// Move bytes between the script, the channel and the output pipe until the
/// channel ends, the pipe's reader goes away, or the shell is cancelled.
async fn pump<C, R>(
    id: u64,
    mut channel: C,
    mut script: R,
    mut output: DuplexStream,
    cancel: CancellationToken,
    finished: Arc<AtomicBool>,
    fault: FaultSlot,
) where
    C: RemoteChannel,
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; SCRIPT_CHUNK_SIZE];
    let mut script_open = true;
    let mut failure: Option<String> = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            read = script.read(&mut buf), if script_open => match read {
                Ok(0) => {
                    script_open = false;
                    if let Err(e) = channel.send_eof().await {
                        tracing::debug!("Shell {}: sending EOF failed: {}", id, e);
                    }
                }
                Ok(n) => {
                    if let Err(e) = channel.send(&buf[..n]).await {
                        tracing::warn!("Shell {}: writing script failed: {}", id, e);
                        failure = Some(e.to_string());
                        break;
                    }
                }
                Err(e) => {
                    // No EOF: the remote must not mistake a truncated script
                    // for a complete one.
                    tracing::warn!("Shell {}: reading script failed: {}", id, e);
                    failure = Some(format!("reading script failed: {e}"));
                    break;
                }
            },

            event = channel.recv() => match event {
                Ok(Some(ChannelEvent::Data(data)))
                | Ok(Some(ChannelEvent::ExtendedData { data, .. })) => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        written = output.write_all(&data) => {
                            if written.is_err() {
                                tracing::debug!("Shell {}: output reader went away", id);
                                break;
                            }
                        }
                    }
                }
                Ok(Some(ChannelEvent::ExitStatus(status))) => {
                    tracing::debug!("Shell {} exited with status {}", id, status);
                }
                Ok(Some(ChannelEvent::Eof)) => {}
                Ok(Some(ChannelEvent::Close)) | Ok(None) => {
                    tracing::debug!("Shell {} channel closed by remote", id);
                    break;
                }
                Err(e) => {
                    tracing::warn!("Shell {}: channel read failed: {}", id, e);
                    failure = Some(e.to_string());
                    break;
                }
            },
        }
    }

    if let Err(e) = channel.close().await {
        tracing::debug!("Shell {}: closing channel failed: {}", id, e);
    }
    drop(script);
    if let Some(reason) = failure {
        if let Ok(mut slot) = fault.lock() {
            *slot = Some(reason);
        }
    }
    if let Err(e) = output.shutdown().await {
        tracing::debug!("Shell {}: shutting down output pipe failed: {}", id, e);
    }
    finished.store(true, Ordering::SeqCst);
}
