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

//! Tests for the russh transport that need no SSH server.

use sshmon::ssh::{SessionIdentity, SshSession, SshTransport, StrictHostKeyChecking, TransportError};
use tokio::net::TcpListener;

fn identity(port: u16) -> SessionIdentity {
    let mut identity = SessionIdentity::with_password("ops", "pw", "127.0.0.1", port);
    identity.set_host_key_checking(StrictHostKeyChecking::No);
    identity
}

#[tokio::test]
async fn test_silent_server_hits_connect_timeout() {
    // Accepts TCP but never sends an SSH banner.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut identity = identity(port);
    identity.set_timeout_ms(200);
    let mut session = SshSession::new(SshTransport::default(), identity);

    let err = session.connect().await.unwrap_err();
    assert!(
        matches!(err, TransportError::ConnectTimeout { timeout_ms: 200, .. }),
        "unexpected error: {err:?}"
    );
    assert!(!session.is_connected());
    drop(listener);
}

#[tokio::test]
async fn test_refused_connection_is_an_error() {
    // Bind then drop to get a port nothing listens on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut session = SshSession::new(SshTransport::default(), identity(port));
    assert!(session.connect().await.is_err());
    assert!(!session.is_connected());
    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_execute_without_server_fails_cleanly() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut session = SshSession::new(SshTransport::default(), identity(port));
    assert!(session.execute("uptime").await.is_err());
    assert!(!session.is_connected());
}
