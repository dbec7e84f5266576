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

//! Tests for profile loading and identity construction.

use sshmon::config::Profile;
use sshmon::ssh::{Credential, StrictHostKeyChecking};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_profile(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_full_profile_round_trip_to_identity() {
    let file = write_profile(
        r#"
host: monitor.example.com
port: 2200
user: ops
password: hunter2
known_hosts: /etc/ssh/ssh_known_hosts
strict_host_key_checking: "no"
timeout_ms: 5000
max_line_bytes: 1024
poll_interval_ms: 250
"#,
    );

    let profile = Profile::load(file.path()).await.unwrap();
    assert_eq!(profile.max_line_bytes(), 1024);
    assert_eq!(profile.poll_interval(), Duration::from_millis(250));

    let identity = profile.into_identity().unwrap();
    assert_eq!(identity.hostname(), "monitor.example.com");
    assert_eq!(identity.port(), 2200);
    assert_eq!(identity.username(), "ops");
    assert!(matches!(identity.credential(), Some(Credential::Password(_))));
    assert_eq!(
        identity.known_hosts(),
        Some(PathBuf::from("/etc/ssh/ssh_known_hosts").as_path())
    );
    assert_eq!(identity.host_key_checking(), StrictHostKeyChecking::No);
    assert_eq!(identity.timeout(), Some(Duration::from_millis(5000)));
}

#[tokio::test]
async fn test_command_line_overrides_profile() {
    let file = write_profile("host: a.example.com\nuser: ops\npassword: pw\nport: 2200\n");

    let profile = Profile::load(file.path()).await.unwrap().merge(Profile {
        host: Some("b.example.com".to_string()),
        private_key: Some(PathBuf::from("/keys/ops")),
        ..Default::default()
    });

    let identity = profile.into_identity().unwrap();
    assert_eq!(identity.hostname(), "b.example.com");
    assert_eq!(identity.port(), 2200);
    assert!(matches!(
        identity.credential(),
        Some(Credential::PrivateKeyFile { .. })
    ));
}

#[tokio::test]
async fn test_defaults_when_unset() {
    let profile = Profile::from_yaml("host: example.com\nuser: ops\npassword: pw").unwrap();
    assert_eq!(profile.max_line_bytes(), 64 * 1024);
    assert_eq!(profile.poll_interval(), Duration::from_millis(2000));

    let identity = profile.into_identity().unwrap();
    assert_eq!(identity.port(), 22);
    assert_eq!(identity.host_key_checking(), StrictHostKeyChecking::Yes);
    assert_eq!(identity.known_hosts(), None);
    assert_eq!(identity.timeout(), None);
}

#[tokio::test]
async fn test_load_or_default_with_explicit_missing_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("none.yaml");
    let profile = Profile::load_or_default(Some(path.as_path()))
        .await
        .unwrap();
    assert_eq!(profile, Profile::default());
}
