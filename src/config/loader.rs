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

//! Profile loading.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::types::Profile;
use super::utils::expand_tilde;

/// How often `sshmon watch` samples the latest line by default.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// `config.yaml` in the platform config directory
/// (`~/.config/sshmon/config.yaml` on Linux).
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "sshmon").map(|dirs| dirs.config_dir().join("config.yaml"))
}

impl Profile {
    /// Load a profile from a YAML file. A missing file yields the empty profile.
    pub async fn load(path: &Path) -> Result<Self> {
        let expanded_path = expand_tilde(path);

        if !expanded_path.exists() {
            tracing::debug!(
                "Config file not found at {:?}, using defaults",
                expanded_path
            );
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&expanded_path).await.with_context(|| {
            format!(
                "Failed to read configuration file at {}. Please check file permissions.",
                expanded_path.display()
            )
        })?;

        Self::from_yaml(&content).with_context(|| {
            format!(
                "Failed to parse YAML configuration file at {}",
                expanded_path.display()
            )
        })
    }

    /// Load the explicitly given file, or the default location when `None`.
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path).await,
            None => match default_config_path() {
                Some(path) => Self::load(&path).await,
                None => {
                    tracing::debug!("No config directory available, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to a mapping.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}
