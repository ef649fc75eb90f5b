/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use std::path::Path;
use std::time::Duration;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::common::TransitError;

/// Configuration for the Transit runtime
///
/// Loaded from `config.toml` in the XDG config directory for `transit`. Every
/// section and field is optional; missing values fall back to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitConfig {
    /// Timeout configuration
    pub timeouts: TimeoutConfig,
    /// Defaults applied to endpoints without explicit configuration
    pub defaults: DefaultsConfig,
    /// Limits and capacity configuration
    pub limits: LimitsConfig,
    /// Behavioral switches
    pub behavior: BehaviorConfig,
}

/// Timeout-related configuration values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Default request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// How long bus shutdown waits for in-flight handlers, in milliseconds
    pub shutdown_timeout_ms: u64,
    /// How long moving a message to a full error queue may wait, in milliseconds
    pub error_transport_timeout_ms: u64,
}

/// Endpoint defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Retry limit used when the endpoint cache is not given one
    pub retry_limit: u32,
    /// Suffix appended to an endpoint's path to derive its error address
    pub error_queue_suffix: String,
}

/// Limits and capacity configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Bounded queue size of each loopback transport
    pub loopback_capacity: usize,
}

/// Behavioral configuration switches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Match header keys ignoring ASCII case
    pub case_insensitive_headers: bool,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            shutdown_timeout_ms: 10_000,
            error_transport_timeout_ms: 5_000,
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            retry_limit: 5,
            error_queue_suffix: "_error".to_string(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { loopback_capacity: 1024 }
    }
}

impl TransitConfig {
    /// Default request timeout as a `Duration`
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.request_timeout_ms)
    }

    /// Shutdown timeout as a `Duration`
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.shutdown_timeout_ms)
    }

    /// Error transport send timeout as a `Duration`
    pub const fn error_transport_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.error_transport_timeout_ms)
    }

    /// Load configuration from XDG-compliant locations
    ///
    /// Looks for `transit/config.toml` under `$XDG_CONFIG_HOME` and then the XDG
    /// config dirs. A missing file yields the defaults; an unreadable or malformed
    /// file is logged and also yields the defaults.
    pub fn load() -> Self {
        let xdg_dirs = match xdg::BaseDirectories::with_prefix("transit") {
            Ok(dirs) => dirs,
            Err(e) => {
                error!("Failed to initialize XDG directories: {}", e);
                return Self::default();
            }
        };

        match xdg_dirs.find_config_file("config.toml") {
            Some(path) => Self::load_from(&path).unwrap_or_else(|e| {
                error!("{}; using defaults", e);
                Self::default()
            }),
            None => {
                info!("No configuration file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load configuration from an explicit TOML file
    ///
    /// # Errors
    ///
    /// [`TransitError::Configuration`] if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, TransitError> {
        info!("Loading configuration from: {}", path.display());
        let config_str = std::fs::read_to_string(path).map_err(|e| {
            TransitError::Configuration(format!("failed to read configuration file {}: {e}", path.display()))
        })?;
        toml::from_str::<Self>(&config_str).map_err(|e| {
            TransitError::Configuration(format!("failed to parse configuration file {}: {e}", path.display()))
        })
    }
}

lazy_static! {
    /// Global configuration instance loaded from XDG-compliant locations
    pub static ref CONFIG: TransitConfig = TransitConfig::load();
}
