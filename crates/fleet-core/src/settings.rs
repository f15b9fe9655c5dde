//! Plugin-level settings for the fleet.
//!
//! These arrive as JSON from the host protocol and are re-read on every
//! operation — in particular `max_agents` must never be cached inside the
//! admission logic, because an operator can change it between calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by malformed settings values.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid auto-register timeout: {0:?}")]
    InvalidTimeout(String),
}

/// Configuration for one fleet (one plugin profile).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FleetSettings {
    pub access_key_id: String,
    pub secret_access_key: String,
    /// AWS region name, e.g. `eu-west-1`.
    pub region: String,
    /// Base URL of the orchestrator, embedded into agent user-data.
    pub go_server_url: String,
    /// Hard cap on concurrently live instances.
    pub max_agents: usize,
    /// How long a fresh instance gets to complete agent registration
    /// before the reaper may terminate it. `"10m"`, `"90s"`, or a bare
    /// number of minutes.
    pub auto_register_timeout: String,
}

impl FleetSettings {
    /// Parse `auto_register_timeout` into a duration.
    pub fn auto_register_period(&self) -> Result<Duration, SettingsError> {
        parse_period(&self.auto_register_timeout)
            .ok_or_else(|| SettingsError::InvalidTimeout(self.auto_register_timeout.clone()))
    }
}

/// Parse a period string like "90s", "10m" into a duration.
///
/// A bare number is minutes, matching how the orchestrator expresses the
/// auto-register period.
fn parse_period(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    }
}
