//! Pool error types.
//!
//! Capacity denial is deliberately NOT an error: `create` returns
//! `Ok(None)` and the orchestrator retries with its own backoff.

use thiserror::Error;

use fleet_core::SettingsError;
use fleet_ec2::Ec2Error;

/// Errors that can occur during fleet operations.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("EC2 API error: {0}")]
    Ec2(#[from] Ec2Error),

    /// Remote terminate failed. The local record and permit are already
    /// released; the caller must escalate so the stray instance does not
    /// keep billing unnoticed.
    #[error("failed to terminate instance {instance_id}: {source}")]
    Termination {
        instance_id: String,
        source: Ec2Error,
    },

    /// A registry record has no live remote instance behind it —
    /// distinct from "instance exists but unhealthy".
    #[error("no live instance backs local record {0}")]
    StaleRecord(String),

    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),

    /// The job request lacks a property the workflow cannot proceed
    /// without (image id, instance type, ...).
    #[error("missing required property: {0}")]
    MissingProperty(&'static str),
}

pub type PoolResult<T> = Result<T, PoolError>;
