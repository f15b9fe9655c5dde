//! fleet-core — shared domain types for the elastic agent fleet.
//!
//! Holds everything the provisioning and pool crates agree on:
//!
//! - `JobIdentifier` — the build job that asked for an agent
//! - `Agent` / `Agents` — the orchestrator's view of registered agents
//! - `CreateAgentRequest` — an incoming request for one agent instance
//! - `FleetSettings` — plugin-level configuration (credentials, caps, timeouts)
//! - `Clock` — injectable time source so timeout logic is testable

pub mod clock;
pub mod job;
pub mod request;
pub mod settings;

pub use clock::{Clock, FakeClock, SystemClock};
pub use job::{Agent, Agents, JobIdentifier};
pub use request::CreateAgentRequest;
pub use settings::{FleetSettings, SettingsError};
