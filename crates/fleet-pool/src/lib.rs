//! fleet-pool — admission-controlled pool of elastic build-agent instances.
//!
//! The [`AgentFleet`] facade owns the whole instance lifecycle:
//!
//! - Admission: a creation request only proceeds while live instances are
//!   under the configured `max_agents` cap, re-read on every call
//! - Provisioning: one EC2 instance per admitted job, with multi-zone
//!   retry and tag-encoded job metadata
//! - Reconciliation: local state is rebuilt from the provider's
//!   tag-filtered instance list after a process restart
//! - Reaping: instances that never completed agent registration within
//!   the auto-register timeout are terminated and their capacity freed
//!
//! # Architecture
//!
//! ```text
//! AgentFleet<C: Ec2Api, K: Clock>
//!   ├── Registry (one mutex: instance map + pending jobs + permits)
//!   ├── provision (user-data, subnet shuffle, per-zone retry, tagging)
//!   ├── reaper (timeout scans against the orchestrator's agent list)
//!   └── report (status projections from live describe calls)
//! ```
//!
//! All durable state lives in instance tags; nothing is persisted locally.

pub mod error;
pub mod fleet;
pub mod instance;
pub mod provision;
pub mod reaper;
pub mod registry;
pub mod report;

pub use error::{PoolError, PoolResult};
pub use fleet::AgentFleet;
pub use instance::AgentInstance;
pub use report::{AgentStatusReport, InstanceStatusReport, StatusReport};
