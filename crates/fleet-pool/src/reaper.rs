//! Reaper — timeout scans for instances that never became agents.
//!
//! A fresh instance gets `auto_register_timeout` to complete the agent
//! handshake with the orchestrator. These helpers are pure, instantaneous
//! checks over a registry snapshot: no retries, no backoff, and an agent
//! that registered in time is never selected regardless of age.

use std::time::Duration;

use fleet_core::{Agent, Agents};

use crate::instance::AgentInstance;

/// Whether the instance has outlived the registration timeout.
fn is_overdue(instance: &AgentInstance, timeout: Duration, now_epoch: u64) -> bool {
    now_epoch > instance.created_at.saturating_add(timeout.as_secs())
}

/// Ids of registered-in-pool instances the orchestrator does NOT know as
/// agents and whose registration window has expired. These get
/// terminated.
pub(crate) fn unregistered_overdue(
    instances: &[AgentInstance],
    known_agents: &Agents,
    timeout: Duration,
    now_epoch: u64,
) -> Vec<String> {
    instances
        .iter()
        .filter(|i| !known_agents.contains(&i.id))
        .filter(|i| is_overdue(i, timeout, now_epoch))
        .map(|i| i.id.clone())
        .collect()
}

/// Known agents whose backing instance has outlived the registration
/// window — candidates for the orchestrator to disown.
pub(crate) fn known_overdue(
    instances: &[AgentInstance],
    known_agents: &Agents,
    timeout: Duration,
    now_epoch: u64,
) -> Agents {
    let overdue = known_agents
        .iter()
        .filter(|agent| {
            instances
                .iter()
                .find(|i| i.id == agent.agent_id)
                .is_some_and(|i| is_overdue(i, timeout, now_epoch))
        })
        .cloned()
        .collect::<Vec<Agent>>();
    Agents::new(overdue)
}
