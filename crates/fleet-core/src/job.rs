//! Job and agent identity types.
//!
//! `JobIdentifier` pins down exactly one build job in the orchestrator's
//! pipeline/stage/job hierarchy. It is serialized whole into the
//! `JsonJobIdentifier` instance tag at provisioning time and decoded back
//! during reconciliation, so the serde field names are part of the
//! persisted format and must stay stable.

use serde::{Deserialize, Serialize};

/// Identifies the build job that triggered an agent's creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobIdentifier {
    pub pipeline_name: String,
    pub pipeline_counter: u64,
    pub pipeline_label: String,
    pub stage_name: String,
    /// Stage counter as delivered by the orchestrator (textual).
    pub stage_counter: String,
    pub job_name: String,
    pub job_id: u64,
}

impl JobIdentifier {
    /// Human-readable path for diagnostics:
    /// `pipeline/counter/stage/stage_counter/job`.
    pub fn representation(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.pipeline_name,
            self.pipeline_counter,
            self.stage_name,
            self.stage_counter,
            self.job_name
        )
    }

    /// Serialize to the JSON form stored in the `JsonJobIdentifier` tag.
    pub fn to_json(&self) -> String {
        // Serialization of a plain struct with string/number fields
        // cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decode from the `JsonJobIdentifier` tag value.
    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }
}

/// One agent the orchestrator currently recognizes as registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// The elastic agent id — for this fleet, the cloud instance id.
    pub agent_id: String,
}

impl Agent {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
        }
    }
}

/// The orchestrator's list of registered agents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agents {
    agents: Vec<Agent>,
}

impl Agents {
    pub fn new(agents: Vec<Agent>) -> Self {
        Self { agents }
    }

    /// Whether an agent with the given id has completed registration.
    pub fn contains(&self, agent_id: &str) -> bool {
        self.agents.iter().any(|a| a.agent_id == agent_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
