//! The local record of one provisioned agent instance.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use fleet_core::JobIdentifier;
use fleet_ec2::{tags, CloudInstance};

/// One provisioned cloud instance and the job that caused its creation.
///
/// Created by the provisioning workflow (on successful launch) or by
/// reconciliation (reconstructed from tags on an existing remote
/// instance). Removed only by termination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInstance {
    /// Cloud-assigned instance id, stable for the instance's lifetime.
    pub id: String,
    /// Launch time, Unix epoch seconds. Immutable.
    pub created_at: u64,
    /// The job-request property map that created this instance.
    pub properties: HashMap<String, String>,
    /// Optional environment tag.
    pub environment: Option<String>,
    /// The build job that triggered creation. `None` only for instances
    /// reconstructed from tags whose job tag was lost.
    pub job: Option<JobIdentifier>,
}

impl AgentInstance {
    /// Reconstruct a record from a remote instance's tags.
    ///
    /// Missing tags degrade to empty/absent fields; the record is still
    /// wanted so the instance stays under capacity accounting.
    pub fn from_cloud(instance: &CloudInstance) -> Self {
        Self {
            id: instance.instance_id.clone(),
            created_at: instance.launch_time,
            properties: tags::decode_properties(instance),
            environment: tags::decode_environment(instance),
            job: tags::decode_job(instance),
        }
    }
}

// Two records are the same instance iff their ids are equal.
impl PartialEq for AgentInstance {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AgentInstance {}

impl std::hash::Hash for AgentInstance {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, created_at: u64) -> AgentInstance {
        AgentInstance {
            id: id.to_string(),
            created_at,
            properties: HashMap::new(),
            environment: None,
            job: None,
        }
    }

    #[test]
    fn equality_is_by_id_only() {
        assert_eq!(record("i-1", 100), record("i-1", 999));
        assert_ne!(record("i-1", 100), record("i-2", 100));
    }
}
