//! Status report projections.
//!
//! Built on demand from the provider's live instance list and never
//! persisted. The aggregate report also covers instances in stopping or
//! stopped states so operators see strays the running-state filters hide.

use serde::{Deserialize, Serialize};

use fleet_core::JobIdentifier;
use fleet_ec2::{tags, CloudInstance};

/// One row of the aggregate status report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceStatusReport {
    pub instance_id: String,
    pub instance_type: String,
    pub image_id: String,
    /// Provider lifecycle state (`running`, `stopped`, ...).
    pub state: String,
    pub private_ip: Option<String>,
    /// Launch time, Unix epoch seconds.
    pub launched_at: u64,
    /// Pipeline that created the instance, decoded from tags.
    pub pipeline_name: Option<String>,
}

impl InstanceStatusReport {
    pub fn from_cloud(instance: &CloudInstance) -> Self {
        Self {
            instance_id: instance.instance_id.clone(),
            instance_type: instance.instance_type.clone(),
            image_id: instance.image_id.clone(),
            state: instance.state.as_str().to_string(),
            private_ip: instance.private_ip.clone(),
            launched_at: instance.launch_time,
            pipeline_name: tags::pipeline_name(instance).map(str::to_string),
        }
    }
}

/// Aggregate view over every instance the fleet owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub total: usize,
    pub instances: Vec<InstanceStatusReport>,
}

impl StatusReport {
    pub fn new(instances: Vec<InstanceStatusReport>) -> Self {
        Self {
            total: instances.len(),
            instances,
        }
    }
}

/// Detailed view of a single agent's backing instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatusReport {
    pub job: Option<JobIdentifier>,
    pub instance: CloudInstance,
    /// Creation time from the local record, Unix epoch seconds.
    pub created_at: u64,
}
