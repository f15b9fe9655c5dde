//! The EC2 API trait and its wire types.
//!
//! Only the operations the fleet actually needs are modeled: launching a
//! single instance, tagging it, terminating it, and describing instances
//! under a state/tag filter. All calls are blocking network operations
//! from the caller's point of view.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Ec2Result;

/// One instance tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// EC2 instance lifecycle state, as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceStateName {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    Stopping,
    Stopped,
}

impl InstanceStateName {
    /// The provider's textual form (`shutting-down`, etc.).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::ShuttingDown => "shutting-down",
            Self::Terminated => "terminated",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

/// A remote instance as returned by a describe call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudInstance {
    pub instance_id: String,
    pub image_id: String,
    pub instance_type: String,
    pub state: InstanceStateName,
    pub subnet_id: String,
    pub private_ip: Option<String>,
    /// Launch time as Unix epoch seconds.
    pub launch_time: u64,
    pub tags: Vec<Tag>,
}

impl CloudInstance {
    /// Value of the tag with the given key, if present.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }
}

/// Parameters for launching one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInstancesSpec {
    pub image_id: String,
    pub instance_type: String,
    pub key_name: Option<String>,
    pub security_group: Option<String>,
    pub subnet_id: String,
    /// Bootstrap script, already base64-encoded.
    pub user_data_base64: String,
}

/// Filter for describe calls.
///
/// All populated fields must match (AND semantics, as in the provider's
/// filter list). An empty `states` list matches any state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescribeFilter {
    /// Acceptable instance lifecycle states.
    pub states: Vec<InstanceStateName>,
    /// Required `Type` tag value (the ownership marker).
    pub type_tag: Option<String>,
    /// Restrict to one instance id.
    pub instance_id: Option<String>,
}

impl DescribeFilter {
    /// Whether the given instance passes this filter.
    pub fn matches(&self, instance: &CloudInstance) -> bool {
        if !self.states.is_empty() && !self.states.contains(&instance.state) {
            return false;
        }
        if let Some(ref wanted) = self.type_tag
            && instance.tag("Type") != Some(wanted.as_str())
        {
            return false;
        }
        if let Some(ref id) = self.instance_id
            && instance.instance_id != *id
        {
            return false;
        }
        true
    }
}

/// The subset of the EC2 API the fleet consumes.
#[async_trait]
pub trait Ec2Api: Send + Sync {
    /// Launch exactly one instance.
    async fn run_instance(&self, spec: RunInstancesSpec) -> Ec2Result<CloudInstance>;

    /// Attach tags to an existing instance.
    async fn create_tags(&self, instance_id: &str, tags: Vec<Tag>) -> Ec2Result<()>;

    /// Terminate one instance.
    async fn terminate_instance(&self, instance_id: &str) -> Ec2Result<()>;

    /// List instances matching the filter.
    async fn describe_instances(&self, filter: &DescribeFilter) -> Ec2Result<Vec<CloudInstance>>;
}

#[async_trait]
impl<T: Ec2Api + ?Sized> Ec2Api for std::sync::Arc<T> {
    async fn run_instance(&self, spec: RunInstancesSpec) -> Ec2Result<CloudInstance> {
        (**self).run_instance(spec).await
    }

    async fn create_tags(&self, instance_id: &str, tags: Vec<Tag>) -> Ec2Result<()> {
        (**self).create_tags(instance_id, tags).await
    }

    async fn terminate_instance(&self, instance_id: &str) -> Ec2Result<()> {
        (**self).terminate_instance(instance_id).await
    }

    async fn describe_instances(&self, filter: &DescribeFilter) -> Ec2Result<Vec<CloudInstance>> {
        (**self).describe_instances(filter).await
    }
}
