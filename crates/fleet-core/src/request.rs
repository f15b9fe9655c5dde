//! Incoming request for one elastic agent.
//!
//! The orchestrator sends a free-form property map alongside the job
//! identifier; the EC2-specific keys (`ec2_ami`, `ec2_subnets`, ...) are
//! plugin configuration the user typed into the job definition, passed
//! through opaquely. The whole map is also serialized into the
//! `JsonProperties` instance tag so the exact creating configuration can
//! be reconstructed during reconciliation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::job::JobIdentifier;

/// A request to create one agent instance for one build job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CreateAgentRequest {
    pub auto_register_key: String,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
    pub job_identifier: JobIdentifier,
}

impl CreateAgentRequest {
    pub fn new(
        auto_register_key: impl Into<String>,
        properties: HashMap<String, String>,
        environment: Option<String>,
        job_identifier: JobIdentifier,
    ) -> Self {
        Self {
            auto_register_key: auto_register_key.into(),
            environment,
            properties,
            job_identifier,
        }
    }

    fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// AMI image id to launch from.
    pub fn image_id(&self) -> Option<&str> {
        self.property("ec2_ami")
    }

    /// EC2 instance type (e.g. `t3.medium`).
    pub fn instance_type(&self) -> Option<&str> {
        self.property("ec2_instance_type")
    }

    /// Key-pair name for SSH access.
    pub fn key_name(&self) -> Option<&str> {
        self.property("ec2_key")
    }

    /// Security group id.
    pub fn security_group(&self) -> Option<&str> {
        self.property("ec2_sg")
    }

    /// Candidate subnets, one per availability zone, split on commas.
    pub fn subnets(&self) -> Vec<String> {
        self.property("ec2_subnets")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// User-supplied extra user-data, appended verbatim to the bootstrap
    /// script.
    pub fn user_data(&self) -> Option<&str> {
        self.property("ec2_user_data")
    }

    /// Serialize the property map into the `JsonProperties` tag form.
    pub fn properties_to_json(&self) -> String {
        serde_json::to_string(&self.properties).unwrap_or_default()
    }

    /// Decode a property map from the `JsonProperties` tag value.
    pub fn properties_from_json(json: &str) -> HashMap<String, String> {
        serde_json::from_str(json).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> JobIdentifier {
        JobIdentifier {
            pipeline_name: "build".to_string(),
            pipeline_counter: 1,
            pipeline_label: "1".to_string(),
            stage_name: "dist".to_string(),
            stage_counter: "1".to_string(),
            job_name: "package".to_string(),
            job_id: 9,
        }
    }

    fn request_with(properties: &[(&str, &str)]) -> CreateAgentRequest {
        let map = properties
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CreateAgentRequest::new("key-123", map, None, job())
    }

    #[test]
    fn subnets_split_and_trim() {
        let request = request_with(&[("ec2_subnets", "subnet-a, subnet-b ,subnet-c")]);
        assert_eq!(
            request.subnets(),
            vec!["subnet-a", "subnet-b", "subnet-c"]
        );
    }

    #[test]
    fn subnets_empty_when_absent() {
        assert!(request_with(&[]).subnets().is_empty());
    }

    #[test]
    fn typed_accessors_read_property_map() {
        let request = request_with(&[
            ("ec2_ami", "ami-123"),
            ("ec2_instance_type", "t3.medium"),
            ("ec2_key", "ci-key"),
            ("ec2_sg", "sg-9"),
        ]);
        assert_eq!(request.image_id(), Some("ami-123"));
        assert_eq!(request.instance_type(), Some("t3.medium"));
        assert_eq!(request.key_name(), Some("ci-key"));
        assert_eq!(request.security_group(), Some("sg-9"));
        assert_eq!(request.user_data(), None);
    }

    #[test]
    fn properties_json_round_trip() {
        let request = request_with(&[("ec2_ami", "ami-123"), ("custom", "value")]);
        let decoded = CreateAgentRequest::properties_from_json(&request.properties_to_json());
        assert_eq!(decoded, request.properties);
    }

    #[test]
    fn properties_from_bad_json_is_empty() {
        assert!(CreateAgentRequest::properties_from_json("nope").is_empty());
    }
}
