//! Tag codec — the fleet's only durable state.
//!
//! Every instance the fleet launches is tagged with the job that caused
//! it, both as individual human-readable fields and as two JSON blobs
//! (`JsonJobIdentifier`, `JsonProperties`) used for exact reconstruction
//! during reconciliation. The `Type` tag is the ownership marker: describe
//! calls filter on it, so instances without it are invisible to the fleet.

use std::collections::HashMap;

use fleet_core::{CreateAgentRequest, JobIdentifier};

use crate::api::{CloudInstance, Tag};

/// Tag key for the ownership marker.
pub const TYPE_KEY: &str = "Type";

/// Ownership marker value identifying instances this fleet manages.
pub const OWNERSHIP_TAG: &str = "gocd-elastic-agent";

/// Tag key holding the full serialized job identifier.
pub const JSON_JOB_IDENTIFIER_KEY: &str = "JsonJobIdentifier";

/// Tag key holding the full serialized job properties.
pub const JSON_PROPERTIES_KEY: &str = "JsonProperties";

/// Tag key for the optional environment name.
pub const ENVIRONMENT_KEY: &str = "environment";

/// Build the full tag set written to a freshly launched instance.
pub fn creation_tags(request: &CreateAgentRequest) -> Vec<Tag> {
    let job = &request.job_identifier;

    let mut tags = vec![
        Tag::new(
            "Name",
            format!(
                "GoCD EA {}-{}-{}-{}",
                job.pipeline_name, job.pipeline_counter, job.stage_name, job.job_name
            ),
        ),
        Tag::new(TYPE_KEY, OWNERSHIP_TAG),
        Tag::new("pipelineName", &job.pipeline_name),
        Tag::new("pipelineCounter", job.pipeline_counter.to_string()),
        Tag::new("pipelineLabel", &job.pipeline_label),
        Tag::new("stageName", &job.stage_name),
        Tag::new("stageCounter", &job.stage_counter),
        Tag::new("jobName", &job.job_name),
        Tag::new("jobId", job.job_id.to_string()),
        Tag::new(JSON_JOB_IDENTIFIER_KEY, job.to_json()),
        Tag::new(JSON_PROPERTIES_KEY, request.properties_to_json()),
    ];

    if let Some(ref environment) = request.environment {
        tags.push(Tag::new(ENVIRONMENT_KEY, environment));
    }

    tags
}

/// Decode the job identifier from an instance's tags.
pub fn decode_job(instance: &CloudInstance) -> Option<JobIdentifier> {
    instance
        .tag(JSON_JOB_IDENTIFIER_KEY)
        .and_then(JobIdentifier::from_json)
}

/// Decode the original job properties from an instance's tags.
///
/// A missing or malformed tag yields an empty map rather than an error;
/// reconciliation still wants the record.
pub fn decode_properties(instance: &CloudInstance) -> HashMap<String, String> {
    instance
        .tag(JSON_PROPERTIES_KEY)
        .map(CreateAgentRequest::properties_from_json)
        .unwrap_or_default()
}

/// Decode the environment name, if the instance was tagged with one.
pub fn decode_environment(instance: &CloudInstance) -> Option<String> {
    instance.tag(ENVIRONMENT_KEY).map(str::to_string)
}

/// The `pipelineName` tag, used for status report rows.
pub fn pipeline_name(instance: &CloudInstance) -> Option<&str> {
    instance.tag("pipelineName")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::InstanceStateName;

    fn job() -> JobIdentifier {
        JobIdentifier {
            pipeline_name: "web".to_string(),
            pipeline_counter: 12,
            pipeline_label: "12".to_string(),
            stage_name: "build".to_string(),
            stage_counter: "1".to_string(),
            job_name: "compile".to_string(),
            job_id: 77,
        }
    }

    fn request() -> CreateAgentRequest {
        let properties = [
            ("ec2_ami", "ami-42"),
            ("ec2_subnets", "subnet-a,subnet-b"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        CreateAgentRequest::new("key", properties, Some("staging".to_string()), job())
    }

    fn instance_with(tags: Vec<Tag>) -> CloudInstance {
        CloudInstance {
            instance_id: "i-1".to_string(),
            image_id: "ami-42".to_string(),
            instance_type: "t3.micro".to_string(),
            state: InstanceStateName::Running,
            subnet_id: "subnet-a".to_string(),
            private_ip: None,
            launch_time: 1000,
            tags,
        }
    }

    #[test]
    fn creation_tags_cover_the_full_set() {
        let tags = creation_tags(&request());
        let keys: Vec<&str> = tags.iter().map(|t| t.key.as_str()).collect();

        for expected in [
            "Name",
            "Type",
            "pipelineName",
            "pipelineCounter",
            "pipelineLabel",
            "stageName",
            "stageCounter",
            "jobName",
            "jobId",
            JSON_JOB_IDENTIFIER_KEY,
            JSON_PROPERTIES_KEY,
            ENVIRONMENT_KEY,
        ] {
            assert!(keys.contains(&expected), "missing tag {expected}");
        }
    }

    #[test]
    fn name_tag_is_human_readable() {
        let tags = creation_tags(&request());
        let name = tags.iter().find(|t| t.key == "Name").unwrap();
        assert_eq!(name.value, "GoCD EA web-12-build-compile");
    }

    #[test]
    fn environment_tag_omitted_when_absent() {
        let mut req = request();
        req.environment = None;
        let tags = creation_tags(&req);
        assert!(!tags.iter().any(|t| t.key == ENVIRONMENT_KEY));
    }

    #[test]
    fn round_trip_reproduces_job_and_properties() {
        let req = request();
        let inst = instance_with(creation_tags(&req));

        assert_eq!(decode_job(&inst), Some(req.job_identifier.clone()));
        assert_eq!(decode_properties(&inst), req.properties);
        assert_eq!(decode_environment(&inst), Some("staging".to_string()));
        assert_eq!(pipeline_name(&inst), Some("web"));
    }

    #[test]
    fn decoding_untagged_instance_degrades_gracefully() {
        let inst = instance_with(vec![]);
        assert_eq!(decode_job(&inst), None);
        assert!(decode_properties(&inst).is_empty());
        assert_eq!(decode_environment(&inst), None);
    }
}
