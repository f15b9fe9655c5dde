//! Provisioning workflow — one remote instance for one admitted job.
//!
//! Subnet candidates (one per availability zone) are shuffled and tried
//! in order until a launch succeeds, so an AZ-local capacity or config
//! error never fails the whole request while another AZ can serve it.
//! The fresh instance is then tagged with the full job metadata set; a
//! tagging failure is soft — the instance is still returned as created.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::seq::SliceRandom;
use tracing::{error, info, warn};

use fleet_core::{CreateAgentRequest, FleetSettings};
use fleet_ec2::{tags, Ec2Api, RunInstancesSpec};

use crate::error::{PoolError, PoolResult};
use crate::instance::AgentInstance;

/// Plugin identifier baked into agent auto-registration properties.
pub const PLUGIN_ID: &str = "gocd.ec2-elastic-agent";

/// Build the bootstrap script passed as instance user-data.
///
/// The agent derives its hostname and elastic-agent id from its own
/// instance id via the metadata service at boot, so the script is
/// identical for every instance. User-supplied extra user-data is
/// appended verbatim.
fn build_user_data(request: &CreateAgentRequest, settings: &FleetSettings) -> String {
    let mut script = format!(
        "#!/bin/bash\n\
         echo \"GO_SERVER_URL={server_url}\" > /etc/default/go-agent\n\
         chown -R go:go /etc/default/go-agent\n\
         echo \"agent.auto.register.key={key}\" > /usr/share/go-agent/config/autoregister.properties\n\
         echo \"agent.auto.register.hostname=EA_$(ec2-metadata --instance-id | cut -d \" \" -f 2)\" >> /usr/share/go-agent/config/autoregister.properties\n\
         echo \"agent.auto.register.elasticAgent.agentId=$(ec2-metadata --instance-id | cut -d \" \" -f 2)\" >> /usr/share/go-agent/config/autoregister.properties\n\
         echo \"agent.auto.register.elasticAgent.pluginId={plugin_id}\" >> /usr/share/go-agent/config/autoregister.properties\n\
         chown -R go:go /usr/share/go-agent/\n\
         systemctl start go-agent.service\n",
        server_url = settings.go_server_url,
        key = request.auto_register_key,
        plugin_id = PLUGIN_ID,
    );

    if let Some(extra) = request.user_data() {
        script.push_str(extra);
    }

    script
}

/// Launch one instance for the request, trying each candidate subnet.
///
/// Returns `Ok(None)` when every subnet was exhausted — the caller must
/// not register anything in that case. The admission permit is the
/// caller's to release.
pub(crate) async fn launch<C: Ec2Api>(
    ec2: &C,
    request: &CreateAgentRequest,
    settings: &FleetSettings,
) -> PoolResult<Option<AgentInstance>> {
    let image_id = request
        .image_id()
        .ok_or(PoolError::MissingProperty("ec2_ami"))?;
    let instance_type = request
        .instance_type()
        .ok_or(PoolError::MissingProperty("ec2_instance_type"))?;

    let user_data = BASE64.encode(build_user_data(request, settings));

    // Zone selection is randomized to spread load across AZs.
    let mut subnets = request.subnets();
    subnets.shuffle(&mut rand::thread_rng());

    let mut launched = None;
    for subnet_id in &subnets {
        let spec = RunInstancesSpec {
            image_id: image_id.to_string(),
            instance_type: instance_type.to_string(),
            key_name: request.key_name().map(str::to_string),
            security_group: request.security_group().map(str::to_string),
            subnet_id: subnet_id.clone(),
            user_data_base64: user_data.clone(),
        };

        match ec2.run_instance(spec).await {
            Ok(instance) => {
                info!(
                    instance_id = %instance.instance_id,
                    subnet_id = %instance.subnet_id,
                    "created new instance"
                );
                launched = Some(instance);
                break;
            }
            Err(e) => {
                error!(%subnet_id, error = %e, "could not create instance in subnet");
            }
        }
    }

    let Some(instance) = launched else {
        error!(
            job = %request.job_identifier.representation(),
            "could not create instance in any provided subnet"
        );
        return Ok(None);
    };

    match ec2
        .create_tags(&instance.instance_id, tags::creation_tags(request))
        .await
    {
        Ok(()) => {
            info!(instance_id = %instance.instance_id, "assigned tags to instance");
        }
        Err(e) => {
            // Soft failure: the instance stays created, but without the
            // ownership tag reconciliation will not see it.
            error!(instance_id = %instance.instance_id, error = %e, "could not tag instance");
            warn!(
                instance_id = %instance.instance_id,
                "instance is untagged and invisible to reconciliation; tag or terminate it manually"
            );
        }
    }

    Ok(Some(AgentInstance {
        id: instance.instance_id,
        created_at: instance.launch_time,
        properties: request.properties.clone(),
        environment: request.environment.clone(),
        job: Some(request.job_identifier.clone()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use fleet_core::JobIdentifier;
    use fleet_ec2::FakeEc2;

    fn job() -> JobIdentifier {
        JobIdentifier {
            pipeline_name: "build".to_string(),
            pipeline_counter: 3,
            pipeline_label: "3".to_string(),
            stage_name: "test".to_string(),
            stage_counter: "1".to_string(),
            job_name: "unit".to_string(),
            job_id: 5,
        }
    }

    fn settings() -> FleetSettings {
        FleetSettings {
            access_key_id: "AKIATEST".to_string(),
            secret_access_key: "secret".to_string(),
            region: "eu-west-1".to_string(),
            go_server_url: "https://go.example.com/go".to_string(),
            max_agents: 5,
            auto_register_timeout: "10m".to_string(),
        }
    }

    fn request(subnets: &str) -> CreateAgentRequest {
        let mut properties: HashMap<String, String> = [
            ("ec2_ami", "ami-42"),
            ("ec2_instance_type", "t3.medium"),
            ("ec2_key", "ci"),
            ("ec2_sg", "sg-1"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        if !subnets.is_empty() {
            properties.insert("ec2_subnets".to_string(), subnets.to_string());
        }
        CreateAgentRequest::new("register-key", properties, None, job())
    }

    #[test]
    fn user_data_embeds_bootstrap_configuration() {
        let script = build_user_data(&request("subnet-a"), &settings());
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("GO_SERVER_URL=https://go.example.com/go"));
        assert!(script.contains("agent.auto.register.key=register-key"));
        assert!(script.contains(&format!("pluginId={PLUGIN_ID}")));
    }

    #[test]
    fn user_data_appends_extra_verbatim() {
        let mut req = request("subnet-a");
        req.properties.insert(
            "ec2_user_data".to_string(),
            "docker pull builder:latest\n".to_string(),
        );
        let script = build_user_data(&req, &settings());
        assert!(script.ends_with("docker pull builder:latest\n"));
    }

    #[tokio::test]
    async fn first_successful_subnet_wins() {
        let ec2 = FakeEc2::new();
        let instance = launch(&ec2, &request("subnet-a,subnet-b,subnet-c"), &settings())
            .await
            .unwrap()
            .unwrap();

        // One attempt only — no further launches after a success.
        assert_eq!(ec2.run_attempts().len(), 1);
        assert_eq!(ec2.run_attempts()[0], instance_subnet(&ec2, &instance.id));
    }

    #[tokio::test]
    async fn failing_zones_are_skipped() {
        let ec2 = FakeEc2::new();
        ec2.fail_subnet("subnet-a");
        ec2.fail_subnet("subnet-b");

        let instance = launch(&ec2, &request("subnet-a,subnet-b,subnet-c"), &settings())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(instance_subnet(&ec2, &instance.id), "subnet-c");
        // The loop stops at the success; it never retries past it.
        assert_eq!(ec2.run_attempts().last().map(String::as_str), Some("subnet-c"));
        assert!(ec2.run_attempts().len() <= 3);
    }

    #[tokio::test]
    async fn exhausted_subnets_return_none() {
        let ec2 = FakeEc2::new();
        ec2.fail_subnet("subnet-a");
        ec2.fail_subnet("subnet-b");

        let result = launch(&ec2, &request("subnet-a,subnet-b"), &settings())
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(ec2.run_attempts().len(), 2);
    }

    #[tokio::test]
    async fn no_subnets_configured_returns_none() {
        let ec2 = FakeEc2::new();
        let result = launch(&ec2, &request(""), &settings()).await.unwrap();
        assert!(result.is_none());
        assert!(ec2.run_attempts().is_empty());
    }

    #[tokio::test]
    async fn missing_image_is_an_error() {
        let ec2 = FakeEc2::new();
        let mut req = request("subnet-a");
        req.properties.remove("ec2_ami");

        let err = launch(&ec2, &req, &settings()).await.unwrap_err();
        assert!(matches!(err, PoolError::MissingProperty("ec2_ami")));
    }

    #[tokio::test]
    async fn launched_instance_is_fully_tagged() {
        let ec2 = FakeEc2::new();
        let instance = launch(&ec2, &request("subnet-a"), &settings())
            .await
            .unwrap()
            .unwrap();

        let remote = ec2.instance(&instance.id).unwrap();
        assert_eq!(remote.tag("Type"), Some(tags::OWNERSHIP_TAG));
        assert_eq!(remote.tag("pipelineName"), Some("build"));
        assert!(remote.tag(tags::JSON_JOB_IDENTIFIER_KEY).is_some());
    }

    #[tokio::test]
    async fn tagging_failure_still_returns_the_instance() {
        let ec2 = FakeEc2::new();
        ec2.fail_tagging();

        let instance = launch(&ec2, &request("subnet-a"), &settings())
            .await
            .unwrap();
        let instance = instance.unwrap();

        let remote = ec2.instance(&instance.id).unwrap();
        assert!(remote.tags.is_empty());
    }

    fn instance_subnet(ec2: &FakeEc2, instance_id: &str) -> String {
        ec2.instance(instance_id).unwrap().subnet_id
    }
}
