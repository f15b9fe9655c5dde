//! In-memory EC2 fake for tests.
//!
//! Behaves like a tiny regional EC2 endpoint: launches get sequential
//! instance ids, tags accumulate, describe applies the same filter
//! semantics as the real API. Failure injection is per-subnet (capacity
//! errors), per-instance (termination), or global (tagging), which is
//! enough to script every provisioning edge case the fleet handles.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::{CloudInstance, DescribeFilter, Ec2Api, InstanceStateName, RunInstancesSpec, Tag};
use crate::error::{Ec2Error, Ec2Result};

#[derive(Default)]
struct FakeState {
    instances: HashMap<String, CloudInstance>,
    fail_subnets: HashSet<String>,
    fail_terminations: HashSet<String>,
    fail_tagging: bool,
    next_id: u64,
    launch_time: u64,
    run_attempts: Vec<String>,
    terminated: Vec<String>,
}

/// An in-memory [`Ec2Api`] implementation.
#[derive(Default)]
pub struct FakeEc2 {
    state: Mutex<FakeState>,
}

impl FakeEc2 {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make launches into the given subnet fail with a capacity error.
    pub fn fail_subnet(&self, subnet_id: &str) {
        self.lock().fail_subnets.insert(subnet_id.to_string());
    }

    /// Make termination of the given instance fail with a service error.
    pub fn fail_termination(&self, instance_id: &str) {
        self.lock()
            .fail_terminations
            .insert(instance_id.to_string());
    }

    /// Make all tag-attachment calls fail.
    pub fn fail_tagging(&self) {
        self.lock().fail_tagging = true;
    }

    /// Launch time stamped onto subsequently launched instances.
    pub fn set_launch_time(&self, epoch_secs: u64) {
        self.lock().launch_time = epoch_secs;
    }

    /// Seed a pre-existing instance, as if launched by an earlier process.
    pub fn seed(&self, instance: CloudInstance) {
        self.lock()
            .instances
            .insert(instance.instance_id.clone(), instance);
    }

    /// Force an instance into the given lifecycle state.
    pub fn set_state(&self, instance_id: &str, state: InstanceStateName) {
        if let Some(instance) = self.lock().instances.get_mut(instance_id) {
            instance.state = state;
        }
    }

    /// Subnets attempted by `run_instance`, in call order.
    pub fn run_attempts(&self) -> Vec<String> {
        self.lock().run_attempts.clone()
    }

    /// Instance ids successfully terminated, in call order.
    pub fn terminated(&self) -> Vec<String> {
        self.lock().terminated.clone()
    }

    /// Snapshot of one instance.
    pub fn instance(&self, instance_id: &str) -> Option<CloudInstance> {
        self.lock().instances.get(instance_id).cloned()
    }
}

#[async_trait]
impl Ec2Api for FakeEc2 {
    async fn run_instance(&self, spec: RunInstancesSpec) -> Ec2Result<CloudInstance> {
        let mut state = self.lock();
        state.run_attempts.push(spec.subnet_id.clone());

        if state.fail_subnets.contains(&spec.subnet_id) {
            return Err(Ec2Error::service(
                "InsufficientInstanceCapacity",
                format!("no capacity in {}", spec.subnet_id),
            ));
        }

        state.next_id += 1;
        let instance = CloudInstance {
            instance_id: format!("i-{:08x}", state.next_id),
            image_id: spec.image_id,
            instance_type: spec.instance_type,
            state: InstanceStateName::Pending,
            subnet_id: spec.subnet_id,
            private_ip: Some(format!("10.0.0.{}", state.next_id)),
            launch_time: state.launch_time,
            tags: Vec::new(),
        };
        state
            .instances
            .insert(instance.instance_id.clone(), instance.clone());
        Ok(instance)
    }

    async fn create_tags(&self, instance_id: &str, tags: Vec<Tag>) -> Ec2Result<()> {
        let mut state = self.lock();
        if state.fail_tagging {
            return Err(Ec2Error::service("TagLimitExceeded", "tagging disabled"));
        }

        let instance = state.instances.get_mut(instance_id).ok_or_else(|| {
            Ec2Error::service("InvalidInstanceID.NotFound", instance_id.to_string())
        })?;

        for tag in tags {
            match instance.tags.iter_mut().find(|t| t.key == tag.key) {
                Some(existing) => existing.value = tag.value,
                None => instance.tags.push(tag),
            }
        }
        Ok(())
    }

    async fn terminate_instance(&self, instance_id: &str) -> Ec2Result<()> {
        let mut state = self.lock();
        if state.fail_terminations.contains(instance_id) {
            return Err(Ec2Error::service(
                "InternalError",
                format!("cannot terminate {instance_id}"),
            ));
        }

        match state.instances.get_mut(instance_id) {
            Some(instance) => {
                instance.state = InstanceStateName::Terminated;
                state.terminated.push(instance_id.to_string());
                Ok(())
            }
            None => Err(Ec2Error::service(
                "InvalidInstanceID.NotFound",
                instance_id.to_string(),
            )),
        }
    }

    async fn describe_instances(&self, filter: &DescribeFilter) -> Ec2Result<Vec<CloudInstance>> {
        let state = self.lock();
        let mut matched: Vec<CloudInstance> = state
            .instances
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(subnet: &str) -> RunInstancesSpec {
        RunInstancesSpec {
            image_id: "ami-1".to_string(),
            instance_type: "t3.micro".to_string(),
            key_name: Some("key".to_string()),
            security_group: Some("sg-1".to_string()),
            subnet_id: subnet.to_string(),
            user_data_base64: String::new(),
        }
    }

    #[tokio::test]
    async fn run_assigns_sequential_ids() {
        let ec2 = FakeEc2::new();
        let first = ec2.run_instance(spec("subnet-a")).await.unwrap();
        let second = ec2.run_instance(spec("subnet-a")).await.unwrap();
        assert_ne!(first.instance_id, second.instance_id);
        assert_eq!(ec2.run_attempts(), vec!["subnet-a", "subnet-a"]);
    }

    #[tokio::test]
    async fn failed_subnet_returns_capacity_error() {
        let ec2 = FakeEc2::new();
        ec2.fail_subnet("subnet-bad");
        let err = ec2.run_instance(spec("subnet-bad")).await.unwrap_err();
        assert!(matches!(err, Ec2Error::Service { ref code, .. }
            if code == "InsufficientInstanceCapacity"));
    }

    #[tokio::test]
    async fn tags_accumulate_and_overwrite() {
        let ec2 = FakeEc2::new();
        let inst = ec2.run_instance(spec("subnet-a")).await.unwrap();

        ec2.create_tags(&inst.instance_id, vec![Tag::new("Type", "x")])
            .await
            .unwrap();
        ec2.create_tags(&inst.instance_id, vec![Tag::new("Type", "y")])
            .await
            .unwrap();

        let stored = ec2.instance(&inst.instance_id).unwrap();
        assert_eq!(stored.tag("Type"), Some("y"));
        assert_eq!(stored.tags.len(), 1);
    }

    #[tokio::test]
    async fn terminate_moves_state_and_records() {
        let ec2 = FakeEc2::new();
        let inst = ec2.run_instance(spec("subnet-a")).await.unwrap();

        ec2.terminate_instance(&inst.instance_id).await.unwrap();
        assert_eq!(ec2.terminated(), vec![inst.instance_id.clone()]);
        assert_eq!(
            ec2.instance(&inst.instance_id).unwrap().state,
            InstanceStateName::Terminated
        );
    }

    #[tokio::test]
    async fn describe_applies_state_filter() {
        let ec2 = FakeEc2::new();
        let a = ec2.run_instance(spec("subnet-a")).await.unwrap();
        let b = ec2.run_instance(spec("subnet-b")).await.unwrap();
        ec2.set_state(&b.instance_id, InstanceStateName::Stopped);

        let running = ec2
            .describe_instances(&DescribeFilter {
                states: vec![InstanceStateName::Pending, InstanceStateName::Running],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].instance_id, a.instance_id);
    }
}
