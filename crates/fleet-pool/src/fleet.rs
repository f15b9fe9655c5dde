//! The fleet facade — every exposed pool operation lives here.
//!
//! `AgentFleet` wires the synchronized registry, the provisioning
//! workflow, the reaper, and the report builders together. It is generic
//! over the cloud API and the clock so tests drive it with `FakeEc2` and
//! `FakeClock`.

use tracing::{debug, error, info, warn};

use fleet_core::{Agents, Clock, CreateAgentRequest, FleetSettings, JobIdentifier, SystemClock};
use fleet_ec2::{tags, DescribeFilter, Ec2Api, InstanceStateName};

use crate::error::{PoolError, PoolResult};
use crate::instance::AgentInstance;
use crate::provision;
use crate::registry::{Admission, Registry};
use crate::reaper;
use crate::report::{AgentStatusReport, InstanceStatusReport, StatusReport};

/// How long a completed reconciliation stays fresh. Within this window
/// `refresh_all` is a no-op; `force_refresh` ignores it.
pub const REFRESH_STALENESS_SECS: u64 = 600;

/// The pool of elastic agent instances for one plugin configuration.
pub struct AgentFleet<C: Ec2Api, K: Clock = SystemClock> {
    ec2: C,
    clock: K,
    registry: Registry,
}

impl<C: Ec2Api> AgentFleet<C> {
    /// Create a fleet on the system clock.
    pub fn new(ec2: C) -> Self {
        Self::with_clock(ec2, SystemClock)
    }
}

impl<C: Ec2Api, K: Clock> AgentFleet<C, K> {
    /// Create a fleet with an injected clock (tests).
    pub fn with_clock(ec2: C, clock: K) -> Self {
        Self {
            ec2,
            clock,
            registry: Registry::new(),
        }
    }

    /// Create one agent instance for the job, subject to admission.
    ///
    /// Returns `Ok(None)` on capacity denial or when every candidate
    /// subnet failed; either way nothing was registered and no capacity
    /// is consumed. Denial is a warning, not an error — the orchestrator
    /// retries with its own backoff.
    pub async fn create(
        &self,
        request: &CreateAgentRequest,
        settings: &FleetSettings,
    ) -> PoolResult<Option<AgentInstance>> {
        // Capacity is re-read from settings on every call; the admission
        // check and permit take are one critical section inside admit().
        match self
            .registry
            .admit(&request.job_identifier, settings.max_agents)
            .await
        {
            Admission::AtCapacity { in_use, pending } => {
                let waiting = pending
                    .iter()
                    .map(JobIdentifier::representation)
                    .collect::<Vec<_>>()
                    .join(", ");
                warn!(
                    in_use,
                    max_agents = settings.max_agents,
                    %waiting,
                    "instance count at the maximum permissible limit; not creating more instances"
                );
                Ok(None)
            }
            Admission::Granted => match provision::launch(&self.ec2, request, settings).await {
                Ok(Some(instance)) => {
                    self.registry
                        .complete(&request.job_identifier, instance.clone())
                        .await;
                    Ok(Some(instance))
                }
                Ok(None) => {
                    self.registry.abort().await;
                    Ok(None)
                }
                Err(e) => {
                    self.registry.abort().await;
                    Err(e)
                }
            },
        }
    }

    /// Terminate one instance and drop its record.
    ///
    /// The record and its permit are released even when the remote call
    /// fails, so a stray instance cannot wedge admission; the typed
    /// error tells the caller to escalate the stray.
    pub async fn terminate(
        &self,
        instance_id: &str,
        _settings: &FleetSettings,
    ) -> PoolResult<()> {
        let remote_result = if self.registry.contains(instance_id).await {
            self.ec2.terminate_instance(instance_id).await
        } else {
            warn!(%instance_id, "requested to terminate an instance that does not exist");
            Ok(())
        };

        self.registry.remove(instance_id).await;

        match remote_result {
            Ok(()) => {
                info!(%instance_id, "terminated instance");
                Ok(())
            }
            Err(source) => Err(PoolError::Termination {
                instance_id: instance_id.to_string(),
                source,
            }),
        }
    }

    /// Rebuild the registry from the provider's authoritative,
    /// ownership-tag-filtered instance list.
    ///
    /// No-op while the last completed pass is younger than
    /// [`REFRESH_STALENESS_SECS`]; concurrent passes are serialized by
    /// the registry's refresh claim. Must run before admission decisions
    /// are trusted after a process restart.
    pub async fn refresh_all(&self, settings: &FleetSettings) -> PoolResult<()> {
        self.refresh_with_staleness(settings, REFRESH_STALENESS_SECS)
            .await
    }

    /// Reconcile immediately, ignoring the staleness window.
    pub async fn force_refresh(&self, settings: &FleetSettings) -> PoolResult<()> {
        self.refresh_with_staleness(settings, 0).await
    }

    async fn refresh_with_staleness(
        &self,
        settings: &FleetSettings,
        staleness_secs: u64,
    ) -> PoolResult<()> {
        let now = self.clock.epoch_secs();
        if !self.registry.begin_refresh(now, staleness_secs).await {
            debug!("reconciliation skipped; registry is fresh or a pass is running");
            return Ok(());
        }

        let result = self.reconcile(settings).await;
        self.registry
            .finish_refresh(self.clock.epoch_secs(), result.is_ok())
            .await;
        result
    }

    async fn reconcile(&self, _settings: &FleetSettings) -> PoolResult<()> {
        let filter = DescribeFilter {
            states: vec![InstanceStateName::Pending, InstanceStateName::Running],
            type_tag: Some(tags::OWNERSHIP_TAG.to_string()),
            instance_id: None,
        };
        let remote = self.ec2.describe_instances(&filter).await?;

        let mut reconstructed = 0usize;
        for cloud in &remote {
            let record = AgentInstance::from_cloud(cloud);
            if self.registry.insert_reconciled(record).await {
                reconstructed += 1;
            }
            debug!(instance_id = %cloud.instance_id, "refreshed instance");
        }
        self.registry.sync_permits().await;

        info!(
            total = remote.len(),
            reconstructed, "reconciled registry against provider state"
        );
        Ok(())
    }

    /// Look up a record by cloud instance id.
    pub async fn find_by_id(&self, instance_id: &str) -> Option<AgentInstance> {
        self.registry.get(instance_id).await
    }

    /// Look up the record created for a job, if any.
    pub async fn find_by_job(&self, job: &JobIdentifier) -> Option<AgentInstance> {
        self.registry.find_by_job(job).await
    }

    /// Whether a record exists for the id. Test support.
    pub async fn has_instance(&self, instance_id: &str) -> bool {
        self.registry.contains(instance_id).await
    }

    /// Number of registered instances.
    pub async fn instance_count(&self) -> usize {
        self.registry.len().await
    }

    /// Terminate every registered instance the orchestrator does not
    /// know as an agent and whose registration window has expired.
    pub async fn terminate_unregistered(
        &self,
        settings: &FleetSettings,
        known_agents: &Agents,
    ) -> PoolResult<()> {
        let timeout = settings.auto_register_period()?;
        let snapshot = self.registry.snapshot().await;
        let overdue = reaper::unregistered_overdue(
            &snapshot,
            known_agents,
            timeout,
            self.clock.epoch_secs(),
        );

        if overdue.is_empty() {
            return Ok(());
        }

        warn!(instances = ?overdue, "terminating instances that did not register in time");
        // One stray must not shield the rest of the sweep; the first
        // failure is surfaced after every overdue instance was tried.
        let mut first_failure = None;
        for instance_id in &overdue {
            if let Err(e) = self.terminate(instance_id, settings).await {
                error!(%instance_id, error = %e, "failed to terminate overdue instance");
                if first_failure.is_none() {
                    first_failure = Some(e);
                }
            }
        }
        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Known agents whose backing instance has outlived the registration
    /// window — the orchestrator uses this to decide what to disown.
    pub async fn instances_created_after_timeout(
        &self,
        settings: &FleetSettings,
        known_agents: &Agents,
    ) -> PoolResult<Agents> {
        let timeout = settings.auto_register_period()?;
        let snapshot = self.registry.snapshot().await;
        Ok(reaper::known_overdue(
            &snapshot,
            known_agents,
            timeout,
            self.clock.epoch_secs(),
        ))
    }

    /// Aggregate report over every instance the fleet owns, including
    /// ones stopping or stopped.
    pub async fn status_report(&self, _settings: &FleetSettings) -> PoolResult<StatusReport> {
        let filter = DescribeFilter {
            states: vec![
                InstanceStateName::Pending,
                InstanceStateName::Running,
                InstanceStateName::ShuttingDown,
                InstanceStateName::Stopping,
                InstanceStateName::Stopped,
            ],
            type_tag: Some(tags::OWNERSHIP_TAG.to_string()),
            instance_id: None,
        };
        let remote = self.ec2.describe_instances(&filter).await?;

        let rows = remote
            .iter()
            .map(InstanceStatusReport::from_cloud)
            .collect::<Vec<_>>();
        info!(total = rows.len(), "built status report");
        Ok(StatusReport::new(rows))
    }

    /// Detailed report for one agent's backing instance.
    ///
    /// Fails with [`PoolError::StaleRecord`] when the remote instance no
    /// longer exists — a dangling local record, distinct from an
    /// unhealthy instance.
    pub async fn agent_status_report(
        &self,
        _settings: &FleetSettings,
        record: &AgentInstance,
    ) -> PoolResult<AgentStatusReport> {
        let filter = DescribeFilter {
            states: vec![],
            type_tag: Some(tags::OWNERSHIP_TAG.to_string()),
            instance_id: Some(record.id.clone()),
        };
        let mut remote = self.ec2.describe_instances(&filter).await?;

        match remote.pop() {
            Some(instance) if instance.state != InstanceStateName::Terminated => {
                Ok(AgentStatusReport {
                    job: record.job.clone(),
                    instance,
                    created_at: record.created_at,
                })
            }
            _ => Err(PoolError::StaleRecord(record.id.clone())),
        }
    }
}
