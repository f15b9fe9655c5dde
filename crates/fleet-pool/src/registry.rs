//! The synchronized registry — the only holder of mutable pool state.
//!
//! One `tokio::sync::Mutex` owns the instance map, the pending-job list,
//! the admission permit count, and the refresh stamp. Admission (the
//! size-vs-max check plus permit acquisition) is a single critical
//! section, so two concurrent creates can never both slip under the cap.
//! Remote API calls always happen outside the lock, with a permit
//! already reserved.

use std::collections::HashMap;

use tokio::sync::Mutex;

use fleet_core::JobIdentifier;

use crate::instance::AgentInstance;

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// A permit was taken; the caller must either register an instance
    /// (`complete`) or give the permit back (`abort`).
    Granted,
    /// The pool is at capacity. Carries the permit count the check gated
    /// on and every job still waiting for an agent, for the denial
    /// diagnostic.
    AtCapacity {
        /// Permits held: registered instances plus in-flight
        /// provisioning attempts.
        in_use: usize,
        pending: Vec<JobIdentifier>,
    },
}

#[derive(Default)]
struct RegistryInner {
    instances: HashMap<String, AgentInstance>,
    /// Jobs waiting for an agent, insertion-ordered, identity-deduped.
    /// Diagnostic only — never authoritative.
    pending_jobs: Vec<JobIdentifier>,
    /// Admission permits currently held (registered instances plus
    /// in-flight provisioning attempts).
    permits_in_use: usize,
    /// Grants whose provisioning attempt has neither completed nor
    /// aborted yet. Always <= permits_in_use.
    in_flight: usize,
    /// Epoch seconds of the last completed reconciliation.
    last_refresh: Option<u64>,
    refresh_in_progress: bool,
}

/// Owner-exclusive store for the fleet's mutable state.
#[derive(Default)]
pub struct Registry {
    inner: Mutex<RegistryInner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the job as waiting and try to take an admission permit.
    ///
    /// Capacity is recomputed from `max_agents` on every call — the
    /// setting can change between calls and must never be cached here.
    /// On denial the pending entry is kept; it only clears when an
    /// instance is eventually registered for the job.
    pub async fn admit(&self, job: &JobIdentifier, max_agents: usize) -> Admission {
        let mut inner = self.inner.lock().await;

        if !inner.pending_jobs.contains(job) {
            inner.pending_jobs.push(job.clone());
        }

        if inner.permits_in_use < max_agents {
            inner.permits_in_use += 1;
            inner.in_flight += 1;
            Admission::Granted
        } else {
            Admission::AtCapacity {
                in_use: inner.permits_in_use,
                pending: inner.pending_jobs.clone(),
            }
        }
    }

    /// Register a freshly provisioned instance under a held permit and
    /// clear the job's pending entry. The permit stays held; it now
    /// backs a registered instance instead of an in-flight attempt.
    pub async fn complete(&self, job: &JobIdentifier, instance: AgentInstance) {
        let mut inner = self.inner.lock().await;
        inner.in_flight = inner.in_flight.saturating_sub(1);
        inner.pending_jobs.retain(|j| j != job);
        inner.instances.insert(instance.id.clone(), instance);
    }

    /// Give back a permit after a failed provisioning attempt.
    pub async fn abort(&self) {
        let mut inner = self.inner.lock().await;
        inner.in_flight = inner.in_flight.saturating_sub(1);
        inner.permits_in_use = inner.permits_in_use.saturating_sub(1);
    }

    /// Remove a record and release its permit. Returns the record, or
    /// `None` (and no permit change) if the id was not registered.
    pub async fn remove(&self, instance_id: &str) -> Option<AgentInstance> {
        let mut inner = self.inner.lock().await;
        let removed = inner.instances.remove(instance_id);
        if removed.is_some() {
            inner.permits_in_use = inner.permits_in_use.saturating_sub(1);
        }
        removed
    }

    /// Insert a record reconstructed by reconciliation. Keyed by id, so
    /// repeated refreshes never duplicate. Returns whether it was new.
    pub async fn insert_reconciled(&self, instance: AgentInstance) -> bool {
        let mut inner = self.inner.lock().await;
        inner
            .instances
            .insert(instance.id.clone(), instance)
            .is_none()
    }

    /// Align the permit count with the registry size, after
    /// reconciliation rebuilt the map. Permits held by still-in-flight
    /// provisioning attempts are preserved; their instances are not in
    /// the map yet.
    pub async fn sync_permits(&self) {
        let mut inner = self.inner.lock().await;
        inner.permits_in_use = inner.instances.len() + inner.in_flight;
    }

    /// Claim the right to run a reconciliation pass.
    ///
    /// Returns `false` while another pass is running or while the last
    /// completed pass is younger than `staleness_secs`.
    pub async fn begin_refresh(&self, now: u64, staleness_secs: u64) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.refresh_in_progress {
            return false;
        }
        if let Some(last) = inner.last_refresh
            && now < last.saturating_add(staleness_secs)
        {
            return false;
        }
        inner.refresh_in_progress = true;
        true
    }

    /// Release the refresh claim; stamps the time only on success so a
    /// failed pass can be retried immediately.
    pub async fn finish_refresh(&self, now: u64, success: bool) {
        let mut inner = self.inner.lock().await;
        inner.refresh_in_progress = false;
        if success {
            inner.last_refresh = Some(now);
        }
    }

    pub async fn get(&self, instance_id: &str) -> Option<AgentInstance> {
        self.inner.lock().await.instances.get(instance_id).cloned()
    }

    pub async fn find_by_job(&self, job: &JobIdentifier) -> Option<AgentInstance> {
        let inner = self.inner.lock().await;
        inner
            .instances
            .values()
            .find(|i| i.job.as_ref() == Some(job))
            .cloned()
    }

    pub async fn contains(&self, instance_id: &str) -> bool {
        self.inner.lock().await.instances.contains_key(instance_id)
    }

    /// Copy of every registered record.
    pub async fn snapshot(&self) -> Vec<AgentInstance> {
        self.inner.lock().await.instances.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.instances.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.instances.is_empty()
    }
}
