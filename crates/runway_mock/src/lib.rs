//! # Runway Mock
//! [![Crates.io](https://img.shields.io/crates/v/runway_mock.svg)](https://crates.io/crates/runway_mock)
//! [![Docs](https://docs.rs/runway_mock/badge.svg)](https://docs.rs/runway_mock/)
//!
//! In-memory implementations of the runway backend traits.
//!
//! Every backend is a cheap [`Clone`] handle over shared state, so a test can hand one
//! copy to the provisioner and keep another to script responses and inspect calls.
//!
//! **Nothing here talks to a real provider. DO NOT use this in production!!!**
//!
//! ## Usage
//!
//! ```rust
//! # use runway_mock::{MockCompute, MockPricing, MockRegistry};
//! # fn main() {
//! let compute = MockCompute::default();
//! let pricing = MockPricing::default()
//!     .with_size("m5.large", 2)
//!     .with_on_demand("m5.large", 0.096);
//! let registry = MockRegistry::default();
//! # }
//! ```

use chrono::Utc;
use runway_core::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What the next `launch_instance` call does.
#[derive(Debug, Clone, PartialEq)]
pub enum LaunchOutcome {
    Succeed,
    InsufficientCapacity,
    Fail(String),
}

#[derive(Default)]
struct ComputeState {
    instances: Vec<InstanceRecord>,
    outcomes: VecDeque<LaunchOutcome>,
    launched: Vec<LaunchSpec>,
    terminated: Vec<String>,
    zones: HashMap<String, String>,
    next_id: u32,
    fail_describe: bool,
}

/// In-memory instance inventory.
///
/// Launches succeed with pending instances unless an outcome was queued.
#[derive(Clone, Default)]
pub struct MockCompute {
    state: Arc<Mutex<ComputeState>>,
}

impl MockCompute {
    pub fn with_instance(self, record: InstanceRecord) -> Self {
        lock(&self.state).instances.push(record);
        self
    }

    pub fn with_subnet(self, subnet_id: &str, zone: &str) -> Self {
        lock(&self.state)
            .zones
            .insert(subnet_id.to_string(), zone.to_string());
        self
    }

    /// Queues the outcome of the next unscripted launch.
    pub fn push_outcome(&self, outcome: LaunchOutcome) {
        lock(&self.state).outcomes.push_back(outcome);
    }

    /// Makes every inventory query fail.
    pub fn fail_describe(&self) {
        lock(&self.state).fail_describe = true;
    }

    /// Specs of every launch request, successful or not.
    pub fn launched(&self) -> Vec<LaunchSpec> {
        lock(&self.state).launched.clone()
    }

    pub fn terminated(&self) -> Vec<String> {
        lock(&self.state).terminated.clone()
    }

    pub fn instances(&self) -> Vec<InstanceRecord> {
        lock(&self.state).instances.clone()
    }
}

impl ComputeProvider for MockCompute {
    async fn launch_instance(&self, spec: &LaunchSpec) -> Result<Vec<InstanceRecord>, ComputeError> {
        let mut state = lock(&self.state);
        state.launched.push(spec.clone());

        match state.outcomes.pop_front().unwrap_or(LaunchOutcome::Succeed) {
            LaunchOutcome::Succeed => {}
            LaunchOutcome::InsufficientCapacity => {
                return Err(ComputeError::InsufficientCapacity(format!(
                    "no capacity for {}",
                    spec.size
                )));
            }
            LaunchOutcome::Fail(msg) => return Err(ComputeError::System(msg)),
        }

        state.next_id += 1;
        let record = InstanceRecord {
            id: format!("i-mock{:04}", state.next_id),
            state: InstanceState::Pending,
            tags: spec.tags.clone(),
        };
        state.instances.push(record.clone());
        Ok(vec![record])
    }

    async fn describe_instances(
        &self,
        filter: &InstanceFilter,
    ) -> Result<Vec<InstanceRecord>, ComputeError> {
        let state = lock(&self.state);
        if state.fail_describe {
            return Err(ComputeError::System("describe unavailable".into()));
        }
        Ok(state
            .instances
            .iter()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect())
    }

    async fn wait_until_running(&self, id: &str) -> Result<(), ComputeError> {
        let mut state = lock(&self.state);
        let record = state
            .instances
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| ComputeError::NotFound(id.to_string()))?;
        match record.state {
            InstanceState::Pending | InstanceState::Running => {
                record.state = InstanceState::Running;
                Ok(())
            }
            other => Err(ComputeError::System(format!(
                "instance {id} is {}",
                other.as_str()
            ))),
        }
    }

    async fn terminate_instances(&self, ids: &[String]) -> Result<(), ComputeError> {
        let mut state = lock(&self.state);
        for id in ids {
            if let Some(record) = state.instances.iter_mut().find(|i| &i.id == id) {
                record.state = InstanceState::ShuttingDown;
            }
            state.terminated.push(id.clone());
        }
        Ok(())
    }

    async fn subnet_zone(&self, subnet_id: &str) -> Result<String, ComputeError> {
        lock(&self.state)
            .zones
            .get(subnet_id)
            .cloned()
            .ok_or_else(|| ComputeError::NotFound(subnet_id.to_string()))
    }
}

#[derive(Default)]
struct PricingState {
    on_demand: HashMap<String, f64>,
    spot: HashMap<String, f64>,
    catalog: Vec<InstanceSize>,
    page_size: Option<usize>,
    spot_queries: Vec<(String, String)>,
    pages_served: usize,
}

/// Fixed price table and size catalog.
#[derive(Clone, Default)]
pub struct MockPricing {
    state: Arc<Mutex<PricingState>>,
}

impl MockPricing {
    pub fn with_size(self, name: &str, vcpus: u32) -> Self {
        lock(&self.state).catalog.push(InstanceSize::new(name, vcpus));
        self
    }

    pub fn with_on_demand(self, size: &str, price: f64) -> Self {
        lock(&self.state).on_demand.insert(size.to_string(), price);
        self
    }

    pub fn with_spot(self, size: &str, price: f64) -> Self {
        lock(&self.state).spot.insert(size.to_string(), price);
        self
    }

    /// Serves the catalog in pages of `size` entries.
    pub fn with_page_size(self, size: usize) -> Self {
        lock(&self.state).page_size = Some(size);
        self
    }

    /// `(size, zone)` of every spot history query, in order.
    pub fn spot_queries(&self) -> Vec<(String, String)> {
        lock(&self.state).spot_queries.clone()
    }

    pub fn pages_served(&self) -> usize {
        lock(&self.state).pages_served
    }
}

impl PricingProvider for MockPricing {
    async fn on_demand_price(&self, size: &str) -> Result<Option<f64>, PricingError> {
        Ok(lock(&self.state).on_demand.get(size).copied())
    }

    async fn spot_price_history(&self, size: &str, zone: &str) -> Result<Vec<PriceQuote>, PricingError> {
        let mut state = lock(&self.state);
        state
            .spot_queries
            .push((size.to_string(), zone.to_string()));
        Ok(state
            .spot
            .get(size)
            .map(|price| PriceQuote {
                size: size.to_string(),
                zone: zone.to_string(),
                price: *price,
                timestamp: Utc::now(),
            })
            .into_iter()
            .collect())
    }

    async fn instance_sizes_page(
        &self,
        family: &str,
        next_token: Option<String>,
    ) -> Result<InstanceSizePage, PricingError> {
        let mut state = lock(&self.state);
        state.pages_served += 1;

        let matching: Vec<InstanceSize> = state
            .catalog
            .iter()
            .filter(|s| family_of(&s.name) == family)
            .cloned()
            .collect();
        let start = match next_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| PricingError::Malformed(format!("bad page token {token}")))?,
            None => 0,
        };
        let end = state
            .page_size
            .map_or(matching.len(), |n| (start + n).min(matching.len()));

        Ok(InstanceSizePage {
            sizes: matching.get(start..end).map(<[_]>::to_vec).unwrap_or_default(),
            next_token: (end < matching.len()).then(|| end.to_string()),
        })
    }
}

#[derive(Default)]
struct RegistryState {
    registrations: BTreeMap<String, Registration>,
    snapshots: VecDeque<Vec<Registration>>,
    undeletable: HashSet<String>,
    list_calls: Vec<Instant>,
    list_delay: Option<Duration>,
    failing_lists: u32,
    deleted: Vec<String>,
    tokens_issued: u32,
    fail_tokens_after: Option<u32>,
}

/// In-memory registration service.
///
/// Listing serves queued snapshots first (one per call), then the live registration set.
#[derive(Clone, Default)]
pub struct MockRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl MockRegistry {
    pub fn with_registration(self, registration: Registration) -> Self {
        lock(&self.state)
            .registrations
            .insert(registration.id.clone(), registration);
        self
    }

    /// Queues the result of one future `list_registrations` call.
    pub fn push_snapshot(&self, registrations: Vec<Registration>) {
        lock(&self.state).snapshots.push_back(registrations);
    }

    /// Makes every `list_registrations` call take `delay` before answering.
    pub fn with_list_delay(self, delay: Duration) -> Self {
        lock(&self.state).list_delay = Some(delay);
        self
    }

    /// Makes the next `n` `list_registrations` calls fail.
    pub fn fail_lists(&self, n: u32) {
        lock(&self.state).failing_lists = n;
    }

    /// Makes deletion of `id` report failure.
    pub fn refuse_delete(&self, id: &str) {
        lock(&self.state).undeletable.insert(id.to_string());
    }

    /// Makes token issuance fail once `n` tokens were issued.
    pub fn fail_tokens_after(&self, n: u32) {
        lock(&self.state).fail_tokens_after = Some(n);
    }

    /// When each `list_registrations` call happened.
    pub fn list_calls(&self) -> Vec<Instant> {
        lock(&self.state).list_calls.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        lock(&self.state).deleted.clone()
    }

    pub fn tokens_issued(&self) -> u32 {
        lock(&self.state).tokens_issued
    }
}

impl RegistrationService for MockRegistry {
    fn registration_url(&self) -> String {
        "https://github.com/mock/repo".to_string()
    }

    async fn list_registrations(&self, labels: &[String]) -> Result<Vec<Registration>, RegistrationError> {
        let delay = {
            let mut state = lock(&self.state);
            state.list_calls.push(Instant::now());
            state.list_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = lock(&self.state);
        if state.failing_lists > 0 {
            state.failing_lists -= 1;
            return Err(RegistrationError::Service(502, "bad gateway".into()));
        }

        let source = match state.snapshots.pop_front() {
            Some(snapshot) => snapshot,
            None => state.registrations.values().cloned().collect(),
        };
        Ok(source.into_iter().filter(|r| r.has_labels(labels)).collect())
    }

    async fn delete_registration(&self, id: &str) -> Result<bool, RegistrationError> {
        let mut state = lock(&self.state);
        if state.undeletable.contains(id) {
            return Ok(false);
        }
        state.deleted.push(id.to_string());
        Ok(state.registrations.remove(id).is_some())
    }

    async fn issue_registration_token(&self) -> Result<RegistrationToken, RegistrationError> {
        let mut state = lock(&self.state);
        if state
            .fail_tokens_after
            .is_some_and(|limit| state.tokens_issued >= limit)
        {
            return Err(RegistrationError::Service(503, "token service down".into()));
        }
        state.tokens_issued += 1;
        Ok(RegistrationToken {
            token: format!("token-{}", state.tokens_issued),
            expires_at: None,
        })
    }
}
