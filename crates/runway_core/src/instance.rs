use crate::constants::tags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque name of one CI job's capacity. Used as instance tag value and runner label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceState {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    Stopping,
    Stopped,
}

impl InstanceState {
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

/// An instance as observed through the provider's inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub id: String,
    pub state: InstanceState,
    pub tags: BTreeMap<String, String>,
}

impl InstanceRecord {
    pub fn job_id(&self) -> Option<&str> {
        self.tags.get(tags::JOB_ID).map(String::as_str)
    }
}

/// Tag-based inventory query. An empty `states` list matches every lifecycle state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceFilter {
    pub tags: Vec<(String, String)>,
    pub states: Vec<InstanceState>,
}

impl InstanceFilter {
    pub fn for_job(job: &JobId) -> Self {
        Self {
            tags: vec![(tags::JOB_ID.to_string(), job.to_string())],
            states: Vec::new(),
        }
    }

    pub fn with_state(mut self, state: InstanceState) -> Self {
        self.states.push(state);
        self
    }

    pub fn matches(&self, record: &InstanceRecord) -> bool {
        let tags_match = self
            .tags
            .iter()
            .all(|(k, v)| record.tags.get(k).is_some_and(|t| t == v));
        let state_match = self.states.is_empty() || self.states.contains(&record.state);
        tags_match && state_match
    }
}

/// Spot market options. Requests are always one-time and the instance is
/// terminated on interruption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotMarket {
    /// Maximum hourly price in USD.
    pub max_price: f64,
}

impl SpotMarket {
    pub fn one_time(max_price: f64) -> Self {
        Self { max_price }
    }
}

/// Everything needed to request one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchSpec {
    pub image_id: String,
    pub size: String,
    pub subnet_id: String,
    pub security_group_id: String,
    pub key_name: Option<String>,
    pub iam_instance_profile: Option<String>,
    pub tags: BTreeMap<String, String>,
    /// Plain-text boot script. Providers encode it as they require.
    pub user_data: String,
    /// [`None`] requests on-demand capacity.
    pub market: Option<SpotMarket>,
}

impl LaunchSpec {
    pub fn is_spot(&self) -> bool {
        self.market.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSize {
    pub name: String,
    pub vcpus: u32,
}

impl InstanceSize {
    pub fn new(name: impl Into<String>, vcpus: u32) -> Self {
        Self {
            name: name.into(),
            vcpus,
        }
    }
}

/// One page of a family's size catalog.
#[derive(Debug, Clone, Default)]
pub struct InstanceSizePage {
    pub sizes: Vec<InstanceSize>,
    pub next_token: Option<String>,
}

/// A point-in-time spot quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub size: String,
    pub zone: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Family prefix of a size name, e.g. `m5` for `m5.large`.
pub fn family_of(size: &str) -> &str {
    size.split_once('.').map(|(family, _)| family).unwrap_or(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(state: InstanceState, job: &str) -> InstanceRecord {
        InstanceRecord {
            id: "i-1".into(),
            state,
            tags: BTreeMap::from([(tags::JOB_ID.to_string(), job.to_string())]),
        }
    }

    #[test]
    fn filter_matches_tags_and_states() {
        let job = JobId::new("job-a");
        let any = InstanceFilter::for_job(&job);
        let running = InstanceFilter::for_job(&job).with_state(InstanceState::Running);

        assert!(any.matches(&record(InstanceState::Stopped, "job-a")));
        assert!(running.matches(&record(InstanceState::Running, "job-a")));
        assert!(!running.matches(&record(InstanceState::Pending, "job-a")));
        assert!(!any.matches(&record(InstanceState::Running, "job-b")));
    }

    #[test]
    fn family_prefix() {
        assert_eq!(family_of("m5.large"), "m5");
        assert_eq!(family_of("c6gn.16xlarge"), "c6gn");
        assert_eq!(family_of("weird"), "weird");
    }
}
