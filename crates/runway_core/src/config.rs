use crate::constants::{defaults, tags};
use crate::error::ConfigError;
use crate::instance::JobId;
use std::collections::BTreeMap;
use std::time::Duration;

/// Settings for one provisioning cycle.
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    pub image_id: String,
    /// Baseline instance size, e.g. `m5.large`.
    pub instance_size: String,
    pub subnet_id: String,
    pub security_group_id: String,
    pub key_name: Option<String>,
    pub iam_instance_profile: Option<String>,
    /// Placement zone for spot quotes. Resolved from the subnet when [`None`].
    pub availability_zone: Option<String>,
    /// Extra tags applied to every launched instance.
    pub tags: BTreeMap<String, String>,
    /// Purchasing intent, e.g. `besteffort`.
    pub strategy: String,
    /// Labels in addition to the job id.
    pub labels: Vec<String>,
    pub runners_per_instance: u32,
    pub runner_user: String,
    pub runner_home: String,
    /// Shell snippet run before the runners start.
    pub pre_runner_script: Option<String>,
    pub readiness: ReadinessConfig,
}

/// Timing of the registration readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessConfig {
    pub quiet_period: Duration,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            quiet_period: defaults::QUIET_PERIOD,
            poll_interval: defaults::POLL_INTERVAL,
            timeout: defaults::READINESS_TIMEOUT,
        }
    }
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            image_id: String::new(),
            instance_size: String::new(),
            subnet_id: String::new(),
            security_group_id: String::new(),
            key_name: None,
            iam_instance_profile: None,
            availability_zone: None,
            tags: BTreeMap::new(),
            strategy: defaults::STRATEGY.to_string(),
            labels: Vec::new(),
            runners_per_instance: defaults::RUNNERS_PER_INSTANCE,
            runner_user: defaults::RUNNER_USER.to_string(),
            runner_home: defaults::RUNNER_HOME.to_string(),
            pre_runner_script: None,
            readiness: ReadinessConfig::default(),
        }
    }
}

impl ProvisionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("image-id", &self.image_id),
            ("instance-type", &self.instance_size),
            ("subnet-id", &self.subnet_id),
            ("security-group-id", &self.security_group_id),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(ConfigError::Missing(*name));
        }

        if !self.instance_size.contains('.') {
            return Err(ConfigError::Invalid(
                "instance-type",
                format!("'{}' is not of the form <family>.<size>", self.instance_size),
            ));
        }

        if self.runners_per_instance == 0 {
            return Err(ConfigError::Invalid(
                "runners-per-instance",
                "must be at least 1".into(),
            ));
        }

        if self.readiness.poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "poll-interval",
                "must be greater than zero".into(),
            ));
        }

        if self.tags.contains_key(tags::JOB_ID) {
            return Err(ConfigError::Invalid(
                "tags",
                format!("'{}' is reserved", tags::JOB_ID),
            ));
        }

        Ok(())
    }

    /// The label set every runner for `job` registers with.
    pub fn job_labels(&self, job: &JobId) -> Vec<String> {
        let mut labels = vec![job.to_string()];
        for label in &self.labels {
            if !labels.contains(label) {
                labels.push(label.clone());
            }
        }
        labels
    }

    /// Tags for an instance launched for `job`.
    pub fn job_tags(&self, job: &JobId) -> BTreeMap<String, String> {
        let mut out = self.tags.clone();
        out.entry(tags::NAME.to_string())
            .or_insert_with(|| format!("runway-{job}"));
        out.insert(tags::JOB_ID.to_string(), job.to_string());
        out
    }
}
