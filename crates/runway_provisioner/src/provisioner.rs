use crate::boot::BootScript;
use crate::launcher::Launcher;
use crate::readiness::ReadinessPoller;
use crate::teardown::{Teardown, TeardownReport};
use crate::tokens::issue_tokens;
use runway_core::prelude::*;
use tracing::{info, warn};

/// Capacity that is up and has at least one online runner.
#[derive(Debug, Clone)]
pub struct Provisioned {
    pub job: JobId,
    pub instance_ids: Vec<String>,
    /// True when an already running instance was reused.
    pub reused: bool,
    pub runner: Registration,
}

/// Non-terminal phases of one acquisition.
#[derive(Debug)]
enum Phase {
    CheckingInventory,
    Attempting,
    AwaitingRunning { ids: Vec<String> },
    AwaitingReadiness { ids: Vec<String>, reused: bool },
}

/// Drives acquisition, readiness and teardown for one job at a time.
#[derive(Clone)]
pub struct Provisioner<C, P, R> {
    compute: C,
    pricing: P,
    registry: R,
    config: ProvisionConfig,
}

impl<C, P, R> Provisioner<C, P, R>
where
    C: ComputeProvider,
    P: PricingProvider,
    R: RegistrationService,
{
    pub fn new(compute: C, pricing: P, registry: R, config: ProvisionConfig) -> Self {
        Self {
            compute,
            pricing,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    /// Acquires capacity for `job`, tearing down whatever was created if that fails.
    pub async fn start(&self, job: &JobId) -> Result<Provisioned, ProvisionError> {
        match self.acquire(job).await {
            Ok(provisioned) => Ok(provisioned),
            Err(e) => {
                warn!(%job, "Provisioning failed, tearing down: {e}");
                self.stop(job).await;
                Err(e)
            }
        }
    }

    /// Best-effort release of everything belonging to `job`. Never fails.
    pub async fn stop(&self, job: &JobId) -> TeardownReport {
        Teardown::new(self.compute.clone(), self.registry.clone())
            .run_best_effort(job)
            .await
    }

    /// The acquisition state machine without compensation.
    pub async fn acquire(&self, job: &JobId) -> Result<Provisioned, ProvisionError> {
        self.config.validate()?;
        let labels = self.config.job_labels(job);

        let mut phase = Phase::CheckingInventory;
        loop {
            info!(%job, ?phase, "Provisioning");
            phase = match phase {
                Phase::CheckingInventory => {
                    let filter = InstanceFilter::for_job(job).with_state(InstanceState::Running);
                    let existing = self.compute.describe_instances(&filter).await?;
                    if existing.is_empty() {
                        Phase::Attempting
                    } else {
                        Phase::AwaitingReadiness {
                            ids: existing.into_iter().map(|i| i.id).collect(),
                            reused: true,
                        }
                    }
                }
                Phase::Attempting => Phase::AwaitingRunning {
                    ids: self.attempt(job, &labels).await?,
                },
                Phase::AwaitingRunning { ids } => {
                    for id in &ids {
                        self.compute.wait_until_running(id).await?;
                    }
                    Phase::AwaitingReadiness { ids, reused: false }
                }
                Phase::AwaitingReadiness { ids, reused } => {
                    let runner = ReadinessPoller::new(self.registry.clone(), self.config.readiness)
                        .wait(&labels)
                        .await?;
                    return Ok(Provisioned {
                        job: job.clone(),
                        instance_ids: ids,
                        reused,
                        runner,
                    });
                }
            };
        }
    }

    /// Tries each resolved strategy in order until one launches.
    async fn attempt(&self, job: &JobId, labels: &[String]) -> Result<Vec<String>, ProvisionError> {
        let tokens = issue_tokens(&self.registry, self.config.runners_per_instance).await?;
        let registration_url = self.registry.registration_url();
        let user_data = BootScript {
            config: &self.config,
            job,
            registration_url: &registration_url,
            labels,
            tokens: &tokens,
        }
        .render();

        let launcher = Launcher::new(
            self.compute.clone(),
            self.pricing.clone(),
            self.base_spec(job, user_data),
            self.config.availability_zone.clone(),
        );

        let mut tried = Vec::new();
        for strategy in Strategy::resolve(&self.config.strategy) {
            let spec = launcher.build_spec(&strategy).await?;
            match launcher.launch(&spec).await {
                Ok(records) if !records.is_empty() => {
                    info!(%job, %strategy, "Acquired capacity");
                    return Ok(records.into_iter().map(|r| r.id).collect());
                }
                Ok(_) => {
                    return Err(ComputeError::System(format!(
                        "launch with strategy '{strategy}' returned no instances"
                    ))
                    .into());
                }
                Err(ComputeError::InsufficientCapacity(reason)) if !strategy.is_terminal() => {
                    warn!(%job, %strategy, "Insufficient capacity, trying next strategy: {reason}");
                    tried.push(strategy.to_string());
                }
                Err(ComputeError::InsufficientCapacity(reason)) => {
                    return Err(ProvisionError::InsufficientCapacity {
                        strategy: strategy.to_string(),
                        reason,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ProvisionError::NoCapacityAvailable { tried })
    }

    fn base_spec(&self, job: &JobId, user_data: String) -> LaunchSpec {
        LaunchSpec {
            image_id: self.config.image_id.clone(),
            size: self.config.instance_size.clone(),
            subnet_id: self.config.subnet_id.clone(),
            security_group_id: self.config.security_group_id.clone(),
            key_name: self.config.key_name.clone(),
            iam_instance_profile: self.config.iam_instance_profile.clone(),
            tags: self.config.job_tags(job),
            user_data,
            market: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runway_mock::{LaunchOutcome, MockCompute, MockPricing, MockRegistry};
    use std::collections::BTreeMap;
    use std::time::Duration;

    const SUBNET: &str = "subnet-1";

    fn config(strategy: &str) -> ProvisionConfig {
        ProvisionConfig {
            image_id: "ami-1".into(),
            instance_size: "t3.small".into(),
            subnet_id: SUBNET.into(),
            security_group_id: "sg-1".into(),
            strategy: strategy.into(),
            runners_per_instance: 2,
            readiness: ReadinessConfig {
                quiet_period: Duration::from_secs(30),
                poll_interval: Duration::from_secs(10),
                timeout: Duration::from_secs(60),
            },
            ..Default::default()
        }
    }

    fn pricing() -> MockPricing {
        MockPricing::default()
            .with_size("t3.small", 2)
            .with_size("t3.medium", 4)
            .with_size("t3.large", 8)
            .with_on_demand("t3.small", 1.00)
            .with_spot("t3.small", 0.40)
            .with_spot("t3.medium", 0.60)
            .with_spot("t3.large", 1.20)
    }

    fn online(job: &str) -> Registration {
        Registration {
            id: "r-1".into(),
            name: format!("{job}-1"),
            status: RegistrationStatus::Online,
            busy: false,
            labels: vec![job.into()],
        }
    }

    struct Fixture {
        compute: MockCompute,
        pricing: MockPricing,
        registry: MockRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                compute: MockCompute::default().with_subnet(SUBNET, "us-east-1a"),
                pricing: pricing(),
                registry: MockRegistry::default().with_registration(online("job-1")),
            }
        }

        fn provisioner(&self, strategy: &str) -> Provisioner<MockCompute, MockPricing, MockRegistry> {
            Provisioner::new(
                self.compute.clone(),
                self.pricing.clone(),
                self.registry.clone(),
                config(strategy),
            )
        }
    }

    #[tokio::test(start_paused = true)]
    async fn max_performance_launches_upsized_spot() {
        let f = Fixture::new();
        let job = JobId::new("job-1");

        let provisioned = f.provisioner("maxperformance").start(&job).await.unwrap();

        assert!(!provisioned.reused);
        assert_eq!(provisioned.instance_ids, ["i-mock0001"]);
        let launched = f.compute.launched();
        assert_eq!(launched.len(), 1);
        assert_eq!(launched[0].size, "t3.medium");
        assert_eq!(launched[0].market, Some(SpotMarket::one_time(1.00)));
        assert_eq!(
            launched[0].tags.get(tags::JOB_ID).map(String::as_str),
            Some("job-1")
        );
        assert_eq!(f.registry.tokens_issued(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn running_instance_skips_acquisition() {
        let f = Fixture::new();
        let compute = f.compute.clone().with_instance(InstanceRecord {
            id: "i-existing".into(),
            state: InstanceState::Running,
            tags: BTreeMap::from([(tags::JOB_ID.to_string(), "job-1".to_string())]),
        });

        let provisioned = f
            .provisioner("spotonly")
            .start(&JobId::new("job-1"))
            .await
            .unwrap();

        assert!(provisioned.reused);
        assert_eq!(provisioned.instance_ids, ["i-existing"]);
        assert!(compute.launched().is_empty());
        assert_eq!(f.registry.tokens_issued(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn best_effort_falls_back_to_on_demand() {
        let f = Fixture::new();
        f.compute.push_outcome(LaunchOutcome::InsufficientCapacity);

        f.provisioner("besteffort")
            .start(&JobId::new("job-1"))
            .await
            .unwrap();

        let launched = f.compute.launched();
        assert_eq!(launched.len(), 2);
        assert!(launched[0].is_spot());
        assert!(!launched[1].is_spot());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_list_is_no_capacity() {
        let f = Fixture::new();
        f.compute.push_outcome(LaunchOutcome::InsufficientCapacity);
        f.compute.push_outcome(LaunchOutcome::InsufficientCapacity);

        let result = f
            .provisioner("maxperformance")
            .start(&JobId::new("job-1"))
            .await;

        match result {
            Err(ProvisionError::NoCapacityAvailable { tried }) => {
                assert_eq!(tried, ["maxperformance", "spotonly"]);
            }
            other => panic!("expected NoCapacityAvailable, got {other:?}"),
        }
        assert!(f.compute.instances().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn spot_only_does_not_fall_back() {
        let f = Fixture::new();
        f.compute.push_outcome(LaunchOutcome::InsufficientCapacity);

        let result = f.provisioner("SpotOnly").acquire(&JobId::new("job-1")).await;

        assert!(matches!(result, Err(ProvisionError::NoCapacityAvailable { .. })));
        assert_eq!(f.compute.launched().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_error_on_on_demand_is_terminal() {
        let f = Fixture::new();
        f.compute.push_outcome(LaunchOutcome::InsufficientCapacity);

        let result = f.provisioner("none").acquire(&JobId::new("job-1")).await;

        assert!(matches!(
            result,
            Err(ProvisionError::InsufficientCapacity { strategy, .. }) if strategy == "none"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn other_launch_errors_abort_without_fallback() {
        let f = Fixture::new();
        f.compute.push_outcome(LaunchOutcome::Fail("UnauthorizedOperation".into()));

        let result = f.provisioner("besteffort").acquire(&JobId::new("job-1")).await;

        assert!(matches!(result, Err(ProvisionError::Compute(ComputeError::System(_)))));
        assert_eq!(f.compute.launched().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_strategy_fails_before_launch() {
        let f = Fixture::new();
        let result = f.provisioner("yolo").acquire(&JobId::new("job-1")).await;

        assert!(matches!(result, Err(ProvisionError::InvalidStrategy(_))));
        assert!(f.compute.launched().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn registration_timeout_tears_down_the_instance() {
        let f = Fixture {
            registry: MockRegistry::default(),
            ..Fixture::new()
        };

        let result = f.provisioner("none").start(&JobId::new("job-1")).await;

        assert!(matches!(
            result,
            Err(ProvisionError::RunnerRegistrationTimeout { .. })
        ));
        assert_eq!(f.compute.terminated(), ["i-mock0001"]);
    }

    #[tokio::test(start_paused = true)]
    async fn token_failure_aborts_before_launch() {
        let f = Fixture::new();
        f.registry.fail_tokens_after(1);

        let result = f.provisioner("none").acquire(&JobId::new("job-1")).await;

        assert!(matches!(result, Err(ProvisionError::Registration(_))));
        assert!(f.compute.launched().is_empty());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let f = Fixture::new();
        let provisioner = Provisioner::new(
            f.compute.clone(),
            f.pricing.clone(),
            f.registry.clone(),
            ProvisionConfig::default(),
        );

        let result = provisioner.acquire(&JobId::new("job-1")).await;
        assert!(matches!(result, Err(ProvisionError::Config(_))));
    }
}
