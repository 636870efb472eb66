use runway_core::prelude::*;
use std::time::Duration;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, warn};

/// Lower bound for the poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Waits for at least one online registration carrying a label set.
pub struct ReadinessPoller<R: RegistrationService> {
    registry: R,
    config: ReadinessConfig,
}

impl<R: RegistrationService> ReadinessPoller<R> {
    /// A poll interval below [`MIN_POLL_INTERVAL`] is raised to it.
    pub fn new(registry: R, mut config: ReadinessConfig) -> Self {
        config.poll_interval = config.poll_interval.max(MIN_POLL_INTERVAL);
        Self { registry, config }
    }

    /// Sleeps through the quiet period, then checks once per poll interval.
    ///
    /// Succeeds on the first tick that sees an online registration with every
    /// label in `labels`. The timeout runs from the end of the quiet period and
    /// bounds the registry calls too: a call still pending at the deadline is
    /// abandoned. Listing errors count as an empty tick.
    pub async fn wait(&self, labels: &[String]) -> Result<Registration, ProvisionError> {
        let ReadinessConfig {
            quiet_period,
            poll_interval,
            timeout: ceiling,
        } = self.config;

        info!(?labels, ?quiet_period, "Waiting for runner registration");
        tokio::time::sleep(quiet_period).await;

        let start = Instant::now();
        let deadline = start + ceiling;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, self.registry.list_registrations(labels)).await {
                Ok(Ok(registrations)) => {
                    if let Some(online) = registrations
                        .into_iter()
                        .find(|r| r.is_online() && r.has_labels(labels))
                    {
                        info!(runner = %online.name, waited = ?start.elapsed(), "Runner is online");
                        return Ok(online);
                    }
                    debug!(waited = ?start.elapsed(), "No online runner yet");
                }
                Ok(Err(e)) => warn!(waited = ?start.elapsed(), "Listing registrations failed: {e}"),
                Err(_) => warn!(waited = ?start.elapsed(), "Listing registrations timed out"),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ProvisionError::RunnerRegistrationTimeout {
                    labels: labels.to_vec(),
                    waited: now - start,
                });
            }
            tokio::time::sleep(poll_interval.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runway_mock::MockRegistry;
    use tokio::time::Instant;

    fn registration(id: &str, status: RegistrationStatus, labels: &[&str]) -> Registration {
        Registration {
            id: id.into(),
            name: format!("runner-{id}"),
            status,
            busy: false,
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    fn config() -> ReadinessConfig {
        ReadinessConfig {
            quiet_period: Duration::from_secs(30),
            poll_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(60),
        }
    }

    fn labels() -> Vec<String> {
        vec!["job-1".to_string()]
    }

    #[tokio::test(start_paused = true)]
    async fn first_check_happens_after_quiet_period() {
        let registry = MockRegistry::default()
            .with_registration(registration("1", RegistrationStatus::Online, &["job-1"]));
        let start = Instant::now();

        let found = ReadinessPoller::new(registry.clone(), config())
            .wait(&labels())
            .await
            .unwrap();

        assert_eq!(found.id, "1");
        let calls = registry.list_calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0] - start >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_first_online_tick() {
        let registry = MockRegistry::default();
        registry.push_snapshot(vec![]);
        registry.push_snapshot(vec![registration("1", RegistrationStatus::Offline, &["job-1"])]);
        registry.push_snapshot(vec![
            registration("1", RegistrationStatus::Offline, &["job-1"]),
            registration("2", RegistrationStatus::Online, &["job-1", "linux"]),
        ]);
        registry.push_snapshot(vec![]);

        let found = ReadinessPoller::new(registry.clone(), config())
            .wait(&labels())
            .await
            .unwrap();

        assert_eq!(found.id, "2");
        assert_eq!(registry.list_calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn online_runner_with_other_labels_does_not_count() {
        let registry = MockRegistry::default()
            .with_registration(registration("9", RegistrationStatus::Online, &["job-2"]));

        let result = ReadinessPoller::new(registry, config()).wait(&labels()).await;
        assert!(matches!(result, Err(ProvisionError::RunnerRegistrationTimeout { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_at_the_ceiling() {
        let registry = MockRegistry::default()
            .with_registration(registration("1", RegistrationStatus::Offline, &["job-1"]));
        let start = Instant::now();

        let result = ReadinessPoller::new(registry.clone(), config())
            .wait(&labels())
            .await;

        match result {
            Err(ProvisionError::RunnerRegistrationTimeout { labels, waited }) => {
                assert_eq!(labels, ["job-1"]);
                assert_eq!(waited, Duration::from_secs(60));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        // One check at 0s then one per 10s up to the 60s ceiling.
        assert_eq!(registry.list_calls().len(), 7);
        assert_eq!(Instant::now() - start, Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_registry_cannot_outlast_the_ceiling() {
        let registry = MockRegistry::default()
            .with_list_delay(Duration::from_secs(3600))
            .with_registration(registration("1", RegistrationStatus::Online, &["job-1"]));
        let start = Instant::now();

        let result = ReadinessPoller::new(registry.clone(), config())
            .wait(&labels())
            .await;

        assert!(matches!(result, Err(ProvisionError::RunnerRegistrationTimeout { .. })));
        assert_eq!(registry.list_calls().len(), 1);
        assert_eq!(Instant::now() - start, Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_calls_count_toward_the_ceiling() {
        let registry = MockRegistry::default()
            .with_list_delay(Duration::from_secs(15))
            .with_registration(registration("1", RegistrationStatus::Offline, &["job-1"]));
        let start = Instant::now();

        let result = ReadinessPoller::new(registry.clone(), config())
            .wait(&labels())
            .await;

        assert!(matches!(result, Err(ProvisionError::RunnerRegistrationTimeout { .. })));
        // Calls start at 0s, 25s and 50s; the last one is cut off at 60s.
        assert_eq!(registry.list_calls().len(), 3);
        assert_eq!(Instant::now() - start, Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_raised_to_the_minimum() {
        let registry = MockRegistry::default();
        let zero = ReadinessConfig {
            poll_interval: Duration::ZERO,
            ..config()
        };

        let result = ReadinessPoller::new(registry.clone(), zero)
            .wait(&labels())
            .await;

        assert!(matches!(result, Err(ProvisionError::RunnerRegistrationTimeout { .. })));
        // 0s through 60s at one-second steps.
        assert_eq!(registry.list_calls().len(), 61);
    }

    #[tokio::test(start_paused = true)]
    async fn listing_errors_are_empty_ticks() {
        let registry = MockRegistry::default()
            .with_registration(registration("1", RegistrationStatus::Online, &["job-1"]));
        registry.fail_lists(2);

        let found = ReadinessPoller::new(registry.clone(), config())
            .wait(&labels())
            .await
            .unwrap();

        assert_eq!(found.id, "1");
        assert_eq!(registry.list_calls().len(), 3);
    }
}
