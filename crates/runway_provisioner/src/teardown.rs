use runway_core::prelude::*;
use tracing::{info, warn};

/// What a teardown pass released.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeardownReport {
    pub terminated: Vec<String>,
    pub removed: Vec<String>,
    /// Registrations that could not be removed.
    pub failed: Vec<String>,
    /// Provider or registry queries that failed.
    pub errors: Vec<String>,
}

impl TeardownReport {
    /// True if every step ran and every matching registration was removed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<Self, ProvisionError> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(ProvisionError::TeardownPartialFailure {
                failed: self.failed,
                errors: self.errors,
            })
        }
    }
}

/// Releases everything tagged or labelled for a job. Works purely from live
/// inventory, never from identifiers kept from a launch.
pub struct Teardown<C: ComputeProvider, R: RegistrationService> {
    compute: C,
    registry: R,
}

impl<C: ComputeProvider, R: RegistrationService> Teardown<C, R> {
    pub fn new(compute: C, registry: R) -> Self {
        Self { compute, registry }
    }

    /// Terminates every instance tagged for `job` in any state, then deletes every
    /// registration labelled with it. A failure on the instance side does not
    /// skip the registrations; both outcomes land in the report.
    pub async fn run(&self, job: &JobId) -> TeardownReport {
        let mut report = TeardownReport::default();
        if let Err(e) = self.release_instances(job, &mut report).await {
            warn!(%job, "Releasing instances failed: {e}");
            report.errors.push(e.to_string());
        }
        if let Err(e) = self.remove_registrations(job, &mut report).await {
            warn!(%job, "Listing registrations failed: {e}");
            report.errors.push(e.to_string());
        }
        report
    }

    /// [`Teardown::run`] with an incomplete outcome logged as a warning.
    pub async fn run_best_effort(&self, job: &JobId) -> TeardownReport {
        let report = self.run(job).await;
        if !report.is_complete() {
            warn!(%job, failed = ?report.failed, errors = ?report.errors, "Teardown incomplete");
        }
        report
    }

    async fn release_instances(
        &self,
        job: &JobId,
        report: &mut TeardownReport,
    ) -> Result<(), ComputeError> {
        let instances = self
            .compute
            .describe_instances(&InstanceFilter::for_job(job))
            .await?;
        let ids: Vec<String> = instances.into_iter().map(|i| i.id).collect();
        if !ids.is_empty() {
            self.compute.terminate_instances(&ids).await?;
            info!(%job, ?ids, "Terminated instances");
        }
        report.terminated = ids;
        Ok(())
    }

    async fn remove_registrations(
        &self,
        job: &JobId,
        report: &mut TeardownReport,
    ) -> Result<(), RegistrationError> {
        let labels = [job.to_string()];
        for registration in self.registry.list_registrations(&labels).await? {
            match self.registry.delete_registration(&registration.id).await {
                Ok(true) => report.removed.push(registration.id),
                Ok(false) => {
                    warn!(%job, id = %registration.id, "Registration was not removed");
                    report.failed.push(registration.id);
                }
                Err(e) => {
                    warn!(%job, id = %registration.id, "Removing registration failed: {e}");
                    report.failed.push(registration.id);
                }
            }
        }

        info!(
            %job,
            removed = report.removed.len(),
            failed = report.failed.len(),
            "Removed registrations"
        );
        Ok(())
    }
}
