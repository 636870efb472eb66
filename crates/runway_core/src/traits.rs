use crate::error::*;
use crate::instance::*;
use crate::runner::*;

/// Launch, observe and release instances.
pub trait ComputeProvider: Send + Sync + 'static + Clone {
    /// Requests one instance. Capacity exhaustion must surface as
    /// [`ComputeError::InsufficientCapacity`].
    fn launch_instance(
        &self,
        spec: &LaunchSpec,
    ) -> impl Future<Output = Result<Vec<InstanceRecord>, ComputeError>> + Send;

    fn describe_instances(
        &self,
        filter: &InstanceFilter,
    ) -> impl Future<Output = Result<Vec<InstanceRecord>, ComputeError>> + Send;

    /// Blocks until the instance is running, bounded by the provider's own waiter.
    fn wait_until_running(&self, id: &str) -> impl Future<Output = Result<(), ComputeError>> + Send;

    /// Requests termination. An empty `ids` slice is a no-op.
    fn terminate_instances(
        &self,
        ids: &[String],
    ) -> impl Future<Output = Result<(), ComputeError>> + Send;

    /// Availability zone a subnet lives in.
    fn subnet_zone(&self, subnet_id: &str) -> impl Future<Output = Result<String, ComputeError>> + Send;
}

/// Raw price and catalog data.
pub trait PricingProvider: Send + Sync + 'static + Clone {
    /// Current hourly on-demand price, [`None`] if the provider has no quote.
    fn on_demand_price(
        &self,
        size: &str,
    ) -> impl Future<Output = Result<Option<f64>, PricingError>> + Send;

    /// Spot quotes for the general-purpose Linux product line in one zone.
    fn spot_price_history(
        &self,
        size: &str,
        zone: &str,
    ) -> impl Future<Output = Result<Vec<PriceQuote>, PricingError>> + Send;

    /// One page of the sizes in `family`, starting at `next_token`.
    fn instance_sizes_page(
        &self,
        family: &str,
        next_token: Option<String>,
    ) -> impl Future<Output = Result<InstanceSizePage, PricingError>> + Send;
}

/// The service runners register with.
pub trait RegistrationService: Send + Sync + 'static + Clone {
    /// URL a runner passes when registering (e.g., the repository URL).
    fn registration_url(&self) -> String;

    /// Registrations carrying every label in `labels`.
    fn list_registrations(
        &self,
        labels: &[String],
    ) -> impl Future<Output = Result<Vec<Registration>, RegistrationError>> + Send;

    /// Returns whether the registration was removed.
    fn delete_registration(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<bool, RegistrationError>> + Send;

    fn issue_registration_token(
        &self,
    ) -> impl Future<Output = Result<RegistrationToken, RegistrationError>> + Send;
}
