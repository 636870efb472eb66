use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComputeError {
    /// The requested size/market combination has no capacity right now.
    /// The only error that moves acquisition on to the next strategy.
    #[error("Insufficient capacity: {0}")]
    InsufficientCapacity(String),

    /// The provider rejected the request parameters (bad image, subnet, etc.).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The requested instance or subnet was not found.
    #[error("Resource {0} not found")]
    NotFound(String),

    /// Internal provider failure (e.g., EC2 API error, throttling, waiter timeout).
    #[error("Compute system failure: {0}")]
    System(String),
}

#[derive(Debug, Error)]
pub enum PricingError {
    /// The provider returned no usable quote for a size.
    #[error("No {market} price available for {size}")]
    Unavailable { size: String, market: &'static str },

    /// A quote could not be parsed.
    #[error("Malformed price data: {0}")]
    Malformed(String),

    /// Internal provider failure (e.g., Price List API error).
    #[error("Pricing system failure: {0}")]
    System(String),
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The registration service rejected our credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The registration service returned an unexpected status.
    #[error("Registration service returned error {0}: {1}")]
    Service(u16, String),

    /// Transport or decoding failure.
    #[error("Registration system failure: {0}")]
    System(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid setting {0}: {1}")]
    Invalid(&'static str, String),
}

/// Errors surfaced by provisioning and teardown.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Capacity exhaustion on a terminal (on-demand) attempt.
    #[error("Insufficient capacity for strategy '{strategy}': {reason}")]
    InsufficientCapacity { strategy: String, reason: String },

    /// The strategy name is not one the launcher can realize.
    #[error("Invalid strategy: {0}")]
    InvalidStrategy(String),

    /// A price quote required by the launcher or optimizer is missing.
    #[error("Pricing unavailable: {0}")]
    PricingUnavailable(#[from] PricingError),

    /// Every strategy in the attempt list failed for lack of capacity.
    #[error("No capacity available after trying [{}]", tried.join(", "))]
    NoCapacityAvailable { tried: Vec<String> },

    /// The instance came up but no online runner with the job's labels appeared.
    #[error("No online runner labelled [{}] within {waited:?}", labels.join(", "))]
    RunnerRegistrationTimeout { labels: Vec<String>, waited: Duration },

    /// Teardown could not release everything.
    #[error(
        "Teardown incomplete: failed to remove registrations [{}], errors [{}]",
        failed.join(", "),
        errors.join("; ")
    )]
    TeardownPartialFailure { failed: Vec<String>, errors: Vec<String> },

    #[error(transparent)]
    Compute(#[from] ComputeError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
