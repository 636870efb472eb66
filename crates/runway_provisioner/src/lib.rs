//! # Runway Provisioner
//! [![Crates.io](https://img.shields.io/crates/v/runway_provisioner.svg)](https://crates.io/crates/runway_provisioner)
//! [![Docs](https://docs.rs/runway_provisioner/badge.svg)](https://docs.rs/runway_provisioner/)
//!
//! Acquires runner capacity for a job and confirms it is usable.
//!
//! [`Provisioner::start`] checks for a running instance tagged for the job, otherwise walks the
//! purchasing strategies resolved from the configured intent (e.g., `besteffort` tries spot, then
//! on-demand) until one launches, waits for the instance to run, and then polls the registration
//! service until a runner with the job's labels is online. A failed start tears everything down
//! again before returning the error.
//!
//! ## Example
//!
//! ```no_run
//! use runway_core::prelude::*;
//! use runway_mock::{MockCompute, MockPricing, MockRegistry};
//! use runway_provisioner::Provisioner;
//!
//! # async fn run() -> Result<(), ProvisionError> {
//! let config = ProvisionConfig {
//!     image_id: "ami-0123456789abcdef0".into(),
//!     instance_size: "m5.large".into(),
//!     subnet_id: "subnet-0abc".into(),
//!     security_group_id: "sg-0abc".into(),
//!     strategy: "besteffort".into(),
//!     ..Default::default()
//! };
//!
//! let provisioner = Provisioner::new(
//!     MockCompute::default(),
//!     MockPricing::default(),
//!     MockRegistry::default(),
//!     config,
//! );
//! let job = JobId::new("build-42");
//! let provisioned = provisioner.start(&job).await?;
//! println!("{:?}", provisioned.instance_ids);
//!
//! provisioner.stop(&job).await;
//! # Ok(())
//! # }
//! ```

pub mod boot;
pub mod launcher;
pub mod optimizer;
pub mod pricing;
pub mod provisioner;
pub mod readiness;
pub mod teardown;
pub mod tokens;

pub use provisioner::{Provisioned, Provisioner};

pub mod prelude {
    pub use crate::launcher::Launcher;
    pub use crate::optimizer::SizeOptimizer;
    pub use crate::pricing::PricingResolver;
    pub use crate::provisioner::{Provisioned, Provisioner};
    pub use crate::readiness::ReadinessPoller;
    pub use crate::teardown::{Teardown, TeardownReport};
}
