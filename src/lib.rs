//! # Runway
//![![License](https://img.shields.io/badge/license-MIT%2FApache-blue.svg)](https://github.com/NicoZweifel/runway?tab=readme-ov-file#license)
//![![Crates.io](https://img.shields.io/crates/v/runway.svg)](https://crates.io/crates/runway)
//![![Docs](https://docs.rs/runway/badge.svg)](https://docs.rs/runway/)
//!
//! Ephemeral EC2 build-runner capacity for CI jobs.
//!
//! Given a job id, runway launches an instance (falling back through cheaper-to-safer purchasing
//! strategies when spot capacity is short), waits for a runner carrying the job's label to come
//! online, and later tears the instance and its runner registrations down again.
//!
//! This crate serves as an entry point, re-exporting the core types and the provisioner and
//! optionally including backend implementations via feature flags.
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | **`aws`** | EC2 compute and pricing backend (`runway_compute_aws`). |
//! | **`github`** | GitHub Actions runner registration (`runway_github`). |
//! | **`mock`** | In-memory backends for tests and dry runs (`runway_mock`). |
//!
//! ## Example
//!
//! ```toml
//! [dependencies]
//! runway = { version = "0.3", features = ["aws", "github"] }
//! ```
//!
//! ```rust,ignore
//! use runway::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ProvisionError> {
//!     let session = AwsSession::load(None, None).await;
//!     let ec2 = Ec2Backend::new(&session);
//!     let registry = GithubRegistry::new(
//!         std::env::var("GITHUB_TOKEN").unwrap_or_default(),
//!         RunnerScope::Repo { owner: "acme".into(), repo: "app".into() },
//!     );
//!
//!     let config = ProvisionConfig {
//!         image_id: "ami-0123456789abcdef0".into(),
//!         instance_size: "m5.large".into(),
//!         subnet_id: "subnet-0abc".into(),
//!         security_group_id: "sg-0abc".into(),
//!         strategy: "maxperformance".into(),
//!         ..Default::default()
//!     };
//!
//!     let runway = Provisioner::new(ec2.clone(), ec2, registry, config);
//!     let job = JobId::new("build-42");
//!     runway.start(&job).await?;
//!     // ... run the job ...
//!     runway.stop(&job).await;
//!     Ok(())
//! }
//! ```

pub use runway_core::*;

pub mod provisioner {
    pub use runway_provisioner::*;
}

#[cfg(feature = "aws")]
pub mod aws {
    pub use runway_compute_aws::*;
}

#[cfg(feature = "github")]
pub mod github {
    pub use runway_github::*;
}

#[cfg(feature = "mock")]
pub mod mock {
    pub use runway_mock::*;
}

pub mod prelude {
    pub use runway_core::prelude::*;
    pub use runway_provisioner::prelude::*;

    #[cfg(feature = "aws")]
    pub use runway_compute_aws::{AwsSession, Ec2Backend};

    #[cfg(feature = "github")]
    pub use runway_github::{GithubRegistry, RunnerScope};

    #[cfg(feature = "mock")]
    pub use runway_mock::{LaunchOutcome, MockCompute, MockPricing, MockRegistry};
}
