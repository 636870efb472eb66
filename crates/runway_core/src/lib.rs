//! # Runway Core
//! [![Crates.io](https://img.shields.io/crates/v/runway_core.svg)](https://crates.io/crates/runway_core)
//! [![Docs](https://docs.rs/runway_core/badge.svg)](https://docs.rs/runway_core/)
//!
//! Types and traits shared by the provisioner and its backends.
//!
//! - **[`Strategy`](strategy::Strategy)**: Purchasing strategies and the intent → attempt-list table.
//! - **[`ComputeProvider`](traits::ComputeProvider)**: Trait for launching and releasing instances (e.g., EC2).
//! - **[`PricingProvider`](traits::PricingProvider)**: Trait for on-demand/spot quotes and size catalogs.
//! - **[`RegistrationService`](traits::RegistrationService)**: Trait for the service runners register with (e.g., GitHub Actions).

pub mod config;
pub mod constants;
pub mod error;
pub mod instance;
pub mod runner;
pub mod strategy;
pub mod traits;

pub mod prelude {
    pub use super::config::*;
    pub use super::constants::*;
    pub use super::error::*;
    pub use super::instance::*;
    pub use super::runner::*;
    pub use super::strategy::*;
    pub use super::traits::*;
}
