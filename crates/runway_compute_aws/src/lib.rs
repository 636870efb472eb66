//! # Runway Compute AWS
//! [![Crates.io](https://img.shields.io/crates/v/runway_compute_aws.svg)](https://crates.io/crates/runway_compute_aws)
//! [![Docs](https://docs.rs/runway_compute_aws/badge.svg)](https://docs.rs/runway_compute_aws/)
//!
//! EC2 implementation of [`ComputeProvider`] and [`PricingProvider`].
//!
//! On-demand prices come from the AWS Price List API, spot prices from EC2 spot
//! price history. Capacity errors (`InsufficientInstanceCapacity`) are mapped to
//! [`ComputeError::InsufficientCapacity`] here and nowhere else.
//!
//! ## Usage
//!
//! ```no_run
//! use runway_compute_aws::{AwsSession, Ec2Backend};
//!
//! # async fn run() {
//! let session = AwsSession::load(Some("eu-central-1".into()), None).await;
//! let ec2 = Ec2Backend::new(&session);
//! # }
//! ```

mod pricing;
mod session;

pub use session::AwsSession;

use aws_sdk_ec2::client::Waiters;
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::types::{
    Filter, IamInstanceProfileSpecification, InstanceInterruptionBehavior as AwsInterruption,
    InstanceMarketOptionsRequest, InstanceStateName, InstanceType, MarketType, ResourceType,
    SpotInstanceType, SpotMarketOptions, Tag, TagSpecification,
};
use aws_sdk_ec2::{Client as Ec2Client, types::Instance};
use aws_sdk_pricing::Client as PricingClient;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use runway_core::prelude::*;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Error codes EC2 returns when a size/market has no capacity right now.
const CAPACITY_ERROR_CODES: &[&str] = &["InsufficientInstanceCapacity"];

/// Maximum time `wait_until_running` waits on the EC2 waiter.
const RUNNING_WAIT: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Debug)]
pub struct Ec2Backend {
    ec2: Ec2Client,
    pricing: PricingClient,
    region: String,
}

impl Ec2Backend {
    pub fn new(session: &AwsSession) -> Self {
        let config = session.config();
        Self {
            ec2: Ec2Client::new(config),
            pricing: pricing::client(config),
            region: session.region().unwrap_or("us-east-1").to_string(),
        }
    }
}

/// Translates an EC2 SDK error into a [`ComputeError`].
fn classify<E>(err: SdkError<E>) -> ComputeError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    match err.code() {
        Some(code) if CAPACITY_ERROR_CODES.contains(&code) => {
            ComputeError::InsufficientCapacity(message)
        }
        Some(code) if code.starts_with("InvalidParameter") || code.ends_with(".Malformed") => {
            ComputeError::InvalidRequest(message)
        }
        Some(code) if code.ends_with(".NotFound") => ComputeError::NotFound(message),
        _ => ComputeError::System(message),
    }
}

fn to_state(name: Option<&InstanceStateName>) -> Option<InstanceState> {
    Some(match name? {
        InstanceStateName::Pending => InstanceState::Pending,
        InstanceStateName::Running => InstanceState::Running,
        InstanceStateName::ShuttingDown => InstanceState::ShuttingDown,
        InstanceStateName::Terminated => InstanceState::Terminated,
        InstanceStateName::Stopping => InstanceState::Stopping,
        InstanceStateName::Stopped => InstanceState::Stopped,
        _ => return None,
    })
}

fn to_record(instance: &Instance) -> Option<InstanceRecord> {
    Some(InstanceRecord {
        id: instance.instance_id()?.to_string(),
        state: to_state(instance.state().and_then(|s| s.name()))?,
        tags: instance
            .tags()
            .iter()
            .filter_map(|t| Some((t.key()?.to_string(), t.value()?.to_string())))
            .collect::<BTreeMap<_, _>>(),
    })
}

fn market_options(market: &SpotMarket) -> InstanceMarketOptionsRequest {
    InstanceMarketOptionsRequest::builder()
        .market_type(MarketType::Spot)
        .spot_options(
            SpotMarketOptions::builder()
                // Shortest round-trip form, so a quote parsed from EC2 is bid back unchanged.
                .max_price(market.max_price.to_string())
                .spot_instance_type(SpotInstanceType::OneTime)
                .instance_interruption_behavior(AwsInterruption::Terminate)
                .build(),
        )
        .build()
}

impl ComputeProvider for Ec2Backend {
    async fn launch_instance(&self, spec: &LaunchSpec) -> Result<Vec<InstanceRecord>, ComputeError> {
        let tags: Vec<Tag> = spec
            .tags
            .iter()
            .map(|(k, v)| Tag::builder().key(k).value(v).build())
            .collect();

        let mut req = self
            .ec2
            .run_instances()
            .image_id(&spec.image_id)
            .instance_type(InstanceType::from(spec.size.as_str()))
            .min_count(1)
            .max_count(1)
            .subnet_id(&spec.subnet_id)
            .security_group_ids(&spec.security_group_id)
            .user_data(BASE64.encode(&spec.user_data))
            .tag_specifications(
                TagSpecification::builder()
                    .resource_type(ResourceType::Instance)
                    .set_tags(Some(tags))
                    .build(),
            )
            .set_key_name(spec.key_name.clone());

        if let Some(profile) = &spec.iam_instance_profile {
            req = req.iam_instance_profile(
                IamInstanceProfileSpecification::builder()
                    .name(profile)
                    .build(),
            );
        }
        if let Some(market) = &spec.market {
            req = req.instance_market_options(market_options(market));
        }

        let output = req.send().await.map_err(classify)?;
        Ok(output.instances().iter().filter_map(to_record).collect())
    }

    async fn describe_instances(
        &self,
        filter: &InstanceFilter,
    ) -> Result<Vec<InstanceRecord>, ComputeError> {
        let mut filters: Vec<Filter> = filter
            .tags
            .iter()
            .map(|(k, v)| Filter::builder().name(format!("tag:{k}")).values(v).build())
            .collect();
        if !filter.states.is_empty() {
            filters.push(
                Filter::builder()
                    .name("instance-state-name")
                    .set_values(Some(filter.states.iter().map(|s| s.as_str().to_string()).collect()))
                    .build(),
            );
        }

        let mut pages = self
            .ec2
            .describe_instances()
            .set_filters(Some(filters))
            .into_paginator()
            .send();

        let mut records = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(classify)?;
            records.extend(
                page.reservations()
                    .iter()
                    .flat_map(|r| r.instances())
                    .filter_map(to_record),
            );
        }
        debug!(count = records.len(), "Described instances");
        Ok(records)
    }

    async fn wait_until_running(&self, id: &str) -> Result<(), ComputeError> {
        self.ec2
            .wait_until_instance_running()
            .instance_ids(id)
            .wait(RUNNING_WAIT)
            .await
            .map(|_| ())
            .map_err(|e| {
                ComputeError::System(format!(
                    "Instance {id} did not reach running: {}",
                    DisplayErrorContext(&e)
                ))
            })
    }

    async fn terminate_instances(&self, ids: &[String]) -> Result<(), ComputeError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.ec2
            .terminate_instances()
            .set_instance_ids(Some(ids.to_vec()))
            .send()
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn subnet_zone(&self, subnet_id: &str) -> Result<String, ComputeError> {
        let output = self
            .ec2
            .describe_subnets()
            .subnet_ids(subnet_id)
            .send()
            .await
            .map_err(classify)?;

        output
            .subnets()
            .first()
            .and_then(|s| s.availability_zone())
            .map(str::to_string)
            .ok_or_else(|| ComputeError::NotFound(subnet_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spot_market_maps_to_one_time_request() {
        let opts = market_options(&SpotMarket::one_time(0.0961));
        let spot = opts.spot_options().unwrap();

        assert_eq!(opts.market_type(), Some(&MarketType::Spot));
        assert_eq!(spot.max_price(), Some("0.0961"));
        assert_eq!(spot.spot_instance_type(), Some(&SpotInstanceType::OneTime));
        assert_eq!(
            spot.instance_interruption_behavior(),
            Some(&AwsInterruption::Terminate)
        );
    }

    #[test]
    fn max_price_keeps_full_quote_precision() {
        let opts = market_options(&SpotMarket::one_time("0.034549".parse().unwrap()));
        assert_eq!(opts.spot_options().unwrap().max_price(), Some("0.034549"));

        let on_demand = market_options(&SpotMarket::one_time("0.0960000000".parse().unwrap()));
        assert_eq!(on_demand.spot_options().unwrap().max_price(), Some("0.096"));
    }

    #[test]
    fn records_need_id_and_known_state() {
        let instance = Instance::builder()
            .instance_id("i-1")
            .state(
                aws_sdk_ec2::types::InstanceState::builder()
                    .name(InstanceStateName::Running)
                    .build(),
            )
            .tags(Tag::builder().key(tags::JOB_ID).value("job-1").build())
            .build();
        let record = to_record(&instance).unwrap();

        assert_eq!(record.state, InstanceState::Running);
        assert_eq!(record.job_id(), Some("job-1"));
        assert!(to_record(&Instance::builder().instance_id("i-2").build()).is_none());
    }
}
