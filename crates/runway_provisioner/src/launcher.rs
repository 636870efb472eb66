use crate::optimizer::SizeOptimizer;
use crate::pricing::PricingResolver;
use runway_core::prelude::*;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Builds per-strategy launch specifications from a shared base and issues them.
pub struct Launcher<C: ComputeProvider, P: PricingProvider> {
    compute: C,
    pricing: PricingResolver<P>,
    base: LaunchSpec,
    zone: OnceCell<String>,
}

impl<C: ComputeProvider, P: PricingProvider> Launcher<C, P> {
    /// `zone` is the placement zone for spot quotes; looked up from the
    /// base subnet on first use when [`None`].
    pub fn new(compute: C, pricing: P, base: LaunchSpec, zone: Option<String>) -> Self {
        Self {
            compute,
            pricing: PricingResolver::new(pricing),
            base,
            zone: OnceCell::new_with(zone),
        }
    }

    async fn zone(&self) -> Result<&str, ComputeError> {
        self.zone
            .get_or_try_init(|| self.compute.subnet_zone(&self.base.subnet_id))
            .await
            .map(String::as_str)
    }

    /// A fresh specification for one attempt with `strategy`.
    pub async fn build_spec(&self, strategy: &Strategy) -> Result<LaunchSpec, ProvisionError> {
        let mut spec = self.base.clone();
        let size = self.base.size.as_str();

        spec.market = match strategy {
            Strategy::SpotOnly => {
                let spot = self.pricing.spot_price_for_size(size, self.zone().await?).await?;
                Some(SpotMarket::one_time(spot))
            }
            Strategy::BestEffort => {
                let spot = self.pricing.spot_price_for_size(size, self.zone().await?).await?;
                let on_demand = self.pricing.price_for_size(size).await?;
                // Bid the on-demand price, not the spot price, for headroom against drift.
                (spot < on_demand).then(|| SpotMarket::one_time(on_demand))
            }
            Strategy::MaxPerformance => {
                let on_demand = self.pricing.price_for_size(size).await?;
                let zone = self.zone().await?;
                spec.size = SizeOptimizer::new(&self.pricing).optimize(size, zone).await?;
                Some(SpotMarket::one_time(on_demand))
            }
            Strategy::OnDemand => None,
            Strategy::Unknown(name) => return Err(ProvisionError::InvalidStrategy(name.clone())),
        };

        debug!(
            %strategy,
            size = %spec.size,
            max_price = spec.market.as_ref().map(|m| m.max_price),
            "Built launch spec"
        );
        Ok(spec)
    }

    /// Issues one acquisition request.
    pub async fn launch(&self, spec: &LaunchSpec) -> Result<Vec<InstanceRecord>, ComputeError> {
        let records = self.compute.launch_instance(spec).await?;
        info!(
            size = %spec.size,
            spot = spec.is_spot(),
            ids = ?records.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            "Launched"
        );
        Ok(records)
    }
}
