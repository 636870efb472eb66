use runway_core::prelude::*;
use tracing::debug;

/// Point-in-time quotes and ordered size catalogs on top of a [`PricingProvider`].
///
/// Nothing is cached: every call re-queries the provider.
#[derive(Clone)]
pub struct PricingResolver<P: PricingProvider> {
    provider: P,
}

impl<P: PricingProvider> PricingResolver<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Current hourly on-demand price of `size`.
    pub async fn price_for_size(&self, size: &str) -> Result<f64, PricingError> {
        let price = self
            .provider
            .on_demand_price(size)
            .await?
            .filter(|p| *p > 0.0)
            .ok_or_else(|| PricingError::Unavailable {
                size: size.to_string(),
                market: "on-demand",
            })?;

        debug!(size, price, "On-demand quote");
        Ok(price)
    }

    /// Most recent spot quote for `size` in `zone`.
    pub async fn spot_price_for_size(&self, size: &str, zone: &str) -> Result<f64, PricingError> {
        let history = self.provider.spot_price_history(size, zone).await?;
        let latest = history
            .into_iter()
            .filter(|q| q.zone == zone)
            .max_by_key(|q| q.timestamp)
            .ok_or_else(|| PricingError::Unavailable {
                size: size.to_string(),
                market: "spot",
            })?;

        debug!(size, zone, price = latest.price, at = %latest.timestamp, "Spot quote");
        Ok(latest.price)
    }

    /// Every size in `family`, ascending by vCPU count.
    ///
    /// All catalog pages are fetched before ordering.
    pub async fn sibling_sizes_in_family(
        &self,
        family: &str,
        include_bare_metal: bool,
    ) -> Result<Vec<InstanceSize>, PricingError> {
        let mut sizes = Vec::new();
        let mut next_token = None;
        loop {
            let page = self.provider.instance_sizes_page(family, next_token).await?;
            sizes.extend(page.sizes);
            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        if !include_bare_metal {
            sizes.retain(|s| !s.name.contains(market::BARE_METAL));
        }
        sizes.sort_by(|a, b| a.vcpus.cmp(&b.vcpus).then_with(|| a.name.cmp(&b.name)));
        Ok(sizes)
    }
}
