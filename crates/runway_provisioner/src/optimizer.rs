use crate::pricing::PricingResolver;
use runway_core::prelude::*;
use tracing::{debug, info, warn};

/// Walks a family upward for the largest size whose spot price stays below
/// the baseline's on-demand price.
pub struct SizeOptimizer<'a, P: PricingProvider> {
    pricing: &'a PricingResolver<P>,
}

impl<'a, P: PricingProvider> SizeOptimizer<'a, P> {
    pub fn new(pricing: &'a PricingResolver<P>) -> Self {
        Self { pricing }
    }

    /// Best size for `baseline` in `zone`; `baseline` itself when no upgrade qualifies.
    ///
    /// Every candidate is compared against the baseline's on-demand price, never
    /// against the previous candidate, so the search only ever moves up.
    pub async fn optimize(&self, baseline: &str, zone: &str) -> Result<String, PricingError> {
        let ceiling = self.pricing.price_for_size(baseline).await?;
        let catalog = self
            .pricing
            .sibling_sizes_in_family(family_of(baseline), false)
            .await?;

        let mut best = baseline.to_string();
        loop {
            let next = next_larger(&catalog, &best);
            if next == best {
                break;
            }

            let spot = match self.pricing.spot_price_for_size(&next, zone).await {
                Ok(price) => price,
                Err(PricingError::Unavailable { .. }) => {
                    warn!(size = %next, zone, "No spot quote, keeping {best}");
                    break;
                }
                Err(e) => return Err(e),
            };

            if spot > 0.0 && spot < ceiling {
                debug!(from = %best, to = %next, spot, ceiling, "Upgrade accepted");
                best = next;
            } else {
                debug!(size = %next, spot, ceiling, "Upgrade rejected");
                break;
            }
        }

        if best != baseline {
            info!(baseline, selected = %best, "Upsized for spot");
        }
        Ok(best)
    }
}

/// The first size after `current` with strictly more vCPUs, or `current` itself
/// when it is the largest or not in the catalog.
pub fn next_larger(catalog: &[InstanceSize], current: &str) -> String {
    let Some(pos) = catalog.iter().position(|s| s.name == current) else {
        return current.to_string();
    };
    let vcpus = catalog[pos].vcpus;
    catalog[pos + 1..]
        .iter()
        .find(|s| s.vcpus > vcpus)
        .map(|s| s.name.clone())
        .unwrap_or_else(|| current.to_string())
}
