use crate::Ec2Backend;
use aws_config::{Region, SdkConfig};
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::primitives::DateTime as AwsDateTime;
use aws_sdk_ec2::types::{Filter as Ec2Filter, InstanceType};
use aws_sdk_pricing::Client as PricingClient;
use aws_sdk_pricing::types::{Filter, FilterType};
use chrono::{DateTime, Utc};
use runway_core::prelude::*;
use serde_json::Value;
use std::time::SystemTime;

/// The Price List API is only served from a few regions.
const PRICE_LIST_REGION: &str = "us-east-1";

pub(crate) fn client(config: &SdkConfig) -> PricingClient {
    let conf = aws_sdk_pricing::config::Builder::from(config)
        .region(Region::new(PRICE_LIST_REGION))
        .build();
    PricingClient::from_conf(conf)
}

fn term(field: &str, value: &str) -> Result<Filter, PricingError> {
    Filter::builder()
        .r#type(FilterType::TermMatch)
        .field(field)
        .value(value)
        .build()
        .map_err(|e| PricingError::System(e.to_string()))
}

/// First positive on-demand USD price in a Price List product document.
fn parse_on_demand(doc: &str) -> Result<Option<f64>, PricingError> {
    let value: Value =
        serde_json::from_str(doc).map_err(|e| PricingError::Malformed(e.to_string()))?;

    let Some(terms) = value.pointer("/terms/OnDemand").and_then(Value::as_object) else {
        return Ok(None);
    };

    let price = terms
        .values()
        .filter_map(|t| t.get("priceDimensions").and_then(Value::as_object))
        .flat_map(|dims| dims.values())
        .filter_map(|d| d.pointer("/pricePerUnit/USD").and_then(Value::as_str))
        .filter_map(|usd| usd.parse::<f64>().ok())
        .find(|p| *p > 0.0);
    Ok(price)
}

fn to_chrono(ts: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
}

impl PricingProvider for Ec2Backend {
    async fn on_demand_price(&self, size: &str) -> Result<Option<f64>, PricingError> {
        let output = self
            .pricing
            .get_products()
            .service_code("AmazonEC2")
            .filters(term("regionCode", &self.region)?)
            .filters(term("instanceType", size)?)
            .filters(term("operatingSystem", "Linux")?)
            .filters(term("tenancy", "Shared")?)
            .filters(term("preInstalledSw", "NA")?)
            .filters(term("capacitystatus", "Used")?)
            .max_results(10)
            .send()
            .await
            .map_err(|e| PricingError::System(DisplayErrorContext(&e).to_string()))?;

        for doc in output.price_list() {
            if let Some(price) = parse_on_demand(doc)? {
                return Ok(Some(price));
            }
        }
        Ok(None)
    }

    async fn spot_price_history(&self, size: &str, zone: &str) -> Result<Vec<PriceQuote>, PricingError> {
        let output = self
            .ec2
            .describe_spot_price_history()
            .instance_types(InstanceType::from(size))
            .product_descriptions(market::SPOT_PRODUCT)
            .availability_zone(zone)
            .start_time(AwsDateTime::from(SystemTime::now()))
            .send()
            .await
            .map_err(|e| PricingError::System(DisplayErrorContext(&e).to_string()))?;

        output
            .spot_price_history()
            .iter()
            .filter_map(|p| {
                Some((
                    p.spot_price()?,
                    p.availability_zone()?,
                    to_chrono(p.timestamp()?)?,
                ))
            })
            .map(|(price, az, timestamp)| {
                Ok(PriceQuote {
                    size: size.to_string(),
                    zone: az.to_string(),
                    price: price
                        .parse()
                        .map_err(|_| PricingError::Malformed(format!("spot price '{price}'")))?,
                    timestamp,
                })
            })
            .collect()
    }

    async fn instance_sizes_page(
        &self,
        family: &str,
        next_token: Option<String>,
    ) -> Result<InstanceSizePage, PricingError> {
        let output = self
            .ec2
            .describe_instance_types()
            .filters(
                Ec2Filter::builder()
                    .name("instance-type")
                    .values(format!("{family}.*"))
                    .build(),
            )
            .set_next_token(next_token)
            .max_results(100)
            .send()
            .await
            .map_err(|e| PricingError::System(DisplayErrorContext(&e).to_string()))?;

        let sizes = output
            .instance_types()
            .iter()
            .filter_map(|t| {
                let vcpus = t.v_cpu_info()?.default_v_cpus()?;
                Some(InstanceSize::new(t.instance_type()?.as_str(), u32::try_from(vcpus).ok()?))
            })
            .collect();

        Ok(InstanceSizePage {
            sizes,
            next_token: output.next_token().map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCT: &str = r#"{
        "product": {"attributes": {"instanceType": "m5.large"}},
        "terms": {
            "OnDemand": {
                "ABC.JRTCKXETXF": {
                    "priceDimensions": {
                        "ABC.JRTCKXETXF.6YS6EN2CT7": {
                            "unit": "Hrs",
                            "pricePerUnit": {"USD": "0.0960000000"}
                        }
                    }
                }
            }
        }
    }"#;

    #[test]
    fn reads_on_demand_usd_price() {
        assert_eq!(parse_on_demand(PRODUCT).unwrap(), Some(0.096));
    }

    #[test]
    fn zero_or_missing_prices_are_none() {
        let zero = PRODUCT.replace("0.0960000000", "0.0000000000");
        assert_eq!(parse_on_demand(&zero).unwrap(), None);
        assert_eq!(parse_on_demand(r#"{"terms": {}}"#).unwrap(), None);
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(parse_on_demand("nope"), Err(PricingError::Malformed(_))));
    }
}
