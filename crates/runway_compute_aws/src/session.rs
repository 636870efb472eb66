use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use tracing::info;

/// AWS configuration resolved once per process and shared by every client.
///
/// With a role ARN, credentials come from assuming that role on top of the
/// default chain (cross-account setups).
#[derive(Clone, Debug)]
pub struct AwsSession {
    config: SdkConfig,
}

impl AwsSession {
    pub async fn load(region: Option<String>, role_arn: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let base = loader.load().await;

        let Some(role_arn) = role_arn else {
            return Self { config: base };
        };

        info!(role_arn, "Assuming role");
        let provider = AssumeRoleProvider::builder(role_arn)
            .session_name("runway")
            .configure(&base)
            .build()
            .await;

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).credentials_provider(provider);
        if let Some(region) = base.region().cloned() {
            loader = loader.region(region);
        }
        Self {
            config: loader.load().await,
        }
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn region(&self) -> Option<&str> {
        self.config.region().map(|r| r.as_ref())
    }
}

impl From<SdkConfig> for AwsSession {
    fn from(config: SdkConfig) -> Self {
        Self { config }
    }
}
