use anyhow::{Context, Result, bail};
use clap::{Args, Parser, ValueEnum};
use runway_core::prelude::*;
use runway_github::RunnerScope;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Provision ephemeral EC2 runner capacity for a CI job.
///
/// Every option can also be supplied through the `INPUT_*` variables a CI action runtime exports.
#[derive(Parser, Debug)]
#[command(name = "runway", version, about)]
pub struct Cli {
    /// What to do with the job's capacity.
    #[arg(value_enum, env = "INPUT_MODE")]
    pub action: Action,

    /// Job identity used as instance tag and runner label. Generated by `start` when omitted.
    #[arg(long, env = "INPUT_LABEL")]
    pub job_id: Option<String>,

    #[command(flatten)]
    pub github: GithubArgs,

    #[command(flatten)]
    pub aws: AwsArgs,

    #[command(flatten)]
    pub runner: RunnerArgs,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Restart,
}

#[derive(Args, Debug)]
pub struct GithubArgs {
    /// Token allowed to manage self-hosted runners.
    #[arg(long, env = "INPUT_GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: String,

    /// `owner/repo` or an organization name.
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub scope: String,

    #[arg(long, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
    pub github_api_url: String,

    #[arg(long, env = "GITHUB_SERVER_URL", default_value = "https://github.com")]
    pub github_server_url: String,
}

#[derive(Args, Debug)]
pub struct AwsArgs {
    #[arg(long, env = "INPUT_AWS_REGION")]
    pub region: Option<String>,

    /// Role to assume before any AWS call, for cross-account setups.
    #[arg(long, env = "INPUT_AWS_ROLE_ARN")]
    pub role_arn: Option<String>,

    #[arg(long, env = "INPUT_EC2_IMAGE_ID")]
    pub image_id: Option<String>,

    #[arg(long, env = "INPUT_EC2_INSTANCE_TYPE")]
    pub instance_type: Option<String>,

    #[arg(long, env = "INPUT_SUBNET_ID")]
    pub subnet_id: Option<String>,

    #[arg(long, env = "INPUT_SECURITY_GROUP_ID")]
    pub security_group_id: Option<String>,

    #[arg(long, env = "INPUT_KEY_NAME")]
    pub key_name: Option<String>,

    #[arg(long, env = "INPUT_IAM_ROLE_NAME")]
    pub iam_instance_profile: Option<String>,

    /// Zone used for spot quotes. Looked up from the subnet when omitted.
    #[arg(long, env = "INPUT_AVAILABILITY_ZONE")]
    pub availability_zone: Option<String>,

    /// JSON list of `{"Key": .., "Value": ..}` tags applied to instances.
    #[arg(long, env = "INPUT_AWS_RESOURCE_TAGS")]
    pub tags: Option<String>,

    /// `none`, `spotonly`, `besteffort` or `maxperformance`.
    #[arg(long, env = "INPUT_MARKET_TYPE", default_value = defaults::STRATEGY)]
    pub strategy: String,
}

#[derive(Args, Debug)]
pub struct RunnerArgs {
    /// Extra runner labels, comma separated.
    #[arg(long, env = "INPUT_LABELS", value_delimiter = ',')]
    pub labels: Vec<String>,

    #[arg(long, env = "INPUT_RUNNERS_PER_INSTANCE", default_value_t = defaults::RUNNERS_PER_INSTANCE)]
    pub runners_per_instance: u32,

    #[arg(long, env = "INPUT_RUNNER_USER", default_value = defaults::RUNNER_USER)]
    pub runner_user: String,

    #[arg(long, env = "INPUT_RUNNER_HOME_DIR", default_value = defaults::RUNNER_HOME)]
    pub runner_home: String,

    #[arg(long, env = "INPUT_PRE_RUNNER_SCRIPT")]
    pub pre_runner_script: Option<String>,

    #[arg(long, env = "INPUT_QUIET_PERIOD_SECONDS", default_value_t = defaults::QUIET_PERIOD.as_secs())]
    pub quiet_period_secs: u64,

    #[arg(long, env = "INPUT_POLL_INTERVAL_SECONDS", default_value_t = defaults::POLL_INTERVAL.as_secs())]
    pub poll_interval_secs: u64,

    #[arg(long, env = "INPUT_STARTUP_TIMEOUT_SECONDS", default_value_t = defaults::READINESS_TIMEOUT.as_secs())]
    pub startup_timeout_secs: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResourceTag {
    key: String,
    value: String,
}

fn parse_tags(raw: Option<&str>) -> Result<BTreeMap<String, String>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(BTreeMap::new());
    };
    let tags: Vec<ResourceTag> =
        serde_json::from_str(raw).context("aws-resource-tags must be a JSON list of {Key, Value}")?;
    Ok(tags.into_iter().map(|t| (t.key, t.value)).collect())
}

impl Cli {
    pub fn scope(&self) -> Result<RunnerScope> {
        match RunnerScope::parse(&self.github.scope) {
            Some(scope) => Ok(scope),
            None => bail!("invalid runner scope '{}'", self.github.scope),
        }
    }

    pub fn provision_config(&self) -> Result<ProvisionConfig> {
        let aws = &self.aws;
        let runner = &self.runner;
        Ok(ProvisionConfig {
            image_id: aws.image_id.clone().unwrap_or_default(),
            instance_size: aws.instance_type.clone().unwrap_or_default(),
            subnet_id: aws.subnet_id.clone().unwrap_or_default(),
            security_group_id: aws.security_group_id.clone().unwrap_or_default(),
            key_name: aws.key_name.clone(),
            iam_instance_profile: aws.iam_instance_profile.clone(),
            availability_zone: aws.availability_zone.clone(),
            tags: parse_tags(aws.tags.as_deref())?,
            strategy: aws.strategy.clone(),
            labels: runner
                .labels
                .iter()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
            runners_per_instance: runner.runners_per_instance,
            runner_user: runner.runner_user.clone(),
            runner_home: runner.runner_home.clone(),
            pre_runner_script: runner.pre_runner_script.clone(),
            readiness: ReadinessConfig {
                quiet_period: Duration::from_secs(runner.quiet_period_secs),
                poll_interval: Duration::from_secs(runner.poll_interval_secs),
                timeout: Duration::from_secs(runner.startup_timeout_secs),
            },
        })
    }
}
