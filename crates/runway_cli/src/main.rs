mod args;
mod output;

use anyhow::{Context, Result};
use args::{Action, Cli};
use clap::Parser;
use runway_compute_aws::{AwsSession, Ec2Backend};
use runway_core::prelude::*;
use runway_github::GithubRegistry;
use runway_provisioner::Provisioner;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

type Runway = Provisioner<Ec2Backend, Ec2Backend, GithubRegistry>;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.provision_config()?;
    let registry = GithubRegistry::new(cli.github.github_token.clone(), cli.scope()?)
        .with_urls(&cli.github.github_api_url, &cli.github.github_server_url);

    let session = AwsSession::load(cli.aws.region.clone(), cli.aws.role_arn.as_deref()).await;
    let ec2 = Ec2Backend::new(&session);
    let runway = Provisioner::new(ec2.clone(), ec2, registry, config);

    match cli.action {
        Action::Start => {
            let job = cli.job_id.map(JobId::new).unwrap_or_else(generate_job_id);
            start(&runway, &job).await
        }
        Action::Stop => {
            let job = cli.job_id.map(JobId::new).context("stop requires --job-id")?;
            stop(&runway, &job).await;
            Ok(())
        }
        Action::Restart => {
            let job = cli.job_id.map(JobId::new).context("restart requires --job-id")?;
            stop(&runway, &job).await;
            start(&runway, &job).await
        }
    }
}

fn generate_job_id() -> JobId {
    let id = Uuid::new_v4().simple().to_string();
    JobId::new(format!("runway-{}", &id[..12]))
}

async fn start(runway: &Runway, job: &JobId) -> Result<()> {
    info!(%job, strategy = %runway.config().strategy, "Starting");
    let provisioned = runway.start(job).await?;
    info!(
        %job,
        instances = ?provisioned.instance_ids,
        runner = %provisioned.runner.name,
        reused = provisioned.reused,
        "Runner ready"
    );
    println!("{job}");

    if let Some(path) = std::env::var_os("GITHUB_OUTPUT").map(PathBuf::from) {
        output::write_outputs(&path, &provisioned)?;
    }
    Ok(())
}

async fn stop(runway: &Runway, job: &JobId) {
    info!(%job, "Stopping");
    let report = runway.stop(job).await;
    if report.is_complete() {
        info!(
            %job,
            terminated = ?report.terminated,
            removed = report.removed.len(),
            "Released"
        );
    } else {
        warn!(%job, "Teardown did not complete, check for leftover resources");
    }
}
