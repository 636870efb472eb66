use anyhow::{Context, Result};
use runway_provisioner::Provisioned;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Appends the step outputs of a successful start to a `GITHUB_OUTPUT`-style file.
pub fn write_outputs(path: &Path, provisioned: &Provisioned) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;

    writeln!(file, "job-id={}", provisioned.job)?;
    writeln!(file, "instance-ids={}", provisioned.instance_ids.join(","))?;
    writeln!(file, "reused={}", provisioned.reused)?;
    Ok(())
}
