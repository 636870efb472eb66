use runway_core::prelude::*;
use std::fmt;

/// Boot script that installs one runner per registration token and starts them.
pub struct BootScript<'a> {
    pub config: &'a ProvisionConfig,
    pub job: &'a JobId,
    pub registration_url: &'a str,
    pub labels: &'a [String],
    pub tokens: &'a [RegistrationToken],
}

impl BootScript<'_> {
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BootScript<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let user = quote(&self.config.runner_user);
        let dir = quote(&format!("{}/runners", self.config.runner_home));

        f.write_str("#!/bin/bash\nset -euo pipefail\n\n")?;
        if let Some(pre) = &self.config.pre_runner_script {
            writeln!(f, "{}\n", pre.trim_end())?;
        }

        f.write_str(concat!(
            "case \"$(uname -m)\" in\n",
            "  aarch64|arm64) ARCH=arm64 ;;\n",
            "  *) ARCH=x64 ;;\n",
            "esac\n",
            "VERSION=$(curl -fsSL https://api.github.com/repos/actions/runner/releases/latest",
            " | grep -oP '\"tag_name\": \"v\\K[^\"]+')\n",
        ))?;
        writeln!(f, "mkdir -p {dir} && cd {dir}")?;
        f.write_str(concat!(
            "curl -fsSL -o runner.tar.gz ",
            "\"https://github.com/actions/runner/releases/download/v${VERSION}/",
            "actions-runner-linux-${ARCH}-${VERSION}.tar.gz\"\n\n",
        ))?;

        let url = quote(self.registration_url);
        let labels = quote(&self.labels.join(","));
        for (i, token) in self.tokens.iter().enumerate() {
            let name = quote(&format!("{}-{}", self.job, i + 1));
            let runner = format!("runner-{}", i + 1);
            writeln!(f, "mkdir -p {runner} && tar xzf runner.tar.gz -C {runner}")?;
            writeln!(f, "chown -R {user}:{user} {runner}")?;
            writeln!(
                f,
                "(cd {runner} && sudo -u {user} ./config.sh --unattended --url {url} --token {} --labels {labels} --name {name})",
                quote(&token.token),
            )?;
            writeln!(
                f,
                "(cd {runner} && sudo -u {user} nohup ./run.sh > run.log 2>&1 &)\n"
            )?;
        }
        Ok(())
    }
}

/// Single-quotes `s` for bash.
fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(t: &str) -> RegistrationToken {
        RegistrationToken {
            token: t.into(),
            expires_at: None,
        }
    }

    #[test]
    fn embeds_every_token_and_the_label_set() {
        let config = ProvisionConfig {
            pre_runner_script: Some("apt-get install -y git\n".into()),
            ..Default::default()
        };
        let job = JobId::new("job-9");
        let labels = vec!["job-9".to_string(), "linux".to_string()];
        let tokens = [token("AAA"), token("BBB")];

        let script = BootScript {
            config: &config,
            job: &job,
            registration_url: "https://github.com/acme/app",
            labels: &labels,
            tokens: &tokens,
        }
        .render();

        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("apt-get install -y git\n"));
        assert!(script.contains("--token 'AAA'"));
        assert!(script.contains("--token 'BBB'"));
        assert_eq!(script.matches("--labels 'job-9,linux'").count(), 2);
        assert!(script.contains("--name 'job-9-2'"));
        assert!(script.contains("--url 'https://github.com/acme/app'"));
        assert!(script.find("apt-get").unwrap() < script.find("config.sh").unwrap());
    }

    #[test]
    fn quotes_embedded_single_quotes() {
        assert_eq!(quote("it's"), r"'it'\''s'");
    }
}
