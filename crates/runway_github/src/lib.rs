//! # Runway GitHub
//! [![Crates.io](https://img.shields.io/crates/v/runway_github.svg)](https://crates.io/crates/runway_github)
//! [![Docs](https://docs.rs/runway_github/badge.svg)](https://docs.rs/runway_github/)
//!
//! [`RegistrationService`] backed by the GitHub Actions self-hosted runner API.
//!
//! Runners can be registered on a repository or on an organization. The token needs
//! `administration:write` on the repository (or `organization_self_hosted_runners:write`).
//!
//! ## Usage
//!
//! ```no_run
//! use runway_github::{GithubRegistry, RunnerScope};
//!
//! let registry = GithubRegistry::new(
//!     "ghp_example",
//!     RunnerScope::Repo { owner: "acme".into(), repo: "app".into() },
//! );
//! ```

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use runway_core::prelude::*;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const API_URL: &str = "https://api.github.com";
const WEB_URL: &str = "https://github.com";
const PER_PAGE: usize = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where runners are registered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunnerScope {
    Repo { owner: String, repo: String },
    Org(String),
}

impl RunnerScope {
    /// Parses `owner/repo` or a bare organization name.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().trim_matches('/');
        match s.split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
                Some(Self::Repo {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                })
            }
            None if !s.is_empty() => Some(Self::Org(s.to_string())),
            _ => None,
        }
    }

    fn api_path(&self) -> String {
        match self {
            Self::Repo { owner, repo } => format!("/repos/{owner}/{repo}/actions/runners"),
            Self::Org(org) => format!("/orgs/{org}/actions/runners"),
        }
    }

    fn web_path(&self) -> String {
        match self {
            Self::Repo { owner, repo } => format!("/{owner}/{repo}"),
            Self::Org(org) => format!("/{org}"),
        }
    }
}

#[derive(Deserialize)]
struct RunnerList {
    total_count: usize,
    runners: Vec<Runner>,
}

#[derive(Deserialize)]
struct Runner {
    id: u64,
    name: String,
    status: String,
    #[serde(default)]
    busy: bool,
    #[serde(default)]
    labels: Vec<RunnerLabel>,
}

#[derive(Deserialize)]
struct RunnerLabel {
    name: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl From<Runner> for Registration {
    fn from(r: Runner) -> Self {
        Registration {
            id: r.id.to_string(),
            name: r.name,
            status: if r.status.eq_ignore_ascii_case("online") {
                RegistrationStatus::Online
            } else {
                RegistrationStatus::Offline
            },
            busy: r.busy,
            labels: r.labels.into_iter().map(|l| l.name).collect(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GithubRegistry {
    client: Client,
    token: String,
    scope: RunnerScope,
    api_url: String,
    web_url: String,
}

impl GithubRegistry {
    pub fn new(token: impl Into<String>, scope: RunnerScope) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            scope,
            api_url: API_URL.to_string(),
            web_url: WEB_URL.to_string(),
        }
    }

    /// Points the client at a GitHub Enterprise Server (or a test server).
    pub fn with_urls(mut self, api_url: impl Into<String>, web_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self.web_url = web_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}{}", self.api_url, self.scope.api_path(), path))
            .timeout(REQUEST_TIMEOUT)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", concat!("runway/", env!("CARGO_PKG_VERSION")))
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, RegistrationError> {
        let response = req
            .send()
            .await
            .map_err(|e| RegistrationError::System(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RegistrationError::Unauthorized(text),
            _ => RegistrationError::Service(status.as_u16(), text),
        })
    }
}

impl RegistrationService for GithubRegistry {
    fn registration_url(&self) -> String {
        format!("{}{}", self.web_url, self.scope.web_path())
    }

    async fn list_registrations(&self, labels: &[String]) -> Result<Vec<Registration>, RegistrationError> {
        let mut registrations = Vec::new();
        let mut seen = 0;
        let mut page = 1;
        loop {
            let req = self
                .request(reqwest::Method::GET, "")
                .query(&[("per_page", PER_PAGE), ("page", page)]);
            let list: RunnerList = self
                .send(req)
                .await?
                .json()
                .await
                .map_err(|e| RegistrationError::System(e.to_string()))?;

            let fetched = list.runners.len();
            seen += fetched;
            registrations.extend(
                list.runners
                    .into_iter()
                    .map(Registration::from)
                    .filter(|r| r.has_labels(labels)),
            );

            if fetched < PER_PAGE || seen >= list.total_count {
                break;
            }
            page += 1;
        }

        debug!(?labels, count = registrations.len(), "Listed runners");
        Ok(registrations)
    }

    async fn delete_registration(&self, id: &str) -> Result<bool, RegistrationError> {
        let req = self.request(reqwest::Method::DELETE, &format!("/{id}"));
        match self.send(req).await {
            Ok(_) => Ok(true),
            Err(RegistrationError::Service(404, _)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn issue_registration_token(&self) -> Result<RegistrationToken, RegistrationError> {
        let req = self.request(reqwest::Method::POST, "/registration-token");
        let data: TokenResponse = self
            .send(req)
            .await?
            .json()
            .await
            .map_err(|e| RegistrationError::System(e.to_string()))?;

        Ok(RegistrationToken {
            token: data.token,
            expires_at: data.expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn runner(id: u64, status: &str, labels: &[&str]) -> serde_json::Value {
        json!({
            "id": id,
            "name": format!("runner-{id}"),
            "os": "linux",
            "status": status,
            "busy": false,
            "labels": labels.iter().map(|l| json!({"id": 1, "name": l, "type": "custom"})).collect::<Vec<_>>(),
        })
    }

    fn registry(server: &MockServer) -> GithubRegistry {
        GithubRegistry::new(
            "secret",
            RunnerScope::Repo {
                owner: "acme".into(),
                repo: "app".into(),
            },
        )
        .with_urls(server.uri(), "https://github.example")
    }

    #[test]
    fn parses_scopes() {
        assert_eq!(
            RunnerScope::parse("acme/app"),
            Some(RunnerScope::Repo {
                owner: "acme".into(),
                repo: "app".into()
            })
        );
        assert_eq!(RunnerScope::parse("acme"), Some(RunnerScope::Org("acme".into())));
        assert_eq!(RunnerScope::parse("a/b/c"), None);
        assert_eq!(RunnerScope::parse(""), None);
    }

    #[tokio::test]
    async fn lists_runners_with_all_labels() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/app/actions/runners"))
            .and(header("Authorization", "Bearer secret"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 3,
                "runners": [
                    runner(1, "online", &["self-hosted", "job-1"]),
                    runner(2, "offline", &["job-1"]),
                    runner(3, "online", &["job-2"]),
                ]
            })))
            .mount(&server)
            .await;

        let found = registry(&server)
            .list_registrations(&["job-1".to_string()])
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, "1");
        assert!(found[0].is_online());
        assert!(!found[1].is_online());
    }

    #[tokio::test]
    async fn follows_pages_until_total_count() {
        let server = MockServer::start().await;
        let first: Vec<_> = (1..=100).map(|id| runner(id, "offline", &["job-1"])).collect();
        Mock::given(method("GET"))
            .and(path("/repos/acme/app/actions/runners"))
            .and(query_param("per_page", "100"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 102,
                "runners": first,
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/app/actions/runners"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 102,
                "runners": [
                    runner(101, "online", &["job-1"]),
                    runner(102, "online", &["job-2"]),
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let found = registry(&server)
            .list_registrations(&["job-1".to_string()])
            .await
            .unwrap();

        assert_eq!(found.len(), 101);
        assert_eq!(found.last().map(|r| r.id.as_str()), Some("101"));
        assert!(found.last().is_some_and(Registration::is_online));
    }

    #[tokio::test]
    async fn issues_registration_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/app/actions/runners/registration-token"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "token": "LLBF3JGZDX3P5PMEXLND6TS6FCWO6",
                "expires_at": "2020-01-22T12:13:35.123-08:00"
            })))
            .mount(&server)
            .await;

        let token = registry(&server).issue_registration_token().await.unwrap();
        assert_eq!(token.token, "LLBF3JGZDX3P5PMEXLND6TS6FCWO6");
        assert!(token.expires_at.is_some());
    }

    #[tokio::test]
    async fn delete_reports_missing_runner_as_not_removed() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/repos/acme/app/actions/runners/1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/repos/acme/app/actions/runners/2"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let registry = registry(&server);
        assert!(registry.delete_registration("1").await.unwrap());
        assert!(!registry.delete_registration("2").await.unwrap());
    }

    #[tokio::test]
    async fn auth_failures_are_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
            .mount(&server)
            .await;

        let result = registry(&server).issue_registration_token().await;
        assert!(matches!(result, Err(RegistrationError::Unauthorized(_))));
    }

    #[test]
    fn registration_url_matches_scope() {
        let registry = GithubRegistry::new("t", RunnerScope::Org("acme".into()));
        assert_eq!(registry.registration_url(), "https://github.com/acme");
    }
}
