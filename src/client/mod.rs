use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use url::Url;

use crate::error::{Error, Result};
use crate::metrics::Metric;

pub const DEFAULT_BASE_URL: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Source of full usage snapshots. A snapshot is everything the remote
/// currently knows about, not a delta.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch_usage_snapshot(&self) -> Result<Vec<Metric>>;
}

/// Minimal GitHub REST client for the organization Copilot usage endpoint.
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    base_url: Url,
    organization: String,
    token: String,
}

impl GithubClient {
    pub fn new(base_url: &str, organization: &str, token: &str) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| Error::Config(format!("invalid base URL {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!("base URL {base_url} cannot carry a path")));
        }
        if organization.trim().is_empty() {
            return Err(Error::Config("organization must not be empty".into()));
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url,
            organization: organization.trim().to_string(),
            token: token.to_string(),
        })
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    fn usage_url(&self) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("base URL {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(["orgs", self.organization.as_str(), "copilot", "usage"]);
        Ok(url)
    }
}

#[async_trait]
impl MetricsSource for GithubClient {
    async fn fetch_usage_snapshot(&self) -> Result<Vec<Metric>> {
        let url = self.usage_url()?;
        log::debug!("GET {url}");

        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/vnd.github+json")
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .header(USER_AGENT, concat!("copilotdw/", env!("CARGO_PKG_VERSION")))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteFetch {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice::<Vec<Metric>>(&bytes).map_err(|e| Error::RemoteFetch {
            status: Some(status.as_u16()),
            message: format!("unexpected usage payload: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_sends_github_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orgs/octo-org/copilot/usage"))
            .and(header("authorization", "Bearer s3cret"))
            .and(header("accept", "application/vnd.github+json"))
            .and(header("x-github-api-version", "2022-11-28"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "day": "2024-06-24",
                    "total_suggestions_count": 1000,
                    "total_acceptances_count": 800,
                    "total_active_users": 10,
                    "breakdown": [{"language": "python", "editor": "vscode"}]
                },
                {
                    "day": "2024-06-23",
                    "total_suggestions_count": 500,
                    "breakdown": []
                }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = GithubClient::new(&server.uri(), "octo-org", "s3cret").unwrap();
        let snapshot = client.fetch_usage_snapshot().await.unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].day.to_string(), "2024-06-24");
        assert_eq!(snapshot[0].total_acceptances_count, 800);
        assert_eq!(snapshot[1].total_acceptances_count, 0);
    }

    #[tokio::test]
    async fn test_non_success_status_is_remote_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orgs/octo-org/copilot/usage"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_string(r#"{"message":"Resource not accessible by integration"}"#),
            )
            .mount(&server)
            .await;

        let client = GithubClient::new(&server.uri(), "octo-org", "bad").unwrap();
        match client.fetch_usage_snapshot().await {
            Err(Error::RemoteFetch { status, message }) => {
                assert_eq!(status, Some(403));
                assert!(message.contains("Resource not accessible"));
            }
            other => panic!("expected RemoteFetch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_payload_is_remote_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"not": "an array"})))
            .mount(&server)
            .await;

        let client = GithubClient::new(&server.uri(), "octo-org", "t").unwrap();
        assert!(matches!(
            client.fetch_usage_snapshot().await,
            Err(Error::RemoteFetch { status: Some(200), .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_remote_fetch_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client =
            GithubClient::new(&format!("http://127.0.0.1:{port}"), "octo-org", "t").unwrap();
        assert!(matches!(
            client.fetch_usage_snapshot().await,
            Err(Error::RemoteFetch { status: None, .. })
        ));
    }

    #[test]
    fn test_usage_url_with_enterprise_base() {
        let client =
            GithubClient::new("https://ghe.example.com/api/v3/", "octo-org", "t").unwrap();
        assert_eq!(
            client.usage_url().unwrap().as_str(),
            "https://ghe.example.com/api/v3/orgs/octo-org/copilot/usage"
        );

        let client = GithubClient::new(DEFAULT_BASE_URL, "octo-org", "t").unwrap();
        assert_eq!(
            client.usage_url().unwrap().as_str(),
            "https://api.github.com/orgs/octo-org/copilot/usage"
        );
    }

    #[test]
    fn test_usage_url_escapes_organization() {
        let client = GithubClient::new(DEFAULT_BASE_URL, "a/b?c#d", "t").unwrap();
        let url = client.usage_url().unwrap();
        assert_eq!(url.path(), "/orgs/a%2Fb%3Fc%23d/copilot/usage");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_new_rejects_bad_config() {
        assert!(matches!(
            GithubClient::new("not a url", "octo-org", "t"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            GithubClient::new(DEFAULT_BASE_URL, "  ", "t"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            GithubClient::new("mailto:ops@example.com", "octo-org", "t"),
            Err(Error::Config(_))
        ));
    }
}
