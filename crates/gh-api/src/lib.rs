//! Typed Rust client for the GitHub REST API.
//!
//! Covers the repository-level self-hosted runner endpoints:
//! list (paginated), registration token, delete.

mod types;

pub use types::*;

const BASE_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("yc-github-runner/", env!("CARGO_PKG_VERSION"));
const PER_PAGE: u32 = 100;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("github api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("github api {endpoint} returned {status}: {body} (x-github-request-id: {})", .request_id.as_deref().unwrap_or("-"))]
    Api {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
        request_id: Option<String>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Client for the GitHub REST API.
#[derive(Clone)]
pub struct GithubClient {
    token: String,
    base_url: String,
    http: reqwest::Client,
}

impl GithubClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base_url: BASE_URL.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Point the client at a different API root, e.g. a GitHub Enterprise Server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, owner: &str, repo: &str, path: &str) -> String {
        format!("{}/repos/{owner}/{repo}/actions/runners{path}", self.base_url)
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", USER_AGENT)
    }

    async fn check(resp: reqwest::Response, endpoint: &'static str) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let request_id = Self::request_id(&resp);
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                endpoint,
                status,
                body,
                request_id,
            });
        }
        Ok(resp)
    }

    /// Like `check` but also treats 404 as success (for delete idempotency).
    async fn check_allow_404(
        resp: reqwest::Response,
        endpoint: &'static str,
    ) -> Result<reqwest::Response> {
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(resp);
        }
        Self::check(resp, endpoint).await
    }

    fn request_id(resp: &reqwest::Response) -> Option<String> {
        resp.headers()
            .get("x-github-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    // ── Runners ─────────────────────────────────────────────────────

    pub async fn list_runners_page(
        &self,
        owner: &str,
        repo: &str,
        page: u32,
    ) -> Result<ListRunnersResponse> {
        let resp = self
            .request(reqwest::Method::GET, self.url(owner, repo, ""))
            .query(&[("per_page", PER_PAGE), ("page", page)])
            .send()
            .await?;

        Self::check(resp, "list runners")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    /// List every self-hosted runner registered to the repository, following pagination.
    pub async fn list_runners(&self, owner: &str, repo: &str) -> Result<Vec<Runner>> {
        let mut runners = Vec::new();
        let mut page = 1;
        loop {
            let resp = self.list_runners_page(owner, repo, page).await?;
            let fetched = resp.runners.len();
            runners.extend(resp.runners);

            if fetched == 0 || runners.len() as u64 >= resp.total_count {
                return Ok(runners);
            }
            page += 1;
        }
    }

    pub async fn create_registration_token(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<RegistrationToken> {
        let resp = self
            .request(
                reqwest::Method::POST,
                self.url(owner, repo, "/registration-token"),
            )
            .send()
            .await?;

        Self::check(resp, "create registration token")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn delete_runner(&self, owner: &str, repo: &str, runner_id: u64) -> Result<()> {
        let resp = self
            .request(
                reqwest::Method::DELETE,
                self.url(owner, repo, &format!("/{runner_id}")),
            )
            .send()
            .await?;

        Self::check_allow_404(resp, "delete runner").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use httpmock::MockServer;
    use serde_json::json;

    fn runner_json(id: u64, label: &str, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": format!("runner-{id}"),
            "os": "linux",
            "status": status,
            "busy": false,
            "labels": [
                { "id": 1, "name": "self-hosted", "type": "read-only" },
                { "id": 2, "name": label, "type": "custom" }
            ]
        })
    }

    fn client(server: &MockServer) -> GithubClient {
        GithubClient::new("gh-token").with_base_url(server.base_url())
    }

    #[tokio::test]
    async fn list_runners_follows_pagination() {
        let server = MockServer::start_async().await;
        let first: Vec<_> = (1..=100).map(|i| runner_json(i, "other", "online")).collect();
        let page1 = server
            .mock_async(|when, then| {
                when.method("GET")
                    .path("/repos/owner/repo/actions/runners")
                    .query_param("per_page", "100")
                    .query_param("page", "1")
                    .header("Authorization", "Bearer gh-token");
                then.status(200)
                    .json_body(json!({ "total_count": 101, "runners": first }));
            })
            .await;
        let page2 = server
            .mock_async(|when, then| {
                when.method("GET")
                    .path("/repos/owner/repo/actions/runners")
                    .query_param("page", "2");
                then.status(200).json_body(json!({
                    "total_count": 101,
                    "runners": [runner_json(101, "abc12", "offline")]
                }));
            })
            .await;

        let runners = client(&server).list_runners("owner", "repo").await.unwrap();

        assert_eq!(runners.len(), 101);
        let last = runners.last().unwrap();
        assert_eq!(last.status, RunnerStatus::Offline);
        assert_eq!(last.labels[1].name, "abc12");
        assert_eq!(last.labels[1].kind.as_deref(), Some("custom"));
        page1.assert_hits_async(1).await;
        page2.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn list_runners_stops_on_empty_page() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("GET").path("/repos/owner/repo/actions/runners");
                then.status(200)
                    .json_body(json!({ "total_count": 5, "runners": [] }));
            })
            .await;

        let runners = client(&server).list_runners("owner", "repo").await.unwrap();

        assert!(runners.is_empty());
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn unknown_status_is_tolerated() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/repos/owner/repo/actions/runners");
                then.status(200).json_body(json!({
                    "total_count": 1,
                    "runners": [runner_json(7, "abc12", "provisioning")]
                }));
            })
            .await;

        let runners = client(&server).list_runners("owner", "repo").await.unwrap();
        assert_eq!(runners[0].status, RunnerStatus::Unknown);
    }

    #[tokio::test]
    async fn creates_registration_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/repos/owner/repo/actions/runners/registration-token");
                then.status(201).json_body(json!({
                    "token": "LLBF3JGZDX3P5PMEXLND6TS6FCWO6",
                    "expires_at": "2020-01-22T12:13:35.123-08:00"
                }));
            })
            .await;

        let token = client(&server)
            .create_registration_token("owner", "repo")
            .await
            .unwrap();

        assert_eq!(token.token, "LLBF3JGZDX3P5PMEXLND6TS6FCWO6");
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn registration_token_error_carries_request_id() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/repos/owner/repo/actions/runners/registration-token");
                then.status(403)
                    .header("x-github-request-id", "C0DE:1234")
                    .body(r#"{"message": "Resource not accessible by integration"}"#);
            })
            .await;

        let err = client(&server)
            .create_registration_token("owner", "repo")
            .await
            .unwrap_err();

        assert_matches!(&err, Error::Api { status, request_id, .. } => {
            assert_eq!(*status, reqwest::StatusCode::FORBIDDEN);
            assert_eq!(request_id.as_deref(), Some("C0DE:1234"));
        });
        assert!(err.to_string().contains("C0DE:1234"));
    }

    #[tokio::test]
    async fn delete_runner_treats_404_as_done() {
        let server = MockServer::start_async().await;
        let gone = server
            .mock_async(|when, then| {
                when.method("DELETE")
                    .path("/repos/owner/repo/actions/runners/42");
                then.status(404);
            })
            .await;
        let denied = server
            .mock_async(|when, then| {
                when.method("DELETE")
                    .path("/repos/owner/repo/actions/runners/43");
                then.status(500).body("boom");
            })
            .await;

        let client = client(&server);
        client.delete_runner("owner", "repo", 42).await.unwrap();
        assert_matches!(
            client.delete_runner("owner", "repo", 43).await,
            Err(Error::Api { .. })
        );
        gone.assert_hits_async(1).await;
        denied.assert_hits_async(1).await;
    }
}
