use async_trait::async_trait;
use gh_api::GithubClient;
use tracing::info;

use crate::types::{Runner, RunnerStatus};
use crate::{Result, RunnerRegistry};

/// Repository-scoped self-hosted runners on GitHub.
///
/// Delegates to `gh_api::GithubClient` for all HTTP calls.
pub struct GithubRunners {
    client: GithubClient,
    owner: String,
    repo: String,
}

impl GithubRunners {
    pub fn new(client: GithubClient, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            client,
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    fn parse_status(status: gh_api::RunnerStatus) -> RunnerStatus {
        match status {
            gh_api::RunnerStatus::Online => RunnerStatus::Online,
            gh_api::RunnerStatus::Offline => RunnerStatus::Offline,
            gh_api::RunnerStatus::Unknown => RunnerStatus::Unknown,
        }
    }

    fn to_runner(runner: gh_api::Runner) -> Runner {
        Runner {
            id: runner.id,
            name: runner.name,
            status: Self::parse_status(runner.status),
            busy: runner.busy,
            labels: runner.labels.into_iter().map(|l| l.name).collect(),
        }
    }
}

#[async_trait]
impl RunnerRegistry for GithubRunners {
    async fn list_runners(&self) -> Result<Vec<Runner>> {
        let runners = self.client.list_runners(&self.owner, &self.repo).await?;
        Ok(runners.into_iter().map(Self::to_runner).collect())
    }

    async fn registration_token(&self) -> Result<String> {
        let token = self
            .client
            .create_registration_token(&self.owner, &self.repo)
            .await?;
        info!(expires_at = %token.expires_at, "github: registration token received");
        Ok(token.token)
    }

    async fn delete_runner(&self, runner_id: u64) -> Result<()> {
        self.client
            .delete_runner(&self.owner, &self.repo, runner_id)
            .await?;
        info!(runner_id, "github: runner removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, find_runner_by_label};
    use assert_matches::assert_matches;
    use httpmock::MockServer;
    use serde_json::json;

    fn registry(server: &MockServer) -> GithubRunners {
        GithubRunners::new(
            GithubClient::new("gh-token").with_base_url(server.base_url()),
            "owner",
            "repo",
        )
    }

    #[tokio::test]
    async fn maps_runners_and_label_names() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/repos/owner/repo/actions/runners");
                then.status(200).json_body(json!({
                    "total_count": 1,
                    "runners": [{
                        "id": 23,
                        "name": "fhm-runner",
                        "os": "linux",
                        "status": "online",
                        "busy": true,
                        "labels": [
                            { "id": 5, "name": "self-hosted", "type": "read-only" },
                            { "id": 7, "name": "x1y2z", "type": "custom" }
                        ]
                    }]
                }));
            })
            .await;

        let runners = registry(&server).list_runners().await.unwrap();

        assert_eq!(
            runners,
            vec![Runner {
                id: 23,
                name: "fhm-runner".into(),
                status: RunnerStatus::Online,
                busy: true,
                labels: vec!["self-hosted".into(), "x1y2z".into()],
            }]
        );
    }

    #[tokio::test]
    async fn unauthorized_listing_is_swallowed_by_lookup() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/repos/owner/repo/actions/runners");
                then.status(401).body(r#"{"message": "Bad credentials"}"#);
            })
            .await;

        let registry = registry(&server);
        assert_matches!(registry.list_runners().await, Err(Error::Github(_)));
        assert_eq!(find_runner_by_label(&registry, "x1y2z").await, None);
    }

    #[tokio::test]
    async fn registration_token_returns_token_string() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/repos/owner/repo/actions/runners/registration-token");
                then.status(201).json_body(json!({
                    "token": "AABF3JGZDX3P5PMEXLND6TS6FCWO6",
                    "expires_at": "2030-01-22T12:13:35.123-08:00"
                }));
            })
            .await;

        let token = registry(&server).registration_token().await.unwrap();
        assert_eq!(token, "AABF3JGZDX3P5PMEXLND6TS6FCWO6");
    }

    #[tokio::test]
    async fn delete_runner_hits_runner_endpoint() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("DELETE")
                    .path("/repos/owner/repo/actions/runners/23");
                then.status(204);
            })
            .await;

        registry(&server).delete_runner(23).await.unwrap();
        mock.assert_hits_async(1).await;
    }
}
