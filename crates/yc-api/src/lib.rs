//! Typed Rust client for the Yandex Cloud REST API.
//!
//! Covers the subset needed for managing runner VMs:
//! IAM token exchange, compute instances (create, delete) and
//! long-running operations (get, wait).

mod iam;
mod types;

use std::fmt;
use std::time::Duration;

use tracing::debug;

pub use iam::*;
pub use types::*;

const IAM_URL: &str = "https://iam.api.cloud.yandex.net";
const COMPUTE_URL: &str = "https://compute.api.cloud.yandex.net";
const OPERATION_URL: &str = "https://operation.api.cloud.yandex.net";

const OPERATION_POLL_INTERVAL: Duration = Duration::from_secs(1);
const OPERATION_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("yandex cloud api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("yandex cloud api {endpoint} returned {status}: {body} ({trace})")]
    Api {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
        trace: TraceIds,
    },

    #[error("operation {id} failed with code {code}: {message}")]
    Operation { id: String, code: i32, message: String },

    #[error("operation {id} did not finish within {timeout:?}")]
    OperationTimeout { id: String, timeout: Duration },

    #[error("invalid service account key: {0}")]
    InvalidKey(#[source] serde_json::Error),

    #[error("failed to sign service account jwt: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl Error {
    /// HTTP status of a rejected request, if the API answered at all.
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(reqwest::StatusCode::NOT_FOUND)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Request identifiers Yandex Cloud support asks for when diagnosing a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceIds {
    pub request_id: Option<String>,
    pub server_trace_id: Option<String>,
}

impl TraceIds {
    fn from_headers(headers: &reqwest::header::HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            request_id: get("x-request-id"),
            server_trace_id: get("x-server-trace-id"),
        }
    }
}

impl fmt::Display for TraceIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x-request-id: {}, x-server-trace-id: {}",
            self.request_id.as_deref().unwrap_or("-"),
            self.server_trace_id.as_deref().unwrap_or("-"),
        )
    }
}

/// Base URLs of the services the client talks to.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub iam: String,
    pub compute: String,
    pub operation: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            iam: IAM_URL.into(),
            compute: COMPUTE_URL.into(),
            operation: OPERATION_URL.into(),
        }
    }
}

/// Client for the Yandex Cloud Compute and Operation REST APIs.
#[derive(Clone)]
pub struct YcClient {
    iam_token: String,
    endpoints: Endpoints,
    http: reqwest::Client,
    poll_interval: Duration,
    operation_timeout: Duration,
}

impl YcClient {
    pub fn new(iam_token: impl Into<String>) -> Self {
        Self {
            iam_token: iam_token.into(),
            endpoints: Endpoints::default(),
            http: reqwest::Client::new(),
            poll_interval: OPERATION_POLL_INTERVAL,
            operation_timeout: OPERATION_TIMEOUT,
        }
    }

    /// Exchange a service account key for an IAM token and build a client with it.
    pub async fn from_service_account(key: &ServiceAccountKey, endpoints: Endpoints) -> Result<Self> {
        let http = reqwest::Client::new();
        let token = Self::create_iam_token(&http, &endpoints, key).await?;
        Ok(Self {
            http,
            endpoints,
            ..Self::new(token.iam_token)
        })
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Override how often and for how long `wait_operation` polls.
    pub fn with_operation_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.operation_timeout = timeout;
        self
    }

    fn auth(&self) -> String {
        format!("Bearer {}", self.iam_token)
    }

    fn client_request_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    async fn check(resp: reqwest::Response, endpoint: &'static str) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let trace = TraceIds::from_headers(resp.headers());
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                endpoint,
                status,
                body,
                trace,
            });
        }
        Ok(resp)
    }

    // ── IAM ──────────────────────────────────────────────────────────

    async fn create_iam_token(
        http: &reqwest::Client,
        endpoints: &Endpoints,
        key: &ServiceAccountKey,
    ) -> Result<IamToken> {
        let jwt = key.sign_jwt(chrono::Utc::now())?;
        let resp = http
            .post(format!("{}/iam/v1/tokens", endpoints.iam))
            .header("x-client-request-id", Self::client_request_id())
            .json(&CreateIamTokenRequest { jwt })
            .send()
            .await?;

        Self::check(resp, "create iam token")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    // ── Instances ────────────────────────────────────────────────────

    pub async fn create_instance(&self, req: &CreateInstanceRequest) -> Result<Operation> {
        let resp = self
            .http
            .post(format!("{}/compute/v1/instances", self.endpoints.compute))
            .header("Authorization", self.auth())
            .header("x-client-request-id", Self::client_request_id())
            .json(req)
            .send()
            .await?;

        Self::check(resp, "create instance")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn delete_instance(&self, instance_id: &str) -> Result<Operation> {
        let resp = self
            .http
            .delete(format!(
                "{}/compute/v1/instances/{instance_id}",
                self.endpoints.compute
            ))
            .header("Authorization", self.auth())
            .header("x-client-request-id", Self::client_request_id())
            .send()
            .await?;

        Self::check(resp, "delete instance")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    // ── Operations ───────────────────────────────────────────────────

    pub async fn get_operation(&self, operation_id: &str) -> Result<Operation> {
        let resp = self
            .http
            .get(format!(
                "{}/operations/{operation_id}",
                self.endpoints.operation
            ))
            .header("Authorization", self.auth())
            .header("x-client-request-id", Self::client_request_id())
            .send()
            .await?;

        Self::check(resp, "get operation")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    /// Poll an operation until it is done.
    ///
    /// A finished operation that carries an error status is returned as
    /// [`Error::Operation`].
    pub async fn wait_operation(&self, mut op: Operation) -> Result<Operation> {
        let deadline = tokio::time::Instant::now() + self.operation_timeout;

        while !op.done {
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::OperationTimeout {
                    id: op.id,
                    timeout: self.operation_timeout,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
            op = self.get_operation(&op.id).await?;
            debug!(operation_id = %op.id, done = op.done, "yc: polled operation");
        }

        if let Some(status) = op.error {
            return Err(Error::Operation {
                id: op.id,
                code: status.code,
                message: status.message,
            });
        }

        Ok(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use httpmock::MockServer;
    use std::collections::HashMap;

    fn endpoints(server: &MockServer) -> Endpoints {
        Endpoints {
            iam: server.base_url(),
            compute: server.base_url(),
            operation: server.base_url(),
        }
    }

    fn client(server: &MockServer) -> YcClient {
        YcClient::new("iam-token")
            .with_endpoints(endpoints(server))
            .with_operation_polling(Duration::from_millis(5), Duration::from_secs(5))
    }

    fn create_request() -> CreateInstanceRequest {
        CreateInstanceRequest {
            folder_id: "folder".into(),
            name: None,
            description: "Runner for: owner/repo".into(),
            labels: HashMap::new(),
            zone_id: "ru-central1-a".into(),
            platform_id: "standard-v3".into(),
            resources_spec: ResourcesSpec {
                memory: 2 * 1024 * 1024 * 1024,
                cores: 2,
                core_fraction: 100,
            },
            metadata: HashMap::from([("user-data".to_string(), "#!/bin/bash".to_string())]),
            boot_disk_spec: AttachedDiskSpec {
                mode: DiskMode::ReadWrite,
                auto_delete: true,
                disk_spec: DiskSpec {
                    type_id: "network-ssd".into(),
                    size: 30 * 1024 * 1024 * 1024,
                    image_id: "image".into(),
                },
            },
            secondary_disk_specs: Vec::new(),
            network_interface_specs: vec![NetworkInterfaceSpec {
                subnet_id: "subnet".into(),
                primary_v4_address_spec: PrimaryAddressSpec::default(),
            }],
            service_account_id: None,
        }
    }

    #[test]
    fn create_request_uses_camel_case_and_skips_empty_fields() {
        let json = serde_json::to_value(create_request()).unwrap();

        assert_eq!(json["folderId"], "folder");
        assert_eq!(json["resourcesSpec"]["coreFraction"], 100);
        assert_eq!(json["bootDiskSpec"]["mode"], "READ_WRITE");
        assert_eq!(json["bootDiskSpec"]["autoDelete"], true);
        assert_eq!(json["bootDiskSpec"]["diskSpec"]["imageId"], "image");
        assert_eq!(json["metadata"]["user-data"], "#!/bin/bash");
        assert_eq!(
            json["networkInterfaceSpecs"][0]["primaryV4AddressSpec"],
            serde_json::json!({})
        );
        assert!(json.get("labels").is_none());
        assert!(json.get("secondaryDiskSpecs").is_none());
        assert!(json.get("serviceAccountId").is_none());
    }

    #[test]
    fn nat_spec_serializes_ip_version() {
        let spec = PrimaryAddressSpec {
            one_to_one_nat_spec: Some(OneToOneNatSpec {
                ip_version: IpVersion::Ipv4,
            }),
        };
        assert_eq!(
            serde_json::to_value(spec).unwrap(),
            serde_json::json!({ "oneToOneNatSpec": { "ipVersion": "IPV4" } })
        );
    }

    #[tokio::test]
    async fn create_instance_waits_for_operation() {
        let server = MockServer::start_async().await;
        let create = server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/compute/v1/instances")
                    .header("Authorization", "Bearer iam-token");
                then.status(200).json_body(serde_json::json!({
                    "id": "op1",
                    "done": false,
                    "metadata": {
                        "@type": "type.googleapis.com/yandex.cloud.compute.v1.CreateInstanceMetadata",
                        "instanceId": "fhm123"
                    }
                }));
            })
            .await;
        let poll = server
            .mock_async(|when, then| {
                when.method("GET").path("/operations/op1");
                then.status(200).json_body(serde_json::json!({
                    "id": "op1",
                    "done": true,
                    "response": {
                        "@type": "type.googleapis.com/yandex.cloud.compute.v1.Instance",
                        "id": "fhm123",
                        "status": "RUNNING"
                    }
                }));
            })
            .await;

        let client = client(&server);
        let op = client.create_instance(&create_request()).await.unwrap();
        assert_eq!(
            op.metadata_as::<InstanceOperationMetadata>().unwrap().instance_id,
            "fhm123"
        );

        let finished = client.wait_operation(op).await.unwrap();
        assert_eq!(finished.response_as::<Instance>().unwrap().id, "fhm123");

        create.assert_hits_async(1).await;
        poll.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn failed_operation_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/operations/op2");
                then.status(200).json_body(serde_json::json!({
                    "id": "op2",
                    "done": true,
                    "error": { "code": 8, "message": "Quota limit vpc.externalAddresses.count exceeded" }
                }));
            })
            .await;

        let pending = Operation {
            id: "op2".into(),
            description: None,
            done: false,
            metadata: None,
            response: None,
            error: None,
        };
        let err = client(&server).wait_operation(pending).await.unwrap_err();
        assert_matches!(err, Error::Operation { code: 8, .. });
    }

    #[tokio::test]
    async fn unfinished_operation_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/operations/op3");
                then.status(200)
                    .json_body(serde_json::json!({ "id": "op3", "done": false }));
            })
            .await;

        let client = YcClient::new("iam-token")
            .with_endpoints(endpoints(&server))
            .with_operation_polling(Duration::from_millis(5), Duration::from_millis(50));
        let pending = Operation {
            id: "op3".into(),
            description: None,
            done: false,
            metadata: None,
            response: None,
            error: None,
        };
        assert_matches!(
            client.wait_operation(pending).await,
            Err(Error::OperationTimeout { .. })
        );
    }

    #[tokio::test]
    async fn api_error_carries_trace_ids() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("DELETE").path("/compute/v1/instances/missing");
                then.status(404)
                    .header("x-request-id", "req-1")
                    .header("x-server-trace-id", "trace-1")
                    .body(r#"{"code": 5, "message": "Instance not found"}"#);
            })
            .await;

        let err = client(&server).delete_instance("missing").await.unwrap_err();
        assert_eq!(err.status(), Some(reqwest::StatusCode::NOT_FOUND));
        assert_matches!(&err, Error::Api { trace, .. } => {
            assert_eq!(trace.request_id.as_deref(), Some("req-1"));
            assert_eq!(trace.server_trace_id.as_deref(), Some("trace-1"));
        });
        assert!(err.to_string().contains("x-request-id: req-1"));
    }

    #[tokio::test]
    async fn exchanges_service_account_key_for_iam_token() {
        let server = MockServer::start_async().await;
        let exchange = server
            .mock_async(|when, then| {
                when.method("POST").path("/iam/v1/tokens");
                then.status(200).json_body(serde_json::json!({
                    "iamToken": "t1.fresh",
                    "expiresAt": "2030-01-01T00:00:00Z"
                }));
            })
            .await;
        let operation = server
            .mock_async(|when, then| {
                when.method("GET")
                    .path("/operations/op4")
                    .header("Authorization", "Bearer t1.fresh");
                then.status(200)
                    .json_body(serde_json::json!({ "id": "op4", "done": true }));
            })
            .await;

        let key = ServiceAccountKey::from_json(
            &serde_json::json!({
                "id": "ajekey",
                "service_account_id": "ajesa",
                "private_key": include_str!("../testdata/private_key.pem"),
            })
            .to_string(),
        )
        .unwrap();
        let client = YcClient::from_service_account(&key, endpoints(&server))
            .await
            .unwrap();
        client.get_operation("op4").await.unwrap();

        exchange.assert_hits_async(1).await;
        operation.assert_hits_async(1).await;
    }
}
