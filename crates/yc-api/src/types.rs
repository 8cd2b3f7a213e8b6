use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── IAM ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct CreateIamTokenRequest {
    pub jwt: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IamToken {
    pub iam_token: String,
    #[serde(default)]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

// ── Instances ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceRequest {
    pub folder_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub description: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    pub zone_id: String,
    pub platform_id: String,
    pub resources_spec: ResourcesSpec,
    pub metadata: HashMap<String, String>,
    pub boot_disk_spec: AttachedDiskSpec,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secondary_disk_specs: Vec<AttachedDiskSpec>,
    pub network_interface_specs: Vec<NetworkInterfaceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesSpec {
    pub memory: u64,
    pub cores: u32,
    pub core_fraction: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDiskSpec {
    pub mode: DiskMode,
    pub auto_delete: bool,
    pub disk_spec: DiskSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiskMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskSpec {
    pub type_id: String,
    pub size: u64,
    pub image_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfaceSpec {
    pub subnet_id: String,
    pub primary_v4_address_spec: PrimaryAddressSpec,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryAddressSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_to_one_nat_spec: Option<OneToOneNatSpec>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OneToOneNatSpec {
    pub ip_version: IpVersion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IpVersion {
    Ipv4,
    Ipv6,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: String,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Metadata attached to create/delete instance operations.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceOperationMetadata {
    pub instance_id: String,
}

// ── Operations ───────────────────────────────────────────────────────

/// A long-running operation handle.
///
/// Exactly one of `response` and `error` is set once `done` is true.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub response: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<OperationStatus>,
}

impl Operation {
    /// Decode `metadata` as `T`, ignoring the `@type` discriminator.
    pub fn metadata_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.metadata
            .clone()
            .and_then(|m| serde_json::from_value(m).ok())
    }

    /// Decode `response` as `T`, ignoring the `@type` discriminator.
    pub fn response_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.response
            .clone()
            .and_then(|r| serde_json::from_value(r).ok())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationStatus {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}
