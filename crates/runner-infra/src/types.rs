use std::collections::HashMap;
use std::fmt;

/// Opaque provider-side VM identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId(pub String);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute resources of a VM. `memory` is in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourcesSpec {
    pub cores: u32,
    pub memory: u64,
    pub core_fraction: u32,
}

/// A disk created from an image. `size` is in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskSpec {
    pub image_id: String,
    pub type_id: String,
    pub size: u64,
}

/// Everything needed to create a runner VM.
#[derive(Debug, Clone)]
pub struct InstanceSpec {
    pub folder_id: String,
    pub zone_id: String,
    pub platform_id: String,
    pub description: String,
    pub service_account_id: Option<String>,
    pub resources: ResourcesSpec,
    pub boot_disk: DiskSpec,
    pub second_disk: Option<DiskSpec>,
    pub subnet_id: String,
    pub public_ip: bool,
    pub labels: HashMap<String, String>,
    pub user_data: String,
}

/// A self-hosted runner as seen by the registration service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Runner {
    pub id: u64,
    pub name: String,
    pub status: RunnerStatus,
    pub busy: bool,
    pub labels: Vec<String>,
}

impl Runner {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn is_online(&self) -> bool {
        self.status == RunnerStatus::Online
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerStatus {
    Online,
    Offline,
    Unknown,
}
