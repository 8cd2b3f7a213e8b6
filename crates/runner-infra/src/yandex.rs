use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{info, warn};
use yc_api::{
    AttachedDiskSpec, CreateInstanceRequest, DiskMode, Endpoints, Instance,
    InstanceOperationMetadata, IpVersion, NetworkInterfaceSpec, OneToOneNatSpec, Operation,
    PrimaryAddressSpec, ServiceAccountKey, YcClient,
};

use crate::types::{DiskSpec, InstanceId, InstanceSpec};
use crate::{Error, Result, VmLifecycle};

/// Yandex Cloud Compute provider.
///
/// Delegates to `yc_api::YcClient` for all HTTP calls.
pub struct YandexCompute {
    client: YcClient,
}

impl YandexCompute {
    pub fn new(client: YcClient) -> Self {
        Self { client }
    }

    /// Authenticate with a service account authorized key (the JSON document).
    pub async fn from_service_account_json(raw_key: &str) -> Result<Self> {
        let key = ServiceAccountKey::from_json(raw_key)?;
        let client = YcClient::from_service_account(&key, Endpoints::default()).await?;
        info!(service_account_id = %key.service_account_id, "yc: iam token issued");
        Ok(Self::new(client))
    }

    fn attached_disk(disk: &DiskSpec) -> AttachedDiskSpec {
        AttachedDiskSpec {
            mode: DiskMode::ReadWrite,
            auto_delete: true,
            disk_spec: yc_api::DiskSpec {
                type_id: disk.type_id.clone(),
                size: disk.size,
                image_id: disk.image_id.clone(),
            },
        }
    }

    fn create_request(spec: &InstanceSpec) -> CreateInstanceRequest {
        let primary_v4_address_spec = PrimaryAddressSpec {
            one_to_one_nat_spec: spec.public_ip.then_some(OneToOneNatSpec {
                ip_version: IpVersion::Ipv4,
            }),
        };

        CreateInstanceRequest {
            folder_id: spec.folder_id.clone(),
            name: None,
            description: spec.description.clone(),
            labels: spec.labels.clone(),
            zone_id: spec.zone_id.clone(),
            platform_id: spec.platform_id.clone(),
            resources_spec: yc_api::ResourcesSpec {
                memory: spec.resources.memory,
                cores: spec.resources.cores,
                core_fraction: spec.resources.core_fraction,
            },
            metadata: HashMap::from([("user-data".to_string(), spec.user_data.clone())]),
            boot_disk_spec: Self::attached_disk(&spec.boot_disk),
            secondary_disk_specs: spec.second_disk.iter().map(Self::attached_disk).collect(),
            network_interface_specs: vec![NetworkInterfaceSpec {
                subnet_id: spec.subnet_id.clone(),
                primary_v4_address_spec,
            }],
            service_account_id: spec.service_account_id.clone(),
        }
    }

    /// Instance id of a finished create operation: the response instance,
    /// falling back to the operation metadata.
    fn instance_id(op: &Operation) -> Option<String> {
        op.response_as::<Instance>()
            .map(|i| i.id)
            .or_else(|| op.metadata_as::<InstanceOperationMetadata>().map(|m| m.instance_id))
    }
}

#[async_trait]
impl VmLifecycle for YandexCompute {
    async fn create_instance(&self, spec: &InstanceSpec) -> Result<InstanceId> {
        let op = self.client.create_instance(&Self::create_request(spec)).await?;
        info!(operation_id = %op.id, "yc: create instance requested");

        let finished = self.client.wait_operation(op).await?;
        let id = Self::instance_id(&finished)
            .ok_or_else(|| Error::MissingInstanceId(finished.id.clone()))?;

        info!(instance_id = %id, "yc: instance created");
        Ok(InstanceId(id))
    }

    async fn delete_instance(&self, id: &InstanceId) -> Result<()> {
        let op = match self.client.delete_instance(&id.0).await {
            Ok(op) => op,
            Err(e) if e.is_not_found() => {
                warn!(instance_id = %id, "yc: instance already deleted");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        info!(operation_id = %op.id, instance_id = %id, "yc: delete instance requested");

        self.client.wait_operation(op).await?;
        info!(instance_id = %id, "yc: instance deleted");
        Ok(())
    }
}
