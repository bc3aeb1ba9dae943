//! VM instance models as returned by the management API.
//!
//! Every field except the flattened [`ResourceBase`] is optional on the wire and
//! omitted when serializing if unset.

use serde::{Deserialize, Serialize};
use zstack_core::error::ApiError;
use zstack_core::types::ResourceBase;
use zstack_core::uuid::{
    deserialize_optional, ClusterUuid, DiskOfferingUuid, HostUuid, ImageUuid,
    InstanceOfferingUuid, L3NetworkUuid, NicUuid, PrimaryStorageUuid, VmUuid, VolumeUuid, ZoneUuid,
};

/// Representation of a VM instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VmInstanceInventory {
    /// UUID and timestamps.
    #[serde(flatten)]
    pub base: ResourceBase<VmUuid>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Zone the instance lives in.
    #[serde(
        default,
        deserialize_with = "deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub zone_uuid: Option<ZoneUuid>,
    /// Cluster the instance lives in.
    #[serde(
        default,
        deserialize_with = "deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub cluster_uuid: Option<ClusterUuid>,
    /// Image the root volume was created from.
    #[serde(
        default,
        deserialize_with = "deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_uuid: Option<ImageUuid>,
    /// Host currently running the instance.
    #[serde(
        default,
        deserialize_with = "deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub host_uuid: Option<HostUuid>,
    /// Host that last ran the instance.
    #[serde(
        default,
        deserialize_with = "deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_host_uuid: Option<HostUuid>,
    /// Instance offering (CPU/memory template).
    #[serde(
        default,
        deserialize_with = "deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub instance_offering_uuid: Option<InstanceOfferingUuid>,
    /// Root volume.
    #[serde(
        default,
        deserialize_with = "deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub root_volume_uuid: Option<VolumeUuid>,
    /// Guest platform (Linux, Windows, Other, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Default L3 network.
    #[serde(
        default,
        deserialize_with = "deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_l3_network_uuid: Option<L3NetworkUuid>,
    /// Instance type (UserVm, ApplianceVm).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    /// Hypervisor (KVM, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hypervisor_type: Option<String>,
    /// Memory in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_size: Option<i64>,
    /// Number of vCPUs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_num: Option<i32>,
    /// CPU speed in MHz.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_speed: Option<i64>,
    /// Host allocator strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocator_strategy: Option<String>,
    /// Lifecycle state (Running, Stopped, Starting, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Attached NICs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vm_nics: Vec<VmNic>,
    /// Root and data volumes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_volumes: Vec<Volume>,
}

impl VmInstanceInventory {
    /// Instance UUID, if the server sent one.
    #[must_use]
    pub const fn uuid(&self) -> Option<&VmUuid> {
        self.base.uuid.as_ref()
    }

    /// Returns true if the instance is in the `Running` state.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.as_deref() == Some("Running")
    }

    /// Returns true if the instance is in the `Stopped` state.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state.as_deref() == Some("Stopped")
    }

    /// The root volume, looked up in `all_volumes`.
    #[must_use]
    pub fn root_volume(&self) -> Option<&Volume> {
        let root = self.root_volume_uuid.as_ref()?;
        self.all_volumes
            .iter()
            .find(|volume| volume.base.uuid.as_ref() == Some(root))
    }

    /// IP addresses of all NICs, in device order.
    #[must_use]
    pub fn ips(&self) -> Vec<&str> {
        let mut nics: Vec<&VmNic> = self.vm_nics.iter().collect();
        nics.sort_by_key(|nic| nic.device_id.unwrap_or(i32::MAX));
        nics.iter().filter_map(|nic| nic.ip.as_deref()).collect()
    }
}

/// Network interface attached to a VM instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VmNic {
    /// UUID and timestamps.
    #[serde(flatten)]
    pub base: ResourceBase<NicUuid>,
    /// Owning instance.
    #[serde(
        default,
        deserialize_with = "deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub vm_instance_uuid: Option<VmUuid>,
    /// L3 network the NIC is attached to.
    #[serde(
        default,
        deserialize_with = "deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub l3_network_uuid: Option<L3NetworkUuid>,
    /// IPv4 address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// MAC address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    /// Network mask.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netmask: Option<String>,
    /// Gateway address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    /// Opaque NIC metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_data: Option<String>,
    /// Device index inside the guest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<i32>,
}

/// Volume attached to a VM instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// UUID and timestamps.
    #[serde(flatten)]
    pub base: ResourceBase<VolumeUuid>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Primary storage backing the volume.
    #[serde(
        default,
        deserialize_with = "deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub primary_storage_uuid: Option<PrimaryStorageUuid>,
    /// Owning instance.
    #[serde(
        default,
        deserialize_with = "deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub vm_instance_uuid: Option<VmUuid>,
    /// Disk offering for data volumes.
    #[serde(
        default,
        deserialize_with = "deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub disk_offering_uuid: Option<DiskOfferingUuid>,
    /// Image the volume was created from.
    #[serde(
        default,
        deserialize_with = "deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub root_image_uuid: Option<ImageUuid>,
    /// Storage-specific install path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_path: Option<String>,
    /// Root or Data.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,
    /// Disk format (qcow2, raw, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Virtual size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    /// Allocated size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_size: Option<i64>,
    /// Device index inside the guest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<i32>,
    /// Enabled or Disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Ready, Creating, ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Whether the volume can be attached to several instances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_shareable: Option<bool>,
}

/// Body of `GET /zstack/v1/vm-instances`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct QueryInstanceResponse {
    /// Server error, if the query failed.
    #[serde(default)]
    pub error: Option<ApiError>,
    /// Matching instances.
    #[serde(default)]
    pub inventories: Vec<VmInstanceInventory>,
}

/// Body carrying a single instance, as returned by lookups and finished jobs.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct InstanceResponse {
    /// Server error, if the operation failed.
    #[serde(default)]
    pub error: Option<ApiError>,
    /// The instance.
    #[serde(default)]
    pub inventory: Option<VmInstanceInventory>,
}

/// Lifecycle action sent to `PUT /zstack/v1/vm-instances/{uuid}/actions`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum InstanceAction {
    /// Boot a stopped instance.
    StartVmInstance {},
    /// Shut down a running instance.
    StopVmInstance {},
}

impl InstanceAction {
    /// Action name as it appears on the wire.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::StartVmInstance {} => "startVmInstance",
            Self::StopVmInstance {} => "stopVmInstance",
        }
    }
}
