use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::{api::resource::Quantity, apis::meta::v1::Time};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{ManagedStatus, ResourceSpec, managed::managed};

pub type DeviceStatus = ManagedStatus<DeviceObservation>;

#[derive(Debug, Default, Clone, CustomResource, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "server.metal.equinix.com",
    version = "v1alpha2",
    kind = "Device",
    status = DeviceStatus,
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.atProvider.state"}"#,
    printcolumn = r#"{"name":"IPv4", "type":"string", "jsonPath":".status.atProvider.ipv4"}"#,
)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSpec {
    #[serde(flatten)]
    pub resource: ResourceSpec,
    pub for_provider: DeviceParameters,
}

/// Desired configuration of a device. Plan, facility, operating system and SSH
/// keys cannot change once the device exists.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    pub plan: String,

    /// Falls back to the facility of the credentials when empty.
    #[serde(default)]
    pub facility: String,

    pub operating_system: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_cycle: Option<String>,

    #[serde(rename = "userdata", default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipxe_script_url: Option<String>,

    #[serde(
        rename = "publicIPv4SubnetSize",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub public_ipv4_subnet_size: Option<i32>,

    #[serde(rename = "alwaysPXE", default, skip_serializing_if = "Option::is_none")]
    pub always_pxe: Option<bool>,

    #[serde(
        rename = "hardwareReservationID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub hardware_reservation_id: Option<String>,

    #[serde(rename = "userSSHKeys", default, skip_serializing_if = "Vec::is_empty")]
    pub user_ssh_keys: Vec<String>,

    #[serde(
        rename = "projectSSHKeys",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub project_ssh_keys: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub features: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_addresses: Vec<IpAddressRequest>,

    /// One of `layer3`, `hybrid`, `layer2-bonded` or `layer2-individual`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IpAddressRequest {
    pub address_family: i32,
    pub public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_reservations: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceObservation {
    pub id: String,
    pub href: String,
    pub hostname: String,
    pub description: String,
    pub tags: Vec<String>,
    pub state: String,
    pub provision_percentage: Quantity,
    pub ipv4: String,
    pub locked: bool,
    pub billing_cycle: String,
    pub network_type: String,
    pub facility: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Time>,
}

managed!(Device, DeviceParameters, DeviceObservation);

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parameters_keep_unset_apart_from_false() {
        let parameters: DeviceParameters = serde_json::from_value(json!({
            "plan": "c3.small.x86",
            "facility": "ny5",
            "operatingSystem": "ubuntu_22_04",
            "locked": false,
        }))
        .unwrap();

        assert_eq!(parameters.locked, Some(false));
        assert_eq!(parameters.always_pxe, None);
        assert_eq!(parameters.tags, None);
    }

    #[test]
    fn spec_flattens_resource_fields() {
        let spec: DeviceSpec = serde_json::from_value(json!({
            "providerConfigRef": { "name": "default" },
            "deletionPolicy": "Orphan",
            "forProvider": {
                "plan": "c3.small.x86",
                "facility": "ny5",
                "operatingSystem": "ubuntu_22_04",
            },
        }))
        .unwrap();

        assert_eq!(
            spec.resource.provider_config_ref.map(|r| r.name).as_deref(),
            Some("default")
        );
        assert_eq!(spec.resource.deletion_policy, crate::DeletionPolicy::Orphan);
    }
}
