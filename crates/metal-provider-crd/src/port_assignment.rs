use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{ManagedStatus, Reference, ResourceSpec, Selector, managed::managed};

pub type PortAssignmentStatus = ManagedStatus<PortAssignmentObservation>;

/// Attaches a virtual network to one port of a device. The external name is
/// the identifier of the port.
#[derive(Debug, Default, Clone, CustomResource, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ports.metal.equinix.com",
    version = "v1alpha1",
    kind = "PortAssignment",
    status = PortAssignmentStatus,
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"Port", "type":"string", "jsonPath":".spec.forProvider.name"}"#,
)]
#[serde(rename_all = "camelCase")]
pub struct PortAssignmentSpec {
    #[serde(flatten)]
    pub resource: ResourceSpec,
    pub for_provider: PortAssignmentParameters,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PortAssignmentParameters {
    /// Resolved from `deviceIdRef` or `deviceIdSelector` when empty.
    #[serde(rename = "deviceID", default)]
    pub device_id: String,

    /// A Device whose `status.atProvider.id` fills `deviceID`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id_ref: Option<Reference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id_selector: Option<Selector>,

    /// Port name on the device, such as `eth1` or `bond0`.
    pub name: String,

    /// Resolved from `virtualNetworkIdRef` or `virtualNetworkIdSelector` when
    /// empty.
    #[serde(rename = "virtualNetworkID", default)]
    pub virtual_network_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_network_id_ref: Option<Reference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_network_id_selector: Option<Selector>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct PortAssignmentObservation {
    pub id: String,
    pub name: String,
    pub network_type: String,
    #[serde(rename = "virtualNetworkIDs")]
    pub virtual_network_ids: Vec<String>,
}

managed!(
    PortAssignment,
    PortAssignmentParameters,
    PortAssignmentObservation
);
