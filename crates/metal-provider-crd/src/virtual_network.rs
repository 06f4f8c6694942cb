use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{ManagedStatus, ResourceSpec, managed::managed};

pub type VirtualNetworkStatus = ManagedStatus<VirtualNetworkObservation>;

#[derive(Debug, Default, Clone, CustomResource, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "vlan.metal.equinix.com",
    version = "v1alpha1",
    kind = "VirtualNetwork",
    status = VirtualNetworkStatus,
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"VXLAN", "type":"integer", "jsonPath":".status.atProvider.vxlan"}"#,
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkSpec {
    #[serde(flatten)]
    pub resource: ResourceSpec,
    pub for_provider: VirtualNetworkParameters,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facility: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metro: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct VirtualNetworkObservation {
    pub id: String,
    pub href: String,
    pub vxlan: i32,
    pub facility_code: String,
    pub metro_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Time>,
}

managed!(
    VirtualNetwork,
    VirtualNetworkParameters,
    VirtualNetworkObservation
);
