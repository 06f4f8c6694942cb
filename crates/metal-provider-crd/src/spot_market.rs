use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{ManagedStatus, ResourceSpec, managed::managed};

pub type SpotMarketRequestStatus = ManagedStatus<SpotMarketRequestObservation>;

#[derive(Debug, Default, Clone, CustomResource, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "spotmarket.metal.equinix.com",
    version = "v1alpha1",
    kind = "SpotMarketRequest",
    status = SpotMarketRequestStatus,
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
)]
#[serde(rename_all = "camelCase")]
pub struct SpotMarketRequestSpec {
    #[serde(flatten)]
    pub resource: ResourceSpec,
    pub for_provider: SpotMarketRequestParameters,
}

/// A spot market request cannot be changed after it was placed.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpotMarketRequestParameters {
    pub devices_max: i32,

    pub devices_min: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_at: Option<Time>,

    pub facilities: Vec<String>,

    /// Maximum hourly bid in US dollars, as a decimal number.
    pub max_bid_price: String,

    pub attributes: SpotMarketRequestAttributes,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpotMarketRequestAttributes {
    #[serde(rename = "alwaysPXE", default)]
    pub always_pxe: bool,

    pub billing_cycle: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub features: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hostnames: Vec<String>,

    #[serde(default)]
    pub locked: bool,

    pub operating_system: String,

    pub plan: String,

    #[serde(
        rename = "projectSSHKeys",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub project_ssh_keys: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_time: Option<Time>,

    #[serde(rename = "userSSHKeys", default, skip_serializing_if = "Vec::is_empty")]
    pub user_ssh_keys: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct SpotMarketRequestObservation {
    pub id: String,
    pub href: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Time>,
    #[serde(rename = "deviceIDs")]
    pub device_ids: Vec<String>,
}

managed!(
    SpotMarketRequest,
    SpotMarketRequestParameters,
    SpotMarketRequestObservation
);
