use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{ManagedStatus, Reference, ResourceSpec, Selector, managed::managed};

pub type SSHKeyStatus = ManagedStatus<SSHKeyObservation>;

#[derive(Debug, Default, Clone, CustomResource, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "project.metal.equinix.com",
    version = "v1alpha1",
    kind = "SSHKey",
    status = SSHKeyStatus,
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"Fingerprint", "type":"string", "jsonPath":".status.atProvider.fingerprint"}"#,
)]
#[serde(rename_all = "camelCase")]
pub struct SSHKeySpec {
    #[serde(flatten)]
    pub resource: ResourceSpec,
    pub for_provider: SSHKeyParameters,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SSHKeyParameters {
    /// Project owning the key. Falls back to the project of the credentials.
    #[serde(rename = "projectID", default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// A Project whose `status.atProvider.id` fills `projectID`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id_ref: Option<Reference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id_selector: Option<Selector>,

    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct SSHKeyObservation {
    pub id: String,
    pub href: String,
    pub fingerprint: String,
    pub label: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Time>,
}

managed!(SSHKey, SSHKeyParameters, SSHKeyObservation);
