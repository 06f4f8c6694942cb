mod device;
mod managed;
mod port_assignment;
mod project;
mod provider_config;
mod spot_market;
mod ssh_key;
mod virtual_network;

use std::collections::BTreeMap;

pub use device::{
    Device, DeviceObservation, DeviceParameters, DeviceSpec, DeviceStatus, IpAddressRequest,
};
use k8s_openapi::{apimachinery::pkg::apis::meta::v1::Time, jiff::Timestamp};
pub use managed::{EXTERNAL_CREATE_PENDING_ANNOTATION, EXTERNAL_NAME_ANNOTATION, Managed};
pub use port_assignment::{
    PortAssignment, PortAssignmentObservation, PortAssignmentParameters, PortAssignmentSpec,
    PortAssignmentStatus,
};
pub use project::{Project, ProjectObservation, ProjectParameters, ProjectSpec, ProjectStatus};
pub use provider_config::{ProviderConfig, ProviderConfigSpec, ProviderCredentials};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
pub use spot_market::{
    SpotMarketRequest, SpotMarketRequestAttributes, SpotMarketRequestObservation,
    SpotMarketRequestParameters, SpotMarketRequestSpec, SpotMarketRequestStatus,
};
pub use ssh_key::{SSHKey, SSHKeyObservation, SSHKeyParameters, SSHKeySpec, SSHKeyStatus};
pub use virtual_network::{
    VirtualNetwork, VirtualNetworkObservation, VirtualNetworkParameters, VirtualNetworkSpec,
    VirtualNetworkStatus,
};

/// Fields shared by the spec of every managed resource.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config_ref: Option<Reference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_connection_secret_to_ref: Option<SecretReference>,

    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
}

/// Names another cluster scoped resource.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Reference {
    pub name: String,
}

/// Picks another resource by its labels.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
}

impl Selector {
    /// The label selector query understood by the Kubernetes API.
    #[must_use]
    pub fn to_label_selector(&self) -> String {
        self.match_labels
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SecretReference {
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SecretKeySelector {
    pub namespace: String,
    pub name: String,
    pub key: String,
}

/// What happens to the remote object once its managed resource is deleted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum DeletionPolicy {
    #[default]
    Delete,
    Orphan,
}

/// Status shared by every managed resource, generic over the observed state.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedStatus<O>
where
    O: Default,
{
    #[serde(default)]
    pub at_provider: O,

    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl<O> ManagedStatus<O>
where
    O: Default,
{
    #[must_use]
    pub fn condition(&self, type_: Type) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|condition| condition.type_ == type_)
    }

    /// Replaces the condition of the same type. The transition time is kept
    /// when neither status nor reason changed.
    pub fn set_condition(&mut self, mut condition: Condition) {
        match self
            .conditions
            .iter_mut()
            .find(|current| current.type_ == condition.type_)
        {
            Some(current) => {
                if current.status == condition.status && current.reason == condition.reason {
                    condition.last_transition_time = current.last_transition_time.clone();
                }

                *current = condition;
            }
            None => self.conditions.push(condition),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub last_transition_time: Time,
    pub observed_generation: Option<i64>,
    pub status: Status,
    #[serde(rename = "type")]
    pub type_: Type,
    pub reason: Reason,
    pub message: String,
}

impl Condition {
    #[must_use]
    pub fn new(type_: Type, status: Status, reason: Reason, message: String) -> Self {
        Self {
            last_transition_time: Time(Timestamp::now()),
            observed_generation: None,
            status,
            type_,
            reason,
            message,
        }
    }

    #[must_use]
    pub fn creating() -> Self {
        Self::new(Type::Ready, Status::False, Reason::Creating, String::new())
    }

    #[must_use]
    pub fn available() -> Self {
        Self::new(Type::Ready, Status::True, Reason::Available, String::new())
    }

    #[must_use]
    pub fn unavailable() -> Self {
        Self::new(Type::Ready, Status::False, Reason::Unavailable, String::new())
    }

    #[must_use]
    pub fn deleting() -> Self {
        Self::new(Type::Ready, Status::False, Reason::Deleting, String::new())
    }

    #[must_use]
    pub fn reconcile_success() -> Self {
        Self::new(
            Type::Synced,
            Status::True,
            Reason::ReconcileSuccess,
            String::new(),
        )
    }

    #[must_use]
    pub fn reconcile_error(message: String) -> Self {
        Self::new(Type::Synced, Status::False, Reason::ReconcileError, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Reason {
    Creating,
    Available,
    Unavailable,
    Deleting,
    ReconcileSuccess,
    ReconcileError,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Status {
    True,
    False,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Type {
    Ready,
    Synced,
    #[serde(other)]
    Unknown,
}
