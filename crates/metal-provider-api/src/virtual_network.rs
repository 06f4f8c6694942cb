use serde::{Deserialize, Serialize};
use tracing::{Level, instrument};

use crate::{ApiError, MetalClient, nullable};

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VirtualNetwork {
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub href: String,
    #[serde(deserialize_with = "nullable")]
    pub description: String,
    pub vxlan: i32,
    #[serde(deserialize_with = "nullable")]
    pub facility_code: String,
    #[serde(deserialize_with = "nullable")]
    pub metro_code: String,
    #[serde(deserialize_with = "nullable")]
    pub created_at: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualNetworkCreateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metro: Option<String>,
    pub description: String,
}

/// Only the description of a virtual network can change after creation.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualNetworkUpdateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MetalClient {
    #[instrument(skip(self), err(level = Level::DEBUG))]
    pub async fn get_virtual_network(&self, id: &str) -> Result<VirtualNetwork, ApiError> {
        self.get(&format!("virtual-networks/{id}")).await
    }

    #[instrument(skip(self, request), err(level = Level::DEBUG))]
    pub async fn create_virtual_network(
        &self,
        project_id: &str,
        request: &VirtualNetworkCreateRequest,
    ) -> Result<VirtualNetwork, ApiError> {
        self.post(&format!("projects/{project_id}/virtual-networks"), request)
            .await
    }

    #[instrument(skip(self, request), err(level = Level::DEBUG))]
    pub async fn update_virtual_network(
        &self,
        id: &str,
        request: &VirtualNetworkUpdateRequest,
    ) -> Result<VirtualNetwork, ApiError> {
        self.put(&format!("virtual-networks/{id}"), request).await
    }

    #[instrument(skip(self), err(level = Level::DEBUG))]
    pub async fn delete_virtual_network(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&format!("virtual-networks/{id}"), &[]).await
    }
}
