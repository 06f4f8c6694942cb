use async_trait::async_trait;
use metal_provider_api::{
    ApiError, MetalClient, VirtualNetwork, VirtualNetworkCreateRequest, VirtualNetworkUpdateRequest,
};
use metal_provider_crd::{VirtualNetworkObservation, VirtualNetworkParameters};
#[cfg(test)]
use mockall::automock;

use crate::clients::{
    ObservationError, late_initialize, non_empty, parse_time, unset_or_equal,
};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait VirtualNetworkService: Send + Sync {
    async fn get(&self, id: &str) -> Result<VirtualNetwork, ApiError>;

    async fn create(
        &self,
        project_id: &str,
        request: &VirtualNetworkCreateRequest,
    ) -> Result<VirtualNetwork, ApiError>;

    async fn update(
        &self,
        id: &str,
        request: &VirtualNetworkUpdateRequest,
    ) -> Result<VirtualNetwork, ApiError>;

    async fn delete(&self, id: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl VirtualNetworkService for MetalClient {
    async fn get(&self, id: &str) -> Result<VirtualNetwork, ApiError> {
        self.get_virtual_network(id).await
    }

    async fn create(
        &self,
        project_id: &str,
        request: &VirtualNetworkCreateRequest,
    ) -> Result<VirtualNetwork, ApiError> {
        self.create_virtual_network(project_id, request).await
    }

    async fn update(
        &self,
        id: &str,
        request: &VirtualNetworkUpdateRequest,
    ) -> Result<VirtualNetwork, ApiError> {
        self.update_virtual_network(id, request).await
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.delete_virtual_network(id).await
    }
}

#[must_use]
pub fn create_request(parameters: &VirtualNetworkParameters) -> VirtualNetworkCreateRequest {
    VirtualNetworkCreateRequest {
        facility: parameters.facility.clone(),
        metro: parameters.metro.clone(),
        description: parameters.description.clone().unwrap_or_default(),
    }
}

#[must_use]
pub fn update_request(parameters: &VirtualNetworkParameters) -> VirtualNetworkUpdateRequest {
    VirtualNetworkUpdateRequest {
        description: parameters.description.clone(),
    }
}

pub fn generate_observation(
    network: &VirtualNetwork,
) -> Result<VirtualNetworkObservation, ObservationError> {
    Ok(VirtualNetworkObservation {
        id: network.id.clone(),
        href: network.href.clone(),
        vxlan: network.vxlan,
        facility_code: network.facility_code.clone(),
        metro_code: network.metro_code.clone(),
        created_at: parse_time(&network.created_at)?,
    })
}

pub fn late_initialize_parameters(
    parameters: &mut VirtualNetworkParameters,
    network: &VirtualNetwork,
) -> bool {
    late_initialize(&mut parameters.description, non_empty(&network.description))
}

/// Location is fixed at creation, so only the description counts as drift.
#[must_use]
pub fn is_up_to_date(parameters: &VirtualNetworkParameters, network: &VirtualNetwork) -> bool {
    unset_or_equal(
        parameters.description.as_deref(),
        network.description.as_str(),
    )
}
