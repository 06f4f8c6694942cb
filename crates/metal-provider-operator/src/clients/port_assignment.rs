use async_trait::async_trait;
use metal_provider_api::{ApiError, Device, MetalClient, Port};
use metal_provider_crd::{PortAssignmentObservation, PortAssignmentParameters};
#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PortService: Send + Sync {
    async fn get_device(&self, id: &str) -> Result<Device, ApiError>;

    async fn get(&self, id: &str) -> Result<Port, ApiError>;

    async fn assign(&self, id: &str, virtual_network_id: &str) -> Result<Port, ApiError>;

    async fn unassign(&self, id: &str, virtual_network_id: &str) -> Result<Port, ApiError>;
}

#[async_trait]
impl PortService for MetalClient {
    async fn get_device(&self, id: &str) -> Result<Device, ApiError> {
        MetalClient::get_device(self, id).await
    }

    async fn get(&self, id: &str) -> Result<Port, ApiError> {
        self.get_port(id).await
    }

    async fn assign(&self, id: &str, virtual_network_id: &str) -> Result<Port, ApiError> {
        self.assign_port(id, virtual_network_id).await
    }

    async fn unassign(&self, id: &str, virtual_network_id: &str) -> Result<Port, ApiError> {
        self.unassign_port(id, virtual_network_id).await
    }
}

#[must_use]
pub fn generate_observation(port: &Port) -> PortAssignmentObservation {
    PortAssignmentObservation {
        id: port.id.clone(),
        name: port.name.clone(),
        network_type: port.network_type.clone(),
        virtual_network_ids: port.virtual_network_ids().map(str::to_owned).collect(),
    }
}

/// The assignment exists while the virtual network is attached to the port.
#[must_use]
pub fn is_assigned(parameters: &PortAssignmentParameters, port: &Port) -> bool {
    port.virtual_network_ids()
        .any(|id| id == parameters.virtual_network_id)
}
