use async_trait::async_trait;
use metal_provider_api::{ApiError, MetalClient, SshKey, SshKeyCreateRequest, SshKeyUpdateRequest};
use metal_provider_crd::{SSHKeyObservation, SSHKeyParameters};
#[cfg(test)]
use mockall::automock;

use crate::clients::{ObservationError, late_initialize, non_empty, parse_time};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SshKeyService: Send + Sync {
    async fn get(&self, id: &str) -> Result<SshKey, ApiError>;

    async fn create(
        &self,
        project_id: &str,
        request: &SshKeyCreateRequest,
    ) -> Result<SshKey, ApiError>;

    async fn update(&self, id: &str, request: &SshKeyUpdateRequest) -> Result<SshKey, ApiError>;

    async fn delete(&self, id: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl SshKeyService for MetalClient {
    async fn get(&self, id: &str) -> Result<SshKey, ApiError> {
        self.get_ssh_key(id).await
    }

    async fn create(
        &self,
        project_id: &str,
        request: &SshKeyCreateRequest,
    ) -> Result<SshKey, ApiError> {
        self.create_ssh_key(project_id, request).await
    }

    async fn update(&self, id: &str, request: &SshKeyUpdateRequest) -> Result<SshKey, ApiError> {
        self.update_ssh_key(id, request).await
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.delete_ssh_key(id).await
    }
}

#[must_use]
pub fn create_request(parameters: &SSHKeyParameters) -> SshKeyCreateRequest {
    SshKeyCreateRequest {
        label: parameters.label.clone().unwrap_or_default(),
        key: parameters.key.clone(),
    }
}

#[must_use]
pub fn update_request(parameters: &SSHKeyParameters) -> SshKeyUpdateRequest {
    SshKeyUpdateRequest {
        label: parameters.label.clone(),
        key: None,
    }
}

pub fn generate_observation(key: &SshKey) -> Result<SSHKeyObservation, ObservationError> {
    Ok(SSHKeyObservation {
        id: key.id.clone(),
        href: key.href.clone(),
        fingerprint: key.fingerprint.clone(),
        label: key.label.clone(),
        key: key.key.clone(),
        created_at: parse_time(&key.created_at)?,
        updated_at: parse_time(&key.updated_at)?,
    })
}

pub fn late_initialize_parameters(parameters: &mut SSHKeyParameters, key: &SshKey) -> bool {
    late_initialize(&mut parameters.label, non_empty(&key.label))
}

#[must_use]
pub fn is_up_to_date(parameters: &SSHKeyParameters, key: &SshKey) -> bool {
    parameters
        .label
        .as_ref()
        .is_none_or(|label| *label == key.label)
}
