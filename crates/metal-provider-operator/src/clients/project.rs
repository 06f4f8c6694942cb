use async_trait::async_trait;
use metal_provider_api::{
    ApiError, MetalClient, Project, ProjectCreateRequest, ProjectUpdateRequest,
};
use metal_provider_crd::{ProjectObservation, ProjectParameters};
#[cfg(test)]
use mockall::automock;

use crate::clients::{ObservationError, parse_time};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProjectService: Send + Sync {
    async fn get(&self, id: &str) -> Result<Project, ApiError>;

    async fn create(&self, request: &ProjectCreateRequest) -> Result<Project, ApiError>;

    async fn update(&self, id: &str, request: &ProjectUpdateRequest)
    -> Result<Project, ApiError>;

    async fn delete(&self, id: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl ProjectService for MetalClient {
    async fn get(&self, id: &str) -> Result<Project, ApiError> {
        self.get_project(id).await
    }

    async fn create(&self, request: &ProjectCreateRequest) -> Result<Project, ApiError> {
        self.create_project(request).await
    }

    async fn update(
        &self,
        id: &str,
        request: &ProjectUpdateRequest,
    ) -> Result<Project, ApiError> {
        self.update_project(id, request).await
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.delete_project(id).await
    }
}

#[must_use]
pub fn create_request(parameters: &ProjectParameters) -> ProjectCreateRequest {
    ProjectCreateRequest {
        name: parameters.name.clone(),
        organization_id: parameters.organization_id.clone(),
        payment_method_id: parameters.payment_method_id.clone(),
    }
}

#[must_use]
pub fn update_request(parameters: &ProjectParameters) -> ProjectUpdateRequest {
    ProjectUpdateRequest {
        name: Some(parameters.name.clone()),
        payment_method_id: parameters.payment_method_id.clone(),
    }
}

pub fn generate_observation(project: &Project) -> Result<ProjectObservation, ObservationError> {
    Ok(ProjectObservation {
        id: project.id.clone(),
        href: project.href.clone(),
        name: project.name.clone(),
        created_at: parse_time(&project.created_at)?,
        updated_at: parse_time(&project.updated_at)?,
    })
}

#[must_use]
pub fn is_up_to_date(parameters: &ProjectParameters, project: &Project) -> bool {
    parameters.name == project.name
}
