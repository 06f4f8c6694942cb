use serde::{Deserialize, Serialize};
use tracing::{Level, instrument};

use crate::{ApiError, MetalClient, nullable};

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Project {
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub href: String,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub created_at: String,
    #[serde(deserialize_with = "nullable")]
    pub updated_at: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectCreateRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method_id: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectUpdateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method_id: Option<String>,
}

impl MetalClient {
    #[instrument(skip(self), err(level = Level::DEBUG))]
    pub async fn get_project(&self, id: &str) -> Result<Project, ApiError> {
        self.get(&format!("projects/{id}")).await
    }

    #[instrument(skip(self, request), err(level = Level::DEBUG))]
    pub async fn create_project(&self, request: &ProjectCreateRequest) -> Result<Project, ApiError> {
        self.post("projects", request).await
    }

    #[instrument(skip(self, request), err(level = Level::DEBUG))]
    pub async fn update_project(
        &self,
        id: &str,
        request: &ProjectUpdateRequest,
    ) -> Result<Project, ApiError> {
        self.put(&format!("projects/{id}"), request).await
    }

    #[instrument(skip(self), err(level = Level::DEBUG))]
    pub async fn delete_project(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&format!("projects/{id}"), &[]).await
    }
}
