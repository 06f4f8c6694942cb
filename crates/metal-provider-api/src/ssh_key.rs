use serde::{Deserialize, Serialize};
use tracing::{Level, instrument};

use crate::{ApiError, MetalClient, nullable};

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SshKey {
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub href: String,
    #[serde(deserialize_with = "nullable")]
    pub label: String,
    #[serde(deserialize_with = "nullable")]
    pub key: String,
    #[serde(deserialize_with = "nullable")]
    pub fingerprint: String,
    #[serde(deserialize_with = "nullable")]
    pub created_at: String,
    #[serde(deserialize_with = "nullable")]
    pub updated_at: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SshKeyCreateRequest {
    pub label: String,
    pub key: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SshKeyUpdateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl MetalClient {
    #[instrument(skip(self), err(level = Level::DEBUG))]
    pub async fn get_ssh_key(&self, id: &str) -> Result<SshKey, ApiError> {
        self.get(&format!("ssh-keys/{id}")).await
    }

    /// Creates a project key, or a user key when `project_id` is empty.
    #[instrument(skip(self, request), err(level = Level::DEBUG))]
    pub async fn create_ssh_key(
        &self,
        project_id: &str,
        request: &SshKeyCreateRequest,
    ) -> Result<SshKey, ApiError> {
        if project_id.is_empty() {
            self.post("ssh-keys", request).await
        } else {
            self.post(&format!("projects/{project_id}/ssh-keys"), request)
                .await
        }
    }

    #[instrument(skip(self, request), err(level = Level::DEBUG))]
    pub async fn update_ssh_key(
        &self,
        id: &str,
        request: &SshKeyUpdateRequest,
    ) -> Result<SshKey, ApiError> {
        self.put(&format!("ssh-keys/{id}"), request).await
    }

    #[instrument(skip(self), err(level = Level::DEBUG))]
    pub async fn delete_ssh_key(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&format!("ssh-keys/{id}"), &[]).await
    }
}
