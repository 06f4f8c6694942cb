use kube::{
    Api,
    api::{Patch, PatchParams},
};
use metal_provider_crd::{EXTERNAL_CREATE_PENDING_ANNOTATION, EXTERNAL_NAME_ANNOTATION, Managed};
use serde_json::json;
use tracing::{Level, instrument};

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error("Missing resource name.")]
    ResourceName,
}

/// Persists changes the lifecycle made to a managed object outside its status.
pub trait PatchExt<K> {
    async fn patch_for_provider(&self, object: &K) -> Result<(), PatchError>;

    /// Writes the external name and create-pending annotations. Absent ones
    /// are removed.
    async fn patch_annotations(&self, object: &K) -> Result<(), PatchError>;
}

impl<K> PatchExt<K> for Api<K>
where
    K: Managed,
{
    #[instrument(skip_all, fields(name = object.meta().name), err(level = Level::WARN))]
    async fn patch_for_provider(&self, object: &K) -> Result<(), PatchError> {
        let patch = json!({
            "spec": {
                "forProvider": object.for_provider(),
            },
        });

        merge(self, object, &patch).await
    }

    #[instrument(skip_all, fields(name = object.meta().name), err(level = Level::WARN))]
    async fn patch_annotations(&self, object: &K) -> Result<(), PatchError> {
        let patch = json!({
            "metadata": {
                "annotations": {
                    (EXTERNAL_NAME_ANNOTATION): object.external_name(),
                    (EXTERNAL_CREATE_PENDING_ANNOTATION): object.create_pending(),
                },
            },
        });

        merge(self, object, &patch).await
    }
}

async fn merge<K>(api: &Api<K>, object: &K, patch: &serde_json::Value) -> Result<(), PatchError>
where
    K: Managed,
{
    let name = object
        .meta()
        .name
        .as_deref()
        .ok_or(PatchError::ResourceName)?;

    api.patch(name, &PatchParams::default(), &Patch::Merge(patch))
        .await?;

    Ok(())
}
