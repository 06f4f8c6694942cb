use itertools::Itertools as _;
use kube::{Api, api::PostParams};
use metal_provider_crd::Managed;
use tracing::{Level, instrument};

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error("Missing resource name.")]
    ResourceName,
}

pub trait StatusExt<K> {
    /// Writes the status of `object`. Conditions the object does not carry are
    /// kept from the stored status.
    async fn set_status(&self, object: &K) -> Result<(), StatusError>;
}

impl<K> StatusExt<K> for Api<K>
where
    K: Managed,
{
    #[instrument(skip_all, fields(name = object.meta().name), err(level = Level::WARN))]
    async fn set_status(&self, object: &K) -> Result<(), StatusError> {
        let Some(mut status) = object.managed_status().cloned() else {
            return Ok(());
        };

        let name = object
            .meta()
            .name
            .as_deref()
            .ok_or(StatusError::ResourceName)?;
        let params = PostParams::default();

        let mut current = self.get_status(name).await?;

        status.conditions = status
            .conditions
            .into_iter()
            .chain(
                current
                    .managed_status()
                    .map(|status| status.conditions.clone())
                    .unwrap_or_default(),
            )
            .unique_by(|condition| condition.type_)
            .collect();

        *current.managed_status_mut() = status;

        self.replace_status(name, &params, &current).await?;
        Ok(())
    }
}
