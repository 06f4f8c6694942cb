use std::fmt::Debug;

use kube::{
    Api,
    api::{Patch, PatchParams},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{Level, instrument};

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error("Missing resource name.")]
    ResourceName,
}

pub trait ApplyExt<K> {
    async fn apply_object(&self, patch: &K) -> Result<K, ApplyError>;
}

impl<K> ApplyExt<K> for Api<K>
where
    K: kube::Resource + Clone + Debug + Serialize + DeserializeOwned,
{
    #[instrument(skip_all, fields(name = patch.meta().name), err(level = Level::WARN))]
    async fn apply_object(&self, patch: &K) -> Result<K, ApplyError> {
        let name = patch
            .meta()
            .name
            .clone()
            .ok_or(ApplyError::ResourceName)?;
        let params = PatchParams::apply("metal-provider-operator").force();

        Ok(self.patch(&name, &params, &Patch::Apply(patch)).await?)
    }
}
