use std::fmt::Debug;

use k8s_openapi::api::core::v1::Secret;
use kube::{Resource, ResourceExt as _};
use tracing::{Level, instrument};

use crate::k8s::labels::{MANAGED_BY_KEY, MANAGED_BY_VALUE};

#[derive(Debug, thiserror::Error)]
pub enum OwnerError {
    #[error("Could not take owner reference.")]
    OwnerRef,
}

pub trait OwnerExt {
    /// Makes `owner` the controller of this object, so it is garbage collected
    /// together with it.
    fn add_owner<O>(&mut self, owner: &O) -> Result<(), OwnerError>
    where
        O: Resource<DynamicType = ()> + Debug;
}

impl OwnerExt for Secret {
    #[instrument(skip_all, err(level = Level::WARN))]
    fn add_owner<O>(&mut self, owner: &O) -> Result<(), OwnerError>
    where
        O: Resource<DynamicType = ()> + Debug,
    {
        let owner_ref = owner
            .controller_owner_ref(&())
            .ok_or(OwnerError::OwnerRef)?;

        self.owner_references_mut().push(owner_ref);
        self.labels_mut()
            .insert(MANAGED_BY_KEY.into(), MANAGED_BY_VALUE.into());

        Ok(())
    }
}
