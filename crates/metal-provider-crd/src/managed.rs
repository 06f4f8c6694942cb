use std::fmt::Debug;

use k8s_openapi::{ClusterResourceScope, jiff::Timestamp};
use kube::Resource;
use serde::{Serialize, de::DeserializeOwned};

use crate::{Condition, ManagedStatus, ResourceSpec};

/// Annotation holding the identifier the remote API assigned to an object.
pub const EXTERNAL_NAME_ANNOTATION: &str = "metal.equinix.com/external-name";

/// Set from just before a create call until its external name is recorded.
pub const EXTERNAL_CREATE_PENDING_ANNOTATION: &str = "metal.equinix.com/external-create-pending";

/// A cluster scoped resource whose `spec.forProvider` is reconciled against the
/// remote API and whose `status.atProvider` mirrors what was last observed.
pub trait Managed
where
    Self: Resource<DynamicType = (), Scope = ClusterResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    type Parameters: Clone + Debug + Serialize + Send + Sync;
    type Observation: Clone + Debug + Default + Serialize + Send + Sync;

    fn resource_spec(&self) -> &ResourceSpec;

    fn for_provider(&self) -> &Self::Parameters;

    fn for_provider_mut(&mut self) -> &mut Self::Parameters;

    fn managed_status(&self) -> Option<&ManagedStatus<Self::Observation>>;

    fn managed_status_mut(&mut self) -> &mut ManagedStatus<Self::Observation>;

    /// The remote identifier, if the object was created already.
    fn external_name(&self) -> Option<&str> {
        self.meta()
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(EXTERNAL_NAME_ANNOTATION))
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    fn set_external_name(&mut self, name: &str) {
        self.meta_mut()
            .annotations
            .get_or_insert_default()
            .insert(EXTERNAL_NAME_ANNOTATION.to_owned(), name.to_owned());
    }

    /// When a create call started whose outcome was never recorded.
    fn create_pending(&self) -> Option<&str> {
        self.meta()
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(EXTERNAL_CREATE_PENDING_ANNOTATION))
            .map(String::as_str)
            .filter(|since| !since.is_empty())
    }

    fn set_create_pending(&mut self, pending: bool) {
        let annotations = self.meta_mut().annotations.get_or_insert_default();

        if pending {
            annotations.insert(
                EXTERNAL_CREATE_PENDING_ANNOTATION.to_owned(),
                Timestamp::now().to_string(),
            );
        } else {
            annotations.remove(EXTERNAL_CREATE_PENDING_ANNOTATION);
        }
    }

    fn at_provider_mut(&mut self) -> &mut Self::Observation {
        &mut self.managed_status_mut().at_provider
    }

    fn set_condition(&mut self, mut condition: Condition) {
        condition.observed_generation = self.meta().generation;
        self.managed_status_mut().set_condition(condition);
    }
}

macro_rules! managed {
    ($kind:ty, $parameters:ty, $observation:ty) => {
        impl $crate::Managed for $kind {
            type Parameters = $parameters;
            type Observation = $observation;

            fn resource_spec(&self) -> &$crate::ResourceSpec {
                &self.spec.resource
            }

            fn for_provider(&self) -> &Self::Parameters {
                &self.spec.for_provider
            }

            fn for_provider_mut(&mut self) -> &mut Self::Parameters {
                &mut self.spec.for_provider
            }

            fn managed_status(&self) -> Option<&$crate::ManagedStatus<Self::Observation>> {
                self.status.as_ref()
            }

            fn managed_status_mut(&mut self) -> &mut $crate::ManagedStatus<Self::Observation> {
                self.status.get_or_insert_with(Default::default)
            }
        }
    };
}

pub(crate) use managed;
