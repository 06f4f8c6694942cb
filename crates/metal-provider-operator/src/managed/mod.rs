mod connect;

use std::collections::BTreeMap;

use async_trait::async_trait;
use kube::Client;
use metal_provider_api::{ApiError, MetalClient, StatusCode};
use metal_provider_crd::Managed;
#[cfg(test)]
use mockall::automock;

pub use connect::{Config, ConnectError, Credentials, MetalConnecter};

use crate::{
    clients::{MapperError, ObservationError},
    k8s::reference_ext::ReferenceError,
};

/// Keys and values published to the connection secret of a resource.
pub type ConnectionDetails = BTreeMap<String, String>;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExternalObservation {
    pub resource_exists: bool,
    pub resource_up_to_date: bool,
    pub resource_late_initialized: bool,
    pub connection_details: ConnectionDetails,
}

impl ExternalObservation {
    #[must_use]
    pub fn not_exists() -> Self {
        Self::default()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExternalCreation {
    pub connection_details: ConnectionDetails,
}

/// Whether an update pass sent anything to the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalUpdate {
    Sent,
    /// The drift cannot be corrected in place.
    Skipped,
}

#[derive(Debug, thiserror::Error)]
pub enum ExternalError {
    #[error("cannot get {0}: {1}")]
    Get(&'static str, #[source] ApiError),

    #[error("cannot create {0}: {1}")]
    Create(&'static str, #[source] ApiError),

    #[error("cannot update {0}: {1}")]
    Update(&'static str, #[source] ApiError),

    #[error("cannot delete {0}: {1}")]
    Delete(&'static str, #[source] ApiError),

    #[error("cannot observe {0}: {1}")]
    Observation(&'static str, #[source] ObservationError),

    #[error(transparent)]
    Mapper(#[from] MapperError),

    #[error("{0} has no external name.")]
    MissingExternalName(&'static str),

    #[error("Device {device} has no port named {name:?}.")]
    PortNotFound { device: String, name: String },
}

impl ExternalError {
    /// What the remote API answered with, if the request got that far.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Get(_, err)
            | Self::Create(_, err)
            | Self::Update(_, err)
            | Self::Delete(_, err) => err.status(),
            _ => None,
        }
    }
}

/// Lifecycle of one remote object, bound to the credentials it was connected
/// with.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ExternalClient<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    /// Fetches the remote object. Never calls the API when the resource has no
    /// external name.
    async fn observe(&self, object: &mut K) -> Result<ExternalObservation, ExternalError>;

    async fn create(&self, object: &mut K) -> Result<ExternalCreation, ExternalError>;

    async fn update(&self, object: &mut K) -> Result<ExternalUpdate, ExternalError>;

    /// Removing an object that is already gone succeeds.
    async fn delete(&self, object: &mut K) -> Result<(), ExternalError>;
}

/// Fills parameters that point at other managed resources.
#[async_trait]
pub trait ResolveReferences
where
    Self: Managed,
{
    /// Returns whether any parameter was filled in.
    async fn resolve_references(&mut self, _client: &Client) -> Result<bool, ReferenceError> {
        Ok(false)
    }
}

/// Binds a managed kind to its lifecycle implementation.
pub trait Connect
where
    Self: Managed + ResolveReferences,
{
    fn external(client: MetalClient, credentials: &Credentials) -> Box<dyn ExternalClient<Self>>;
}
