//! Thin client for the parts of the Equinix Metal REST API the provider
//! reconciles against.

mod client;
mod device;
mod error;
mod port;
mod project;
mod spot_market;
mod ssh_key;
mod virtual_network;

pub use client::MetalClient;
pub use device::{
    Device, DeviceCreateRequest, DeviceUpdateRequest, Facility, IpAddress, IpAddressCreateRequest,
    Slug,
};
pub use error::ApiError;
pub use port::{NETWORK_TYPES, Port, PortData};
pub use project::{Project, ProjectCreateRequest, ProjectUpdateRequest};
pub use reqwest::StatusCode;
use serde::{Deserialize, Deserializer};
pub use spot_market::{
    SpotMarketInstanceParameters, SpotMarketRequest, SpotMarketRequestCreateRequest,
};
pub use ssh_key::{SshKey, SshKeyCreateRequest, SshKeyUpdateRequest};
pub use virtual_network::{
    VirtualNetwork, VirtualNetworkCreateRequest, VirtualNetworkUpdateRequest,
};

/// Link to another API object, e.g. `{"href": "/metal/v1/virtual-networks/<id>"}`.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct Href {
    pub href: String,
}

impl Href {
    /// The trailing path segment of the link.
    #[must_use]
    pub fn id(&self) -> &str {
        self.href.rsplit('/').next().unwrap_or(&self.href)
    }
}

/// The API sends `null` for many unset strings and lists.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
