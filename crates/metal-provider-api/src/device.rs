use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{Level, debug, instrument};

use crate::{ApiError, MetalClient, Port, nullable, port::NETWORK_TYPE_KEY_PORT};

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Device {
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub href: String,
    #[serde(deserialize_with = "nullable")]
    pub hostname: String,
    #[serde(deserialize_with = "nullable")]
    pub description: String,
    #[serde(deserialize_with = "nullable")]
    pub state: String,
    #[serde(deserialize_with = "nullable")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub billing_cycle: String,
    #[serde(deserialize_with = "nullable")]
    pub userdata: String,
    pub locked: bool,
    pub always_pxe: bool,
    #[serde(deserialize_with = "nullable")]
    pub ipxe_script_url: String,
    #[serde(deserialize_with = "nullable")]
    pub provisioning_percentage: f64,
    #[serde(deserialize_with = "nullable")]
    pub created_at: String,
    #[serde(deserialize_with = "nullable")]
    pub updated_at: String,
    /// Only returned during the first 24 hours after provisioning.
    #[serde(deserialize_with = "nullable")]
    pub root_password: String,
    pub plan: Option<Slug>,
    pub operating_system: Option<Slug>,
    pub facility: Option<Facility>,
    #[serde(deserialize_with = "nullable")]
    pub ip_addresses: Vec<IpAddress>,
    #[serde(deserialize_with = "nullable")]
    pub network_ports: Vec<Port>,
}

impl Device {
    /// First public IPv4 address assigned to the device.
    #[must_use]
    pub fn public_ipv4(&self) -> Option<&IpAddress> {
        self.ip_addresses
            .iter()
            .find(|address| address.public && address.address_family == 4)
    }

    /// The network type, as reported by the bond port. Empty when the device
    /// has no bond port.
    #[must_use]
    pub fn network_type(&self) -> String {
        self.port(NETWORK_TYPE_KEY_PORT)
            .map(|port| port.network_type.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn port(&self, name: &str) -> Option<&Port> {
        self.network_ports.iter().find(|port| port.name == name)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct Slug {
    #[serde(default)]
    pub slug: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct Facility {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IpAddress {
    pub address: String,
    pub address_family: i32,
    pub public: bool,
    pub cidr: i32,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DeviceCreateRequest {
    pub hostname: String,
    pub plan: String,
    pub facility: Vec<String>,
    pub operating_system: String,
    pub billing_cycle: String,
    pub userdata: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customdata: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub always_pxe: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipxe_script_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware_reservation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ipv4_subnet_size: Option<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_ssh_keys: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub project_ssh_keys: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub features: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ip_addresses: Vec<IpAddressCreateRequest>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IpAddressCreateRequest {
    pub address_family: i32,
    pub public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr: Option<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ip_reservations: Vec<String>,
}

/// Only fields that are `Some` are changed.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DeviceUpdateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userdata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub always_pxe: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipxe_script_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customdata: Option<serde_json::Value>,
}

impl MetalClient {
    #[instrument(skip(self), err(level = Level::DEBUG))]
    pub async fn get_device(&self, id: &str) -> Result<Device, ApiError> {
        self.get(&format!("devices/{id}")).await
    }

    #[instrument(skip(self, request), err(level = Level::DEBUG))]
    pub async fn create_device(
        &self,
        project_id: &str,
        request: &DeviceCreateRequest,
    ) -> Result<Device, ApiError> {
        self.post(&format!("projects/{project_id}/devices"), request)
            .await
    }

    #[instrument(skip(self, request), err(level = Level::DEBUG))]
    pub async fn update_device(
        &self,
        id: &str,
        request: &DeviceUpdateRequest,
    ) -> Result<Device, ApiError> {
        self.put(&format!("devices/{id}"), request).await
    }

    #[instrument(skip(self), err(level = Level::DEBUG))]
    pub async fn delete_device(&self, id: &str, force: bool) -> Result<(), ApiError> {
        let force = if force { "true" } else { "false" };
        self.delete(&format!("devices/{id}"), &[("force_delete", force)])
            .await?;

        debug!("Device deletion accepted.");
        Ok(())
    }
}
