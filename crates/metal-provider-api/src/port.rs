use serde::{Deserialize, Serialize};
use tracing::{Level, debug, instrument};

use crate::{ApiError, Device, Href, MetalClient, nullable};

pub(crate) const NETWORK_TYPE_KEY_PORT: &str = "bond0";

const LAYER3: &str = "layer3";
const HYBRID: &str = "hybrid";
const LAYER2_BONDED: &str = "layer2-bonded";
const LAYER2_INDIVIDUAL: &str = "layer2-individual";

/// Network types a device can be converted to.
pub const NETWORK_TYPES: [&str; 4] = [LAYER3, HYBRID, LAYER2_BONDED, LAYER2_INDIVIDUAL];

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Port {
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(rename = "type", deserialize_with = "nullable")]
    pub type_: String,
    #[serde(deserialize_with = "nullable")]
    pub network_type: String,
    pub data: PortData,
    #[serde(deserialize_with = "nullable")]
    pub virtual_networks: Vec<Href>,
}

impl Port {
    /// Identifiers of the virtual networks attached to this port.
    pub fn virtual_network_ids(&self) -> impl Iterator<Item = &str> {
        self.virtual_networks.iter().map(Href::id)
    }

    fn is_bond(&self) -> bool {
        self.type_ == "NetworkBondPort"
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PortData {
    pub bonded: bool,
}

#[derive(Debug, Serialize)]
struct VirtualNetworkAssignment<'a> {
    vnid: &'a str,
}

#[derive(Debug, Serialize)]
struct Empty {}

impl MetalClient {
    #[instrument(skip(self), err(level = Level::DEBUG))]
    pub async fn get_port(&self, id: &str) -> Result<Port, ApiError> {
        self.get(&format!("ports/{id}")).await
    }

    #[instrument(skip(self), err(level = Level::DEBUG))]
    pub async fn assign_port(&self, id: &str, virtual_network_id: &str) -> Result<Port, ApiError> {
        let body = VirtualNetworkAssignment {
            vnid: virtual_network_id,
        };

        self.post(&format!("ports/{id}/assign"), &body).await
    }

    #[instrument(skip(self), err(level = Level::DEBUG))]
    pub async fn unassign_port(
        &self,
        id: &str,
        virtual_network_id: &str,
    ) -> Result<Port, ApiError> {
        let body = VirtualNetworkAssignment {
            vnid: virtual_network_id,
        };

        self.post(&format!("ports/{id}/unassign"), &body).await
    }

    async fn port_action(&self, port: &Port, action: &str) -> Result<Port, ApiError> {
        debug!(port = port.name, action, "Changing port.");
        self.post(&format!("ports/{}/{action}", port.id), &Empty {})
            .await
    }

    /// Converts the device to the given network type and returns the device
    /// as it looks afterwards.
    ///
    /// Member ports are bonded again before converting to a bonded type, and
    /// split off the bond for `hybrid` and `layer2-individual`.
    #[instrument(skip(self), err(level = Level::WARN))]
    pub async fn device_to_network_type(
        &self,
        id: &str,
        network_type: &str,
    ) -> Result<Device, ApiError> {
        if !NETWORK_TYPES.contains(&network_type) {
            return Err(ApiError::NetworkType(network_type.to_owned()));
        }

        let device = self.get_device(id).await?;
        if device.network_type() == network_type {
            return Ok(device);
        }

        let bond = device
            .port(NETWORK_TYPE_KEY_PORT)
            .ok_or_else(|| ApiError::MissingPort {
                device: id.to_owned(),
                port: NETWORK_TYPE_KEY_PORT.to_owned(),
            })?;

        let members = device
            .network_ports
            .iter()
            .filter(|port| !port.is_bond())
            .collect::<Vec<_>>();

        match network_type {
            LAYER3 | LAYER2_BONDED => {
                for port in members.iter().filter(|port| !port.data.bonded) {
                    self.port_action(port, "bond").await?;
                }

                let conversion = if network_type == LAYER3 {
                    "convert/layer-3"
                } else {
                    "convert/layer-2"
                };

                self.port_action(bond, conversion).await?;
            }
            HYBRID => {
                if device.network_type() != LAYER3 {
                    self.port_action(bond, "convert/layer-3").await?;
                }

                if let Some(second) = members.iter().find(|port| port.name == "eth1") {
                    self.port_action(second, "disbond").await?;
                }
            }
            _ => {
                if device.network_type() != LAYER2_BONDED {
                    self.port_action(bond, "convert/layer-2").await?;
                }

                self.port_action(bond, "disbond").await?;
            }
        }

        self.get_device(id).await
    }
}
