use async_trait::async_trait;
use kube::{Api, Client};
use metal_provider_api::MetalClient;
use metal_provider_crd::{Condition, Device, Managed as _, PortAssignment, VirtualNetwork};
use tracing::{Level, debug, instrument};

use crate::{
    clients::port_assignment::{PortService, generate_observation, is_assigned},
    external::{deleted, found},
    k8s::reference_ext::{ReferenceError, ReferenceExt as _},
    managed::{
        Connect, Credentials, ExternalClient, ExternalCreation, ExternalError,
        ExternalObservation, ExternalUpdate, ResolveReferences,
    },
};

const KIND: &str = "PortAssignment";

/// Attaches a virtual network to a device port. The external name is the port
/// id.
pub struct PortAssignmentExternal<S> {
    service: S,
}

impl<S> PortAssignmentExternal<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

fn device_id(device: &Device) -> &str {
    device
        .managed_status()
        .map_or("", |status| status.at_provider.id.as_str())
}

fn virtual_network_id(network: &VirtualNetwork) -> &str {
    network
        .managed_status()
        .map_or("", |status| status.at_provider.id.as_str())
}

#[async_trait]
impl ResolveReferences for PortAssignment {
    #[instrument(skip_all, fields(name = self.metadata.name), err(level = Level::WARN))]
    async fn resolve_references(&mut self, client: &Client) -> Result<bool, ReferenceError> {
        let parameters = &mut self.spec.for_provider;
        let mut resolved = false;

        let devices: Api<Device> = Api::all(client.clone());
        if let Some(device) = devices
            .resolve(
                &parameters.device_id,
                parameters.device_id_ref.as_ref(),
                parameters.device_id_selector.as_ref(),
                device_id,
            )
            .await?
        {
            parameters.device_id = device.value;
            parameters.device_id_ref = Some(device.reference);
            resolved = true;
        }

        let networks: Api<VirtualNetwork> = Api::all(client.clone());
        if let Some(network) = networks
            .resolve(
                &parameters.virtual_network_id,
                parameters.virtual_network_id_ref.as_ref(),
                parameters.virtual_network_id_selector.as_ref(),
                virtual_network_id,
            )
            .await?
        {
            parameters.virtual_network_id = network.value;
            parameters.virtual_network_id_ref = Some(network.reference);
            resolved = true;
        }

        Ok(resolved)
    }
}

impl Connect for PortAssignment {
    fn external(client: MetalClient, _: &Credentials) -> Box<dyn ExternalClient<Self>> {
        Box::new(PortAssignmentExternal::new(client))
    }
}

#[async_trait]
impl<S> ExternalClient<PortAssignment> for PortAssignmentExternal<S>
where
    S: PortService,
{
    #[instrument(skip_all, fields(name = assignment.metadata.name), ret(level = Level::DEBUG), err(level = Level::WARN))]
    async fn observe(
        &self,
        assignment: &mut PortAssignment,
    ) -> Result<ExternalObservation, ExternalError> {
        let Some(id) = assignment.external_name().map(str::to_owned) else {
            return Ok(ExternalObservation::not_exists());
        };

        let Some(port) = found(self.service.get(&id).await, KIND)? else {
            return Ok(ExternalObservation::not_exists());
        };

        *assignment.at_provider_mut() = generate_observation(&port);

        if !is_assigned(&assignment.spec.for_provider, &port) {
            return Ok(ExternalObservation::not_exists());
        }

        assignment.set_condition(Condition::available());

        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: true,
            ..Default::default()
        })
    }

    #[instrument(skip_all, fields(name = assignment.metadata.name), err(level = Level::WARN))]
    async fn create(
        &self,
        assignment: &mut PortAssignment,
    ) -> Result<ExternalCreation, ExternalError> {
        assignment.set_condition(Condition::creating());

        let parameters = &assignment.spec.for_provider;
        let device = self
            .service
            .get_device(&parameters.device_id)
            .await
            .map_err(|err| ExternalError::Get("Device", err))?;

        let port_id = device
            .port(&parameters.name)
            .map(|port| port.id.clone())
            .ok_or_else(|| ExternalError::PortNotFound {
                device: parameters.device_id.clone(),
                name: parameters.name.clone(),
            })?;

        debug!(port = port_id, "Assigning virtual network.");

        let port = self
            .service
            .assign(&port_id, &parameters.virtual_network_id)
            .await
            .map_err(|err| ExternalError::Create(KIND, err))?;

        assignment.set_external_name(&port_id);
        *assignment.at_provider_mut() = generate_observation(&port);

        Ok(ExternalCreation::default())
    }

    /// Assignments are replaced, never changed in place.
    async fn update(&self, _: &mut PortAssignment) -> Result<ExternalUpdate, ExternalError> {
        Ok(ExternalUpdate::Skipped)
    }

    #[instrument(skip_all, fields(name = assignment.metadata.name), err(level = Level::WARN))]
    async fn delete(&self, assignment: &mut PortAssignment) -> Result<(), ExternalError> {
        assignment.set_condition(Condition::deleting());

        let id = assignment
            .external_name()
            .ok_or(ExternalError::MissingExternalName(KIND))?;

        deleted(
            self.service
                .unassign(id, &assignment.spec.for_provider.virtual_network_id)
                .await,
            KIND,
        )
    }
}
