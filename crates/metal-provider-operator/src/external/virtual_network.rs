use async_trait::async_trait;
use metal_provider_api::MetalClient;
use metal_provider_crd::{Condition, Managed as _, VirtualNetwork};
use tracing::{Level, instrument};

use crate::{
    clients::virtual_network::{
        VirtualNetworkService, create_request, generate_observation, is_up_to_date,
        late_initialize_parameters, update_request,
    },
    external::{deleted, found},
    managed::{
        Connect, Credentials, ExternalClient, ExternalCreation, ExternalError,
        ExternalObservation, ExternalUpdate, ResolveReferences,
    },
};

const KIND: &str = "VirtualNetwork";

pub struct VirtualNetworkExternal<S> {
    service: S,
    project_id: String,
    default_facility: String,
}

impl<S> VirtualNetworkExternal<S> {
    pub fn new(service: S, project_id: String) -> Self {
        Self {
            service,
            project_id,
            default_facility: String::new(),
        }
    }

    /// Facility used when neither facility nor metro is requested.
    #[must_use]
    pub fn with_default_facility(mut self, facility: String) -> Self {
        self.default_facility = facility;
        self
    }
}

impl ResolveReferences for VirtualNetwork {}

impl Connect for VirtualNetwork {
    fn external(client: MetalClient, credentials: &Credentials) -> Box<dyn ExternalClient<Self>> {
        Box::new(
            VirtualNetworkExternal::new(client, credentials.project_id.clone())
                .with_default_facility(credentials.facility_id.clone()),
        )
    }
}

#[async_trait]
impl<S> ExternalClient<VirtualNetwork> for VirtualNetworkExternal<S>
where
    S: VirtualNetworkService,
{
    #[instrument(skip_all, fields(name = network.metadata.name), ret(level = Level::DEBUG), err(level = Level::WARN))]
    async fn observe(
        &self,
        network: &mut VirtualNetwork,
    ) -> Result<ExternalObservation, ExternalError> {
        let Some(id) = network.external_name().map(str::to_owned) else {
            return Ok(ExternalObservation::not_exists());
        };

        let Some(remote) = found(self.service.get(&id).await, KIND)? else {
            return Ok(ExternalObservation::not_exists());
        };

        let late_initialized = late_initialize_parameters(&mut network.spec.for_provider, &remote);
        *network.at_provider_mut() =
            generate_observation(&remote).map_err(|err| ExternalError::Observation(KIND, err))?;
        network.set_condition(Condition::available());

        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: is_up_to_date(&network.spec.for_provider, &remote),
            resource_late_initialized: late_initialized,
            ..Default::default()
        })
    }

    #[instrument(skip_all, fields(name = network.metadata.name), err(level = Level::WARN))]
    async fn create(
        &self,
        network: &mut VirtualNetwork,
    ) -> Result<ExternalCreation, ExternalError> {
        network.set_condition(Condition::creating());

        let mut request = create_request(&network.spec.for_provider);
        if request.facility.is_none() && request.metro.is_none() && !self.default_facility.is_empty()
        {
            request.facility = Some(self.default_facility.clone());
        }

        let remote = self
            .service
            .create(&self.project_id, &request)
            .await
            .map_err(|err| ExternalError::Create(KIND, err))?;

        network.set_external_name(&remote.id);
        network.at_provider_mut().id.clone_from(&remote.id);

        Ok(ExternalCreation::default())
    }

    #[instrument(skip_all, fields(name = network.metadata.name), err(level = Level::WARN))]
    async fn update(&self, network: &mut VirtualNetwork) -> Result<ExternalUpdate, ExternalError> {
        let id = network
            .external_name()
            .ok_or(ExternalError::MissingExternalName(KIND))?;

        self.service
            .update(id, &update_request(&network.spec.for_provider))
            .await
            .map_err(|err| ExternalError::Update(KIND, err))?;

        Ok(ExternalUpdate::Sent)
    }

    #[instrument(skip_all, fields(name = network.metadata.name), err(level = Level::WARN))]
    async fn delete(&self, network: &mut VirtualNetwork) -> Result<(), ExternalError> {
        network.set_condition(Condition::deleting());

        let id = network
            .external_name()
            .ok_or(ExternalError::MissingExternalName(KIND))?;

        deleted(self.service.delete(id).await, KIND)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use metal_provider_api::{ApiError, StatusCode, VirtualNetwork as RemoteNetwork};
    use metal_provider_crd::{VirtualNetworkParameters, VirtualNetworkSpec};

    use super::*;
    use crate::clients::virtual_network::MockVirtualNetworkService;

    fn network() -> VirtualNetwork {
        let mut network = VirtualNetwork::new(
            "storage",
            VirtualNetworkSpec {
                for_provider: VirtualNetworkParameters {
                    facility: Some("ny5".to_owned()),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        network.set_external_name("vlan-1");
        network
    }

    #[tokio::test]
    async fn observe_fills_observation() {
        let mut service = MockVirtualNetworkService::new();
        service.expect_get().returning(|_| {
            Ok(RemoteNetwork {
                id: "vlan-1".to_owned(),
                vxlan: 1001,
                facility_code: "ny5".to_owned(),
                description: "storage".to_owned(),
                ..Default::default()
            })
        });

        let external = VirtualNetworkExternal::new(service, "proj-1".to_owned());
        let mut network = network();

        let observation = external.observe(&mut network).await.unwrap();

        assert!(observation.resource_up_to_date);
        assert!(observation.resource_late_initialized);
        assert_eq!(network.status.map(|status| status.at_provider.vxlan), Some(1001));
    }

    #[tokio::test]
    async fn description_drift_is_corrected_by_update() {
        let remote = Arc::new(Mutex::new(RemoteNetwork {
            id: "vlan-1".to_owned(),
            vxlan: 1001,
            facility_code: "ny5".to_owned(),
            description: "old".to_owned(),
            ..Default::default()
        }));

        let mut service = MockVirtualNetworkService::new();
        let current = remote.clone();
        service
            .expect_get()
            .returning(move |_| Ok(current.lock().unwrap().clone()));
        let current = remote.clone();
        service
            .expect_update()
            .withf(|id, request| id == "vlan-1" && request.description.as_deref() == Some("new"))
            .times(1)
            .returning(move |_, request| {
                let mut network = current.lock().unwrap();
                network.description = request.description.clone().unwrap_or_default();
                Ok(network.clone())
            });

        let external = VirtualNetworkExternal::new(service, "proj-1".to_owned());
        let mut network = network();
        network.spec.for_provider.description = Some("new".to_owned());

        let first = external.observe(&mut network).await.unwrap();
        assert!(!first.resource_up_to_date);

        let update = external.update(&mut network).await.unwrap();
        assert_eq!(update, ExternalUpdate::Sent);

        let second = external.observe(&mut network).await.unwrap();
        assert!(second.resource_up_to_date);
    }

    #[tokio::test]
    async fn create_without_location_uses_credentials_facility() {
        let mut service = MockVirtualNetworkService::new();
        service
            .expect_create()
            .withf(|project_id, request| {
                project_id == "proj-1"
                    && request.facility.as_deref() == Some("da11")
                    && request.metro.is_none()
            })
            .times(1)
            .returning(|_, _| {
                Ok(RemoteNetwork {
                    id: "vlan-2".to_owned(),
                    ..Default::default()
                })
            });

        let external = VirtualNetworkExternal::new(service, "proj-1".to_owned())
            .with_default_facility("da11".to_owned());
        let mut network = VirtualNetwork::new("storage", VirtualNetworkSpec::default());

        external.create(&mut network).await.unwrap();

        assert_eq!(network.external_name(), Some("vlan-2"));
    }

    #[tokio::test]
    async fn requested_metro_skips_default_facility() {
        let mut service = MockVirtualNetworkService::new();
        service
            .expect_create()
            .withf(|_, request| request.facility.is_none() && request.metro.as_deref() == Some("da"))
            .times(1)
            .returning(|_, _| Ok(RemoteNetwork::default()));

        let external = VirtualNetworkExternal::new(service, "proj-1".to_owned())
            .with_default_facility("da11".to_owned());
        let mut network = VirtualNetwork::new("storage", VirtualNetworkSpec::default());
        network.spec.for_provider.metro = Some("da".to_owned());

        external.create(&mut network).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_timestamp_fails_observation() {
        let mut service = MockVirtualNetworkService::new();
        service.expect_get().returning(|_| {
            Ok(RemoteNetwork {
                id: "vlan-1".to_owned(),
                created_at: "yesterday".to_owned(),
                ..Default::default()
            })
        });

        let external = VirtualNetworkExternal::new(service, "proj-1".to_owned());

        let err = external.observe(&mut network()).await.unwrap_err();

        assert!(matches!(err, ExternalError::Observation(KIND, _)));
    }

    #[tokio::test]
    async fn delete_surfaces_server_errors() {
        let mut service = MockVirtualNetworkService::new();
        service.expect_delete().returning(|_| {
            Err(ApiError::Response {
                status: StatusCode::CONFLICT,
                errors: vec!["in use".to_owned()],
            })
        });

        let external = VirtualNetworkExternal::new(service, "proj-1".to_owned());

        let err = external.delete(&mut network()).await.unwrap_err();

        assert!(err.to_string().contains("in use"));
    }
}
