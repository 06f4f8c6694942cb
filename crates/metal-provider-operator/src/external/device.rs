use async_trait::async_trait;
use metal_provider_api::MetalClient;
use metal_provider_crd::{Condition, Device, Managed as _};
use tracing::{Level, debug, instrument};

use crate::{
    clients::device::{
        DeviceService, STATE_ACTIVE, STATE_PROVISIONING, connection_details, create_request,
        generate_observation, is_up_to_date, late_initialize_parameters, update_request,
    },
    external::{deleted, found},
    managed::{
        Connect, Credentials, ExternalClient, ExternalCreation, ExternalError,
        ExternalObservation, ExternalUpdate, ResolveReferences,
    },
};

const KIND: &str = "Device";

pub struct DeviceExternal<S> {
    service: S,
    project_id: String,
    default_facility: String,
}

impl<S> DeviceExternal<S> {
    pub fn new(service: S, project_id: String) -> Self {
        Self {
            service,
            project_id,
            default_facility: String::new(),
        }
    }

    /// Facility used for devices that do not name one.
    #[must_use]
    pub fn with_default_facility(mut self, facility: String) -> Self {
        self.default_facility = facility;
        self
    }
}

impl ResolveReferences for Device {}

impl Connect for Device {
    fn external(client: MetalClient, credentials: &Credentials) -> Box<dyn ExternalClient<Self>> {
        Box::new(
            DeviceExternal::new(client, credentials.project_id.clone())
                .with_default_facility(credentials.facility_id.clone()),
        )
    }
}

fn external_name(device: &Device) -> Result<String, ExternalError> {
    device
        .external_name()
        .map(str::to_owned)
        .ok_or(ExternalError::MissingExternalName(KIND))
}

#[async_trait]
impl<S> ExternalClient<Device> for DeviceExternal<S>
where
    S: DeviceService,
{
    #[instrument(skip_all, fields(name = device.metadata.name), ret(level = Level::DEBUG), err(level = Level::WARN))]
    async fn observe(&self, device: &mut Device) -> Result<ExternalObservation, ExternalError> {
        let Some(id) = device.external_name().map(str::to_owned) else {
            return Ok(ExternalObservation::not_exists());
        };

        let Some(remote) = found(self.service.get(&id).await, KIND)? else {
            return Ok(ExternalObservation::not_exists());
        };

        let late_initialized = late_initialize_parameters(&mut device.spec.for_provider, &remote);
        let observation =
            generate_observation(&remote).map_err(|err| ExternalError::Observation(KIND, err))?;

        let condition = match observation.state.as_str() {
            STATE_ACTIVE => Condition::available(),
            STATE_PROVISIONING => Condition::creating(),
            _ => Condition::unavailable(),
        };

        *device.at_provider_mut() = observation;
        device.set_condition(condition);

        let (up_to_date, network_up_to_date) = is_up_to_date(&device.spec.for_provider, &remote);

        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: up_to_date && network_up_to_date,
            resource_late_initialized: late_initialized,
            connection_details: connection_details(&remote),
        })
    }

    #[instrument(skip_all, fields(name = device.metadata.name), err(level = Level::WARN))]
    async fn create(&self, device: &mut Device) -> Result<ExternalCreation, ExternalError> {
        device.set_condition(Condition::creating());

        let mut request = create_request(&device.spec.for_provider);
        if device.spec.for_provider.facility.is_empty() {
            request.facility = vec![self.default_facility.clone()];
        }

        let remote = self
            .service
            .create(&self.project_id, &request)
            .await
            .map_err(|err| ExternalError::Create(KIND, err))?;

        debug!(id = remote.id, "Device created.");
        device.set_external_name(&remote.id);
        device.at_provider_mut().id.clone_from(&remote.id);

        Ok(ExternalCreation {
            connection_details: connection_details(&remote),
        })
    }

    #[instrument(skip_all, fields(name = device.metadata.name), err(level = Level::WARN))]
    async fn update(&self, device: &mut Device) -> Result<ExternalUpdate, ExternalError> {
        let id = external_name(device)?;
        let remote = self
            .service
            .get(&id)
            .await
            .map_err(|err| ExternalError::Get(KIND, err))?;

        let parameters = &device.spec.for_provider;
        let (_, network_up_to_date) = is_up_to_date(parameters, &remote);

        // A pending conversion goes first, even when other fields drifted too.
        // Those are sent on the next pass, once the network type matches.
        if !network_up_to_date && let Some(network_type) = &parameters.network_type {
            debug!(
                from = remote.network_type(),
                to = network_type,
                "Converting network type."
            );

            self.service
                .to_network_type(&id, network_type)
                .await
                .map_err(|err| ExternalError::Update(KIND, err))?;

            return Ok(ExternalUpdate::Sent);
        }

        self.service
            .update(&id, &update_request(parameters))
            .await
            .map_err(|err| ExternalError::Update(KIND, err))?;

        Ok(ExternalUpdate::Sent)
    }

    #[instrument(skip_all, fields(name = device.metadata.name), err(level = Level::WARN))]
    async fn delete(&self, device: &mut Device) -> Result<(), ExternalError> {
        device.set_condition(Condition::deleting());

        let id = external_name(device)?;
        deleted(self.service.delete(&id).await, KIND)
    }
}

#[cfg(test)]
mod tests {
    use metal_provider_api::{ApiError, StatusCode};
    use metal_provider_crd::{DeviceParameters, DeviceSpec, Reason, Type};
    use mockall::predicate::eq;

    use super::*;
    use crate::clients::device::{MockDeviceService, tests::device as remote_device};

    fn device(external_name: Option<&str>) -> Device {
        let mut device = Device::new(
            "worker",
            DeviceSpec {
                for_provider: DeviceParameters {
                    hostname: Some("h1".to_owned()),
                    plan: "c3.small.x86".to_owned(),
                    facility: "ny5".to_owned(),
                    operating_system: "ubuntu_22_04".to_owned(),
                    ..Default::default()
                },
                ..Default::default()
            },
        );

        if let Some(name) = external_name {
            device.set_external_name(name);
        }

        device
    }

    fn status(code: StatusCode) -> ApiError {
        ApiError::Response {
            status: code,
            errors: vec![code.to_string()],
        }
    }

    fn ready_reason(device: &Device) -> Option<Reason> {
        device
            .managed_status()
            .and_then(|status| status.condition(Type::Ready))
            .map(|condition| condition.reason)
    }

    #[tokio::test]
    async fn observe_without_external_name_makes_no_calls() {
        let external = DeviceExternal::new(MockDeviceService::new(), "proj-1".to_owned());
        let mut device = device(None);

        let observation = external.observe(&mut device).await.unwrap();

        assert_eq!(observation, ExternalObservation::not_exists());
    }

    #[tokio::test]
    async fn observe_not_found_is_not_exists() {
        let mut service = MockDeviceService::new();
        service
            .expect_get()
            .with(eq("dev-1"))
            .times(1)
            .returning(|_| Err(status(StatusCode::NOT_FOUND)));

        let external = DeviceExternal::new(service, "proj-1".to_owned());
        let observation = external.observe(&mut device(Some("dev-1"))).await.unwrap();

        assert!(!observation.resource_exists);
    }

    #[tokio::test]
    async fn observe_other_errors_are_returned() {
        let mut service = MockDeviceService::new();
        service
            .expect_get()
            .returning(|_| Err(status(StatusCode::FORBIDDEN)));

        let external = DeviceExternal::new(service, "proj-1".to_owned());
        let err = external
            .observe(&mut device(Some("dev-1")))
            .await
            .unwrap_err();

        assert!(matches!(err, ExternalError::Get(KIND, _)));
    }

    #[tokio::test]
    async fn observe_refreshes_status_and_late_initializes() {
        let mut service = MockDeviceService::new();
        service.expect_get().returning(|_| Ok(remote_device()));

        let external = DeviceExternal::new(service, "proj-1".to_owned());
        let mut device = device(Some("dev-1"));

        let observation = external.observe(&mut device).await.unwrap();

        assert!(observation.resource_exists);
        assert!(observation.resource_up_to_date);
        assert!(observation.resource_late_initialized);
        assert!(observation.connection_details.is_empty());
        assert_eq!(device.spec.for_provider.locked, Some(true));
        assert_eq!(
            device.status.as_ref().map(|s| s.at_provider.ipv4.as_str()),
            Some("147.75.1.2")
        );
        assert_eq!(ready_reason(&device), Some(Reason::Available));
    }

    #[tokio::test]
    async fn observe_maps_states_to_conditions() {
        for (state, reason) in [
            ("provisioning", Reason::Creating),
            ("queued", Reason::Unavailable),
            ("powering_off", Reason::Unavailable),
        ] {
            let mut service = MockDeviceService::new();
            service.expect_get().returning(move |_| {
                let mut remote = remote_device();
                remote.state = state.to_owned();
                Ok(remote)
            });

            let external = DeviceExternal::new(service, "proj-1".to_owned());
            let mut device = device(Some("dev-1"));
            external.observe(&mut device).await.unwrap();

            assert_eq!(ready_reason(&device), Some(reason), "{state}");
        }
    }

    #[tokio::test]
    async fn observe_reports_drift() {
        let mut service = MockDeviceService::new();
        service.expect_get().returning(|_| Ok(remote_device()));

        let external = DeviceExternal::new(service, "proj-1".to_owned());
        let mut device = device(Some("dev-1"));
        device.spec.for_provider.locked = Some(false);

        let observation = external.observe(&mut device).await.unwrap();

        assert!(observation.resource_exists);
        assert!(!observation.resource_up_to_date);
    }

    #[tokio::test]
    async fn create_sets_external_name() {
        let mut service = MockDeviceService::new();
        service
            .expect_create()
            .withf(|project_id, request| project_id == "proj-1" && request.hostname == "h1")
            .times(1)
            .returning(|_, _| {
                let mut remote = remote_device();
                remote.root_password = "hunter2".to_owned();
                Ok(remote)
            });

        let external = DeviceExternal::new(service, "proj-1".to_owned());
        let mut device = device(None);

        let creation = external.create(&mut device).await.unwrap();

        assert_eq!(device.external_name(), Some("dev-1"));
        assert_eq!(
            creation.connection_details.get("password").map(String::as_str),
            Some("hunter2")
        );
        assert_eq!(ready_reason(&device), Some(Reason::Creating));
    }

    #[tokio::test]
    async fn create_falls_back_to_credentials_facility() {
        let mut service = MockDeviceService::new();
        service
            .expect_create()
            .withf(|_, request| request.facility == ["da11"])
            .times(1)
            .returning(|_, _| Ok(remote_device()));

        let external = DeviceExternal::new(service, "proj-1".to_owned())
            .with_default_facility("da11".to_owned());
        let mut device = device(None);
        device.spec.for_provider.facility.clear();

        external.create(&mut device).await.unwrap();
    }

    #[tokio::test]
    async fn requested_facility_wins_over_default() {
        let mut service = MockDeviceService::new();
        service
            .expect_create()
            .withf(|_, request| request.facility == ["ny5"])
            .times(1)
            .returning(|_, _| Ok(remote_device()));

        let external = DeviceExternal::new(service, "proj-1".to_owned())
            .with_default_facility("da11".to_owned());

        external.create(&mut device(None)).await.unwrap();
    }

    #[tokio::test]
    async fn create_failure_keeps_resource_uncreated() {
        let mut service = MockDeviceService::new();
        service
            .expect_create()
            .returning(|_, _| Err(status(StatusCode::UNPROCESSABLE_ENTITY)));

        let external = DeviceExternal::new(service, "proj-1".to_owned());
        let mut device = device(None);

        let err = external.create(&mut device).await.unwrap_err();

        assert!(matches!(err, ExternalError::Create(KIND, _)));
        assert!(err.to_string().starts_with("cannot create Device"));
        assert_eq!(device.external_name(), None);
        assert_eq!(ready_reason(&device), Some(Reason::Creating));
    }

    #[tokio::test]
    async fn update_converts_network_type_only() {
        let mut service = MockDeviceService::new();
        service.expect_get().returning(|_| Ok(remote_device()));
        service
            .expect_to_network_type()
            .with(eq("dev-1"), eq("hybrid"))
            .times(1)
            .returning(|_, _| Ok(remote_device()));
        service.expect_update().never();

        let external = DeviceExternal::new(service, "proj-1".to_owned());
        let mut device = device(Some("dev-1"));
        device.spec.for_provider.network_type = Some("hybrid".to_owned());
        device.spec.for_provider.hostname = Some("h2".to_owned());

        external.update(&mut device).await.unwrap();
    }

    #[tokio::test]
    async fn field_drift_waits_for_network_conversion() {
        let converted = || {
            let mut remote = remote_device();
            remote.network_ports[0].network_type = "hybrid".to_owned();
            remote
        };

        let mut device = device(Some("dev-1"));
        device.spec.for_provider.network_type = Some("hybrid".to_owned());
        device.spec.for_provider.hostname = Some("h2".to_owned());

        let mut service = MockDeviceService::new();
        service.expect_get().times(1).returning(|_| Ok(remote_device()));
        service
            .expect_to_network_type()
            .times(1)
            .returning(move |_, _| Ok(converted()));
        service.expect_update().never();

        let first = DeviceExternal::new(service, "proj-1".to_owned());
        assert_eq!(first.update(&mut device).await.unwrap(), ExternalUpdate::Sent);

        let mut service = MockDeviceService::new();
        service.expect_get().times(1).returning(move |_| Ok(converted()));
        service.expect_to_network_type().never();
        service
            .expect_update()
            .withf(|_, request| request.hostname.as_deref() == Some("h2"))
            .times(1)
            .returning(|_, _| Ok(remote_device()));

        let second = DeviceExternal::new(service, "proj-1".to_owned());
        assert_eq!(second.update(&mut device).await.unwrap(), ExternalUpdate::Sent);
    }

    #[tokio::test]
    async fn update_sends_generic_update() {
        let mut service = MockDeviceService::new();
        service.expect_get().returning(|_| Ok(remote_device()));
        service
            .expect_update()
            .withf(|id, request| id == "dev-1" && request.hostname.as_deref() == Some("h2"))
            .times(1)
            .returning(|_, _| Ok(remote_device()));

        let external = DeviceExternal::new(service, "proj-1".to_owned());
        let mut device = device(Some("dev-1"));
        device.spec.for_provider.hostname = Some("h2".to_owned());

        external.update(&mut device).await.unwrap();
    }

    #[tokio::test]
    async fn delete_of_absent_device_succeeds() {
        let mut service = MockDeviceService::new();
        service
            .expect_delete()
            .with(eq("dev-1"))
            .times(1)
            .returning(|_| Err(status(StatusCode::NOT_FOUND)));

        let external = DeviceExternal::new(service, "proj-1".to_owned());
        let mut device = device(Some("dev-1"));

        external.delete(&mut device).await.unwrap();

        assert_eq!(ready_reason(&device), Some(Reason::Deleting));
    }

    #[tokio::test]
    async fn delete_surfaces_other_errors() {
        let mut service = MockDeviceService::new();
        service
            .expect_delete()
            .returning(|_| Err(status(StatusCode::INTERNAL_SERVER_ERROR)));

        let external = DeviceExternal::new(service, "proj-1".to_owned());

        let err = external
            .delete(&mut device(Some("dev-1")))
            .await
            .unwrap_err();

        assert!(matches!(err, ExternalError::Delete(KIND, _)));
    }
}
