use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use metal_provider_api::{
    ApiError, Device, DeviceCreateRequest, DeviceUpdateRequest, IpAddressCreateRequest,
    MetalClient,
};
use metal_provider_crd::{DeviceObservation, DeviceParameters};
#[cfg(test)]
use mockall::automock;

use crate::{
    clients::{
        ObservationError, custom_data, late_initialize, late_initialize_string, non_empty,
        parse_time, unset_or_equal,
    },
    managed::ConnectionDetails,
};

pub const STATE_ACTIVE: &str = "active";
pub const STATE_PROVISIONING: &str = "provisioning";

/// Device endpoints needed to reconcile a `Device`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DeviceService: Send + Sync {
    async fn get(&self, id: &str) -> Result<Device, ApiError>;

    async fn create(
        &self,
        project_id: &str,
        request: &DeviceCreateRequest,
    ) -> Result<Device, ApiError>;

    async fn update(&self, id: &str, request: &DeviceUpdateRequest) -> Result<Device, ApiError>;

    async fn delete(&self, id: &str) -> Result<(), ApiError>;

    async fn to_network_type(&self, id: &str, network_type: &str) -> Result<Device, ApiError>;
}

#[async_trait]
impl DeviceService for MetalClient {
    async fn get(&self, id: &str) -> Result<Device, ApiError> {
        self.get_device(id).await
    }

    async fn create(
        &self,
        project_id: &str,
        request: &DeviceCreateRequest,
    ) -> Result<Device, ApiError> {
        self.create_device(project_id, request).await
    }

    async fn update(&self, id: &str, request: &DeviceUpdateRequest) -> Result<Device, ApiError> {
        self.update_device(id, request).await
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.delete_device(id, false).await
    }

    async fn to_network_type(&self, id: &str, network_type: &str) -> Result<Device, ApiError> {
        self.device_to_network_type(id, network_type).await
    }
}

#[must_use]
pub fn create_request(parameters: &DeviceParameters) -> DeviceCreateRequest {
    DeviceCreateRequest {
        hostname: parameters.hostname.clone().unwrap_or_default(),
        plan: parameters.plan.clone(),
        facility: vec![parameters.facility.clone()],
        operating_system: parameters.operating_system.clone(),
        billing_cycle: parameters.billing_cycle.clone().unwrap_or_default(),
        userdata: parameters.user_data.clone().unwrap_or_default(),
        tags: parameters.tags.clone().unwrap_or_default(),
        description: parameters.description.clone(),
        customdata: parameters.custom_data.as_deref().map(custom_data),
        locked: parameters.locked,
        always_pxe: parameters.always_pxe,
        ipxe_script_url: parameters.ipxe_script_url.clone(),
        hardware_reservation_id: parameters.hardware_reservation_id.clone(),
        public_ipv4_subnet_size: parameters.public_ipv4_subnet_size,
        user_ssh_keys: parameters.user_ssh_keys.clone(),
        project_ssh_keys: parameters.project_ssh_keys.clone(),
        features: parameters.features.clone(),
        ip_addresses: parameters
            .ip_addresses
            .iter()
            .map(|address| IpAddressCreateRequest {
                address_family: address.address_family,
                public: address.public,
                cidr: address.cidr,
                ip_reservations: address.ip_reservations.clone(),
            })
            .collect(),
    }
}

#[must_use]
pub fn update_request(parameters: &DeviceParameters) -> DeviceUpdateRequest {
    DeviceUpdateRequest {
        hostname: parameters.hostname.clone(),
        description: parameters.description.clone(),
        userdata: parameters.user_data.clone(),
        locked: parameters.locked,
        tags: parameters.tags.clone(),
        always_pxe: parameters.always_pxe,
        ipxe_script_url: parameters.ipxe_script_url.clone(),
        customdata: parameters.custom_data.as_deref().map(custom_data),
    }
}

/// SSH details for the device. The API returns the root password only for a
/// short while after provisioning, so this is empty most of the time.
#[must_use]
pub fn connection_details(device: &Device) -> ConnectionDetails {
    let Some(ipv4) = device.public_ipv4() else {
        return ConnectionDetails::new();
    };

    if device.root_password.is_empty() || ipv4.address.is_empty() {
        return ConnectionDetails::new();
    }

    ConnectionDetails::from([
        ("endpoint".to_owned(), ipv4.address.clone()),
        ("username".to_owned(), "root".to_owned()),
        ("password".to_owned(), device.root_password.clone()),
        ("port".to_owned(), "22".to_owned()),
    ])
}

pub fn generate_observation(device: &Device) -> Result<DeviceObservation, ObservationError> {
    Ok(DeviceObservation {
        id: device.id.clone(),
        href: device.href.clone(),
        hostname: device.hostname.clone(),
        description: device.description.clone(),
        tags: device.tags.clone(),
        state: device.state.clone(),
        provision_percentage: Quantity(format!("{:.6}", device.provisioning_percentage)),
        ipv4: device
            .public_ipv4()
            .map(|address| address.address.clone())
            .unwrap_or_default(),
        locked: device.locked,
        billing_cycle: device.billing_cycle.clone(),
        network_type: device.network_type(),
        facility: device
            .facility
            .as_ref()
            .map(|facility| facility.code.clone())
            .unwrap_or_default(),
        created_at: parse_time(&device.created_at)?,
        updated_at: parse_time(&device.updated_at)?,
    })
}

/// Copies server side defaults into parameters the user left unset.
pub fn late_initialize_parameters(parameters: &mut DeviceParameters, device: &Device) -> bool {
    let mut changed = false;

    if let Some(os) = &device.operating_system {
        changed |= late_initialize_string(&mut parameters.operating_system, &os.slug);
    }

    if let Some(plan) = &device.plan {
        changed |= late_initialize_string(&mut parameters.plan, &plan.slug);
    }

    changed |= late_initialize(
        &mut parameters.network_type,
        non_empty(&device.network_type()),
    );
    changed |= late_initialize(&mut parameters.hostname, non_empty(&device.hostname));
    changed |= late_initialize(
        &mut parameters.billing_cycle,
        non_empty(&device.billing_cycle),
    );
    changed |= late_initialize(
        &mut parameters.ipxe_script_url,
        non_empty(&device.ipxe_script_url),
    );
    changed |= late_initialize(&mut parameters.user_data, non_empty(&device.userdata));
    changed |= late_initialize(&mut parameters.always_pxe, Some(device.always_pxe));
    changed |= late_initialize(&mut parameters.locked, Some(device.locked));
    changed |= late_initialize(
        &mut parameters.public_ipv4_subnet_size,
        device.public_ipv4().map(|address| address.cidr),
    );
    changed |= late_initialize(&mut parameters.tags, Some(device.tags.clone()));

    changed
}

/// Compares the mutable fields. The first value covers everything but the
/// network type, which is reported separately because changing it needs its
/// own API call.
///
/// Tags are compared in order.
#[must_use]
pub fn is_up_to_date(parameters: &DeviceParameters, device: &Device) -> (bool, bool) {
    let network_type = device.network_type();
    let network_up_to_date =
        unset_or_equal(parameters.network_type.as_deref(), network_type.as_str());

    let up_to_date = unset_or_equal(parameters.hostname.as_deref(), device.hostname.as_str())
        && unset_or_equal(parameters.user_data.as_deref(), device.userdata.as_str())
        && unset_or_equal(
            parameters.ipxe_script_url.as_deref(),
            device.ipxe_script_url.as_str(),
        )
        && unset_or_equal(parameters.locked.as_ref(), &device.locked)
        && unset_or_equal(parameters.always_pxe.as_ref(), &device.always_pxe)
        && unset_or_equal(parameters.tags.as_deref(), device.tags.as_slice());

    (up_to_date, network_up_to_date)
}

#[cfg(test)]
pub(crate) mod tests {
    use metal_provider_api::{Facility, IpAddress, Port, Slug};

    use super::*;

    pub(crate) fn device() -> Device {
        Device {
            id: "dev-1".to_owned(),
            href: "/metal/v1/devices/dev-1".to_owned(),
            hostname: "h1".to_owned(),
            state: STATE_ACTIVE.to_owned(),
            tags: vec!["a".to_owned(), "b".to_owned()],
            billing_cycle: "hourly".to_owned(),
            locked: true,
            provisioning_percentage: 100.0,
            created_at: "2024-05-01T10:00:00Z".to_owned(),
            plan: Some(Slug {
                slug: "c3.small.x86".to_owned(),
            }),
            operating_system: Some(Slug {
                slug: "ubuntu_22_04".to_owned(),
            }),
            facility: Some(Facility {
                code: "ny5".to_owned(),
            }),
            ip_addresses: vec![
                IpAddress {
                    address: "10.0.0.2".to_owned(),
                    address_family: 4,
                    public: false,
                    cidr: 31,
                },
                IpAddress {
                    address: "147.75.1.2".to_owned(),
                    address_family: 4,
                    public: true,
                    cidr: 31,
                },
            ],
            network_ports: vec![Port {
                id: "port-bond".to_owned(),
                name: "bond0".to_owned(),
                type_: "NetworkBondPort".to_owned(),
                network_type: "layer3".to_owned(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    /// What the API would hold after accepting the update request.
    fn apply(mut device: Device, request: DeviceUpdateRequest) -> Device {
        if let Some(hostname) = request.hostname {
            device.hostname = hostname;
        }
        if let Some(description) = request.description {
            device.description = description;
        }
        if let Some(userdata) = request.userdata {
            device.userdata = userdata;
        }
        if let Some(locked) = request.locked {
            device.locked = locked;
        }
        if let Some(tags) = request.tags {
            device.tags = tags;
        }
        if let Some(always_pxe) = request.always_pxe {
            device.always_pxe = always_pxe;
        }
        if let Some(ipxe_script_url) = request.ipxe_script_url {
            device.ipxe_script_url = ipxe_script_url;
        }
        device
    }

    #[test]
    fn locked_mismatch_is_drift() {
        let parameters = DeviceParameters {
            hostname: Some("h1".to_owned()),
            locked: Some(false),
            ..Default::default()
        };

        let (up_to_date, network_up_to_date) = is_up_to_date(&parameters, &device());

        assert!(!up_to_date);
        assert!(network_up_to_date);
    }

    #[test]
    fn unset_parameters_are_up_to_date() {
        assert_eq!(
            is_up_to_date(&DeviceParameters::default(), &device()),
            (true, true)
        );
    }

    #[test]
    fn tag_order_matters() {
        let parameters = DeviceParameters {
            tags: Some(vec!["b".to_owned(), "a".to_owned()]),
            ..Default::default()
        };

        assert!(!is_up_to_date(&parameters, &device()).0);
    }

    #[test]
    fn network_type_is_reported_separately() {
        let parameters = DeviceParameters {
            network_type: Some("hybrid".to_owned()),
            ..Default::default()
        };

        assert_eq!(is_up_to_date(&parameters, &device()), (true, false));
    }

    #[test]
    fn late_initialize_fills_tags_once() {
        let mut parameters = DeviceParameters::default();

        assert!(late_initialize_parameters(&mut parameters, &device()));
        assert_eq!(
            parameters.tags,
            Some(vec!["a".to_owned(), "b".to_owned()])
        );

        let mut other = device();
        other.tags = vec!["c".to_owned()];
        assert!(!late_initialize_parameters(&mut parameters, &other));
        assert_eq!(
            parameters.tags,
            Some(vec!["a".to_owned(), "b".to_owned()])
        );
    }

    #[test]
    fn late_initialize_is_idempotent() {
        let mut parameters = DeviceParameters::default();

        late_initialize_parameters(&mut parameters, &device());
        let first = parameters.clone();

        assert!(!late_initialize_parameters(&mut parameters, &device()));
        assert_eq!(parameters, first);
        assert_eq!(parameters.plan, "c3.small.x86");
        assert_eq!(parameters.operating_system, "ubuntu_22_04");
        assert_eq!(parameters.network_type.as_deref(), Some("layer3"));
        assert_eq!(parameters.public_ipv4_subnet_size, Some(31));
        assert_eq!(parameters.locked, Some(true));
        assert_eq!(parameters.user_data, None);
    }

    #[test]
    fn late_initialize_keeps_user_values() {
        let mut parameters = DeviceParameters {
            hostname: Some("mine".to_owned()),
            locked: Some(false),
            tags: Some(Vec::new()),
            ..Default::default()
        };

        late_initialize_parameters(&mut parameters, &device());

        assert_eq!(parameters.hostname.as_deref(), Some("mine"));
        assert_eq!(parameters.locked, Some(false));
        assert_eq!(parameters.tags, Some(Vec::new()));
    }

    #[test]
    fn up_to_date_update_converges() {
        let mut parameters = DeviceParameters::default();
        late_initialize_parameters(&mut parameters, &device());
        assert!(is_up_to_date(&parameters, &device()).0);

        let updated = apply(device(), update_request(&parameters));

        assert_eq!(updated, device());
    }

    #[test]
    fn observation_picks_public_ipv4() {
        let observation = generate_observation(&device()).unwrap();

        assert_eq!(observation.ipv4, "147.75.1.2");
        assert_eq!(observation.facility, "ny5");
        assert_eq!(observation.network_type, "layer3");
        assert_eq!(observation.provision_percentage.0, "100.000000");
        assert!(observation.created_at.is_some());
        assert!(observation.updated_at.is_none());
    }

    #[test]
    fn observation_rejects_malformed_timestamp() {
        let mut device = device();
        device.updated_at = "not a time".to_owned();

        assert!(generate_observation(&device).is_err());
    }

    #[test]
    fn connection_details_need_password_and_address() {
        assert!(connection_details(&device()).is_empty());

        let mut with_password = device();
        with_password.root_password = "hunter2".to_owned();
        let details = connection_details(&with_password);
        assert_eq!(details.get("endpoint").map(String::as_str), Some("147.75.1.2"));
        assert_eq!(details.get("username").map(String::as_str), Some("root"));
        assert_eq!(details.get("password").map(String::as_str), Some("hunter2"));
        assert_eq!(details.get("port").map(String::as_str), Some("22"));

        with_password.ip_addresses.retain(|address| !address.public);
        assert!(connection_details(&with_password).is_empty());
    }

    #[test]
    fn create_request_substitutes_empty_values() {
        let parameters = DeviceParameters {
            plan: "c3.small.x86".to_owned(),
            facility: "ny5".to_owned(),
            operating_system: "ubuntu_22_04".to_owned(),
            ..Default::default()
        };

        let request = create_request(&parameters);

        assert_eq!(request.hostname, "");
        assert_eq!(request.facility, vec!["ny5"]);
        assert!(request.tags.is_empty());
        assert_eq!(request.locked, None);
    }
}
