use k8s_openapi::{ByteString, api::core::v1::Secret};
use kube::api::ObjectMeta;
use metal_provider_crd::Managed;

use crate::{
    k8s::secret_ext::owner_ext::{OwnerError, OwnerExt as _},
    managed::ConnectionDetails,
};

/// The secret to publish connection details of `object` to. `None` when the
/// resource asks for no secret or there is nothing to publish.
pub fn connection_secret<K>(
    object: &K,
    details: &ConnectionDetails,
) -> Result<Option<Secret>, OwnerError>
where
    K: Managed,
{
    let Some(reference) = &object.resource_spec().write_connection_secret_to_ref else {
        return Ok(None);
    };

    if details.is_empty() {
        return Ok(None);
    }

    let mut secret = Secret {
        metadata: ObjectMeta {
            name: Some(reference.name.clone()),
            namespace: Some(reference.namespace.clone()),
            ..Default::default()
        },
        data: Some(
            details
                .iter()
                .map(|(key, value)| (key.clone(), ByteString(value.clone().into_bytes())))
                .collect(),
        ),
        type_: Some("connection.crossplane.io/v1alpha1".to_owned()),
        ..Default::default()
    };

    secret.add_owner(object)?;

    Ok(Some(secret))
}
