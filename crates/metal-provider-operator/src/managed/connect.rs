use std::{fmt, time::Duration};

use envconfig::Envconfig;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use metal_provider_api::{ApiError, MetalClient};
use metal_provider_crd::{ProviderConfig, ResourceSpec};
use serde::Deserialize;
use tracing::{Level, debug, instrument};

use crate::managed::{Connect, ExternalClient};

#[derive(Debug, Envconfig)]
pub struct Config {
    #[envconfig(
        from = "METAL_PROVIDER__API_URL",
        default = "https://api.equinix.com/metal/v1/"
    )]
    api_url: String,

    #[envconfig(from = "METAL_PROVIDER__API_TIMEOUT_SECONDS", default = "30")]
    api_timeout_seconds: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("No providerConfigRef given.")]
    MissingProviderConfigRef,

    #[error("Cannot get ProviderConfig {name:?}: {source}")]
    GetProviderConfig {
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("ProviderConfig {0:?} has no credentials secretRef.")]
    MissingSecretRef(String),

    #[error("Cannot get credentials secret {namespace}/{name}: {source}")]
    GetSecret {
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("Credentials secret has no key {0:?}.")]
    MissingSecretKey(String),

    #[error("Cannot parse credentials: {0}")]
    Credentials(#[from] serde_json::Error),

    #[error("Invalid apiKey in credentials.")]
    MissingApiKey,

    #[error(transparent)]
    Client(#[from] ApiError),
}

/// Contents of the credentials secret.
#[derive(Default, Clone, Deserialize)]
pub struct Credentials {
    #[serde(rename = "apiKey", default)]
    pub api_key: String,

    #[serde(rename = "projectID", default)]
    pub project_id: String,

    #[serde(rename = "facilityID", default)]
    pub facility_id: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("facility_id", &self.facility_id)
            .finish()
    }
}

/// Extracts credentials from the secret referenced by the provider config.
/// A project configured on the provider config wins over the one in the
/// secret.
pub fn credentials_from_secret(
    config: &ProviderConfig,
    secret: &Secret,
) -> Result<Credentials, ConnectError> {
    let name = config.metadata.name.clone().unwrap_or_default();
    let selector = config
        .spec
        .credentials
        .secret_ref
        .as_ref()
        .ok_or(ConnectError::MissingSecretRef(name))?;

    let data = secret
        .data
        .as_ref()
        .and_then(|data| data.get(&selector.key))
        .ok_or_else(|| ConnectError::MissingSecretKey(selector.key.clone()))?;

    let mut credentials: Credentials = serde_json::from_slice(&data.0)?;

    if let Some(project_id) = config.spec.project_id.as_ref().filter(|id| !id.is_empty()) {
        credentials.project_id.clone_from(project_id);
    }

    if credentials.api_key.is_empty() {
        return Err(ConnectError::MissingApiKey);
    }

    Ok(credentials)
}

/// Resolves credentials for a managed resource and hands out API clients
/// authenticated with them.
#[derive(Clone)]
pub struct MetalConnecter {
    kube: Client,
    metal: MetalClient,
}

impl MetalConnecter {
    pub fn new(kube: Client, config: &Config) -> Result<Self, ConnectError> {
        let metal = MetalClient::new(
            &config.api_url,
            Duration::from_secs(config.api_timeout_seconds),
        )?;

        Ok(Self { kube, metal })
    }

    #[instrument(skip_all, err(level = Level::WARN))]
    pub async fn connect<K>(&self, object: &K) -> Result<Box<dyn ExternalClient<K>>, ConnectError>
    where
        K: Connect,
    {
        let credentials = self.credentials(object.resource_spec()).await?;
        let client = self.metal.with_api_key(&credentials.api_key);

        Ok(K::external(client, &credentials))
    }

    async fn credentials(&self, spec: &ResourceSpec) -> Result<Credentials, ConnectError> {
        let reference = spec
            .provider_config_ref
            .as_ref()
            .ok_or(ConnectError::MissingProviderConfigRef)?;

        let configs: Api<ProviderConfig> = Api::all(self.kube.clone());
        let config = configs
            .get(&reference.name)
            .await
            .map_err(|source| ConnectError::GetProviderConfig {
                name: reference.name.clone(),
                source,
            })?;

        let selector = config
            .spec
            .credentials
            .secret_ref
            .as_ref()
            .ok_or_else(|| ConnectError::MissingSecretRef(reference.name.clone()))?;

        let secrets: Api<Secret> = Api::namespaced(self.kube.clone(), &selector.namespace);
        let secret =
            secrets
                .get(&selector.name)
                .await
                .map_err(|source| ConnectError::GetSecret {
                    namespace: selector.namespace.clone(),
                    name: selector.name.clone(),
                    source,
                })?;

        let credentials = credentials_from_secret(&config, &secret)?;
        debug!(?credentials, "Resolved credentials.");

        Ok(credentials)
    }
}
