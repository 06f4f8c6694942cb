use async_trait::async_trait;
use metal_provider_api::MetalClient;
use metal_provider_crd::{Condition, Managed as _, SpotMarketRequest};
use tracing::{Level, instrument};

use crate::{
    clients::spot_market::{SpotMarketService, create_request, generate_observation},
    external::{deleted, found},
    managed::{
        Connect, Credentials, ExternalClient, ExternalCreation, ExternalError,
        ExternalObservation, ExternalUpdate, ResolveReferences,
    },
};

const KIND: &str = "SpotMarketRequest";

pub struct SpotMarketExternal<S> {
    service: S,
    project_id: String,
}

impl<S> SpotMarketExternal<S> {
    pub fn new(service: S, project_id: String) -> Self {
        Self {
            service,
            project_id,
        }
    }
}

impl ResolveReferences for SpotMarketRequest {}

impl Connect for SpotMarketRequest {
    fn external(client: MetalClient, credentials: &Credentials) -> Box<dyn ExternalClient<Self>> {
        Box::new(SpotMarketExternal::new(
            client,
            credentials.project_id.clone(),
        ))
    }
}

#[async_trait]
impl<S> ExternalClient<SpotMarketRequest> for SpotMarketExternal<S>
where
    S: SpotMarketService,
{
    #[instrument(skip_all, fields(name = request.metadata.name), ret(level = Level::DEBUG), err(level = Level::WARN))]
    async fn observe(
        &self,
        request: &mut SpotMarketRequest,
    ) -> Result<ExternalObservation, ExternalError> {
        let Some(id) = request.external_name().map(str::to_owned) else {
            return Ok(ExternalObservation::not_exists());
        };

        let Some(remote) = found(self.service.get(&id).await, KIND)? else {
            return Ok(ExternalObservation::not_exists());
        };

        *request.at_provider_mut() =
            generate_observation(&remote).map_err(|err| ExternalError::Observation(KIND, err))?;
        request.set_condition(Condition::available());

        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: true,
            ..Default::default()
        })
    }

    #[instrument(skip_all, fields(name = request.metadata.name), err(level = Level::WARN))]
    async fn create(
        &self,
        request: &mut SpotMarketRequest,
    ) -> Result<ExternalCreation, ExternalError> {
        request.set_condition(Condition::creating());

        let body = create_request(&request.spec.for_provider)?;
        let remote = self
            .service
            .create(&self.project_id, &body)
            .await
            .map_err(|err| ExternalError::Create(KIND, err))?;

        request.set_external_name(&remote.id);
        request.at_provider_mut().id.clone_from(&remote.id);

        Ok(ExternalCreation::default())
    }

    /// Spot market requests are immutable once placed.
    async fn update(&self, _: &mut SpotMarketRequest) -> Result<ExternalUpdate, ExternalError> {
        Ok(ExternalUpdate::Skipped)
    }

    #[instrument(skip_all, fields(name = request.metadata.name), err(level = Level::WARN))]
    async fn delete(&self, request: &mut SpotMarketRequest) -> Result<(), ExternalError> {
        request.set_condition(Condition::deleting());

        let id = request
            .external_name()
            .ok_or(ExternalError::MissingExternalName(KIND))?;

        deleted(self.service.delete(id).await, KIND)
    }
}
