use async_trait::async_trait;
use metal_provider_api::MetalClient;
use metal_provider_crd::{Condition, Managed as _, Project};
use tracing::{Level, instrument};

use crate::{
    clients::project::{
        ProjectService, create_request, generate_observation, is_up_to_date, update_request,
    },
    external::{deleted, found},
    managed::{
        Connect, Credentials, ExternalClient, ExternalCreation, ExternalError,
        ExternalObservation, ExternalUpdate, ResolveReferences,
    },
};

const KIND: &str = "Project";

pub struct ProjectExternal<S> {
    service: S,
}

impl<S> ProjectExternal<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

impl ResolveReferences for Project {}

impl Connect for Project {
    fn external(client: MetalClient, _: &Credentials) -> Box<dyn ExternalClient<Self>> {
        Box::new(ProjectExternal::new(client))
    }
}

#[async_trait]
impl<S> ExternalClient<Project> for ProjectExternal<S>
where
    S: ProjectService,
{
    #[instrument(skip_all, fields(name = project.metadata.name), ret(level = Level::DEBUG), err(level = Level::WARN))]
    async fn observe(&self, project: &mut Project) -> Result<ExternalObservation, ExternalError> {
        let Some(id) = project.external_name().map(str::to_owned) else {
            return Ok(ExternalObservation::not_exists());
        };

        let Some(remote) = found(self.service.get(&id).await, KIND)? else {
            return Ok(ExternalObservation::not_exists());
        };

        *project.at_provider_mut() =
            generate_observation(&remote).map_err(|err| ExternalError::Observation(KIND, err))?;
        project.set_condition(Condition::available());

        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: is_up_to_date(&project.spec.for_provider, &remote),
            ..Default::default()
        })
    }

    #[instrument(skip_all, fields(name = project.metadata.name), err(level = Level::WARN))]
    async fn create(&self, project: &mut Project) -> Result<ExternalCreation, ExternalError> {
        project.set_condition(Condition::creating());

        let remote = self
            .service
            .create(&create_request(&project.spec.for_provider))
            .await
            .map_err(|err| ExternalError::Create(KIND, err))?;

        project.set_external_name(&remote.id);
        project.at_provider_mut().id.clone_from(&remote.id);

        Ok(ExternalCreation::default())
    }

    #[instrument(skip_all, fields(name = project.metadata.name), err(level = Level::WARN))]
    async fn update(&self, project: &mut Project) -> Result<ExternalUpdate, ExternalError> {
        let id = project
            .external_name()
            .ok_or(ExternalError::MissingExternalName(KIND))?;

        self.service
            .update(id, &update_request(&project.spec.for_provider))
            .await
            .map_err(|err| ExternalError::Update(KIND, err))?;

        Ok(ExternalUpdate::Sent)
    }

    #[instrument(skip_all, fields(name = project.metadata.name), err(level = Level::WARN))]
    async fn delete(&self, project: &mut Project) -> Result<(), ExternalError> {
        project.set_condition(Condition::deleting());

        let id = project
            .external_name()
            .ok_or(ExternalError::MissingExternalName(KIND))?;

        deleted(self.service.delete(id).await, KIND)
    }
}
