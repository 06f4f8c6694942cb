use async_trait::async_trait;
use kube::{Api, Client};
use metal_provider_api::MetalClient;
use metal_provider_crd::{Condition, Managed as _, Project, SSHKey};
use tracing::{Level, instrument};

use crate::{
    clients::ssh_key::{
        SshKeyService, create_request, generate_observation, is_up_to_date,
        late_initialize_parameters, update_request,
    },
    external::{deleted, found},
    k8s::reference_ext::{ReferenceError, ReferenceExt as _},
    managed::{
        Connect, Credentials, ExternalClient, ExternalCreation, ExternalError,
        ExternalObservation, ExternalUpdate, ResolveReferences,
    },
};

const KIND: &str = "SSHKey";

pub struct SshKeyExternal<S> {
    service: S,
    project_id: String,
}

impl<S> SshKeyExternal<S> {
    pub fn new(service: S, project_id: String) -> Self {
        Self {
            service,
            project_id,
        }
    }
}

fn project_id(project: &Project) -> &str {
    project
        .managed_status()
        .map_or("", |status| status.at_provider.id.as_str())
}

#[async_trait]
impl ResolveReferences for SSHKey {
    #[instrument(skip_all, fields(name = self.metadata.name), err(level = Level::WARN))]
    async fn resolve_references(&mut self, client: &Client) -> Result<bool, ReferenceError> {
        let parameters = &mut self.spec.for_provider;
        let projects: Api<Project> = Api::all(client.clone());

        let Some(project) = projects
            .resolve(
                parameters.project_id.as_deref().unwrap_or_default(),
                parameters.project_id_ref.as_ref(),
                parameters.project_id_selector.as_ref(),
                project_id,
            )
            .await?
        else {
            return Ok(false);
        };

        parameters.project_id = Some(project.value);
        parameters.project_id_ref = Some(project.reference);

        Ok(true)
    }
}

impl Connect for SSHKey {
    fn external(client: MetalClient, credentials: &Credentials) -> Box<dyn ExternalClient<Self>> {
        Box::new(SshKeyExternal::new(client, credentials.project_id.clone()))
    }
}

#[async_trait]
impl<S> ExternalClient<SSHKey> for SshKeyExternal<S>
where
    S: SshKeyService,
{
    #[instrument(skip_all, fields(name = key.metadata.name), ret(level = Level::DEBUG), err(level = Level::WARN))]
    async fn observe(&self, key: &mut SSHKey) -> Result<ExternalObservation, ExternalError> {
        let Some(id) = key.external_name().map(str::to_owned) else {
            return Ok(ExternalObservation::not_exists());
        };

        let Some(remote) = found(self.service.get(&id).await, KIND)? else {
            return Ok(ExternalObservation::not_exists());
        };

        let late_initialized = late_initialize_parameters(&mut key.spec.for_provider, &remote);
        *key.at_provider_mut() =
            generate_observation(&remote).map_err(|err| ExternalError::Observation(KIND, err))?;
        key.set_condition(Condition::available());

        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: is_up_to_date(&key.spec.for_provider, &remote),
            resource_late_initialized: late_initialized,
            ..Default::default()
        })
    }

    #[instrument(skip_all, fields(name = key.metadata.name), err(level = Level::WARN))]
    async fn create(&self, key: &mut SSHKey) -> Result<ExternalCreation, ExternalError> {
        key.set_condition(Condition::creating());

        let project_id = key
            .spec
            .for_provider
            .project_id
            .as_deref()
            .unwrap_or(&self.project_id);

        let remote = self
            .service
            .create(project_id, &create_request(&key.spec.for_provider))
            .await
            .map_err(|err| ExternalError::Create(KIND, err))?;

        key.set_external_name(&remote.id);
        key.at_provider_mut().id.clone_from(&remote.id);

        Ok(ExternalCreation::default())
    }

    #[instrument(skip_all, fields(name = key.metadata.name), err(level = Level::WARN))]
    async fn update(&self, key: &mut SSHKey) -> Result<ExternalUpdate, ExternalError> {
        let id = key
            .external_name()
            .ok_or(ExternalError::MissingExternalName(KIND))?;

        self.service
            .update(id, &update_request(&key.spec.for_provider))
            .await
            .map_err(|err| ExternalError::Update(KIND, err))?;

        Ok(ExternalUpdate::Sent)
    }

    #[instrument(skip_all, fields(name = key.metadata.name), err(level = Level::WARN))]
    async fn delete(&self, key: &mut SSHKey) -> Result<(), ExternalError> {
        key.set_condition(Condition::deleting());

        let id = key
            .external_name()
            .ok_or(ExternalError::MissingExternalName(KIND))?;

        deleted(self.service.delete(id).await, KIND)
    }
}
