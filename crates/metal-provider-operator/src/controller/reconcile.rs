use std::{sync::Arc, time::Duration};

use k8s_openapi::api::core::v1::Secret;
use kube::{
    Api,
    runtime::{
        controller::Action,
        finalizer::{self, Event, finalizer},
    },
};
use metal_provider_api::StatusCode;
use metal_provider_crd::{Condition, DeletionPolicy, EXTERNAL_CREATE_PENDING_ANNOTATION};
use tracing::{Level, debug, info, instrument, warn};

use crate::{
    controller::{context::Context, secret::connection_secret},
    k8s::{
        managed_ext::{
            patch_ext::{PatchError, PatchExt as _},
            status_ext::{StatusError, StatusExt as _},
        },
        reference_ext::ReferenceError,
        secret_ext::{
            apply_ext::{ApplyError, ApplyExt as _},
            owner_ext::OwnerError,
        },
    },
    managed::{
        Connect, ConnectError, ConnectionDetails, ExternalClient, ExternalError, ExternalUpdate,
    },
};

pub const FINALIZER: &str = "metal.equinix.com/finalizer";

/// Requeue delay while a resource is still converging on its desired state.
const CONVERGING: Duration = Duration::from_secs(5);

const RECORD_ATTEMPTS: u32 = 3;
const RECORD_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error(transparent)]
    External(#[from] ExternalError),

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Owner(#[from] OwnerError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error(
        "A create call started at {0} was never recorded. Remove the {annotation} annotation once no duplicate remote object exists.",
        annotation = EXTERNAL_CREATE_PENDING_ANNOTATION
    )]
    CreatePending(String),

    #[error("Remote object is still being deleted.")]
    DeletionPending,

    #[error("Finalizer failed: {0}")]
    Finalizer(#[source] Box<finalizer::Error<Self>>),
}

impl From<finalizer::Error<Self>> for ReconcileError {
    fn from(error: finalizer::Error<Self>) -> Self {
        Self::Finalizer(Box::new(error))
    }
}

impl ReconcileError {
    /// The error raised by apply or cleanup, unwrapped from the finalizer.
    fn cause(&self) -> &Self {
        match self {
            Self::Finalizer(error) => match error.as_ref() {
                finalizer::Error::ApplyFailed(error) | finalizer::Error::CleanupFailed(error) => {
                    error.cause()
                }
                _ => self,
            },
            _ => self,
        }
    }

    fn is_connect(&self) -> bool {
        matches!(self.cause(), Self::Connect(_))
    }

    fn is_throttled(&self) -> bool {
        matches!(
            self.cause(),
            Self::External(error) if error.status() == Some(StatusCode::TOO_MANY_REQUESTS)
        )
    }
}

#[instrument(
    skip_all,
    fields(name = object.meta().name, external_name = object.external_name()),
    ret(level = Level::DEBUG),
    err(level = Level::WARN)
)]
pub async fn reconcile<K>(object: Arc<K>, ctx: Arc<Context>) -> Result<Action, ReconcileError>
where
    K: Connect,
{
    let api: Api<K> = Api::all(ctx.client());

    Ok(finalizer(&api, FINALIZER, object, |event| async {
        match event {
            Event::Apply(object) => apply(&api, object, &ctx).await,
            Event::Cleanup(object) => cleanup(&api, object, &ctx).await,
        }
    })
    .await?)
}

async fn apply<K>(api: &Api<K>, object: Arc<K>, ctx: &Context) -> Result<Action, ReconcileError>
where
    K: Connect,
{
    let mut object = Arc::unwrap_or_clone(object);

    match sync(api, &mut object, ctx).await {
        Ok(action) => {
            object.set_condition(Condition::reconcile_success());
            api.set_status(&object).await?;

            Ok(action)
        }
        Err(err) => {
            object.set_condition(Condition::reconcile_error(err.to_string()));
            let _ = api.set_status(&object).await;

            Err(err)
        }
    }
}

async fn sync<K>(api: &Api<K>, object: &mut K, ctx: &Context) -> Result<Action, ReconcileError>
where
    K: Connect,
{
    if object.resolve_references(&ctx.client()).await? {
        debug!("Persisting resolved references.");
        api.patch_for_provider(object).await?;
    }

    let external = ctx.connect(&*object).await?;
    converge(api, object, external.as_ref(), ctx).await
}

/// One observe and act pass. Makes at most one change to the remote object.
async fn converge<K>(
    api: &Api<K>,
    object: &mut K,
    external: &dyn ExternalClient<K>,
    ctx: &Context,
) -> Result<Action, ReconcileError>
where
    K: Connect,
{
    let observation = external.observe(object).await?;

    if !observation.resource_exists {
        return create(api, object, external, ctx).await;
    }

    if observation.resource_late_initialized {
        debug!("Persisting late initialized parameters.");
        api.patch_for_provider(object).await?;
    }

    publish(object, &observation.connection_details, ctx).await?;

    if observation.resource_up_to_date {
        return Ok(Action::requeue(ctx.poll_interval()));
    }

    match external.update(object).await? {
        ExternalUpdate::Sent => {
            info!("Updated remote object.");
            Ok(Action::requeue(CONVERGING))
        }
        ExternalUpdate::Skipped => {
            debug!("Remote object cannot be updated in place.");
            Ok(Action::requeue(ctx.poll_interval()))
        }
    }
}

/// Creates the remote object. The create-pending annotation brackets the call
/// so that a result lost on the way to the cluster is never created twice.
async fn create<K>(
    api: &Api<K>,
    object: &mut K,
    external: &dyn ExternalClient<K>,
    ctx: &Context,
) -> Result<Action, ReconcileError>
where
    K: Connect,
{
    if let Some(since) = object.create_pending() {
        return Err(ReconcileError::CreatePending(since.to_owned()));
    }

    object.set_create_pending(true);
    api.patch_annotations(object).await?;

    let creation = match external.create(object).await {
        Ok(creation) => creation,
        Err(err) => {
            object.set_create_pending(false);
            let _ = api.patch_annotations(object).await;

            return Err(err.into());
        }
    };

    object.set_create_pending(false);
    record_external_name(api, object).await?;
    publish(object, &creation.connection_details, ctx).await?;

    info!(external_name = object.external_name(), "Created remote object.");
    Ok(Action::requeue(CONVERGING))
}

/// Persists the external name of a freshly created object, retrying failed
/// patches.
async fn record_external_name<K>(api: &Api<K>, object: &K) -> Result<(), PatchError>
where
    K: Connect,
{
    let mut attempt = 1;

    loop {
        match api.patch_annotations(object).await {
            Ok(()) => return Ok(()),
            Err(err) if attempt < RECORD_ATTEMPTS => {
                warn!(attempt, "Cannot record external name: {}", err);
                attempt += 1;
                tokio::time::sleep(RECORD_BACKOFF).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Deletes the remote object. The finalizer is only released once the remote
/// object is gone.
async fn cleanup<K>(api: &Api<K>, object: Arc<K>, ctx: &Context) -> Result<Action, ReconcileError>
where
    K: Connect,
{
    if object.resource_spec().deletion_policy == DeletionPolicy::Orphan {
        info!("Orphaning remote object.");
        return Ok(Action::await_change());
    }

    let mut object = Arc::unwrap_or_clone(object);

    let external = ctx.connect(&object).await?;
    release(api, &mut object, external.as_ref()).await
}

async fn release<K>(
    api: &Api<K>,
    object: &mut K,
    external: &dyn ExternalClient<K>,
) -> Result<Action, ReconcileError>
where
    K: Connect,
{
    let observation = external.observe(object).await?;

    if !observation.resource_exists {
        return Ok(Action::await_change());
    }

    external.delete(object).await?;
    let _ = api.set_status(object).await;

    info!("Deleting remote object.");
    Err(ReconcileError::DeletionPending)
}

async fn publish<K>(
    object: &K,
    details: &ConnectionDetails,
    ctx: &Context,
) -> Result<(), ReconcileError>
where
    K: Connect,
{
    let Some(secret) = connection_secret(object, details)? else {
        return Ok(());
    };

    let namespace = secret.metadata.namespace.clone().unwrap_or_default();
    let secrets: Api<Secret> = Api::namespaced(ctx.client(), &namespace);
    secrets.apply_object(&secret).await?;

    Ok(())
}

#[instrument(
    skip_all,
    fields(name = object.meta().name),
    ret(level = Level::DEBUG),
)]
#[allow(clippy::needless_pass_by_value)]
pub fn error_policy<K>(object: Arc<K>, error: &ReconcileError, _ctx: Arc<Context>) -> Action
where
    K: Connect,
{
    if error.is_connect() || error.is_throttled() {
        Action::requeue(Duration::from_secs(60))
    } else {
        Action::requeue(Duration::from_secs(15))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use envconfig::Envconfig as _;
    use http::Method;
    use kube::Client;
    use metal_provider_api::ApiError;
    use metal_provider_crd::{
        EXTERNAL_NAME_ANNOTATION, Managed, Project, ProjectSpec, Reason, SecretReference, Status, Type,
    };
    use serde_json::{Value, json};

    use super::*;
    use crate::{
        k8s::api_server,
        managed::{
            Config, ExternalCreation, ExternalObservation, MetalConnecter, MockExternalClient,
        },
    };

    const POLL: Duration = Duration::from_secs(60);

    fn context(client: Client) -> Context {
        let config = Config::init_from_hashmap(&HashMap::new()).unwrap();
        let connecter = MetalConnecter::new(client.clone(), &config).unwrap();

        Context::from((client, connecter, POLL))
    }

    fn project() -> Project {
        let mut project = Project::new("example", ProjectSpec::default());
        project.metadata.uid = Some("uid-1".to_owned());
        project
    }

    fn stored(project: &Project) -> Value {
        serde_json::to_value(project).unwrap()
    }

    fn up_to_date() -> ExternalObservation {
        ExternalObservation {
            resource_exists: true,
            resource_up_to_date: true,
            ..Default::default()
        }
    }

    fn annotation<'a>(request: &'a api_server::Received, key: &str) -> &'a Value {
        &request.body["metadata"]["annotations"][key]
    }

    #[tokio::test]
    async fn orphan_policy_skips_remote_delete() {
        let (client, server) = api_server::pair();
        drop(server);

        let ctx = context(client.clone());
        let api: Api<Project> = Api::all(client);
        let mut project = project();
        project.spec.resource.deletion_policy = DeletionPolicy::Orphan;

        let action = cleanup(&api, Arc::new(project), &ctx).await.unwrap();

        assert_eq!(action, Action::await_change());
    }

    #[tokio::test]
    async fn deletion_holds_finalizer_while_remote_exists() {
        let (client, mut server) = api_server::pair();

        let script = tokio::spawn(async move {
            let read = server.ok(stored(&project())).await;
            assert_eq!(read.method, Method::GET);
            assert!(read.path.ends_with("/projects/example/status"));

            let write = server.ok(stored(&project())).await;
            assert_eq!(write.method, Method::PUT);
            assert_eq!(
                write.body["status"]["conditions"][0]["reason"],
                json!("Deleting")
            );
        });

        let api: Api<Project> = Api::all(client);
        let mut external = MockExternalClient::<Project>::new();
        external.expect_observe().returning(|_| Ok(up_to_date()));
        external.expect_delete().times(1).returning(|project| {
            project.set_condition(Condition::deleting());
            Ok(())
        });

        let err = release(&api, &mut project(), &external).await.unwrap_err();

        script.await.unwrap();
        assert!(matches!(err, ReconcileError::DeletionPending));
    }

    #[tokio::test]
    async fn finalizer_is_released_once_remote_is_gone() {
        let (client, server) = api_server::pair();
        drop(server);

        let api: Api<Project> = Api::all(client);
        let mut external = MockExternalClient::<Project>::new();
        external
            .expect_observe()
            .returning(|_| Ok(ExternalObservation::not_exists()));
        external.expect_delete().never();

        let action = release(&api, &mut project(), &external).await.unwrap();

        assert_eq!(action, Action::await_change());
    }

    #[tokio::test]
    async fn create_is_bracketed_by_pending_annotation() {
        let (client, mut server) = api_server::pair();

        let script = tokio::spawn(async move {
            let before = server.ok(stored(&project())).await;
            assert_eq!(before.method, Method::PATCH);
            assert!(annotation(&before, EXTERNAL_CREATE_PENDING_ANNOTATION).is_string());
            assert!(annotation(&before, EXTERNAL_NAME_ANNOTATION).is_null());

            let after = server.ok(stored(&project())).await;
            assert_eq!(annotation(&after, EXTERNAL_NAME_ANNOTATION), &json!("proj-1"));
            assert!(annotation(&after, EXTERNAL_CREATE_PENDING_ANNOTATION).is_null());
        });

        let ctx = context(client.clone());
        let api: Api<Project> = Api::all(client);
        let mut external = MockExternalClient::<Project>::new();
        external
            .expect_observe()
            .returning(|_| Ok(ExternalObservation::not_exists()));
        external.expect_create().times(1).returning(|project| {
            project.set_external_name("proj-1");
            Ok(ExternalCreation::default())
        });

        let mut project = project();
        let action = converge(&api, &mut project, &external, &ctx).await.unwrap();

        script.await.unwrap();
        assert_eq!(action, Action::requeue(CONVERGING));
        assert_eq!(project.create_pending(), None);
    }

    #[tokio::test]
    async fn unrecorded_create_is_not_repeated() {
        let (client, server) = api_server::pair();
        drop(server);

        let ctx = context(client.clone());
        let api: Api<Project> = Api::all(client);
        let mut external = MockExternalClient::<Project>::new();
        external
            .expect_observe()
            .returning(|_| Ok(ExternalObservation::not_exists()));
        external.expect_create().never();

        let mut project = project();
        project.set_create_pending(true);

        let err = converge(&api, &mut project, &external, &ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::CreatePending(_)));
        assert!(err.to_string().contains(EXTERNAL_CREATE_PENDING_ANNOTATION));
    }

    #[tokio::test]
    async fn external_name_is_recorded_after_transient_failure() {
        let (client, mut server) = api_server::pair();

        let script = tokio::spawn(async move {
            server.ok(stored(&project())).await;
            server.unavailable().await;

            let retry = server.ok(stored(&project())).await;
            assert_eq!(annotation(&retry, EXTERNAL_NAME_ANNOTATION), &json!("proj-1"));
        });

        let ctx = context(client.clone());
        let api: Api<Project> = Api::all(client);
        let mut external = MockExternalClient::<Project>::new();
        external
            .expect_observe()
            .returning(|_| Ok(ExternalObservation::not_exists()));
        external.expect_create().times(1).returning(|project| {
            project.set_external_name("proj-1");
            Ok(ExternalCreation::default())
        });

        let action = converge(&api, &mut project(), &external, &ctx)
            .await
            .unwrap();

        script.await.unwrap();
        assert_eq!(action, Action::requeue(CONVERGING));
    }

    #[tokio::test]
    async fn failed_create_clears_pending_annotation() {
        let (client, mut server) = api_server::pair();

        let script = tokio::spawn(async move {
            server.ok(stored(&project())).await;

            let cleared = server.ok(stored(&project())).await;
            assert!(annotation(&cleared, EXTERNAL_CREATE_PENDING_ANNOTATION).is_null());
        });

        let ctx = context(client.clone());
        let api: Api<Project> = Api::all(client);
        let mut external = MockExternalClient::<Project>::new();
        external
            .expect_observe()
            .returning(|_| Ok(ExternalObservation::not_exists()));
        external.expect_create().times(1).returning(|_| {
            Err(ExternalError::Create(
                "Project",
                ApiError::Response {
                    status: StatusCode::UNPROCESSABLE_ENTITY,
                    errors: vec!["name is taken".to_owned()],
                },
            ))
        });

        let mut project = project();
        let err = converge(&api, &mut project, &external, &ctx)
            .await
            .unwrap_err();

        script.await.unwrap();
        assert!(matches!(err, ReconcileError::External(_)));
        assert_eq!(project.create_pending(), None);
    }

    #[tokio::test]
    async fn empty_connection_details_publish_nothing() {
        let (client, server) = api_server::pair();
        drop(server);

        let ctx = context(client.clone());
        let api: Api<Project> = Api::all(client);
        let mut external = MockExternalClient::<Project>::new();
        external.expect_observe().returning(|_| Ok(up_to_date()));

        let mut project = project();
        project.set_external_name("proj-1");
        project.spec.resource.write_connection_secret_to_ref = Some(SecretReference {
            namespace: "crossplane-system".to_owned(),
            name: "example-conn".to_owned(),
        });

        let action = converge(&api, &mut project, &external, &ctx).await.unwrap();

        assert_eq!(action, Action::requeue(POLL));
    }

    #[tokio::test]
    async fn connection_details_are_applied_to_secret() {
        let (client, mut server) = api_server::pair();

        let script = tokio::spawn(async move {
            let apply = server
                .ok(json!({
                    "apiVersion": "v1",
                    "kind": "Secret",
                    "metadata": { "name": "example-conn", "namespace": "crossplane-system" },
                }))
                .await;

            assert_eq!(apply.method, Method::PATCH);
            assert_eq!(
                apply.path,
                "/api/v1/namespaces/crossplane-system/secrets/example-conn"
            );
            assert!(apply.query.contains("fieldManager=metal-provider-operator"));
            assert_eq!(apply.body["data"]["password"], json!("aHVudGVyMg=="));
        });

        let ctx = context(client.clone());
        let api: Api<Project> = Api::all(client);
        let mut external = MockExternalClient::<Project>::new();
        external.expect_observe().returning(|_| {
            Ok(ExternalObservation {
                connection_details: BTreeMap::from([(
                    "password".to_owned(),
                    "hunter2".to_owned(),
                )]),
                ..up_to_date()
            })
        });

        let mut project = project();
        project.set_external_name("proj-1");
        project.spec.resource.write_connection_secret_to_ref = Some(SecretReference {
            namespace: "crossplane-system".to_owned(),
            name: "example-conn".to_owned(),
        });

        let action = converge(&api, &mut project, &external, &ctx).await.unwrap();

        script.await.unwrap();
        assert_eq!(action, Action::requeue(POLL));
    }

    #[tokio::test]
    async fn requeue_follows_whether_update_was_sent() {
        let (client, server) = api_server::pair();
        drop(server);

        let ctx = context(client.clone());
        let api: Api<Project> = Api::all(client);

        for (update, expected) in [
            (ExternalUpdate::Sent, Action::requeue(CONVERGING)),
            (ExternalUpdate::Skipped, Action::requeue(POLL)),
        ] {
            let mut external = MockExternalClient::<Project>::new();
            external.expect_observe().returning(|_| {
                Ok(ExternalObservation {
                    resource_up_to_date: false,
                    ..up_to_date()
                })
            });
            external
                .expect_update()
                .times(1)
                .returning(move |_| Ok(update));

            let mut project = project();
            project.set_external_name("proj-1");

            let action = converge(&api, &mut project, &external, &ctx).await.unwrap();

            assert_eq!(action, expected, "{update:?}");
        }
    }

    #[tokio::test]
    async fn sync_error_is_recorded_in_synced_condition() {
        let (client, mut server) = api_server::pair();

        let script = tokio::spawn(async move {
            server.ok(stored(&project())).await;

            let write = server.ok(stored(&project())).await;
            assert_eq!(write.method, Method::PUT);
            write.body
        });

        let ctx = context(client.clone());
        let api: Api<Project> = Api::all(client);

        let err = apply(&api, Arc::new(project()), &ctx).await.unwrap_err();

        let written: Project = serde_json::from_value(script.await.unwrap()).unwrap();
        let synced = written
            .status
            .as_ref()
            .and_then(|status| status.condition(Type::Synced))
            .cloned()
            .unwrap();

        assert!(matches!(
            err,
            ReconcileError::Connect(ConnectError::MissingProviderConfigRef)
        ));
        assert_eq!(synced.status, Status::False);
        assert_eq!(synced.reason, Reason::ReconcileError);
        assert_eq!(synced.message, err.to_string());
    }

    #[test]
    fn connect_errors_are_found_behind_the_finalizer() {
        let error = ReconcileError::from(finalizer::Error::ApplyFailed(ReconcileError::Connect(
            ConnectError::MissingApiKey,
        )));

        assert!(error.is_connect());
        assert!(!ReconcileError::DeletionPending.is_connect());
        assert!(
            !ReconcileError::from(finalizer::Error::CleanupFailed(
                ReconcileError::DeletionPending
            ))
            .is_connect()
        );
    }

    #[tokio::test]
    async fn throttled_requests_back_off() {
        let (client, server) = api_server::pair();
        drop(server);

        let throttled = ReconcileError::from(finalizer::Error::ApplyFailed(
            ReconcileError::External(ExternalError::Get(
                "Project",
                ApiError::Response {
                    status: StatusCode::TOO_MANY_REQUESTS,
                    errors: vec!["rate limited".to_owned()],
                },
            )),
        ));
        let rejected = ReconcileError::External(ExternalError::Get(
            "Project",
            ApiError::Response {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                errors: vec![],
            },
        ));

        let ctx = Arc::new(context(client));

        assert!(throttled.is_throttled());
        assert!(!rejected.is_throttled());
        assert_eq!(
            error_policy(Arc::new(project()), &throttled, ctx.clone()),
            Action::requeue(Duration::from_secs(60))
        );
        assert_eq!(
            error_policy(Arc::new(project()), &rejected, ctx),
            Action::requeue(Duration::from_secs(15))
        );
    }
}
