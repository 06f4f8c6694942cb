mod context;
mod reconcile;
mod secret;

use std::{sync::Arc, time::Duration};

use envconfig::Envconfig;
use futures_util::{FutureExt as _, StreamExt as _, future::join_all};
use kube::{
    Api, Client,
    runtime::{Controller, controller, watcher},
};
use metal_provider_crd::{
    Device, PortAssignment, Project, SSHKey, SpotMarketRequest, VirtualNetwork,
};
use tracing::{info, warn};

use crate::{
    controller::{
        context::Context,
        reconcile::{error_policy, reconcile},
    },
    kind::{Kind, Kinds},
    managed::{Connect, MetalConnecter},
};

#[derive(Debug, Envconfig)]
pub struct Config {
    #[envconfig(from = "METAL_PROVIDER__CONTROLLERS", default = "all")]
    controllers: Kinds,

    #[envconfig(from = "METAL_PROVIDER__CONCURRENCY", default = "4")]
    concurrency: u16,

    #[envconfig(from = "METAL_PROVIDER__POLL_SECONDS", default = "60")]
    poll_seconds: u64,
}

/// Runs one controller per enabled kind until a shutdown signal arrives.
pub async fn run(client: Client, connecter: MetalConnecter, config: &Config) {
    let poll_interval = Duration::from_secs(config.poll_seconds);
    let ctx = Arc::new(Context::from((client, connecter, poll_interval)));

    let controllers = config.controllers.iter().map(|kind| {
        let ctx = ctx.clone();

        match kind {
            Kind::Device => run_kind::<Device>(kind, ctx, config.concurrency).boxed(),
            Kind::Project => run_kind::<Project>(kind, ctx, config.concurrency).boxed(),
            Kind::SshKey => run_kind::<SSHKey>(kind, ctx, config.concurrency).boxed(),
            Kind::VirtualNetwork => {
                run_kind::<VirtualNetwork>(kind, ctx, config.concurrency).boxed()
            }
            Kind::SpotMarketRequest => {
                run_kind::<SpotMarketRequest>(kind, ctx, config.concurrency).boxed()
            }
            Kind::PortAssignment => {
                run_kind::<PortAssignment>(kind, ctx, config.concurrency).boxed()
            }
        }
    });

    join_all(controllers).await;
}

async fn run_kind<K>(kind: Kind, ctx: Arc<Context>, concurrency: u16)
where
    K: Connect,
{
    let api: Api<K> = Api::all(ctx.client());

    info!(%kind, "Starting controller.");

    Controller::new(api, watcher::Config::default())
        .with_config(controller::Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(reconcile::<K>, error_policy::<K>, ctx)
        .for_each(|res| async move {
            if let Err(error) = res {
                warn!(%kind, "Reconciliation failed: {}", error);
            }
        })
        .await;

    info!(%kind, "Controller stopped.");
}
