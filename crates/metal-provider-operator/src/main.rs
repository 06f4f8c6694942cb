mod clients;
mod controller;
mod external;
mod k8s;
mod kind;
mod managed;

use anyhow::{Context as _, Result};
use envconfig::Envconfig;
use kube::Client;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::managed::MetalConnecter;

#[derive(Debug, Envconfig)]
struct Config {
    #[envconfig(nested)]
    controller: controller::Config,

    #[envconfig(nested)]
    metal: managed::Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,metal_provider_operator=debug")),
        )
        .init();

    let config = Config::init_from_env().context("Could not parse operator config.")?;
    debug!("{:#?}", config);

    let client = Client::try_default()
        .await
        .context("Could not connect to the cluster.")?;
    let connecter =
        MetalConnecter::new(client.clone(), &config.metal).context("Could not build API client.")?;

    controller::run(client, connecter, &config.controller).await;

    Ok(())
}
