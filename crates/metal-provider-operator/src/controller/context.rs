use std::{ops::Deref, time::Duration};

use kube::Client;

use crate::managed::MetalConnecter;

pub struct Context {
    client: Client,
    connecter: MetalConnecter,
    poll_interval: Duration,
}

impl From<(Client, MetalConnecter, Duration)> for Context {
    fn from((client, connecter, poll_interval): (Client, MetalConnecter, Duration)) -> Self {
        Self {
            client,
            connecter,
            poll_interval,
        }
    }
}

impl Deref for Context {
    type Target = MetalConnecter;

    fn deref(&self) -> &Self::Target {
        &self.connecter
    }
}

impl Context {
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}
