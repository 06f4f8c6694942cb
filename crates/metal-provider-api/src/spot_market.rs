use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{Level, instrument};

use crate::{ApiError, Href, MetalClient, nullable};

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpotMarketRequest {
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub href: String,
    #[serde(deserialize_with = "nullable")]
    pub created_at: String,
    #[serde(deserialize_with = "nullable")]
    pub devices: Vec<Href>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SpotMarketRequestCreateRequest {
    pub devices_max: i32,
    pub devices_min: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_at: Option<String>,
    pub facilities: Vec<String>,
    pub max_bid_price: f64,
    pub instance_parameters: SpotMarketInstanceParameters,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SpotMarketInstanceParameters {
    pub always_pxe: bool,
    pub billing_cycle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customdata: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub features: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hostnames: Vec<String>,
    pub locked: bool,
    pub operating_system: String,
    pub plan: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub project_ssh_keys: Vec<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination_time: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_ssh_keys: Vec<String>,
    pub userdata: String,
}

impl MetalClient {
    #[instrument(skip(self), err(level = Level::DEBUG))]
    pub async fn get_spot_market_request(&self, id: &str) -> Result<SpotMarketRequest, ApiError> {
        self.get(&format!("spot-market-requests/{id}")).await
    }

    #[instrument(skip(self, request), err(level = Level::DEBUG))]
    pub async fn create_spot_market_request(
        &self,
        project_id: &str,
        request: &SpotMarketRequestCreateRequest,
    ) -> Result<SpotMarketRequest, ApiError> {
        self.post(
            &format!("projects/{project_id}/spot-market-requests"),
            request,
        )
        .await
    }

    /// With `force_termination`, devices spawned by the request are removed too.
    #[instrument(skip(self), err(level = Level::DEBUG))]
    pub async fn delete_spot_market_request(
        &self,
        id: &str,
        force_termination: bool,
    ) -> Result<(), ApiError> {
        let force = if force_termination { "true" } else { "false" };
        self.delete(
            &format!("spot-market-requests/{id}"),
            &[("force_termination", force)],
        )
        .await
    }
}
