use async_trait::async_trait;
use metal_provider_api::{
    ApiError, Href, MetalClient, SpotMarketInstanceParameters, SpotMarketRequest,
    SpotMarketRequestCreateRequest,
};
use metal_provider_crd::{SpotMarketRequestObservation, SpotMarketRequestParameters};
#[cfg(test)]
use mockall::automock;

use crate::clients::{MapperError, ObservationError, custom_data, parse_time};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpotMarketService: Send + Sync {
    async fn get(&self, id: &str) -> Result<SpotMarketRequest, ApiError>;

    async fn create(
        &self,
        project_id: &str,
        request: &SpotMarketRequestCreateRequest,
    ) -> Result<SpotMarketRequest, ApiError>;

    async fn delete(&self, id: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl SpotMarketService for MetalClient {
    async fn get(&self, id: &str) -> Result<SpotMarketRequest, ApiError> {
        self.get_spot_market_request(id).await
    }

    async fn create(
        &self,
        project_id: &str,
        request: &SpotMarketRequestCreateRequest,
    ) -> Result<SpotMarketRequest, ApiError> {
        self.create_spot_market_request(project_id, request).await
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.delete_spot_market_request(id, true).await
    }
}

pub fn create_request(
    parameters: &SpotMarketRequestParameters,
) -> Result<SpotMarketRequestCreateRequest, MapperError> {
    let max_bid_price = parameters
        .max_bid_price
        .trim()
        .parse::<f64>()
        .map_err(|source| MapperError::BidPrice {
            value: parameters.max_bid_price.clone(),
            source,
        })?;

    let attributes = &parameters.attributes;

    Ok(SpotMarketRequestCreateRequest {
        devices_max: parameters.devices_max,
        devices_min: parameters.devices_min,
        end_at: parameters.end_at.as_ref().map(|time| time.0.to_string()),
        facilities: parameters.facilities.clone(),
        max_bid_price,
        instance_parameters: SpotMarketInstanceParameters {
            always_pxe: attributes.always_pxe,
            billing_cycle: attributes.billing_cycle.clone(),
            customdata: attributes.custom_data.as_deref().map(custom_data),
            description: attributes.description.clone(),
            features: attributes.features.clone(),
            hostname: attributes.hostname.clone(),
            hostnames: attributes.hostnames.clone(),
            locked: attributes.locked,
            operating_system: attributes.operating_system.clone(),
            plan: attributes.plan.clone(),
            project_ssh_keys: attributes.project_ssh_keys.clone(),
            tags: attributes.tags.clone(),
            termination_time: attributes
                .termination_time
                .as_ref()
                .map(|time| time.0.to_string()),
            user_ssh_keys: attributes.user_ssh_keys.clone(),
            userdata: attributes.user_data.clone().unwrap_or_default(),
        },
    })
}

pub fn generate_observation(
    request: &SpotMarketRequest,
) -> Result<SpotMarketRequestObservation, ObservationError> {
    Ok(SpotMarketRequestObservation {
        id: request.id.clone(),
        href: request.href.clone(),
        created_at: parse_time(&request.created_at)?,
        device_ids: request
            .devices
            .iter()
            .map(Href::id)
            .map(str::to_owned)
            .collect(),
    })
}
