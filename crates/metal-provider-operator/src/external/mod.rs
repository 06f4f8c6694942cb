//! Lifecycle of each managed kind against the remote API.

mod device;
mod port_assignment;
mod project;
mod spot_market;
mod ssh_key;
mod virtual_network;

use metal_provider_api::ApiError;

use crate::managed::ExternalError;

/// Turns a failed lookup into `None` when the object is gone.
fn found<T>(result: Result<T, ApiError>, kind: &'static str) -> Result<Option<T>, ExternalError> {
    match result {
        Ok(object) => Ok(Some(object)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(ExternalError::Get(kind, err)),
    }
}

/// Deleting something that is already gone succeeds.
fn deleted<T>(result: Result<T, ApiError>, kind: &'static str) -> Result<(), ExternalError> {
    match result {
        Err(err) if !err.is_not_found() => Err(ExternalError::Delete(kind, err)),
        _ => Ok(()),
    }
}
