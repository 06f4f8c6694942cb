//! Field mapping, drift detection and late initialization per kind, plus the
//! slice of the API each kind needs.

pub mod device;
pub mod port_assignment;
pub mod project;
pub mod spot_market;
pub mod ssh_key;
pub mod virtual_network;

use k8s_openapi::{apimachinery::pkg::apis::meta::v1::Time, jiff::Timestamp};

#[derive(Debug, thiserror::Error)]
pub enum ObservationError {
    #[error("Cannot parse timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        #[source]
        source: k8s_openapi::jiff::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    #[error("Invalid maxBidPrice {value:?}: {source}")]
    BidPrice {
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },
}

/// Parses an RFC 3339 timestamp. Empty text means the API did not report one.
pub fn parse_time(value: &str) -> Result<Option<Time>, ObservationError> {
    if value.is_empty() {
        return Ok(None);
    }

    let timestamp =
        value
            .parse::<Timestamp>()
            .map_err(|source| ObservationError::Timestamp {
                value: value.to_owned(),
                source,
            })?;

    Ok(Some(Time(timestamp)))
}

/// Fills `field` from `observed` unless the user set it already.
pub fn late_initialize<T>(field: &mut Option<T>, observed: Option<T>) -> bool {
    if field.is_some() || observed.is_none() {
        return false;
    }

    *field = observed;
    true
}

pub fn late_initialize_string(field: &mut String, observed: &str) -> bool {
    if !field.is_empty() || observed.is_empty() {
        return false;
    }

    observed.clone_into(field);
    true
}

pub fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}

/// True when the desired value is unset or equal to the observed one.
pub fn unset_or_equal<T>(desired: Option<&T>, observed: &T) -> bool
where
    T: PartialEq + ?Sized,
{
    desired.is_none_or(|desired| desired == observed)
}

/// Free form data is sent as JSON when it parses, otherwise as a string.
pub fn custom_data(value: &str) -> serde_json::Value {
    serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_owned()))
}
