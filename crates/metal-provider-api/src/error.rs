use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Equinix Metal API responded with {status}: {}", .errors.join(", "))]
    Response {
        status: StatusCode,
        errors: Vec<String>,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("Invalid API URL: {0}")]
    Url(String),

    #[error("Unsupported network type {0:?}.")]
    NetworkType(String),

    #[error("Device {device} has no port {port:?}.")]
    MissingPort { device: String, port: String },
}

impl ApiError {
    /// True only when the API answered with `404 Not Found`.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Response { status, .. } if *status == StatusCode::NOT_FOUND)
    }

    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Response { status, .. } => Some(*status),
            Self::Http(err) => err.status(),
            _ => None,
        }
    }
}
