use std::{fmt, time::Duration};

use reqwest::{
    Method, RequestBuilder, Response, Url,
    header::{ACCEPT, HeaderValue},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{Level, instrument, trace};

use crate::ApiError;

const AUTH_HEADER: &str = "X-Auth-Token";
const USER_AGENT: &str = concat!("metal-provider/", env!("CARGO_PKG_VERSION"));

/// Client for the Equinix Metal API.
///
/// Cloning is cheap. All clones, including those handed out by
/// [`MetalClient::with_api_key`], share one connection pool.
#[derive(Clone)]
pub struct MetalClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl fmt::Debug for MetalClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetalClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

impl MetalClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        let base_url = if base_url.ends_with('/') {
            base_url.to_owned()
        } else {
            format!("{base_url}/")
        };

        let base_url = Url::parse(&base_url).map_err(|err| ApiError::Url(err.to_string()))?;

        Ok(Self {
            http,
            base_url,
            api_key: String::new(),
        })
    }

    /// A client authenticating with the given key.
    #[must_use]
    pub fn with_api_key(&self, api_key: &str) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            api_key: api_key.to_owned(),
        }
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| ApiError::Url(err.to_string()))?;

        let api_key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| ApiError::Url("API key is not a valid header value".to_owned()))?;

        Ok(self
            .http
            .request(method, url)
            .header(AUTH_HEADER, api_key)
            .header(ACCEPT, "application/json"))
    }

    pub(crate) async fn get<T>(&self, path: &str) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(self.request(Method::GET, path)?).await?;
        Ok(response.json().await?)
    }

    pub(crate) async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send(self.request(Method::POST, path)?.json(body))
            .await?;

        Ok(response.json().await?)
    }

    pub(crate) async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send(self.request(Method::PUT, path)?.json(body))
            .await?;

        Ok(response.json().await?)
    }

    pub(crate) async fn delete(&self, path: &str, query: &[(&str, &str)]) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, path)?.query(query))
            .await?;

        Ok(())
    }

    #[instrument(skip_all, err(level = Level::DEBUG))]
    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        trace!(%status, url = %response.url(), "Received response.");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let ErrorBody { mut errors, error } = serde_json::from_str(&body).unwrap_or_default();
        errors.extend(error);

        if errors.is_empty() && !body.is_empty() {
            errors.push(body);
        }

        Err(ApiError::Response { status, errors })
    }
}
