use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use kubedeck_types::ServerConfig;

use crate::request::to_pairs;
use crate::{ApiError, ApiRequest, HttpTransport, Method, RawResponse, RequestBody, RequestOptions, Transport};

/// Low-level request executor
///
/// Cheap to clone; clones share the same transport.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    default_timeout: Duration,
    default_headers: Vec<(String, String)>,
}

impl ApiClient {
    /// Create a client over any transport
    pub fn new(transport: Arc<dyn Transport>, default_timeout: Duration) -> Self {
        Self {
            transport,
            default_timeout,
            default_headers: Vec::new(),
        }
    }

    /// Create an HTTP client for the configured server
    pub fn from_config(config: &ServerConfig) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(config.base_url())?;
        Ok(Self::new(Arc::new(transport), config.timeout()).with_default_headers(
            config
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        ))
    }

    /// Headers sent with every request unless overridden per call
    pub fn with_default_headers<I>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.default_headers.extend(headers);
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub async fn get<R, Q>(&self, endpoint: &str, query: &Q, options: &RequestOptions) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.request(Method::GET, endpoint, query, None::<&()>, options)
            .await
    }

    /// GET a non-JSON body, e.g. container logs
    pub async fn get_text<Q>(&self, endpoint: &str, query: &Q, options: &RequestOptions) -> Result<String, ApiError>
    where
        Q: Serialize + ?Sized,
    {
        let response = self
            .send(Method::GET, endpoint, query, None::<&()>, options)
            .await?;
        Ok(String::from_utf8(response.body)?)
    }

    pub async fn post<R, Q, B>(&self, endpoint: &str, query: &Q, body: &B, options: &RequestOptions) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
        Q: Serialize + ?Sized,
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, endpoint, query, Some(body), options)
            .await
    }

    pub async fn put<R, Q, B>(&self, endpoint: &str, query: &Q, body: &B, options: &RequestOptions) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
        Q: Serialize + ?Sized,
        B: Serialize + ?Sized,
    {
        self.request(Method::PUT, endpoint, query, Some(body), options)
            .await
    }

    pub async fn patch<R, Q, B>(&self, endpoint: &str, query: &Q, body: &B, options: &RequestOptions) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
        Q: Serialize + ?Sized,
        B: Serialize + ?Sized,
    {
        self.request(Method::PATCH, endpoint, query, Some(body), options)
            .await
    }

    pub async fn delete<R, Q>(&self, endpoint: &str, query: &Q, options: &RequestOptions) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.request(Method::DELETE, endpoint, query, None::<&()>, options)
            .await
    }

    /// Issue a request and decode the JSON response as `R`
    pub async fn request<R, Q, B>(
        &self,
        method: Method,
        endpoint: &str,
        query: &Q,
        body: Option<&B>,
        options: &RequestOptions,
    ) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
        Q: Serialize + ?Sized,
        B: Serialize + ?Sized,
    {
        let response = self.send(method, endpoint, query, body, options).await?;
        decode(&response.body)
    }

    /// Issue a request and return the raw 2xx response
    pub async fn send<Q, B>(
        &self,
        method: Method,
        endpoint: &str,
        query: &Q,
        body: Option<&B>,
        options: &RequestOptions,
    ) -> Result<RawResponse, ApiError>
    where
        Q: Serialize + ?Sized,
        B: Serialize + ?Sized,
    {
        let request = self.build(method, endpoint, query, body, options)?;
        let method = request.method.clone();
        let endpoint = request.endpoint.clone();

        debug!(%method, %endpoint, query = ?request.query, "sending request");

        let response = match self.transport.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(%method, %endpoint, error = %err, "request failed");
                return Err(err);
            }
        };

        if !response.is_success() {
            let err = ApiError::from_response(response.status, &response.body);
            warn!(%method, %endpoint, status = response.status, error = %err, "request rejected");
            return Err(err);
        }

        debug!(%method, %endpoint, status = response.status, bytes = response.body.len(), "request completed");
        Ok(response)
    }

    fn build<Q, B>(
        &self,
        method: Method,
        endpoint: &str,
        query: &Q,
        body: Option<&B>,
        options: &RequestOptions,
    ) -> Result<ApiRequest, ApiError>
    where
        Q: Serialize + ?Sized,
        B: Serialize + ?Sized,
    {
        let body = match body {
            None => None,
            Some(body) if options.is_form_data => Some(RequestBody::Form(to_pairs(body)?)),
            Some(body) => Some(RequestBody::Json(
                serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))?,
            )),
        };

        let mut headers = self.default_headers.clone();
        for (name, value) in &options.headers {
            headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
            headers.push((name.clone(), value.clone()));
        }

        Ok(ApiRequest {
            method,
            endpoint: endpoint.to_string(),
            query: to_pairs(query)?,
            body,
            headers,
            timeout: options.timeout.unwrap_or(self.default_timeout),
        })
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("default_timeout", &self.default_timeout)
            .field("default_headers", &self.default_headers.len())
            .finish()
    }
}

/// Decode a JSON body; an empty body reads as `null`
fn decode<R: DeserializeOwned>(body: &[u8]) -> Result<R, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_slice(b"null")?);
    }
    Ok(serde_json::from_slice(body)?)
}
