use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::ApiError;

pub use reqwest::Method;

/// Body of an outgoing request
#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Form(Vec<(String, String)>),
}

/// A fully resolved request, ready for a [`Transport`]
#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub method: Method,

    /// Path relative to the configured base URL
    pub endpoint: String,

    pub query: Vec<(String, String)>,

    pub body: Option<RequestBody>,

    pub headers: Vec<(String, String)>,

    pub timeout: Duration,
}

impl ApiRequest {
    /// First value of a query parameter
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Header value, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Some(RequestBody::Json(value)) => Some(value),
            _ => None,
        }
    }
}

/// Status and body of a response, before any interpretation
#[derive(Clone, Debug, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn json(status: u16, value: &Value) -> Self {
        Self {
            status,
            body: value.to_string().into_bytes(),
        }
    }

    pub fn text(status: u16, text: impl Into<String>) -> Self {
        Self {
            status,
            body: text.into().into_bytes(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Per-call overrides
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    /// Replaces the client's default timeout for this call
    pub timeout: Option<Duration>,

    /// Merged over the client's default headers
    pub headers: Vec<(String, String)>,

    /// Form-encode the body instead of sending JSON
    pub is_form_data: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn form_data(mut self) -> Self {
        self.is_form_data = true;
        self
    }
}

/// Sends a request and returns whatever the server answered
///
/// Implementations only fail for transport problems (no response, timeout).
/// Status codes are interpreted by [`crate::ApiClient`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<RawResponse, ApiError>;
}

/// Flatten a serializable value into key/value pairs
///
/// `None` fields are skipped, scalars are rendered as text, and sequences
/// repeat the key. Nested maps are rejected.
pub(crate) fn to_pairs<T: Serialize + ?Sized>(value: &T) -> Result<Vec<(String, String)>, ApiError> {
    let value = serde_json::to_value(value).map_err(|e| ApiError::Encode(e.to_string()))?;

    let map = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Object(map) => map,
        other => {
            return Err(ApiError::Encode(format!(
                "expected a map of parameters, got {}",
                other
            )));
        }
    };

    let mut pairs = Vec::with_capacity(map.len());
    for (key, value) in map {
        match value {
            Value::Null => {}
            Value::Array(values) => {
                for value in values {
                    pairs.push((key.clone(), scalar_to_string(&key, value)?));
                }
            }
            value => pairs.push((key.clone(), scalar_to_string(&key, value)?)),
        }
    }
    Ok(pairs)
}

fn scalar_to_string(key: &str, value: Value) -> Result<String, ApiError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(ApiError::Encode(format!(
            "parameter '{}' must be a scalar or a list of scalars",
            key
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Query {
        label_selector: Option<String>,
        limit: Option<u32>,
        watch: bool,
        dry_run: Vec<String>,
    }

    #[test]
    fn test_pairs_skip_none_and_repeat_lists() {
        let mut pairs = to_pairs(&Query {
            label_selector: None,
            limit: Some(50),
            watch: true,
            dry_run: vec!["All".to_string()],
        })
        .unwrap();
        pairs.sort();

        assert_eq!(
            pairs,
            vec![
                ("dryRun".to_string(), "All".to_string()),
                ("limit".to_string(), "50".to_string()),
                ("watch".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_pairs_from_unit_and_null() {
        assert!(to_pairs(&()).unwrap().is_empty());
        assert!(to_pairs(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_pairs_reject_nested() {
        assert!(matches!(
            to_pairs(&json!({"outer": {"inner": 1}})),
            Err(ApiError::Encode(_))
        ));
        assert!(matches!(to_pairs(&json!([1, 2])), Err(ApiError::Encode(_))));
    }

    #[test]
    fn test_header_lookup_prefers_last() {
        let request = ApiRequest {
            method: Method::GET,
            endpoint: "/x".to_string(),
            query: vec![],
            body: None,
            headers: vec![
                ("Accept".to_string(), "text/plain".to_string()),
                ("accept".to_string(), "application/json".to_string()),
            ],
            timeout: Duration::from_secs(1),
        };
        assert_eq!(request.header("ACCEPT"), Some("application/json"));
    }
}
