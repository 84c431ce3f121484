//! REST boundary used by model persistence.
//!
//! fundle never opens sockets itself. The host supplies a [`Transport`]
//! (a `fetch` bridge in the browser, an HTTP client natively, a recorder in
//! tests) and [`ApiClient`] handles URL normalization, JSON encoding and
//! status checking on top of it.
//!
//! # URL rules
//!
//! - Endpoints starting with `/` are prefixed with [`ApiConfig::base_url`].
//! - `GET` and `POST` URLs get a trailing `/`; `PATCH` and `DELETE` are
//!   sent as given.
//!
//! # Failure Modes
//!
//! | Failure | Result |
//! |---------|--------|
//! | non-2xx status | [`ApiError::Status`] with status and body text |
//! | transport error | whatever the transport returned |
//! | body is not JSON | [`ApiError::Decode`] |
//! | empty 2xx body | `Ok(Value::Null)` |

use std::fmt;

use serde::Deserialize;
use serde_json::Value as Json;

use crate::error::ApiError;

/// HTTP method used by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    const fn wants_trailing_slash(self) -> bool {
        !matches!(self, Self::Patch | Self::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved request handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    /// JSON body, sent with `Content-Type: application/json`.
    pub body: Option<Json>,
}

/// Raw response from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Host-provided request executor.
pub trait Transport {
    /// Perform `request` and return the raw response.
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;
}

impl<F> Transport for F
where
    F: Fn(&ApiRequest) -> Result<ApiResponse, ApiError>,
{
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self(request)
    }
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Prefix for endpoints that start with `/`.
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "/api".to_owned(),
        }
    }
}

/// JSON REST client over a [`Transport`].
pub struct ApiClient {
    config: ApiConfig,
    transport: Box<dyn Transport>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Client with the default configuration.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::with_config(ApiConfig::default(), transport)
    }

    pub fn with_config(config: ApiConfig, transport: impl Transport + 'static) -> Self {
        Self {
            config,
            transport: Box::new(transport),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Resolve `endpoint` into the URL actually requested.
    #[must_use]
    pub fn resolve_url(&self, method: Method, endpoint: &str) -> String {
        let mut url = if endpoint.starts_with('/') {
            format!("{}{endpoint}", self.config.base_url)
        } else {
            endpoint.to_owned()
        };
        if method.wants_trailing_slash() && !url.ends_with('/') {
            url.push('/');
        }
        url
    }

    /// Send a request and decode the JSON response.
    pub fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Json>,
    ) -> Result<Json, ApiError> {
        let request = ApiRequest {
            method,
            url: self.resolve_url(method, endpoint),
            body,
        };
        tracing::debug!(method = %request.method, url = %request.url, "api request");

        let response = self.transport.send(&request)?;
        if !response.is_success() {
            tracing::debug!(status = response.status, url = %request.url, "api request rejected");
            return Err(ApiError::Status {
                status: response.status,
                body: response.body,
            });
        }
        if response.body.trim().is_empty() {
            return Ok(Json::Null);
        }
        Ok(serde_json::from_str(&response.body)?)
    }

    pub fn get(&self, endpoint: &str) -> Result<Json, ApiError> {
        self.request(Method::Get, endpoint, None)
    }

    pub fn post(&self, endpoint: &str, body: Json) -> Result<Json, ApiError> {
        self.request(Method::Post, endpoint, Some(body))
    }

    pub fn patch(&self, endpoint: &str, body: Json) -> Result<Json, ApiError> {
        self.request(Method::Patch, endpoint, Some(body))
    }

    pub fn delete(&self, endpoint: &str) -> Result<Json, ApiError> {
        self.request(Method::Delete, endpoint, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording(
        status: u16,
        body: &'static str,
    ) -> (ApiClient, Rc<RefCell<Vec<ApiRequest>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let client = ApiClient::new(move |req: &ApiRequest| {
            sink.borrow_mut().push(req.clone());
            Ok(ApiResponse::new(status, body))
        });
        (client, log)
    }

    #[test]
    fn get_and_post_get_trailing_slash() {
        let (client, _) = recording(200, "{}");
        assert_eq!(client.resolve_url(Method::Get, "/users"), "/api/users/");
        assert_eq!(client.resolve_url(Method::Post, "/users/"), "/api/users/");
        assert_eq!(client.resolve_url(Method::Patch, "/users/1"), "/api/users/1");
        assert_eq!(client.resolve_url(Method::Delete, "/users/1"), "/api/users/1");
    }

    #[test]
    fn relative_endpoints_skip_base_url() {
        let (client, _) = recording(200, "{}");
        assert_eq!(
            client.resolve_url(Method::Get, "https://example.test/x"),
            "https://example.test/x/"
        );
    }

    #[test]
    fn body_is_forwarded_and_response_decoded() {
        let (client, log) = recording(201, r#"{"id": 3}"#);
        let out = client.post("/users", json!({"name": "Ada"})).unwrap();
        assert_eq!(out, json!({"id": 3}));

        let sent = log.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, Method::Post);
        assert_eq!(sent[0].body, Some(json!({"name": "Ada"})));
    }

    #[test]
    fn non_success_status_is_an_error() {
        let (client, _) = recording(422, "bad name");
        let err = client.patch("/users/1", json!({})).unwrap_err();
        assert!(matches!(
            err,
            ApiError::Status { status: 422, ref body } if body == "bad name"
        ));
    }

    #[test]
    fn empty_body_decodes_to_null() {
        let (client, _) = recording(204, "");
        assert_eq!(client.delete("/users/1").unwrap(), Json::Null);
    }

    #[test]
    fn garbage_body_is_a_decode_error() {
        let (client, _) = recording(200, "<html>");
        assert!(matches!(client.get("/x"), Err(ApiError::Decode(_))));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: ApiConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config.base_url, "/api");
        let config: ApiConfig = serde_json::from_value(json!({"base_url": "/v2"})).unwrap();
        assert_eq!(config.base_url, "/v2");
    }
}
