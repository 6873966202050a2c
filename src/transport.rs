//! The outbound request seam.
//!
//! [`crate::ApiAccessLayer`] never talks to the network itself; it hands each
//! [`ApiRequest`] to a [`Transport`]. [`HttpTransport`] is the reqwest-backed
//! implementation used against the real cloud API (feature `http`).

use std::future::Future;

use serde_json::Value;
use strum_macros::{Display, EnumString};

use crate::headers::find_header;

/// Failures where the request did not get a response from the server.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    /// The status line arrived but the body could not be read. Treated like
    /// any other transport failure: the call does not count locally.
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// HTTP verbs used by the cloud API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    Get,
    Put,
    Post,
}

/// One outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path and query, relative to the transport's base URL.
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Put,
            path: path.into(),
            body: Some(body),
        }
    }
}

/// A response of any status.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Something that can carry one request to the API and bring back the answer.
///
/// Implementations own timeouts and cancellation. Any response the server
/// produced, whatever its status, is `Ok`; `Err` means the server was never
/// reached or the answer was lost on the way back.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: &ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, TransportError>> + Send;
}

#[cfg(feature = "http")]
pub use http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use log::debug;
    use secrecy::{ExposeSecret, SecretString};

    use super::{ApiRequest, ApiResponse, Method, Transport, TransportError};

    /// Sends requests to the cloud API over HTTPS with reqwest.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use govee_lights_rs::HttpTransport;
    ///
    /// let transport = HttpTransport::new("my-api-key").unwrap();
    /// ```
    #[derive(Debug)]
    pub struct HttpTransport {
        client: reqwest::Client,
        base_url: String,
        api_key: SecretString,
    }

    impl HttpTransport {
        pub const DEFAULT_BASE_URL: &'static str = "https://developer-api.govee.com";
        pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
        pub const API_KEY_HEADER: &'static str = "Govee-API-Key";

        pub fn new(api_key: impl Into<String>) -> Result<Self, TransportError> {
            Self::with_options(api_key, Self::DEFAULT_BASE_URL, Self::DEFAULT_TIMEOUT)
        }

        pub fn with_options(
            api_key: impl Into<String>,
            base_url: &str,
            timeout: Duration,
        ) -> Result<Self, TransportError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| TransportError::Request(e.to_string()))?;

            Ok(Self {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key: SecretString::from(api_key.into()),
            })
        }

        pub fn base_url(&self) -> &str {
            &self.base_url
        }
    }

    impl From<Method> for reqwest::Method {
        fn from(method: Method) -> Self {
            match method {
                Method::Get => reqwest::Method::GET,
                Method::Put => reqwest::Method::PUT,
                Method::Post => reqwest::Method::POST,
            }
        }
    }

    impl Transport for HttpTransport {
        async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
            let url = format!("{}{}", self.base_url, request.path);
            debug!("{} {}", request.method, url);

            let mut builder = self
                .client
                .request(request.method.into(), url.as_str())
                .header(Self::API_KEY_HEADER, self.api_key.expose_secret())
                .header(reqwest::header::CONTENT_TYPE, "application/json");
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await.map_err(classify)?;
            let status = response.status().as_u16();
            let headers = header_pairs(response.headers());
            let body = response
                .text()
                .await
                .map_err(|e| TransportError::Body(e.to_string()))?;

            Ok(ApiResponse {
                status,
                headers,
                body,
            })
        }
    }

    fn classify(err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }

    /// Header values that are not visible ASCII are skipped.
    fn header_pairs(headers: &reqwest::header::HeaderMap) -> Vec<(String, String)> {
        headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect()
    }

}
