//! Per-call request building
//!
//! A [`RequestBuilder`] is created fresh for every call by
//! [`RestClient::secured`], [`RestClient::public`] or [`RestClient::with_files`].
//! Its flags apply to the single request it sends and are gone afterwards.

use crate::client::RestClient;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::form::{self, FormField, FormValue};
use crate::url::build_url;
use crate::Result;
use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Marker returned by a completed download
pub const DOWNLOAD_COMPLETE: &str = "DOWNLOAD";

/// Expected shape of the response body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseType {
    #[default]
    Json,
    Text,
    Blob,
    ArrayBuffer,
}

impl FromStr for ResponseType {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            "blob" => Ok(Self::Blob),
            "arraybuffer" => Ok(Self::ArrayBuffer),
            other => Err(ClientError::Configuration(format!(
                "unknown response type: {other}"
            ))),
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Text => "text",
            Self::Blob => "blob",
            Self::ArrayBuffer => "arraybuffer",
        })
    }
}

/// Decoded response body
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// An empty JSON body decodes to `null`
    Json(serde_json::Value),
    Text(String),
    Bytes(Bytes),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_json(self) -> Option<serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Deserialize a JSON body into `T`
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not JSON or does not match `T`
    pub fn json<T: serde::de::DeserializeOwned>(self) -> Result<T> {
        match self {
            Self::Json(value) => Ok(serde_json::from_value(value)?),
            Self::Text(text) => Ok(serde_json::from_str(&text)?),
            Self::Bytes(bytes) => Ok(serde_json::from_slice(&bytes)?),
        }
    }

    /// Raw bytes of the body whatever its type
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Json(value) => Bytes::from(value.to_string()),
            Self::Text(text) => Bytes::from(text),
            Self::Bytes(bytes) => bytes,
        }
    }
}

/// Caller-supplied options merged over the computed request
///
/// Every option that is set wins over the computed value. Headers override
/// one by one; params and body replace the computed ones wholesale.
#[derive(Debug, Clone, Default)]
pub struct HttpOptions {
    pub headers: HeaderMap,
    pub params: Option<Vec<(String, String)>>,
    pub body: Option<FormValue>,
    pub response_type: Option<ResponseType>,
    /// Per-request transport timeout
    pub timeout: Option<Duration>,
}

impl HttpOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<FormValue>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Body of a prepared request
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    None,
    Json(FormValue),
    Multipart(Vec<FormField>),
}

/// Fully specified request, ready for dispatch
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub params: Vec<(String, String)>,
    pub body: RequestBody,
    pub response_type: ResponseType,
    pub timeout: Option<Duration>,
    /// Hold the response back by a random mock-mode delay
    pub simulate_latency: bool,
}

/// Headers every request starts from
pub fn base_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers
}

/// Single-use request modifiers bound to a client
#[must_use = "a request builder does nothing until a verb is called"]
pub struct RequestBuilder<'a> {
    client: &'a RestClient,
    secure: bool,
    multipart: bool,
    response_type: Option<ResponseType>,
    options: HttpOptions,
}

impl<'a> RequestBuilder<'a> {
    pub(crate) fn new(client: &'a RestClient) -> Self {
        Self {
            client,
            secure: false,
            multipart: false,
            response_type: None,
            options: HttpOptions::default(),
        }
    }

    /// Attach the stored token as a bearer `Authorization` header
    pub fn secured(mut self) -> Self {
        self.secure = true;
        self
    }

    /// Send without an `Authorization` header
    pub fn public(mut self) -> Self {
        self.secure = false;
        self
    }

    /// Encode the payload of a non-GET request as a multipart form
    pub fn with_files(mut self) -> Self {
        self.multipart = true;
        self
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    pub fn options(mut self, options: HttpOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn get(self, url: &str, data: Option<FormValue>) -> Result<Option<ResponseBody>> {
        self.send(Method::GET, url, data).await
    }

    pub async fn post(self, url: &str, data: Option<FormValue>) -> Result<Option<ResponseBody>> {
        self.send(Method::POST, url, data).await
    }

    pub async fn put(self, url: &str, data: Option<FormValue>) -> Result<Option<ResponseBody>> {
        self.send(Method::PUT, url, data).await
    }

    pub async fn delete(self, url: &str, data: Option<FormValue>) -> Result<Option<ResponseBody>> {
        self.send(Method::DELETE, url, data).await
    }

    /// Build and dispatch a request
    ///
    /// Resolves to `Ok(None)` when the request is cancelled through
    /// [`RestClient::cancel_pending_requests`].
    pub async fn send(
        self,
        method: Method,
        url: &str,
        data: Option<FormValue>,
    ) -> Result<Option<ResponseBody>> {
        let prepared = self.prepare(method, url, data)?;
        self.client.dispatch(prepared).await
    }

    /// Check the stored token against the validation endpoint
    pub async fn validate_token(self) -> Result<Option<ResponseBody>> {
        let uri = self.client.config().validation_token_uri.clone();
        self.post(&uri, None).await
    }

    /// Fetch `url` as bytes and hand them to the client's file sink
    ///
    /// Returns [`DOWNLOAD_COMPLETE`] once the file is saved.
    pub async fn download(
        self,
        url: &str,
        file_name: &str,
        mime: &str,
        data: Option<FormValue>,
    ) -> Result<Option<&'static str>> {
        let mut prepared = self.prepare(Method::GET, url, data)?;
        prepared.response_type = ResponseType::Blob;
        prepared.simulate_latency = false;

        let Some(body) = self.client.dispatch(prepared).await? else {
            return Ok(None);
        };
        self.client
            .file_sink()
            .save(body.into_bytes(), mime, file_name)
            .await?;

        Ok(Some(DOWNLOAD_COMPLETE))
    }

    /// Turn call-site arguments into a fully specified request
    ///
    /// # Errors
    ///
    /// Fails when a secure call cannot read the token store, or when the
    /// payload cannot be turned into query parameters.
    pub fn prepare(&self, method: Method, url: &str, data: Option<FormValue>) -> Result<PreparedRequest> {
        let config = self.client.config();
        let mut headers = base_headers();

        if self.secure {
            self.attach_token(&mut headers)?;
        }

        let response_type = self.response_type.unwrap_or_default();
        let is_get = method == Method::GET;

        let params = match (is_get, data.as_ref()) {
            (true, Some(payload)) => form::query_pairs(payload)?,
            _ => Vec::new(),
        };

        let body = if is_get {
            RequestBody::None
        } else if self.multipart {
            RequestBody::Multipart(form::create_form_data(
                data.as_ref().unwrap_or(&FormValue::empty()),
            ))
        } else {
            data.map_or(RequestBody::None, RequestBody::Json)
        };

        let mut prepared = PreparedRequest {
            method: dispatch_method(&config, method),
            url: build_url(&config.end_point, url, config.mock_data),
            headers,
            params,
            body,
            response_type,
            timeout: None,
            simulate_latency: config.mock_data,
        };
        self.apply_options(&mut prepared);
        if prepared.method == Method::GET {
            prepared.body = RequestBody::None;
        }

        Ok(prepared)
    }

    fn attach_token(&self, headers: &mut HeaderMap) -> Result<()> {
        let token = self.client.get_token()?;
        if token.is_empty() {
            warn!("Executing a secure request without TOKEN. Authorization header will not be set!");
            return Ok(());
        }

        let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            ClientError::Storage("stored token is not a valid header value".to_string())
        })?;
        value.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, value);
        Ok(())
    }

    fn apply_options(&self, prepared: &mut PreparedRequest) {
        let options = &self.options;
        for (name, value) in &options.headers {
            prepared.headers.insert(name.clone(), value.clone());
        }
        if let Some(params) = &options.params {
            prepared.params.clone_from(params);
        }
        if let Some(body) = &options.body {
            prepared.body = RequestBody::Json(body.clone());
        }
        if let Some(response_type) = options.response_type {
            prepared.response_type = response_type;
        }
        if options.timeout.is_some() {
            prepared.timeout = options.timeout;
        }
    }
}

/// Mock mode serves static fixtures, so every verb becomes a GET
fn dispatch_method(config: &ClientConfig, method: Method) -> Method {
    if config.mock_data && method != Method::GET {
        debug!(%method, "Mock data mode: sending as GET");
        Method::GET
    } else {
        method
    }
}
