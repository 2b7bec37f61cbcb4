//! REST client

use crate::Result;
use crate::config::{ClientConfig, RestServiceConfig, TokenStorage};
use crate::error::ClientError;
use crate::form::{self, FormValue};
use crate::request::{PreparedRequest, RequestBody, RequestBuilder, ResponseBody, ResponseType};
use crate::sink::{DirectorySink, FileSink};
use crate::token::{CookieJar, LocalStorage, TokenPolicy, TokenStore};
use arc_swap::ArcSwap;
use rand::Rng;
use reqwest::{Client, ClientBuilder, Method};
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Range of the simulated latency applied in mock data mode, in milliseconds
pub const MOCK_DELAY_MS: Range<u64> = 1000..3000;

const DEFAULT_USER_AGENT: &str = concat!("rest-client/", env!("CARGO_PKG_VERSION"));

/// REST API client
///
/// Clones share configuration, token stores and the cancellation signal.
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    config: Arc<ArcSwap<ClientConfig>>,
    cancel: Arc<ArcSwap<CancellationToken>>,
    cookies: Arc<CookieJar>,
    local_storage: Arc<LocalStorage>,
    sink: Arc<dyn FileSink>,
}

impl RestClient {
    /// Create a new client with the given configuration
    pub fn new(config: RestServiceConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Create a new client builder
    pub fn builder() -> RestClientBuilder {
        RestClientBuilder::default()
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> Arc<ClientConfig> {
        self.config.load_full()
    }

    /// Merge the set fields of `overrides` into the configuration
    ///
    /// The change applies to every request prepared afterwards.
    pub fn configure(&self, overrides: &RestServiceConfig) -> &Self {
        self.config.rcu(|current| current.merged(overrides));
        debug!(?overrides, "Client configuration updated");
        self
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn local_storage(&self) -> &LocalStorage {
        &self.local_storage
    }

    pub(crate) fn file_sink(&self) -> &dyn FileSink {
        self.sink.as_ref()
    }

    fn token_store(&self, config: &ClientConfig) -> Result<&dyn TokenStore> {
        match &config.token_storage {
            TokenStorage::Cookie => Ok(self.cookies.as_ref()),
            TokenStorage::LocalStorage => Ok(self.local_storage.as_ref()),
            TokenStorage::Unknown(kind) => Err(ClientError::InvalidStorageKind(kind.clone())),
        }
    }

    /// Read the stored token, or an empty string when there is none
    pub fn get_token(&self) -> Result<String> {
        let config = self.config();
        let token = self.token_store(&config)?.get(&config.token_name)?;
        Ok(token.unwrap_or_default())
    }

    /// Persist `token` in the configured backend
    pub fn set_token(&self, token: &str) -> Result<()> {
        let config = self.config();
        let policy = TokenPolicy::expiring_in(config.cookie_expires, config.secure_cookie);
        self.token_store(&config)?
            .set(&config.token_name, token, &policy)
    }

    /// Forget the token
    ///
    /// With cookie storage every cookie is removed, not only the token.
    pub fn revoke(&self) -> Result<()> {
        let config = self.config();
        self.token_store(&config)?.clear(&config.token_name)?;
        info!(storage = %config.token_storage, "Revoked authorization token");
        Ok(())
    }

    pub fn is_authorized(&self) -> Result<bool> {
        Ok(!self.get_token()?.is_empty())
    }

    /// Request a token from the authorization endpoint and store it
    ///
    /// Returns the raw response body.
    pub async fn authorize(&self, username: &str, password: &str) -> Result<Option<ResponseBody>> {
        let auth_uri = self.config().auth_uri.clone();
        let credentials = FormValue::object([("username", username), ("password", password)]);

        let response = self.post(&auth_uri, Some(credentials)).await?;
        if let Some(body) = &response {
            match body.as_json().and_then(|v| v.get("token")).and_then(|t| t.as_str()) {
                Some(token) => {
                    self.set_token(token)?;
                    info!("Stored authorization token");
                }
                None => warn!("Authorization response did not contain a token"),
            }
        }

        Ok(response)
    }

    /// Check the stored token against the validation endpoint
    pub async fn validate_token(&self) -> Result<Option<ResponseBody>> {
        self.public().validate_token().await
    }

    /// Stop every request currently in flight
    ///
    /// Requests started afterwards are not affected.
    pub fn cancel_pending_requests(&self) {
        let previous = self.cancel.swap(Arc::new(CancellationToken::new()));
        previous.cancel();
        debug!("Cancelled pending requests");
    }

    /// Next request carries the bearer token
    pub fn secured(&self) -> RequestBuilder<'_> {
        RequestBuilder::new(self).secured()
    }

    /// Next request carries no token
    pub fn public(&self) -> RequestBuilder<'_> {
        RequestBuilder::new(self).public()
    }

    /// Next request uploads its payload as a multipart form
    pub fn with_files(&self) -> RequestBuilder<'_> {
        RequestBuilder::new(self).with_files()
    }

    pub async fn get(&self, url: &str, data: Option<FormValue>) -> Result<Option<ResponseBody>> {
        self.public().get(url, data).await
    }

    pub async fn post(&self, url: &str, data: Option<FormValue>) -> Result<Option<ResponseBody>> {
        self.public().post(url, data).await
    }

    pub async fn put(&self, url: &str, data: Option<FormValue>) -> Result<Option<ResponseBody>> {
        self.public().put(url, data).await
    }

    pub async fn delete(&self, url: &str, data: Option<FormValue>) -> Result<Option<ResponseBody>> {
        self.public().delete(url, data).await
    }

    pub async fn download(
        &self,
        url: &str,
        file_name: &str,
        mime: &str,
        data: Option<FormValue>,
    ) -> Result<Option<&'static str>> {
        self.public().download(url, file_name, mime, data).await
    }

    /// Send a prepared request, racing it against the cancellation signal
    pub(crate) async fn dispatch(&self, prepared: PreparedRequest) -> Result<Option<ResponseBody>> {
        let cancel = self.cancel.load_full();
        let method = prepared.method.clone();
        let url = prepared.url.clone();

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(%method, %url, "Request cancelled");
                Ok(None)
            }
            result = self.execute(prepared) => result.map(Some),
        }
    }

    async fn execute(&self, prepared: PreparedRequest) -> Result<ResponseBody> {
        let PreparedRequest {
            method,
            url,
            headers,
            params,
            body,
            response_type,
            timeout,
            simulate_latency,
        } = prepared;

        let target = reqwest::Url::parse(&url).map_err(|e| ClientError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        debug!(%method, %url, %response_type, "Dispatching request");

        let mut request = self.http.request(method, target).headers(headers);
        if !params.is_empty() {
            request = request.query(&params);
        }
        request = match body {
            RequestBody::None => request,
            RequestBody::Json(payload) => request.json(&payload),
            RequestBody::Multipart(fields) => request.multipart(form::into_multipart(fields)?),
        };
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(ClientError::from_status(status, message));
        }

        let body = read_body(response, response_type).await?;

        if simulate_latency {
            let delay = mock_delay();
            debug!(?delay, "Simulating mock data latency");
            tokio::time::sleep(delay).await;
        }

        Ok(body)
    }
}

async fn read_body(response: reqwest::Response, response_type: ResponseType) -> Result<ResponseBody> {
    match response_type {
        ResponseType::Json => {
            let bytes = response.bytes().await?;
            if bytes.is_empty() {
                Ok(ResponseBody::Json(serde_json::Value::Null))
            } else {
                Ok(ResponseBody::Json(serde_json::from_slice(&bytes)?))
            }
        }
        ResponseType::Text => Ok(ResponseBody::Text(response.text().await?)),
        ResponseType::Blob | ResponseType::ArrayBuffer => Ok(ResponseBody::Bytes(response.bytes().await?)),
    }
}

fn mock_delay() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(MOCK_DELAY_MS))
}

/// Builder for RestClient
#[derive(Default)]
pub struct RestClientBuilder {
    config: RestServiceConfig,
    http_client: Option<Client>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    cookies: Option<Arc<CookieJar>>,
    local_storage: Option<Arc<LocalStorage>>,
    local_storage_path: Option<PathBuf>,
    sink: Option<Arc<dyn FileSink>>,
}

impl RestClientBuilder {
    /// Set the initial configuration
    pub fn config(mut self, config: RestServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an existing `reqwest` client as transport
    ///
    /// Timeout and user agent settings of this builder are ignored.
    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Set the transport timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Share a cookie jar with other clients
    pub fn cookies(mut self, jar: Arc<CookieJar>) -> Self {
        self.cookies = Some(jar);
        self
    }

    /// Use the given local storage
    pub fn local_storage(mut self, storage: Arc<LocalStorage>) -> Self {
        self.local_storage = Some(storage);
        self
    }

    /// Back local storage with a JSON file at `path`
    pub fn local_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_storage_path = Some(path.into());
        self
    }

    /// Where downloads are saved
    pub fn file_sink(mut self, sink: Arc<dyn FileSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<RestClient> {
        let config = ClientConfig::default().merged(&self.config);

        let http = match self.http_client {
            Some(client) => client,
            None => {
                let mut client_builder = ClientBuilder::new()
                    .user_agent(self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT));
                if let Some(timeout) = self.timeout {
                    client_builder = client_builder.timeout(timeout);
                }
                client_builder.build()?
            }
        };

        let local_storage = match (self.local_storage, self.local_storage_path) {
            (Some(storage), _) => storage,
            (None, Some(path)) => Arc::new(LocalStorage::open(path)?),
            (None, None) => match LocalStorage::default_path() {
                Some(path) => Arc::new(LocalStorage::open(path)?),
                None => {
                    warn!("No platform data directory, local storage will not persist");
                    Arc::new(LocalStorage::in_memory())
                }
            },
        };

        debug!(end_point = %config.end_point, mock_data = config.mock_data, "Built REST client");

        Ok(RestClient {
            http,
            config: Arc::new(ArcSwap::from_pointee(config)),
            cancel: Arc::new(ArcSwap::from_pointee(CancellationToken::new())),
            cookies: self.cookies.unwrap_or_default(),
            local_storage,
            sink: self
                .sink
                .unwrap_or_else(|| Arc::new(DirectorySink::default())),
        })
    }
}
