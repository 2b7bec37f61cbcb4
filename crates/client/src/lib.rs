//! REST client facade over `reqwest`
//!
//! Adds end point prefixing, bearer tokens from a cookie jar or local storage,
//! multipart uploads of nested payloads, request cancellation, file downloads
//! and a mock data mode that serves static `.json` fixtures.
//!
//! ```no_run
//! use rest_client::{RestClient, RestServiceConfig};
//!
//! # async fn run() -> rest_client::Result<()> {
//! let client = RestClient::new(RestServiceConfig::default().end_point("https://api.example.com"))?;
//! client.authorize("alice", "secret").await?;
//! let _me = client.secured().get("/me", None).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod form;
pub mod request;
pub mod sink;
pub mod telemetry;
pub mod token;
pub mod url;

pub use crate::client::{RestClient, RestClientBuilder};
pub use crate::config::{ClientConfig, RestServiceConfig, TokenStorage};
pub use crate::error::{ClientError, Result};
pub use crate::form::{FileData, FormValue};
pub use crate::request::{DOWNLOAD_COMPLETE, HttpOptions, RequestBuilder, ResponseBody, ResponseType};
