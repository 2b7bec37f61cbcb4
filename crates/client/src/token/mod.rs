//! Token storage backends
//!
//! The client keeps one [`CookieJar`] and one [`LocalStorage`] and picks the
//! backend named by the configured [`TokenStorage`](crate::config::TokenStorage)
//! on every token operation.

mod cookie;
mod local;

pub use cookie::{Cookie, CookieJar, CookieOptions};
pub use local::LocalStorage;

use crate::Result;
use chrono::{DateTime, Duration, Utc};

/// Attributes applied when a token is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPolicy {
    pub expires_at: DateTime<Utc>,
    pub secure: bool,
}

impl TokenPolicy {
    /// Expire `minutes` from now, saturating at the latest representable time
    pub fn expiring_in(minutes: i64, secure: bool) -> Self {
        let expires_at = Duration::try_minutes(minutes)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { expires_at, secure }
    }
}

/// Capability interface over a token backend
pub trait TokenStore: Send + Sync {
    /// Read the token stored under `name`
    fn get(&self, name: &str) -> Result<Option<String>>;

    /// Store `token` under `name`
    fn set(&self, name: &str, token: &str, policy: &TokenPolicy) -> Result<()>;

    /// Forget the token stored under `name`
    ///
    /// Backends may clear more than the single key; the cookie jar drops every cookie.
    fn clear(&self, name: &str) -> Result<()>;
}
