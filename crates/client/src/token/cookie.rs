//! In-memory cookie jar

use super::{TokenPolicy, TokenStore};
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Attributes of a stored cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieOptions {
    pub secure: bool,
    pub expires: DateTime<Utc>,
}

/// A stored cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub value: String,
    pub secure: bool,
    pub expires: DateTime<Utc>,
}

impl Cookie {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }
}

/// Cookie jar keyed by cookie name
///
/// Expired cookies are invisible to readers and pruned on the next write.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: RwLock<HashMap<String, Cookie>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of a live cookie
    pub fn get(&self, name: &str) -> Option<String> {
        self.cookie(name).map(|cookie| cookie.value)
    }

    /// Full cookie record, if present and not expired
    pub fn cookie(&self, name: &str) -> Option<Cookie> {
        let now = Utc::now();
        let cookies = self.cookies.read().unwrap_or_else(PoisonError::into_inner);
        cookies
            .get(name)
            .filter(|cookie| !cookie.is_expired(now))
            .cloned()
    }

    pub fn put(&self, name: &str, value: &str, options: CookieOptions) {
        let now = Utc::now();
        let mut cookies = self.cookies.write().unwrap_or_else(PoisonError::into_inner);
        cookies.retain(|_, cookie| !cookie.is_expired(now));
        cookies.insert(
            name.to_string(),
            Cookie {
                value: value.to_string(),
                secure: options.secure,
                expires: options.expires,
            },
        );
    }

    pub fn remove(&self, name: &str) {
        self.cookies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }

    pub fn remove_all(&self) {
        self.cookies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|cookie| !cookie.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TokenStore for CookieJar {
    fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self.cookie(name).map(|cookie| cookie.value))
    }

    fn set(&self, name: &str, token: &str, policy: &TokenPolicy) -> Result<()> {
        self.put(
            name,
            token,
            CookieOptions {
                secure: policy.secure,
                expires: policy.expires_at,
            },
        );
        Ok(())
    }

    fn clear(&self, _name: &str) -> Result<()> {
        self.remove_all();
        Ok(())
    }
}
