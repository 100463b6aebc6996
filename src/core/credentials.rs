//! Persistence of the bearer token and cached profile.
//!
//! This is the only component that touches durable client storage. Every
//! write is mirrored into the shared cookie jar so requests carry the same
//! credentials the durable store holds.

use crate::api::models::User;
use crate::core::constants::{
    ACCESS_TOKEN_COOKIE, CREDENTIAL_COOKIE_DAYS, SESSION_KEY_PREFIXES, TOKEN_KEY, USER_DATA_COOKIE,
    USER_KEY,
};
use crate::core::storage::{SessionStorage, StorageError};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn SessionStorage>,
    cookies: Arc<Jar>,
    origin: Url,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn SessionStorage>, cookies: Arc<Jar>, origin: Url) -> Self {
        Self {
            storage,
            cookies,
            origin,
        }
    }

    pub fn storage(&self) -> &Arc<dyn SessionStorage> {
        &self.storage
    }

    pub fn cookies(&self) -> &Arc<Jar> {
        &self.cookies
    }

    pub fn set_token(&self, token: &str) -> Result<(), StorageError> {
        self.storage.set(TOKEN_KEY, token)?;
        self.set_cookie(ACCESS_TOKEN_COOKIE, token);
        Ok(())
    }

    /// The persisted token, or `None` when absent or unreadable.
    pub fn get_token(&self) -> Option<String> {
        match self.storage.get(TOKEN_KEY) {
            Ok(token) => token.filter(|value| !value.trim().is_empty()),
            Err(err) => {
                warn!(error = %err, "could not read stored token");
                None
            }
        }
    }

    pub fn set_profile(&self, user: &User) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(user)?;
        self.storage.set(USER_KEY, &encoded)?;
        self.set_cookie(USER_DATA_COOKIE, &urlencoding::encode(&encoded));
        Ok(())
    }

    /// The cached profile. A corrupt entry reads as absent.
    pub fn get_profile(&self) -> Option<User> {
        let raw = match self.storage.get(USER_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, "could not read cached profile");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(err) => {
                warn!(error = %err, "cached profile is corrupt; ignoring it");
                None
            }
        }
    }

    /// Remove the token, the profile, and every other session-scoped key in
    /// one storage step, then expire the mirrored cookies. Never fails:
    /// storage errors are logged and swallowed.
    pub fn clear_all(&self) {
        let mut doomed = vec![TOKEN_KEY.to_string(), USER_KEY.to_string()];
        match self.storage.keys() {
            Ok(keys) => doomed.extend(keys.into_iter().filter(|key| {
                SESSION_KEY_PREFIXES
                    .iter()
                    .any(|prefix| key.starts_with(prefix))
            })),
            Err(err) => warn!(error = %err, "could not enumerate session keys"),
        }
        doomed.sort();
        doomed.dedup();

        if let Err(err) = self.storage.remove_many(&doomed) {
            warn!(error = %err, "could not clear stored credentials");
        }

        self.expire_cookie(ACCESS_TOKEN_COOKIE);
        self.expire_cookie(USER_DATA_COOKIE);
    }

    /// Read a cookie the jar would send to the API origin.
    pub fn cookie_value(&self, name: &str) -> Option<String> {
        let header = self.cookies.cookies(&self.origin)?;
        let header = header.to_str().ok()?;
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
            .filter(|value| !value.is_empty())
    }

    fn set_cookie(&self, name: &str, value: &str) {
        let max_age = CREDENTIAL_COOKIE_DAYS * 24 * 60 * 60;
        self.cookies.add_cookie_str(
            &format!("{name}={value}; Max-Age={max_age}; Path=/; SameSite=Strict"),
            &self.origin,
        );
    }

    fn expire_cookie(&self, name: &str) {
        // Blank the value first; some stores reject an already-expired
        // cookie instead of evicting the live one it replaces.
        self.cookies
            .add_cookie_str(&format!("{name}=; Path=/"), &self.origin);
        self.cookies.add_cookie_str(
            &format!("{name}=; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Path=/"),
            &self.origin,
        );
    }
}
