//! Anti-forgery token bootstrap.
//!
//! The server issues the token as a `csrftoken` cookie from a dedicated
//! endpoint. The cookie lives in the client's shared jar, so checking for it
//! is a cheap local read and the network is only touched when it is missing.

use crate::api::endpoints;
use crate::core::constants::CSRF_COOKIE;
use crate::core::credentials::CredentialStore;
use crate::utils::url::construct_api_url;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct CsrfBootstrap {
    client: reqwest::Client,
    credentials: CredentialStore,
    token_url: String,
}

impl CsrfBootstrap {
    pub fn new(client: reqwest::Client, credentials: CredentialStore, base_url: &str) -> Self {
        Self {
            client,
            credentials,
            token_url: construct_api_url(base_url, endpoints::auth::CSRF_TOKEN),
        }
    }

    /// The token currently held in the cookie jar.
    pub fn current_token(&self) -> Option<String> {
        self.credentials.cookie_value(CSRF_COOKIE)
    }

    /// Make sure a token is cached, fetching one if necessary.
    ///
    /// Safe to call before every state-changing request. A failed fetch is
    /// logged and yields `None`; the caller proceeds without the header and
    /// lets the server reject the request.
    pub async fn ensure_token(&self) -> Option<String> {
        if let Some(token) = self.current_token() {
            return Some(token);
        }

        debug!(url = %self.token_url, "fetching CSRF token");
        match self.client.get(&self.token_url).send().await {
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), "CSRF token endpoint refused the request");
            }
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "failed to fetch CSRF token");
            }
        }

        let token = self.current_token();
        if token.is_none() {
            warn!("CSRF token endpoint did not set a {CSRF_COOKIE} cookie");
        }
        token
    }
}
