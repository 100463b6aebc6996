//! The API gateway: every network call the client makes goes through
//! [`ApiClient::request`], which attaches the bearer token and CSRF header,
//! always sends cookies, and classifies failures into [`ApiError`].

pub mod csrf;
pub mod endpoints;
pub mod error;
pub mod models;

#[cfg(test)]
mod tests;

use crate::core::credentials::CredentialStore;
use crate::core::storage::SessionStorage;
use crate::core::token::decode_claims;
use crate::utils::url::{construct_api_url_with_params, normalize_base_url};
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use self::csrf::CsrfBootstrap;
pub use self::error::ApiError;
use self::error::server_message;
use self::models::{
    AuthGrant, AuthResponse, ChatResponse, Conversation, ConversationsResponse,
    EmailVerificationRequest, HealthResponse, LoginCredentials, MessageResponse,
    MessagesResponse, PasswordReset, PasswordResetRequest, RegisterData,
    ResendVerificationRequest, SendMessageRequest, SignupResponse, User,
};
use crate::core::constants::{CSRF_HEADER, DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT};

/// Connection settings for the gateway.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Per-call options for [`ApiClient::request`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    pub query: Vec<(&'static str, String)>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self {
            method: Method::GET,
            body: None,
            query: Vec::new(),
        }
    }

    pub fn post<T: Serialize>(body: &T) -> Result<Self, ApiError> {
        let body = serde_json::to_value(body)
            .map_err(|err| ApiError::rejected(format!("Could not encode request: {err}")))?;
        Ok(Self {
            method: Method::POST,
            body: Some(body),
            query: Vec::new(),
        })
    }

    pub fn with_query(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }
}

/// Verbs that change server state and therefore need a CSRF token.
pub fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Operations the session controller needs from the gateway.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn ensure_csrf(&self) -> Option<String>;

    async fn login(&self, credentials: &LoginCredentials) -> Result<AuthGrant, ApiError>;

    async fn verify_email(&self, request: &EmailVerificationRequest)
        -> Result<AuthGrant, ApiError>;

    async fn current_user(&self) -> Result<User, ApiError>;
}

/// Operations the chat thread needs from the gateway.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send_message(
        &self,
        text: &str,
        conversation_id: Option<i64>,
    ) -> Result<ChatResponse, ApiError>;

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError>;

    async fn fetch_messages(&self, conversation_id: i64) -> Result<MessagesResponse, ApiError>;
}

#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    credentials: CredentialStore,
    csrf: CsrfBootstrap,
}

impl ApiClient {
    pub fn new(
        settings: &ApiSettings,
        storage: Arc<dyn SessionStorage>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let base_url = normalize_base_url(&settings.base_url);
        let origin = Url::parse(&base_url)?;
        let jar = Arc::new(Jar::default());

        let mut builder = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(settings.timeout);
        if is_loopback(&origin) {
            builder = builder.no_proxy();
        }
        let client = builder.build()?;

        let credentials = CredentialStore::new(storage, jar, origin);
        let csrf = CsrfBootstrap::new(client.clone(), credentials.clone(), &base_url);

        Ok(Self {
            client,
            base_url,
            credentials,
            csrf,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn csrf(&self) -> &CsrfBootstrap {
        &self.csrf
    }

    /// Send one request and decode its JSON body.
    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let (status, bytes) = self.execute(endpoint, options).await?;
        decode_body(status, &bytes)
    }

    async fn execute(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<(StatusCode, Vec<u8>), ApiError> {
        let RequestOptions {
            method,
            body,
            query,
        } = options;

        let url = construct_api_url_with_params(&self.base_url, endpoint, &query)
            .map_err(|err| ApiError::rejected(format!("Invalid request URL: {err}")))?;

        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .header(CONTENT_TYPE, "application/json");

        if let Some(token) = self.credentials.get_token() {
            request = request.bearer_auth(token);
        }

        if is_state_changing(&method) {
            if let Some(csrf_token) = self.csrf.ensure_token().await {
                request = request.header(CSRF_HEADER, csrf_token);
            }
        }

        if let Some(body) = body {
            request = request.json(&body);
        }

        debug!(%method, %url, "api request");
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?.to_vec();

        if !status.is_success() {
            let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            debug!(%status, %url, "api request failed");
            return Err(ApiError::from_status(status, body));
        }

        Ok((status, bytes))
    }

    /// Like [`request`](Self::request), but the body must carry
    /// `success: true`; otherwise the server's message becomes the error.
    async fn request_checked<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
        fallback_message: &str,
    ) -> Result<T, ApiError> {
        let (status, bytes) = self.execute(endpoint, options).await?;
        let body: Value = decode_body(status, &bytes)?;

        let succeeded = body
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !succeeded {
            let message = server_message(&body).unwrap_or_else(|| fallback_message.to_string());
            return Err(ApiError::Rejected { message, body });
        }

        serde_json::from_value(body).map_err(|err| ApiError::Decode {
            status,
            message: format!("Unexpected response from server: {err}"),
        })
    }

    pub async fn ensure_csrf(&self) -> Option<String> {
        self.csrf.ensure_token().await
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> Result<AuthGrant, ApiError> {
        let response: AuthResponse = self
            .request_checked(
                endpoints::auth::LOGIN,
                RequestOptions::post(credentials)?,
                "Login failed",
            )
            .await?;
        into_grant(response)
    }

    pub async fn register(&self, data: &RegisterData) -> Result<SignupResponse, ApiError> {
        self.request_checked(
            endpoints::auth::SIGNUP,
            RequestOptions::post(data)?,
            "Registration failed",
        )
        .await
    }

    pub async fn verify_email(
        &self,
        request: &EmailVerificationRequest,
    ) -> Result<AuthGrant, ApiError> {
        let response: AuthResponse = self
            .request_checked(
                endpoints::auth::VERIFY_EMAIL,
                RequestOptions::post(request)?,
                "Email verification failed",
            )
            .await?;
        into_grant(response)
    }

    pub async fn resend_verification_code(
        &self,
        request: &ResendVerificationRequest,
    ) -> Result<MessageResponse, ApiError> {
        self.request(
            endpoints::auth::RESEND_VERIFICATION_CODE,
            RequestOptions::post(request)?,
        )
        .await
    }

    pub async fn send_password_reset_email(
        &self,
        request: &PasswordResetRequest,
    ) -> Result<MessageResponse, ApiError> {
        self.request(
            endpoints::auth::SEND_RESET_EMAIL,
            RequestOptions::post(request)?,
        )
        .await
    }

    pub async fn reset_password(
        &self,
        request: &PasswordReset,
    ) -> Result<MessageResponse, ApiError> {
        self.request(
            endpoints::auth::RESET_PASSWORD,
            RequestOptions::post(request)?,
        )
        .await
    }

    pub async fn health_check(&self) -> Result<HealthResponse, ApiError> {
        self.request(endpoints::auth::HEALTH_CHECK, RequestOptions::get())
            .await
    }

    /// The signed-in user's profile: the cached copy when present, otherwise
    /// derived from the token's claims and cached for next time.
    pub async fn current_user(&self) -> Result<User, ApiError> {
        let token = self
            .credentials
            .get_token()
            .ok_or_else(|| ApiError::rejected("No authentication token"))?;

        if let Some(user) = self.credentials.get_profile() {
            return Ok(user);
        }

        let claims = decode_claims(&token).map_err(|err| {
            debug!(error = %err, "stored token is undecodable");
            ApiError::rejected("Invalid token")
        })?;
        let id = claims
            .user_id
            .ok_or_else(|| ApiError::rejected("Invalid token"))?;
        let user = User {
            id,
            email: claims.email.unwrap_or_default(),
            first_name: None,
            last_name: None,
        };

        if let Err(err) = self.credentials.set_profile(&user) {
            debug!(error = %err, "could not cache derived profile");
        }
        Ok(user)
    }

    pub async fn send_message(
        &self,
        text: &str,
        conversation_id: Option<i64>,
    ) -> Result<ChatResponse, ApiError> {
        let request = SendMessageRequest {
            text: text.to_string(),
            conversation_id,
        };
        self.request(
            endpoints::messaging::SEND_MESSAGE,
            RequestOptions::post(&request)?,
        )
        .await
    }

    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let response: ConversationsResponse = self
            .request(
                endpoints::messaging::GET_CONVERSATIONS,
                RequestOptions::get(),
            )
            .await?;
        Ok(response.conversations)
    }

    /// Message history for one conversation. The id travels as a query
    /// parameter; the auth header contract is the same as for every call.
    pub async fn fetch_messages(&self, conversation_id: i64) -> Result<MessagesResponse, ApiError> {
        self.request(
            endpoints::messaging::GET_MESSAGES,
            RequestOptions::get().with_query("conversation_id", conversation_id),
        )
        .await
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn ensure_csrf(&self) -> Option<String> {
        ApiClient::ensure_csrf(self).await
    }

    async fn login(&self, credentials: &LoginCredentials) -> Result<AuthGrant, ApiError> {
        ApiClient::login(self, credentials).await
    }

    async fn verify_email(
        &self,
        request: &EmailVerificationRequest,
    ) -> Result<AuthGrant, ApiError> {
        ApiClient::verify_email(self, request).await
    }

    async fn current_user(&self) -> Result<User, ApiError> {
        ApiClient::current_user(self).await
    }
}

#[async_trait]
impl ChatApi for ApiClient {
    async fn send_message(
        &self,
        text: &str,
        conversation_id: Option<i64>,
    ) -> Result<ChatResponse, ApiError> {
        ApiClient::send_message(self, text, conversation_id).await
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        ApiClient::list_conversations(self).await
    }

    async fn fetch_messages(&self, conversation_id: i64) -> Result<MessagesResponse, ApiError> {
        ApiClient::fetch_messages(self, conversation_id).await
    }
}

fn decode_body<T: DeserializeOwned>(status: StatusCode, bytes: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(bytes).map_err(|err| ApiError::Decode {
        status,
        message: format!("Unexpected response from server: {err}"),
    })
}

fn into_grant(response: AuthResponse) -> Result<AuthGrant, ApiError> {
    match (response.user, response.access) {
        (Some(user), Some(access)) if !access.is_empty() => Ok(AuthGrant {
            user,
            access,
            refresh: response.refresh,
        }),
        _ => Err(ApiError::Decode {
            status: StatusCode::OK,
            message: "Authentication response is missing the user or access token".to_string(),
        }),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host_str() {
        Some("localhost") => true,
        Some(host) => host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<std::net::IpAddr>()
            .map(|addr| addr.is_loopback())
            .unwrap_or(false),
        None => false,
    }
}
