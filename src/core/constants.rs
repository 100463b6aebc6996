//! Shared constants used across the application

use std::time::Duration;

/// Base URL used when neither the config file nor the environment names one.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Environment variable that overrides the configured API base URL.
pub const API_BASE_URL_ENV: &str = "PARLOR_API_BASE_URL";

/// Client-side bound applied to every request. Exceeding it surfaces as a
/// network error.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How often the session controller re-reads the stored token looking for
/// expiry. Sessions may outlive their token by up to this long.
pub const DEFAULT_TOKEN_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Durable storage key holding the bearer token.
pub const TOKEN_KEY: &str = "auth_token";

/// Durable storage key holding the cached user profile (JSON).
pub const USER_KEY: &str = "user_data";

/// Key prefixes treated as session-scoped when wiping credentials.
pub const SESSION_KEY_PREFIXES: [&str; 2] = ["auth_", "user_"];

/// Prefix for per-conversation message cache keys.
pub const CONVERSATION_KEY_PREFIX: &str = "conversation_";

/// Cookie mirroring the bearer token.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Cookie mirroring the cached profile.
pub const USER_DATA_COOKIE: &str = "user_data";

/// Cookie set by the server's CSRF endpoint.
pub const CSRF_COOKIE: &str = "csrftoken";

/// Header carrying the anti-forgery token on state-changing requests.
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Lifetime of the mirrored credential cookies.
pub const CREDENTIAL_COOKIE_DAYS: i64 = 7;
