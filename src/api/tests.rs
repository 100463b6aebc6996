use super::*;
use crate::core::constants::{CSRF_COOKIE, TOKEN_KEY};
use crate::core::storage::MemoryStorage;
use crate::core::token::encode_test_token;
use crate::utils::test_utils::{unreachable_base_url, MockResponse, MockServer};
use serde_json::json;

fn client_for(base_url: &str) -> (ApiClient, Arc<dyn SessionStorage>) {
    let storage: Arc<dyn SessionStorage> = Arc::new(MemoryStorage::new());
    let settings = ApiSettings {
        base_url: base_url.to_string(),
        timeout: Duration::from_secs(5),
    };
    let client = ApiClient::new(&settings, Arc::clone(&storage)).expect("client should build");
    (client, storage)
}

fn csrf_cookie_response() -> MockResponse {
    MockResponse::json(200, json!({"detail": "CSRF cookie set"}))
        .with_header("set-cookie", &format!("{CSRF_COOKIE}=csrf-abc; Path=/"))
}

async fn messaging_server() -> MockServer {
    MockServer::start(|request| match request.path() {
        endpoints::auth::CSRF_TOKEN => csrf_cookie_response(),
        endpoints::messaging::SEND_MESSAGE => MockResponse::json(
            200,
            json!({
                "message": "Message received",
                "content": "Hello back",
                "conversation_id": 7,
                "timestamp": "2024-05-01T10:00:00Z"
            }),
        ),
        endpoints::messaging::GET_CONVERSATIONS => MockResponse::json(
            200,
            json!({"conversations": [{"id": 7, "user": 1, "title": "First"}]}),
        ),
        endpoints::messaging::GET_MESSAGES => MockResponse::json(
            200,
            json!({"conversation_id": "7", "messages": [{"sender": "user", "text": "hi"}]}),
        ),
        _ => MockResponse::json(404, json!({"error": "Not found"})),
    })
    .await
}

#[tokio::test]
async fn state_changing_requests_carry_token_and_csrf_header() {
    let server = messaging_server().await;
    let (client, storage) = client_for(&server.base_url);
    storage.set(TOKEN_KEY, "jwt-123").unwrap();

    let reply = client.send_message("hi", Some(7)).await.unwrap();
    assert_eq!(reply.content, "Hello back");
    assert_eq!(reply.conversation_id, Some(7));

    let requests = server.requests();
    let send = requests
        .iter()
        .find(|request| request.path() == endpoints::messaging::SEND_MESSAGE)
        .expect("send request should reach the server");
    assert_eq!(send.method, "POST");
    assert_eq!(send.header("authorization"), Some("Bearer jwt-123"));
    assert_eq!(send.header("x-csrftoken"), Some("csrf-abc"));
    assert_eq!(send.header("content-type"), Some("application/json"));
    assert_eq!(send.json(), json!({"text": "hi", "conversation_id": 7}));
}

#[tokio::test]
async fn csrf_token_is_fetched_at_most_once() {
    let server = messaging_server().await;
    let (client, _storage) = client_for(&server.base_url);

    client.send_message("one", None).await.unwrap();
    client.send_message("two", Some(7)).await.unwrap();
    assert_eq!(client.ensure_csrf().await.as_deref(), Some("csrf-abc"));

    assert_eq!(server.hits(endpoints::auth::CSRF_TOKEN), 1);
    assert_eq!(server.hits(endpoints::messaging::SEND_MESSAGE), 2);
}

#[tokio::test]
async fn reads_skip_csrf_and_omit_missing_token() {
    let server = messaging_server().await;
    let (client, _storage) = client_for(&server.base_url);

    let conversations = client.list_conversations().await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].title, "First");

    assert_eq!(server.hits(endpoints::auth::CSRF_TOKEN), 0);
    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].header("authorization"), None);
    assert!(requests[0].header("cookie").is_none());
}

#[tokio::test]
async fn message_history_passes_conversation_id_as_query() {
    let server = messaging_server().await;
    let (client, storage) = client_for(&server.base_url);
    storage.set(TOKEN_KEY, "jwt-123").unwrap();

    let history = client.fetch_messages(7).await.unwrap();
    assert_eq!(history.conversation_id, Some(7));
    assert_eq!(history.messages.len(), 1);

    let requests = server.requests();
    assert_eq!(requests[0].path(), endpoints::messaging::GET_MESSAGES);
    assert_eq!(requests[0].query(), Some("conversation_id=7"));
    assert_eq!(requests[0].header("authorization"), Some("Bearer jwt-123"));
}

#[tokio::test]
async fn csrf_cookie_rides_along_on_later_requests() {
    let server = messaging_server().await;
    let (client, _storage) = client_for(&server.base_url);

    client.send_message("hi", None).await.unwrap();
    client.list_conversations().await.unwrap();

    let listing = server
        .requests()
        .into_iter()
        .find(|request| request.path() == endpoints::messaging::GET_CONVERSATIONS)
        .expect("listing request should reach the server");
    let cookie = listing.header("cookie").unwrap_or_default();
    assert!(cookie.contains("csrftoken=csrf-abc"), "cookie header: {cookie}");
}

#[tokio::test]
async fn non_success_status_becomes_http_error_with_server_message() {
    let server = MockServer::start(|request| match request.path() {
        endpoints::auth::CSRF_TOKEN => csrf_cookie_response(),
        _ => MockResponse::json(
            401,
            json!({"success": false, "message": "Invalid email or password"}),
        ),
    })
    .await;
    let (client, _storage) = client_for(&server.base_url);

    let err = client
        .login(&LoginCredentials {
            email: "a@b.com".to_string(),
            password: "wrong".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Http { .. }));
    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    assert_eq!(err.message(), "Invalid email or password");
}

#[tokio::test]
async fn non_json_error_body_uses_generic_message() {
    let server = MockServer::start(|_| MockResponse::text(500, "<h1>boom</h1>")).await;
    let (client, _storage) = client_for(&server.base_url);

    let err = client.health_check().await.unwrap_err();
    assert_eq!(err.message(), "HTTP error! status: 500");
    assert!(err.body().is_none());
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let (client, _storage) = client_for(&unreachable_base_url().await);

    let err = client.list_conversations().await.unwrap_err();
    assert!(err.is_network());
    assert_eq!(err.message(), error::NETWORK_ERROR_MESSAGE);
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn stalled_server_times_out_as_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let holder = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let storage: Arc<dyn SessionStorage> = Arc::new(MemoryStorage::new());
    let settings = ApiSettings {
        base_url: format!("http://{addr}"),
        timeout: Duration::from_millis(200),
    };
    let client = ApiClient::new(&settings, storage).unwrap();

    let err = client.health_check().await.unwrap_err();
    assert!(err.is_network());
    holder.abort();
}

#[tokio::test]
async fn unsuccessful_login_body_is_rejected_with_server_message() {
    let server = MockServer::start(|request| match request.path() {
        endpoints::auth::CSRF_TOKEN => csrf_cookie_response(),
        _ => MockResponse::json(200, json!({"success": false, "message": "Account locked"})),
    })
    .await;
    let (client, _storage) = client_for(&server.base_url);

    let err = client
        .login(&LoginCredentials {
            email: "a@b.com".to_string(),
            password: "pw".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Rejected { .. }));
    assert_eq!(err.message(), "Account locked");
}

#[tokio::test]
async fn successful_login_yields_grant() {
    let server = MockServer::start(|request| match request.path() {
        endpoints::auth::CSRF_TOKEN => csrf_cookie_response(),
        _ => MockResponse::json(
            200,
            json!({
                "success": true,
                "message": "Login successful",
                "user": {"id": 1, "email": "a@b.com", "first_name": "Ada"},
                "access": "jwt-access",
                "refresh": "jwt-refresh"
            }),
        ),
    })
    .await;
    let (client, _storage) = client_for(&server.base_url);

    let grant = client
        .login(&LoginCredentials {
            email: "a@b.com".to_string(),
            password: "pw".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(grant.access, "jwt-access");
    assert_eq!(grant.refresh.as_deref(), Some("jwt-refresh"));
    assert_eq!(grant.user.first_name.as_deref(), Some("Ada"));

    let login = server
        .requests()
        .into_iter()
        .find(|request| request.path() == endpoints::auth::LOGIN)
        .unwrap();
    assert_eq!(login.json(), json!({"email": "a@b.com", "password": "pw"}));
}

#[tokio::test]
async fn failed_csrf_fetch_still_sends_the_request() {
    let server = MockServer::start(|request| match request.path() {
        endpoints::auth::CSRF_TOKEN => MockResponse::json(500, json!({})),
        _ => MockResponse::json(200, json!({"message": "sent"})),
    })
    .await;
    let (client, _storage) = client_for(&server.base_url);

    let reply = client
        .resend_verification_code(&ResendVerificationRequest {
            email: "a@b.com".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(reply.message, "sent");

    let resend = server
        .requests()
        .into_iter()
        .find(|request| request.path() == endpoints::auth::RESEND_VERIFICATION_CODE)
        .unwrap();
    assert_eq!(resend.header("x-csrftoken"), None);
}

#[tokio::test]
async fn current_user_derives_profile_from_token_and_caches_it() {
    let (client, storage) = client_for("http://127.0.0.1:9");
    let token = encode_test_token(&json!({
        "exp": 4_000_000_000_i64,
        "user_id": 42,
        "email": "z@y.com"
    }));
    storage.set(TOKEN_KEY, &token).unwrap();

    let user = client.current_user().await.unwrap();
    assert_eq!(user.id, 42);
    assert_eq!(user.email, "z@y.com");
    assert_eq!(client.credentials().get_profile(), Some(user));
}

#[tokio::test]
async fn current_user_requires_a_decodable_token() {
    let (client, storage) = client_for("http://127.0.0.1:9");

    let missing = client.current_user().await.unwrap_err();
    assert_eq!(missing.message(), "No authentication token");

    storage.set(TOKEN_KEY, "garbage").unwrap();
    let invalid = client.current_user().await.unwrap_err();
    assert_eq!(invalid.message(), "Invalid token");
}

#[test]
fn only_mutating_verbs_need_csrf() {
    assert!(is_state_changing(&Method::POST));
    assert!(is_state_changing(&Method::DELETE));
    assert!(!is_state_changing(&Method::GET));
    assert!(!is_state_changing(&Method::HEAD));
}

#[test]
fn loopback_hosts_are_detected() {
    assert!(is_loopback(&Url::parse("http://localhost:8000").unwrap()));
    assert!(is_loopback(&Url::parse("http://127.0.0.1:8000").unwrap()));
    assert!(is_loopback(&Url::parse("http://[::1]:8000").unwrap()));
    assert!(!is_loopback(&Url::parse("https://api.example.com").unwrap()));
}
