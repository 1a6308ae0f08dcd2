//! Route and page guards behind a real server.
//!
//! These tests start a server on a random port, send raw HTTP/1.1 traffic,
//! and assert on status lines, bodies and `Location` headers.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use turnstile::config::{Auth, Config, Server as ServerConfig};
use turnstile::{Evaluator, Router, Rule, auth, db, guard, page, server};

use super::{SECRET, principal_with_roles, seeded_store};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        auth: Auth {
            jwt_secret: SECRET.to_string(),
            token_expiry_days: 1,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Start a server with one guarded API route and one guarded page.
///
/// - `GET /api/wallets` requires `finance:wallet_management:read`
/// - `GET /api/releases/{id}` requires either release delete scope
/// - `GET /admin/earnings` is a page requiring `finance:earnings_management:read`
async fn start_test_server() -> (server::Server, Arc<Evaluator<db::Store>>) {
    let evaluator = Arc::new(Evaluator::new(seeded_store().await));
    principal_with_roles(&evaluator, "fin", &["financial_admin"]).await;
    principal_with_roles(&evaluator, "artist", &["artist"]).await;

    let mut router = Router::new();
    router.get(
        "/api/wallets",
        guard::route(
            Arc::clone(&evaluator),
            Rule::permission("finance:wallet_management:read"),
            |_ctx, principal| async move {
                turnstile::response::ok(&turnstile::json!({ "viewer": principal.id }))
            },
        ),
    );
    router.get(
        "/api/releases/{id}",
        guard::route(
            Arc::clone(&evaluator),
            Rule::permission(["release:delete:own", "release:delete:label"]),
            |ctx, _principal| async move {
                let id = ctx.require_param("id")?;
                turnstile::response::ok(&turnstile::json!({ "deleted": id }))
            },
        ),
    );
    router.get(
        "/admin/earnings",
        page::route(
            Arc::clone(&evaluator),
            Rule::permission("finance:earnings_management:read"),
            |_ctx, _principal| async move { turnstile::response::ok(&turnstile::json!({ "page": "earnings" })) },
        ),
    );

    let server = server::start(test_config(), router.into_handle())
        .await
        .expect("failed to start test server");
    (server, evaluator)
}

fn token(principal_id: &str) -> String {
    auth::create_token(&test_config().auth, principal_id).expect("failed to create token")
}

/// Send a raw HTTP/1.1 request with `Connection: close` and read the full response.
async fn raw_request(addr: SocketAddr, payload: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("failed to connect");
    stream.write_all(payload).await.expect("failed to write");

    let mut buf = Vec::new();
    let _ = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        stream.read_to_end(&mut buf),
    )
    .await;
    String::from_utf8_lossy(&buf).into_owned()
}

async fn get(addr: SocketAddr, path: &str, extra_headers: &str) -> String {
    let request = format!(
        "GET {path} HTTP/1.1\r\nHost: localhost\r\n{extra_headers}Connection: close\r\n\r\n"
    );
    raw_request(addr, request.as_bytes()).await
}

async fn get_as(addr: SocketAddr, path: &str, principal_id: &str) -> String {
    let auth = format!("Authorization: Bearer {}\r\n", token(principal_id));
    get(addr, path, &auth).await
}

fn status_line(response: &str) -> &str {
    response.lines().next().unwrap_or("")
}

fn location(response: &str) -> Option<&str> {
    response.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.eq_ignore_ascii_case("location").then(|| value.trim())
    })
}

// ---------------------------------------------------------------------------
// API guards
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_token_is_401() {
    let (server, _) = start_test_server().await;
    let response = get(server.addr(), "/api/wallets", "").await;
    server.shutdown().await.unwrap();

    assert!(status_line(&response).contains("401"), "{response}");
    assert!(response.contains(r#"{"error":"Unauthorized"}"#), "{response}");
}

#[tokio::test]
async fn unknown_principal_is_401_without_confirming_the_id() {
    let (server, _) = start_test_server().await;
    let response = get_as(server.addr(), "/api/wallets", "ghost").await;
    server.shutdown().await.unwrap();

    assert!(status_line(&response).contains("401"), "{response}");
    assert!(!response.contains("ghost"), "{response}");
}

#[tokio::test]
async fn lacking_permission_is_403_and_audited() {
    let (server, evaluator) = start_test_server().await;
    let response = get_as(server.addr(), "/api/wallets", "artist").await;
    server.shutdown().await.unwrap();

    assert!(status_line(&response).contains("403"), "{response}");
    assert!(
        response.contains("finance:wallet_management:read"),
        "error should name the requirement: {response}"
    );
    assert_eq!(
        evaluator.store().audit_count("permission_denied").await.unwrap(),
        1
    );
}

#[tokio::test]
async fn holder_gets_through() {
    let (server, _) = start_test_server().await;
    let response = get_as(server.addr(), "/api/wallets", "fin").await;
    server.shutdown().await.unwrap();

    assert!(status_line(&response).contains("200"), "{response}");
    assert!(response.contains(r#""viewer":"fin""#), "{response}");
    assert!(response.contains("X-Content-Type-Options") || response.contains("x-content-type-options"));
}

#[tokio::test]
async fn any_of_list_admits_either_scope() {
    let (server, evaluator) = start_test_server().await;
    evaluator.grant("artist", "release:delete:label").await.unwrap();
    let response = get_as(server.addr(), "/api/releases/r-42", "artist").await;
    server.shutdown().await.unwrap();

    assert!(status_line(&response).contains("200"), "{response}");
    assert!(response.contains(r#""deleted":"r-42""#), "{response}");
}

#[tokio::test]
async fn denial_applies_to_the_next_request() {
    let (server, evaluator) = start_test_server().await;
    let addr = server.addr();

    let before = get_as(addr, "/api/wallets", "fin").await;
    evaluator.deny("fin", "finance:wallet_management:read").await.unwrap();
    let after = get_as(addr, "/api/wallets", "fin").await;
    server.shutdown().await.unwrap();

    assert!(status_line(&before).contains("200"), "{before}");
    assert!(status_line(&after).contains("403"), "{after}");
}

// ---------------------------------------------------------------------------
// Page guards
// ---------------------------------------------------------------------------

#[tokio::test]
async fn anonymous_page_visit_redirects_to_login() {
    let (server, _) = start_test_server().await;
    let response = get(server.addr(), "/admin/earnings?range=30d", "").await;
    server.shutdown().await.unwrap();

    assert!(status_line(&response).contains("307"), "{response}");
    assert_eq!(
        location(&response),
        Some("/login?next=%2Fadmin%2Fearnings%3Frange%3D30d")
    );
}

#[tokio::test]
async fn forbidden_page_visit_redirects_to_unauthorized() {
    let (server, _) = start_test_server().await;
    let cookie = format!("Cookie: theme=dark; access_token={}\r\n", token("artist"));
    let response = get(server.addr(), "/admin/earnings", &cookie).await;
    server.shutdown().await.unwrap();

    assert!(status_line(&response).contains("307"), "{response}");
    assert_eq!(location(&response), Some("/unauthorized"));
}

#[tokio::test]
async fn permitted_page_renders_from_session_cookie() {
    let (server, _) = start_test_server().await;
    let cookie = format!("Cookie: access_token={}\r\n", token("fin"));
    let response = get(server.addr(), "/admin/earnings", &cookie).await;
    server.shutdown().await.unwrap();

    assert!(status_line(&response).contains("200"), "{response}");
    assert!(response.contains(r#""page":"earnings""#), "{response}");
}

#[tokio::test]
async fn api_guard_ignores_session_cookie() {
    let (server, _) = start_test_server().await;
    let cookie = format!("Cookie: access_token={}\r\n", token("fin"));
    let response = get(server.addr(), "/api/wallets", &cookie).await;
    server.shutdown().await.unwrap();

    assert!(status_line(&response).contains("401"), "{response}");
}
