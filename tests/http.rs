mod common;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use std::sync::Arc;

use common::{CLIENT_ID, ORIGIN, ProofKey, StalledStore, TestApp, authorize_query};

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(uri)
}

fn challenges(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::WWW_AUTHENTICATE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn health_carries_request_id_and_security_headers() {
    let app = TestApp::new();
    let (status, headers, body) = send(&app.router(), get("/health").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-content-type-options"], "nosniff");
}

#[tokio::test]
async fn userinfo_without_credentials_advertises_both_schemes() {
    let app = TestApp::new();
    let (status, headers, _) = send(
        &app.router(),
        get("/connect/userinfo").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let values = challenges(&headers);
    assert!(values[0].starts_with("DPoP algs=\""), "{values:?}");
    assert!(values[0].contains("EdDSA"));
    assert_eq!(values[1], "Bearer");
}

#[tokio::test]
async fn userinfo_with_bearer_token() {
    let app = TestApp::new();
    let token = app.issuer.access_token("alice", "openid email", None);

    let (status, headers, body) = send(
        &app.router(),
        Request::builder()
            .method("POST")
            .uri("/connect/userinfo")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sub"], json!("alice"));
    assert_eq!(body["email"], json!("alice@example.com"));
    assert!(body.get("name").is_none());
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
}

#[tokio::test]
async fn sender_constrained_token_on_bearer_is_rejected() {
    let app = TestApp::new();
    let key = ProofKey::new(7);
    let token = app.issuer.access_token("alice", "openid", Some(&key.jkt()));

    let (status, headers, body) = send(
        &app.router(),
        get("/connect/userinfo")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], json!("invalid_token"));
    assert!(challenges(&headers)[0].starts_with("DPoP error=\"invalid_token\""));
}

#[tokio::test]
async fn userinfo_with_dpop_and_replay() {
    let app = TestApp::new();
    let key = ProofKey::new(7);
    let token = app.issuer.access_token("alice", "openid profile", Some(&key.jkt()));
    let proof = key.proof_for(
        "GET",
        &format!("{ORIGIN}/connect/userinfo"),
        app.now(),
        "userinfo-1",
        Some(&token),
    );
    let request = || {
        get("/connect/userinfo")
            .header(header::AUTHORIZATION, format!("DPoP {token}"))
            .header("DPoP", proof.clone())
            .body(Body::empty())
            .unwrap()
    };

    let (status, _, body) = send(&app.router(), request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], json!("Alice Example"));

    let (status, headers, body) = send(&app.router(), request()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], json!("invalid_dpop_proof"));
    assert!(challenges(&headers)[0].starts_with("DPoP error=\"invalid_dpop_proof\""));
}

#[tokio::test]
async fn dpop_proof_for_another_endpoint_is_rejected() {
    let app = TestApp::new();
    let key = ProofKey::new(7);
    let token = app.issuer.access_token("alice", "openid", Some(&key.jkt()));
    let proof = key.proof_for(
        "GET",
        &format!("{ORIGIN}/api/v1/identity"),
        app.now(),
        "wrong-url",
        Some(&token),
    );

    let (status, _, _) = send(
        &app.router(),
        get("/connect/userinfo")
            .header(header::AUTHORIZATION, format!("DPoP {token}"))
            .header("DPoP", proof)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn identity_reports_dpop_binding() {
    let app = TestApp::new();
    let key = ProofKey::new(3);
    // no openid needed for a plain protected resource
    let token = app.issuer.access_token("alice", "api", Some(&key.jkt()));
    let proof = key.proof_for(
        "GET",
        &format!("{ORIGIN}/api/v1/identity"),
        app.now(),
        "identity-1",
        Some(&token),
    );

    let (status, _, body) = send(
        &app.router(),
        get("/api/v1/identity")
            .header(header::AUTHORIZATION, format!("DPoP {token}"))
            .header("DPoP", proof)
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sub"], json!("alice"));
    assert_eq!(body["token_type"], json!("DPoP"));
    assert_eq!(body["jkt"], json!(key.jkt()));
    assert!(body["claims"].get("cnf").is_none());
}

#[tokio::test]
async fn identity_rejects_bound_token_on_bearer_and_unbound_token_on_dpop() {
    let app = TestApp::new();
    let key = ProofKey::new(3);

    let bound = app.issuer.access_token("alice", "api", Some(&key.jkt()));
    let (status, _, _) = send(
        &app.router(),
        get("/api/v1/identity")
            .header(header::AUTHORIZATION, format!("Bearer {bound}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let unbound = app.issuer.access_token("alice", "api", None);
    let proof = key.proof_for(
        "GET",
        &format!("{ORIGIN}/api/v1/identity"),
        app.now(),
        "unbound",
        Some(&unbound),
    );
    let (status, _, body) = send(
        &app.router(),
        get("/api/v1/identity")
            .header(header::AUTHORIZATION, format!("DPoP {unbound}"))
            .header("DPoP", proof)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], json!("invalid_token"));
}

fn par(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/connect/par")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn par_push_then_authorization_context() {
    let app = TestApp::new();
    let router = app.router();

    let (status, _, body) = send(&router, par(authorize_query(&[]))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["expires_in"], json!(60));
    let request_uri = body["request_uri"].as_str().unwrap().to_string();
    assert!(request_uri.starts_with("urn:ietf:params:oauth:request_uri:"));

    let return_url = format!(
        "/connect/authorize/callback?client_id={CLIENT_ID}&request_uri={request_uri}"
    );
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("returnUrl", &return_url)
        .finish();
    let uri = format!("/api/v1/authorization-context?{query}");

    let (status, _, body) = send(&router, get(&uri).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["client_id"], json!(CLIENT_ID));
    assert_eq!(body["pushed"], json!(true));
    assert_eq!(body["scopes"], json!(["openid", "profile"]));

    // consumed
    let (status, _, _) = send(&router, get(&uri).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn par_rejects_nested_request_uri_and_unknown_clients() {
    let app = TestApp::new();
    let router = app.router();

    let nested = authorize_query(&[("request_uri", "urn:ietf:params:oauth:request_uri:x")]);
    let (status, _, body) = send(&router, par(nested)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("invalid_request"));

    let unknown = authorize_query(&[]).replace("client_id=web", "client_id=nobody");
    let (status, _, body) = send(&router, par(unknown)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("unauthorized_client"));
}

#[tokio::test]
async fn authorization_context_for_foreign_url_is_not_found() {
    let app = TestApp::new();
    let (status, _, body) = send(
        &app.router(),
        get("/api/v1/authorization-context?returnUrl=https%3A%2F%2Fevil.example%2Fx")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("not_found"));
}

fn return_url_of(location: &str) -> String {
    let query = location.split_once('?').map(|(_, q)| q).unwrap_or_default();
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "returnUrl")
        .map(|(_, v)| v.into_owned())
        .expect("returnUrl parameter")
}

fn context_uri(return_url: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("returnUrl", return_url)
        .finish();
    format!("/api/v1/authorization-context?{query}")
}

/// GET `uri`, expect a redirect to the login page, return its return URL.
async fn expect_login_redirect(router: &Router, uri: &str) -> String {
    let (status, headers, body) = send(router, get(uri).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::FOUND, "{uri}: {body}");
    let location = headers[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("/account/login?returnUrl="), "{location}");
    return_url_of(location)
}

#[tokio::test]
async fn login_page_can_look_up_and_resume_the_authorize_request() {
    let app = TestApp::new();
    let router = app.router();

    let return_url = expect_login_redirect(
        &router,
        &format!("/connect/authorize?{}", authorize_query(&[("ui_locales", "ja")])),
    )
    .await;
    assert!(return_url.starts_with("/connect/authorize/callback?authzId="), "{return_url}");
    assert!(!return_url.contains("request_uri"));
    assert!(!return_url.contains("redirect_uri"));

    // The page may look the request up more than once.
    for _ in 0..2 {
        let (status, _, body) =
            send(&router, get(&context_uri(&return_url)).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["client_id"], json!(CLIENT_ID));
        assert_eq!(body["ui_locales"], json!("ja"));
        assert_eq!(body["pushed"], json!(false));
    }

    // Nobody signs in here, so the callback sends the browser back to login.
    expect_login_redirect(&router, &return_url).await;
}

#[tokio::test]
async fn pushed_request_survives_the_login_page() {
    let app = TestApp::new();
    let router = app.router();
    let front_channel = "client_id=par-only&redirect_uri=https%3A%2F%2Fpar.example%2Fcb\
        &response_type=code&scope=openid&state=p1\
        &code_challenge=E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM&code_challenge_method=S256";

    let (status, _, body) = send(&router, par(front_channel.to_string())).await;
    assert_eq!(status, StatusCode::CREATED);
    let request_uri: String =
        url::form_urlencoded::byte_serialize(body["request_uri"].as_str().unwrap().as_bytes()).collect();

    let return_url = expect_login_redirect(
        &router,
        &format!("/connect/authorize?client_id=par-only&request_uri={request_uri}"),
    )
    .await;

    let (status, _, body) =
        send(&router, get(&context_uri(&return_url)).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["client_id"], json!("par-only"));
    assert_eq!(body["pushed"], json!(true));

    // The parked message remembers the push, so the PAR-only client may resume.
    expect_login_redirect(&router, &return_url).await;

    // The handle itself was single use.
    let (status, _, body) = send(
        &router,
        get(&format!("/connect/authorize?client_id=par-only&request_uri={request_uri}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("invalid_request"));
}

#[tokio::test]
async fn unknown_authorization_message_is_a_bad_request() {
    let app = TestApp::new();
    let (status, _, body) = send(
        &app.router(),
        get("/connect/authorize/callback?authzId=nope").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("invalid_request"));
}

#[tokio::test]
async fn authorize_with_unreachable_par_store_is_unavailable() {
    let app = TestApp::with_par_store(Arc::new(StalledStore));
    let uri = format!(
        "/connect/authorize?client_id={CLIENT_ID}&request_uri=urn%3Aietf%3Aparams%3Aoauth%3Arequest_uri%3Aabc"
    );

    let (status, headers, body) = send(&app.router(), get(&uri).body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(!headers.contains_key(header::LOCATION));
    assert_eq!(body["error"]["code"], json!("temporarily_unavailable"));
}

#[tokio::test]
async fn authorize_errors_after_client_check_go_back_to_the_client() {
    let app = TestApp::new();
    let query = authorize_query(&[]).replace("openid+profile", "openid+admin");

    let (status, headers, _) = send(
        &app.router(),
        get(&format!("/connect/authorize?{query}")).body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(
        headers[header::LOCATION],
        "https://app.example/cb?error=invalid_scope&state=xyz"
    );
}

#[tokio::test]
async fn authorize_with_unregistered_redirect_is_not_redirected() {
    let app = TestApp::new();
    let query = authorize_query(&[]).replace("app.example", "evil.example");

    let (status, headers, body) = send(
        &app.router(),
        get(&format!("/connect/authorize?{query}")).body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!headers.contains_key(header::LOCATION));
    assert_eq!(body["error"]["code"], json!("invalid_request"));
}
