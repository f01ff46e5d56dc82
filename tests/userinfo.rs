mod common;

use serde_json::json;

use common::{AUDIENCE, ISSUER, TestApp};
use oidc_core::services::profile::InMemoryUserDirectory;
use oidc_core::services::auth::ProtectedResourceError;
use oidc_core::services::claims::is_protocol_claim;
use oidc_core::services::userinfo::UserInfoError;

#[tokio::test]
async fn releases_scoped_claims_without_protocol_claims() {
    let app = TestApp::new();
    let token = app
        .issuer
        .access_token("alice", "openid profile email", Some("some-jkt"));

    let validated = app
        .state
        .userinfo_validator
        .validate_request(&token)
        .await
        .unwrap();
    assert_eq!(validated.subject_id(), "alice");
    assert!(
        validated
            .subject
            .claims
            .iter()
            .all(|c| !is_protocol_claim(&c.claim_type))
    );

    let body = app.state.userinfo_response.process(&validated).await.unwrap();
    assert_eq!(body["sub"], json!("alice"));
    assert_eq!(body["name"], json!("Alice Example"));
    assert_eq!(body["email"], json!("alice@example.com"));
    // JSON types from the directory are kept.
    assert_eq!(body["email_verified"], json!(true));
    // no `phone` scope
    assert!(!body.contains_key("phone_number"));
    for key in body.keys() {
        assert!(!is_protocol_claim(key) || key == "sub", "leaked {key}");
    }
}

#[tokio::test]
async fn phone_scope_releases_a_boolean_verification_flag() {
    let app = TestApp::new();
    app.directory.insert(
        InMemoryUserDirectory::from_json_str(
            r#"[{"subject_id": "carol", "claims": {"phone_number": "+81 3 0000 0000", "phone_number_verified": false, "updated_at": 1699999000}}]"#,
        )
        .unwrap()
        .get("carol")
        .unwrap(),
    );
    let token = app.issuer.access_token("carol", "openid phone profile", None);

    let validated = app.state.userinfo_validator.validate_request(&token).await.unwrap();
    let body = app.state.userinfo_response.process(&validated).await.unwrap();

    assert_eq!(body["phone_number"], json!("+81 3 0000 0000"));
    assert_eq!(body["phone_number_verified"], json!(false));
    assert_eq!(body["updated_at"], json!(1699999000));
}

#[tokio::test]
async fn openid_alone_releases_only_sub() {
    let app = TestApp::new();
    let token = app.issuer.access_token("alice", "openid", None);

    let validated = app.state.userinfo_validator.validate_request(&token).await.unwrap();
    let body = app.state.userinfo_response.process(&validated).await.unwrap();

    assert_eq!(body.len(), 1);
    assert_eq!(body["sub"], json!("alice"));
}

#[tokio::test]
async fn transaction_scope_adds_transaction_id() {
    let app = TestApp::new();
    let token = app.issuer.access_token("alice", "openid transaction:tx-42", None);

    let validated = app.state.userinfo_validator.validate_request(&token).await.unwrap();
    let body = app.state.userinfo_response.process(&validated).await.unwrap();

    assert_eq!(body["transaction_id"], json!("tx-42"));
}

#[tokio::test]
async fn missing_openid_scope_is_invalid_token() {
    let app = TestApp::new();
    let token = app.issuer.access_token("alice", "profile email", None);

    let err = app
        .state
        .userinfo_validator
        .validate_request(&token)
        .await
        .unwrap_err();
    assert!(matches!(err, UserInfoError::Token(_)));
    assert_eq!(err.code(), ProtectedResourceError::InvalidToken);
}

#[tokio::test]
async fn token_without_sub_is_rejected() {
    let app = TestApp::new();
    let now = chrono::Utc::now().timestamp();
    let token = app.issuer.sign(json!({
        "iss": ISSUER,
        "aud": AUDIENCE,
        "client_id": "web",
        "scope": "openid",
        "iat": now,
        "exp": now + 600,
    }));

    let err = app
        .state
        .userinfo_validator
        .validate_request(&token)
        .await
        .unwrap_err();
    assert!(matches!(err, UserInfoError::MissingSubject));
    assert_eq!(err.code(), ProtectedResourceError::InvalidToken);
}

#[tokio::test]
async fn inactive_or_unknown_subject_is_rejected() {
    let app = TestApp::new();

    for sub in ["bob", "mallory"] {
        let token = app.issuer.access_token(sub, "openid", None);
        let err = app
            .state
            .userinfo_validator
            .validate_request(&token)
            .await
            .unwrap_err();
        assert!(
            matches!(&err, UserInfoError::InactiveSubject { subject } if subject == sub),
            "{sub}: {err:?}"
        );
        assert_eq!(err.code(), ProtectedResourceError::InvalidToken);
    }
}

#[tokio::test]
async fn deactivation_takes_effect_immediately() {
    let app = TestApp::new();
    let token = app.issuer.access_token("alice", "openid", None);

    app.state.userinfo_validator.validate_request(&token).await.unwrap();
    assert!(app.directory.set_active("alice", false));

    assert!(matches!(
        app.state.userinfo_validator.validate_request(&token).await,
        Err(UserInfoError::InactiveSubject { .. })
    ));
}

#[tokio::test]
async fn expired_or_foreign_tokens_are_rejected() {
    let app = TestApp::new();
    let now = chrono::Utc::now().timestamp();

    let expired = app.issuer.sign(json!({
        "iss": ISSUER, "aud": AUDIENCE, "sub": "alice", "scope": "openid",
        "iat": now - 3600, "exp": now - 1800,
    }));
    let wrong_audience = app.issuer.sign(json!({
        "iss": ISSUER, "aud": "someone-else", "sub": "alice", "scope": "openid",
        "iat": now, "exp": now + 600,
    }));
    let forged = {
        // same claims, signed by a key nobody trusts
        let key = ed25519_dalek::SigningKey::from_bytes(&[9; 32]);
        common::sign_compact(
            &key,
            &json!({ "typ": "at+jwt", "alg": "EdDSA" }),
            &json!({
                "iss": ISSUER, "aud": AUDIENCE, "sub": "alice", "scope": "openid",
                "iat": now, "exp": now + 600,
            }),
        )
    };

    for token in [expired, wrong_audience, forged, "garbage".to_string()] {
        let err = app
            .state
            .userinfo_validator
            .validate_request(&token)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProtectedResourceError::InvalidToken);
    }
}
