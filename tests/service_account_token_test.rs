use std::sync::Arc;

use gcp_base_hook::{
    ConnectionConfig, CredentialResolver, HookError, ServiceAccountKey, TokenProvider,
};

mod support;
use support::gcp_fixture::{
    RecordingAmbient, TEST_CLIENT_EMAIL, TEST_RSA_PRIVATE_KEY, jwt_claims, service_account_json,
    ui_escaped_service_account_json, write_key_file,
};

fn token_mock(server: &mut mockito::Server, token: &str) -> mockito::Mock {
    server
        .mock("POST", "/token")
        .match_header(
            "content-type",
            mockito::Matcher::Regex("^application/x-www-form-urlencoded".into()),
        )
        .match_body(mockito::Matcher::AllOf(vec![
            mockito::Matcher::Regex(
                "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer".into(),
            ),
            mockito::Matcher::Regex("assertion=[A-Za-z0-9_-]+\\.[A-Za-z0-9_-]+\\.".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(
            r#"{{"access_token":"{token}","token_type":"Bearer","expires_in":3600}}"#
        ))
}

#[test]
fn signed_assertion_carries_scopes_audience_and_subject() {
    let key = ServiceAccountKey::new(TEST_CLIENT_EMAIL, TEST_RSA_PRIVATE_KEY)
        .with_token_uri("https://oauth2.example.test/token");
    let scopes = vec![
        "https://www.googleapis.com/auth/bigquery".to_string(),
        "https://www.googleapis.com/auth/drive".to_string(),
    ];

    let claims = jwt_claims(&key.sign_assertion(&scopes, Some("user@example.com")).unwrap());
    assert_eq!(claims["iss"], TEST_CLIENT_EMAIL);
    assert_eq!(claims["aud"], "https://oauth2.example.test/token");
    assert_eq!(
        claims["scope"],
        "https://www.googleapis.com/auth/bigquery https://www.googleapis.com/auth/drive"
    );
    assert_eq!(claims["sub"], "user@example.com");
    let iat = claims["iat"].as_i64().unwrap();
    assert_eq!(claims["exp"].as_i64().unwrap() - iat, 3600);

    let claims = jwt_claims(&key.sign_assertion(&scopes, None).unwrap());
    assert!(claims.get("sub").is_none());
}

#[test]
fn key_file_credentials_exchange_assertion_without_caching() {
    let mut server = mockito::Server::new();
    let m = token_mock(&mut server, "ya29.file-token").expect(2).create();

    let dir = tempfile::tempdir().unwrap();
    let token_uri = format!("{}/token", server.url());
    let path = write_key_file(&dir, "sa.json", &service_account_json(Some(&token_uri)));
    let resolver = CredentialResolver::builder()
        .ambient_credentials(Arc::new(RecordingAmbient::new("unused")))
        .build_with_config(ConnectionConfig {
            key_path: Some(path.to_string_lossy().into_owned()),
            ..Default::default()
        });

    assert_eq!(resolver.access_token().unwrap(), "ya29.file-token");
    assert_eq!(resolver.access_token().unwrap(), "ya29.file-token");
    m.assert();
}

#[test]
fn ui_escaped_inline_key_still_signs() {
    let mut server = mockito::Server::new();
    let m = token_mock(&mut server, "ya29.inline-token").create();

    let token_uri = format!("{}/token", server.url());
    let resolver = CredentialResolver::builder()
        .ambient_credentials(Arc::new(RecordingAmbient::new("unused")))
        .build_with_config(ConnectionConfig {
            keyfile_dict: Some(ui_escaped_service_account_json(&token_uri)),
            ..Default::default()
        });

    assert_eq!(resolver.access_token().unwrap(), "ya29.inline-token");
    m.assert();
}

#[test]
fn authorized_client_fetches_token_at_send_time() {
    let mut server = mockito::Server::new();
    let token = token_mock(&mut server, "ya29.request-token").expect(1).create();
    let api = server
        .mock("GET", "/pubsub/v1/projects/p/topics")
        .match_header("authorization", "Bearer ya29.request-token")
        .with_status(200)
        .with_body(r#"{"topics":[]}"#)
        .create();

    let token_uri = format!("{}/token", server.url());
    let resolver = CredentialResolver::builder()
        .ambient_credentials(Arc::new(RecordingAmbient::new("unused")))
        .build_with_config(ConnectionConfig {
            keyfile_dict: Some(service_account_json(Some(&token_uri))),
            ..Default::default()
        });

    let client = resolver.authorized_client().unwrap();
    // Construction alone performs no network I/O.
    assert!(!token.matched());

    client
        .get(
            &format!("{}/pubsub/v1/projects/p/topics", server.url()),
            &Default::default(),
        )
        .unwrap();
    token.assert();
    api.assert();
}

#[test]
fn token_endpoint_errors_are_surfaced() {
    let mut server = mockito::Server::new();
    let _m = server
        .mock("POST", "/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant"}"#)
        .create();

    let key = ServiceAccountKey::new(TEST_CLIENT_EMAIL, TEST_RSA_PRIVATE_KEY)
        .with_token_uri(format!("{}/token", server.url()));
    let creds = gcp_base_hook::Credentials::service_account(
        key,
        vec![gcp_base_hook::CLOUD_PLATFORM_SCOPE.to_string()],
        reqwest::blocking::Client::new(),
    );

    match creds.token() {
        Err(HookError::TokenEndpoint { status, body }) => {
            assert_eq!(status, 400);
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("expected TokenEndpoint error, got {other:?}"),
    }
}
