mod common;

use axum::http::header;
use common::{body_json, code_from_location, TestApp, OWNER_ID, SESSION_ID};
use serde_json::json;

#[tokio::test]
async fn application_secret_is_returned_exactly_once() {
    let app = TestApp::spawn();
    app.seed_session(SESSION_ID, OWNER_ID).await;

    let response = app
        .post_json_with_session(
            "/oauth/applications",
            SESSION_ID,
            json!({"name": "reader", "redirect_uri": "https://a.test/cb"}),
        )
        .await;
    assert_eq!(response.status(), 201);
    let created = body_json(response).await;
    assert!(created["client_secret"].is_string());
    assert!(created["client_id"].is_string());

    let response = app.get_with_session("/oauth/applications", SESSION_ID).await;
    assert_eq!(response.status(), 200);
    let listed = body_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert!(listed[0].get("client_secret").is_none());
}

#[tokio::test]
async fn application_delete_is_owner_scoped() {
    let mut builder = common::TestAppBuilder::new();
    builder.directory.users.push(trace_service::models::UserRecord {
        user_id: 99,
        user_name: "eve".to_string(),
    });
    let app = builder.build();
    app.seed_session(SESSION_ID, OWNER_ID).await;

    let response = app
        .post_json_with_session(
            "/oauth/applications",
            SESSION_ID,
            json!({"name": "reader", "redirect_uri": "https://a.test/cb"}),
        )
        .await;
    let created = body_json(response).await;
    let app_id = created["id"].as_str().unwrap();

    // A different user cannot delete it
    app.seed_session("sess-other", 99).await;
    let response = app
        .delete_with_session(&format!("/oauth/applications/{}", app_id), "sess-other")
        .await;
    assert_eq!(response.status(), 404);

    // The owner can
    let response = app
        .delete_with_session(&format!("/oauth/applications/{}", app_id), SESSION_ID)
        .await;
    assert_eq!(response.status(), 204);
}

#[tokio::test]
async fn management_surface_requires_a_session() {
    let app = TestApp::spawn();

    let response = app.get("/oauth/applications").await;
    assert_eq!(response.status(), 401);

    let response = app
        .get("/oauth/authorize?response_type=code&client_id=x&redirect_uri=https://a.test/cb")
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn code_exchange_issues_a_bearer_pair() {
    let app = TestApp::spawn();
    let (_, token) = app.issue_bearer(OWNER_ID).await;

    assert_eq!(token["token_type"], "Bearer");
    assert!(token["access_token"].is_string());
    assert!(token["refresh_token"].is_string());
    let expires_in = token["expires_in"].as_i64().unwrap();
    assert!(expires_in > 7190 && expires_in <= 7200);
}

#[tokio::test]
async fn authorization_code_is_single_use() {
    let app = TestApp::spawn();
    app.seed_session(SESSION_ID, OWNER_ID).await;

    let response = app
        .post_json_with_session(
            "/oauth/applications",
            SESSION_ID,
            json!({"name": "reader", "redirect_uri": "https://a.test/cb"}),
        )
        .await;
    let created = body_json(response).await;
    let client_id = created["client_id"].as_str().unwrap().to_string();
    let client_secret = created["client_secret"].as_str().unwrap().to_string();

    let authorize_path = format!(
        "/oauth/authorize?response_type=code&client_id={}&redirect_uri=https%3A%2F%2Fa.test%2Fcb&state=s1",
        client_id
    );
    let response = app.get_with_session(&authorize_path, SESSION_ID).await;
    assert_eq!(response.status(), 302);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(location.contains("state=s1"));
    let code = code_from_location(&location);

    let exchange = json!({
        "grant_type": "authorization_code",
        "client_id": client_id,
        "client_secret": client_secret,
        "code": code,
        "redirect_uri": "https://a.test/cb",
    });

    let response = app.post_json("/oauth/token", exchange.clone()).await;
    assert_eq!(response.status(), 200);

    let response = app.post_json("/oauth/token", exchange).await;
    assert_eq!(response.status(), 400);
    let error = body_json(response).await;
    assert_eq!(error["error"], "invalid_grant");
}

#[tokio::test]
async fn refresh_rotates_the_pair_and_burns_the_old_one() {
    let app = TestApp::spawn();
    let (registered, token) = app.issue_bearer(OWNER_ID).await;

    let refresh = json!({
        "grant_type": "refresh_token",
        "client_id": registered["client_id"],
        "client_secret": registered["client_secret"],
        "refresh_token": token["refresh_token"],
    });

    let response = app.post_json("/oauth/token", refresh.clone()).await;
    assert_eq!(response.status(), 200);
    let rotated = body_json(response).await;
    assert_ne!(rotated["access_token"], token["access_token"]);
    assert_ne!(rotated["refresh_token"], token["refresh_token"]);

    // The old refresh token is dead
    let response = app.post_json("/oauth/token", refresh).await;
    assert_eq!(response.status(), 400);
    let error = body_json(response).await;
    assert_eq!(error["error"], "invalid_grant");

    // And so is the old access token
    let response = app
        .post_json_with_bearer(
            "/open/text-trace",
            token["access_token"].as_str().unwrap(),
            json!({"text": "q"}),
        )
        .await;
    assert_eq!(response.status(), 401);

    // While the rotated one works
    let response = app
        .post_json_with_bearer(
            "/open/text-trace",
            rotated["access_token"].as_str().unwrap(),
            json!({"text": "q"}),
        )
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn wrong_client_secret_is_rejected() {
    let app = TestApp::spawn();
    let (registered, _) = app.issue_bearer(OWNER_ID).await;

    let response = app
        .post_json(
            "/oauth/token",
            json!({
                "grant_type": "refresh_token",
                "client_id": registered["client_id"],
                "client_secret": "not-the-secret",
                "refresh_token": "anything",
            }),
        )
        .await;
    assert_eq!(response.status(), 401);
    let error = body_json(response).await;
    assert_eq!(error["error"], "invalid_client_credentials");
}

#[tokio::test]
async fn unsupported_grant_type_is_rejected() {
    let app = TestApp::spawn();
    let (registered, _) = app.issue_bearer(OWNER_ID).await;

    let response = app
        .post_json(
            "/oauth/token",
            json!({
                "grant_type": "password",
                "client_id": registered["client_id"],
                "client_secret": registered["client_secret"],
            }),
        )
        .await;
    assert_eq!(response.status(), 400);
    let error = body_json(response).await;
    assert_eq!(error["error"], "unsupported_grant_type");
}

#[tokio::test]
async fn authorize_rejects_a_foreign_redirect() {
    let app = TestApp::spawn();
    app.seed_session(SESSION_ID, OWNER_ID).await;

    let response = app
        .post_json_with_session(
            "/oauth/applications",
            SESSION_ID,
            json!({"name": "reader", "redirect_uri": "https://a.test/cb"}),
        )
        .await;
    let created = body_json(response).await;

    let authorize_path = format!(
        "/oauth/authorize?response_type=code&client_id={}&redirect_uri=https%3A%2F%2Fevil.test%2Fcb",
        created["client_id"].as_str().unwrap()
    );
    let response = app.get_with_session(&authorize_path, SESSION_ID).await;
    assert_eq!(response.status(), 400);
    let error = body_json(response).await;
    assert_eq!(error["error"], "redirect_mismatch");
}

#[tokio::test]
async fn invalid_application_payload_fails_validation() {
    let app = TestApp::spawn();
    app.seed_session(SESSION_ID, OWNER_ID).await;

    let response = app
        .post_json_with_session(
            "/oauth/applications",
            SESSION_ID,
            json!({"name": "reader", "redirect_uri": "not-a-url"}),
        )
        .await;
    assert_eq!(response.status(), 422);
    let error = body_json(response).await;
    assert_eq!(error["error"], "validation_error");
}
