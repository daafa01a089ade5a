mod common;

use common::{body_json, TestApp, TestAppBuilder, OWNER_ID};
use serde_json::json;
use trace_service::models::Corpus;

fn owned_corpus() -> Corpus {
    Corpus {
        id: 1,
        name: "notes".to_string(),
        owner_id: OWNER_ID,
        index_name: Some("idx-notes".to_string()),
        collection_name: Some("col-notes".to_string()),
    }
}

#[tokio::test]
async fn trace_requires_a_bearer_token() {
    let app = TestApp::spawn();

    let response = app.post_json("/open/text-trace", json!({"text": "q"})).await;
    assert_eq!(response.status(), 401);
    let error = body_json(response).await;
    assert_eq!(error["error"], "unauthorized");

    let response = app
        .post_json_with_bearer("/open/text-trace", "not-a-real-token", json!({"text": "q"}))
        .await;
    assert_eq!(response.status(), 401);
    let error = body_json(response).await;
    assert_eq!(error["error"], "invalid_token");
}

#[tokio::test]
async fn exact_mode_normalizes_against_the_best_hit() {
    let mut builder = TestAppBuilder::new().with_corpus(owned_corpus());
    builder.lexical.add_hit("idx-notes", "10", "a.txt", 12.0, "top");
    builder.lexical.add_hit("idx-notes", "11", "b.txt", 6.0, "middle");
    builder.lexical.add_hit("idx-notes", "12", "c.txt", 3.0, "bottom");
    let app = builder.build();
    let (_, token) = app.issue_bearer(OWNER_ID).await;

    let response = app
        .post_json_with_bearer(
            "/open/text-trace",
            token["access_token"].as_str().unwrap(),
            json!({"text": "q", "match_mode": "exact", "threshold": 0.5}),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = body_json(response).await;

    assert_eq!(body["total"], 2);
    let matches = body["matches"].as_array().unwrap();
    let scores: Vec<f64> = matches.iter().map(|m| m["score"].as_f64().unwrap()).collect();
    assert_eq!(scores, vec![1.0, 0.5]);
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    assert!(scores.iter().all(|s| (0.5..=1.0).contains(s)));
}

#[tokio::test]
async fn hybrid_mode_dedups_and_respects_top_k() {
    let mut builder = TestAppBuilder::new().with_corpus(owned_corpus());
    builder.lexical.add_hit("idx-notes", "10", "a.txt", 9.0, "shared passage");
    builder.vector.add_hit("col-notes", "10", "a.txt", 0.1, "shared passage");
    builder.vector.add_hit("col-notes", "11", "b.txt", 0.2, "different passage");
    builder.vector.add_hit("col-notes", "12", "c.txt", 0.3, "third passage");
    let app = builder.build();
    let (_, token) = app.issue_bearer(OWNER_ID).await;

    let response = app
        .post_json_with_bearer(
            "/open/text-trace",
            token["access_token"].as_str().unwrap(),
            json!({"text": "q", "match_mode": "hybrid", "top_k": 2, "threshold": 0.0}),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = body_json(response).await;

    let matches = body["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 2);
    // The duplicated (document, excerpt) pair appears only once.
    assert_eq!(matches[0]["excerpt"], "shared passage");
    assert_eq!(matches[1]["excerpt"], "different passage");
}

#[tokio::test]
async fn semantic_mode_converts_distances() {
    let mut builder = TestAppBuilder::new().with_corpus(owned_corpus());
    builder.vector.add_hit("col-notes", "10", "a.txt", 0.0, "perfect");
    builder.vector.add_hit("col-notes", "11", "b.txt", 1.0, "half");
    let app = builder.build();
    let (_, token) = app.issue_bearer(OWNER_ID).await;

    let response = app
        .post_json_with_bearer(
            "/open/text-trace",
            token["access_token"].as_str().unwrap(),
            json!({"text": "q", "match_mode": "semantic", "threshold": 0.0}),
        )
        .await;
    let body = body_json(response).await;

    let matches = body["matches"].as_array().unwrap();
    assert_eq!(matches[0]["score"], 1.0);
    assert_eq!(matches[1]["score"], 0.5);
}

#[tokio::test]
async fn matches_with_numeric_ids_carry_preview_urls() {
    let mut builder = TestAppBuilder::new().with_corpus(owned_corpus());
    builder.lexical.add_hit("idx-notes", "42", "a.txt", 5.0, "a passage");
    builder.lexical.add_hit("idx-notes", "chunk-9", "b.txt", 5.0, "synthetic id");
    let app = builder.build();
    let (_, token) = app.issue_bearer(OWNER_ID).await;

    let response = app
        .post_json_with_bearer(
            "/open/text-trace",
            token["access_token"].as_str().unwrap(),
            json!({"text": "q", "match_mode": "exact", "threshold": 0.0}),
        )
        .await;
    let body = body_json(response).await;

    let matches = body["matches"].as_array().unwrap();
    let with_url = matches
        .iter()
        .find(|m| m["document_id"] == "42")
        .unwrap();
    assert!(with_url["preview_url"]
        .as_str()
        .unwrap()
        .starts_with("/open/document/preview/42?token="));

    let without_url = matches
        .iter()
        .find(|m| m["document_id"] == "chunk-9")
        .unwrap();
    assert!(without_url.get("preview_url").is_none());
}

#[tokio::test]
async fn corpus_visibility_bounds_the_search() {
    let mut builder = TestAppBuilder::new().with_corpus(Corpus {
        id: 2,
        name: "foreign".to_string(),
        owner_id: 999,
        index_name: Some("idx-foreign".to_string()),
        collection_name: None,
    });
    builder.lexical.add_hit("idx-foreign", "50", "secret.txt", 9.0, "hidden");
    let app = builder.build();
    let (_, token) = app.issue_bearer(OWNER_ID).await;

    let response = app
        .post_json_with_bearer(
            "/open/text-trace",
            token["access_token"].as_str().unwrap(),
            json!({"text": "q", "threshold": 0.0}),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = body_json(response).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn invalid_request_bodies_are_rejected() {
    let app = TestApp::spawn();
    let (_, token) = app.issue_bearer(OWNER_ID).await;
    let token = token["access_token"].as_str().unwrap();

    let response = app
        .post_json_with_bearer("/open/text-trace", token, json!({"text": "q", "top_k": 0}))
        .await;
    assert_eq!(response.status(), 422);

    let response = app
        .post_json_with_bearer(
            "/open/text-trace",
            token,
            json!({"text": "q", "match_mode": "fuzzy"}),
        )
        .await;
    // Unknown variants never reach the engine; the deserializer stops them.
    assert_eq!(response.status(), 422);
}
