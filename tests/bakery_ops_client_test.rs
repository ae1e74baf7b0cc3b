//! Bakery-ops client against a mock HTTP server

use bakesync::adapters::bakery_ops::{BakeryOpsClient, BakeryOpsGateway};
use bakesync::config::{secret_string, BakeryOpsConfig};
use bakesync::domain::{BakeryOpsError, SyncError};
use mockito::{Matcher, Server};
use serde_json::json;

fn bakery_config(base_url: &str) -> BakeryOpsConfig {
    BakeryOpsConfig {
        base_url: base_url.to_string(),
        outlet_id: "204".to_string(),
        token: secret_string("tok".to_string()),
        timeout_seconds: 5,
        tls_verify: true,
        default_rate_limit_wait_seconds: 0,
        max_rate_limit_retries: 2,
        default_vendor_id: "67597".to_string(),
        product_type_id: 11,
    }
}

fn client(server: &Server) -> BakeryOpsClient {
    BakeryOpsClient::new(bakery_config(&server.url())).unwrap()
}

#[tokio::test]
async fn test_fetch_actions_uses_access_token_and_filters() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/outlets/204/actions")
        .match_header("authorization", "Access-Token tok")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("actionTypes".into(), "ADDITION".into()),
            Matcher::UrlEncoded("startEffectiveAt".into(), "2025-03-01".into()),
        ]))
        .with_status(200)
        .with_body(json!([{"_id": "a1", "actionType": "ADDITION"}]).to_string())
        .create_async()
        .await;

    let actions = client(&server).fetch_actions("2025-03-01").await.unwrap();

    mock.assert_async().await;
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0]["_id"], "a1");
}

#[tokio::test]
async fn test_fetch_actions_rejects_non_list() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/outlets/204/actions")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"_id": "a1"}"#)
        .create_async()
        .await;

    let err = client(&server).fetch_actions("2025-03-01").await.unwrap_err();
    assert!(err.to_string().contains("Expected a list of items"));
}

#[tokio::test]
async fn test_rate_limit_is_retried_until_exhausted() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/outlets/204/ingredients")
        .match_query(Matcher::Any)
        .with_status(429)
        .with_body(r#"{"metadata": {"wait": 0}}"#)
        .expect(3)
        .create_async()
        .await;

    let err = client(&server).list_ingredients().await.unwrap_err();

    mock.assert_async().await;
    assert!(matches!(
        err,
        SyncError::BakeryOps(BakeryOpsError::RateLimited(2))
    ));
}

#[tokio::test]
async fn test_search_ingredients_sends_name() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/outlets/204/ingredients")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "B_FLOUR".into()),
            Matcher::UrlEncoded("size".into(), "200".into()),
        ]))
        .with_status(200)
        .with_body(json!([{"_id": "i1", "name": "B_FLOUR"}]).to_string())
        .create_async()
        .await;

    let found = client(&server).search_ingredients("B_FLOUR").await.unwrap();

    mock.assert_async().await;
    assert_eq!(found[0]["name"], "B_FLOUR");
}

#[tokio::test]
async fn test_empty_list_means_no_ingredients() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/outlets/204/ingredients")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let found = client(&server).search_ingredients("nothing").await.unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn test_get_missing_ingredient_is_none() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/outlets/204/ingredients/i404")
        .with_status(404)
        .with_body("not found")
        .create_async()
        .await;

    assert!(client(&server).get_ingredient("i404").await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_ingredient_bad_request_message() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/outlets/204/ingredients")
        .match_body(Matcher::PartialJson(json!({"name": "B_FLOUR"})))
        .with_status(400)
        .with_body(r#"{"msg": "Name already exists"}"#)
        .create_async()
        .await;

    let err = client(&server)
        .create_ingredient(&json!({"name": "B_FLOUR"}))
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert_eq!(
        err.to_string(),
        "Bakery-ops error: API Error (400): Name already exists"
    );
}

#[tokio::test]
async fn test_update_ingredient_uses_put() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PUT", "/outlets/204/ingredients/i1")
        .with_status(200)
        .with_body(r#"{"_id": "i1", "name": "B_FLOUR", "unit": "kg"}"#)
        .create_async()
        .await;

    let updated = client(&server)
        .update_ingredient("i1", &json!({"unit": "kg"}))
        .await
        .unwrap()
        .unwrap();

    mock.assert_async().await;
    assert_eq!(updated["unit"], "kg");
}

#[tokio::test]
async fn test_delete_ingredient_reports_raw_status() {
    let mut server = Server::new_async().await;
    server
        .mock("DELETE", "/outlets/204/ingredients/i1")
        .with_status(409)
        .with_body("ingredient in use")
        .create_async()
        .await;

    let outcome = client(&server).delete_ingredient("i1").await.unwrap();
    assert_eq!(outcome.status, 409);
    assert_eq!(outcome.body, "ingredient in use");
}

#[tokio::test]
async fn test_list_batches_asks_for_open_batches() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/outlets/204/ingredients/77/batches")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("archived".into(), "false".into()),
            Matcher::UrlEncoded("depleted".into(), "false".into()),
            Matcher::UrlEncoded("includeNotes".into(), "true".into()),
            Matcher::UrlEncoded("size".into(), "9999".into()),
        ]))
        .with_status(200)
        .with_body(json!([{"_id": 31, "batchNumber": "B_FLOUR_LOT9"}]).to_string())
        .create_async()
        .await;

    let batches = client(&server).list_batches("77").await.unwrap();

    mock.assert_async().await;
    assert_eq!(batches[0]["batchNumber"], "B_FLOUR_LOT9");
}

#[tokio::test]
async fn test_create_batch_posts_payload() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/outlets/204/ingredients/77/batches")
        .match_body(Matcher::PartialJson(json!({"batchNumber": "B_FLOUR_LOT9"})))
        .with_status(201)
        .with_body(json!([{"_id": 31, "batchNumber": "B_FLOUR_LOT9"}]).to_string())
        .create_async()
        .await;

    let created = client(&server)
        .create_batch("77", &json!({"batchNumber": "B_FLOUR_LOT9"}))
        .await
        .unwrap()
        .unwrap();

    mock.assert_async().await;
    assert_eq!(created[0]["_id"], 31);
}

#[tokio::test]
async fn test_list_batch_actions_path() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/outlets/204/ingredients/77/batches/31/actions")
        .with_status(200)
        .with_body(json!([{"notes": [{"text": "JDE_Transaction_Id: 5551"}]}]).to_string())
        .create_async()
        .await;

    let actions = client(&server).list_batch_actions("77", "31").await.unwrap();

    mock.assert_async().await;
    assert_eq!(actions.len(), 1);
}

#[tokio::test]
async fn test_post_action_rate_limit_then_success() {
    let mut server = Server::new_async().await;
    let limited = server
        .mock("POST", "/outlets/204/actions")
        .with_status(429)
        .with_body(r#"{"metadata": {"wait": 0}}"#)
        .expect(1)
        .create_async()
        .await;
    let accepted = server
        .mock("POST", "/outlets/204/actions")
        .match_body(Matcher::PartialJson(json!({"actionType": "RECEIVE_DRY_GOOD"})))
        .with_status(201)
        .with_body(r#"{"_id": "receipt-9"}"#)
        .create_async()
        .await;

    let posted = client(&server)
        .post_action(&json!({"actionType": "RECEIVE_DRY_GOOD"}))
        .await
        .unwrap()
        .unwrap();

    limited.assert_async().await;
    accepted.assert_async().await;
    assert_eq!(posted["_id"], "receipt-9");
}
