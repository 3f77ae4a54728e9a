//! API integration tests against a running server

use custody_server::models::user::{Role, UserClaims};
use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

/// Mint a bearer token signed with the server's secret
fn token_for(user_id: i32, role: Role) -> String {
    let secret = std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| "change-this-secret-in-production".to_string());
    let now = chrono::Utc::now().timestamp();
    UserClaims {
        sub: format!("user-{}", user_id),
        user_id,
        role,
        exp: now + 3600,
        iat: now,
    }
    .create_token(&secret)
    .expect("Failed to sign token")
}

async fn create_asset(client: &Client, token: &str, asset_type: &str) -> i64 {
    let response = client
        .post(format!("{}/assets", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "asset_tag": format!("API-{}", uuid::Uuid::new_v4()),
            "name": "API test asset",
            "asset_type": asset_type
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse response");
    body["id"].as_i64().expect("No asset ID")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_readiness_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
#[ignore]
async fn test_unauthorized_access() {
    let client = Client::new();

    let response = client
        .get(format!("{}/assignments", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 401);

    let response = client
        .get(format!("{}/assignments", BASE_URL))
        .bearer_auth("not-a-token")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_list_assignments() {
    let client = Client::new();
    let token = token_for(1, Role::Admin);

    let response = client
        .get(format!("{}/assignments?open_only=true&per_page=10", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["assignments"].is_array());
    assert!(body["total"].is_number());
    assert_eq!(body["per_page"], 10);
}

#[tokio::test]
#[ignore]
async fn test_missing_assignment() {
    let client = Client::new();
    let token = token_for(1, Role::Admin);

    let response = client
        .get(format!("{}/assignments/{}", BASE_URL, i32::MAX))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "NotFound");
}

#[tokio::test]
#[ignore]
async fn test_staff_cannot_assign() {
    let client = Client::new();
    let admin = token_for(1, Role::Admin);
    let staff = token_for(2, Role::Staff);
    let asset_id = create_asset(&client, &admin, "PRINTER").await;

    let response = client
        .post(format!("{}/assignments", BASE_URL))
        .bearer_auth(&staff)
        .json(&json!({
            "asset_id": asset_id,
            "target": { "target_type": "LOCATION", "location": "Floor 1" }
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 403);

    let _ = client
        .delete(format!("{}/assets/{}", BASE_URL, asset_id))
        .bearer_auth(&admin)
        .send()
        .await;
}

#[tokio::test]
#[ignore]
async fn test_location_assignment_and_revert() {
    let client = Client::new();
    let token = token_for(1, Role::Admin);
    let asset_id = create_asset(&client, &token, "PRINTER").await;

    // Assign to a location
    let response = client
        .post(format!("{}/assignments", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({
            "asset_id": asset_id,
            "target": { "target_type": "LOCATION", "location": "Floor 2" },
            "issue_condition": { "toner": "full" }
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["assignment"]["status"], "ACTIVE");
    assert_eq!(body["assignment"]["target_type"], "LOCATION");
    let assignment_id = body["assignment"]["id"].as_i64().expect("No assignment ID");

    // A second assignment of the same asset conflicts
    let response = client
        .post(format!("{}/assignments", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({
            "asset_id": asset_id,
            "target": { "target_type": "DEPARTMENT", "department": "Finance" }
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);

    // Revert frees the asset
    let response = client
        .post(format!("{}/assignments/{}/revert", BASE_URL, assignment_id))
        .bearer_auth(&token)
        .json(&json!({ "reason": "Moved" }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let response = client
        .get(format!("{}/assets/{}", BASE_URL, asset_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "IN_STOCK");

    // Reverting twice is an invalid transition
    let response = client
        .post(format!("{}/assignments/{}/revert", BASE_URL, assignment_id))
        .bearer_auth(&token)
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 422);

    // Cleanup
    let response = client
        .delete(format!("{}/assets/{}", BASE_URL, asset_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 204);
}
