mod common;

use common::{spawn_app, token_pair, ADMIN, CUSTOMER};
use serde_json::{json, Value};
use villa_auth::store::RefreshTokenStore;

// --- Login Tests ---

#[tokio::test]
async fn login_returns_200_and_token_pair() {
    let app = spawn_app();

    let response = app
        .post("/auth/login", &json!({"username": ADMIN.0, "password": ADMIN.1}))
        .await;
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 60);

    let access_token = body["access_token"].as_str().unwrap();
    let refresh_token = body["refresh_token"].as_str().unwrap();
    let parsed = app.encoder.parse(access_token).unwrap();
    let record = app.store.find_by_value(refresh_token).await.unwrap().unwrap();
    assert_eq!(parsed.session_id, record.session_id);
    assert_eq!(record.user_id, "admin-id");
}

#[tokio::test]
async fn login_returns_401_with_identical_body_for_bad_credentials() {
    let app = spawn_app();

    let wrong_password = app
        .post("/auth/login", &json!({"username": ADMIN.0, "password": "WrongPass123"}))
        .await;
    let unknown_user = app
        .post("/auth/login", &json!({"username": "nobody@villa.com", "password": ADMIN.1}))
        .await;

    assert_eq!(401, wrong_password.status().as_u16());
    assert_eq!(401, unknown_user.status().as_u16());

    let a: Value = wrong_password.json().await.unwrap();
    let b: Value = unknown_user.json().await.unwrap();
    assert_eq!(a["code"], b["code"]);
    assert_eq!(a["message"], b["message"]);
}

#[tokio::test]
async fn login_returns_400_for_missing_fields() {
    let app = spawn_app();

    let test_cases = vec![
        (json!({"username": ADMIN.0}), "missing password"),
        (json!({"password": ADMIN.1}), "missing username"),
        (json!({}), "missing all fields"),
    ];

    for (body, reason) in test_cases {
        let response = app.post("/auth/login", &body).await;
        assert_eq!(400, response.status().as_u16(), "Should reject request: {}", reason);
    }
}

// --- Refresh Tests ---

#[tokio::test]
async fn refresh_rotates_and_replay_kills_session() {
    let app = spawn_app();
    let (a1, r1) = app.login(ADMIN).await;

    let response = app.refresh(&a1, &r1).await;
    assert_eq!(200, response.status().as_u16());
    let (a2, r2) = token_pair(response).await;
    assert_ne!(r1, r2);
    assert_eq!(
        app.encoder.parse(&a1).unwrap().session_id,
        app.encoder.parse(&a2).unwrap().session_id
    );

    // Replay of the rotated pair
    assert_eq!(401, app.refresh(&a1, &r1).await.status().as_u16());
    // The cascade took the newest token with it
    assert_eq!(401, app.refresh(&a2, &r2).await.status().as_u16());
}

#[tokio::test]
async fn refresh_with_foreign_access_token_invalidates_only_that_record() {
    let app = spawn_app();
    let (_, admin_refresh) = app.login(ADMIN).await;
    let (guest_access, guest_refresh) = app.login(CUSTOMER).await;

    assert_eq!(401, app.refresh(&guest_access, &admin_refresh).await.status().as_u16());

    let admin_record = app.store.find_by_value(&admin_refresh).await.unwrap().unwrap();
    assert!(!admin_record.is_valid);
    assert_eq!(200, app.refresh(&guest_access, &guest_refresh).await.status().as_u16());
}

#[tokio::test]
async fn refresh_returns_401_for_unknown_token() {
    let app = spawn_app();
    let (access, _) = app.login(ADMIN).await;

    assert_eq!(401, app.refresh(&access, "does-not-exist").await.status().as_u16());
}

#[tokio::test]
async fn refresh_returns_400_for_missing_fields() {
    let app = spawn_app();

    let response = app.post("/auth/refresh", &json!({"refresh_token": "x"})).await;
    assert_eq!(400, response.status().as_u16());
}

// --- Revoke Tests ---

#[tokio::test]
async fn revoke_logs_out_session() {
    let app = spawn_app();
    let (access, refresh) = app.login(ADMIN).await;

    assert_eq!(204, app.revoke(&access, &refresh).await.status().as_u16());
    assert_eq!(401, app.refresh(&access, &refresh).await.status().as_u16());
}

#[tokio::test]
async fn revoke_with_rotated_pair_is_silent_noop() {
    let app = spawn_app();
    let (a1, r1) = app.login(ADMIN).await;
    let (a2, r2) = token_pair(app.refresh(&a1, &r1).await).await;

    assert_eq!(204, app.revoke(&a1, &r1).await.status().as_u16());
    assert_eq!(200, app.refresh(&a2, &r2).await.status().as_u16());
}

#[tokio::test]
async fn revoke_returns_204_for_garbage() {
    let app = spawn_app();

    assert_eq!(204, app.revoke("garbage", "unknown").await.status().as_u16());
}

// --- Protected Routes Tests ---

#[tokio::test]
async fn me_returns_session_identity() {
    let app = spawn_app();
    let (access, _) = app.login(ADMIN).await;

    let response = reqwest::Client::new()
        .get(&format!("{}/api/me", app.address))
        .bearer_auth(&access)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user_id"], "admin-id");
    assert_eq!(body["username"], ADMIN.0);
    assert_eq!(body["role"], "admin");
    assert_eq!(
        body["session_id"].as_str().unwrap(),
        app.encoder.parse(&access).unwrap().session_id.as_str()
    );
}

#[tokio::test]
async fn me_rejects_missing_and_invalid_tokens() {
    let app = spawn_app();
    let client = reqwest::Client::new();

    let missing = client
        .get(&format!("{}/api/me", app.address))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, missing.status().as_u16());

    let invalid = client
        .get(&format!("{}/api/me", app.address))
        .bearer_auth("not.a.token")
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, invalid.status().as_u16());
}

#[tokio::test]
async fn session_history_requires_admin_role() {
    let app = spawn_app();
    let (admin_access, _) = app.login(ADMIN).await;
    let (guest_access, guest_refresh) = app.login(CUSTOMER).await;
    app.refresh(&guest_access, &guest_refresh).await;
    let session_id = app.encoder.parse(&guest_access).unwrap().session_id;
    let url = format!("{}/api/admin/sessions/{}", app.address, session_id);
    let client = reqwest::Client::new();

    let forbidden = client
        .get(&url)
        .bearer_auth(&guest_access)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(403, forbidden.status().as_u16());

    let response = client
        .get(&url)
        .bearer_auth(&admin_access)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    let chain: Vec<Value> = response.json().await.unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0]["is_valid"], false);
    assert_eq!(chain[1]["is_valid"], true);
    assert!(chain.iter().all(|entry| entry.get("token").is_none()));
}
