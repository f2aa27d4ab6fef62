#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::Arc;

use chrono::Duration;
use serde_json::{json, Value};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use villa_auth::auth::{ClaimsEncoder, TokenLifecycleManager};
use villa_auth::configuration::{get_configuration, DatabaseSettings};
use villa_auth::identity::InMemoryIdentityProvider;
use villa_auth::startup::run;
use villa_auth::store::InMemoryRefreshTokenStore;

pub const SECRET: &str = "integration-secret-key-at-least-32-chars";
pub const ADMIN: (&str, &str) = ("admin@villa.com", "AdminPass123");
pub const CUSTOMER: (&str, &str) = ("guest@villa.com", "GuestPass123");

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryRefreshTokenStore>,
    pub encoder: ClaimsEncoder,
}

pub fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let store = Arc::new(InMemoryRefreshTokenStore::new());
    let identity = InMemoryIdentityProvider::new()
        .with_bcrypt_cost(4)
        .with_user("admin-id", ADMIN.0, ADMIN.1, ["admin"])
        .expect("Failed to seed admin")
        .with_user("guest-id", CUSTOMER.0, CUSTOMER.1, ["customer"])
        .expect("Failed to seed customer");
    let encoder = ClaimsEncoder::new(SECRET, "integration");

    let manager = TokenLifecycleManager::new(
        encoder.clone(),
        store.clone(),
        Arc::new(identity),
        Duration::minutes(1),
        Duration::minutes(15),
    );

    let server = run(listener, manager).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        store,
        encoder,
    }
}

impl TestApp {
    pub async fn post(&self, path: &str, body: &Value) -> reqwest::Response {
        reqwest::Client::new()
            .post(&format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Log in and return `(access_token, refresh_token)`.
    pub async fn login(&self, (username, password): (&str, &str)) -> (String, String) {
        let response = self
            .post("/auth/login", &json!({"username": username, "password": password}))
            .await;
        assert_eq!(200, response.status().as_u16());
        token_pair(response).await
    }

    pub async fn refresh(&self, access_token: &str, refresh_token: &str) -> reqwest::Response {
        self.post(
            "/auth/refresh",
            &json!({"access_token": access_token, "refresh_token": refresh_token}),
        )
        .await
    }

    pub async fn revoke(&self, access_token: &str, refresh_token: &str) -> reqwest::Response {
        self.post(
            "/auth/revoke",
            &json!({"access_token": access_token, "refresh_token": refresh_token}),
        )
        .await
    }
}

pub async fn token_pair(response: reqwest::Response) -> (String, String) {
    let body: Value = response.json().await.expect("Failed to parse response");
    (
        body["access_token"].as_str().expect("access_token").to_string(),
        body["refresh_token"].as_str().expect("refresh_token").to_string(),
    )
}

/// Fresh, migrated database named after a random UUID.
pub async fn spawn_database() -> PgPool {
    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = uuid::Uuid::new_v4().to_string();
    configure_database(&configuration.database).await
}

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    // Create database
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");
    // Migrate database
    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}
