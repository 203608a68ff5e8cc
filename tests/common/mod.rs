#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use diesel::prelude::*;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use aris::auth::jwt::JwtService;
use aris::config::AppConfig;
use aris::db::{init_pool, PgPool};
use aris::render::BasicRenderer;
use aris::routes::create_router;
use aris::services::copilot::MockProvider;
use aris::services::email::LogMailer;
use aris::state::AppState;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

// Integration tests share one database; serialize them.
static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub struct TestApp {
    pub router: Router,
    pub pool: PgPool,
    _guard: MutexGuard<'static, ()>,
}

/// Builds a fully wired app against TEST_DATABASE_URL, or None when the
/// variable is unset so the suite can run without a database.
pub fn setup() -> Option<TestApp> {
    let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping integration test");
        return None;
    };

    let guard = DB_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let pool = init_pool(&database_url, 2).expect("test database pool");
    {
        let mut conn = pool.get().expect("test database connection");
        conn.run_pending_migrations(MIGRATIONS)
            .expect("test migrations");
        truncate_all(&mut conn);
    }

    let config = test_config(database_url);
    let jwt = JwtService::from_config(&config).expect("jwt service");
    let state = AppState::new(
        pool.clone(),
        config,
        jwt,
        Arc::new(BasicRenderer),
        Arc::new(LogMailer),
        Arc::new(MockProvider),
    );

    Some(TestApp {
        router: create_router(state),
        pool,
        _guard: guard,
    })
}

fn test_config(database_url: String) -> AppConfig {
    AppConfig {
        database_url,
        database_max_pool_size: 2,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        jwt_secret: "test-secret-do-not-use-in-production".to_string(),
        jwt_issuer: "aris".to_string(),
        jwt_audience: "aris-clients".to_string(),
        jwt_expiry_minutes: 60,
        cors_allowed_origin: None,
        base_url: "https://aris.test".to_string(),
        rsm_renderer_endpoint: None,
        resend_api_key: None,
        email_from: "Aris <noreply@aris.test>".to_string(),
        copilot_provider: "mock".to_string(),
        openai_api_key: None,
        openai_model: "gpt-4o-mini".to_string(),
        anthropic_api_key: None,
        anthropic_model: "claude-3-5-haiku-latest".to_string(),
    }
}

fn truncate_all(conn: &mut PgConnection) {
    diesel::sql_query(
        "TRUNCATE TABLE annotation_messages, annotations, file_tags, file_assets, \
         file_settings, user_settings, signups, files, tags, users CASCADE",
    )
    .execute(conn)
    .expect("truncate tables");
}

impl TestApp {
    pub async fn request_raw(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("response body")
            .to_bytes()
            .to_vec();
        (status, bytes)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, bytes) = self.request_raw(method, uri, token, body).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Registers a user and returns a bearer token for them.
    pub async fn register_and_login(&self, email: &str, name: &str) -> String {
        let (status, _) = self
            .request(
                Method::POST,
                "/register",
                None,
                Some(json!({
                    "email": email,
                    "password": "correct horse battery",
                    "name": name,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register {email}");

        let (status, body) = self
            .request(
                Method::POST,
                "/login",
                None,
                Some(json!({
                    "email": email,
                    "password": "correct horse battery",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login {email}");
        body["access_token"]
            .as_str()
            .expect("access token")
            .to_string()
    }

    /// Creates a draft file and returns its id.
    pub async fn create_file(&self, token: &str, title: &str, source: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/files",
                Some(token),
                Some(json!({ "title": title, "source": source })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create file {title}");
        body["id"].as_str().expect("file id").to_string()
    }
}
