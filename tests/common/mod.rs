#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use storefront::jwt::JwtConfig;
use storefront::{build_router, AppState};

/// Router over a fresh, migrated SQLite file. Keep the `TempDir` alive for
/// the duration of the test.
pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    _dir: TempDir,
}

pub async fn spawn() -> Result<TestApp> {
    let dir = tempfile::tempdir().context("failed to create tempdir")?;
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    let state = AppState::new(pool.clone(), JwtConfig::new("test-secret", 24));
    Ok(TestApp {
        app: build_router(state),
        pool,
        _dir: dir,
    })
}

impl TestApp {
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        Ok((status, value))
    }

    /// Registers a customer and returns `(token, user_id)`
    pub async fn register(&self, email: &str) -> Result<(String, i64)> {
        let (status, body) = self
            .request(
                "POST",
                "/auth/register",
                None,
                Some(json!({
                    "email": email,
                    "password": "password123",
                    "first_name": "Test",
                    "last_name": "User"
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

        let token = body["token"].as_str().context("missing token")?.to_string();
        let id = body["user"]["id"].as_i64().context("missing user id")?;
        Ok((token, id))
    }

    /// Registers a user and sets its role directly in the store. Tokens only
    /// carry the id, so the returned token already acts with the new role.
    pub async fn register_as(&self, email: &str, role: &str) -> Result<(String, i64)> {
        let (token, id) = self.register(email).await?;
        sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok((token, id))
    }

    pub async fn create_product(&self, token: &str, name: &str, price: f64) -> Result<i64> {
        let (status, body) = self
            .request(
                "POST",
                "/products",
                Some(token),
                Some(json!({ "name": name, "price": price, "stock_quantity": 10 })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "product create failed: {}", body);
        body["id"].as_i64().context("missing product id")
    }

    pub async fn create_category(&self, token: &str, name: &str) -> Result<i64> {
        let (status, body) = self
            .request("POST", "/categories", Some(token), Some(json!({ "name": name })))
            .await?;
        assert_eq!(status, StatusCode::CREATED, "category create failed: {}", body);
        body["id"].as_i64().context("missing category id")
    }

    pub async fn create_cart(&self, token: &str, product_id: i64, quantity: i64) -> Result<Value> {
        let (status, body) = self
            .request(
                "POST",
                "/cart",
                Some(token),
                Some(json!({ "items": [{ "product_id": product_id, "quantity": quantity }] })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "cart create failed: {}", body);
        Ok(body)
    }

    pub async fn create_review(&self, token: &str, product_id: i64, rating: i64) -> Result<i64> {
        let (status, body) = self
            .request(
                "POST",
                "/reviews",
                Some(token),
                Some(json!({ "product_id": product_id, "rating": rating, "comment": "fine" })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "review create failed: {}", body);
        body["id"].as_i64().context("missing review id")
    }

    pub async fn create_order(&self, token: &str, product_id: i64, quantity: i64) -> Result<Value> {
        let (status, body) = self
            .request(
                "POST",
                "/orders",
                Some(token),
                Some(json!({
                    "items": [{ "product_id": product_id, "quantity": quantity }],
                    "shipping_address": address(),
                    "shipping": 5.0
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "order create failed: {}", body);
        Ok(body)
    }
}

pub fn address() -> Value {
    json!({
        "first_name": "Test",
        "last_name": "User",
        "street": "1 Main St",
        "city": "Springfield",
        "state": "IL",
        "zip_code": "62701",
        "country": "US"
    })
}
