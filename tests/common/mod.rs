use std::env;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use diesel::connection::SimpleConnection;
use diesel::PgConnection;
use diesel_migrations::MigrationHarness;
use http_body_util::BodyExt;
use infolock::config::{AppConfig, DEFAULT_MAX_UPLOAD_BYTES};
use infolock::db::{self, PgPool, MIGRATIONS};
use infolock::models::{NewUser, User};
use infolock::repository::{InMemoryStore, PgStore, UserRepository};
use infolock::routes;
use infolock::state::AppState;
use once_cell::sync::Lazy;
use tokio::sync::Mutex;
use tower::util::ServiceExt;

const BOUNDARY: &str = "infolock-test-boundary";

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// One part of a multipart form body.
#[allow(dead_code)]
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        filename: &'a str,
        content_type: Option<&'a str>,
        data: &'a [u8],
    },
}

pub struct TestApp {
    router: Router,
    users: Arc<dyn UserRepository>,
    pool: Option<PgPool>,
}

fn test_config(database_url: String) -> AppConfig {
    AppConfig {
        database_url,
        database_max_pool_size: 2,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        cors_allowed_origin: None,
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
    }
}

fn unused_database_config() -> AppConfig {
    test_config("postgres://localhost/unused".to_string())
}

impl TestApp {
    #[allow(dead_code)]
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let state = AppState::new(unused_database_config(), store.clone(), store.clone());
        Self {
            router: routes::create_router(state),
            users: store,
            pool: None,
        }
    }

    /// In-memory documents with the given user store behind the admin routes.
    #[allow(dead_code)]
    pub fn with_user_repository(users: Arc<dyn UserRepository>) -> Self {
        let documents = Arc::new(InMemoryStore::new());
        let state = AppState::new(unused_database_config(), documents, users.clone());
        Self {
            router: routes::create_router(state),
            users,
            pool: None,
        }
    }

    /// Builds the app over a real database when `TEST_DATABASE_URL` is set.
    #[allow(dead_code)]
    pub async fn postgres() -> Result<Option<Self>> {
        let database_url = match env::var("TEST_DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("TEST_DATABASE_URL not set; skipping database test");
                return Ok(None);
            }
        };

        let config = test_config(database_url);
        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let store = Arc::new(PgStore::new(pool.clone()));
        let state = AppState::new(config, store.clone(), store.clone());
        Ok(Some(Self {
            router: routes::create_router(state),
            users: store,
            pool: Some(pool),
        }))
    }

    #[allow(dead_code)]
    pub async fn cleanup(&self) -> Result<()> {
        if let Some(pool) = &self.pool {
            let pool = pool.clone();
            tokio::task::spawn_blocking(move || -> Result<()> {
                let mut conn = pool
                    .get()
                    .map_err(|err| anyhow!("failed to get cleanup connection: {err}"))?;
                truncate_all(&mut conn)
            })
            .await
            .context("cleanup task panicked")??;
        }
        Ok(())
    }

    #[allow(dead_code)]
    pub async fn insert_user(&self, username: &str, email: &str) -> Result<User> {
        self.users
            .insert_user(NewUser {
                username: username.to_string(),
                email: email.to_string(),
            })
            .await
            .context("failed to insert user")
    }

    pub async fn send(&self, request: Request<Body>) -> Result<hyper::Response<Body>> {
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())?;
        self.send(request).await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri(path)
            .body(Body::empty())?;
        self.send(request).await
    }

    #[allow(dead_code)]
    pub async fn patch(&self, path: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::PATCH)
            .uri(path)
            .body(Body::empty())?;
        self.send(request).await
    }

    pub async fn multipart(
        &self,
        method: Method,
        path: &str,
        parts: &[Part<'_>],
    ) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))?;
        self.send(request).await
    }

    /// Uploads `data` the way the web client does: a file part plus
    /// `category` and `filename` text parts.
    #[allow(dead_code)]
    pub async fn upload(
        &self,
        original_name: &str,
        content_type: &str,
        data: &[u8],
        category: &str,
        filename: &str,
    ) -> Result<hyper::Response<Body>> {
        self.multipart(
            Method::POST,
            "/api/documents/upload",
            &[
                Part::File {
                    filename: original_name,
                    content_type: Some(content_type),
                    data,
                },
                Part::Text("category", category),
                Part::Text("filename", filename),
            ],
        )
        .await
    }
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend(value.as_bytes());
            }
            Part::File {
                filename,
                content_type,
                data,
            } => {
                body.extend(
                    format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n"
                    )
                    .as_bytes(),
                );
                if let Some(content_type) = content_type {
                    body.extend(format!("Content-Type: {content_type}\r\n").as_bytes());
                }
                body.extend(b"\r\n");
                body.extend(*data);
            }
        }
        body.extend(b"\r\n");
    }
    body.extend(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

#[allow(dead_code)]
pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

#[allow(dead_code)]
pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn body_json<T: serde::de::DeserializeOwned>(
    response: hyper::Response<Body>,
) -> Result<T> {
    let body = body_to_vec(response.into_body()).await?;
    serde_json::from_slice(&body).context("response body is not the expected JSON")
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute("TRUNCATE TABLE document_shares, documents, users RESTART IDENTITY CASCADE;")
        .context("failed to truncate tables")?;
    Ok(())
}
