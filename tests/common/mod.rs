#![allow(dead_code)]

use std::env;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use chrono::NaiveDateTime;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use http_body_util::BodyExt;
use marketplace_api::config::AppConfig;
use marketplace_api::db::{self, PgPool};
use marketplace_api::models::{Framework, Lot, NewSupplier, NewUser};
use marketplace_api::notify::LoggingNotifier;
use marketplace_api::routes;
use marketplace_api::state::AppState;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub const FRAMEWORK_SLUG: &str = "digital-marketplace";
pub const LOT_SLUG: &str = "digital-professionals";

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    /// Returns `None` (after printing a notice) when no test database is
    /// configured, so the suite can run without Postgres.
    pub async fn new() -> Result<Option<Self>> {
        let Ok(database_url) = env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set; skipping integration test");
            return Ok(None);
        };

        let config = AppConfig {
            database_url,
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            base_url: "http://localhost".to_string(),
            page_size: 5,
            worker_poll_seconds: 300,
            cors_allowed_origin: None,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let state = AppState::new(pool, config, Arc::new(LoggingNotifier));
        let router = routes::create_router(state.clone());

        Ok(Some(Self { state, router }))
    }

    pub async fn insert_user(&self, email: &str, role: &str) -> Result<Uuid> {
        self.insert_user_for_application(email, role, None).await
    }

    pub async fn insert_user_for_application(
        &self,
        email: &str,
        role: &str,
        application_id: Option<Uuid>,
    ) -> Result<Uuid> {
        let email = email.to_string();
        let role = role.to_string();
        self.with_conn(move |conn| {
            let user = NewUser {
                id: Uuid::new_v4(),
                email_address: email,
                name: "Test User".to_string(),
                role,
                supplier_id: None,
                application_id,
            };
            diesel::insert_into(marketplace_api::schema::users::table)
                .values(&user)
                .execute(conn)
                .context("failed to insert user")?;
            Ok(user.id)
        })
        .await
    }

    pub async fn insert_supplier(&self, name: &str) -> Result<Uuid> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let supplier = NewSupplier {
                id: Uuid::new_v4(),
                name,
                status: "limited".to_string(),
                data: serde_json::json!({}),
            };
            diesel::insert_into(marketplace_api::schema::suppliers::table)
                .values(&supplier)
                .execute(conn)
                .context("failed to insert supplier")?;
            Ok(supplier.id)
        })
        .await
    }

    pub async fn seeded_framework(&self) -> Result<(Framework, Lot)> {
        self.with_conn(|conn| {
            use marketplace_api::schema::{frameworks, lots};
            let framework: Framework = frameworks::table
                .filter(frameworks::slug.eq(FRAMEWORK_SLUG))
                .first(conn)
                .context("seeded framework missing")?;
            let lot: Lot = lots::table
                .filter(lots::framework_id.eq(framework.id))
                .filter(lots::slug.eq(LOT_SLUG))
                .first(conn)
                .context("seeded lot missing")?;
            Ok((framework, lot))
        })
        .await
    }

    /// Rewrites a brief's publish instant directly, for setting up closed
    /// briefs without waiting two weeks.
    pub async fn set_brief_published_at(
        &self,
        brief_id: Uuid,
        published_at: NaiveDateTime,
    ) -> Result<()> {
        self.with_conn(move |conn| {
            use marketplace_api::schema::briefs;
            diesel::update(briefs::table.find(brief_id))
                .set(briefs::published_at.eq(Some(published_at)))
                .execute(conn)
                .context("failed to set published_at")?;
            Ok(())
        })
        .await
    }

    /// Forces an application into a lifecycle state, for tests that start
    /// mid-graph.
    pub async fn set_application_status(&self, application_id: Uuid, status: &str) -> Result<()> {
        let status = status.to_string();
        self.with_conn(move |conn| {
            use marketplace_api::schema::applications;
            diesel::update(applications::table.find(application_id))
                .set(applications::status.eq(status))
                .execute(conn)
                .context("failed to set application status")?;
            Ok(())
        })
        .await
    }

    /// The complete trail for one subject, straight from the store (the
    /// HTTP listing is paginated; tests asserting on counts want all rows).
    pub async fn audit_events_for(&self, object_type: &str, object_id: Uuid) -> Result<Vec<Value>> {
        let object_type = object_type.to_string();
        self.with_conn(move |conn| {
            let events = marketplace_api::audit::for_object(conn, &object_type, object_id)
                .context("failed to load audit events")?;
            Ok(events
                .into_iter()
                .map(|event| {
                    serde_json::json!({
                        "id": event.id,
                        "type": event.audit_type,
                        "user": event.actor,
                        "data": event.data,
                        "objectType": event.object_type,
                        "objectId": event.object_id,
                    })
                })
                .collect())
        })
        .await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        self.request(Method::POST, path, Some(payload)).await
    }

    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        self.request(Method::PUT, path, Some(payload)).await
    }

    pub async fn delete_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        self.request(Method::DELETE, path, Some(payload)).await
    }

    pub async fn get(&self, path: &str) -> Result<hyper::Response<Body>> {
        self.request::<()>(Method::GET, path, None).await
    }

    async fn request<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: Option<&T>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        let body = match payload {
            Some(payload) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(payload)?)
            }
            None => Body::empty(),
        };
        let request = builder.body(body)?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn read_json(response: hyper::Response<Body>) -> Result<Value> {
    let collected = response
        .into_body()
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(serde_json::from_slice(&collected.to_bytes())?)
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

// Frameworks and lots are seeded by the migration and deliberately survive.
fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE audit_events, work_orders, brief_responses, \
         brief_clarification_questions, brief_users, briefs, users, \
         applications, suppliers RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
