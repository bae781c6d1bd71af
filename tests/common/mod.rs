#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use chrono::Utc;
use montaz_api::{
    auth::hash_password,
    config::AppConfig,
    db,
    entities::{company, company_store, store, user},
    events::{self, EventSender},
    AppState,
};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const PASSWORD: &str = "Montaz2025x";

pub const SALON_CENTRUM: i32 = 1;
pub const SALON_POLNOC: i32 = 2;
pub const KOWALSKI_MONTAZE: i32 = 1;
pub const FLOORPRO: i32 = 2;

pub const ADMIN: i32 = 1;
pub const WORKER: i32 = 2;
pub const COMPANY_OWNER: i32 = 3;
/// Door and flooring, company 1.
pub const INSTALLER_DOORS: i32 = 7;
/// Door and transport, company 1.
pub const INSTALLER_TRANSPORT: i32 = 9;
/// Flooring and transport, company 2.
pub const INSTALLER_FLOORPRO: i32 = 11;

/// Application backed by a throwaway SQLite file with a seeded directory:
/// two stores, two companies (only the first serves Salon Centrum), an
/// admin, a store worker, a company owner and three installers.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _dir: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Same as [`TestApp::new`] with a chance to tweak the configuration.
    pub async fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("montaz_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.cors_allow_any_origin = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.upload_dir = dir.path().join("uploads").display().to_string();
        cfg.app_build = Some("test-build".to_string());
        tweak(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");
        seed(&pool).await;

        let (tx, rx) = mpsc::channel(128);
        let event_task = tokio::spawn(events::process_events(rx));
        let event_sender = Arc::new(EventSender::new(tx));

        let state = AppState::new(Arc::new(pool), cfg, event_sender);
        let router = montaz_api::build_router(state.clone());

        Self {
            router,
            state,
            _dir: dir,
            _event_task: event_task,
        }
    }

    pub async fn token_for(&self, user_id: i32) -> String {
        let model = user::Entity::find_by_id(user_id)
            .one(&*self.state.db)
            .await
            .expect("query user")
            .expect("seeded user");
        self.state
            .auth
            .generate_token(&model)
            .expect("token")
            .access_token
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        self.oneshot(request).await
    }

    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    /// Sends a request and decodes the JSON body (`Null` when empty).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let response = self.request(method, uri, body, token).await;
        let status = response.status();
        (status, json_body(response).await)
    }

    /// Multipart upload of `(file name, bytes)` pairs under the `photos` field.
    pub async fn upload(
        &self,
        uri: &str,
        files: &[(&str, &[u8])],
        token: &str,
    ) -> (StatusCode, Value) {
        let boundary = "montaz-test-boundary";
        let mut body = Vec::new();
        for (name, data) in files {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"photos\"; filename=\"{}\"\r\n",
                    name
                )
                .as_bytes(),
            );
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .expect("request");

        let response = self.oneshot(request).await;
        let status = response.status();
        (status, json_body(response).await)
    }

    /// Creates an order as the admin and returns its `data` object.
    pub async fn create_order(&self, payload: Value) -> Value {
        let token = self.token_for(ADMIN).await;
        let (status, body) = self
            .send(Method::POST, "/api/v1/orders", Some(payload), Some(&token))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create order failed: {}", body);
        body["data"].clone()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    }
}

async fn seed(pool: &db::DbPool) {
    let now = Utc::now();

    for (id, name) in [(SALON_CENTRUM, "Salon Centrum"), (SALON_POLNOC, "Salon Północ")] {
        store::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            address: Set(Some("ul. Długa 1, Gdańsk".to_string())),
            phone: Set(None),
            email: Set(None),
            status: Set("active".to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(pool)
        .await
        .expect("seed store");
    }

    for (id, name) in [(KOWALSKI_MONTAZE, "Montaże Kowalski"), (FLOORPRO, "FloorPro")] {
        company::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            nip: Set(None),
            address: Set(None),
            phone: Set(None),
            email: Set(None),
            status: Set("active".to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(pool)
        .await
        .expect("seed company");
    }

    company_store::ActiveModel {
        company_id: Set(KOWALSKI_MONTAZE),
        store_id: Set(SALON_CENTRUM),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(pool)
    .await
    .expect("seed company store");

    let password_hash = hash_password(PASSWORD).expect("hash");
    let users = [
        (ADMIN, "Anna Admin", "admin@montaz.test", "admin", None, None, None),
        (WORKER, "Ewa Sprzedawca", "ewa@montaz.test", "worker", Some(SALON_CENTRUM), None, None),
        (
            COMPANY_OWNER,
            "Marek Kowalski",
            "marek@kowalski.test",
            "company",
            None,
            Some(KOWALSKI_MONTAZE),
            Some("door_installation,flooring_installation,transport"),
        ),
        (
            INSTALLER_DOORS,
            "Jan Nowak",
            "jan@kowalski.test",
            "installer",
            None,
            Some(KOWALSKI_MONTAZE),
            Some("door_installation,flooring_installation"),
        ),
        (
            INSTALLER_TRANSPORT,
            "Piotr Wiśniewski",
            "piotr@kowalski.test",
            "installer",
            None,
            Some(KOWALSKI_MONTAZE),
            Some("door_installation,transport"),
        ),
        (
            INSTALLER_FLOORPRO,
            "Adam Zieliński",
            "adam@floorpro.test",
            "installer",
            None,
            Some(FLOORPRO),
            Some("flooring_installation,transport"),
        ),
    ];

    for (id, name, email, role, store_id, company_id, services) in users {
        user::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            email: Set(email.to_string()),
            phone: Set(None),
            password_hash: Set(password_hash.clone()),
            role: Set(role.to_string()),
            is_active: Set(true),
            store_id: Set(store_id),
            position: Set(None),
            company_id: Set(company_id),
            company_name: Set(None),
            nip: Set(None),
            company_address: Set(None),
            services: Set(services.map(str::to_string)),
            company_owner_only: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(pool)
        .await
        .expect("seed user");
    }
}
