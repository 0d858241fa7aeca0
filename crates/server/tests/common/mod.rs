//! Common test utilities for API testing.
//!
//! This module provides a test fixture that builds the full router in
//! process, backed by a temporary SQLite database and a mock thread API.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use ticketdesk_core::{
    config::{DatabaseConfig, LocaleConfig, ServerConfig, StaffConfig},
    create_audit_system,
    testing::{MockThreadApi, TEST_STAFF_CHAT},
    AuditStore, CommandRouter, Config, LifecycleEngine, SqliteAuditStore, SqliteTicketStore,
    ThreadApi, ThreadSynchronizer, TicketIndex, TicketStore,
};
use ticketdesk_server::state::AppState;

/// Re-export fixtures for test convenience
#[allow(unused_imports)]
pub use ticketdesk_core::testing::fixtures;

/// Test fixture for API testing.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_user_message() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.post("/api/v1/messages", json!({
///         "messenger": "WEB",
///         "user_id": "42"
///     })).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock thread API - inspect calls or make it fail
    #[allow(dead_code)]
    pub threads: Arc<MockThreadApi>,
    /// Temporary directory holding the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Fixture whose staff chat has no threads.
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Fixture whose staff chat mirrors tickets into threads.
    #[allow(dead_code)]
    pub fn threaded() -> Self {
        Self::build(true)
    }

    fn build(threads_enabled: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let staff = StaffConfig {
            chat_id: TEST_STAFF_CHAT,
            threads: threads_enabled,
        };
        let config = Config {
            locale: LocaleConfig {
                ticket_marker: "ticket".to_string(),
            },
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            staff: staff.clone(),
            thread_api: None,
        };

        // Create stores
        let audit_store: Arc<dyn AuditStore> = Arc::new(
            SqliteAuditStore::new(&db_path).expect("Failed to create audit store"),
        );
        let ticket_store: Arc<dyn TicketStore> = Arc::new(
            SqliteTicketStore::new(&db_path).expect("Failed to create ticket store"),
        );

        // Create audit system
        let (audit_handle, audit_writer) = create_audit_system(Arc::clone(&audit_store), 100);
        tokio::spawn(audit_writer.run());

        let threads = Arc::new(MockThreadApi::new());
        let synchronizer =
            ThreadSynchronizer::new(Some(Arc::clone(&threads) as Arc<dyn ThreadApi>), staff)
                .with_audit(audit_handle.clone());

        let engine = LifecycleEngine::new(
            ticket_store,
            Arc::new(TicketIndex::new()),
            Arc::new(synchronizer),
            fixtures::codec(),
        )
        .with_audit(audit_handle);

        let state = Arc::new(AppState::new(
            config,
            CommandRouter::new(Arc::new(engine)),
            audit_store,
        ));

        Self {
            router: ticketdesk_server::api::create_router(state),
            threads,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Get a path until `ready` accepts the response, for data written by
    /// background tasks.
    #[allow(dead_code)]
    pub async fn get_eventually(
        &self,
        path: &str,
        ready: impl Fn(&TestResponse) -> bool,
    ) -> TestResponse {
        for _ in 0..50 {
            let response = self.get(path).await;
            if ready(&response) {
                return response;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.get(path).await
    }

    /// Fetch the raw text body of a path.
    #[allow(dead_code)]
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}
