//! Test helper module for billdesk integration tests.

#![allow(dead_code)]

use billdesk::config::{
    BusinessConfig, Config, RetryConfig, ServerConfig, SmsConfig, StorageConfig, WhatsAppConfig,
};
use billdesk::startup::{AppState, Application};
use secrecy::Secret;
use serde_json::{json, Value};
use std::path::Path;

/// Build a config bound to a random port over the given data directory.
///
/// The retry poll interval is pushed far out so the background worker never
/// interleaves with a test; retry behavior is driven explicitly through the
/// exposed state.
pub fn test_config(data_dir: &Path) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            public_base_url: "http://localhost:8080".to_string(),
        },
        storage: StorageConfig {
            data_dir: data_dir.to_path_buf(),
        },
        business: BusinessConfig {
            name: "Mammta's Food".to_string(),
            upi_vpa: "mammtas@upi".to_string(),
            support_phone: "+91 9876543210".to_string(),
        },
        whatsapp: WhatsAppConfig {
            enabled_by_default: true,
            country_code: "91".to_string(),
        },
        sms: SmsConfig {
            account_sid: "DUMMY_ACCOUNT_SID".to_string(),
            auth_token: Secret::new("DUMMY_AUTH_TOKEN".to_string()),
            from_number: "+15005550006".to_string(),
            enabled_by_default: true,
            simulate_transport: true,
            proxy_url: None,
            api_url: None,
        },
        retry: RetryConfig {
            poll_interval_ms: 3_600_000,
        },
        service_name: "billdesk-test".to_string(),
    }
}

/// Test application wrapper for integration tests.
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub state: AppState,
    pub client: reqwest::Client,
    data_dir: Option<tempfile::TempDir>,
}

impl TestApp {
    /// Spawn a new test application on a random port with a fresh data
    /// directory.
    pub async fn spawn() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut app = Self::spawn_on(dir.path()).await;
        app.data_dir = Some(dir);
        app
    }

    /// Spawn over an existing data directory, rehydrating whatever state it
    /// holds.
    pub async fn spawn_on(data_dir: &Path) -> Self {
        let config = test_config(data_dir);
        let app = Application::build(config)
            .await
            .expect("Failed to build test application");
        let port = app.port();
        let state = app.state();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the HTTP server to be ready by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            state,
            client,
            data_dir: None,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Create a bill and return its JSON representation.
    pub async fn create_bill(&self, customer_name: &str, phone: &str, items: Value) -> Value {
        let response = self
            .client
            .post(self.url("/bills"))
            .json(&json!({
                "customer_name": customer_name,
                "phone": phone,
                "items": items,
            }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), 201, "bill creation should succeed");
        response.json().await.expect("Failed to parse JSON")
    }

    /// The standard one-line test order: 3 cups of tea at 20 each.
    pub fn tea_items() -> Value {
        json!([{ "name": "Tea", "price": 20.0, "quantity": 3 }])
    }
}
