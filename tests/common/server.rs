//! Served application fixture
//!
//! Binds the full router to `127.0.0.1:0` with connect info enabled, the
//! same way the server binary serves it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use xfhub::backend::server::create_app_with_stores;
use xfhub::backend::store::{MemoryStore, Stores};
use xfhub::shared::config::{HubConfig, HubConfigBuilder};

use super::auth_helpers::TEST_SECRET;

/// Token accepted on `/internal` routes by the served app
pub const TEST_INTERNAL_TOKEN: &str = "hub-suite-internal";

pub struct TestServer {
    pub addr: SocketAddr,
    pub store: Arc<MemoryStore>,
}

impl TestServer {
    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/ws?token={}", self.addr, token)
    }
}

pub fn test_config() -> HubConfig {
    test_config_builder()
        .build()
        .expect("Invalid test config")
}

/// Test defaults, for tests that tune timings before building
pub fn test_config_builder() -> HubConfigBuilder {
    HubConfig::builder()
        .jwt_secret(TEST_SECRET)
        .internal_token(TEST_INTERNAL_TOKEN)
        .store_timeout(Duration::from_secs(2))
}

/// Start the app on a random port
pub async fn start_test_server() -> TestServer {
    start_test_server_with(test_config(), MemoryStore::new()).await
}

/// Start the app with a given config and store
pub async fn start_test_server_with(config: HubConfig, store: MemoryStore) -> TestServer {
    let store = Arc::new(store);
    let app = create_app_with_stores(&config, Stores::from_backend(store.clone()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestServer { addr, store }
}
