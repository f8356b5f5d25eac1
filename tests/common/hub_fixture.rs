//! In-process hub fixture
//!
//! A `Hub` over `MemoryStore` with the real `JwtVerifier`. Connections are
//! plain channels, so tests read exactly what a WebSocket client would be
//! sent.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use uuid::Uuid;
use xfhub::backend::auth::JwtVerifier;
use xfhub::backend::hub::{ConnectionHandle, Hub};
use xfhub::backend::store::{MemoryStore, Stores};
use xfhub::shared::event::HubEvent;

use super::auth_helpers::{token_for, TEST_SECRET};

/// Hub plus the store behind it
pub struct TestHub {
    pub hub: Arc<Hub>,
    pub store: Arc<MemoryStore>,
}

/// One connected device
pub struct TestClient {
    pub handle: ConnectionHandle,
    pub rx: UnboundedReceiver<HubEvent>,
}

impl TestClient {
    pub fn user_id(&self) -> Uuid {
        self.handle.user_id
    }
}

impl TestHub {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new(), Duration::from_secs(2))
    }

    pub fn with_store(store: MemoryStore, store_timeout: Duration) -> Self {
        let store = Arc::new(store);
        let hub = Hub::new(
            Stores::from_backend(store.clone()),
            Arc::new(JwtVerifier::new(TEST_SECRET)),
            store_timeout,
        );
        Self {
            hub: Arc::new(hub),
            store,
        }
    }

    /// Open a connection for a user
    pub async fn connect(&self, user_id: Uuid) -> TestClient {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self
            .hub
            .connect(&token_for(user_id, "tester"), tx)
            .await
            .expect("Failed to connect test client");
        TestClient { handle, rx }
    }

    /// Open a connection for a fresh user
    pub async fn connect_new(&self) -> TestClient {
        self.connect(Uuid::new_v4()).await
    }
}
