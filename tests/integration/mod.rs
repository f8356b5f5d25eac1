//! Integration tests
//!
//! - `hub_scenarios_test` - rooms, fan-out, teardown, presence through the hub
//! - `relationship_test` - friend-request transitions and their races
//! - `api_test` - REST and internal endpoints through the router
//! - `ws_test` - WebSocket end to end over a real socket
//! - `pg_store_test` - PostgreSQL store, needs `TEST_DATABASE_URL`

mod api_test;
mod pg_store_test;
mod relationship_test;
mod ws_test;
