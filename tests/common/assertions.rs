//! Assertion macros and event helpers

use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use xfhub::shared::event::{EventType, HubEvent};

/// Assert that a result is ok and return the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a result is an error matching a pattern
#[macro_export]
macro_rules! assert_err {
    ($result:expr, $pattern:pat) => {
        match $result {
            Err($pattern) => {}
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => panic!("Expected different error variant, got: {:?}", e),
        }
    };
}

/// Collect everything already queued on a connection
pub fn drain(rx: &mut UnboundedReceiver<HubEvent>) -> Vec<HubEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Events of one type among those queued
pub fn drain_of(rx: &mut UnboundedReceiver<HubEvent>, event_type: EventType) -> Vec<HubEvent> {
    drain(rx)
        .into_iter()
        .filter(|event| event.event_type == event_type)
        .collect()
}

/// Wait for the next event of a type, skipping others
pub async fn next_of(rx: &mut UnboundedReceiver<HubEvent>, event_type: EventType) -> HubEvent {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match rx.recv().await {
                Some(event) if event.event_type == event_type => return event,
                Some(_) => continue,
                None => panic!("Connection channel closed while waiting for {:?}", event_type),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("Timed out waiting for {:?}", event_type))
}
