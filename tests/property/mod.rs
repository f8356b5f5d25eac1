//! Property-based tests
//!
//! - `presence_proptest` - viewer counter matches the distinct viewer set
//! - `relationship_proptest` - edges stay symmetric under any operation mix

mod presence_proptest;
mod relationship_proptest;
