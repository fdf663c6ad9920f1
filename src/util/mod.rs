//! Shared utilities for `canopy`.
//!
//! - Query id hashing (SHA256)
//! - Tracker timestamp parsing and relative formatting
//! - Natural ordering of issue keys

mod hash;
pub mod keys;
pub mod time;

pub use hash::query_id;
pub use keys::{compare_keys, parse_key};
pub use time::{format_age, parse_tracker_timestamp};
