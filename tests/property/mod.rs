//! Property-based tests

pub mod queue_proptest;
pub mod quiet_hours_proptest;
