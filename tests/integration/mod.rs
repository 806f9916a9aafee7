//! Integration tests against mock HTTP endpoints

pub mod http_api_test;
pub mod notifications_test;
pub mod persistence_test;
pub mod sync_test;
