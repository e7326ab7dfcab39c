//! Integration tests
//!
//! End-to-end flows across the store, the queues and the sync engine

mod engine_test;
mod http_sync_test;
mod scenarios_test;
mod sqlite_test;
