//! Property-based tests

mod lifecycle_proptest;
mod queue_proptest;
