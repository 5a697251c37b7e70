//! Property-based tests for listing guarantees

mod pagination;
