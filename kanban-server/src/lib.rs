//! Reference server for the kanban board REST interface.
//!
//! Keeps projects, buckets and tasks in memory and serves them as JSON with
//! the same insert-before pointers a production backend would use. Used by
//! the `kanban-server` binary and by the client's integration tests.

pub mod config;
pub mod routes;
pub mod store;
