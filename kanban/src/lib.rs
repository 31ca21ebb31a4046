//! Kanban board ordering engine.
//!
//! Materializes pointer-ordered server data into an in-memory board, applies
//! optimistic drag transitions through a pure reducer, gates server refreshes
//! so they never clobber an in-flight drag, and derives the single order
//! update a finished drag commits.

pub mod api;
pub mod board;
pub mod config;
pub mod session;
pub mod sync;
