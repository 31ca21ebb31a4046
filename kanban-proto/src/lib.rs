//! Shared wire definitions for the kanban board REST interface.
//!
//! Task order travels as insert-before pointers: each task names the task
//! that immediately follows it in its bucket, or nothing when it is last.

pub mod bucket;
pub mod codec;
pub mod ids;
pub mod task;
