//! Reconciliation of local drag state with server snapshots.
//!
//! [`BoardStore`] is the single owner of a board's [`BoardState`]. Rendering
//! code reads through it and writes only through [`Gesture`]s; the `replace`
//! transition is reachable only through [`SyncReconciler`], which admits a
//! fetched snapshot only when it cannot clobber an in-flight drag. A finished
//! drag yields exactly one [`TaskOrderUpdate`] via the commit protocol.
//!
//! [`BoardState`]: crate::board::BoardState
//! [`TaskOrderUpdate`]: kanban_proto::task::TaskOrderUpdate

pub mod commit;
pub mod reconciler;
pub mod store;

pub use commit::{DragEnd, derive_commit};
pub use reconciler::{FetchTicket, Reconciliation, SyncReconciler};
pub use store::{BoardStore, Gesture};
