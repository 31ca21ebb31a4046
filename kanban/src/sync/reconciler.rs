//! Guard on the `replace` transition.
//!
//! Every fetch is issued a [`FetchTicket`] carrying a generation number.
//! When the fetch settles, its snapshot replaces the local board only if:
//!
//! 1. no newer fetch has been issued since (superseded results are dropped),
//! 2. it was issued after the last local edit (a lift, a drop, or a settled
//!    commit) and no commit is in flight, so it can reflect the user's intent,
//! 3. no drag is in progress,
//! 4. it actually differs from what is on screen.

use std::collections::BTreeSet;

use crate::board::{Board, BoardState};

/// Handle for one issued fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchTicket(u64);

impl FetchTicket {
    /// Generation number of the fetch, starting at 1.
    #[must_use]
    pub const fn generation(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for FetchTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fetch#{}", self.0)
    }
}

/// What happened to a settled fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The snapshot replaced the local board.
    Applied,
    /// A newer fetch was issued after this one.
    Superseded,
    /// The fetch was issued before the last local edit, or settled while a
    /// commit was in flight.
    Stale,
    /// A drag is in progress.
    Dragging,
    /// The snapshot matches the local board; the board was left untouched.
    Unchanged,
    /// The fetch itself failed.
    Failed,
}

impl Reconciliation {
    /// Whether the local board was replaced.
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

impl std::fmt::Display for Reconciliation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Applied => write!(f, "applied"),
            Self::Superseded => write!(f, "superseded"),
            Self::Stale => write!(f, "stale"),
            Self::Dragging => write!(f, "dragging"),
            Self::Unchanged => write!(f, "unchanged"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Tracks issued fetches and local edits.
#[derive(Debug, Default)]
pub struct SyncReconciler {
    /// Generation of the most recently issued fetch.
    issued: u64,
    /// Generations issued but not yet settled.
    pending: BTreeSet<u64>,
    /// Fetches with a generation at or below this mark predate a local edit.
    edit_mark: u64,
    /// Commits sent but not yet settled.
    commits_in_flight: usize,
}

impl SyncReconciler {
    /// Creates a reconciler with no fetch issued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new fetch and returns its ticket.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.issued += 1;
        self.pending.insert(self.issued);
        FetchTicket(self.issued)
    }

    /// Whether any issued fetch has not settled yet.
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Marks every fetch issued so far as stale.
    pub fn note_local_edit(&mut self) {
        self.edit_mark = self.issued;
    }

    /// Registers a commit about to be sent. Every fetch settling before the
    /// matching [`commit_settled`](Self::commit_settled) is stale.
    pub fn begin_commit(&mut self) {
        self.note_local_edit();
        self.commits_in_flight += 1;
    }

    /// Settles a commit, successfully or not.
    pub fn commit_settled(&mut self) {
        self.note_local_edit();
        self.commits_in_flight = self.commits_in_flight.saturating_sub(1);
    }

    /// Whether any commit has not settled yet.
    #[must_use]
    pub const fn is_committing(&self) -> bool {
        self.commits_in_flight > 0
    }

    /// Settles a failed fetch.
    pub fn fetch_failed(&mut self, ticket: FetchTicket) -> Reconciliation {
        self.pending.remove(&ticket.0);
        Reconciliation::Failed
    }

    /// Settles a fetch and decides whether its result may be used at all.
    ///
    /// Returns `Err` with the rejection reason when the ticket is superseded
    /// or stale. The snapshot does not need to be decoded in that case.
    ///
    /// # Errors
    ///
    /// Returns [`Reconciliation::Superseded`] or [`Reconciliation::Stale`].
    pub fn admit(&mut self, ticket: FetchTicket) -> Result<(), Reconciliation> {
        self.pending.remove(&ticket.0);
        if ticket.0 < self.issued {
            return Err(Reconciliation::Superseded);
        }
        if ticket.0 <= self.edit_mark || self.is_committing() {
            return Err(Reconciliation::Stale);
        }
        Ok(())
    }

    /// Decides whether an admitted snapshot replaces the current state.
    #[must_use]
    pub fn should_replace(current: &BoardState, incoming: &Board) -> Reconciliation {
        if current.is_dragging() {
            Reconciliation::Dragging
        } else if current.board.same_content(incoming) {
            Reconciliation::Unchanged
        } else {
            Reconciliation::Applied
        }
    }
}
