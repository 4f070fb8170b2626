//! The unit of work the task loop drives to completion: either a markdown
//! plan file or an externally tracked ticket.

use serde::{Deserialize, Serialize};

/// One checkbox/task entry in a [`WorkItem`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    pub completed: bool,
}

impl Phase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            completed: false,
        }
    }
}

/// Which adapter kind backs this work item; governs whether `update_phase`
/// and friends are meaningful or no-ops (see the `WorkSource` contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkItemKind {
    Plan,
    Ticket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkItemStatus {
    Open,
    InProgress,
    Closed,
}

/// A work item as read fresh from its source at the start of an iteration.
///
/// Never mutated in place by the core: every update goes back out through
/// the source's `update_phase` / `add_note` / `set_status`, and the next
/// iteration re-fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub title: String,
    pub status: WorkItemStatus,
    pub kind: WorkItemKind,
    pub phases: Vec<Phase>,
    pub raw_content: String,
    pub validation_commands: Vec<String>,
}

impl WorkItem {
    /// Phaseless mode: no phases at all, the whole item is one implicit
    /// phase that ends only when the agent reports `Done`.
    pub fn is_phaseless(&self) -> bool {
        self.phases.is_empty()
    }

    /// All phases complete (vacuously false for a phaseless item — completion
    /// there is driven by the agent's own `Done` report, not phase state).
    pub fn all_phases_complete(&self) -> bool {
        !self.phases.is_empty() && self.phases.iter().all(|p| p.completed)
    }

    /// The first incomplete phase, i.e. the "current" phase.
    pub fn current_phase(&self) -> Option<&Phase> {
        self.phases.iter().find(|p| !p.completed)
    }
}
