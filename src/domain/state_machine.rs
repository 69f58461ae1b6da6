//! Checkpoint grammar and next-action derivation.
//!
//! A trip's workflow position is a pure function of its ordered checkpoint
//! history:
//!
//! ```text
//!            ┌──────────────────────────────┐
//!            ▼                              │ another warehouse
//! ExitFactory → ArrivalWarehouse → ExitWarehouse ─┤
//!                                                 │ return
//!                                                 ▼
//!                                          ArrivalFactory (complete)
//! ```
//!
//! Nothing in this module keeps state. Callers re-run [`next_action`] on
//! the authoritative log list every time they need to know what comes next.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::checkpoint::{CheckpointKind, CheckpointLog};

/// The driver's answer at the branch point after leaving a warehouse.
///
/// This choice is not persisted; it only selects which checkpoint is
/// required next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BranchChoice {
    /// Drive to another warehouse.
    #[serde(alias = "next_warehouse")]
    AnotherWarehouse,
    /// Drive back to the factory and end the trip.
    #[serde(alias = "return")]
    ReturnToFactory,
}

impl BranchChoice {
    /// Both options, in display order.
    pub const ALL: [Self; 2] = [Self::AnotherWarehouse, Self::ReturnToFactory];

    /// Checkpoint required once this option is selected.
    #[must_use]
    pub const fn target(self) -> CheckpointKind {
        match self {
            Self::AnotherWarehouse => CheckpointKind::ArrivalWarehouse,
            Self::ReturnToFactory => CheckpointKind::ArrivalFactory,
        }
    }

    /// Button label shown to the operator.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::AnotherWarehouse => "Go to Another Warehouse",
            Self::ReturnToFactory => "Return to Factory",
        }
    }
}

/// A position in a log sequence where the grammar is broken.
///
/// This is a data-integrity fault: the stored history cannot have been
/// produced by the normal workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("checkpoint {found} at index {index} cannot follow {}", describe_previous(.previous))]
pub struct GrammarViolation {
    /// Zero-based index of the offending entry.
    pub index: usize,
    /// Kind found at that index.
    pub found: CheckpointKind,
    /// Kind of the preceding entry, `None` at the start of the trip.
    pub previous: Option<CheckpointKind>,
}

fn describe_previous(previous: &Option<CheckpointKind>) -> String {
    previous.map_or_else(|| "the start of the trip".to_string(), |k| k.to_string())
}

/// What the workflow requires next, derived from the checkpoint history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "detail", rename_all = "snake_case")]
pub enum NextAction {
    /// The given checkpoint must be recorded next.
    Require(CheckpointKind),
    /// The driver must choose between another warehouse and returning.
    Branch,
    /// The trip has reached its terminal checkpoint.
    Complete,
    /// The history violates the grammar; no continuation is offered.
    Invalid(GrammarViolation),
}

impl NextAction {
    /// Resolves a branch decision into the required checkpoint.
    ///
    /// Returns `None` when there is no branch decision pending.
    #[must_use]
    pub const fn resolve(self, choice: BranchChoice) -> Option<Self> {
        match self {
            Self::Branch => Some(Self::Require(choice.target())),
            _ => None,
        }
    }

    /// Returns `true` if recording `kind` is a legal next step.
    ///
    /// At a branch both destinations are admissible; the choice itself is
    /// only a presentation concern.
    #[must_use]
    pub fn admits(self, kind: CheckpointKind) -> bool {
        match self {
            Self::Require(required) => required == kind,
            Self::Branch => BranchChoice::ALL.iter().any(|c| c.target() == kind),
            Self::Complete | Self::Invalid(_) => false,
        }
    }

    /// Checkpoint required next, if exactly one is.
    #[must_use]
    pub const fn required_kind(self) -> Option<CheckpointKind> {
        match self {
            Self::Require(kind) => Some(kind),
            _ => None,
        }
    }

    /// Returns `true` once the trip is complete.
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl fmt::Display for NextAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Require(kind) => write!(f, "{kind}"),
            Self::Branch => f.write_str("Arrival at Warehouse or Arrival at Factory"),
            Self::Complete => f.write_str("no further checkpoints"),
            Self::Invalid(violation) => write!(f, "invalid history ({violation})"),
        }
    }
}

/// Kinds that may legally follow `previous` (`None` = empty trip).
#[must_use]
pub const fn successors(previous: Option<CheckpointKind>) -> &'static [CheckpointKind] {
    match previous {
        None => &[CheckpointKind::ExitFactory],
        Some(CheckpointKind::ExitFactory) => &[CheckpointKind::ArrivalWarehouse],
        Some(CheckpointKind::ArrivalWarehouse) => &[CheckpointKind::ExitWarehouse],
        Some(CheckpointKind::ExitWarehouse) => &[
            CheckpointKind::ArrivalWarehouse,
            CheckpointKind::ArrivalFactory,
        ],
        Some(CheckpointKind::ArrivalFactory) => &[],
    }
}

const fn action_after(last: Option<CheckpointKind>) -> NextAction {
    match last {
        None => NextAction::Require(CheckpointKind::ExitFactory),
        Some(CheckpointKind::ExitFactory) => NextAction::Require(CheckpointKind::ArrivalWarehouse),
        Some(CheckpointKind::ArrivalWarehouse) => NextAction::Require(CheckpointKind::ExitWarehouse),
        Some(CheckpointKind::ExitWarehouse) => NextAction::Branch,
        Some(CheckpointKind::ArrivalFactory) => NextAction::Complete,
    }
}

/// Derives the next action from a sequence of checkpoint kinds.
///
/// Every adjacent pair must be a legal transition; the first entry is
/// taken as given so that a history is always judged by where it ends.
/// Whether a history *starts* correctly is checked by
/// [`validate_sequence`], which the append and edit paths use.
pub fn derive<I>(kinds: I) -> NextAction
where
    I: IntoIterator<Item = CheckpointKind>,
{
    let mut last: Option<CheckpointKind> = None;
    for (index, kind) in kinds.into_iter().enumerate() {
        if let Some(previous) = last {
            if !successors(Some(previous)).contains(&kind) {
                return NextAction::Invalid(GrammarViolation {
                    index,
                    found: kind,
                    previous: Some(previous),
                });
            }
        }
        last = Some(kind);
    }
    action_after(last)
}

/// Derives the next action from an ordered log list.
#[must_use]
pub fn next_action(logs: &[CheckpointLog]) -> NextAction {
    derive(logs.iter().map(|log| log.kind))
}

/// Checks that a sequence is a complete-or-partial run of the grammar,
/// anchored at `ExitFactory`.
///
/// # Errors
///
/// Returns the first [`GrammarViolation`] found.
pub fn validate_sequence<I>(kinds: I) -> Result<NextAction, GrammarViolation>
where
    I: IntoIterator<Item = CheckpointKind>,
{
    let mut last: Option<CheckpointKind> = None;
    for (index, kind) in kinds.into_iter().enumerate() {
        if !successors(last).contains(&kind) {
            return Err(GrammarViolation {
                index,
                found: kind,
                previous: last,
            });
        }
        last = Some(kind);
    }
    Ok(action_after(last))
}
