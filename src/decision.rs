//! Unified decision envelope for search outputs.
//!
//! The surrounding analysis pipeline usually wants a record of *why* the
//! search asked for a sample or stopped, so the decision can be:
//! - logged (debugging / monitoring)
//! - replayed (offline evaluation of threshold changes)
//! - consumed by the execution layer without heuristics (e.g. the doubled
//!   iteration count for a convergence resample)
//!
//! This module provides a small `SearchDecision` struct and a typed
//! `SearchNote` list the orchestrator attaches to explain each decision.

use crate::{RunPoint, SearchResult};

/// Why a terminal no-findings result was returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NoFindingsReason {
    /// No samples were supplied; there is nothing to anchor a proposal.
    EmptySampleList,
    /// The newest sampled revision is stable: the flakiness is not
    /// reproducible right now.
    NotReproducible,
    /// The test does not exist at the newest sampled revision and has never
    /// shown flakiness.
    TestDoesNotExist,
    /// Every candidate run point between the floor and the explored range is
    /// already occupied by a recorded sample.
    SearchSpaceExhausted,
}

/// Audit-friendly notes attached to a decision.
///
/// Notes are intentionally small, typed, and stable.  Prefer adding new
/// variants over changing existing semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SearchNote {
    /// Explicit bisect mode between caller-validated bounds, or the bisect
    /// leg of a test-introduction hand-off.
    BisectRange { lower: RunPoint, upper: RunPoint },

    /// The test is absent at `absent` and flaky at the adjacent younger
    /// sample `flaky`: the culprit is the commit that introduced the test.
    TestIntroduction { absent: RunPoint, flaky: RunPoint },

    /// The latest adjacent stable→flaky pair observed during the scan.
    RegressionRange { lower: RunPoint, upper: RunPoint },

    /// The stable lower bound is not yet trusted; the same run point should
    /// be resampled with this many iterations.
    ResampleForConvergence { run_point: RunPoint, iterations: u64 },

    /// Sequential ±1 confirmation is running between a stable `lower` and a
    /// flaky upper bound.
    SequentialConfirm { lower: RunPoint, flaky: RunPoint },

    /// A dive streak exceeded `max_dive_in_a_row`: the sudden drop in pass
    /// rate has been localized and confirmation takes over.
    DiveExhausted { streak: u64 },

    /// Exploration stepped backward from the oldest known sample.
    StepBack {
        from: RunPoint,
        step: u64,
        flakes_in_a_row: u64,
        mid_dive: bool,
    },

    /// The proposed run point was clamped to the caller's absolute floor.
    ClampedToLowerBound { lower: RunPoint },

    /// The floor is already known flaky and nothing older may be sampled.
    CulpritAtLowerBound { run_point: RunPoint },

    /// The proposed run point was occupied by a recorded sample (typically
    /// an invalid artifact) and shifted to an unsampled neighbor.
    ShiftedOffOccupied { from: RunPoint, to: RunPoint },

    /// Terminal no-findings outcome, with the reason.
    NoFindings { reason: NoFindingsReason },
}

/// A single search decision in a unified envelope.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchDecision {
    /// The verdict or next sample request.
    pub result: SearchResult,
    /// Audit notes describing why this decision happened.
    pub notes: Vec<SearchNote>,
}

impl SearchDecision {
    /// Terminal no-findings decision carrying its reason as the only note.
    pub(crate) fn no_findings(reason: NoFindingsReason) -> Self {
        Self {
            result: SearchResult::no_findings(),
            notes: vec![SearchNote::NoFindings { reason }],
        }
    }

    /// The iteration count requested by a convergence resample, if any.
    #[must_use]
    pub fn requested_iterations(&self) -> Option<u64> {
        self.notes.iter().find_map(|n| match n {
            SearchNote::ResampleForConvergence { iterations, .. } => Some(*iterations),
            _ => None,
        })
    }
}
