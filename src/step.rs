//! Exploration stepping: growing backward probes with dive detection.
//!
//! While every known sample is flaky there is no regression range to
//! confirm, only evidence that the culprit lies further back.  A single
//! flaky-looking sample is cheap to get wrong (noise); a run of consecutive
//! flaky samples is strong evidence, so the backward step grows with the run
//! length.  The growth is deliberately linear, not exponential, to avoid
//! overshooting the true boundary when flakiness ramps up gradually.
//!
//! The dive sub-detector recognizes a stronger signal inside the run: a
//! sample whose pass rate exceeds its younger neighbor's by more than
//! `dive_rate_threshold` marks a sudden time-forward *drop* in pass rate.
//! Mid-dive the step shrinks to 1 — the boundary is close.  A streak of more
//! than `max_dive_in_a_row` dive-carrying samples means the drop has been
//! walked past ("played out") and the streak's newest sample brackets the
//! culprit from below; the caller hands off to sequential confirmation.
//!
//! The scan holds no state between orchestrator invocations: it is rebuilt
//! from the sample list on every call, which is what makes re-invocation
//! idempotent.

use crate::SearchConfig;

/// What the scan wants after observing one more flaky sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    /// Keep scanning (or, at the end of the list, step backward).
    Continue,
    /// The dive streak exceeded `max_dive_in_a_row`: the last `streak`
    /// samples carried the dive and confirmation should take over at the
    /// streak's newest sample.
    DivePlayedOut { streak: u64 },
}

/// Run-length scan state over a newest-first sample list.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepScan {
    flakes_in_a_row: u64,
    dives_in_a_row: u64,
    last_rate: Option<f64>,
}

impl StepScan {
    /// Fresh scan state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consecutive flaky samples observed so far.
    #[must_use]
    pub fn flakes_in_a_row(&self) -> u64 {
        self.flakes_in_a_row
    }

    /// Length of the current dive-carrying streak (0 when not diving).
    #[must_use]
    pub fn dives_in_a_row(&self) -> u64 {
        self.dives_in_a_row
    }

    /// True while a dive streak is open.
    #[must_use]
    pub fn mid_dive(&self) -> bool {
        self.dives_in_a_row > 0
    }

    /// Record a stable sample: the flake run (and any dive) is over.
    pub fn note_stable(&mut self) {
        self.flakes_in_a_row = 0;
        self.dives_in_a_row = 0;
        self.last_rate = None;
    }

    /// Record the next (older) flaky sample's pass rate.
    ///
    /// Dive bookkeeping compares against the previously observed (younger)
    /// flaky sample:
    /// - rate rose by more than the threshold → a dive (the pass rate
    ///   dropped going forward in time): open or extend the streak;
    /// - rate fell by more than the threshold → flakiness is receding going
    ///   backward: close the streak;
    /// - no significant change → carry an open streak, leave a closed one.
    pub fn observe_flaky(&mut self, rate: f64, cfg: &SearchConfig) -> StepAction {
        self.flakes_in_a_row += 1;

        if cfg.max_dive_in_a_row == 0 || self.flakes_in_a_row == 1 {
            self.last_rate = Some(rate);
            return StepAction::Continue;
        }

        let newer = self
            .last_rate
            .expect("flakes_in_a_row > 1 implies a previous rate");
        if rate - newer > cfg.dive_rate_threshold {
            self.dives_in_a_row += 1;
        } else if newer - rate > cfg.dive_rate_threshold {
            self.dives_in_a_row = 0;
        } else if self.dives_in_a_row > 0 {
            self.dives_in_a_row += 1;
        }
        self.last_rate = Some(rate);

        if self.dives_in_a_row > cfg.max_dive_in_a_row {
            return StepAction::DivePlayedOut {
                streak: self.dives_in_a_row,
            };
        }
        StepAction::Continue
    }

    /// Backward step size from the oldest known sample.
    ///
    /// 1 while mid-dive; otherwise the flake run length, optionally capped
    /// by `max_flake_in_a_row`.
    #[must_use]
    pub fn step_size(&self, cfg: &SearchConfig) -> u64 {
        if self.mid_dive() {
            return 1;
        }
        let run = self.flakes_in_a_row.max(1);
        if cfg.max_flake_in_a_row > 0 {
            run.min(cfg.max_flake_in_a_row)
        } else {
            run
        }
    }
}
