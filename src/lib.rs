//! `flakeseek`: deterministic regression-search primitives for flaky tests.
//!
//! Designed for "which revision made this test flaky?" problems: a test has
//! started passing nondeterministically, you can rerun it N times at any
//! revision you like, and each rerun is expensive.  `flakeseek` decides what
//! to sample next — or declares the culprit — from the samples gathered so
//! far.
//!
//! A [`Sample`] records one measurement: a run point (commit position or
//! build number — any totally-ordered integer ordinal), a [`PassRate`], the
//! iteration count behind that rate, and whether the build artifact at that
//! run point was usable at all.  You own the sample list; `flakeseek` never
//! stores anything between calls.
//!
//! **Goals:**
//! - **Deterministic**: same samples + config → same answer.  Re-invoking
//!   [`next_run_point`] with an unchanged list yields an identical result;
//!   all run-length state is recomputed from the list every call.
//! - **Noise-aware**: a pass rate near 0 or 1 at a low iteration count is
//!   not trusted as a stable lower bound until the iteration budget
//!   ([`SearchConfig::max_iterations_to_rerun`]) is spent on it.
//! - **Pure**: no I/O, no clocks, no hidden configuration.  Safe to call
//!   concurrently on snapshots of different analyses with different
//!   [`SearchConfig`]s.
//!
//! **Search phases:**
//! - *Exploration* ([`StepScan`]): while every known sample is flaky, probe
//!   backward with a step that grows linearly with the consecutive-flake run
//!   length.  A sudden time-forward drop in pass rate (a "dive") is a
//!   stronger localization signal than an ordinary flake run: mid-dive the
//!   step shrinks to 1, and a played-out dive hands off to confirmation.
//! - *Confirmation* ([`confirm_range`]): once an adjacent stable→flaky
//!   boundary is known, walk forward one run point at a time from the stable
//!   side and declare the first flaky run point the culprit.
//! - *Bisection* ([`bisect`]): when the caller already holds a validated
//!   stable and flaky bound (try-job style analyses that can build any
//!   revision directly), plain binary search biased toward the older
//!   revision.
//!
//! [`next_run_point`] is the single entry point that picks among the phases;
//! [`next_run_point_explain`] additionally returns typed [`SearchNote`]s
//! describing why, for callers that want an audit trail.
//!
//! ```rust
//! use flakeseek::{next_run_point, Sample, SearchBounds, SearchConfig};
//!
//! let cfg = SearchConfig::default();
//! // Newest first.  Run point 100 passed 800/800 iterations; 101 is flaky.
//! let samples = vec![Sample::rate(101, 0.5, 800), Sample::rate(100, 1.0, 800)];
//!
//! let result = next_run_point(&samples, &cfg, SearchBounds::default()).unwrap();
//! assert_eq!(result.culprit_run_point, Some(101));
//! ```
//!
//! **Non-goals:**
//! - Not an analysis platform: no test execution, no persistence, no retry
//!   plumbing, no issue-tracker glue.  The caller samples the requested run
//!   point, appends the result, and calls again.
//! - No wall-clock awareness; timeouts belong to the surrounding pipeline.

#![forbid(unsafe_code)]

use std::collections::BTreeSet;

mod decision;
pub use decision::*;

mod region;
pub use region::*;

mod step;
pub use step::*;

mod sequential;
pub use sequential::*;

mod bisect;
pub use bisect::*;

mod harness;
pub use harness::*;

/// A totally-ordered revision ordinal: commit position or build number.
///
/// The two are interchangeable here — the search only ever compares,
/// increments and decrements run points, and requires no contiguity.
pub type RunPoint = u64;

/// Outcome of rerunning a test many times at one run point.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PassRate {
    /// The test did not exist at this run point.
    TestNotFound,
    /// Fraction of iterations that passed, in `[0, 1]`.
    Rate(f64),
}

/// Classification of a pass rate against the flake thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Stability {
    /// The test did not exist at this run point.
    TestNotFound,
    /// Consistently passing or consistently failing.
    Stable,
    /// Nondeterministic: the pass rate sits between the thresholds.
    Flaky,
}

/// Classify a pass rate as stable, flaky, or test-not-found.
///
/// Stable means *consistent* — a rate below `lower_flake_threshold` (reliably
/// failing) or above `upper_flake_threshold` (reliably passing).  Everything
/// in between is flaky.
///
/// Total over the documented domain.  Rates outside `[0, 1]` are a caller
/// precondition violation; [`next_run_point`] rejects them up front with
/// [`SearchError::PassRateOutOfRange`].
#[must_use]
pub fn classify(rate: PassRate, cfg: &SearchConfig) -> Stability {
    match rate {
        PassRate::TestNotFound => Stability::TestNotFound,
        PassRate::Rate(r) => {
            debug_assert!((0.0..=1.0).contains(&r), "pass rate out of range: {r}");
            if r < cfg.lower_flake_threshold || r > cfg.upper_flake_threshold {
                Stability::Stable
            } else {
                Stability::Flaky
            }
        }
    }
}

/// One recorded measurement at one run point.
///
/// Samples are immutable once recorded.  Sample lists are sorted by
/// `run_point` strictly descending (newest first) by contract of every
/// function in this crate.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample {
    /// The revision ordinal this sample was taken at.
    pub run_point: RunPoint,
    /// The observed pass rate.
    pub pass_rate: PassRate,
    /// How many reruns produced `pass_rate`.
    pub iterations: u64,
    /// False if the build artifact at this run point was unusable.
    ///
    /// Invalid-artifact samples are excluded from classification, but their
    /// run point stays occupied: the search proposes a numeric neighbor
    /// instead of re-requesting a known-broken build.
    pub valid_artifact: bool,
}

impl Sample {
    /// A sample with an observed pass rate and a valid artifact.
    pub fn rate(run_point: RunPoint, rate: f64, iterations: u64) -> Self {
        Self {
            run_point,
            pass_rate: PassRate::Rate(rate),
            iterations,
            valid_artifact: true,
        }
    }

    /// A sample recording that the test did not exist at this run point.
    pub fn test_not_found(run_point: RunPoint) -> Self {
        Self {
            run_point,
            pass_rate: PassRate::TestNotFound,
            iterations: 0,
            valid_artifact: true,
        }
    }

    /// A sample recording an unusable build artifact at this run point.
    pub fn invalid_artifact(run_point: RunPoint) -> Self {
        Self {
            run_point,
            pass_rate: PassRate::TestNotFound,
            iterations: 0,
            valid_artifact: false,
        }
    }
}

/// Look up the sample recorded at `run_point`, if any.
#[must_use]
pub fn sample_at(samples: &[Sample], run_point: RunPoint) -> Option<&Sample> {
    samples.iter().find(|s| s.run_point == run_point)
}

/// Immutable per-analysis configuration.
///
/// Passed into every call; there is no process-wide state.  Two analyses can
/// run concurrently with different settings.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchConfig {
    /// Pass rates strictly below this are stable (reliably failing).
    pub lower_flake_threshold: f64,
    /// Pass rates strictly above this are stable (reliably passing).
    pub upper_flake_threshold: f64,
    /// Cap on the growing exploration step (0 = uncapped).
    ///
    /// The backward step grows with the consecutive-flake run length.  A cap
    /// suits build-number-granularity deployments where overshooting is
    /// expensive; leave at 0 for plain linear growth.
    pub max_flake_in_a_row: u64,
    /// Dive streak length after which the dive is considered played out and
    /// the search hands off to sequential confirmation.  0 disables dive
    /// detection entirely.
    pub max_dive_in_a_row: u64,
    /// Minimum pass-rate change between adjacent samples that counts as a
    /// dive (sudden drop) or a recede (sudden recovery).
    pub dive_rate_threshold: f64,
    /// Baseline iteration count for a fresh sample request.
    pub iterations_to_rerun: u64,
    /// Iteration budget at which a stable-looking sample is trusted as a
    /// regression-range lower bound.  Below it, the same run point is
    /// re-requested with doubled iterations.
    pub max_iterations_to_rerun: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            lower_flake_threshold: 0.02,
            upper_flake_threshold: 0.98,
            max_flake_in_a_row: 0,
            max_dive_in_a_row: 4,
            dive_rate_threshold: 0.4,
            iterations_to_rerun: 100,
            max_iterations_to_rerun: 800,
        }
    }
}

impl SearchConfig {
    /// Validate threshold ordering and iteration budgets.
    pub fn validate(&self) -> Result<(), SearchError> {
        let lo = self.lower_flake_threshold;
        let hi = self.upper_flake_threshold;
        if !(lo.is_finite() && hi.is_finite() && 0.0 <= lo && lo < hi && hi <= 1.0) {
            return Err(SearchError::BadThresholds { lower: lo, upper: hi });
        }
        if self.iterations_to_rerun == 0 || self.max_iterations_to_rerun < self.iterations_to_rerun
        {
            return Err(SearchError::BadIterationBudget {
                base: self.iterations_to_rerun,
                max: self.max_iterations_to_rerun,
            });
        }
        if self.max_dive_in_a_row > 0 {
            let d = self.dive_rate_threshold;
            if !(d.is_finite() && d > 0.0 && d <= 1.0) {
                return Err(SearchError::BadDiveThreshold { threshold: d });
            }
        }
        Ok(())
    }

    /// Doubled iteration request for a not-yet-trusted stable sample,
    /// capped at `max_iterations_to_rerun`.
    #[must_use]
    pub fn next_iterations(&self, observed: u64) -> u64 {
        observed
            .max(self.iterations_to_rerun)
            .saturating_mul(2)
            .min(self.max_iterations_to_rerun)
    }
}

/// Optional caller-supplied bounds on the search.
///
/// Both set selects bisect mode: the caller has already validated a stable
/// `lower` and a flaky `upper` and wants plain binary search between them.
/// `lower` alone is the absolute floor for exploration — typically the
/// previous build's last-known-good commit plus one.  `upper` alone is
/// ignored (the newest sample already bounds the search from above).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchBounds {
    /// Oldest run point the search may propose.
    pub lower: Option<RunPoint>,
    /// Validated flaky upper bound (bisect mode only).
    pub upper: Option<RunPoint>,
}

impl SearchBounds {
    /// Bisect mode between a validated stable `lower` and flaky `upper`.
    pub fn bisect(lower: RunPoint, upper: RunPoint) -> Self {
        Self {
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    /// Exploration clamped at `lower`.
    pub fn floor(lower: RunPoint) -> Self {
        Self {
            lower: Some(lower),
            upper: None,
        }
    }
}

/// The answer to "what next?".
///
/// At most one field is set.  `next_run_point` asks the caller to sample
/// that run point and re-invoke; `culprit_run_point` is terminal; both
/// `None` is terminal with no findings (not reproducible, or the search
/// space is exhausted).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchResult {
    /// Run point to sample next, if the search is not done.
    pub next_run_point: Option<RunPoint>,
    /// Run point identified as having introduced the flakiness.
    pub culprit_run_point: Option<RunPoint>,
}

impl SearchResult {
    /// Non-terminal: sample `run_point` and re-invoke.
    pub fn next(run_point: RunPoint) -> Self {
        Self {
            next_run_point: Some(run_point),
            culprit_run_point: None,
        }
    }

    /// Terminal: `run_point` introduced the flakiness.
    pub fn culprit(run_point: RunPoint) -> Self {
        Self {
            next_run_point: None,
            culprit_run_point: Some(run_point),
        }
    }

    /// Terminal: nothing to report.
    pub fn no_findings() -> Self {
        Self {
            next_run_point: None,
            culprit_run_point: None,
        }
    }

    /// True if the search is over (culprit found or given up).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.next_run_point.is_none()
    }
}

/// Caller precondition violations.
///
/// These are programming errors in the caller, never retried internally and
/// never silently corrected.  Ambiguous signals, invalid artifacts and
/// nonexistent tests are *not* errors — they are ordinary
/// [`SearchResult`]/[`SearchNote`] outcomes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
    #[error(
        "flake thresholds must satisfy 0 <= lower < upper <= 1, got lower={lower}, upper={upper}"
    )]
    BadThresholds { lower: f64, upper: f64 },
    #[error("iteration budget must satisfy 1 <= base <= max, got base={base}, max={max}")]
    BadIterationBudget { base: u64, max: u64 },
    #[error("dive rate threshold must be in (0, 1], got {threshold}")]
    BadDiveThreshold { threshold: f64 },
    #[error("samples must be sorted by run point strictly descending (violated at index {index})")]
    UnsortedSamples { index: usize },
    #[error("pass rate at run point {run_point} out of [0, 1]: {rate}")]
    PassRateOutOfRange { run_point: RunPoint, rate: f64 },
    #[error("bisect bounds inverted: lower={lower} > upper={upper}")]
    InvertedBisectRange { lower: RunPoint, upper: RunPoint },
}

fn validate_samples(samples: &[Sample]) -> Result<(), SearchError> {
    for (i, pair) in samples.windows(2).enumerate() {
        if pair[1].run_point >= pair[0].run_point {
            return Err(SearchError::UnsortedSamples { index: i + 1 });
        }
    }
    for s in samples {
        if let PassRate::Rate(r) = s.pass_rate {
            if !r.is_finite() || !(0.0..=1.0).contains(&r) {
                return Err(SearchError::PassRateOutOfRange {
                    run_point: s.run_point,
                    rate: r,
                });
            }
        }
    }
    Ok(())
}

/// Decide what to sample next, or declare a verdict.
///
/// `samples` is the full history for this analysis, newest first.  See the
/// crate docs for the phase structure; [`next_run_point_explain`] returns
/// the same result plus an audit trail.
///
/// # Errors
///
/// Only on caller precondition violations ([`SearchError`]).
pub fn next_run_point(
    samples: &[Sample],
    cfg: &SearchConfig,
    bounds: SearchBounds,
) -> Result<SearchResult, SearchError> {
    next_run_point_explain(samples, cfg, bounds).map(|d| d.result)
}

/// Like [`next_run_point`], with typed notes explaining the decision.
pub fn next_run_point_explain(
    samples: &[Sample],
    cfg: &SearchConfig,
    bounds: SearchBounds,
) -> Result<SearchDecision, SearchError> {
    cfg.validate()?;
    validate_samples(samples)?;

    // Explicit bisect mode: both bounds validated by the caller.
    if let (Some(lower), Some(upper)) = (bounds.lower, bounds.upper) {
        let result = bisect(lower, upper)?;
        return Ok(SearchDecision {
            result,
            notes: vec![SearchNote::BisectRange { lower, upper }],
        });
    }

    let valid: Vec<&Sample> = samples.iter().filter(|s| s.valid_artifact).collect();
    let occupied: BTreeSet<RunPoint> = samples.iter().map(|s| s.run_point).collect();

    if valid.is_empty() {
        return Ok(SearchDecision::no_findings(NoFindingsReason::EmptySampleList));
    }

    let mut scan = StepScan::new();
    for (i, s) in valid.iter().enumerate() {
        match classify(s.pass_rate, cfg) {
            Stability::TestNotFound => {
                if scan.flakes_in_a_row() == 0 {
                    // Newly added and never flaky: nothing to chase.
                    return Ok(SearchDecision::no_findings(
                        NoFindingsReason::TestDoesNotExist,
                    ));
                }
                // The test was flaky at the next-younger sample and absent
                // here: the introduction commit is the culprit.  Bisect the
                // gap between "absent" and "exists and is flaky".
                let newer = valid[i - 1].run_point;
                let mut result = bisect(s.run_point, newer)?;
                let mut notes = vec![
                    SearchNote::TestIntroduction {
                        absent: s.run_point,
                        flaky: newer,
                    },
                    SearchNote::BisectRange {
                        lower: s.run_point,
                        upper: newer,
                    },
                ];
                if let Some(p) = result.next_run_point {
                    if occupied.contains(&p) {
                        // Only invalid-artifact samples can sit unclassified
                        // inside the gap; shift off them, or blame the
                        // youngest flaky point if nothing in between is
                        // buildable.
                        result = match shift_unoccupied(p, s.run_point + 1, newer, &occupied) {
                            Some(shifted) => {
                                notes.push(SearchNote::ShiftedOffOccupied {
                                    from: p,
                                    to: shifted,
                                });
                                SearchResult::next(shifted)
                            }
                            None => SearchResult::culprit(newer),
                        };
                    }
                }
                return Ok(SearchDecision { result, notes });
            }
            Stability::Stable => {
                if scan.flakes_in_a_row() == 0 {
                    // Stable at the newest sampled revision: the flakiness
                    // is not reproducible right now.
                    return Ok(SearchDecision::no_findings(
                        NoFindingsReason::NotReproducible,
                    ));
                }
                let flaky = valid[i - 1].run_point;
                let range_note = SearchNote::RegressionRange {
                    lower: s.run_point,
                    upper: flaky,
                };
                // A stable call at low iterations may be stable-by-luck.
                // Re-request the same run point with more iterations before
                // trusting it as the lower bound.
                if s.iterations < cfg.max_iterations_to_rerun {
                    let iterations = cfg.next_iterations(s.iterations);
                    return Ok(SearchDecision {
                        result: SearchResult::next(s.run_point),
                        notes: vec![
                            range_note,
                            SearchNote::ResampleForConvergence {
                                run_point: s.run_point,
                                iterations,
                            },
                        ],
                    });
                }
                let result = confirm_range(samples, cfg, s.run_point, flaky);
                return Ok(SearchDecision {
                    result,
                    notes: vec![
                        range_note,
                        SearchNote::SequentialConfirm {
                            lower: s.run_point,
                            flaky,
                        },
                    ],
                });
            }
            Stability::Flaky => {
                let rate = match s.pass_rate {
                    PassRate::Rate(r) => r,
                    PassRate::TestNotFound => unreachable!("classified flaky"),
                };
                if let StepAction::DivePlayedOut { streak } = scan.observe_flaky(rate, cfg) {
                    // Samples [i - streak + 1 ..= i] carried the dive.  The
                    // time-forward drop sits between the streak's newest
                    // sample and its younger neighbor.
                    let boundary = i + 1 - streak as usize;
                    let lower = valid[boundary].run_point;
                    let flaky = valid[boundary - 1].run_point;
                    let lower_rate = match valid[boundary].pass_rate {
                        PassRate::Rate(r) => r,
                        PassRate::TestNotFound => unreachable!("streak samples are flaky"),
                    };
                    let result = confirm_dive_range(samples, cfg, lower, lower_rate, flaky);
                    return Ok(SearchDecision {
                        result,
                        notes: vec![
                            SearchNote::DiveExhausted { streak },
                            SearchNote::SequentialConfirm { lower, flaky },
                        ],
                    });
                }
            }
        }
    }

    // Every known sample is flaky: probe further back.
    let oldest = valid[valid.len() - 1].run_point;
    let step = scan.step_size(cfg);
    let floor = bounds.lower.unwrap_or(0);
    let raw = oldest.saturating_sub(step);
    let mut next = raw.max(floor);

    let mut notes = vec![SearchNote::StepBack {
        from: oldest,
        step,
        flakes_in_a_row: scan.flakes_in_a_row(),
        mid_dive: scan.mid_dive(),
    }];
    if raw < floor {
        notes.push(SearchNote::ClampedToLowerBound { lower: floor });
    }

    if next == floor {
        if let Some(s) = sample_at(samples, floor) {
            if s.valid_artifact && classify(s.pass_rate, cfg) == Stability::Flaky {
                // Already flaky at the oldest allowed revision: nothing
                // older may be sampled, so the floor itself is to blame.
                notes.push(SearchNote::CulpritAtLowerBound { run_point: floor });
                return Ok(SearchDecision {
                    result: SearchResult::culprit(floor),
                    notes,
                });
            }
        }
    }

    if occupied.contains(&next) {
        match shift_unoccupied(next, floor, oldest, &occupied) {
            Some(shifted) => {
                notes.push(SearchNote::ShiftedOffOccupied {
                    from: next,
                    to: shifted,
                });
                next = shifted;
            }
            None => {
                notes.push(SearchNote::NoFindings {
                    reason: NoFindingsReason::SearchSpaceExhausted,
                });
                return Ok(SearchDecision {
                    result: SearchResult::no_findings(),
                    notes,
                });
            }
        }
    }

    Ok(SearchDecision {
        result: SearchResult::next(next),
        notes,
    })
}

/// Nearest unsampled run point to `candidate` within `[floor, oldest)`.
///
/// Prefers the older side (away from the explored range's edge), then falls
/// back to the younger side up to — but excluding — the oldest valid sample.
fn shift_unoccupied(
    candidate: RunPoint,
    floor: RunPoint,
    oldest: RunPoint,
    occupied: &BTreeSet<RunPoint>,
) -> Option<RunPoint> {
    for p in (floor..candidate).rev() {
        if !occupied.contains(&p) {
            return Some(p);
        }
    }
    for p in (candidate + 1)..oldest {
        if !occupied.contains(&p) {
            return Some(p);
        }
    }
    None
}
