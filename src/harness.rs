//! Harness-oriented glue: drive a search to its verdict.
//!
//! The surrounding pipeline re-invokes [`next_run_point`] after each sample
//! lands; this helper is that loop, extracted so harnesses, simulations and
//! integration tests share *exact* re-invocation semantics (sample
//! recording, convergence resampling, bisect-bound narrowing) without
//! re-implementing glue.
//!
//! The sampler callback stands in for the test-execution subsystem: given a
//! run point and an iteration count, it reruns the test there and returns
//! the recorded [`Sample`].  Everything else — what to sample, when to stop
//! — is the library's decision.

use crate::{
    classify, latest_regression_range, next_run_point_explain, sample_at, RegressionRange,
    RunPoint, Sample, SearchBounds, SearchConfig, SearchError, Stability,
};

/// Terminal outcome of a driven search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DriveVerdict {
    /// The culprit run point was identified.
    Culprit(RunPoint),
    /// The search gave up: not reproducible, or nothing left to sample.
    NoFindings,
    /// The round budget ran out before the search terminated.
    RoundBudgetExhausted,
}

/// Report of a driven search.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DriveReport {
    /// How the search ended.
    pub verdict: DriveVerdict,
    /// Sampler invocations spent (the expensive unit).
    pub rounds: u64,
    /// The final sample list, newest first.
    pub samples: Vec<Sample>,
    /// The latest regression range at the end of the search.
    pub regression_range: RegressionRange,
}

/// Drive a search to a terminal verdict, sampling via `sampler`.
///
/// `initial` seeds the history (any order; it is normalized to newest
/// first).  In bisect mode ([`SearchBounds::bisect`]) the driver narrows the
/// bounds after each sample the way the surrounding pipeline would: a stable
/// sample raises the lower bound, a flaky one lowers the upper bound, a
/// revision without the test raises the lower bound, and an unusable build
/// is probed past toward the flaky side.
///
/// # Errors
///
/// Propagates precondition violations from [`next_run_point`]; a sampler
/// returning a sample for the wrong run point is a debug assertion.
///
/// [`next_run_point`]: crate::next_run_point
pub fn drive_search<F>(
    initial: Vec<Sample>,
    cfg: &SearchConfig,
    bounds: SearchBounds,
    max_rounds: u64,
    mut sampler: F,
) -> Result<DriveReport, SearchError>
where
    F: FnMut(RunPoint, u64) -> Sample,
{
    let mut samples = initial;
    samples.sort_by(|a, b| b.run_point.cmp(&a.run_point));

    let bisect_mode = bounds.lower.is_some() && bounds.upper.is_some();
    let mut bounds = bounds;
    let mut rounds = 0u64;

    let verdict = loop {
        let decision = next_run_point_explain(&samples, cfg, bounds)?;
        let Some(point) = decision.result.next_run_point else {
            break match decision.result.culprit_run_point {
                Some(culprit) => DriveVerdict::Culprit(culprit),
                None => DriveVerdict::NoFindings,
            };
        };

        let iterations = decision
            .requested_iterations()
            .unwrap_or(cfg.iterations_to_rerun);

        let mut probe = point;
        let recorded = loop {
            if rounds >= max_rounds {
                break None;
            }
            rounds += 1;
            let sample = sampler(probe, iterations);
            debug_assert_eq!(sample.run_point, probe, "sampler answered the wrong run point");
            record(&mut samples, sample);
            if sample.valid_artifact || !bisect_mode {
                // Exploration shifts off occupied positions by itself on the
                // next invocation; only bisect mode needs a usable probe now.
                break Some(sample);
            }
            let upper = bounds.upper.expect("bisect mode");
            probe += 1;
            while probe < upper && sample_at(&samples, probe).is_some() {
                probe += 1;
            }
            if probe >= upper {
                // Nothing usable strictly inside the range: the bounds are
                // adjacent in practice and the next round blames the upper.
                bounds.lower = Some(upper - 1);
                break Some(sample);
            }
        };
        let Some(sample) = recorded else {
            break DriveVerdict::RoundBudgetExhausted;
        };

        if bisect_mode && sample.valid_artifact {
            match classify(sample.pass_rate, cfg) {
                Stability::Flaky => bounds.upper = Some(sample.run_point),
                // Stable, or the test does not exist yet: the culprit is
                // above this revision.
                _ => bounds.lower = Some(sample.run_point),
            }
        }
    };

    let regression_range = latest_regression_range(&samples, cfg);
    Ok(DriveReport {
        verdict,
        rounds,
        samples,
        regression_range,
    })
}

/// Record a sample, replacing any previous sample at the same run point
/// (convergence resamples supersede the low-iteration measurement).
fn record(samples: &mut Vec<Sample>, sample: Sample) {
    match samples.iter().position(|s| s.run_point == sample.run_point) {
        Some(i) => samples[i] = sample,
        None => {
            let at = samples
                .iter()
                .position(|s| s.run_point < sample.run_point)
                .unwrap_or(samples.len());
            samples.insert(at, sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SearchConfig {
        SearchConfig::default()
    }

    /// Noise-free world: stable below `culprit`, 50% flaky at and above it.
    fn world(culprit: RunPoint) -> impl FnMut(RunPoint, u64) -> Sample {
        move |p, iters| {
            if p >= culprit {
                Sample::rate(p, 0.5, iters)
            } else {
                Sample::rate(p, 1.0, iters)
            }
        }
    }

    #[test]
    fn exploration_drive_finds_the_culprit() {
        let initial = vec![Sample::rate(120, 0.5, 100)];
        let report = drive_search(initial, &cfg(), SearchBounds::default(), 200, world(103))
            .unwrap();
        assert_eq!(report.verdict, DriveVerdict::Culprit(103));
        assert_eq!(report.regression_range.lower, Some(102));
        assert!(report.rounds > 0);
    }

    #[test]
    fn bisect_drive_finds_the_culprit() {
        let report = drive_search(
            Vec::new(),
            &cfg(),
            SearchBounds::bisect(100, 160),
            200,
            world(141),
        )
        .unwrap();
        assert_eq!(report.verdict, DriveVerdict::Culprit(141));
        // Binary search: well under the 60-revision span.
        assert!(report.rounds <= 8, "rounds={}", report.rounds);
    }

    #[test]
    fn bisect_drive_steps_past_unusable_builds() {
        let mut base = world(141);
        let report = drive_search(
            Vec::new(),
            &cfg(),
            SearchBounds::bisect(100, 160),
            200,
            move |p, iters| {
                if p == 130 || p == 140 {
                    Sample::invalid_artifact(p)
                } else {
                    base(p, iters)
                }
            },
        )
        .unwrap();
        assert_eq!(report.verdict, DriveVerdict::Culprit(141));
    }

    #[test]
    fn stable_world_reports_no_findings() {
        let initial = vec![Sample::rate(120, 1.0, 800)];
        let report =
            drive_search(initial, &cfg(), SearchBounds::default(), 50, |p, iters| {
                Sample::rate(p, 1.0, iters)
            })
            .unwrap();
        assert_eq!(report.verdict, DriveVerdict::NoFindings);
        assert_eq!(report.rounds, 0);
    }

    #[test]
    fn budget_exhaustion_is_reported() {
        let initial = vec![Sample::rate(1_000_000, 0.5, 100)];
        let report = drive_search(initial, &cfg(), SearchBounds::default(), 3, world(10))
            .unwrap();
        assert_eq!(report.verdict, DriveVerdict::RoundBudgetExhausted);
        assert_eq!(report.rounds, 3);
    }

    #[test]
    fn record_replaces_same_run_point() {
        let mut samples = vec![Sample::rate(101, 0.5, 100), Sample::rate(100, 1.0, 100)];
        record(&mut samples, Sample::rate(100, 1.0, 200));
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].iterations, 200);
        record(&mut samples, Sample::rate(99, 0.5, 100));
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[2].run_point, 99);
    }
}
