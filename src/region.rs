//! Regression-range scanning: the latest adjacent stable→flaky transition.
//!
//! This is the reporting surface of the search: the pipeline surfaces the
//! current range on dashboards and bug comments while the search narrows it.
//! The orchestrator tracks the same boundary internally during its scan; the
//! scanner here is the standalone, whole-list view.

use crate::{classify, RunPoint, Sample, SearchConfig, Stability};

/// The most recently observed adjacent (stable, flaky) pair of run points.
///
/// Either side may be unset: `lower` alone means the flakiness looks
/// unreproducible (a stable point with no flaky point above it), `upper`
/// alone means no stable lower bound has been found yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegressionRange {
    /// Latest run point classified stable, if any.
    pub lower: Option<RunPoint>,
    /// Earliest subsequent run point classified flaky, if any.
    pub upper: Option<RunPoint>,
}

/// Scan a newest-first sample list for the latest regression range.
///
/// Samples with invalid artifacts and test-not-found samples are skipped
/// before pairing; only stable/flaky classifications participate.
///
/// Edge cases, in priority order:
/// 1. no classifiable samples → both sides unset;
/// 2. a single sample → that side of the range alone;
/// 3. every sample flaky → `(None, oldest)` — sample further back;
/// 4. first stable sample found at the newest position → `(newest, None)`;
/// 5. otherwise the first stable sample and its younger neighbor.
#[must_use]
pub fn latest_regression_range(samples: &[Sample], cfg: &SearchConfig) -> RegressionRange {
    let points: Vec<(RunPoint, Stability)> = samples
        .iter()
        .filter(|s| s.valid_artifact)
        .map(|s| (s.run_point, classify(s.pass_rate, cfg)))
        .filter(|(_, c)| *c != Stability::TestNotFound)
        .collect();

    let Some(&(newest, newest_class)) = points.first() else {
        return RegressionRange::default();
    };

    if points.len() == 1 {
        return match newest_class {
            Stability::Stable => RegressionRange {
                lower: Some(newest),
                upper: None,
            },
            _ => RegressionRange {
                lower: None,
                upper: Some(newest),
            },
        };
    }

    let latest_stable = points.iter().position(|(_, c)| *c == Stability::Stable);
    match latest_stable {
        // All flaky: no lower bound yet; the oldest point is the best upper.
        None => RegressionRange {
            lower: None,
            upper: Some(points[points.len() - 1].0),
        },
        // Stable at the newest position: nothing flaky above it.
        Some(0) => RegressionRange {
            lower: Some(newest),
            upper: None,
        },
        Some(i) => RegressionRange {
            lower: Some(points[i].0),
            upper: Some(points[i - 1].0),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SearchConfig {
        SearchConfig::default()
    }

    #[test]
    fn empty_list_has_no_range() {
        assert_eq!(latest_regression_range(&[], &cfg()), RegressionRange::default());
    }

    #[test]
    fn single_stable_sample_is_lower_only() {
        let samples = vec![Sample::rate(100, 1.0, 100)];
        assert_eq!(
            latest_regression_range(&samples, &cfg()),
            RegressionRange {
                lower: Some(100),
                upper: None
            }
        );
    }

    #[test]
    fn single_flaky_sample_is_upper_only() {
        let samples = vec![Sample::rate(100, 0.5, 100)];
        assert_eq!(
            latest_regression_range(&samples, &cfg()),
            RegressionRange {
                lower: None,
                upper: Some(100)
            }
        );
    }

    #[test]
    fn all_flaky_reports_oldest_as_upper() {
        let samples = vec![
            Sample::rate(100, 0.5, 100),
            Sample::rate(98, 0.4, 100),
            Sample::rate(95, 0.6, 100),
        ];
        assert_eq!(
            latest_regression_range(&samples, &cfg()),
            RegressionRange {
                lower: None,
                upper: Some(95)
            }
        );
    }

    #[test]
    fn adjacent_pair_is_the_latest_one() {
        // Two stable→flaky transitions; only the newest pair counts.
        let samples = vec![
            Sample::rate(110, 0.5, 100),
            Sample::rate(105, 1.0, 100),
            Sample::rate(103, 0.5, 100),
            Sample::rate(100, 1.0, 100),
        ];
        assert_eq!(
            latest_regression_range(&samples, &cfg()),
            RegressionRange {
                lower: Some(105),
                upper: Some(110)
            }
        );
    }

    #[test]
    fn stable_at_newest_position_has_no_upper() {
        let samples = vec![Sample::rate(110, 1.0, 100), Sample::rate(105, 0.5, 100)];
        assert_eq!(
            latest_regression_range(&samples, &cfg()),
            RegressionRange {
                lower: Some(110),
                upper: None
            }
        );
    }

    #[test]
    fn invalid_artifacts_and_missing_tests_are_skipped() {
        let samples = vec![
            Sample::rate(110, 0.5, 100),
            Sample::invalid_artifact(108),
            Sample::test_not_found(107),
            Sample::rate(105, 1.0, 100),
        ];
        assert_eq!(
            latest_regression_range(&samples, &cfg()),
            RegressionRange {
                lower: Some(105),
                upper: Some(110)
            }
        );
    }
}
