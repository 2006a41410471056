//! Sequential ±1 confirmation between a stable lower and flaky upper bound.
//!
//! Exploration and dive detection localize the culprit to a bracket; this
//! walk nails it down.  Starting one past the stable side, each run point is
//! checked in turn: an unsampled point is requested, a point occupied by an
//! invalid artifact is stepped over toward the flaky side, a point already
//! sampled stable advances the walk, and the first point known flaky is the
//! culprit.  The walk reaches the flaky end in at most `flaky - lower` steps
//! and every revisit of the same sample list takes the same branch, so the
//! search strictly narrows across invocations.

use crate::{classify, sample_at, PassRate, RunPoint, Sample, SearchConfig, SearchResult, Stability};

/// Confirm a regression range `(lower, flaky)` one run point at a time.
///
/// `lower` must be a known-stable run point and `flaky` a known-flaky one
/// with `lower < flaky`.  Adjacent bounds are terminal: the flaky side is
/// the culprit.
#[must_use]
pub fn confirm_range(
    samples: &[Sample],
    cfg: &SearchConfig,
    lower: RunPoint,
    flaky: RunPoint,
) -> SearchResult {
    debug_assert!(lower < flaky, "range must be ordered: {lower} < {flaky}");
    let mut candidate = lower + 1;
    while candidate < flaky {
        match sample_at(samples, candidate) {
            None => return SearchResult::next(candidate),
            Some(s) if !s.valid_artifact => candidate += 1,
            Some(s) => match classify(s.pass_rate, cfg) {
                Stability::Flaky => return SearchResult::culprit(candidate),
                // Stable (or the test is absent): the first flaky run point
                // lies past this one.
                _ => candidate += 1,
            },
        }
    }
    SearchResult::culprit(flaky)
}

/// Confirm a played-out dive `(lower, flaky)` one run point at a time.
///
/// After a dive both sides of the drop usually classify flaky — the pre-drop
/// regime is merely *less* flaky — so the boundary test compares pass rates
/// against the dive's own threshold instead of the stable/flaky bands:
/// the culprit is the first walked run point whose rate sits more than
/// `dive_rate_threshold` below `lower_rate`, the rate observed at `lower`.
#[must_use]
pub fn confirm_dive_range(
    samples: &[Sample],
    cfg: &SearchConfig,
    lower: RunPoint,
    lower_rate: f64,
    flaky: RunPoint,
) -> SearchResult {
    debug_assert!(lower < flaky, "range must be ordered: {lower} < {flaky}");
    let mut candidate = lower + 1;
    while candidate < flaky {
        match sample_at(samples, candidate) {
            None => return SearchResult::next(candidate),
            Some(s) if !s.valid_artifact => candidate += 1,
            Some(s) => match s.pass_rate {
                PassRate::Rate(r) if lower_rate - r > cfg.dive_rate_threshold => {
                    return SearchResult::culprit(candidate);
                }
                // Still on the pre-drop side (or the test is absent here).
                _ => candidate += 1,
            },
        }
    }
    SearchResult::culprit(flaky)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SearchConfig {
        SearchConfig::default()
    }

    #[test]
    fn adjacent_bounds_blame_the_flaky_side() {
        let samples = vec![Sample::rate(101, 0.5, 800), Sample::rate(100, 1.0, 800)];
        assert_eq!(
            confirm_range(&samples, &cfg(), 100, 101),
            SearchResult::culprit(101)
        );
    }

    #[test]
    fn wide_range_requests_one_past_the_stable_side() {
        let samples = vec![Sample::rate(105, 0.5, 800), Sample::rate(100, 1.0, 800)];
        assert_eq!(
            confirm_range(&samples, &cfg(), 100, 105),
            SearchResult::next(101)
        );
    }

    #[test]
    fn invalid_artifact_shifts_toward_the_flaky_side() {
        let samples = vec![
            Sample::rate(105, 0.5, 800),
            Sample::invalid_artifact(101),
            Sample::rate(100, 1.0, 800),
        ];
        assert_eq!(
            confirm_range(&samples, &cfg(), 100, 105),
            SearchResult::next(102)
        );
    }

    #[test]
    fn sampled_stable_point_advances_the_walk() {
        let samples = vec![
            Sample::rate(105, 0.5, 800),
            Sample::rate(101, 1.0, 800),
            Sample::rate(100, 1.0, 800),
        ];
        assert_eq!(
            confirm_range(&samples, &cfg(), 100, 105),
            SearchResult::next(102)
        );
    }

    #[test]
    fn sampled_flaky_point_is_the_culprit() {
        let samples = vec![
            Sample::rate(105, 0.5, 800),
            Sample::rate(102, 0.4, 800),
            Sample::rate(101, 1.0, 800),
            Sample::rate(100, 1.0, 800),
        ];
        assert_eq!(
            confirm_range(&samples, &cfg(), 100, 105),
            SearchResult::culprit(102)
        );
    }

    #[test]
    fn dive_walk_requests_unsampled_points() {
        let samples = vec![Sample::rate(204, 0.08, 100), Sample::rate(195, 0.9, 100)];
        assert_eq!(
            confirm_dive_range(&samples, &cfg(), 195, 0.9, 204),
            SearchResult::next(196)
        );
    }

    #[test]
    fn dive_walk_blames_the_first_dropped_point() {
        // 197 is still pre-drop (high rate); 198 dropped.
        let samples = vec![
            Sample::rate(204, 0.08, 100),
            Sample::rate(198, 0.10, 100),
            Sample::rate(197, 0.88, 100),
            Sample::rate(195, 0.9, 100),
        ];
        assert_eq!(
            confirm_dive_range(&samples, &cfg(), 195, 0.9, 204),
            SearchResult::next(196)
        );
        let samples = vec![
            Sample::rate(204, 0.08, 100),
            Sample::rate(198, 0.10, 100),
            Sample::rate(197, 0.88, 100),
            Sample::rate(196, 0.9, 100),
            Sample::rate(195, 0.9, 100),
        ];
        assert_eq!(
            confirm_dive_range(&samples, &cfg(), 195, 0.9, 204),
            SearchResult::culprit(198)
        );
    }

    #[test]
    fn adjacent_dive_bounds_blame_the_dropped_side() {
        let samples = vec![Sample::rate(200, 0.08, 100), Sample::rate(199, 0.9, 100)];
        assert_eq!(
            confirm_dive_range(&samples, &cfg(), 199, 0.9, 200),
            SearchResult::culprit(200)
        );
    }

    #[test]
    fn fully_occupied_gap_falls_through_to_the_flaky_bound() {
        // Everything strictly inside the range is invalid or stable, so the
        // flaky bound itself is the first flaky run point.
        let samples = vec![
            Sample::rate(103, 0.5, 800),
            Sample::invalid_artifact(102),
            Sample::rate(101, 1.0, 800),
            Sample::rate(100, 1.0, 800),
        ];
        assert_eq!(
            confirm_range(&samples, &cfg(), 100, 103),
            SearchResult::culprit(103)
        );
    }
}
