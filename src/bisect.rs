//! Binary search between validated stable/flaky bounds.
//!
//! Used when the caller can build and test *any* revision directly (try-job
//! style analyses, unlike build-number analyses constrained to existing
//! archived builds), and internally to localize a test's introduction
//! commit.  The midpoint is biased toward the older revision on odd spans,
//! so the stable side shrinks first.

use crate::{RunPoint, SearchError, SearchResult};

/// Floor midpoint of `[lower, upper]`, biased toward `lower`.
#[must_use]
pub fn bisect_point(lower: RunPoint, upper: RunPoint) -> RunPoint {
    debug_assert!(lower <= upper);
    lower + (upper - lower) / 2
}

/// One bisection step between a validated stable `lower` and flaky `upper`.
///
/// A midpoint equal to `lower` means the range cannot narrow further: the
/// bounds are adjacent and `upper` is the culprit.
///
/// # Errors
///
/// [`SearchError::InvertedBisectRange`] if `upper < lower`.
pub fn bisect(lower: RunPoint, upper: RunPoint) -> Result<SearchResult, SearchError> {
    if upper < lower {
        return Err(SearchError::InvertedBisectRange { lower, upper });
    }
    let midpoint = bisect_point(lower, upper);
    if midpoint == lower {
        return Ok(SearchResult::culprit(upper));
    }
    Ok(SearchResult::next(midpoint))
}
