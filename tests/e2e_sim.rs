//! Seeded end-to-end simulations: drive the search against synthetic
//! flakiness profiles with sampling noise and check it lands on the planted
//! culprit.

use flakeseek::{drive_search, DriveVerdict, RunPoint, Sample, SearchBounds, SearchConfig};
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

/// Empirical pass rate of `iters` Bernoulli(p) reruns.
fn observed_rate(rng: &mut StdRng, p: f64, iters: u64) -> f64 {
    let mut passes = 0u64;
    for _ in 0..iters {
        if rng.random::<f64>() < p {
            passes += 1;
        }
    }
    passes as f64 / iters.max(1) as f64
}

#[test]
fn noisy_regression_is_localized_exactly() {
    let culprit: RunPoint = 5_137;
    let cfg = SearchConfig::default();
    let mut rng = StdRng::seed_from_u64(0xF1A_7E57);

    let initial = vec![Sample::rate(5_200, 0.5, cfg.iterations_to_rerun)];
    let report = drive_search(
        initial,
        &cfg,
        SearchBounds::default(),
        500,
        |p, iters| {
            // Perfectly stable before the culprit, a true 55% pass rate after.
            let true_p = if p >= culprit { 0.55 } else { 1.0 };
            Sample::rate(p, observed_rate(&mut rng, true_p, iters), iters)
        },
    )
    .unwrap();

    assert_eq!(report.verdict, DriveVerdict::Culprit(culprit));
    assert_eq!(report.regression_range.lower, Some(culprit - 1));
    assert_eq!(report.regression_range.upper, Some(culprit));
}

#[test]
fn noisy_dive_is_localized_exactly() {
    // Flaky on both sides of the culprit — only the *rate* changes, from a
    // mildly flaky 0.92 to a heavily failing 0.10.  Only dive detection can
    // localize this; there is no stable revision anywhere.
    let culprit: RunPoint = 9_421;
    let cfg = SearchConfig::default();
    let mut rng = StdRng::seed_from_u64(0xD1F7);

    let initial = vec![Sample::rate(9_460, 0.12, cfg.iterations_to_rerun)];
    let report = drive_search(
        initial,
        &cfg,
        SearchBounds::default(),
        500,
        |p, iters| {
            let true_p = if p >= culprit { 0.10 } else { 0.92 };
            Sample::rate(p, observed_rate(&mut rng, true_p, iters), iters)
        },
    )
    .unwrap();

    assert_eq!(report.verdict, DriveVerdict::Culprit(culprit));
}

#[test]
fn stable_test_is_not_reproducible() {
    let cfg = SearchConfig::default();
    let mut rng = StdRng::seed_from_u64(42);
    let rate = observed_rate(&mut rng, 1.0, 800);
    let initial = vec![Sample::rate(7_000, rate, 800)];

    let report = drive_search(initial, &cfg, SearchBounds::default(), 50, |p, iters| {
        Sample::rate(p, 1.0, iters)
    })
    .unwrap();

    assert_eq!(report.verdict, DriveVerdict::NoFindings);
    assert_eq!(report.rounds, 0);
}

#[test]
fn test_introduced_flaky_is_blamed_on_its_introduction() {
    // The test lands at `intro` already flaky; older revisions don't have it.
    let intro: RunPoint = 3_310;
    let cfg = SearchConfig::default();
    let mut rng = StdRng::seed_from_u64(0xB0B);

    let initial = vec![Sample::rate(3_350, 0.5, cfg.iterations_to_rerun)];
    let report = drive_search(
        initial,
        &cfg,
        SearchBounds::default(),
        500,
        |p, iters| {
            if p >= intro {
                Sample::rate(p, observed_rate(&mut rng, 0.5, iters), iters)
            } else {
                Sample::test_not_found(p)
            }
        },
    )
    .unwrap();

    assert_eq!(report.verdict, DriveVerdict::Culprit(intro));
}
