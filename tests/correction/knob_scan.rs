use placetmachine::{
    correction::{CorrectionErrorKind, KnobScanConfig, iterate_knob, knob_scan},
    knob::{ApplyOptions, Strategy},
    lattice::Coordinate,
};

use crate::{ParabolicObservable, assert_close, y_knob};

#[tokio::test]
async fn given_iteration_then_every_point_is_measured_and_knob_is_restored() {
    let mut knob = y_knob(None);
    knob.apply(0.5, Strategy::Unquantized, &ApplyOptions::default())
        .expect("knob applies");
    let mut observable = ParabolicObservable::new(0.0);

    let points = iterate_knob(
        &mut knob,
        &mut observable,
        &[-1.0, 0.0, 1.0],
        Strategy::Unquantized,
        &ApplyOptions::default(),
    )
    .await
    .expect("iteration succeeds");

    assert_eq!(points.len(), 3);
    for (point, y) in points.iter().zip([-0.5, 0.5, 1.5]) {
        assert_close(point.applied, point.requested);
        assert_close(point.value, y * y + 1.0);
    }
    assert_eq!(observable.seen, vec![-0.5, 0.5, 1.5]);
    assert_close(knob.amplitude(), 0.5);
    assert_close(knob.elements()[0].get(Coordinate::Y), 0.5);
    assert!(!knob.has_cache());
}

#[tokio::test]
async fn given_failing_evaluation_then_iteration_stops_and_knob_is_restored() {
    let mut knob = y_knob(None);
    let mut observable = ParabolicObservable::new(0.0);
    observable.fail_on_call = Some(2);

    let err = iterate_knob(
        &mut knob,
        &mut observable,
        &[-1.0, 0.0, 1.0],
        Strategy::Unquantized,
        &ApplyOptions::default(),
    )
    .await
    .expect_err("second evaluation fails");

    assert_eq!(err.kind, CorrectionErrorKind::Simulator);
    assert_eq!(observable.seen.len(), 2);
    assert_eq!(knob.amplitude(), 0.0);
    assert_eq!(knob.elements()[0].get(Coordinate::Y), 0.0);
    assert!(!knob.has_cache());
}

#[tokio::test]
async fn given_empty_amplitudes_then_iteration_is_rejected() {
    let mut knob = y_knob(None);
    let mut observable = ParabolicObservable::new(0.0);
    let err = iterate_knob(
        &mut knob,
        &mut observable,
        &[],
        Strategy::Unquantized,
        &ApplyOptions::default(),
    )
    .await
    .expect_err("nothing to scan");
    assert_eq!(err.kind, CorrectionErrorKind::InvalidRequest);
    assert!(observable.seen.is_empty());
}

#[tokio::test]
async fn given_quantized_strategy_then_measured_offsets_sit_on_the_step_grid() {
    let mut knob = y_knob(Some(0.5));
    let mut observable = ParabolicObservable::new(0.0);

    iterate_knob(
        &mut knob,
        &mut observable,
        &[-0.9, -0.2, 0.3, 1.1],
        Strategy::Simple,
        &ApplyOptions::default(),
    )
    .await
    .expect("iteration succeeds");

    for y in &observable.seen {
        let steps = y / 0.5;
        assert_close(steps, steps.round());
    }
    assert_eq!(knob.elements()[0].get(Coordinate::Y), 0.0);
}

#[tokio::test]
async fn given_optimum_inside_range_then_scan_settles_there_in_one_pass() {
    let mut knob = y_knob(None);
    let mut observable = ParabolicObservable::new(0.3);
    let config = KnobScanConfig::new(vec![-1.0, -0.5, 0.0, 0.5, 1.0]);

    let result = knob_scan(&mut knob, &mut observable, &config)
        .await
        .expect("scan succeeds");

    assert_eq!(result.passes.len(), 1);
    assert!(result.converged());
    assert_close(result.knob_amplitude, 0.3);
    assert_close(knob.elements()[0].get(Coordinate::Y), 0.3);
    assert_close(result.value, 1.0);
    // Five scan points and one confirmation at the optimum.
    assert_eq!(observable.seen.len(), 6);
}

#[tokio::test]
async fn given_optimum_beyond_range_then_scan_walks_toward_it() {
    let mut knob = y_knob(None);
    let mut observable = ParabolicObservable::new(2.5);
    let config = KnobScanConfig::new(vec![-1.0, 0.0, 1.0]).with_max_rescans(3);

    let result = knob_scan(&mut knob, &mut observable, &config)
        .await
        .expect("scan succeeds");

    assert_eq!(result.passes.len(), 3);
    assert!(result.passes[0].fit.on_boundary);
    assert!(result.passes[1].fit.on_boundary);
    assert!(result.converged());
    assert_close(result.knob_amplitude, 2.5);
    assert_close(result.passes[2].applied, 0.5);
}

#[tokio::test]
async fn given_no_rescans_allowed_then_scan_stops_on_the_boundary() {
    let mut knob = y_knob(None);
    let mut observable = ParabolicObservable::new(2.5);
    let config = KnobScanConfig::new(vec![-1.0, 0.0, 1.0]);

    let result = knob_scan(&mut knob, &mut observable, &config)
        .await
        .expect("scan succeeds");

    assert_eq!(result.passes.len(), 1);
    assert!(!result.converged());
    assert_close(result.knob_amplitude, 1.0);
}

#[tokio::test]
async fn given_optimum_not_reevaluated_then_fitted_value_is_reported() {
    let mut knob = y_knob(None);
    let mut observable = ParabolicObservable::new(-0.25);
    let config = KnobScanConfig::new(vec![-1.0, 0.0, 1.0]).with_evaluate_optimum(false);

    let result = knob_scan(&mut knob, &mut observable, &config)
        .await
        .expect("scan succeeds");

    assert_eq!(observable.seen.len(), 3);
    assert_close(result.value, result.passes[0].fit.optimum_value);
    assert_close(result.value, 1.0);
    assert_close(result.knob_amplitude, -0.25);
}
