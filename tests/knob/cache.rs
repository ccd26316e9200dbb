use placetmachine::{
    knob::{ApplyOptions, Knob, KnobOptions, Strategy},
    lattice::Coordinate,
};

use crate::{assert_close, quad, spec};

fn knob() -> Knob {
    Knob::new(
        vec![quad("q1"), quad("q2")],
        vec![spec("y", 3.0, Some(1.0)), spec("y", 1.5, Some(1.0))],
        KnobOptions::named("cached"),
    )
    .expect("knob should build")
}

fn live_state(knob: &Knob) -> Vec<(f64, f64)> {
    knob.elements()
        .iter()
        .map(|element| (element.get(Coordinate::Y), element.mismatch(Coordinate::Y)))
        .collect()
}

#[test]
fn given_cached_state_when_uploaded_after_more_changes_then_state_is_restored_exactly() {
    let mut knob = knob();
    knob.apply(0.5, Strategy::SimpleMemory, &ApplyOptions::default())
        .expect("apply should succeed");
    knob.cache_state();
    let cached_snapshot = knob.snapshot();
    let cached_live = live_state(&knob);

    knob.apply(0.7, Strategy::MinScaleMemory, &ApplyOptions::default())
        .expect("apply should succeed");
    knob.reset();
    knob.apply(-1.3, Strategy::Simple, &ApplyOptions::default())
        .expect("apply should succeed");

    assert!(knob.upload_state_from_cache(true));

    assert_eq!(knob.snapshot(), cached_snapshot);
    for ((y, ledger), (cached_y, cached_ledger)) in live_state(&knob).into_iter().zip(cached_live) {
        assert_close(y, cached_y);
        assert_close(ledger, cached_ledger);
    }
    assert!(!knob.has_cache());
}

#[test]
fn given_cleared_cache_when_uploading_again_then_it_is_a_no_op() {
    let mut knob = knob();
    knob.cache_state();
    assert!(knob.upload_state_from_cache(true));

    knob.apply(0.5, Strategy::Simple, &ApplyOptions::default())
        .expect("apply should succeed");
    let before = knob.snapshot();
    let live_before = live_state(&knob);

    assert!(!knob.upload_state_from_cache(true));
    assert_eq!(knob.snapshot(), before);
    assert_eq!(live_state(&knob), live_before);
}

#[test]
fn given_kept_cache_when_uploaded_twice_then_both_uploads_restore() {
    let mut knob = knob();
    knob.cache_state();

    knob.apply(0.5, Strategy::Simple, &ApplyOptions::default())
        .expect("apply should succeed");
    assert!(knob.upload_state_from_cache(false));
    assert!(knob.has_cache());
    assert_close(knob.elements()[0].get(Coordinate::Y), 0.0);

    knob.apply(-0.5, Strategy::Simple, &ApplyOptions::default())
        .expect("apply should succeed");
    assert!(knob.upload_state_from_cache(false));
    assert_close(knob.elements()[1].get(Coordinate::Y), 0.0);
    assert_close(knob.amplitude(), 0.0);
}

#[test]
fn given_new_cache_when_cached_again_then_only_latest_generation_is_kept() {
    let mut knob = knob();
    knob.cache_state();
    knob.apply(0.5, Strategy::Simple, &ApplyOptions::default())
        .expect("apply should succeed");
    knob.cache_state();
    knob.apply(0.5, Strategy::Simple, &ApplyOptions::default())
        .expect("apply should succeed");

    assert!(knob.upload_state_from_cache(true));
    assert_close(knob.amplitude(), 0.5);
    assert_close(knob.elements()[0].get(Coordinate::Y), 2.0);
}
