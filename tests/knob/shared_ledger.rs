use placetmachine::{
    knob::{ApplyOptions, Knob, KnobOptions, Strategy},
    lattice::Coordinate,
};

use crate::{assert_close, quad, spec};

#[test]
fn given_two_knobs_on_one_mover_when_memory_is_global_then_other_knobs_rounding_is_used() {
    let shared = quad("shared");
    let mut first = Knob::new(
        vec![shared.clone()],
        vec![spec("y", 1.0, Some(1.0))],
        KnobOptions::named("first"),
    )
    .expect("knob should build");
    let mut second = Knob::new(
        vec![shared.clone()],
        vec![spec("y", 1.0, Some(1.0))],
        KnobOptions::named("second"),
    )
    .expect("knob should build");

    first
        .apply(0.4, Strategy::Simple, &ApplyOptions::default())
        .expect("apply should succeed");
    assert_close(shared.get(Coordinate::Y), 0.0);
    assert_close(shared.mismatch(Coordinate::Y), 0.4);

    second
        .apply(0.2, Strategy::SimpleMemory, &ApplyOptions::default())
        .expect("apply should succeed");
    assert_close(shared.get(Coordinate::Y), 1.0);
    assert_close(second.variables()[0][&Coordinate::Y].mismatch, -0.8);
    assert_close(shared.mismatch(Coordinate::Y), -0.4);
}

#[test]
fn given_two_knobs_on_one_mover_when_memory_is_local_then_only_own_rounding_is_used() {
    let shared = quad("shared");
    let mut first = Knob::new(
        vec![shared.clone()],
        vec![spec("y", 1.0, Some(1.0))],
        KnobOptions::named("first"),
    )
    .expect("knob should build");
    let mut second = Knob::new(
        vec![shared.clone()],
        vec![spec("y", 1.0, Some(1.0))],
        KnobOptions::named("second"),
    )
    .expect("knob should build");

    first
        .apply(0.4, Strategy::Simple, &ApplyOptions::default())
        .expect("apply should succeed");
    second
        .apply(0.2, Strategy::SimpleMemory, &ApplyOptions::local_mismatch())
        .expect("apply should succeed");

    assert_close(shared.get(Coordinate::Y), 0.0);
    assert_close(shared.mismatch(Coordinate::Y), 0.6);
}

#[test]
fn given_shared_element_then_ledger_is_sum_of_knob_contributions_net_of_resets() {
    let shared = quad("shared");
    let other = quad("other");
    let mut first = Knob::new(
        vec![shared.clone()],
        vec![spec("y", 0.7, Some(0.25))],
        KnobOptions::named("first"),
    )
    .expect("knob should build");
    let mut second = Knob::new(
        vec![other.clone(), shared.clone()],
        vec![spec("y", 2.0, Some(0.5)), spec("y", -1.3, Some(0.25))],
        KnobOptions::named("second"),
    )
    .expect("knob should build");

    let contribution = |knob: &Knob| {
        knob.elements()
            .iter()
            .zip(knob.variables())
            .filter(|(element, _)| element.ptr_eq(&shared))
            .map(|(_, variables)| variables[&Coordinate::Y].mismatch)
            .sum::<f64>()
    };

    let steps = [
        (0.3, Strategy::SimpleMemory),
        (-0.45, Strategy::MinScaleMemory),
        (0.9, Strategy::Simple),
        (0.12, Strategy::SimpleMemory),
    ];
    for (amplitude, strategy) in steps {
        first
            .apply(amplitude, strategy, &ApplyOptions::default())
            .expect("apply should succeed");
        second
            .apply(-amplitude, strategy, &ApplyOptions::default())
            .expect("apply should succeed");
        assert_close(
            shared.mismatch(Coordinate::Y),
            contribution(&first) + contribution(&second),
        );
    }

    first.reset();
    assert_close(shared.mismatch(Coordinate::Y), contribution(&second));
    second.reset();
    assert_close(shared.mismatch(Coordinate::Y), 0.0);
}
