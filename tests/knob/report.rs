use placetmachine::{
    knob::{ApplyOptions, Knob, KnobOptions, Strategy},
    lattice::{Beamline, Coordinate, Element, ElementType},
};

use crate::{assert_close, quad, spec};

#[test]
fn given_placed_elements_when_reported_then_rows_carry_position_and_mismatch() {
    let mut beamline = Beamline::new("test");
    let q1 = beamline.append(Element::quadrupole().with_name("QF1").with_length(0.5), true);
    beamline.append(Element::new(ElementType::Drift).with_length(2.0), false);
    let q2 = beamline.append(Element::quadrupole().with_name("QD1").with_length(0.5), true);

    let mut knob = Knob::new(
        vec![q1, q2],
        vec![spec("y", 3.0, Some(1.0)), spec("y", 1.5, None)],
        KnobOptions::named("report"),
    )
    .expect("knob should build");
    knob.apply(0.5, Strategy::Simple, &ApplyOptions::default())
        .expect("apply should succeed");

    let report = knob.report();
    assert_eq!(report.knob, "report");
    assert_close(report.amplitude, 0.5);
    assert_eq!(report.rows.len(), 2);

    let first = &report.rows[0];
    assert_eq!(first.name, "QF1");
    assert_eq!(first.element_type, ElementType::Quadrupole);
    assert_eq!(first.girder.as_deref(), Some("1"));
    assert_close(first.s.expect("placed element has s"), 0.5);
    let y = &first.coordinates[&Coordinate::Y];
    assert_eq!(y.step_size, Some(1.0));
    assert_close(y.value, 2.0);
    assert_close(y.change, 2.0);
    assert_close(y.mismatch, -0.5);
    assert_close(y.total_mismatch, -0.5);

    let second = &report.rows[1];
    assert_eq!(second.girder.as_deref(), Some("2"));
    assert_close(second.s.expect("placed element has s"), 3.0);
    assert_eq!(second.coordinates[&Coordinate::Y].step_size, None);
    assert_close(second.coordinates[&Coordinate::Y].value, 0.75);
}

#[test]
fn given_loose_element_when_reported_then_placement_is_empty_and_table_uses_placeholders() {
    let knob = Knob::new(
        vec![quad("loose")],
        vec![spec("x", 1.0, None)],
        KnobOptions::named("loose-knob"),
    )
    .expect("knob should build");

    let report = knob.report();
    assert_eq!(report.rows[0].girder, None);
    assert_eq!(report.rows[0].s, None);

    let table = report.to_string();
    assert!(table.starts_with("Knob 'loose-knob'"));
    assert!(table.contains("loose"));
    assert!(table.contains(" - "));

    let json = serde_json::to_value(&report).expect("report serializes");
    assert_eq!(json["rows"][0]["coordinates"]["x"]["amplitude"], 1.0);
}
