use placetmachine::lattice::{
    Beamline, Coordinate, Element, ElementType, LatticeErrorKind, Offsets,
};

use crate::assert_close;

fn two_girder_line() -> Beamline {
    let mut beamline = Beamline::new("line");
    beamline.append(Element::quadrupole().with_name("QF").with_length(0.5), true);
    beamline.append(Element::new(ElementType::Drift).with_name("D").with_length(1.5), false);
    beamline.append(Element::quadrupole().with_name("QD").with_length(0.5), true);
    beamline.append(Element::cavity().with_name("CAV").with_length(1.0), false);
    beamline
}

#[test]
fn given_appended_elements_then_positions_indices_and_girders_follow_order() {
    let beamline = two_girder_line();

    let expected = [("QF", 0.5, 1), ("D", 2.0, 1), ("QD", 2.5, 2), ("CAV", 3.5, 2)];
    for (i, (name, s, girder)) in expected.into_iter().enumerate() {
        let element = beamline.get(i).expect("element exists").borrow();
        assert_eq!(element.name, name);
        assert_eq!(element.index, Some(i));
        assert_eq!(element.girder, Some(girder));
        assert_close(element.s, s);
    }
    assert_eq!(beamline.girders_number(), 2);
    assert_eq!(beamline.girder(2).expect("girder 2").name, "2");
    assert!(beamline.girder(0).is_none());
}

#[test]
fn given_appended_element_then_beamline_owns_a_copy() {
    let mut beamline = Beamline::new("line");
    let template = Element::quadrupole().with_name("Q");
    let first = beamline.append(template.clone(), true);
    let second = beamline.append(template, false);

    first.set(Coordinate::Y, 3.0);
    assert_eq!(second.get(Coordinate::Y), 0.0);
    assert!(!first.ptr_eq(&second));
}

#[test]
fn given_loose_elements_when_new_girder_requested_then_element_stays_loose() {
    let mut beamline = Beamline::new("line");
    beamline.append(Element::quadrupole().with_name("Q1"), false);
    let second = beamline.append(Element::quadrupole().with_name("Q2"), true);

    assert_eq!(beamline.girders_number(), 0);
    assert_eq!(second.borrow().girder, None);
}

#[test]
fn given_replaced_element_then_girder_and_position_are_kept() {
    let mut beamline = two_girder_line();
    let old = beamline.get(2).expect("QD").clone();

    let new = beamline
        .replace(2, Element::quadrupole().with_name("QD-new").with_length(0.7))
        .expect("index in range");

    assert_eq!(new.borrow().girder, Some(2));
    assert_eq!(new.borrow().index, Some(2));
    assert_close(new.borrow().s, 2.5);
    let girder = beamline.girder(2).expect("girder 2");
    assert!(girder.contains(&new));
    assert!(!girder.contains(&old));
    assert!(!beamline.contains(&old));

    let err = beamline
        .replace(10, Element::quadrupole())
        .expect_err("index out of range");
    assert_eq!(err.kind, LatticeErrorKind::InvalidRequest);
}

#[test]
fn given_misalignments_then_offsets_accumulate_and_realign_clears_them() {
    let mut beamline = two_girder_line();
    let shift = Offsets {
        y: 1.0,
        x: -0.5,
        ..Offsets::default()
    };

    beamline.misalign_girder(2, &shift).expect("girder exists");
    beamline.misalign_element(2, &shift).expect("element exists");
    assert_close(beamline.get(2).expect("QD").get(Coordinate::Y), 2.0);
    assert_close(beamline.get(3).expect("CAV").get(Coordinate::Y), 1.0);
    assert_close(beamline.get(0).expect("QF").get(Coordinate::Y), 0.0);

    beamline.realign_elements(Some(&[Coordinate::Y]));
    assert_close(beamline.get(2).expect("QD").get(Coordinate::Y), 0.0);
    assert_close(beamline.get(2).expect("QD").get(Coordinate::X), -1.0);

    beamline.realign_elements(None);
    assert_eq!(beamline.get(2).expect("QD").borrow().offsets, Offsets::default());

    assert_eq!(
        beamline.misalign_girder(3, &shift).expect_err("no girder 3").kind,
        LatticeErrorKind::InvalidRequest
    );
}

#[test]
fn given_cached_elements_when_uploaded_then_offsets_are_restored() {
    let mut beamline = two_girder_line();
    let quads: Vec<_> = beamline
        .extract(&[ElementType::Quadrupole])
        .cloned()
        .collect();
    assert_eq!(quads.len(), 2);

    beamline.cache_lattice_data(&quads).expect("members");
    quads[0].set(Coordinate::Y, 4.0);
    quads[1].set(Coordinate::Xp, -2.0);

    beamline.upload_from_cache(&quads, false).expect("cache present");
    assert_eq!(quads[0].get(Coordinate::Y), 0.0);
    assert_eq!(quads[1].get(Coordinate::Xp), 0.0);

    beamline.upload_from_cache(&quads, true).expect("cache kept");
    let err = beamline
        .upload_from_cache(&quads, true)
        .expect_err("cache was cleared");
    assert_eq!(err.kind, LatticeErrorKind::EmptyCache);
}

#[test]
fn given_foreign_element_then_caching_is_rejected() {
    let mut beamline = two_girder_line();
    let foreign = Beamline::new("other")
        .append(Element::quadrupole().with_name("X"), true);

    let err = beamline
        .cache_lattice_data(&[foreign])
        .expect_err("foreign element");
    assert_eq!(err.kind, LatticeErrorKind::ElementNotInBeamline);
}

#[test]
fn given_beamline_when_displayed_then_each_element_gets_a_row() {
    let beamline = two_girder_line();
    let table = beamline.to_string();
    assert!(table.starts_with("Beamline 'line'"));
    assert_eq!(table.lines().count(), 2 + beamline.len());
    assert!(table.contains("Quadrupole"));
}
