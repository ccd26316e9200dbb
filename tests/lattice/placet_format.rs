use std::fs;

use placetmachine::lattice::{Beamline, Coordinate, ElementType, LatticeErrorKind};

use crate::{SAMPLE_LATTICE, assert_close, temp_dir};

#[test]
fn given_lattice_text_when_parsed_then_elements_girders_and_positions_are_built() {
    let beamline = Beamline::from_placet_str("fodo", SAMPLE_LATTICE).expect("lattice parses");

    // The sextupole is not modelled and is skipped.
    assert_eq!(beamline.len(), 6);
    assert_eq!(beamline.girders_number(), 2);
    assert_eq!(beamline.girder(1).expect("girder 1").len(), 3);
    assert_eq!(beamline.girder(2).expect("girder 2").len(), 3);

    let qf1 = beamline.get(0).expect("first element").borrow();
    assert_eq!(qf1.name, "QF1");
    assert_eq!(qf1.element_type, ElementType::Quadrupole);
    assert_eq!(qf1.girder, Some(1));
    assert_eq!(qf1.index, Some(0));
    assert_close(qf1.s, 0.5);
    assert_close(qf1.get(Coordinate::Y), 1.5);
    assert_eq!(qf1.parameters.get("strength").map(String::as_str), Some("0.35"));

    let cavity = beamline.get(4).expect("cavity").borrow();
    assert_eq!(cavity.element_type, ElementType::Cavity);
    assert_eq!(cavity.parameters.get("type").map(String::as_str), Some("TDS struct"));
    assert_close(cavity.s, 4.1);

    assert_eq!(beamline.indices_of(ElementType::Quadrupole), vec![0, 3]);
    assert_eq!(
        beamline
            .extract(&[ElementType::Quadrupole, ElementType::Cavity])
            .count(),
        3
    );
}

#[test]
fn given_parsed_lattice_when_written_and_parsed_again_then_it_is_unchanged() {
    let beamline = Beamline::from_placet_str("fodo", SAMPLE_LATTICE).expect("lattice parses");
    let written = beamline.to_placet();
    assert_eq!(written.matches("Girder").count(), 2);

    let reparsed = Beamline::from_placet_str("fodo", &written).expect("written lattice parses");
    assert_eq!(reparsed.len(), beamline.len());
    for (original, copy) in beamline.iter().zip(reparsed.iter()) {
        let original = original.borrow();
        let copy = copy.borrow();
        assert_eq!(copy.name, original.name);
        assert_eq!(copy.element_type, original.element_type);
        assert_eq!(copy.girder, original.girder);
        assert_eq!(copy.offsets, original.offsets);
        assert_eq!(copy.parameters, original.parameters);
        assert_close(copy.s, original.s);
    }
}

#[test]
fn given_lattice_file_when_read_then_same_as_parsing_text() {
    let dir = temp_dir("lattice-file");
    let path = dir.join("fodo.tcl");
    fs::write(&path, SAMPLE_LATTICE).expect("lattice file should be written");

    let beamline = Beamline::read_placet_lattice("fodo", &path).expect("lattice file reads");
    assert_eq!(beamline.len(), 6);

    let missing = Beamline::read_placet_lattice("fodo", &dir.join("missing.tcl"))
        .expect_err("missing file must fail");
    assert_eq!(missing.kind, LatticeErrorKind::Io);

    let _ = fs::remove_file(&path);
    let _ = fs::remove_dir(&dir);
}

#[test]
fn given_malformed_lines_when_parsed_then_errors_carry_line_numbers() {
    let unterminated = "Girder\nQuadrupole -name \"QF1 -length 0.5\n";
    let err = Beamline::from_placet_str("bad", unterminated).expect_err("quote must close");
    assert_eq!(err.kind, LatticeErrorKind::Parse);
    assert!(err.message.starts_with("line 2:"), "unexpected: {}", err.message);

    let not_a_number = "Quadrupole -name QF1 -length long\n";
    let err = Beamline::from_placet_str("bad", not_a_number).expect_err("length must be numeric");
    assert_eq!(err.kind, LatticeErrorKind::Parse);
    assert!(err.message.contains("-length"));

    let garbage = "-name QF1\n";
    let err = Beamline::from_placet_str("bad", garbage).expect_err("line needs a keyword");
    assert_eq!(err.kind, LatticeErrorKind::Parse);
}
