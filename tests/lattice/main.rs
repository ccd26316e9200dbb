mod beamline;
mod placet_format;

use std::{fs, path::PathBuf};

use uuid::Uuid;

pub const SAMPLE_LATTICE: &str = r#"# two girders of a FODO cell
Girder
Quadrupole -name "QF1" -length 0.5 -strength 0.35 -y 1.5
Drift -name "D1" -length 2.0
Bpm -name "BPM1" -length 0.1
Girder
Quadrupole -name "QD1" -length 0.5 -strength -0.35 -x -0.25
Cavity -name "CAV1" -length 1.0 -gradient 0.1 -phase 5 -type "TDS struct"
Sextupole -name "S1" -length 0.2
Drift -name "D2" -length 2.0
"#;

pub fn temp_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("placetmachine-{label}-{}", Uuid::now_v7()));
    fs::create_dir_all(&dir).expect("temp dir should be created");
    dir
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
