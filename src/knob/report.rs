use std::{collections::BTreeMap, fmt};

use serde::Serialize;

use crate::{
    knob::Knob,
    lattice::{Coordinate, ElementType},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinateReport {
    pub amplitude: f64,
    pub step_size: Option<f64>,
    pub value: f64,
    pub change: f64,
    pub mismatch: f64,
    pub total_mismatch: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnobReportRow {
    pub name: String,
    pub element_type: ElementType,
    pub girder: Option<String>,
    pub s: Option<f64>,
    pub coordinates: BTreeMap<Coordinate, CoordinateReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnobReport {
    pub knob: String,
    pub amplitude: f64,
    pub amplitude_mismatch: f64,
    pub rows: Vec<KnobReportRow>,
}

impl Knob {
    pub fn report(&self) -> KnobReport {
        let rows = self
            .elements()
            .iter()
            .zip(self.variables())
            .map(|(handle, variables)| {
                let element = handle.borrow();
                let coordinates = variables
                    .iter()
                    .map(|(coord, variable)| {
                        let report = CoordinateReport {
                            amplitude: variable.amplitude,
                            step_size: variable.step_size,
                            value: element.get(*coord),
                            change: variable.change,
                            mismatch: variable.mismatch,
                            total_mismatch: element.mismatch(*coord),
                        };
                        (*coord, report)
                    })
                    .collect();

                KnobReportRow {
                    name: element.name.clone(),
                    element_type: element.element_type,
                    girder: element.girder.map(|girder| girder.to_string()),
                    s: element.index.map(|_| element.s),
                    coordinates,
                }
            })
            .collect();

        KnobReport {
            knob: self.name().to_string(),
            amplitude: self.amplitude(),
            amplitude_mismatch: self.amplitude_mismatch(),
            rows,
        }
    }
}

fn or_dash(value: Option<impl fmt::Display>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

impl fmt::Display for KnobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Knob '{}' amplitude={} amplitude_mismatch={}",
            self.knob, self.amplitude, self.amplitude_mismatch
        )?;
        writeln!(
            f,
            "{:<12} {:<10} {:>6} {:>10} {:<5} {:>10} {:>10} {:>12} {:>12} {:>12} {:>12}",
            "name", "type", "girder", "s", "coord", "amplitude", "step", "value", "change",
            "mismatch", "total"
        )?;
        for row in &self.rows {
            for (coord, c) in &row.coordinates {
                writeln!(
                    f,
                    "{:<12} {:<10} {:>6} {:>10} {:<5} {:>10} {:>10} {:>12.6} {:>12.6} {:>12.6} {:>12.6}",
                    row.name,
                    row.element_type,
                    or_dash(row.girder.as_deref()),
                    or_dash(row.s),
                    coord,
                    c.amplitude,
                    or_dash(c.step_size),
                    c.value,
                    c.change,
                    c.mismatch,
                    c.total_mismatch,
                )?;
            }
        }
        Ok(())
    }
}
