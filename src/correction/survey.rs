use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    correction::{
        alignment::Alignment,
        error::{CorrectionError, invalid_request},
    },
    lattice::{Beamline, ElementHandle, ElementType, Offsets},
    placet::{
        SimulatorPort,
        command::{PlacetCommand, tcl_list},
    },
};

/// Static alignment errors for `SurveyErrorSet`, in micrometres and
/// microradians. Every value is sent, so an unset one is an explicit zero
/// rather than whatever the simulator held before.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SurveyErrors {
    pub quadrupole_x: f64,
    pub quadrupole_y: f64,
    pub quadrupole_xp: f64,
    pub quadrupole_yp: f64,
    pub quadrupole_roll: f64,
    pub cavity_x: f64,
    pub cavity_realign_x: f64,
    pub cavity_y: f64,
    pub cavity_realign_y: f64,
    pub cavity_xp: f64,
    pub cavity_yp: f64,
    pub cavity_dipole_x: f64,
    pub cavity_dipole_y: f64,
    pub piece_x: f64,
    pub piece_xp: f64,
    pub piece_y: f64,
    pub piece_yp: f64,
    pub bpm_x: f64,
    pub bpm_y: f64,
    pub bpm_xp: f64,
    pub bpm_yp: f64,
    pub bpm_roll: f64,
    pub sbend_x: f64,
    pub sbend_y: f64,
    pub sbend_xp: f64,
    pub sbend_yp: f64,
    pub sbend_roll: f64,
}

impl SurveyErrors {
    pub fn entries(&self) -> [(&'static str, f64); 27] {
        [
            ("quadrupole_x", self.quadrupole_x),
            ("quadrupole_y", self.quadrupole_y),
            ("quadrupole_xp", self.quadrupole_xp),
            ("quadrupole_yp", self.quadrupole_yp),
            ("quadrupole_roll", self.quadrupole_roll),
            ("cavity_x", self.cavity_x),
            ("cavity_realign_x", self.cavity_realign_x),
            ("cavity_y", self.cavity_y),
            ("cavity_realign_y", self.cavity_realign_y),
            ("cavity_xp", self.cavity_xp),
            ("cavity_yp", self.cavity_yp),
            ("cavity_dipole_x", self.cavity_dipole_x),
            ("cavity_dipole_y", self.cavity_dipole_y),
            ("piece_x", self.piece_x),
            ("piece_xp", self.piece_xp),
            ("piece_y", self.piece_y),
            ("piece_yp", self.piece_yp),
            ("bpm_x", self.bpm_x),
            ("bpm_y", self.bpm_y),
            ("bpm_xp", self.bpm_xp),
            ("bpm_yp", self.bpm_yp),
            ("bpm_roll", self.bpm_roll),
            ("sbend_x", self.sbend_x),
            ("sbend_y", self.sbend_y),
            ("sbend_xp", self.sbend_xp),
            ("sbend_yp", self.sbend_yp),
            ("sbend_roll", self.sbend_roll),
        ]
    }

    pub fn command(&self) -> PlacetCommand {
        PlacetCommand::new("SurveyErrorSet").options(self.entries())
    }
}

/// Scatter of the girder end points for `InterGirderMove`, in micrometres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GirderScatter {
    pub scatter_x: Option<f64>,
    pub scatter_y: Option<f64>,
    pub flo_x: Option<f64>,
    pub flo_y: Option<f64>,
    pub cavities_only: bool,
}

impl GirderScatter {
    pub fn command(&self) -> PlacetCommand {
        let values = [
            ("scatter_x", self.scatter_x),
            ("scatter_y", self.scatter_y),
            ("flo_x", self.flo_x),
            ("flo_y", self.flo_y),
        ];
        let command = PlacetCommand::new("InterGirderMove").options(
            values
                .into_iter()
                .filter_map(|(key, value)| value.map(|value| (key, value))),
        );
        if self.cavities_only {
            command.option("cav_only", 1)
        } else {
            command
        }
    }
}

/// How a fresh set of alignment errors is assigned to the beamline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum Survey {
    /// Leaves the alignment as it is.
    Empty,
    /// Positions from a misalignment file, loaded into the beamline only.
    FromFile { path: PathBuf },
    /// CLIC prealignment generated by the simulator from `static_errors`.
    DefaultClic {
        #[serde(default)]
        static_errors: SurveyErrors,
        errors_seed: u64,
        #[serde(default)]
        girders: GirderScatter,
    },
}

impl Survey {
    pub fn name(&self) -> &'static str {
        match self {
            Survey::Empty => "empty",
            Survey::FromFile { .. } => "from_file",
            Survey::DefaultClic { .. } => "default_clic",
        }
    }
}

impl<S: SimulatorPort> Alignment<S> {
    pub async fn survey_errors_set(&mut self, errors: &SurveyErrors) -> Result<(), CorrectionError> {
        self.send(&errors.command()).await?;
        Ok(())
    }

    pub async fn random_reset(&mut self, seed: u64) -> Result<(), CorrectionError> {
        self.send(&PlacetCommand::new("RandomReset").option("seed", seed))
            .await?;
        Ok(())
    }

    pub async fn assign_errors(
        &mut self,
        beamline: &mut Beamline,
        survey: &Survey,
    ) -> Result<(), CorrectionError> {
        match survey {
            Survey::Empty => {}
            Survey::FromFile { path } => beamline.read_misalignments(path)?,
            Survey::DefaultClic {
                static_errors,
                errors_seed,
                girders,
            } => {
                self.survey_errors_set(static_errors).await?;
                self.random_reset(*errors_seed).await?;
                self.send(&PlacetCommand::new("Clic")).await?;
                self.send(&girders.command()).await?;
                self.sync_misalignments(beamline).await?;
            }
        }
        tracing::info!(
            target: "correction",
            beamline = %beamline.name,
            survey = survey.name(),
            "errors_assigned"
        );
        Ok(())
    }

    /// Adds `offsets` to one element. With `push`, the simulator's copy is
    /// moved too through `ElementAddOffset`.
    pub async fn misalign_element(
        &mut self,
        beamline: &mut Beamline,
        index: usize,
        offsets: &Offsets,
        push: bool,
    ) -> Result<(), CorrectionError> {
        beamline.misalign_element(index, offsets)?;
        if push {
            let simulator_index = beamline
                .get(index)
                .and_then(|element| element.borrow().index)
                .unwrap_or(index);
            self.send(&element_add_offset(simulator_index, offsets)).await?;
        }
        Ok(())
    }

    pub async fn misalign_elements(
        &mut self,
        beamline: &mut Beamline,
        offsets: &BTreeMap<usize, Offsets>,
        push: bool,
    ) -> Result<(), CorrectionError> {
        for (index, element_offsets) in offsets {
            self.misalign_element(beamline, *index, element_offsets, push)
                .await?;
        }
        Ok(())
    }

    /// Moves every element on girder `number` (1-based), or only its
    /// cavities.
    pub async fn misalign_girder(
        &mut self,
        beamline: &mut Beamline,
        number: usize,
        offsets: &Offsets,
        cavities_only: bool,
        push: bool,
    ) -> Result<(), CorrectionError> {
        let girder = beamline
            .girder(number)
            .ok_or_else(|| invalid_request(format!("girder {number} does not exist")))?;
        let positions: Vec<usize> = girder
            .elements
            .iter()
            .filter(|element| !cavities_only || element.element_type() == ElementType::Cavity)
            .filter_map(|element| position_of(beamline, element))
            .collect();

        for index in positions {
            self.misalign_element(beamline, index, offsets, push).await?;
        }
        Ok(())
    }

    pub async fn misalign_girders(
        &mut self,
        beamline: &mut Beamline,
        offsets: &BTreeMap<usize, Offsets>,
        cavities_only: bool,
        push: bool,
    ) -> Result<(), CorrectionError> {
        for (number, girder_offsets) in offsets {
            self.misalign_girder(beamline, *number, girder_offsets, cavities_only, push)
                .await?;
        }
        Ok(())
    }

    /// Scales each quadrupole strength by `1 + error`, in lattice order, and
    /// sends the new strengths.
    pub async fn apply_quadrupole_errors(
        &mut self,
        beamline: &mut Beamline,
        relative_errors: &[f64],
    ) -> Result<(), CorrectionError> {
        let quadrupoles = elements_of(beamline, ElementType::Quadrupole, relative_errors.len())?;
        let mut strengths = Vec::with_capacity(quadrupoles.len());
        for (quadrupole, error) in quadrupoles.iter().zip(relative_errors) {
            let strength = parameter(quadrupole, "strength")?;
            let strength = strength + strength * error;
            set_parameter(quadrupole, "strength", strength);
            strengths.push(strength);
        }
        self.send(&PlacetCommand::new("QuadrupoleSetStrengthList").arg(tcl_list(&strengths)))
            .await?;
        Ok(())
    }

    /// Shifts each cavity's phase and gradient by the given absolute errors,
    /// in lattice order, and sends both lists.
    pub async fn apply_cavity_errors(
        &mut self,
        beamline: &mut Beamline,
        phase_errors: &[f64],
        gradient_errors: &[f64],
    ) -> Result<(), CorrectionError> {
        if phase_errors.len() != gradient_errors.len() {
            return Err(invalid_request(format!(
                "{} phase errors but {} gradient errors",
                phase_errors.len(),
                gradient_errors.len()
            )));
        }
        let cavities = elements_of(beamline, ElementType::Cavity, phase_errors.len())?;
        let mut phases = Vec::with_capacity(cavities.len());
        let mut gradients = Vec::with_capacity(cavities.len());
        for ((cavity, phase_error), gradient_error) in
            cavities.iter().zip(phase_errors).zip(gradient_errors)
        {
            let phase = parameter(cavity, "phase")? + phase_error;
            let gradient = parameter(cavity, "gradient")? + gradient_error;
            set_parameter(cavity, "phase", phase);
            set_parameter(cavity, "gradient", gradient);
            phases.push(phase);
            gradients.push(gradient);
        }
        self.send(&PlacetCommand::new("CavitySetPhaseList").arg(tcl_list(&phases)))
            .await?;
        self.send(&PlacetCommand::new("CavitySetGradientList").arg(tcl_list(&gradients)))
            .await?;
        Ok(())
    }
}

pub fn element_add_offset(index: usize, offsets: &Offsets) -> PlacetCommand {
    PlacetCommand::new("ElementAddOffset")
        .arg(index)
        .option("x", offsets.x)
        .option("y", offsets.y)
        .option("xp", offsets.xp)
        .option("yp", offsets.yp)
        .option("roll", offsets.roll)
}

fn position_of(beamline: &Beamline, element: &ElementHandle) -> Option<usize> {
    beamline.iter().position(|candidate| candidate.ptr_eq(element))
}

fn elements_of(
    beamline: &Beamline,
    element_type: ElementType,
    expected: usize,
) -> Result<Vec<ElementHandle>, CorrectionError> {
    let elements: Vec<ElementHandle> = beamline
        .extract(&[element_type])
        .cloned()
        .collect();
    if elements.len() != expected {
        return Err(invalid_request(format!(
            "beamline '{}' has {} {element_type} elements, {expected} errors were given",
            beamline.name,
            elements.len()
        )));
    }
    Ok(elements)
}

/// Numeric element parameter; a missing one reads as zero.
fn parameter(element: &ElementHandle, key: &str) -> Result<f64, CorrectionError> {
    let element = element.borrow();
    match element.parameters.get(key) {
        None => Ok(0.0),
        Some(value) => value.parse::<f64>().map_err(|_| {
            invalid_request(format!(
                "{} '{}' has a non-numeric {key} '{value}'",
                element.element_type, element.name
            ))
        }),
    }
}

fn set_parameter(element: &ElementHandle, key: &str, value: f64) {
    element
        .borrow_mut()
        .parameters
        .insert(key.to_string(), value.to_string());
}
