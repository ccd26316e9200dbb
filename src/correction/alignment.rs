use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    correction::error::{CorrectionError, invalid_request, simulator_error},
    lattice::Beamline,
    placet::{SimulatorPort, command::PlacetCommand},
};

/// Extra `-key value` options passed through to a simulator command.
pub type CommandOptions = BTreeMap<String, String>;

const POSITIONS_FILE: &str = "position_tmp.dat";
const DFS_EMITTANCE_FILE: &str = "emitt_dfs.dat";

/// Name of the simulator procedure that reads the uploaded alignment back.
pub const FROM_FILE_SURVEY: &str = "from_file";
/// Name of the simulator procedure invoked by the correction commands.
pub const CALLBACK_PROC: &str = "callback";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionKind {
    None,
    OneToOne,
    Dfs,
    RfAlign,
}

impl CorrectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CorrectionKind::None => "No",
            CorrectionKind::OneToOne => "1-2-1",
            CorrectionKind::Dfs => "DFS",
            CorrectionKind::RfAlign => "RF align",
        }
    }
}

impl fmt::Display for CorrectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One row of tracking output at the beamline exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSummary {
    pub correction: CorrectionKind,
    pub beam: String,
    pub survey: String,
    /// Set when the run used the beamline's own alignment.
    pub positions_file: Option<PathBuf>,
    /// The correction commands only report the vertical emittance.
    pub emittx: Option<f64>,
    pub emitty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DfsOptions {
    /// Store the corrected orbit as the new BPM reference through the callback.
    #[serde(default = "default_bpms_realign")]
    pub bpms_realign: bool,
    #[serde(default)]
    pub options: CommandOptions,
}

fn default_bpms_realign() -> bool {
    true
}

impl Default for DfsOptions {
    fn default() -> Self {
        Self {
            bpms_realign: default_bpms_realign(),
            options: CommandOptions::new(),
        }
    }
}

/// Tracking and beam-based alignment on a running simulator.
///
/// `survey` arguments name a procedure known to the simulator. `None` means
/// the beamline's current alignment: it is written to the work directory and
/// read back by a `from_file` procedure during the run. Every correction
/// pulls the corrected positions back into the beamline afterwards.
pub struct Alignment<S> {
    simulator: S,
    work_dir: PathBuf,
}

impl<S: SimulatorPort> Alignment<S> {
    pub fn new(simulator: S, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            simulator,
            work_dir: work_dir.into(),
        }
    }

    pub fn simulator_mut(&mut self) -> &mut S {
        &mut self.simulator
    }

    pub fn into_inner(self) -> S {
        self.simulator
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn positions_file(&self) -> PathBuf {
        self.work_dir.join(POSITIONS_FILE)
    }

    pub(crate) async fn send(
        &mut self,
        command: &PlacetCommand,
    ) -> Result<Vec<String>, CorrectionError> {
        Ok(self.simulator.run_command(&command.to_string()).await?)
    }

    /// Declares a procedure without arguments; its commands print nothing
    /// at declaration time.
    pub async fn declare_proc(
        &mut self,
        name: &str,
        body: &[PlacetCommand],
    ) -> Result<(), CorrectionError> {
        let body = body
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        let line = if body.is_empty() {
            format!("proc {name} {{}} {{}}")
        } else {
            format!("proc {name} {{}} {{ {body} }}")
        };
        self.simulator.run_command(&line).await?;
        tracing::debug!(target: "correction", proc = %name, "proc_declared");
        Ok(())
    }

    /// Resets every misalignment inside the simulator.
    pub async fn zero(&mut self) -> Result<(), CorrectionError> {
        self.send(&PlacetCommand::new("Zero")).await?;
        Ok(())
    }

    /// Writes the beamline's alignment to the work directory and declares
    /// the `from_file` procedure that reads it back.
    pub async fn upload_alignment(&mut self, beamline: &Beamline) -> Result<PathBuf, CorrectionError> {
        let path = self.positions_file();
        beamline.save_misalignments(&path)?;
        let read_back = PlacetCommand::new("ReadAllPositions").option("file", path.display());
        self.declare_proc(FROM_FILE_SURVEY, &[read_back]).await?;
        Ok(path)
    }

    /// Pulls every element position from the simulator into the beamline.
    pub async fn sync_misalignments(&mut self, beamline: &mut Beamline) -> Result<(), CorrectionError> {
        let path = self.positions_file();
        self.send(&PlacetCommand::new("SaveAllPositions").option("file", path.display()))
            .await?;
        beamline.read_misalignments(&path)?;
        tracing::debug!(
            target: "correction",
            beamline = %beamline.name,
            file = %path.display(),
            "misalignments_synced"
        );
        Ok(())
    }

    async fn resolve_survey(
        &mut self,
        beamline: &Beamline,
        survey: Option<&str>,
    ) -> Result<(String, Option<PathBuf>), CorrectionError> {
        match survey {
            None => {
                let path = self.upload_alignment(beamline).await?;
                Ok((FROM_FILE_SURVEY.to_string(), Some(path)))
            }
            Some(name) if name.trim().is_empty() => {
                Err(invalid_request("survey name cannot be empty"))
            }
            Some(name) => Ok((name.to_string(), None)),
        }
    }

    /// Tracks `beam` without any correction.
    pub async fn track(
        &mut self,
        beamline: &Beamline,
        beam: &str,
        survey: Option<&str>,
    ) -> Result<TrackingSummary, CorrectionError> {
        let (survey, positions_file) = self.resolve_survey(beamline, survey).await?;
        let command = PlacetCommand::new("TestNoCorrection")
            .option("beam", beam)
            .option("machines", 1)
            .option("survey", &survey);
        self.send(&command).await?;

        let emittx = token_from_end(&self.simulator.read_line().await?, 1, "emittx")?;
        let emitty = token_from_end(&self.simulator.read_line().await?, 1, "emitty")?;

        let summary = TrackingSummary {
            correction: CorrectionKind::None,
            beam: beam.to_string(),
            survey,
            positions_file,
            emittx: Some(emittx),
            emitty,
        };
        log_summary(&summary);
        Ok(summary)
    }

    /// One-to-one steering; `options` reach `TestSimpleCorrection` as given.
    pub async fn one_to_one(
        &mut self,
        beamline: &mut Beamline,
        beam: &str,
        survey: Option<&str>,
        options: &CommandOptions,
    ) -> Result<TrackingSummary, CorrectionError> {
        let (survey, positions_file) = self.resolve_survey(beamline, survey).await?;
        let command = PlacetCommand::new("TestSimpleCorrection")
            .option("beam", beam)
            .option("machines", 1)
            .option("survey", &survey)
            .options(options);
        self.send(&command).await?;

        let emitty = token_from_end(&self.simulator.read_line().await?, 3, "emitty")?;
        // summary over all machines
        self.simulator.read_line().await?;
        self.sync_misalignments(beamline).await?;

        let summary = TrackingSummary {
            correction: CorrectionKind::OneToOne,
            beam: beam.to_string(),
            survey,
            positions_file,
            emittx: None,
            emitty,
        };
        log_summary(&summary);
        Ok(summary)
    }

    /// Dispersion-free steering, starting from a zeroed simulator alignment
    /// that the survey then restores.
    pub async fn dfs(
        &mut self,
        beamline: &mut Beamline,
        beam: &str,
        survey: Option<&str>,
        dfs: &DfsOptions,
    ) -> Result<TrackingSummary, CorrectionError> {
        let (survey, positions_file) = self.resolve_survey(beamline, survey).await?;
        if dfs.bpms_realign {
            self.declare_proc(CALLBACK_PROC, &[PlacetCommand::new("BpmRealign")])
                .await?;
        }
        self.zero().await?;

        let emitt_file = self.work_dir.join(DFS_EMITTANCE_FILE);
        let command = PlacetCommand::new("TestMeasuredCorrection")
            .option("beam0", beam)
            .option("survey", &survey)
            .option("machines", 1)
            .option("emitt_file", emitt_file.display())
            .options(&dfs.options);
        let measured = self.measured_correction(&command).await;
        if dfs.bpms_realign {
            self.declare_proc(CALLBACK_PROC, &[]).await?;
        }
        let emitty = measured?;
        self.sync_misalignments(beamline).await?;

        let summary = TrackingSummary {
            correction: CorrectionKind::Dfs,
            beam: beam.to_string(),
            survey,
            positions_file,
            emittx: None,
            emitty,
        };
        log_summary(&summary);
        Ok(summary)
    }

    async fn measured_correction(&mut self, command: &PlacetCommand) -> Result<f64, CorrectionError> {
        self.send(command).await?;
        let emitty = token_from_end(&self.simulator.read_line().await?, 2, "emitty")?;
        // summary over all machines
        self.simulator.read_line().await?;
        Ok(emitty)
    }

    /// RF alignment of the structures, followed by a plain tracking run to
    /// measure the result.
    pub async fn rf_align(
        &mut self,
        beamline: &mut Beamline,
        beam: &str,
        survey: Option<&str>,
        options: &CommandOptions,
    ) -> Result<TrackingSummary, CorrectionError> {
        let (survey, _) = self.resolve_survey(beamline, survey).await?;
        self.zero().await?;
        let command = PlacetCommand::new("TestRfAlignment")
            .option("beam", beam)
            .option("survey", &survey)
            .option("machines", 1)
            .options(options);
        self.send(&command).await?;
        self.sync_misalignments(beamline).await?;

        let mut summary = self.track(beamline, beam, None).await?;
        summary.correction = CorrectionKind::RfAlign;
        Ok(summary)
    }
}

fn log_summary(summary: &TrackingSummary) {
    tracing::info!(
        target: "correction",
        correction = %summary.correction,
        beam = %summary.beam,
        survey = %summary.survey,
        emittx = ?summary.emittx,
        emitty = summary.emitty,
        "tracking_finished"
    );
}

/// `position`-th whitespace token counted from the end (1 is the last).
fn token_from_end(line: &str, position: usize, what: &str) -> Result<f64, CorrectionError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let token = tokens
        .len()
        .checked_sub(position)
        .and_then(|i| tokens.get(i).copied())
        .ok_or_else(|| simulator_error(format!("no {what} in simulator output '{line}'")))?;
    token
        .parse::<f64>()
        .map_err(|_| simulator_error(format!("{what} is not a number in '{line}'")))
}
