use std::fs;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;

use crate::{
    config::{AlignmentConfig, Config, CorrectionStep, KnobConfig},
    correction::{
        Alignment, DfsOptions, KnobScanResult, SimulatorObservable, TrackingSummary, knob_scan,
    },
    knob::{Knob, KnobReport},
    lattice::Beamline,
    placet::{Communicator, SimulatorPort},
};

#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub scan: KnobScanResult,
    pub report: KnobReport,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub corrections: Vec<TrackingSummary>,
    pub scans: Vec<ScanOutcome>,
}

/// Reads the configured lattice and misalignments and attaches every knob.
pub fn build_beamline(config: &Config) -> Result<Beamline> {
    let mut beamline = Beamline::read_placet_lattice(&config.lattice.name, &config.lattice.path)
        .with_context(|| format!("failed to read lattice {}", config.lattice.path.display()))?;

    if let Some(path) = &config.lattice.misalignments {
        beamline
            .read_misalignments(path)
            .with_context(|| format!("failed to read misalignments {}", path.display()))?;
    }

    for knob_config in &config.knobs {
        let knob = build_knob(&beamline, knob_config)?;
        beamline
            .attach_knob(knob)
            .with_context(|| format!("failed to attach knob '{}'", knob_config.name))?;
    }

    tracing::info!(
        target: "lattice",
        beamline = %beamline.name,
        elements = beamline.len(),
        girders = beamline.girders_number(),
        knobs = config.knobs.len(),
        "beamline_ready"
    );
    Ok(beamline)
}

pub fn build_knob(beamline: &Beamline, knob_config: &KnobConfig) -> Result<Knob> {
    let mut elements = Vec::with_capacity(knob_config.elements.len());
    let mut descriptors = Vec::with_capacity(knob_config.elements.len());
    for entry in &knob_config.elements {
        let handle = beamline.get(entry.index).ok_or_else(|| {
            anyhow!(
                "knob '{}' references element {} but the beamline has {} elements",
                knob_config.name,
                entry.index,
                beamline.len()
            )
        })?;
        elements.push(handle.clone());
        descriptors.push(entry.coordinates.clone());
    }

    Knob::new(elements, descriptors, knob_config.options())
        .with_context(|| format!("failed to build knob '{}'", knob_config.name))
}

/// Assigns the configured survey, then runs each correction step in order.
pub async fn align<S: SimulatorPort>(
    alignment: &mut Alignment<S>,
    beamline: &mut Beamline,
    config: &AlignmentConfig,
) -> Result<Vec<TrackingSummary>> {
    if let Some(survey) = &config.survey {
        alignment
            .assign_errors(beamline, survey)
            .await
            .with_context(|| format!("survey '{}' failed", survey.name()))?;
    }

    let mut summaries = Vec::with_capacity(config.corrections.len());
    for step in &config.corrections {
        let summary = match step {
            CorrectionStep::Track { beam, survey } => {
                alignment.track(beamline, beam, survey.as_deref()).await
            }
            CorrectionStep::OneToOne {
                beam,
                survey,
                options,
            } => {
                alignment
                    .one_to_one(beamline, beam, survey.as_deref(), options)
                    .await
            }
            CorrectionStep::Dfs {
                beam,
                survey,
                bpms_realign,
                options,
            } => {
                let dfs = DfsOptions {
                    bpms_realign: *bpms_realign,
                    options: options.clone(),
                };
                alignment.dfs(beamline, beam, survey.as_deref(), &dfs).await
            }
            CorrectionStep::RfAlign {
                beam,
                survey,
                options,
            } => {
                alignment
                    .rf_align(beamline, beam, survey.as_deref(), options)
                    .await
            }
        };
        summaries.push(summary.context("correction step failed")?);
    }
    Ok(summaries)
}

/// Starts the simulator, runs its setup commands, the alignment steps and
/// every configured scan.
pub async fn run(config: Config) -> Result<RunReport> {
    let mut beamline = build_beamline(&config)?;

    let mut simulator = Communicator::spawn(config.simulator.communicator.clone())
        .await
        .context("failed to start the simulator")?;
    for command in &config.simulator.setup_commands {
        simulator
            .run_command(command)
            .await
            .with_context(|| format!("setup command '{command}' failed"))?;
    }

    let mut report = RunReport::default();
    if let Some(alignment_config) = &config.alignment {
        fs::create_dir_all(&alignment_config.work_dir).with_context(|| {
            format!(
                "failed to create work directory {}",
                alignment_config.work_dir.display()
            )
        })?;
        let mut alignment = Alignment::new(simulator, &alignment_config.work_dir);
        let summaries = align(&mut alignment, &mut beamline, alignment_config).await;
        simulator = alignment.into_inner();
        report.corrections = summaries?;
    }

    for scan in &config.scans {
        let knob = beamline
            .knob_mut(&scan.knob)
            .ok_or_else(|| anyhow!("scan references unknown knob '{}'", scan.knob))?;

        let mut observable = SimulatorObservable::new(
            simulator,
            &scan.observable.command,
            &scan.observable.variable,
        );
        let result = knob_scan(knob, &mut observable, &scan.scan).await;
        simulator = observable.into_inner();

        let result = result.with_context(|| format!("scan of knob '{}' failed", scan.knob))?;
        report.scans.push(ScanOutcome {
            scan: result,
            report: knob.report(),
        });
    }

    simulator
        .close()
        .await
        .context("failed to close the simulator")?;
    Ok(report)
}
