use serde::{Deserialize, Serialize};

use crate::{
    correction::{
        error::{CorrectionError, invalid_request},
        fit::{ParabolaFit, fit_parabola},
        ports::ObservablePort,
    },
    knob::{ApplyOptions, Knob, Strategy},
};

/// One evaluated knob setting. `applied` differs from `requested` when the
/// strategy quantizes the amplitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanPoint {
    pub requested: f64,
    pub applied: f64,
    pub value: f64,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnobScanConfig {
    /// Increments around the knob's current setting.
    pub amplitudes: Vec<f64>,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub options: ApplyOptions,
    /// Extra passes allowed while the fitted optimum lands on the range boundary.
    #[serde(default)]
    pub max_rescans: usize,
    /// Measure the observable again at the fitted setting instead of trusting the fit.
    #[serde(default = "default_true")]
    pub evaluate_optimum: bool,
}

impl KnobScanConfig {
    pub fn new(amplitudes: Vec<f64>) -> Self {
        Self {
            amplitudes,
            strategy: Strategy::default(),
            options: ApplyOptions::default(),
            max_rescans: 0,
            evaluate_optimum: true,
        }
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_options(mut self, options: ApplyOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_max_rescans(mut self, max_rescans: usize) -> Self {
        self.max_rescans = max_rescans;
        self
    }

    pub fn with_evaluate_optimum(mut self, evaluate_optimum: bool) -> Self {
        self.evaluate_optimum = evaluate_optimum;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanPass {
    pub points: Vec<ScanPoint>,
    pub fit: ParabolaFit,
    /// Knob increment actually applied after the fit.
    pub applied: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnobScanResult {
    pub knob: String,
    pub strategy: Strategy,
    pub passes: Vec<ScanPass>,
    pub knob_amplitude: f64,
    pub value: f64,
}

impl KnobScanResult {
    pub fn converged(&self) -> bool {
        self.passes.last().is_some_and(|pass| !pass.fit.on_boundary)
    }
}

/// Evaluates the observable at each increment in `amplitudes`, returning the
/// knob to its starting state after every point.
///
/// The knob's cache slot is used for the rollback and is empty afterwards,
/// also when an evaluation fails.
pub async fn iterate_knob<O>(
    knob: &mut Knob,
    observable: &mut O,
    amplitudes: &[f64],
    strategy: Strategy,
    options: &ApplyOptions,
) -> Result<Vec<ScanPoint>, CorrectionError>
where
    O: ObservablePort + ?Sized,
{
    if amplitudes.is_empty() {
        return Err(invalid_request(format!(
            "knob '{}' cannot be iterated over an empty amplitude list",
            knob.name()
        )));
    }

    knob.cache_state();
    let base = knob.amplitude();
    let mut points = Vec::with_capacity(amplitudes.len());

    for &requested in amplitudes {
        let outcome = evaluate_at(knob, observable, requested, strategy, options, base).await;
        knob.upload_state_from_cache(false);

        match outcome {
            Ok(point) => {
                tracing::debug!(
                    target: "correction",
                    knob = %knob.name(),
                    requested = point.requested,
                    applied = point.applied,
                    value = point.value,
                    "knob_point_evaluated"
                );
                points.push(point);
            }
            Err(err) => {
                knob.upload_state_from_cache(true);
                tracing::warn!(
                    target: "correction",
                    knob = %knob.name(),
                    requested = requested,
                    error = %err,
                    "knob iteration aborted; knob restored"
                );
                return Err(err);
            }
        }
    }

    knob.upload_state_from_cache(true);
    Ok(points)
}

async fn evaluate_at<O>(
    knob: &mut Knob,
    observable: &mut O,
    requested: f64,
    strategy: Strategy,
    options: &ApplyOptions,
    base: f64,
) -> Result<ScanPoint, CorrectionError>
where
    O: ObservablePort + ?Sized,
{
    knob.apply(requested, strategy, options)?;
    let applied = knob.amplitude() - base;
    let value = observable.evaluate(knob).await?;
    Ok(ScanPoint {
        requested,
        applied,
        value,
    })
}

/// Scans the knob, fits a parabola to the applied amplitudes, and leaves the
/// knob at the fitted optimum. The range is scanned again around the new
/// setting while the optimum sits on its boundary, up to `max_rescans` times.
pub async fn knob_scan<O>(
    knob: &mut Knob,
    observable: &mut O,
    config: &KnobScanConfig,
) -> Result<KnobScanResult, CorrectionError>
where
    O: ObservablePort + ?Sized,
{
    let mut passes: Vec<ScanPass> = Vec::new();

    loop {
        let points = iterate_knob(
            knob,
            observable,
            &config.amplitudes,
            config.strategy,
            &config.options,
        )
        .await?;
        let samples: Vec<(f64, f64)> = points
            .iter()
            .map(|point| (point.applied, point.value))
            .collect();
        let fit = fit_parabola(&samples)?;

        let before = knob.amplitude();
        knob.apply(fit.optimum, config.strategy, &config.options)?;
        let applied = knob.amplitude() - before;
        let value = if config.evaluate_optimum {
            observable.evaluate(knob).await?
        } else {
            fit.optimum_value
        };

        tracing::info!(
            target: "correction",
            knob = %knob.name(),
            pass = passes.len() + 1,
            optimum = fit.optimum,
            applied = applied,
            value = value,
            on_boundary = fit.on_boundary,
            "knob_scan_pass"
        );
        passes.push(ScanPass {
            points,
            fit,
            applied,
            value,
        });

        if !fit.on_boundary || passes.len() > config.max_rescans {
            break;
        }
    }

    let result = KnobScanResult {
        knob: knob.name().to_string(),
        strategy: config.strategy,
        knob_amplitude: knob.amplitude(),
        value: passes.last().map_or(f64::NAN, |pass| pass.value),
        passes,
    };
    if !result.converged() {
        tracing::warn!(
            target: "correction",
            knob = %result.knob,
            passes = result.passes.len(),
            "knob scan optimum is still on the range boundary"
        );
    }
    Ok(result)
}
