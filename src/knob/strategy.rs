use std::collections::BTreeMap;

use crate::{
    knob::{
        quantize::{nearest_supported, round_to_step},
        types::{ApplyOptions, KnobVariables, Strategy},
    },
    lattice::Coordinate,
};

/// Read-only view of everything a strategy needs to plan one application.
pub(crate) struct KnobState<'a> {
    pub name: &'a str,
    pub amplitude: f64,
    pub amplitude_mismatch: f64,
    pub variables: &'a [KnobVariables],
    /// Shared ledger value per element, for the coordinates this knob touches.
    pub ledgers: Vec<BTreeMap<Coordinate, f64>>,
    pub supported_amplitudes: Option<&'a [f64]>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CoordinateUpdate {
    pub coord: Coordinate,
    pub change_delta: f64,
    pub mismatch: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ApplyPlan {
    pub amplitude: f64,
    pub amplitude_mismatch: f64,
    pub updates: Vec<Vec<CoordinateUpdate>>,
}

/// Which residual gets folded into a coordinate's change before rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Carry {
    Nothing,
    Local,
    Global,
}

impl Carry {
    fn for_memory(options: &ApplyOptions) -> Self {
        if options.use_global_mismatch {
            Carry::Global
        } else {
            Carry::Local
        }
    }
}

pub(crate) fn plan(
    strategy: Strategy,
    state: &KnobState<'_>,
    amplitude: f64,
    options: &ApplyOptions,
) -> ApplyPlan {
    match strategy {
        Strategy::Unquantized => plan_unquantized(state, amplitude),
        Strategy::Simple => plan_simple(state, amplitude, options, false),
        Strategy::SimpleMemory => plan_simple(state, amplitude, options, true),
        Strategy::MinScale | Strategy::MinScaleMemory => match most_sensitive(state) {
            Some(sensitive) => plan_min_scale(
                state,
                amplitude,
                options,
                sensitive,
                strategy.uses_memory(),
            ),
            None => {
                tracing::warn!(
                    target: "knob",
                    knob = %state.name,
                    strategy = %strategy,
                    "no coordinate has a step size; applying unquantized"
                );
                plan_unquantized(state, amplitude)
            }
        },
    }
}

fn plan_unquantized(state: &KnobState<'_>, amplitude: f64) -> ApplyPlan {
    let updates = state
        .variables
        .iter()
        .map(|variables| {
            variables
                .iter()
                .map(|(coord, variable)| CoordinateUpdate {
                    coord: *coord,
                    change_delta: variable.amplitude * amplitude,
                    mismatch: variable.mismatch,
                })
                .collect()
        })
        .collect();

    ApplyPlan {
        amplitude: state.amplitude + amplitude,
        amplitude_mismatch: state.amplitude_mismatch,
        updates,
    }
}

fn plan_simple(
    state: &KnobState<'_>,
    amplitude: f64,
    options: &ApplyOptions,
    memory: bool,
) -> ApplyPlan {
    let carried_amplitude = if memory { state.amplitude_mismatch } else { 0.0 };
    let requested = amplitude + state.amplitude + carried_amplitude;
    let supported = state
        .supported_amplitudes
        .filter(|_| options.use_supported_amplitudes);

    let (total, amplitude_mismatch) = match supported {
        Some(list) => {
            let snapped = nearest_supported(requested, list);
            let residual = requested - snapped;
            if memory {
                (snapped, residual)
            } else {
                (snapped, state.amplitude_mismatch + residual)
            }
        }
        None if memory => (requested, 0.0),
        None => (requested, state.amplitude_mismatch),
    };

    let carry = if memory {
        Carry::for_memory(options)
    } else {
        Carry::Nothing
    };
    ApplyPlan {
        amplitude: total,
        amplitude_mismatch,
        updates: quantized_updates(state, total - state.amplitude, total, carry),
    }
}

fn plan_min_scale(
    state: &KnobState<'_>,
    amplitude: f64,
    options: &ApplyOptions,
    (element, coord): (usize, Coordinate),
    memory: bool,
) -> ApplyPlan {
    let Some(variable) = state.variables[element].get(&coord) else {
        return plan_unquantized(state, amplitude);
    };
    let Some(step_size) = variable.step_size else {
        return plan_unquantized(state, amplitude);
    };

    let reference = if memory {
        amplitude + state.amplitude_mismatch
    } else {
        amplitude
    };
    let rounded = round_to_step(variable.amplitude * reference, step_size);
    let adjusted = rounded / variable.amplitude;
    let total = state.amplitude + adjusted;

    let carry = if memory {
        Carry::for_memory(options)
    } else {
        Carry::Nothing
    };
    ApplyPlan {
        amplitude: total,
        amplitude_mismatch: state.amplitude_mismatch + amplitude - adjusted,
        updates: quantized_updates(state, adjusted, total, carry),
    }
}

/// The stepped coordinate with the fewest grid steps per unit of knob
/// amplitude. Coordinates with zero amplitude can never land on a grid point
/// by rescaling and are skipped.
fn most_sensitive(state: &KnobState<'_>) -> Option<(usize, Coordinate)> {
    let mut best: Option<(usize, Coordinate, f64)> = None;
    for (i, variables) in state.variables.iter().enumerate() {
        for (coord, variable) in variables {
            let Some(step_size) = variable.step_size else {
                continue;
            };
            if variable.amplitude == 0.0 {
                continue;
            }
            let steps_per_unit = (variable.amplitude / step_size).abs();
            if best.is_none_or(|(_, _, current)| steps_per_unit < current) {
                best = Some((i, *coord, steps_per_unit));
            }
        }
    }
    best.map(|(i, coord, _)| (i, coord))
}

fn quantized_updates(
    state: &KnobState<'_>,
    increment: f64,
    total: f64,
    carry: Carry,
) -> Vec<Vec<CoordinateUpdate>> {
    state
        .variables
        .iter()
        .enumerate()
        .map(|(i, variables)| {
            variables
                .iter()
                .map(|(coord, variable)| {
                    let ideal = variable.amplitude * increment;
                    let Some(step_size) = variable.step_size else {
                        return CoordinateUpdate {
                            coord: *coord,
                            change_delta: ideal,
                            mismatch: 0.0,
                        };
                    };

                    let carried = match carry {
                        Carry::Nothing => 0.0,
                        Carry::Local => variable.mismatch,
                        Carry::Global => state.ledgers[i].get(coord).copied().unwrap_or(0.0),
                    };
                    let change_delta = round_to_step(ideal + carried, step_size);
                    CoordinateUpdate {
                        coord: *coord,
                        change_delta,
                        mismatch: variable.amplitude * total - (variable.change + change_delta),
                    }
                })
                .collect()
        })
        .collect()
}
