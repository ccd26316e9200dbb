use std::collections::BTreeMap;

use crate::{
    knob::{
        error::{
            KnobError, invalid_amplitude, invalid_descriptor, length_mismatch,
            unsupported_coordinate, unsupported_element_type,
        },
        strategy::{ApplyPlan, KnobState, plan},
        types::{
            ApplyOptions, CoordinateSpec, CoordinateVariable, KnobOptions, KnobSnapshot,
            KnobVariables, Strategy,
        },
    },
    lattice::{Coordinate, ElementHandle, ElementType},
};

/// Element types a knob may move.
pub const ACCEPTED_TYPES: [ElementType; 2] = [ElementType::Quadrupole, ElementType::Cavity];

/// A reusable offset pattern applied fractionally across a fixed set of
/// elements.
///
/// Elements are shared: other knobs and the owning [`crate::lattice::Beamline`]
/// hold handles to the same elements, and all of them read and write each
/// element's mismatch ledger.
#[derive(Debug)]
pub struct Knob {
    name: String,
    elements: Vec<ElementHandle>,
    variables: Vec<KnobVariables>,
    amplitude: f64,
    amplitude_mismatch: f64,
    supported_amplitudes: Option<Vec<f64>>,
    cache: Option<KnobSnapshot>,
}

impl Knob {
    pub fn new(
        elements: Vec<ElementHandle>,
        descriptors: Vec<BTreeMap<String, CoordinateSpec>>,
        options: KnobOptions,
    ) -> Result<Self, KnobError> {
        if elements.len() != descriptors.len() {
            return Err(length_mismatch(elements.len(), descriptors.len()));
        }

        for element in &elements {
            let element_type = element.element_type();
            if !ACCEPTED_TYPES.contains(&element_type) {
                return Err(unsupported_element_type(format!(
                    "inappropriate element type '{element_type}'; accepted are Quadrupole, Cavity"
                )));
            }
        }

        let mut variables = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            let mut parsed = KnobVariables::new();
            for (name, spec) in descriptor {
                let coord = name
                    .parse::<Coordinate>()
                    .map_err(|err| unsupported_coordinate(err.message))?;
                validate_spec(coord, spec)?;
                parsed.insert(coord, CoordinateVariable::from_spec(spec));
            }
            variables.push(parsed);
        }

        if let Some(amplitudes) = &options.supported_amplitudes {
            validate_supported_amplitudes(amplitudes)?;
        }

        for (element, vars) in elements.iter().zip(&variables) {
            for coord in vars.keys() {
                element.touch_mismatch(*coord);
            }
        }

        Ok(Self {
            name: options.name,
            elements,
            variables,
            amplitude: 0.0,
            amplitude_mismatch: 0.0,
            supported_amplitudes: options.supported_amplitudes,
            cache: None,
        })
    }

    /// Knob moving the same coordinate on every element, one amplitude per element.
    pub fn single_coordinate(
        elements: Vec<ElementHandle>,
        coord: &str,
        amplitudes: &[f64],
        step_size: Option<f64>,
        options: KnobOptions,
    ) -> Result<Self, KnobError> {
        let descriptors = amplitudes
            .iter()
            .map(|amplitude| {
                let spec = CoordinateSpec {
                    amplitude: *amplitude,
                    step_size,
                };
                BTreeMap::from([(coord.to_string(), spec)])
            })
            .collect();
        Self::new(elements, descriptors, options)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn elements(&self) -> &[ElementHandle] {
        &self.elements
    }

    pub fn variables(&self) -> &[KnobVariables] {
        &self.variables
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    pub fn amplitude_mismatch(&self) -> f64 {
        self.amplitude_mismatch
    }

    pub fn supported_amplitudes(&self) -> Option<&[f64]> {
        self.supported_amplitudes.as_deref()
    }

    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    pub fn snapshot(&self) -> KnobSnapshot {
        KnobSnapshot {
            amplitude: self.amplitude,
            amplitude_mismatch: self.amplitude_mismatch,
            variables: self.variables.clone(),
        }
    }

    /// Moves the knob by `amplitude` (an increment, not an absolute setting).
    pub fn apply(
        &mut self,
        amplitude: f64,
        strategy: Strategy,
        options: &ApplyOptions,
    ) -> Result<(), KnobError> {
        if !amplitude.is_finite() {
            return Err(invalid_amplitude(format!(
                "knob '{}' cannot be applied with amplitude {amplitude}",
                self.name
            )));
        }

        let state = self.state();
        let plan = plan(strategy, &state, amplitude, options);
        tracing::debug!(
            target: "knob",
            knob = %self.name,
            strategy = %strategy,
            requested = amplitude,
            applied = plan.amplitude - self.amplitude,
            amplitude = plan.amplitude,
            amplitude_mismatch = plan.amplitude_mismatch,
            "knob_applied"
        );
        self.commit(plan);
        Ok(())
    }

    fn state(&self) -> KnobState<'_> {
        let ledgers = self
            .elements
            .iter()
            .zip(&self.variables)
            .map(|(element, variables)| {
                variables
                    .keys()
                    .map(|coord| (*coord, element.mismatch(*coord)))
                    .collect()
            })
            .collect();

        KnobState {
            name: &self.name,
            amplitude: self.amplitude,
            amplitude_mismatch: self.amplitude_mismatch,
            variables: &self.variables,
            ledgers,
            supported_amplitudes: self.supported_amplitudes.as_deref(),
        }
    }

    fn commit(&mut self, plan: ApplyPlan) {
        for ((element, variables), updates) in self
            .elements
            .iter()
            .zip(self.variables.iter_mut())
            .zip(plan.updates)
        {
            for update in updates {
                let Some(variable) = variables.get_mut(&update.coord) else {
                    continue;
                };
                element.shift(update.coord, update.change_delta);
                element.add_mismatch(update.coord, update.mismatch - variable.mismatch);
                variable.change += update.change_delta;
                variable.mismatch = update.mismatch;
            }
        }
        self.amplitude = plan.amplitude;
        self.amplitude_mismatch = plan.amplitude_mismatch;
    }

    /// Undoes every change this knob made and withdraws its share of the
    /// element ledgers.
    pub fn reset(&mut self) {
        if self.cache.is_some() {
            tracing::warn!(
                target: "knob",
                knob = %self.name,
                "knob reset while a cached state is held; uploading the cache will reapply it"
            );
        }

        for (element, variables) in self.elements.iter().zip(self.variables.iter_mut()) {
            for (coord, variable) in variables.iter_mut() {
                element.shift(*coord, -variable.change);
                element.add_mismatch(*coord, -variable.mismatch);
                variable.change = 0.0;
                variable.mismatch = 0.0;
            }
        }
        self.amplitude = 0.0;
        self.amplitude_mismatch = 0.0;
    }

    pub fn cache_state(&mut self) {
        self.cache = Some(self.snapshot());
    }

    /// Returns to the cached state by moving elements and ledgers by the
    /// difference from the current state. Returns `false` when nothing is cached.
    pub fn upload_state_from_cache(&mut self, clear_cache: bool) -> bool {
        let Some(cached) = self.cache.clone() else {
            tracing::warn!(
                target: "knob",
                knob = %self.name,
                "no cached state to upload"
            );
            return false;
        };

        for ((element, current), stored) in self
            .elements
            .iter()
            .zip(&self.variables)
            .zip(&cached.variables)
        {
            for (coord, variable) in current {
                let Some(target) = stored.get(coord) else {
                    continue;
                };
                element.shift(*coord, target.change - variable.change);
                element.add_mismatch(*coord, target.mismatch - variable.mismatch);
            }
        }

        self.amplitude = cached.amplitude;
        self.amplitude_mismatch = cached.amplitude_mismatch;
        self.variables = cached.variables;
        if clear_cache {
            self.cache = None;
        }
        true
    }
}

fn validate_spec(coord: Coordinate, spec: &CoordinateSpec) -> Result<(), KnobError> {
    if !spec.amplitude.is_finite() {
        return Err(invalid_descriptor(format!(
            "amplitude of '{coord}' must be finite, got {}",
            spec.amplitude
        )));
    }
    if let Some(step_size) = spec.step_size {
        if !step_size.is_finite() || step_size < 0.0 {
            return Err(invalid_descriptor(format!(
                "step size of '{coord}' must be a non-negative number, got {step_size}"
            )));
        }
    }
    Ok(())
}

fn validate_supported_amplitudes(amplitudes: &[f64]) -> Result<(), KnobError> {
    if amplitudes.is_empty() {
        return Err(invalid_descriptor("supported amplitudes cannot be empty"));
    }
    if amplitudes.iter().any(|value| !value.is_finite()) {
        return Err(invalid_descriptor("supported amplitudes must be finite"));
    }
    if amplitudes.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(invalid_descriptor(
            "supported amplitudes must be strictly ascending",
        ));
    }
    Ok(())
}
