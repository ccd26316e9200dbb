use async_trait::async_trait;

use crate::{
    correction::{
        error::{CorrectionError, invalid_request},
        ports::ObservablePort,
    },
    knob::Knob,
    placet::SimulatorPort,
};

/// Evaluates a knob setting by pushing the knob's element offsets into the
/// simulator, running a tracking command, and reading one result variable.
pub struct SimulatorObservable<S> {
    simulator: S,
    command: String,
    variable: String,
}

impl<S: SimulatorPort> SimulatorObservable<S> {
    pub fn new(simulator: S, command: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            simulator,
            command: command.into(),
            variable: variable.into(),
        }
    }

    pub fn simulator_mut(&mut self) -> &mut S {
        &mut self.simulator
    }

    pub fn into_inner(self) -> S {
        self.simulator
    }
}

#[async_trait(?Send)]
impl<S: SimulatorPort> ObservablePort for SimulatorObservable<S> {
    async fn evaluate(&mut self, knob: &Knob) -> Result<f64, CorrectionError> {
        let placements = knob
            .elements()
            .iter()
            .map(|handle| {
                let element = handle.borrow();
                element.index.map(|index| (index, element.offsets)).ok_or_else(|| {
                    invalid_request(format!(
                        "element '{}' of knob '{}' is not placed in a beamline",
                        element.name,
                        knob.name()
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (index, offsets) in &placements {
            self.simulator.element_set_to_offset(*index, offsets).await?;
        }
        self.simulator.run_command(&self.command).await?;
        let value = self.simulator.read_scalar(&self.variable).await?;

        tracing::debug!(
            target: "correction",
            knob = %knob.name(),
            amplitude = knob.amplitude(),
            variable = %self.variable,
            value = value,
            "observable_evaluated"
        );
        Ok(value)
    }
}
