use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    knob::error::{KnobError, unknown_strategy},
    lattice::Coordinate,
};

/// Construction input for one coordinate of one element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateSpec {
    pub amplitude: f64,
    #[serde(default)]
    pub step_size: Option<f64>,
}

impl CoordinateSpec {
    pub fn new(amplitude: f64) -> Self {
        Self {
            amplitude,
            step_size: None,
        }
    }

    pub fn with_step_size(mut self, step_size: f64) -> Self {
        self.step_size = Some(step_size);
        self
    }
}

/// Running state of one coordinate of one element under a knob.
///
/// `change` is what the knob has moved the coordinate by so far; `mismatch` is
/// `amplitude * knob_amplitude - change`, the part the actuator grid swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateVariable {
    pub amplitude: f64,
    pub step_size: Option<f64>,
    pub change: f64,
    pub mismatch: f64,
}

impl CoordinateVariable {
    pub fn from_spec(spec: &CoordinateSpec) -> Self {
        Self {
            amplitude: spec.amplitude,
            step_size: spec.step_size.filter(|step| *step != 0.0),
            change: 0.0,
            mismatch: 0.0,
        }
    }
}

pub type KnobVariables = BTreeMap<Coordinate, CoordinateVariable>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    #[serde(rename = "none")]
    Unquantized,
    Simple,
    SimpleMemory,
    MinScale,
    MinScaleMemory,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Unquantized => "none",
            Strategy::Simple => "simple",
            Strategy::SimpleMemory => "simple_memory",
            Strategy::MinScale => "min_scale",
            Strategy::MinScaleMemory => "min_scale_memory",
        }
    }

    pub fn uses_memory(self) -> bool {
        matches!(self, Strategy::SimpleMemory | Strategy::MinScaleMemory)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = KnobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Strategy::Unquantized),
            "simple" => Ok(Strategy::Simple),
            "simple_memory" => Ok(Strategy::SimpleMemory),
            "min_scale" => Ok(Strategy::MinScale),
            "min_scale_memory" => Ok(Strategy::MinScaleMemory),
            other => Err(unknown_strategy(other)),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOptions {
    /// Memory strategies fold the element's shared ledger into the rounding
    /// when set, otherwise only this knob's own mismatch.
    #[serde(default = "default_true")]
    pub use_global_mismatch: bool,
    /// Snap the knob amplitude onto the supported list, when one is configured.
    #[serde(default = "default_true")]
    pub use_supported_amplitudes: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            use_global_mismatch: true,
            use_supported_amplitudes: true,
        }
    }
}

impl ApplyOptions {
    pub fn local_mismatch() -> Self {
        Self {
            use_global_mismatch: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnobOptions {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub supported_amplitudes: Option<Vec<f64>>,
}

impl KnobOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supported_amplitudes: None,
        }
    }

    pub fn with_supported_amplitudes(mut self, amplitudes: Vec<f64>) -> Self {
        self.supported_amplitudes = Some(amplitudes);
        self
    }
}

/// Value copy of the mutable part of a knob, kept for rollback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnobSnapshot {
    pub amplitude: f64,
    pub amplitude_mismatch: f64,
    pub variables: Vec<KnobVariables>,
}
