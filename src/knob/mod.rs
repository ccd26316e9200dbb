pub mod error;
#[allow(clippy::module_inception)]
pub mod knob;
pub mod quantize;
pub mod report;
mod strategy;
pub mod types;

pub use error::{KnobError, KnobErrorKind};
pub use knob::{ACCEPTED_TYPES, Knob};
pub use report::{CoordinateReport, KnobReport, KnobReportRow};
pub use types::{
    ApplyOptions, CoordinateSpec, CoordinateVariable, KnobOptions, KnobSnapshot, KnobVariables,
    Strategy,
};
