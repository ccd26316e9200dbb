use async_trait::async_trait;

use crate::{correction::error::CorrectionError, knob::Knob};

/// Scores the machine in its current state; lower is better.
///
/// Knobs share elements through single-threaded handles, so implementations
/// run on the current thread.
#[async_trait(?Send)]
pub trait ObservablePort {
    async fn evaluate(&mut self, knob: &Knob) -> Result<f64, CorrectionError>;
}
