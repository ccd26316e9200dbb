use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{knob::KnobError, lattice::LatticeError, placet::PlacetError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionErrorKind {
    InvalidRequest,
    Knob,
    Lattice,
    Simulator,
    Fit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionError {
    pub kind: CorrectionErrorKind,
    pub message: String,
}

impl CorrectionError {
    pub fn new(kind: CorrectionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for CorrectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CorrectionError {}

impl From<KnobError> for CorrectionError {
    fn from(err: KnobError) -> Self {
        CorrectionError::new(CorrectionErrorKind::Knob, err.message)
    }
}

impl From<LatticeError> for CorrectionError {
    fn from(err: LatticeError) -> Self {
        CorrectionError::new(CorrectionErrorKind::Lattice, err.message)
    }
}

impl From<PlacetError> for CorrectionError {
    fn from(err: PlacetError) -> Self {
        CorrectionError::new(CorrectionErrorKind::Simulator, err.to_string())
    }
}

pub fn invalid_request(message: impl Into<String>) -> CorrectionError {
    CorrectionError::new(CorrectionErrorKind::InvalidRequest, message)
}

pub fn simulator_error(message: impl Into<String>) -> CorrectionError {
    CorrectionError::new(CorrectionErrorKind::Simulator, message)
}

pub fn fit_error(message: impl Into<String>) -> CorrectionError {
    CorrectionError::new(CorrectionErrorKind::Fit, message)
}
