use std::fmt;

use crate::knob::KnobError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatticeErrorKind {
    InvalidRequest,
    UnknownCoordinate,
    UnknownElementType,
    ElementNotInBeamline,
    KnobAlreadyAttached,
    UnknownKnob,
    EmptyCache,
    Parse,
    Io,
    Knob,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatticeError {
    pub kind: LatticeErrorKind,
    pub message: String,
}

impl LatticeError {
    pub fn new(kind: LatticeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for LatticeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for LatticeError {}

impl From<KnobError> for LatticeError {
    fn from(err: KnobError) -> Self {
        LatticeError::new(LatticeErrorKind::Knob, err.message)
    }
}

pub fn invalid_request(message: impl Into<String>) -> LatticeError {
    LatticeError::new(LatticeErrorKind::InvalidRequest, message)
}

pub fn unknown_coordinate(name: &str) -> LatticeError {
    LatticeError::new(
        LatticeErrorKind::UnknownCoordinate,
        format!("incorrect coordinate '{name}'; accepted are x, y, xp, yp, roll"),
    )
}

pub fn unknown_element_type(name: &str) -> LatticeError {
    LatticeError::new(
        LatticeErrorKind::UnknownElementType,
        format!("unsupported element type '{name}'"),
    )
}

pub fn element_not_in_beamline(message: impl Into<String>) -> LatticeError {
    LatticeError::new(LatticeErrorKind::ElementNotInBeamline, message)
}

pub fn knob_already_attached(name: &str) -> LatticeError {
    LatticeError::new(
        LatticeErrorKind::KnobAlreadyAttached,
        format!("knob '{name}' is already attached"),
    )
}

pub fn unknown_knob(name: &str) -> LatticeError {
    LatticeError::new(
        LatticeErrorKind::UnknownKnob,
        format!("no knob named '{name}' is attached"),
    )
}

pub fn empty_cache(message: impl Into<String>) -> LatticeError {
    LatticeError::new(LatticeErrorKind::EmptyCache, message)
}

pub fn parse_error(line_no: usize, message: impl Into<String>) -> LatticeError {
    LatticeError::new(
        LatticeErrorKind::Parse,
        format!("line {line_no}: {}", message.into()),
    )
}

pub fn io_error(message: impl Into<String>) -> LatticeError {
    LatticeError::new(LatticeErrorKind::Io, message)
}
