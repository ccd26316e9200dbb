use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnobErrorKind {
    LengthMismatch,
    UnsupportedElementType,
    UnsupportedCoordinate,
    InvalidDescriptor,
    UnknownStrategy,
    InvalidAmplitude,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnobError {
    pub kind: KnobErrorKind,
    pub message: String,
}

impl KnobError {
    pub fn new(kind: KnobErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for KnobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for KnobError {}

pub fn length_mismatch(elements: usize, descriptors: usize) -> KnobError {
    KnobError::new(
        KnobErrorKind::LengthMismatch,
        format!("the number of elements ({elements}) and descriptors ({descriptors}) differ"),
    )
}

pub fn unsupported_element_type(message: impl Into<String>) -> KnobError {
    KnobError::new(KnobErrorKind::UnsupportedElementType, message)
}

pub fn unsupported_coordinate(message: impl Into<String>) -> KnobError {
    KnobError::new(KnobErrorKind::UnsupportedCoordinate, message)
}

pub fn invalid_descriptor(message: impl Into<String>) -> KnobError {
    KnobError::new(KnobErrorKind::InvalidDescriptor, message)
}

pub fn unknown_strategy(name: &str) -> KnobError {
    KnobError::new(
        KnobErrorKind::UnknownStrategy,
        format!(
            "unknown strategy '{name}'; accepted are none, simple, simple_memory, min_scale, min_scale_memory"
        ),
    )
}

pub fn invalid_amplitude(message: impl Into<String>) -> KnobError {
    KnobError::new(KnobErrorKind::InvalidAmplitude, message)
}
