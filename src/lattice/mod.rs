pub mod beamline;
pub mod element;
pub mod error;
pub mod girder;
pub mod parser;

pub use beamline::Beamline;
pub use element::{Coordinate, Element, ElementHandle, ElementType, Offsets};
pub use error::{LatticeError, LatticeErrorKind};
pub use girder::Girder;
