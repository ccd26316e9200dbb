pub mod alignment;
pub mod error;
pub mod fit;
pub mod knob_scan;
pub mod observable;
pub mod ports;
pub mod survey;

pub use alignment::{Alignment, CommandOptions, CorrectionKind, DfsOptions, TrackingSummary};
pub use error::{CorrectionError, CorrectionErrorKind};
pub use fit::{ParabolaFit, fit_parabola};
pub use knob_scan::{KnobScanConfig, KnobScanResult, ScanPass, ScanPoint, iterate_knob, knob_scan};
pub use observable::SimulatorObservable;
pub use ports::ObservablePort;
pub use survey::{GirderScatter, Survey, SurveyErrors};
