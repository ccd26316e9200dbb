pub mod command;
pub mod communicator;
pub mod error;
pub mod ports;
pub mod types;

pub use communicator::Communicator;
pub use error::PlacetError;
pub use ports::SimulatorPort;
pub use types::CommunicatorConfig;
