use async_trait::async_trait;

use crate::{
    lattice::Offsets,
    placet::{communicator::Communicator, error::PlacetError},
};

/// What the correction layer needs from a running simulator.
#[async_trait]
pub trait SimulatorPort: Send {
    async fn run_command(&mut self, command: &str) -> Result<Vec<String>, PlacetError>;

    /// Next reply line beyond what `run_command` consumed.
    async fn read_line(&mut self) -> Result<String, PlacetError>;

    async fn set_variable(&mut self, name: &str, value: &str) -> Result<(), PlacetError>;

    async fn read_scalar(&mut self, name: &str) -> Result<f64, PlacetError>;

    async fn read_list(&mut self, name: &str) -> Result<Vec<f64>, PlacetError>;

    async fn element_set_to_offset(
        &mut self,
        index: usize,
        offsets: &Offsets,
    ) -> Result<(), PlacetError>;
}

#[async_trait]
impl SimulatorPort for Communicator {
    async fn run_command(&mut self, command: &str) -> Result<Vec<String>, PlacetError> {
        Communicator::run_command(self, command).await
    }

    async fn read_line(&mut self) -> Result<String, PlacetError> {
        Communicator::read_line(self).await
    }

    async fn set_variable(&mut self, name: &str, value: &str) -> Result<(), PlacetError> {
        Communicator::set_variable(self, name, value).await
    }

    async fn read_scalar(&mut self, name: &str) -> Result<f64, PlacetError> {
        Communicator::read_scalar(self, name).await
    }

    async fn read_list(&mut self, name: &str) -> Result<Vec<f64>, PlacetError> {
        Communicator::read_list(self, name).await
    }

    async fn element_set_to_offset(
        &mut self,
        index: usize,
        offsets: &Offsets,
    ) -> Result<(), PlacetError> {
        Communicator::element_set_to_offset(self, index, offsets).await
    }
}
