pub mod cli;
pub mod config;
pub mod correction;
pub mod knob;
pub mod lattice;
pub mod logging;
pub mod machine;
pub mod placet;
