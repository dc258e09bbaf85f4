pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod reasoner;
pub mod telemetry;

pub use error::ReasonerError;
