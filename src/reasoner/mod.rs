pub mod config;
pub mod decision;
pub mod engine;
pub mod modeling;
pub mod timers;
pub mod types;

pub use config::ReasonerConfig;
pub use engine::{Reasoner, ReasonerStatus};
pub use timers::{ArmedWait, WaitKind, WaitStatus, WaitToken};
pub use types::{
    Action, CollectPhase, FeatureValue, Feedback, GazeInfo, ModelKind, StateKey, TelemetrySample,
    UserMood,
};
