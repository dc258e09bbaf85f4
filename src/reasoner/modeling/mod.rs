pub mod aggregate;
pub mod collaborators;
pub mod reward;

pub use aggregate::{aggregate_states, SampleWindow};
pub use collaborators::{
    EpisodeListener, GazeExtractor, LabelGazeExtractor, LoggingEpisodeListener,
    NumericPreprocessor, Preprocessor,
};
pub use reward::feedback_reward;
