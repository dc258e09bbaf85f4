use tracing::info;

use crate::reasoner::types::{FeatureValue, GazeInfo};

/// Turns an aggregated labeled sample into the numeric state vector.
/// `None` means the sample cannot be used yet.
pub trait Preprocessor: Send {
    fn preprocess(&self, labels: &[String], values: &[FeatureValue]) -> Option<Vec<f64>>;
}

pub trait GazeExtractor: Send {
    fn extract(&self, labels: &[String], buffer: &[Vec<FeatureValue>]) -> GazeInfo;
}

pub trait EpisodeListener: Send {
    fn episode_end(&mut self, episode: u64);
}

impl<F> EpisodeListener for F
where
    F: FnMut(u64) + Send,
{
    fn episode_end(&mut self, episode: u64) {
        self(episode)
    }
}

/// Accepts a sample only when every used column is numeric.
#[derive(Debug, Clone, Default)]
pub struct NumericPreprocessor {
    skip_labels: Vec<String>,
}

impl NumericPreprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns with these labels are dropped from the state.
    pub fn skipping(labels: &[&str]) -> Self {
        Self {
            skip_labels: labels.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Preprocessor for NumericPreprocessor {
    fn preprocess(&self, labels: &[String], values: &[FeatureValue]) -> Option<Vec<f64>> {
        if values.is_empty() || labels.len() != values.len() {
            return None;
        }
        labels
            .iter()
            .zip(values)
            .filter(|(label, _)| !self.skip_labels.contains(*label))
            .map(|(_, value)| value.as_number())
            .collect()
    }
}

/// Reads `gaze_x` / `gaze_y` columns from every buffered sample.
#[derive(Debug, Clone)]
pub struct LabelGazeExtractor {
    x_label: String,
    y_label: String,
}

impl Default for LabelGazeExtractor {
    fn default() -> Self {
        Self {
            x_label: "gaze_x".to_string(),
            y_label: "gaze_y".to_string(),
        }
    }
}

impl GazeExtractor for LabelGazeExtractor {
    fn extract(&self, labels: &[String], buffer: &[Vec<FeatureValue>]) -> GazeInfo {
        let x_idx = labels.iter().position(|l| *l == self.x_label);
        let y_idx = labels.iter().position(|l| *l == self.y_label);
        let (Some(x_idx), Some(y_idx)) = (x_idx, y_idx) else {
            return GazeInfo::default();
        };
        let points = buffer
            .iter()
            .filter_map(|sample| {
                let x = sample.get(x_idx)?.as_number()?;
                let y = sample.get(y_idx)?.as_number()?;
                Some((x, y))
            })
            .collect();
        GazeInfo { points }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEpisodeListener;

impl EpisodeListener for LoggingEpisodeListener {
    fn episode_end(&mut self, episode: u64) {
        info!(episode, "Episode ended");
    }
}
