use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ReasonerError;
use crate::reasoner::decision::PreferredTieBreak;
use crate::reasoner::types::{ModelKind, StateKey};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasonerConfig {
    pub model: ModelKind,
    /// Step size (alpha).
    pub learning_rate: f64,
    /// Discount factor (gamma).
    pub discount: f64,
    pub epsilon: f64,
    /// Multiplied into epsilon after every prediction.
    pub epsilon_decay: f64,
    /// UCB exploration constant; 0 disables the bonus.
    pub ucb_c: f64,
    /// Updates per episode before the episode listener fires.
    pub episode_length: u64,
    pub buffer_capacity: usize,
    /// Samples needed in the pre-action buffer before predicting.
    pub min_samples: usize,
    pub idle_timeout_ms: u64,
    pub next_state_timeout_ms: u64,
    pub unfreeze_timeout_ms: u64,
    pub tick_ms: u64,
    /// Decimal places kept when turning a state into a table key.
    pub state_precision: u32,
    pub tie_break: PreferredTieBreak,
    /// Forces the reasoner permanently inactive.
    pub testing: bool,
    pub seed: Option<u64>,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::QLearning,
            learning_rate: 0.01,
            discount: 0.1,
            epsilon: 0.1,
            epsilon_decay: 1.0,
            ucb_c: 0.0,
            episode_length: 20,
            buffer_capacity: 5,
            min_samples: 1,
            idle_timeout_ms: 10_000,
            next_state_timeout_ms: 10_000,
            unfreeze_timeout_ms: 120_000,
            tick_ms: 500,
            state_precision: StateKey::DEFAULT_PRECISION,
            tie_break: PreferredTieBreak::Inclusive,
            testing: false,
            seed: None,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|val| val.trim().parse().ok())
}

impl ReasonerConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("REASONER_MODEL") {
            config.model = ModelKind::parse(&val);
        }
        if let Some(val) = env_parse("REASONER_LEARNING_RATE") {
            config.learning_rate = val;
        }
        if let Some(val) = env_parse("REASONER_DISCOUNT") {
            config.discount = val;
        }
        if let Some(val) = env_parse("REASONER_EPSILON") {
            config.epsilon = val;
        }
        if let Some(val) = env_parse("REASONER_EPSILON_DECAY") {
            config.epsilon_decay = val;
        }
        if let Some(val) = env_parse("REASONER_UCB") {
            config.ucb_c = val;
        }
        if let Some(val) = env_parse("REASONER_EPISODE_LENGTH") {
            config.episode_length = val;
        }
        if let Some(val) = env_parse("REASONER_BUFFER_SIZE") {
            config.buffer_capacity = val;
        }
        if let Some(val) = env_parse("REASONER_IDLE_MS") {
            config.idle_timeout_ms = val;
        }
        if let Some(val) = env_parse("REASONER_NEXT_STATE_MS") {
            config.next_state_timeout_ms = val;
        }
        if let Some(val) = env_parse("REASONER_UNFREEZE_MS") {
            config.unfreeze_timeout_ms = val;
        }
        if let Some(val) = env_parse("REASONER_TICK_MS") {
            config.tick_ms = val;
        }
        if let Ok(val) = std::env::var("REASONER_TESTING") {
            config.testing = val == "true" || val == "1";
        }
        if let Some(val) = env_parse("REASONER_SEED") {
            config.seed = Some(val);
        }

        config
    }

    pub fn validate(&self) -> Result<(), ReasonerError> {
        let fail = |msg: String| Err(ReasonerError::InvalidConfig(msg));

        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return fail(format!("learning_rate {} not in (0, 1]", self.learning_rate));
        }
        if !(0.0..=1.0).contains(&self.discount) {
            return fail(format!("discount {} not in [0, 1]", self.discount));
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return fail(format!("epsilon {} not in [0, 1]", self.epsilon));
        }
        if !(self.epsilon_decay > 0.0 && self.epsilon_decay <= 1.0) {
            return fail(format!("epsilon_decay {} not in (0, 1]", self.epsilon_decay));
        }
        if !(self.ucb_c.is_finite() && self.ucb_c >= 0.0) {
            return fail(format!("ucb_c {} must be finite and >= 0", self.ucb_c));
        }
        if self.episode_length == 0 {
            return fail("episode_length must be positive".to_string());
        }
        if self.buffer_capacity == 0 {
            return fail("buffer_capacity must be positive".to_string());
        }
        if self.min_samples == 0 || self.min_samples > self.buffer_capacity {
            return fail(format!(
                "min_samples {} not in [1, {}]",
                self.min_samples, self.buffer_capacity
            ));
        }
        if self.tick_ms == 0 {
            return fail("tick_ms must be positive".to_string());
        }
        if self.state_precision > 12 {
            return fail(format!("state_precision {} above 12", self.state_precision));
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn next_state_timeout(&self) -> Duration {
        Duration::from_millis(self.next_state_timeout_ms)
    }

    pub fn unfreeze_timeout(&self) -> Duration {
        Duration::from_millis(self.unfreeze_timeout_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ReasonerConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_min_samples_above_capacity() {
        let config = ReasonerConfig {
            buffer_capacity: 3,
            min_samples: 4,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ReasonerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_zero_learning_rate() {
        let config = ReasonerConfig {
            learning_rate: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_partial_json_over_defaults() {
        let config: ReasonerConfig =
            serde_json::from_str(r#"{"model": "double_q_learning", "ucb_c": 2.0}"#).unwrap();
        assert_eq!(config.model, ModelKind::DoubleQLearning);
        assert_eq!(config.ucb_c, 2.0);
        assert_eq!(config.buffer_capacity, 5);
        assert_eq!(config.tie_break, PreferredTieBreak::Inclusive);
    }
}
