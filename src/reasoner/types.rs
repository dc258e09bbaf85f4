use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ReasonerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Nop,
    AskUser,
    ShowHelp,
    Ignore,
}

impl Action {
    pub const ALL: [Action; 4] = [Self::Nop, Self::AskUser, Self::ShowHelp, Self::Ignore];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nop => "nop",
            Self::AskUser => "askuser",
            Self::ShowHelp => "showhelp",
            Self::Ignore => "ignore",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "nop" => Some(Self::Nop),
            "askuser" => Some(Self::AskUser),
            "showhelp" => Some(Self::ShowHelp),
            "ignore" => Some(Self::Ignore),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The reasoner's running belief about the user. Only shapes reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserMood {
    #[default]
    Relaxed,
    Confused,
    Unsure,
}

impl UserMood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relaxed => "relaxed",
            Self::Confused => "confused",
            Self::Unsure => "unsure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Help,
    Ok,
}

impl Feedback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::Ok => "ok",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "help" => Some(Self::Help),
            "ok" => Some(Self::Ok),
            _ => None,
        }
    }

    pub fn mood(&self) -> UserMood {
        match self {
            Self::Help => UserMood::Confused,
            Self::Ok => UserMood::Relaxed,
        }
    }
}

/// Whether incoming samples describe the user before or after the last action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CollectPhase {
    #[default]
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    None,
    #[default]
    QLearning,
    DoubleQLearning,
}

impl ModelKind {
    pub fn parse(s: &str) -> Self {
        let lower = s.to_lowercase();
        if lower.starts_with("double") {
            Self::DoubleQLearning
        } else if lower.starts_with("q_learning") || lower == "q" {
            Self::QLearning
        } else {
            Self::None
        }
    }
}

/// A single telemetry field. Trackers emit numbers, but also textual
/// values and `null` for fields they could not measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Text(String),
    Missing,
}

impl FeatureValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) if !v.is_nan() => Some(*v),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|v| !v.is_nan()),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_number().is_some()
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// One raw observation: feature name to value. Ordered by name so that
/// samples with the same key set always produce aligned columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TelemetrySample {
    pub fields: BTreeMap<String, FeatureValue>,
}

impl TelemetrySample {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<FeatureValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn from_json(text: &str) -> Result<Self, ReasonerError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<FeatureValue> {
        self.fields.values().cloned().collect()
    }

    pub fn same_keys(&self, labels: &[String]) -> bool {
        self.fields.len() == labels.len() && self.fields.keys().zip(labels).all(|(a, b)| a == b)
    }
}

/// Gaze position (viewport-relative) of the state being reasoned about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GazeInfo {
    pub points: Vec<(f64, f64)>,
}

impl GazeInfo {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Canonical table key for a numeric state vector.
///
/// Components are rounded to `precision` decimals and negative zero is
/// folded into zero, so vectors that differ only below that precision
/// share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey(String);

impl StateKey {
    pub const DEFAULT_PRECISION: u32 = 4;

    pub fn from_values(values: &[f64], precision: u32) -> Self {
        let scale = 10f64.powi(precision as i32);
        let parts: Vec<String> = values
            .iter()
            .map(|&v| {
                if v.is_nan() {
                    "nan".to_string()
                } else if v == f64::INFINITY {
                    "inf".to_string()
                } else if v == f64::NEG_INFINITY {
                    "-inf".to_string()
                } else {
                    // `+ 0.0` turns -0.0 into 0.0
                    let rounded = (v * scale).round() / scale + 0.0;
                    format!("{:.*}", precision as usize, rounded)
                }
            })
            .collect();
        Self(parts.join(","))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
