//! Decoding of the inbound stream: JSON telemetry objects, keep-alive
//! pings and plain-text control commands, one per line.

use serde_json::Value;

use crate::error::ReasonerError;
use crate::reasoner::{Feedback, ModelKind, TelemetrySample};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Feedback(Feedback),
    /// Help tool closed by the user.
    Cancel,
    /// Help tool used to completion.
    Done,
    /// Help tool opened; starts the help estimate.
    Help,
    Freeze,
    Unfreeze,
    Enable,
    Disable,
    Reset,
    Load(ModelKind),
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, ReasonerError> {
        let mut parts = line.split_whitespace();
        let verb = parts.next().unwrap_or_default().to_ascii_lowercase();
        let arg = parts.next();

        let command = match (verb.as_str(), arg) {
            ("feedback", Some(value)) => Feedback::parse(value)
                .map(Self::Feedback)
                .ok_or_else(|| ReasonerError::UnknownCommand(line.to_string()))?,
            ("cancel", None) => Self::Cancel,
            ("done", None) => Self::Done,
            ("help", None) => Self::Help,
            ("freeze", None) => Self::Freeze,
            ("unfreeze", None) => Self::Unfreeze,
            ("enable", None) => Self::Enable,
            ("disable", None) => Self::Disable,
            ("reset", None) => Self::Reset,
            ("load", Some(kind)) => Self::Load(ModelKind::parse(kind)),
            _ => return Err(ReasonerError::UnknownCommand(line.to_string())),
        };
        Ok(command)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Sample(TelemetrySample),
    Ping,
    Command(Command),
}

/// Decodes one line. Blank lines yield `None`.
pub fn decode_line(line: &str) -> Result<Option<Inbound>, ReasonerError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if !line.starts_with('{') {
        return Command::parse(line).map(|c| Some(Inbound::Command(c)));
    }

    let value: Value = serde_json::from_str(line)?;
    if is_ping(&value) {
        return Ok(Some(Inbound::Ping));
    }
    let sample: TelemetrySample = serde_json::from_value(value)?;
    Ok(Some(Inbound::Sample(sample)))
}

fn is_ping(value: &Value) -> bool {
    value
        .as_object()
        .map(|obj| obj.len() == 1 && obj.get("type").and_then(Value::as_str) == Some("ping"))
        .unwrap_or(false)
}
