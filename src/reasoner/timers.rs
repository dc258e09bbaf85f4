use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitKind {
    /// Idle timeout after an action before feedback is inferred.
    Feedback,
    /// Whether a triggered help tool was left open long enough to count.
    HelpEstimate,
    /// Time given to collect the post-action state before updating.
    NextState,
    /// Automatic reset of a reasoner left paused.
    Unfreeze,
}

impl WaitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feedback => "feedback",
            Self::HelpEstimate => "help_estimate",
            Self::NextState => "next_state",
            Self::Unfreeze => "unfreeze",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitToken(u64);

#[derive(Debug, Clone, Copy)]
pub struct ArmedWait {
    pub kind: WaitKind,
    pub token: WaitToken,
    pub started: Instant,
    pub timeout: Duration,
}

impl ArmedWait {
    pub fn deadline(&self) -> Instant {
        self.started + self.timeout
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) >= self.timeout
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// Not due yet, check again next tick.
    Pending,
    /// Completion action ran; the wait is over.
    Fired,
    /// Token was superseded or cancelled.
    Stale,
}

/// At most one live wait per kind. Arming a kind hands out a fresh token
/// and silently invalidates the previous one, so a tick loop still
/// holding the old token sees `Stale` on its next check.
#[derive(Debug, Default)]
pub struct WaitRegistry {
    next_token: u64,
    active: HashMap<WaitKind, ArmedWait>,
    newly_armed: Vec<ArmedWait>,
}

impl WaitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, kind: WaitKind, timeout: Duration, now: Instant) -> WaitToken {
        self.next_token += 1;
        let wait = ArmedWait {
            kind,
            token: WaitToken(self.next_token),
            started: now,
            timeout,
        };
        self.active.insert(kind, wait);
        self.newly_armed.retain(|w| w.kind != kind);
        self.newly_armed.push(wait);
        wait.token
    }

    pub fn cancel(&mut self, kind: WaitKind) {
        self.active.remove(&kind);
        self.newly_armed.retain(|w| w.kind != kind);
    }

    pub fn cancel_all(&mut self) {
        self.active.clear();
        self.newly_armed.clear();
    }

    pub fn current(&self, kind: WaitKind, token: WaitToken) -> Option<ArmedWait> {
        self.active
            .get(&kind)
            .filter(|w| w.token == token)
            .copied()
    }

    pub fn armed(&self, kind: WaitKind) -> Option<ArmedWait> {
        self.active.get(&kind).copied()
    }

    pub fn is_armed(&self, kind: WaitKind) -> bool {
        self.active.contains_key(&kind)
    }

    /// Waits armed since the last call, for the driver to schedule.
    pub fn take_newly_armed(&mut self) -> Vec<ArmedWait> {
        std::mem::take(&mut self.newly_armed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rearming_invalidates_previous_token() {
        let mut registry = WaitRegistry::new();
        let now = Instant::now();
        let first = registry.arm(WaitKind::Unfreeze, Duration::from_secs(1), now);
        let second = registry.arm(WaitKind::Unfreeze, Duration::from_secs(1), now);
        assert_ne!(first, second);
        assert!(registry.current(WaitKind::Unfreeze, first).is_none());
        assert!(registry.current(WaitKind::Unfreeze, second).is_some());
        // only the live one is handed to the driver
        let armed = registry.take_newly_armed();
        assert_eq!(armed.len(), 1);
        assert_eq!(armed[0].token, second);
        assert!(registry.take_newly_armed().is_empty());
    }

    #[test]
    fn kinds_are_independent() {
        let mut registry = WaitRegistry::new();
        let now = Instant::now();
        let feedback = registry.arm(WaitKind::Feedback, Duration::from_secs(10), now);
        registry.arm(WaitKind::NextState, Duration::from_secs(10), now);
        registry.cancel(WaitKind::NextState);
        assert!(registry.current(WaitKind::Feedback, feedback).is_some());
        assert!(!registry.is_armed(WaitKind::NextState));
        registry.cancel_all();
        assert!(!registry.is_armed(WaitKind::Feedback));
    }

    #[test]
    fn due_after_timeout() {
        let mut registry = WaitRegistry::new();
        let now = Instant::now();
        registry.arm(WaitKind::Feedback, Duration::from_millis(500), now);
        let wait = registry.armed(WaitKind::Feedback).unwrap();
        assert!(!wait.is_due(now + Duration::from_millis(499)));
        assert!(wait.is_due(wait.deadline()));
    }
}
