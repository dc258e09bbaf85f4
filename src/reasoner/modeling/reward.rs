use crate::reasoner::types::{Feedback, UserMood};

/// Reward for the user's reported state given what the reasoner believed
/// when it acted. Missing a confused user is by far the worst outcome.
pub fn feedback_reward(feedback: Feedback, prior: UserMood) -> f64 {
    match (feedback.mood(), prior) {
        (UserMood::Confused, UserMood::Confused) => 10.0,
        (UserMood::Confused, UserMood::Relaxed) => -200.0,
        (UserMood::Confused, UserMood::Unsure) => -10.0,
        (UserMood::Relaxed, UserMood::Confused) => -20.0,
        (UserMood::Relaxed, UserMood::Relaxed) => 1.0,
        (UserMood::Relaxed, UserMood::Unsure) => -10.0,
        (UserMood::Unsure, _) => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reward_table() {
        let cases = [
            (Feedback::Help, UserMood::Confused, 10.0),
            (Feedback::Help, UserMood::Relaxed, -200.0),
            (Feedback::Help, UserMood::Unsure, -10.0),
            (Feedback::Ok, UserMood::Confused, -20.0),
            (Feedback::Ok, UserMood::Relaxed, 1.0),
            (Feedback::Ok, UserMood::Unsure, -10.0),
        ];
        for (feedback, prior, expected) in cases {
            assert_eq!(feedback_reward(feedback, prior), expected, "{feedback:?} after {prior:?}");
        }
    }
}
