use rand::Rng;

use crate::reasoner::decision::action_value::ActionValueTable;
use crate::reasoner::types::Action;

/// One observed step: S, A, R, S'.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: Vec<f64>,
    pub action: Action,
    pub reward: f64,
    pub next_state: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatedTable {
    A,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TdOutcome {
    pub table: UpdatedTable,
    pub target: f64,
    pub delta: f64,
}

/// Q(s,a) += alpha * (r + gamma * max_a' Q(s',a') - Q(s,a))
pub fn q_learning_update(
    table: &mut ActionValueTable,
    tr: &Transition,
    alpha: f64,
    gamma: f64,
) -> TdOutcome {
    let target = tr.reward + gamma * table.max_value(&tr.next_state);
    let delta = alpha * (target - table.value(&tr.state, tr.action));
    table.update(&tr.state, tr.action, delta);
    TdOutcome {
        table: UpdatedTable::A,
        target,
        delta,
    }
}

/// Double Q-learning: a fair coin picks the table to update. The greedy
/// action at S' comes from that table, its value from the other one.
pub fn double_q_learning_update<R: Rng>(
    a: &mut ActionValueTable,
    b: &mut ActionValueTable,
    tr: &Transition,
    alpha: f64,
    gamma: f64,
    rng: &mut R,
) -> TdOutcome {
    let which = if rng.random::<f64>() < 0.5 {
        UpdatedTable::B
    } else {
        UpdatedTable::A
    };
    let (learner, evaluator) = match which {
        UpdatedTable::A => (a, &*b),
        UpdatedTable::B => (b, &*a),
    };

    let next_value = learner
        .best_action(&tr.next_state, rng)
        .map(|best| evaluator.value(&tr.next_state, best))
        .unwrap_or(0.0);
    let target = tr.reward + gamma * next_value;
    let delta = alpha * (target - learner.value(&tr.state, tr.action));
    learner.update(&tr.state, tr.action, delta);

    TdOutcome {
        table: which,
        target,
        delta,
    }
}
