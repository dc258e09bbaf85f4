use rand::Rng;

use crate::reasoner::config::ReasonerConfig;
use crate::reasoner::decision::action_value::{ActionValueTable, TableOptions};
use crate::reasoner::decision::td::{
    double_q_learning_update, q_learning_update, TdOutcome, Transition,
};
use crate::reasoner::types::{Action, ModelKind};

/// The learned knowledge of a reasoner. Survives status resets.
#[derive(Debug, Clone)]
pub enum ValueModel {
    Single(ActionValueTable),
    Double {
        a: ActionValueTable,
        b: ActionValueTable,
    },
}

impl ValueModel {
    pub fn build(kind: ModelKind, config: &ReasonerConfig) -> Option<Self> {
        let options = TableOptions {
            preferred: Some(Action::AskUser),
            excluded: Some(Action::Ignore),
            ucb_c: config.ucb_c,
            tie_break: config.tie_break,
            precision: config.state_precision,
        };
        match kind {
            ModelKind::None => None,
            ModelKind::QLearning => Some(Self::Single(ActionValueTable::new(
                &Action::ALL,
                options,
            ))),
            ModelKind::DoubleQLearning => Some(Self::Double {
                a: ActionValueTable::new(&Action::ALL, options.clone()),
                b: ActionValueTable::new(&Action::ALL, options),
            }),
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Self::Single(_) => ModelKind::QLearning,
            Self::Double { .. } => ModelKind::DoubleQLearning,
        }
    }

    /// Epsilon-greedy selection; the double model acts on Q_A + Q_B.
    pub fn select<R: Rng>(&mut self, state: &[f64], eps: f64, t: u64, rng: &mut R) -> Action {
        match self {
            Self::Single(q) => q.epsilon_greedy_action(state, eps, None, t, rng),
            Self::Double { a, b } => a.epsilon_greedy_action(state, eps, Some(&*b), t, rng),
        }
    }

    pub fn learn<R: Rng>(
        &mut self,
        tr: &Transition,
        alpha: f64,
        gamma: f64,
        rng: &mut R,
    ) -> TdOutcome {
        match self {
            Self::Single(q) => q_learning_update(q, tr, alpha, gamma),
            Self::Double { a, b } => double_q_learning_update(a, b, tr, alpha, gamma, rng),
        }
    }

    pub fn primary(&self) -> &ActionValueTable {
        match self {
            Self::Single(q) => q,
            Self::Double { a, .. } => a,
        }
    }

    pub fn secondary(&self) -> Option<&ActionValueTable> {
        match self {
            Self::Single(_) => None,
            Self::Double { b, .. } => Some(b),
        }
    }

    /// Q(s, a), summed over both tables for the double model.
    pub fn value(&self, state: &[f64], action: Action) -> f64 {
        match self {
            Self::Single(q) => q.value(state, action),
            Self::Double { a, b } => a.value(state, action) + b.value(state, action),
        }
    }
}

/// Context-free choice used without a learned model. Asking the user has
/// the highest priority.
pub fn fallback_action<R: Rng>(rng: &mut R) -> Action {
    let roll: f64 = rng.random();
    if roll <= 0.5 {
        Action::AskUser
    } else if roll < 0.75 {
        Action::Nop
    } else {
        Action::ShowHelp
    }
}
