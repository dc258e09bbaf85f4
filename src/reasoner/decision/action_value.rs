use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::reasoner::types::{Action, StateKey};

/// Two actions whose combined estimates differ by less than this are tied.
const TIE_TOLERANCE: f64 = 1e-4;

/// Exploration probabilities at or below this are treated as zero.
const MIN_EXPLORATION: f64 = 0.01;

/// How the preferred action takes part in greedy tie-breaking.
///
/// `SkipFirstIndex` only honours a preferred action stored after the first
/// slot of the action list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PreferredTieBreak {
    #[default]
    Inclusive,
    SkipFirstIndex,
}

#[derive(Debug, Clone)]
pub struct TableOptions {
    pub preferred: Option<Action>,
    /// Never returned by any selection path.
    pub excluded: Option<Action>,
    pub ucb_c: f64,
    pub tie_break: PreferredTieBreak,
    pub precision: u32,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            preferred: None,
            excluded: None,
            ucb_c: 0.0,
            tie_break: PreferredTieBreak::Inclusive,
            precision: StateKey::DEFAULT_PRECISION,
        }
    }
}

/// Tabular action-value function Q(s, a).
///
/// Rows are created on first write; anything never written reads as 0.0
/// and every action starts with a visit count of 0.
#[derive(Debug, Clone)]
pub struct ActionValueTable {
    actions: Vec<Action>,
    q: HashMap<StateKey, HashMap<Action, f64>>,
    counts: HashMap<Action, u64>,
    preferred_index: Option<usize>,
    excluded: Option<Action>,
    ucb_c: f64,
    tie_break: PreferredTieBreak,
    precision: u32,
}

impl ActionValueTable {
    pub fn new(actions: &[Action], options: TableOptions) -> Self {
        let mut unique: Vec<Action> = Vec::with_capacity(actions.len());
        for action in actions {
            if !unique.contains(action) {
                unique.push(*action);
            }
        }
        let preferred_index = options
            .preferred
            .filter(|p| Some(*p) != options.excluded)
            .and_then(|p| unique.iter().position(|a| *a == p));
        let counts = unique.iter().map(|a| (*a, 0)).collect();

        Self {
            actions: unique,
            q: HashMap::new(),
            counts,
            preferred_index,
            excluded: options.excluded,
            ucb_c: options.ucb_c.max(0.0),
            tie_break: options.tie_break,
            precision: options.precision,
        }
    }

    pub fn key(&self, state: &[f64]) -> StateKey {
        StateKey::from_values(state, self.precision)
    }

    pub fn value(&self, state: &[f64], action: Action) -> f64 {
        self.value_at(&self.key(state), action)
    }

    pub fn value_at(&self, key: &StateKey, action: Action) -> f64 {
        self.q
            .get(key)
            .and_then(|row| row.get(&action))
            .copied()
            .unwrap_or(0.0)
    }

    /// Greedy selection over `Q(s, a) [+ Q_other(s, a)] [+ UCB(a, t)]`.
    pub fn greedy_action<R: Rng>(
        &mut self,
        state: &[f64],
        other: Option<&ActionValueTable>,
        t: u64,
        rng: &mut R,
    ) -> Action {
        if state.is_empty() {
            return self.random_action(rng);
        }
        let key = self.key(state);
        let tied = self.tied_best(&key, other, Some(t));
        let Some(chosen) = self.pick_from_ties(&tied, rng) else {
            return Action::Ignore;
        };
        self.bump(chosen);
        chosen
    }

    pub fn epsilon_greedy_action<R: Rng>(
        &mut self,
        state: &[f64],
        eps: f64,
        other: Option<&ActionValueTable>,
        t: u64,
        rng: &mut R,
    ) -> Action {
        if eps > MIN_EXPLORATION && rng.random::<f64>() <= eps {
            return self.random_action(rng);
        }
        self.greedy_action(state, other, t, rng)
    }

    /// The preferred action when configured, else uniform over candidates.
    pub fn random_action<R: Rng>(&mut self, rng: &mut R) -> Action {
        let chosen = match self.preferred_index {
            Some(idx) => Some(self.actions[idx]),
            None => {
                let candidates: Vec<Action> = self.candidates().collect();
                if candidates.is_empty() {
                    None
                } else {
                    Some(candidates[rng.random_range(0..candidates.len())])
                }
            }
        };
        match chosen {
            Some(action) => {
                self.bump(action);
                action
            }
            None => Action::Ignore,
        }
    }

    pub fn ucb_bonus(&self, action: Action, t: u64) -> f64 {
        if t == 0 || self.ucb_c == 0.0 {
            return 0.0;
        }
        match self.counts.get(&action).copied() {
            Some(0) => f64::INFINITY,
            Some(n) => self.ucb_c * ((t as f64).ln() / n as f64).sqrt(),
            None => 0.0,
        }
    }

    pub fn insert(&mut self, state: &[f64], action: Action, value: f64, accumulate: bool) {
        if state.is_empty() {
            return;
        }
        let key = self.key(state);
        let slot = self.q.entry(key).or_default().entry(action).or_insert(0.0);
        if accumulate {
            *slot += value;
        } else {
            *slot = value;
        }
    }

    pub fn update(&mut self, state: &[f64], action: Action, delta: f64) {
        self.insert(state, action, delta, true);
    }

    /// `max_a Q(s, a)` over the candidate actions. Does not touch visit counts.
    pub fn max_value(&self, state: &[f64]) -> f64 {
        let key = self.key(state);
        self.candidates()
            .map(|a| self.value_at(&key, a))
            .fold(None, |best: Option<f64>, v| Some(best.map_or(v, |b| b.max(v))))
            .unwrap_or(0.0)
    }

    /// Argmax of this table alone, with the usual tie-breaking but no UCB
    /// bonus and no visit count bookkeeping.
    pub fn best_action<R: Rng>(&self, state: &[f64], rng: &mut R) -> Option<Action> {
        let key = self.key(state);
        let tied = self.tied_best(&key, None, None);
        self.pick_from_ties(&tied, rng)
    }

    pub fn visit_count(&self, action: Action) -> u64 {
        self.counts.get(&action).copied().unwrap_or(0)
    }

    pub fn preferred(&self) -> Option<Action> {
        self.preferred_index.map(|idx| self.actions[idx])
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn state_count(&self) -> usize {
        self.q.len()
    }

    pub fn ucb_c(&self) -> f64 {
        self.ucb_c
    }

    fn candidates(&self) -> impl Iterator<Item = Action> + '_ {
        self.actions
            .iter()
            .copied()
            .filter(move |a| Some(*a) != self.excluded)
    }

    fn tied_best(
        &self,
        key: &StateKey,
        other: Option<&ActionValueTable>,
        ucb_t: Option<u64>,
    ) -> Vec<Action> {
        let mut best = f64::NEG_INFINITY;
        let mut tied: Vec<Action> = Vec::new();

        for action in self.candidates() {
            let mut g = self.value_at(key, action);
            if let Some(other) = other {
                g += other.value_at(key, action);
            }
            if let Some(t) = ucb_t {
                if self.ucb_c > 0.0 {
                    g += self.ucb_bonus(action, t);
                }
            }
            if g > best {
                best = g;
                tied.clear();
                tied.push(action);
            } else if g == f64::INFINITY || (g - best).abs() < TIE_TOLERANCE {
                tied.push(action);
            }
        }

        tied
    }

    fn pick_from_ties<R: Rng>(
        &self,
        tied: &[Action],
        rng: &mut R,
    ) -> Option<Action> {
        if tied.is_empty() {
            return None;
        }
        if let Some(preferred) = self.tie_break_preferred() {
            if tied.contains(&preferred) {
                return Some(preferred);
            }
        }
        Some(tied[rng.random_range(0..tied.len())])
    }

    fn tie_break_preferred(&self) -> Option<Action> {
        match (self.preferred_index, self.tie_break) {
            (Some(0), PreferredTieBreak::SkipFirstIndex) => None,
            (Some(idx), _) => Some(self.actions[idx]),
            (None, _) => None,
        }
    }

    fn bump(&mut self, action: Action) {
        *self.counts.entry(action).or_insert(0) += 1;
    }
}
