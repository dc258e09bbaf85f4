//! Property-based tests for the action-value table and state aggregation.
//!
//! Invariants:
//! - Unwritten entries read as zero
//! - Accumulating inserts sum, overwriting inserts replace
//! - The excluded action is never selected
//! - Aggregation averages numeric columns and keeps the latest non-numeric value
//! - State keys ignore differences below the configured precision

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use help_reasoner::reasoner::decision::{ActionValueTable, TableOptions};
use help_reasoner::reasoner::modeling::aggregate_states;
use help_reasoner::reasoner::{Action, FeatureValue, StateKey};

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_state() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec((-1000i64..=1000i64).prop_map(|v| v as f64 / 100.0), 1..6)
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop::sample::select(Action::ALL.to_vec())
}

fn arb_value() -> impl Strategy<Value = f64> {
    (-10_000i64..=10_000i64).prop_map(|v| v as f64 / 100.0)
}

fn table() -> ActionValueTable {
    ActionValueTable::new(
        &Action::ALL,
        TableOptions {
            preferred: Some(Action::AskUser),
            excluded: Some(Action::Ignore),
            ..Default::default()
        },
    )
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn unseen_entries_are_zero(state in arb_state(), action in arb_action()) {
        let table = table();
        prop_assert_eq!(table.value(&state, action), 0.0);
        prop_assert_eq!(table.max_value(&state), 0.0);
    }

    #[test]
    fn accumulating_inserts_sum(
        state in arb_state(),
        action in arb_action(),
        values in prop::collection::vec(arb_value(), 1..10),
    ) {
        let mut table = table();
        for v in &values {
            table.insert(&state, action, *v, true);
        }
        let expected: f64 = values.iter().sum();
        prop_assert!((table.value(&state, action) - expected).abs() < 1e-9);

        table.insert(&state, action, 1.5, false);
        prop_assert_eq!(table.value(&state, action), 1.5);
    }

    #[test]
    fn excluded_action_never_selected(
        state in arb_state(),
        writes in prop::collection::vec((arb_action(), arb_value()), 0..12),
        eps in 0.0f64..=1.0,
        seed in any::<u64>(),
    ) {
        let mut table = table();
        for (action, value) in writes {
            table.insert(&state, action, value, false);
        }
        let mut rng = StdRng::seed_from_u64(seed);
        for t in 1..20 {
            let action = table.epsilon_greedy_action(&state, eps, None, t, &mut rng);
            prop_assert_ne!(action, Action::Ignore);
        }
    }

    #[test]
    fn greedy_picks_a_maximum(
        state in arb_state(),
        writes in prop::collection::vec((arb_action(), arb_value()), 1..12),
        seed in any::<u64>(),
    ) {
        let mut table = table();
        for (action, value) in writes {
            table.insert(&state, action, value, false);
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let chosen = table.greedy_action(&state, None, 1, &mut rng);
        let best = table.max_value(&state);
        prop_assert!(best - table.value(&state, chosen) < 1e-4);
    }

    #[test]
    fn numeric_columns_average(rows in prop::collection::vec(prop::collection::vec(arb_value(), 3), 2..6)) {
        let samples: Vec<Vec<FeatureValue>> = rows
            .iter()
            .map(|r| r.iter().copied().map(FeatureValue::Number).collect())
            .collect();
        let out = aggregate_states(samples.iter().map(|s| s.as_slice()));
        prop_assert_eq!(out.len(), 3);
        for (col, value) in out.iter().enumerate() {
            let mean = rows.iter().map(|r| r[col]).sum::<f64>() / rows.len() as f64;
            let got = value.as_number().unwrap();
            prop_assert!((got - mean).abs() < 1e-9);
        }
    }

    #[test]
    fn non_numeric_column_keeps_latest(labels in prop::collection::vec("p_[a-z]{1,8}", 2..6)) {
        let samples: Vec<Vec<FeatureValue>> = labels
            .iter()
            .map(|l| vec![FeatureValue::Text(l.clone()), FeatureValue::Number(1.0)])
            .collect();
        let out = aggregate_states(samples.iter().map(|s| s.as_slice()));
        prop_assert_eq!(&out[0], &FeatureValue::Text(labels[labels.len() - 1].clone()));
        prop_assert_eq!(&out[1], &FeatureValue::Number(1.0));
    }

    #[test]
    fn key_ignores_sub_precision_noise(state in arb_state(), noise in -4i32..=4) {
        let jittered: Vec<f64> = state.iter().map(|v| v + noise as f64 * 1e-6).collect();
        prop_assert_eq!(
            StateKey::from_values(&state, 4),
            StateKey::from_values(&jittered, 4)
        );
    }
}
