//! End-to-end behaviour of the reasoner through its public API.

use std::sync::{Arc, Mutex};

use help_reasoner::reasoner::decision::{ActionValueTable, TableOptions, ValueModel};
use help_reasoner::reasoner::modeling::NumericPreprocessor;
use help_reasoner::reasoner::{
    Action, CollectPhase, Feedback, ModelKind, Reasoner, ReasonerConfig, TelemetrySample,
    UserMood, WaitKind, WaitStatus,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn seeded(seed: u64) -> ReasonerConfig {
    ReasonerConfig {
        seed: Some(seed),
        epsilon: 0.0,
        ..Default::default()
    }
}

fn sample(attention: f64, scroll: f64) -> TelemetrySample {
    TelemetrySample::new()
        .with("attention", attention)
        .with("scroll", scroll)
}

/// Drives one full step: state sample, post-action sample, explicit feedback.
fn step(reasoner: &mut Reasoner, s: TelemetrySample, feedback: Feedback) -> Action {
    let action = reasoner.on_telemetry(&s).expect("prediction");
    reasoner.on_telemetry(&sample(0.5, 0.5));
    reasoner.set_feedback(feedback);
    action
}

#[test]
fn exactly_one_prediction_per_step() {
    let mut reasoner = Reasoner::new(seeded(1)).unwrap();
    let mut predictions = 0;
    for i in 0..10 {
        if let Some(action) = reasoner.on_telemetry(&sample(0.1 * i as f64, 0.0)) {
            assert_ne!(action, Action::Ignore);
            predictions += 1;
        }
    }
    assert_eq!(predictions, 1);
    assert_eq!(reasoner.timestep(), 2);
    assert_eq!(reasoner.phase(), CollectPhase::After);
}

#[test]
fn excluded_action_is_never_emitted() {
    let mut reasoner = Reasoner::new(ReasonerConfig {
        seed: Some(3),
        epsilon: 0.5,
        ..Default::default()
    })
    .unwrap();
    for i in 0..50 {
        let feedback = if i % 2 == 0 { Feedback::Ok } else { Feedback::Help };
        let action = step(&mut reasoner, sample((i % 5) as f64 * 0.1, 0.2), feedback);
        assert_ne!(action, Action::Ignore);
    }
    assert_eq!(reasoner.updates(), 50);
}

#[test]
fn missed_confusion_costs_most() {
    let mut reasoner = Reasoner::new(seeded(9)).unwrap();
    let s = sample(0.2, 0.2);

    // first visit ties on zero and asks
    assert_eq!(step(&mut reasoner, s.clone(), Feedback::Ok), Action::AskUser);
    assert_eq!(reasoner.reward(), -10.0);
    assert_eq!(reasoner.mood(), UserMood::Relaxed);

    // asking now scores below the other actions
    let action = step(&mut reasoner, s, Feedback::Help);
    let expected = match action {
        Action::Nop => -200.0,
        Action::ShowHelp => 10.0,
        other => panic!("unexpected {other}"),
    };
    assert_eq!(reasoner.reward(), expected);
    assert_eq!(reasoner.mood(), UserMood::Confused);
}

#[test]
fn relaxed_user_left_alone_earns_small_reward() {
    let mut reasoner = Reasoner::new(seeded(4)).unwrap();
    let s = sample(0.6, 0.1);
    step(&mut reasoner, s.clone(), Feedback::Ok);
    let mut rewarded = false;
    for _ in 0..10 {
        let action = step(&mut reasoner, s.clone(), Feedback::Ok);
        if action == Action::Nop {
            assert_eq!(reasoner.reward(), 1.0);
            rewarded = true;
        }
    }
    assert!(rewarded, "never left the user alone");
}

#[test]
fn episode_callback_counts_episodes() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut reasoner = Reasoner::new(ReasonerConfig {
        episode_length: 2,
        ..seeded(5)
    })
    .unwrap()
    .with_episode_listener(move |episode: u64| sink.lock().unwrap().push(episode));

    for i in 0..5 {
        step(&mut reasoner, sample(0.1 * i as f64, 0.0), Feedback::Ok);
    }
    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    assert_eq!(reasoner.snapshot().episode_steps, 1);
}

#[test]
fn double_q_learning_runs_end_to_end() {
    let mut reasoner = Reasoner::new(ReasonerConfig {
        model: ModelKind::DoubleQLearning,
        ..seeded(6)
    })
    .unwrap();
    for _ in 0..20 {
        step(&mut reasoner, sample(0.3, 0.3), Feedback::Help);
    }
    let Some(ValueModel::Double { a, b }) = reasoner.model() else {
        panic!("expected double model");
    };
    assert_eq!(reasoner.updates(), 20);
    assert!(a.state_count() + b.state_count() >= 1);
}

#[test]
fn model_none_still_acts() {
    let mut reasoner = Reasoner::new(ReasonerConfig {
        model: ModelKind::None,
        ..seeded(7)
    })
    .unwrap();
    let action = step(&mut reasoner, sample(0.3, 0.3), Feedback::Ok);
    assert!(matches!(
        action,
        Action::AskUser | Action::Nop | Action::ShowHelp
    ));
    assert_eq!(reasoner.updates(), 1);
    assert!(reasoner.model().is_none());
}

#[test]
fn stale_waits_never_fire() {
    let mut reasoner = Reasoner::new(seeded(8)).unwrap();
    reasoner.on_telemetry(&sample(0.3, 0.3));
    let feedback = reasoner.armed_wait(WaitKind::Feedback).unwrap();
    reasoner.reset_status();
    assert_eq!(
        reasoner.poll_wait(WaitKind::Feedback, feedback.token, feedback.deadline()),
        WaitStatus::Stale
    );
    assert_eq!(reasoner.updates(), 0);
}

#[test]
fn custom_preprocessor_shapes_state() {
    let mut reasoner = Reasoner::new(seeded(10))
        .unwrap()
        .with_preprocessor(NumericPreprocessor::skipping(&["page"]));
    let s = TelemetrySample::new()
        .with("attention", 0.25)
        .with("page", "intro");
    assert!(reasoner.on_telemetry(&s).is_some());
    assert_eq!(reasoner.current_state(), Some(&[0.25][..]));
}

#[test]
fn ucb_tries_every_action_first() {
    let mut table = ActionValueTable::new(
        &[Action::Nop, Action::AskUser, Action::ShowHelp],
        TableOptions {
            ucb_c: 1.0,
            ..Default::default()
        },
    );
    let mut rng = StdRng::seed_from_u64(11);
    let mut picked = Vec::new();
    for t in 1..=3 {
        picked.push(table.greedy_action(&[0.0], None, t, &mut rng));
    }
    picked.sort();
    assert_eq!(picked, vec![Action::Nop, Action::AskUser, Action::ShowHelp]);
}

#[test]
fn snapshot_serializes() {
    let mut reasoner = Reasoner::new(seeded(12)).unwrap();
    reasoner.on_telemetry(&sample(0.3, 0.3));
    let json = serde_json::to_value(reasoner.snapshot()).unwrap();
    assert_eq!(json["phase"], "after");
    assert_eq!(json["last_action"], "askuser");
    assert_eq!(json["awaiting_feedback"], true);
}
