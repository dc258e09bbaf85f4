use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::ReasonerError;
use crate::reasoner::config::ReasonerConfig;
use crate::reasoner::decision::{fallback_action, Transition, ValueModel};
use crate::reasoner::modeling::{
    feedback_reward, EpisodeListener, GazeExtractor, LabelGazeExtractor, LoggingEpisodeListener,
    NumericPreprocessor, Preprocessor, SampleWindow,
};
use crate::reasoner::timers::{ArmedWait, WaitKind, WaitRegistry, WaitStatus, WaitToken};
use crate::reasoner::types::{
    Action, CollectPhase, Feedback, FeatureValue, GazeInfo, ModelKind, TelemetrySample, UserMood,
};

/// Point-in-time view of the reasoner, for logs and diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ReasonerStatus {
    pub model: Option<ModelKind>,
    pub active: bool,
    pub paused: bool,
    pub phase: CollectPhase,
    pub awaiting_feedback: bool,
    pub mood: UserMood,
    pub last_action: Option<Action>,
    pub reward: f64,
    pub timestep: u64,
    pub epsilon: f64,
    pub episodes: u64,
    pub episode_steps: u64,
    pub updates: u64,
    pub before_samples: usize,
    pub after_samples: usize,
}

/// Online controller deciding whether to intervene for a user.
///
/// Samples accumulate until there is enough evidence to act; the chosen
/// action then waits for feedback (explicit, or inferred from idleness),
/// the post-action state is collected, and the value tables take one TD
/// step. Timeouts are modelled as armed waits that a driver polls through
/// [`Reasoner::poll_wait`]; see `controller` for the tokio driver.
pub struct Reasoner {
    config: ReasonerConfig,
    model: Option<ValueModel>,
    rng: StdRng,
    preprocessor: Box<dyn Preprocessor>,
    gaze_extractor: Box<dyn GazeExtractor>,
    listener: Box<dyn EpisodeListener>,

    active: bool,
    paused: bool,
    testing: bool,
    mood: UserMood,
    reward: f64,
    current_state: Option<Vec<f64>>,
    next_state: Option<Vec<f64>>,
    last_action: Option<Action>,
    user_action: Option<Feedback>,
    timestep: u64,
    epsilon: f64,
    phase: CollectPhase,
    awaiting_feedback: bool,
    before: SampleWindow,
    after: SampleWindow,
    feature_names: Vec<String>,
    gaze_info: GazeInfo,
    episode_steps: u64,
    episodes: u64,
    updates: u64,
    waits: WaitRegistry,
}

impl Reasoner {
    pub fn new(config: ReasonerConfig) -> Result<Self, ReasonerError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let model = ValueModel::build(config.model, &config);
        let capacity = config.buffer_capacity;

        Ok(Self {
            model,
            rng,
            preprocessor: Box::new(NumericPreprocessor::new()),
            gaze_extractor: Box::new(LabelGazeExtractor::default()),
            listener: Box::new(LoggingEpisodeListener),
            active: !config.testing,
            paused: false,
            testing: config.testing,
            mood: UserMood::Relaxed,
            reward: 0.0,
            current_state: None,
            next_state: None,
            last_action: None,
            user_action: None,
            timestep: 1,
            epsilon: config.epsilon,
            phase: CollectPhase::Before,
            awaiting_feedback: false,
            before: SampleWindow::new(capacity),
            after: SampleWindow::new(capacity),
            feature_names: Vec::new(),
            gaze_info: GazeInfo::default(),
            episode_steps: 0,
            episodes: 0,
            updates: 0,
            waits: WaitRegistry::new(),
            config,
        })
    }

    pub fn with_preprocessor(mut self, preprocessor: impl Preprocessor + 'static) -> Self {
        self.preprocessor = Box::new(preprocessor);
        self
    }

    pub fn with_gaze_extractor(mut self, extractor: impl GazeExtractor + 'static) -> Self {
        self.gaze_extractor = Box::new(extractor);
        self
    }

    pub fn with_episode_listener(mut self, listener: impl EpisodeListener + 'static) -> Self {
        self.listener = Box::new(listener);
        self
    }

    /// Rebuilds the value tables, discarding everything learned so far.
    pub fn load_model(&mut self, kind: ModelKind) {
        self.reset_status();
        self.config.model = kind;
        self.model = ValueModel::build(kind, &self.config);
        self.timestep = 1;
        self.epsilon = self.config.epsilon;
        self.episode_steps = 0;
        info!(model = ?kind, "Value model loaded");
    }

    /// Forgets the in-flight episode. Learned values, the timestep and the
    /// exploration schedule are kept.
    pub fn reset_status(&mut self) {
        self.awaiting_feedback = false;
        self.phase = CollectPhase::Before;
        self.reward = 0.0;
        self.last_action = None;
        self.user_action = None;
        self.current_state = None;
        self.next_state = None;
        self.before.clear();
        self.after.clear();
        self.feature_names.clear();
        self.gaze_info = GazeInfo::default();
        self.waits.cancel_all();
        self.unfreeze();
        info!("Reasoner status reset, collecting new user state");
    }

    pub fn on_telemetry(&mut self, sample: &TelemetrySample) -> Option<Action> {
        if !self.active {
            debug!("Ignoring telemetry, reasoner disabled");
            return Some(Action::Ignore);
        }
        if self.paused {
            debug!("Ignoring telemetry, reasoner paused");
            return Some(Action::Ignore);
        }
        if sample.is_empty() {
            return Some(Action::Ignore);
        }
        if self.feature_names.is_empty() {
            self.feature_names = sample.labels();
        } else if !sample.same_keys(&self.feature_names) {
            warn!(
                expected = self.feature_names.len(),
                got = sample.fields.len(),
                "Telemetry labels differ from session labels, ignoring sample"
            );
            return Some(Action::Ignore);
        }

        let values = sample.values();
        match self.phase {
            CollectPhase::After => {
                self.after.push(values);
                None
            }
            CollectPhase::Before => {
                self.before.push(values);
                if self.awaiting_feedback || self.before.len() < self.config.min_samples {
                    return None;
                }
                let aggregated = self.before.aggregate();
                let state = self.preprocessor.preprocess(&self.feature_names, &aggregated)?;
                self.update_gaze_info();
                let action = self.predict(state);
                self.wait_for_user_reaction();
                Some(action)
            }
        }
    }

    pub fn predict(&mut self, state: Vec<f64>) -> Action {
        self.timestep += 1;
        let selected = match self.model.as_mut() {
            Some(model) => model.select(&state, self.epsilon, self.timestep, &mut self.rng),
            None => fallback_action(&mut self.rng),
        };
        let action = match selected {
            Action::Ignore => fallback_action(&mut self.rng),
            other => other,
        };

        match action {
            Action::Nop => {}
            Action::ShowHelp => self.mood = UserMood::Confused,
            _ => self.mood = UserMood::Unsure,
        }
        self.current_state = Some(state);
        self.last_action = Some(action);
        self.epsilon *= self.config.epsilon_decay;

        debug!(
            action = %action,
            timestep = self.timestep,
            epsilon = self.epsilon,
            mood = self.mood.as_str(),
            "Action predicted"
        );
        action
    }

    /// Starts collecting S' and arms the idle timeout after which feedback
    /// is inferred.
    pub fn wait_for_user_reaction(&mut self) {
        self.start_collecting_next_state();
        self.waits
            .arm(WaitKind::Feedback, self.config.idle_timeout(), Instant::now());
        debug!("Waiting for user reaction");
    }

    /// A help tool was triggered; leaving it open past the idle timeout
    /// means it was needed.
    pub fn start_help_estimate(&mut self) {
        self.user_action = Some(Feedback::Ok);
        self.waits
            .arm(WaitKind::HelpEstimate, self.config.idle_timeout(), Instant::now());
    }

    pub fn set_user_action(&mut self, feedback: Feedback) {
        self.user_action = Some(feedback);
    }

    pub fn set_feedback(&mut self, feedback: Feedback) {
        if self.last_action.is_none() {
            debug!(feedback = feedback.as_str(), "Feedback without an action, resetting");
            self.reset_status();
            return;
        }
        self.record_feedback(feedback);
        self.update_model();
    }

    pub fn set_help_canceled(&mut self) {
        if self.last_action.is_none() {
            debug!("Help canceled without an action, resetting");
            self.reset_status();
            return;
        }
        if self.awaiting_feedback {
            if self.user_action == Some(Feedback::Help) {
                debug!("User canceled help they asked for");
                self.record_feedback(Feedback::Help);
            } else {
                debug!("User canceled automatic help");
                self.record_feedback(Feedback::Ok);
            }
        }
        self.update_model();
    }

    pub fn set_help_done(&mut self) {
        if self.last_action.is_none() {
            debug!("Help done without an action, resetting");
            self.reset_status();
            return;
        }
        if self.awaiting_feedback {
            self.record_feedback(Feedback::Help);
            self.update_model();
        } else {
            debug!("Help done but no longer waiting for feedback");
        }
    }

    /// Applies S, A, R, S' to the value tables and starts the next step.
    pub fn update_model(&mut self) {
        let (Some(action), Some(state)) = (self.last_action, self.current_state.clone()) else {
            warn!("Update requested without an action, resetting");
            self.reset_status();
            return;
        };
        if self.after.is_empty() {
            debug!("Update requested before S' was collected, collecting now");
            self.collect_next_state_and_update();
            return;
        }

        let aggregated = self.after.aggregate();
        let Some(next_state) = self.preprocessor.preprocess(&self.feature_names, &aggregated)
        else {
            warn!("Could not preprocess S', resetting");
            self.reset_status();
            return;
        };

        if let Some(model) = self.model.as_mut() {
            let transition = Transition {
                state,
                action,
                reward: self.reward,
                next_state: next_state.clone(),
            };
            let outcome = model.learn(
                &transition,
                self.config.learning_rate,
                self.config.discount,
                &mut self.rng,
            );
            debug!(
                action = %action,
                reward = self.reward,
                target = outcome.target,
                delta = outcome.delta,
                table = ?outcome.table,
                "Value model updated"
            );
        }

        self.next_state = Some(next_state);
        self.updates += 1;
        self.last_action = None;
        self.phase = CollectPhase::Before;
        self.awaiting_feedback = false;
        self.waits.cancel(WaitKind::Feedback);
        self.waits.cancel(WaitKind::HelpEstimate);
        self.waits.cancel(WaitKind::NextState);
        self.before.clear();
        self.after.clear();

        self.episode_steps += 1;
        if self.episode_steps >= self.config.episode_length {
            self.episodes += 1;
            self.episode_steps = 0;
            info!(episode = self.episodes, timestep = self.timestep, "Episode complete");
            self.listener.episode_end(self.episodes);
        }
    }

    pub fn freeze(&mut self) {
        info!("Freezing reasoner");
        self.paused = true;
        self.waits
            .arm(WaitKind::Unfreeze, self.config.unfreeze_timeout(), Instant::now());
    }

    pub fn unfreeze(&mut self) {
        if self.paused {
            info!("Unfreezing reasoner");
        }
        self.paused = false;
        self.waits.cancel(WaitKind::Unfreeze);
    }

    pub fn enable(&mut self) {
        if self.testing {
            warn!("Testing mode forces the reasoner off");
            self.active = false;
            return;
        }
        self.active = true;
        info!("Reasoner enabled");
    }

    pub fn disable(&mut self) {
        self.active = false;
        self.reset_status();
        info!("Reasoner disabled");
    }

    pub fn set_testing(&mut self, testing: bool) {
        self.testing = testing;
        if testing {
            self.active = false;
        }
    }

    /// Evaluates one armed wait. Drivers call this once per tick until it
    /// stops returning `Pending`.
    pub fn poll_wait(&mut self, kind: WaitKind, token: WaitToken, now: Instant) -> WaitStatus {
        let Some(wait) = self.waits.current(kind, token) else {
            return WaitStatus::Stale;
        };
        let due = wait.is_due(now);

        match kind {
            WaitKind::Feedback => {
                if !self.awaiting_feedback {
                    self.waits.cancel(kind);
                    return WaitStatus::Stale;
                }
                if self.paused || !due {
                    return WaitStatus::Pending;
                }
                self.waits.cancel(kind);
                info!("User idle, inferring feedback");
                self.set_feedback_automatically();
            }
            WaitKind::HelpEstimate => {
                if !self.awaiting_feedback {
                    self.waits.cancel(kind);
                    return WaitStatus::Stale;
                }
                if self.paused || !due {
                    return WaitStatus::Pending;
                }
                self.waits.cancel(kind);
                debug!("Help left open, it was needed");
                self.user_action = Some(Feedback::Help);
            }
            WaitKind::NextState => {
                if !due {
                    return WaitStatus::Pending;
                }
                self.waits.cancel(kind);
                debug!("S' collection window over, updating");
                self.update_model();
            }
            WaitKind::Unfreeze => {
                if !due {
                    return WaitStatus::Pending;
                }
                self.waits.cancel(kind);
                warn!("Reasoner paused for too long, resetting");
                self.reset_status();
            }
        }
        WaitStatus::Fired
    }

    pub fn take_armed_waits(&mut self) -> Vec<ArmedWait> {
        self.waits.take_newly_armed()
    }

    pub fn armed_wait(&self, kind: WaitKind) -> Option<ArmedWait> {
        self.waits.armed(kind)
    }

    pub fn snapshot(&self) -> ReasonerStatus {
        ReasonerStatus {
            model: self.model.as_ref().map(ValueModel::kind),
            active: self.active,
            paused: self.paused,
            phase: self.phase,
            awaiting_feedback: self.awaiting_feedback,
            mood: self.mood,
            last_action: self.last_action,
            reward: self.reward,
            timestep: self.timestep,
            epsilon: self.epsilon,
            episodes: self.episodes,
            episode_steps: self.episode_steps,
            updates: self.updates,
            before_samples: self.before.len(),
            after_samples: self.after.len(),
        }
    }

    pub fn config(&self) -> &ReasonerConfig {
        &self.config
    }

    pub fn model(&self) -> Option<&ValueModel> {
        self.model.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_awaiting_feedback(&self) -> bool {
        self.awaiting_feedback
    }

    pub fn phase(&self) -> CollectPhase {
        self.phase
    }

    pub fn mood(&self) -> UserMood {
        self.mood
    }

    pub fn reward(&self) -> f64 {
        self.reward
    }

    pub fn last_action(&self) -> Option<Action> {
        self.last_action
    }

    pub fn user_action(&self) -> Option<Feedback> {
        self.user_action
    }

    pub fn timestep(&self) -> u64 {
        self.timestep
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn current_state(&self) -> Option<&[f64]> {
        self.current_state.as_deref()
    }

    pub fn next_state(&self) -> Option<&[f64]> {
        self.next_state.as_deref()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn gaze_info(&self) -> &GazeInfo {
        &self.gaze_info
    }

    fn start_collecting_next_state(&mut self) {
        self.phase = CollectPhase::After;
        self.awaiting_feedback = true;
        self.after.clear();
    }

    fn collect_next_state_and_update(&mut self) {
        self.start_collecting_next_state();
        self.waits.arm(
            WaitKind::NextState,
            self.config.next_state_timeout(),
            Instant::now(),
        );
    }

    fn set_feedback_automatically(&mut self) {
        let feedback = match self.last_action {
            Some(Action::AskUser) | Some(Action::Nop) => Feedback::Ok,
            Some(Action::ShowHelp) => Feedback::Help,
            _ => return,
        };
        self.record_feedback(feedback);
        self.update_model();
    }

    fn record_feedback(&mut self, feedback: Feedback) {
        self.awaiting_feedback = false;
        self.waits.cancel(WaitKind::Feedback);
        self.waits.cancel(WaitKind::HelpEstimate);
        self.reward = feedback_reward(feedback, self.mood);
        self.mood = feedback.mood();
        info!(feedback = feedback.as_str(), reward = self.reward, "Got feedback");
    }

    fn update_gaze_info(&mut self) {
        let buffer: Vec<Vec<FeatureValue>> = self.before.iter().cloned().collect();
        self.gaze_info = self.gaze_extractor.extract(&self.feature_names, &buffer);
    }
}
