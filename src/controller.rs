use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ReasonerError;
use crate::reasoner::{
    Action, ArmedWait, Feedback, ModelKind, Reasoner, ReasonerStatus, TelemetrySample, WaitStatus,
};
use crate::telemetry::{decode_line, Command, Inbound};

/// Shared handle driving a [`Reasoner`] on the tokio runtime.
///
/// Every call runs under the mutex; waits armed during the call are then
/// handed to per-wait tick tasks that re-check them once per tick.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<Mutex<Reasoner>>,
    handle: Handle,
    tick: Duration,
}

impl Controller {
    pub fn new(reasoner: Reasoner) -> Result<Self, ReasonerError> {
        let handle = Handle::try_current().map_err(|_| ReasonerError::NoRuntime)?;
        let tick = reasoner.config().tick();
        Ok(Self {
            inner: Arc::new(Mutex::new(reasoner)),
            handle,
            tick,
        })
    }

    fn with<T>(&self, f: impl FnOnce(&mut Reasoner) -> T) -> T {
        let (out, armed) = {
            let mut reasoner = self.inner.lock();
            let out = f(&mut *reasoner);
            (out, reasoner.take_armed_waits())
        };
        self.schedule(armed);
        out
    }

    fn schedule(&self, armed: Vec<ArmedWait>) {
        for wait in armed {
            debug!(
                kind = wait.kind.as_str(),
                timeout_ms = wait.timeout.as_millis() as u64,
                "Wait armed"
            );
            self.handle.spawn(tick_wait(self.clone(), wait));
        }
    }

    pub fn on_telemetry(&self, sample: &TelemetrySample) -> Option<Action> {
        self.with(|r| r.on_telemetry(sample))
    }

    pub fn set_feedback(&self, feedback: Feedback) {
        self.with(|r| r.set_feedback(feedback))
    }

    pub fn set_help_canceled(&self) {
        self.with(Reasoner::set_help_canceled)
    }

    pub fn set_help_done(&self) {
        self.with(Reasoner::set_help_done)
    }

    pub fn start_help_estimate(&self) {
        self.with(Reasoner::start_help_estimate)
    }

    pub fn freeze(&self) {
        self.with(Reasoner::freeze)
    }

    pub fn unfreeze(&self) {
        self.with(Reasoner::unfreeze)
    }

    pub fn enable(&self) {
        self.with(Reasoner::enable)
    }

    pub fn disable(&self) {
        self.with(Reasoner::disable)
    }

    pub fn set_testing(&self, testing: bool) {
        self.with(|r| r.set_testing(testing))
    }

    pub fn reset_status(&self) {
        self.with(Reasoner::reset_status)
    }

    pub fn load_model(&self, kind: ModelKind) {
        self.with(|r| r.load_model(kind))
    }

    pub fn snapshot(&self) -> ReasonerStatus {
        self.inner.lock().snapshot()
    }

    /// Runs `f` against the reasoner without scheduling; for inspection.
    pub fn inspect<T>(&self, f: impl FnOnce(&Reasoner) -> T) -> T {
        f(&*self.inner.lock())
    }

    pub fn apply(&self, command: Command) {
        match command {
            Command::Feedback(feedback) => self.set_feedback(feedback),
            Command::Cancel => self.set_help_canceled(),
            Command::Done => self.set_help_done(),
            Command::Help => self.start_help_estimate(),
            Command::Freeze => self.freeze(),
            Command::Unfreeze => self.unfreeze(),
            Command::Enable => self.enable(),
            Command::Disable => self.disable(),
            Command::Reset => self.reset_status(),
            Command::Load(kind) => self.load_model(kind),
        }
    }

    /// Routes one decoded message; returns the action to emit, if any.
    pub fn handle(&self, inbound: Inbound) -> Option<Action> {
        match inbound {
            Inbound::Sample(sample) => self.on_telemetry(&sample),
            Inbound::Ping => {
                debug!("Ping");
                None
            }
            Inbound::Command(command) => {
                self.apply(command);
                None
            }
        }
    }
}

async fn tick_wait(controller: Controller, wait: ArmedWait) {
    loop {
        tokio::time::sleep(controller.tick).await;
        let (status, armed) = {
            let mut reasoner = controller.inner.lock();
            let status = reasoner.poll_wait(wait.kind, wait.token, Instant::now());
            (status, reasoner.take_armed_waits())
        };
        controller.schedule(armed);
        if status != WaitStatus::Pending {
            debug!(kind = wait.kind.as_str(), ?status, "Wait finished");
            break;
        }
    }
}

/// Feeds raw lines from `input` into the controller and forwards emitted
/// actions. Returns when the input closes or the output receiver is gone.
pub async fn run_ingest_loop(
    controller: Controller,
    mut input: mpsc::Receiver<String>,
    output: mpsc::Sender<Action>,
) {
    while let Some(line) = input.recv().await {
        let inbound = match decode_line(&line) {
            Ok(Some(inbound)) => inbound,
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable message");
                continue;
            }
        };
        if let Some(action) = controller.handle(inbound) {
            if output.send(action).await.is_err() {
                debug!("Action receiver closed, stopping ingest");
                break;
            }
        }
    }
}
