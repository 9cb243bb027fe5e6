//! Pipeline driver
//!
//! Sequences one mirror submission: existence probe, optional confirmation,
//! workflow write, dispatch and status polling. The driver is strictly
//! sequential (`&mut self`); the only thing that may happen concurrently is a
//! [`CloseHandle::close`] from another task, which is observed after every
//! suspension point.

use super::gate::{ConfirmationGate, Decision, UNTRUSTED_SOURCE_MESSAGE};
use super::poll::PollHandle;
use super::{MirrorTarget, Phase, PipelineRun, RunStatus, WorkflowBackend};
use crate::common::Timer;
use crate::error::{MirrorError, Result};
use crate::logging::Logger;
use crate::reference::{validate_image_address, Dialect};
use crate::registry::{ExistenceCheck, ExistenceProber};
use crate::workflow::{self, RegistryCredentials, DISPATCH_EVENT};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Construction-time settings of a driver
#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub region: String,
    pub credentials: RegistryCredentials,
    pub poll_interval: Duration,
    /// `None` polls until the run reaches a terminal status
    pub max_poll_attempts: Option<u32>,
}

impl DriverSettings {
    pub fn new(region: impl Into<String>, credentials: RegistryCredentials) -> Self {
        Self {
            region: region.into(),
            credentials,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_attempts: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_poll_attempts(mut self, attempts: Option<u32>) -> Self {
        self.max_poll_attempts = attempts;
        self
    }
}

/// Closes the pipeline surface from another task
#[derive(Debug, Clone)]
pub struct CloseHandle {
    token: CancellationToken,
}

impl CloseHandle {
    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}

enum PollOutcome {
    Finished(RunStatus),
    Closed,
}

pub struct PipelineDriver<P, B> {
    prober: P,
    backend: B,
    settings: DriverSettings,
    output: Logger,
    surface: CancellationToken,
    phase: Phase,
    trail: Vec<Phase>,
    run: Option<PipelineRun>,
    gate: Option<ConfirmationGate>,
    poll: Option<PollHandle>,
    last_error: Option<String>,
}

impl<P, B> PipelineDriver<P, B>
where
    P: ExistenceProber,
    B: WorkflowBackend,
{
    pub fn new(prober: P, backend: B, settings: DriverSettings, output: Logger) -> Self {
        Self {
            prober,
            backend,
            settings,
            output,
            surface: CancellationToken::new(),
            phase: Phase::Initial,
            trail: vec![Phase::Initial],
            run: None,
            gate: None,
            poll: None,
            last_error: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status_text(&self) -> &'static str {
        self.phase.status_text()
    }

    /// Every phase entered so far, starting with `initial`
    pub fn trail(&self) -> &[Phase] {
        &self.trail
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Message of the pending confirmation, if the driver is waiting on one
    pub fn pending_confirmation(&self) -> Option<&str> {
        self.gate
            .as_ref()
            .filter(|gate| !gate.is_resolved())
            .map(|gate| gate.message())
    }

    /// Target address of the run in flight
    pub fn current_target(&self) -> Option<&str> {
        self.run.as_ref().map(|run| run.target.as_str())
    }

    pub fn is_polling(&self) -> bool {
        self.poll.as_ref().is_some_and(|poll| !poll.is_cancelled())
    }

    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            token: self.surface.clone(),
        }
    }

    /// Start a mirror run.
    ///
    /// Validation errors are returned without entering the pipeline. Returns
    /// the phase the submission settled in: `confirming` when the user must
    /// decide, `completed` on success, or `initial` if the surface was closed.
    /// Pipeline failures are returned as errors after resetting to `initial`.
    pub async fn submit(
        &mut self,
        source: &str,
        dialect: Dialect,
        target: &MirrorTarget,
    ) -> Result<Phase> {
        if self.surface.is_cancelled() {
            return Err(MirrorError::Closed);
        }
        if self.phase.is_active() {
            return Err(MirrorError::Busy(format!(
                "a mirror run is already {}",
                self.phase
            )));
        }

        let reference = validate_image_address(source, dialect)?;
        target.validate()?;

        let run = PipelineRun {
            target: target.reference(&self.settings.region),
            region: self.settings.region.clone(),
            source: reference,
            dialect,
            last_error: None,
        };
        self.output.section("Mirror image");
        self.output.summary_kv(
            "Run",
            &[
                ("Source", run.source.pull_reference()),
                ("Registry", dialect.display_name().to_string()),
                ("Target", run.target.clone()),
            ],
        );

        self.last_error = None;
        self.gate = None;
        self.transition(Phase::Examining);

        let check = self.prober.probe(&run.source, dialect).await;
        self.run = Some(run);
        if self.surface.is_cancelled() {
            return Ok(self.abandon());
        }

        match check {
            ExistenceCheck::Found { trusted: false } if dialect == Dialect::DockerHub => {
                self.output.warning(UNTRUSTED_SOURCE_MESSAGE);
                self.gate = Some(ConfirmationGate::new(UNTRUSTED_SOURCE_MESSAGE));
                self.transition(Phase::Confirming);
                Ok(Phase::Confirming)
            }
            ExistenceCheck::Found { .. } => self.execute().await,
            ExistenceCheck::NotFound => Err(self.fail(not_found(dialect))),
            ExistenceCheck::Rejected { reason } => Err(self.fail(MirrorError::Registry(format!(
                "{} could not confirm the source image: {}",
                dialect.display_name(),
                reason
            )))),
            ExistenceCheck::Unknown { reason } => {
                self.output
                    .verbose(&format!("Existence check inconclusive: {}", reason));
                Err(self.fail(not_found(dialect)))
            }
        }
    }

    /// Accept the pending confirmation and continue the run
    pub async fn confirm(&mut self) -> Result<Phase> {
        if self.surface.is_cancelled() && self.phase == Phase::Confirming {
            return Ok(self.abandon());
        }
        match self.resolve_gate(Decision::Confirm) {
            Some(_) => self.execute().await,
            None => Ok(self.phase),
        }
    }

    /// Decline the pending confirmation; the run is dropped without an error
    pub fn cancel(&mut self) -> Phase {
        if self.surface.is_cancelled() && self.phase == Phase::Confirming {
            return self.abandon();
        }
        if self.resolve_gate(Decision::Cancel).is_some() {
            self.output.info("Mirror cancelled");
            self.run = None;
            self.transition(Phase::Initial);
        }
        self.phase
    }

    /// Tear down the surface. Stops polling and drops any run in flight.
    pub fn close(&mut self) {
        self.surface.cancel();
        if self.run.is_some() || self.phase.is_active() {
            self.abandon();
        }
    }

    fn resolve_gate(&mut self, decision: Decision) -> Option<Decision> {
        if self.phase != Phase::Confirming {
            return None;
        }
        self.gate.as_mut().and_then(|gate| gate.resolve(decision))
    }

    async fn execute(&mut self) -> Result<Phase> {
        let Some(run) = self.run.clone() else {
            return Ok(self.phase);
        };

        match self.drive(&run).await {
            Ok(phase) => Ok(phase),
            Err(err) => Err(self.fail(err)),
        }
    }

    async fn drive(&mut self, run: &PipelineRun) -> Result<Phase> {
        let timer = Timer::start("Mirror run");

        self.transition(Phase::Updating);
        let request = run.workflow_request(&self.settings.credentials);
        let content = workflow::render(&request);
        let outcome = self
            .backend
            .write_definition(&content, &request.commit_message())
            .await
            .map_err(|e| {
                MirrorError::Pipeline(format!("failed to update pipeline definition: {}", e))
            })?;
        self.output
            .detail(&format!("Workflow definition {}", outcome.as_str()));
        if self.surface.is_cancelled() {
            return Ok(self.abandon());
        }

        self.transition(Phase::Triggering);
        // Runs at or below this id predate the dispatch
        let baseline = self
            .backend
            .latest_run()
            .await
            .map_err(|e| MirrorError::Pipeline(format!("failed to start workflow run: {}", e)))?
            .map(|previous| previous.id);
        self.backend
            .trigger_run(DISPATCH_EVENT)
            .await
            .map_err(|e| MirrorError::Pipeline(format!("failed to start workflow run: {}", e)))?;
        if self.surface.is_cancelled() {
            return Ok(self.abandon());
        }

        self.transition(Phase::Checking);
        self.poll = Some(PollHandle::start(
            &self.surface,
            self.settings.poll_interval,
        ));
        let outcome = self.poll_until_terminal(baseline).await;
        self.release_poll();

        match outcome? {
            PollOutcome::Closed => Ok(self.abandon()),
            PollOutcome::Finished(status) if status.succeeded() => {
                self.run = None;
                self.transition(Phase::Completed);
                self.output
                    .success(&format!("Mirrored {} to {}", run.source, run.target));
                timer.log_elapsed(&self.output);
                Ok(Phase::Completed)
            }
            PollOutcome::Finished(status) => {
                if let Some(url) = &status.html_url {
                    self.output.info(&format!("Build logs: {}", url));
                }
                Err(MirrorError::RunFailed {
                    conclusion: status.conclusion.unwrap_or_else(|| "unknown".to_string()),
                })
            }
        }
    }

    async fn poll_until_terminal(&self, baseline: Option<u64>) -> Result<PollOutcome> {
        let Some(poll) = self.poll.as_ref() else {
            return Ok(PollOutcome::Closed);
        };
        let token = poll.token();
        let mut ticker = poll.ticker();
        let mut attempts: u32 = 0;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(PollOutcome::Closed),
                _ = ticker.tick() => {}
            }

            attempts += 1;
            let status = self.backend.latest_run().await.map_err(|e| {
                MirrorError::Pipeline(format!("failed to check workflow status: {}", e))
            })?;
            if token.is_cancelled() {
                return Ok(PollOutcome::Closed);
            }

            match status {
                Some(run) if baseline.is_some_and(|id| run.id <= id) => {
                    self.output.detail(&format!(
                        "Newest run is still {} from before the dispatch (check {})",
                        run.id, attempts
                    ))
                }
                Some(run) if run.is_terminal() => return Ok(PollOutcome::Finished(run)),
                Some(run) => self
                    .output
                    .detail(&format!("Run {} is {} (check {})", run.id, run.status, attempts)),
                None => self
                    .output
                    .detail(&format!("No workflow run reported yet (check {})", attempts)),
            }

            if let Some(max) = self.settings.max_poll_attempts {
                if attempts >= max {
                    return Err(MirrorError::Pipeline(format!(
                        "workflow run did not finish after {} status checks",
                        max
                    )));
                }
            }
        }
    }

    fn transition(&mut self, phase: Phase) {
        self.phase = phase;
        self.trail.push(phase);
        self.output
            .step(&format!("[{}] {}", phase, phase.status_text()));
    }

    fn release_poll(&mut self) {
        if let Some(poll) = self.poll.take() {
            poll.cancel();
        }
    }

    /// Record a failure, pass through `error` and reset to `initial`
    fn fail(&mut self, err: MirrorError) -> MirrorError {
        self.release_poll();
        let message = err.to_string();
        if let Some(run) = self.run.as_mut() {
            run.last_error = Some(message.clone());
        }
        self.last_error = Some(message.clone());
        self.transition(Phase::Error);
        self.output.detail(&message);
        self.run = None;
        self.gate = None;
        self.transition(Phase::Initial);
        err
    }

    /// Drop the run after the surface was closed
    fn abandon(&mut self) -> Phase {
        self.release_poll();
        self.run = None;
        self.gate = None;
        if self.phase != Phase::Initial {
            self.output.info("Pipeline closed, no longer tracking the run");
            self.transition(Phase::Initial);
        }
        Phase::Initial
    }
}

fn not_found(dialect: Dialect) -> MirrorError {
    MirrorError::NotFound(format!(
        "{} image reference not found, please check the address",
        dialect.display_name()
    ))
}
