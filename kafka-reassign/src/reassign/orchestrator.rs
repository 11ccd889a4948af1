use std::{
    thread,
    time::{Duration, Instant},
};

use tracing::{error, info, info_span, warn};

use super::{
    Artifact, ReassignTool, ReassignmentRequest, RequestBuilder, ThrottleSchedule, ThrottleSource,
    VerificationOutcome,
};
use crate::{error::ReassignError, utils::runner::CommandRunner};

/// Pause after a successful start so the coordination layer can register the new assignment
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// How a single partition's reassignment ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionOutcome {
    /// The first verification already reported completion; nothing was started.
    AlreadyCompleted,
    Completed {
        polls: u32,
    },
    /// Verification reported neither progress nor completion. Never retried.
    Failed(VerificationOutcome),
    /// The poll budget ran out while the tool still reported progress.
    TimedOut {
        polls: u32,
    },
}

impl PartitionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            PartitionOutcome::AlreadyCompleted | PartitionOutcome::Completed { .. }
        )
    }
}

/// Limits on the polling loop. Unbounded unless configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollBudget {
    pub max_attempts: Option<u32>,
    pub deadline: Option<Duration>,
}

impl PollBudget {
    pub fn unbounded() -> Self {
        Self::default()
    }

    fn exhausted(&self, attempts: u32, started: Instant) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
            || self.deadline.is_some_and(|d| started.elapsed() >= d)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the whole batch at the first partition that does not complete
    #[default]
    Abort,
    /// Record partitions that fail verification or time out and move on to the next one
    Continue,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub completed: Vec<ReassignmentRequest>,
    pub failed: Vec<(ReassignmentRequest, ReassignError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Per-partition state, owned by one run of the state machine
struct Session<'a> {
    request: &'a ReassignmentRequest,
    artifact: Artifact,
    throttle: ThrottleSchedule,
}

enum Decision {
    AlreadyCompleted,
    NeedsStart,
    AlreadyInProgress,
}

impl From<&VerificationOutcome> for Decision {
    fn from(outcome: &VerificationOutcome) -> Self {
        if outcome.is_completed() {
            Decision::AlreadyCompleted
        } else if outcome.is_not_started() {
            Decision::NeedsStart
        } else {
            Decision::AlreadyInProgress
        }
    }
}

pub struct Orchestrator<R> {
    tool: ReassignTool<R>,
    builder: RequestBuilder,
    retry_interval: Duration,
    settle_delay: Duration,
    budget: PollBudget,
}

impl<R: CommandRunner> Orchestrator<R> {
    pub fn new(tool: ReassignTool<R>, builder: RequestBuilder, retry_interval: Duration) -> Self {
        Self {
            tool,
            builder,
            retry_interval,
            settle_delay: DEFAULT_SETTLE_DELAY,
            budget: PollBudget::unbounded(),
        }
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn with_poll_budget(mut self, budget: PollBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Drives one partition to a terminal state: verify, start if nothing is running, then poll
    /// until the tool reports completion or something unrecognised.
    pub fn reassign(
        &self,
        request: &ReassignmentRequest,
        throttle: ThrottleSchedule,
    ) -> Result<PartitionOutcome, ReassignError> {
        let _span = info_span!(
            "reassign",
            topic = request.topic(),
            partition = request.partition()
        )
        .entered();

        let session = Session {
            request,
            artifact: self.builder.build(request)?,
            throttle,
        };

        let initial = self.tool.verify(&session.artifact)?;
        match Decision::from(&initial) {
            Decision::AlreadyCompleted => {
                info!("{request} completed successfully");
                return Ok(PartitionOutcome::AlreadyCompleted);
            }
            Decision::NeedsStart => {
                info!("{request} starting reassignment of partitions");
                self.tool
                    .start(&session.artifact, session.throttle.initial())?;
                info!("{request} started reassignment of partitions");
                thread::sleep(self.settle_delay);
            }
            Decision::AlreadyInProgress => {
                info!("{request} reassignment already running, not starting it again");
            }
        }

        self.poll(&session)
    }

    fn poll(&self, session: &Session<'_>) -> Result<PartitionOutcome, ReassignError> {
        let request = session.request;
        let started = Instant::now();
        let mut polls = 0;
        let mut in_progress_polls = 0;

        loop {
            if self.budget.exhausted(polls, started) {
                warn!("{request} poll budget exhausted after {polls} verification(s)");
                return Ok(PartitionOutcome::TimedOut { polls });
            }

            let progress = self.tool.verify(&session.artifact)?;
            polls += 1;

            if progress.is_completed() {
                info!("{request} completed successfully");
                return Ok(PartitionOutcome::Completed { polls });
            } else if !progress.is_in_progress() {
                error!(
                    "{request} failed.\nout:\n{}\nerr:\n{}",
                    progress.stdout, progress.stderr
                );
                return Ok(PartitionOutcome::Failed(progress));
            }

            if self.budget.exhausted(polls, started) {
                warn!("{request} still in progress after {polls} verification(s), giving up");
                return Ok(PartitionOutcome::TimedOut { polls });
            }
            info!(
                "{request} is still in progress. Retrying after {} seconds",
                self.retry_interval.as_secs()
            );

            in_progress_polls += 1;
            if let Some(throttle) = session.throttle.escalation_after(in_progress_polls) {
                info!("{request} changing throttle to: {throttle}");
                self.tool.change_throttle(&session.artifact, throttle)?;
                info!("{request} changed throttle successfully");
            }

            thread::sleep(self.retry_interval);
        }
    }

    /// Processes `requests` strictly in order, each to its own terminal state before the next.
    /// Infrastructure errors always abort; partition failures abort unless `policy` says continue.
    pub fn run_batch(
        &self,
        requests: &[ReassignmentRequest],
        throttle: &ThrottleSource,
        policy: FailurePolicy,
    ) -> Result<BatchReport, ReassignError> {
        let mut report = BatchReport::default();

        for request in requests {
            let schedule = throttle.current()?;
            let failure = match self.reassign(request, schedule)? {
                PartitionOutcome::AlreadyCompleted | PartitionOutcome::Completed { .. } => {
                    report.completed.push(request.clone());
                    continue;
                }
                PartitionOutcome::Failed(outcome) => ReassignError::UnrecognizedVerificationState {
                    topic: request.topic().to_string(),
                    partition: request.partition(),
                    stdout: outcome.stdout,
                    stderr: outcome.stderr,
                },
                PartitionOutcome::TimedOut { polls } => ReassignError::PollBudgetExhausted {
                    topic: request.topic().to_string(),
                    partition: request.partition(),
                    polls,
                },
            };

            match policy {
                FailurePolicy::Abort => return Err(failure),
                FailurePolicy::Continue => {
                    warn!("{request} did not complete, continuing with the next partition");
                    report.failed.push((request.clone(), failure));
                }
            }
        }

        Ok(report)
    }
}
