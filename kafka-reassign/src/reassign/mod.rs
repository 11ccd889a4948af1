use std::path::PathBuf;

use crate::{
    error::ReassignError,
    utils::runner::{CommandOutput, CommandRunner, Invocation},
};

pub mod orchestrator;
pub mod request;
pub mod start;
pub mod throttle;
pub mod verify;

pub use orchestrator::{BatchReport, FailurePolicy, Orchestrator, PartitionOutcome, PollBudget};
pub use request::{Artifact, BrokerId, ReassignmentRequest, RequestBuilder};
pub use throttle::{ThrottleSchedule, ThrottleSource};
pub use verify::VerificationOutcome;

pub const REASSIGN_SCRIPT: &str = "kafka-reassign-partitions.sh";

/// Thin wrapper over `kafka-reassign-partitions.sh`. Every call targets a single artifact and the
/// endpoint resolved at startup.
pub struct ReassignTool<R> {
    runner: R,
    program: PathBuf,
    coordination_flag: String,
    endpoint: String,
}

impl<R: CommandRunner> ReassignTool<R> {
    pub fn new(
        runner: R,
        program: impl Into<PathBuf>,
        coordination_flag: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            program: program.into(),
            coordination_flag: coordination_flag.into(),
            endpoint: endpoint.into(),
        }
    }

    fn invocation(&self, artifact: &Artifact) -> Invocation {
        Invocation::new(&self.program).args([
            format!("--{}", self.coordination_flag),
            self.endpoint.clone(),
            "--reassignment-json-file".to_string(),
            artifact.path_arg(),
        ])
    }

    fn run(&self, invocation: Invocation) -> Result<CommandOutput, ReassignError> {
        self.runner.run(&invocation)
    }
}

/// Number of trimmed stdout lines containing `marker`
pub(crate) fn count_containing(output: &CommandOutput, marker: &str) -> usize {
    output
        .stdout_lines()
        .filter(|line| line.contains(marker))
        .count()
}
