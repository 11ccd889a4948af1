use tracing::debug;

use super::{Artifact, ReassignTool};
use crate::{
    error::ReassignError,
    utils::runner::{CommandOutput, CommandRunner},
};

pub const REASSIGNMENT_LINE_PREFIX: &str = "Reassignment";
pub const IN_PROGRESS_SUFFIX: &str = "is still in progress";
pub const COMPLETED_SUFFIX: &str = "completed successfully";

/// What `--verify` reported for one artifact. For a single-partition artifact at most one of the
/// counts is 1; both being 0 means the tool said something we don't recognise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub in_progress: usize,
    pub completed: usize,
    pub stdout: String,
    pub stderr: String,
}

impl VerificationOutcome {
    pub fn parse(output: CommandOutput) -> Self {
        let mut in_progress = 0;
        let mut completed = 0;
        for line in output
            .stdout_lines()
            .filter(|l| l.starts_with(REASSIGNMENT_LINE_PREFIX))
        {
            if line.ends_with(IN_PROGRESS_SUFFIX) {
                in_progress += 1;
            }
            if line.ends_with(COMPLETED_SUFFIX) {
                completed += 1;
            }
        }

        Self {
            in_progress,
            completed,
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed == 1
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress == 1
    }

    pub fn is_not_started(&self) -> bool {
        self.in_progress == 0
    }
}

impl<R: CommandRunner> ReassignTool<R> {
    pub fn verify(&self, artifact: &Artifact) -> Result<VerificationOutcome, ReassignError> {
        let output = self.run(self.invocation(artifact).arg("--verify"))?;
        let outcome = VerificationOutcome::parse(output);

        debug!(
            "verify output: {}in_progress: {}. completed: {}",
            outcome.stdout, outcome.in_progress, outcome.completed
        );

        Ok(outcome)
    }
}
