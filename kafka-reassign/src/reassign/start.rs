use tracing::{debug, info};

use super::{count_containing, Artifact, ReassignTool};
use crate::{
    error::ReassignError,
    utils::runner::{CommandOutput, CommandRunner},
};

pub const STARTED_MARKER: &str = "Successfully started reassignment of partitions";
pub const ALREADY_RUNNING_MARKER: &str = "There is an existing assignment running";

impl<R: CommandRunner> ReassignTool<R> {
    fn execute(&self, artifact: &Artifact, throttle: u64) -> Result<CommandOutput, ReassignError> {
        self.run(
            self.invocation(artifact)
                .arg("--execute")
                .arg("--throttle")
                .arg(throttle.to_string()),
        )
    }

    /// Kicks off the reassignment described by `artifact`. The tool must report exactly one
    /// started line; anything else is treated as a refusal.
    pub fn start(&self, artifact: &Artifact, throttle: u64) -> Result<(), ReassignError> {
        let output = self.execute(artifact, throttle)?;
        let started = count_containing(&output, STARTED_MARKER) == 1;

        debug!("begin output: {}started: {}", output.stdout, started);

        if !started {
            info!("couldn't find the started message when starting the reassignment.");
            return Err(ReassignError::StartFailed {
                artifact: artifact.path().to_path_buf(),
                stdout: output.stdout,
                artifact_content: artifact.content().to_string(),
            });
        }

        Ok(())
    }

    /// Re-runs `--execute` against a reassignment that is already running, which makes the tool
    /// apply the new throttle without starting anything.
    pub fn change_throttle(
        &self,
        artifact: &Artifact,
        throttle: u64,
    ) -> Result<(), ReassignError> {
        let output = self.execute(artifact, throttle)?;
        let changed = count_containing(&output, ALREADY_RUNNING_MARKER) == 1;

        debug!("change throttle output: {}changed: {}", output.stdout, changed);

        if !changed {
            info!("couldn't find the existing assignment running msg while changing throttle.");
            return Err(ReassignError::ThrottleChangeFailed {
                throttle,
                artifact: artifact.path().to_path_buf(),
                stdout: output.stdout,
                artifact_content: artifact.content().to_string(),
            });
        }

        Ok(())
    }
}
