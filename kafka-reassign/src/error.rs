use std::path::PathBuf;

use anyhow::Error;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReassignError {
    /// Bad or missing operator input. Raised before any partition is touched.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to launch {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "{command} {} failed. exit status={}, stderr:\n{stderr}",
        .args.join(" "),
        .exit_code.map_or_else(|| "none".to_string(), |code| code.to_string())
    )]
    ExternalCommand {
        command: String,
        args: Vec<String>,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error(
        "couldn't find the started message when starting the reassignment.\ntool output:\n{stdout}\njson_file ({}):\n{artifact_content}",
        .artifact.display()
    )]
    StartFailed {
        artifact: PathBuf,
        stdout: String,
        artifact_content: String,
    },

    #[error(
        "couldn't find the existing assignment running message while changing throttle to {throttle}.\ntool output:\n{stdout}\njson_file ({}):\n{artifact_content}",
        .artifact.display()
    )]
    ThrottleChangeFailed {
        throttle: u64,
        artifact: PathBuf,
        stdout: String,
        artifact_content: String,
    },

    #[error("{topic}-{partition} failed.\nout:\n{stdout}\nerr:\n{stderr}")]
    UnrecognizedVerificationState {
        topic: String,
        partition: u32,
        stdout: String,
        stderr: String,
    },

    #[error("{topic}-{partition} still in progress after {polls} verification(s), giving up")]
    PollBudgetExhausted {
        topic: String,
        partition: u32,
        polls: u32,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ReassignError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ReassignError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        ReassignError::Json {
            context: context.into(),
            source,
        }
    }

    /// True for outcomes that end a single partition but say nothing about the health of the
    /// tool or the cluster. Everything else is an infrastructure failure and always aborts.
    pub fn is_partition_failure(&self) -> bool {
        matches!(
            self,
            ReassignError::UnrecognizedVerificationState { .. }
                | ReassignError::PollBudgetExhausted { .. }
        )
    }
}

pub struct CapturedError {
    pub inner: Error,
}

impl From<Error> for CapturedError {
    fn from(inner: Error) -> Self {
        Self { inner }
    }
}

impl From<ReassignError> for CapturedError {
    fn from(err: ReassignError) -> Self {
        Self { inner: err.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_command_error_carries_verbatim_diagnostics() {
        let err = ReassignError::ExternalCommand {
            command: "/opt/kafka/bin/kafka-reassign-partitions.sh".to_string(),
            args: vec!["--verify".to_string()],
            exit_code: Some(3),
            stderr: "Exception in thread \"main\"".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("kafka-reassign-partitions.sh --verify failed"));
        assert!(msg.contains("exit status=3"));
        assert!(msg.contains("Exception in thread \"main\""));
    }

    #[test]
    fn killed_process_has_no_exit_code() {
        let err = ReassignError::ExternalCommand {
            command: "tool".to_string(),
            args: vec![],
            exit_code: None,
            stderr: String::new(),
        };

        assert!(err.to_string().contains("exit status=none"));
    }

    #[test]
    fn only_business_outcomes_are_partition_failures() {
        let unrecognized = ReassignError::UnrecognizedVerificationState {
            topic: "orders".to_string(),
            partition: 3,
            stdout: String::new(),
            stderr: String::new(),
        };
        let start = ReassignError::StartFailed {
            artifact: PathBuf::from("/tmp/orders-3.json"),
            stdout: String::new(),
            artifact_content: String::new(),
        };

        assert!(unrecognized.is_partition_failure());
        assert!(!start.is_partition_failure());
        assert!(!ReassignError::Configuration("x".to_string()).is_partition_failure());
    }
}
