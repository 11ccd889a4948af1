use std::{
    io::Write,
    path::{Path, PathBuf},
};

use serde::Serialize;
use tracing::debug;

use crate::error::ReassignError;

pub type BrokerId = i32;

pub const ASSIGNMENT_FORMAT_VERSION: u8 = 1;

/// The desired replica list for one partition. Replica order is significant: the first broker is
/// the preferred leader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassignmentRequest {
    topic: String,
    partition: u32,
    target_replicas: Vec<BrokerId>,
}

impl ReassignmentRequest {
    pub fn new(
        topic: impl Into<String>,
        partition: u32,
        target_replicas: Vec<BrokerId>,
    ) -> Result<Self, ReassignError> {
        let topic = topic.into();
        if topic.is_empty() {
            return Err(ReassignError::Configuration(format!(
                "partition {partition} has an empty topic name"
            )));
        }
        if target_replicas.is_empty() {
            return Err(ReassignError::Configuration(format!(
                "{topic}-{partition} has no target replicas"
            )));
        }

        Ok(Self {
            topic,
            partition,
            target_replicas,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition(&self) -> u32 {
        self.partition
    }

    pub fn target_replicas(&self) -> &[BrokerId] {
        &self.target_replicas
    }
}

impl std::fmt::Display for ReassignmentRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

#[derive(Serialize)]
struct AssignmentDocument<'a> {
    version: u8,
    partitions: [PartitionAssignment<'a>; 1],
}

#[derive(Serialize)]
struct PartitionAssignment<'a> {
    topic: &'a str,
    partition: u32,
    replicas: &'a [BrokerId],
}

pub fn render(request: &ReassignmentRequest) -> Result<String, ReassignError> {
    let document = AssignmentDocument {
        version: ASSIGNMENT_FORMAT_VERSION,
        partitions: [PartitionAssignment {
            topic: request.topic(),
            partition: request.partition(),
            replicas: request.target_replicas(),
        }],
    };
    serde_json::to_string(&document)
        .map_err(|e| ReassignError::json(format!("serializing assignment for {request}"), e))
}

/// A reassignment JSON file handed to the tool. It is written once, never rewritten, and left on
/// disk for the OS to clean up with the rest of its temp dir.
#[derive(Debug, Clone)]
pub struct Artifact {
    path: PathBuf,
    content: String,
}

impl Artifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn path_arg(&self) -> String {
        self.path.display().to_string()
    }
}

#[derive(Debug, Clone)]
pub struct RequestBuilder {
    scratch_dir: PathBuf,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl RequestBuilder {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn build(&self, request: &ReassignmentRequest) -> Result<Artifact, ReassignError> {
        let content = render(request)?;

        let prefix = format!("{}-{}-", request.topic(), request.partition());
        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".json")
            .tempfile_in(&self.scratch_dir)
            .map_err(|e| {
                ReassignError::io(
                    format!("creating assignment file in {}", self.scratch_dir.display()),
                    e,
                )
            })?;
        file.write_all(content.as_bytes())
            .map_err(|e| ReassignError::io(format!("writing assignment for {request}"), e))?;

        let (_file, path) = file
            .keep()
            .map_err(|e| ReassignError::io(format!("keeping assignment for {request}"), e.error))?;

        debug!("temp file: {}. content: {}", path.display(), content);

        Ok(Artifact { path, content })
    }
}
