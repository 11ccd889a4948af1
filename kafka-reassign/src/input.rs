use std::{fs, path::Path};

use serde::Deserialize;

use crate::{
    error::ReassignError,
    reassign::{BrokerId, ReassignmentRequest},
};

/// One entry of the input file: `{"topic": "orders", "partition": 3, "to": [1, 2, 3]}`
#[derive(Debug, Clone, Deserialize)]
pub struct PlannedMove {
    pub topic: String,
    pub partition: u32,
    pub to: Vec<BrokerId>,
}

impl TryFrom<PlannedMove> for ReassignmentRequest {
    type Error = ReassignError;

    fn try_from(planned: PlannedMove) -> Result<Self, Self::Error> {
        ReassignmentRequest::new(planned.topic, planned.partition, planned.to)
    }
}

pub fn parse_requests(content: &str) -> Result<Vec<ReassignmentRequest>, ReassignError> {
    let planned: Vec<PlannedMove> = serde_json::from_str(content)
        .map_err(|e| ReassignError::Configuration(format!("malformed input: {e}")))?;
    planned.into_iter().map(TryInto::try_into).collect()
}

pub fn load_requests(path: &Path) -> Result<Vec<ReassignmentRequest>, ReassignError> {
    let content = fs::read_to_string(path).map_err(|e| {
        ReassignError::Configuration(format!("can't read input file {}: {e}", path.display()))
    })?;
    parse_requests(&content)
}
