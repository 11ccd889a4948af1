use std::{fs, path::PathBuf, str::FromStr};

use crate::error::ReassignError;

/// Replication throttles in B/s, applied in order as a reassignment keeps running. The first value
/// is used to start it, the last one sticks once reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleSchedule {
    steps: Vec<u64>,
}

impl ThrottleSchedule {
    pub fn new(steps: Vec<u64>) -> Result<Self, ReassignError> {
        if steps.is_empty() {
            return Err(ReassignError::Configuration(
                "throttle schedule must contain at least one value".to_string(),
            ));
        }
        Ok(Self { steps })
    }

    pub fn fixed(throttle: u64) -> Self {
        Self {
            steps: vec![throttle],
        }
    }

    pub fn load(path: &std::path::Path) -> Result<Self, ReassignError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ReassignError::io(format!("reading throttle file {}", path.display()), e)
        })?;
        let steps: Vec<u64> = serde_json::from_str(&content).map_err(|e| {
            ReassignError::json(format!("parsing throttle file {}", path.display()), e)
        })?;
        Self::new(steps)
    }

    pub fn initial(&self) -> u64 {
        self.step(0)
    }

    pub fn step(&self, index: usize) -> u64 {
        self.steps[index.min(self.steps.len() - 1)]
    }

    pub fn steps(&self) -> &[u64] {
        &self.steps
    }

    /// The throttle to switch to after `in_progress_polls` consecutive "still in progress"
    /// reports, if this is a poll on which the throttle moves up a step.
    pub fn escalation_after(&self, in_progress_polls: usize) -> Option<u64> {
        if in_progress_polls > 0
            && in_progress_polls % 2 == 0
            && in_progress_polls < 2 * self.steps.len()
        {
            Some(self.step(in_progress_polls / 2))
        } else {
            None
        }
    }
}

impl FromStr for ThrottleSchedule {
    type Err = ReassignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let steps = s
            .split(',')
            .map(|part| {
                part.trim().parse::<u64>().map_err(|e| {
                    ReassignError::Configuration(format!("invalid throttle value '{part}': {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(steps)
    }
}

impl std::fmt::Display for ThrottleSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.steps.iter().map(u64::to_string).collect();
        write!(f, "{}", parts.join(","))
    }
}

/// Where the throttle schedule comes from. A file is re-read before every partition so an operator
/// can adjust it while a long batch runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrottleSource {
    Fixed(ThrottleSchedule),
    File(PathBuf),
}

impl ThrottleSource {
    pub fn current(&self) -> Result<ThrottleSchedule, ReassignError> {
        match self {
            ThrottleSource::Fixed(schedule) => Ok(schedule.clone()),
            ThrottleSource::File(path) => ThrottleSchedule::load(path),
        }
    }
}
