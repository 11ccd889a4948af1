use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
    time::Duration,
};

use tracing::info;

use crate::{
    error::ReassignError,
    reassign::{FailurePolicy, PollBudget, ThrottleSource, REASSIGN_SCRIPT},
    utils::{
        properties::resolve_endpoint,
        runner::{tool_path, Strictness},
    },
};

pub const DEFAULT_KAFKA_ROOT: &str = "/usr/share/varadhi-kafka";
pub const DEFAULT_KAFKA_CONFIG: &str = "config/server.properties";
pub const DEFAULT_COORDINATION_FLAG: &str = "zookeeper";

/// Resolves the coordination endpoint. The first successful resolution is kept for the life of
/// the resolver; a run builds one resolver, so the config file is read at most once per run.
pub struct EndpointResolver {
    explicit: Option<String>,
    config_file: PathBuf,
    resolved: OnceLock<String>,
}

impl EndpointResolver {
    pub fn new(explicit: Option<String>, config_file: impl Into<PathBuf>) -> Self {
        Self {
            explicit,
            config_file: config_file.into(),
            resolved: OnceLock::new(),
        }
    }

    pub fn endpoint(&self) -> Result<&str, ReassignError> {
        if let Some(endpoint) = self.resolved.get() {
            return Ok(endpoint);
        }
        let endpoint = resolve_endpoint(self.explicit.as_deref(), &self.config_file)?;
        Ok(self.resolved.get_or_init(|| endpoint))
    }
}

/// Everything a run needs, settled before the first partition is touched.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub kafka_home: PathBuf,
    pub endpoint: String,
    pub coordination_flag: String,
    pub throttle: ThrottleSource,
    pub retry_interval: Duration,
    pub settle_delay: Duration,
    pub strictness: Strictness,
    pub poll_budget: PollBudget,
    pub failure_policy: FailurePolicy,
    pub scratch_dir: PathBuf,
    pub debug: bool,
}

impl ClusterConfig {
    pub fn default_config_file(kafka_home: &Path) -> PathBuf {
        kafka_home.join(DEFAULT_KAFKA_CONFIG)
    }

    pub fn tool(&self) -> PathBuf {
        tool_path(&self.kafka_home, REASSIGN_SCRIPT)
    }

    pub fn log_summary(&self) {
        info!("Using:");
        info!("kafka root: {}", self.kafka_home.display());
        info!("zk url: {}", self.endpoint);
        match &self.throttle {
            ThrottleSource::Fixed(schedule) => info!("throttle: {schedule}"),
            ThrottleSource::File(path) => info!("throttle file: {}", path.display()),
        }
        info!("retry after: {} seconds", self.retry_interval.as_secs());
        info!("failure policy: {:?}", self.failure_policy);
        if let Some(max) = self.poll_budget.max_attempts {
            info!("max verify attempts per partition: {max}");
        }
        if let Some(deadline) = self.poll_budget.deadline {
            info!("deadline per partition: {} seconds", deadline.as_secs());
        }
        info!("debug: {}", self.debug);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn resolver_memoises_the_first_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("server.properties");
        fs::write(&file, "zookeeper.connect=first:2181\n").unwrap();
        let resolver = EndpointResolver::new(None, &file);

        assert_eq!(resolver.endpoint().unwrap(), "first:2181");

        fs::write(&file, "zookeeper.connect=second:2181\n").unwrap();
        assert_eq!(resolver.endpoint().unwrap(), "first:2181");
    }

    #[test]
    fn resolver_prefers_explicit_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("server.properties");
        fs::write(&file, "zookeeper.connect=file:2181\n").unwrap();

        let resolver = EndpointResolver::new(Some("cli:2181".to_string()), &file);

        assert_eq!(resolver.endpoint().unwrap(), "cli:2181");
    }

    #[test]
    fn resolver_failure_is_not_memoised() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("server.properties");
        let resolver = EndpointResolver::new(None, &file);

        assert!(resolver.endpoint().is_err());

        fs::write(&file, "zookeeper.connect=late:2181\n").unwrap();
        assert_eq!(resolver.endpoint().unwrap(), "late:2181");
    }

    #[test]
    fn config_file_lives_under_kafka_home() {
        let home = Path::new("/opt/kafka");

        assert_eq!(
            ClusterConfig::default_config_file(home),
            PathBuf::from("/opt/kafka/config/server.properties")
        );
    }
}
