use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Context};
use clap::{ArgGroup, Parser};
use tracing::{error, info};

use crate::{
    config::{ClusterConfig, EndpointResolver, DEFAULT_COORDINATION_FLAG, DEFAULT_KAFKA_ROOT},
    error::{CapturedError, ReassignError},
    input::load_requests,
    reassign::{
        FailurePolicy, Orchestrator, PollBudget, ReassignTool, RequestBuilder, ThrottleSchedule,
        ThrottleSource,
    },
    utils::runner::{ProcessRunner, Strictness},
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(group(
    ArgGroup::new("throttle_source")
        .required(true)
        .args(["throttle", "throttle_file"]),
))]
pub struct Cli {
    /// Root directory of the Kafka installation. The standard Kafka scripts must be under its bin/
    /// directory
    #[arg(long, env = "KAFKA_REASSIGN_KAFKA_HOME", default_value = DEFAULT_KAFKA_ROOT)]
    pub kafka_home: PathBuf,

    /// The connection string for the zookeeper connection. If not specified, an attempt to read it
    /// from the Kafka config file is made
    #[arg(long, env = "KAFKA_REASSIGN_ZOOKEEPER")]
    pub zookeeper: Option<String>,

    /// Kafka config file scanned for zookeeper.connect. Defaults to config/server.properties under
    /// the Kafka home
    #[arg(long, env = "KAFKA_REASSIGN_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// JSON file containing the partition assignment, a list of {"topic", "partition", "to"}
    #[arg(long, env = "KAFKA_REASSIGN_INPUT")]
    pub input: PathBuf,

    /// Replication throttle in B/s. A comma separated list raises the throttle one step every
    /// second progress check
    #[arg(long, env = "KAFKA_REASSIGN_THROTTLE")]
    pub throttle: Option<String>,

    /// JSON array of throttle values, re-read before every partition
    #[arg(long, env = "KAFKA_REASSIGN_THROTTLE_FILE")]
    pub throttle_file: Option<PathBuf>,

    /// Seconds to wait between completion checks
    #[arg(long, env = "KAFKA_REASSIGN_RETRY_AFTER")]
    pub retry_after: u64,

    /// Seconds to wait after starting a reassignment before the first completion check
    #[arg(long, env = "KAFKA_REASSIGN_SETTLE_SECS", default_value_t = 5)]
    pub settle_secs: u64,

    /// Name of the flag used to pass the endpoint to the tool, without leading dashes
    #[arg(
        long,
        env = "KAFKA_REASSIGN_COORDINATION_FLAG",
        default_value = DEFAULT_COORDINATION_FLAG
    )]
    pub coordination_flag: String,

    /// Don't treat output on the tool's stderr as a failure
    #[arg(long, env = "KAFKA_REASSIGN_ALLOW_STDERR", default_value = "false")]
    pub allow_stderr: bool,

    /// Give up on a partition after this many completion checks
    #[arg(long, env = "KAFKA_REASSIGN_MAX_ATTEMPTS")]
    pub max_attempts: Option<u32>,

    /// Give up on a partition after polling it for this many seconds
    #[arg(long, env = "KAFKA_REASSIGN_DEADLINE_SECS")]
    pub deadline_secs: Option<u64>,

    /// Keep going with the next partition when one fails verification or times out. Errors from
    /// the tool itself still stop the run
    #[arg(long, env = "KAFKA_REASSIGN_CONTINUE_ON_FAILURE", default_value = "false")]
    pub continue_on_failure: bool,

    /// Directory for the generated reassignment JSON files. Defaults to the system temp dir
    #[arg(long, env = "KAFKA_REASSIGN_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// For debug logs
    #[arg(long, env = "KAFKA_REASSIGN_DEBUG", default_value = "false")]
    pub debug: bool,
}

impl Cli {
    pub fn throttle_source(&self) -> Result<ThrottleSource, ReassignError> {
        match (&self.throttle, &self.throttle_file) {
            (Some(list), _) => Ok(ThrottleSource::Fixed(list.parse()?)),
            (None, Some(path)) => Ok(ThrottleSource::File(path.clone())),
            (None, None) => Err(ReassignError::Configuration(
                "one of --throttle or --throttle-file is required".to_string(),
            )),
        }
    }

    pub fn cluster_config(&self) -> Result<ClusterConfig, ReassignError> {
        let config_file = self
            .config_file
            .clone()
            .unwrap_or_else(|| ClusterConfig::default_config_file(&self.kafka_home));
        let resolver = EndpointResolver::new(self.zookeeper.clone(), config_file);

        let throttle = self.throttle_source()?;
        // Fail on an unreadable throttle file before anything is started
        let schedule: ThrottleSchedule = throttle.current()?;
        info!("first throttle: {}", schedule.initial());

        Ok(ClusterConfig {
            kafka_home: self.kafka_home.clone(),
            endpoint: resolver.endpoint()?.to_string(),
            coordination_flag: self.coordination_flag.clone(),
            throttle,
            retry_interval: Duration::from_secs(self.retry_after),
            settle_delay: Duration::from_secs(self.settle_secs),
            strictness: Strictness {
                raise_on_exit_status: true,
                raise_on_stderr: !self.allow_stderr,
            },
            poll_budget: PollBudget {
                max_attempts: self.max_attempts,
                deadline: self.deadline_secs.map(Duration::from_secs),
            },
            failure_policy: if self.continue_on_failure {
                FailurePolicy::Continue
            } else {
                FailurePolicy::Abort
            },
            scratch_dir: self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir),
            debug: self.debug,
        })
    }

    pub fn run(self) -> Result<(), CapturedError> {
        let requests = load_requests(&self.input)?;
        let config = self.cluster_config()?;
        config.log_summary();

        let tool = ReassignTool::new(
            ProcessRunner::new(config.strictness),
            config.tool(),
            &config.coordination_flag,
            &config.endpoint,
        );
        let orchestrator = Orchestrator::new(
            tool,
            RequestBuilder::new(&config.scratch_dir),
            config.retry_interval,
        )
        .with_settle_delay(config.settle_delay)
        .with_poll_budget(config.poll_budget);

        let report = orchestrator
            .run_batch(&requests, &config.throttle, config.failure_policy)
            .context("reassignment aborted")?;

        info!("{} partition(s) reassigned", report.completed.len());
        if !report.is_success() {
            for (request, err) in &report.failed {
                error!("{request}: {err}");
            }
            let failed: Vec<String> = report.failed.iter().map(|(r, _)| r.to_string()).collect();
            return Err(anyhow!(
                "{} partition(s) failed: {}",
                failed.len(),
                failed.join(", ")
            )
            .into());
        }

        Ok(())
    }
}
