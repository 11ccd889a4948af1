use std::{fs, path::Path};

use regex::Regex;
use tracing::info;

use crate::error::ReassignError;

pub const ZOOKEEPER_CONNECT_PATTERN: &str = "^zookeeper.connect=(.*)";

/// Scans a properties file line by line for `pattern`, returning the trimmed first capture group
/// of the last matching line.
pub fn scan_last_match(content: &str, pattern: &Regex) -> Option<String> {
    let mut found = None;
    for line in content.lines() {
        if let Some(caps) = pattern.captures(line) {
            found = caps.get(1).map(|m| m.as_str().trim().to_string());
        }
    }
    found
}

/// Resolves the coordination endpoint. An explicit value always wins; otherwise the
/// `zookeeper.connect` entry of `config_file` is used.
pub fn resolve_endpoint(
    explicit: Option<&str>,
    config_file: &Path,
) -> Result<String, ReassignError> {
    if let Some(endpoint) = explicit {
        return Ok(endpoint.to_string());
    }

    if !config_file.is_file() {
        info!("Config file {} does not exist", config_file.display());
        return Err(ReassignError::Configuration(format!(
            "no zookeeper URL given and config file {} does not exist",
            config_file.display()
        )));
    }

    info!("Reading {}", config_file.display());
    let content = fs::read_to_string(config_file).map_err(|e| {
        ReassignError::Configuration(format!(
            "no zookeeper URL given and config file {} could not be read: {e}",
            config_file.display()
        ))
    })?;
    let pattern = Regex::new(ZOOKEEPER_CONNECT_PATTERN)
        .map_err(|e| ReassignError::Configuration(e.to_string()))?;

    match scan_last_match(&content, &pattern) {
        Some(endpoint) if !endpoint.is_empty() => Ok(endpoint),
        _ => Err(ReassignError::Configuration(format!(
            "no zookeeper URL given and no zookeeper.connect entry in {}",
            config_file.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use test_log::test;

    fn properties(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn explicit_endpoint_wins_over_file() {
        let file = properties("zookeeper.connect=from-file:2181\n");

        let endpoint = resolve_endpoint(Some("explicit:2181/kafka"), file.path()).unwrap();

        assert_eq!(endpoint, "explicit:2181/kafka");
    }

    #[test]
    fn explicit_endpoint_does_not_need_a_file() {
        let endpoint =
            resolve_endpoint(Some("zk:2181"), Path::new("/does/not/exist.properties")).unwrap();

        assert_eq!(endpoint, "zk:2181");
    }

    #[test]
    fn last_matching_line_wins() {
        let file = properties(
            "broker.id=1\nzookeeper.connect=a:2181\nlog.dirs=/data\nzookeeper.connect=b:2181\n",
        );

        assert_eq!(resolve_endpoint(None, file.path()).unwrap(), "b:2181");
    }

    #[test]
    fn capture_is_trimmed() {
        let file = properties("zookeeper.connect=  zk1:2181,zk2:2181/kafka  \r\n");

        assert_eq!(
            resolve_endpoint(None, file.path()).unwrap(),
            "zk1:2181,zk2:2181/kafka"
        );
    }

    #[test]
    fn commented_and_indented_lines_do_not_match() {
        let file = properties("#zookeeper.connect=old:2181\n  zookeeper.connect=indented:2181\n");

        let err = resolve_endpoint(None, file.path()).unwrap_err();

        assert!(matches!(err, ReassignError::Configuration(_)));
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        let err = resolve_endpoint(None, Path::new("/does/not/exist.properties")).unwrap_err();

        assert!(matches!(err, ReassignError::Configuration(_)));
    }

    #[test]
    fn unreadable_file_is_a_configuration_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"zookeeper.connect=zk:2181\n\xff\n").unwrap();

        let err = resolve_endpoint(None, file.path()).unwrap_err();

        assert!(matches!(err, ReassignError::Configuration(_)));
    }

    #[test]
    fn empty_value_is_a_configuration_error() {
        let file = properties("zookeeper.connect=\n");

        let err = resolve_endpoint(None, file.path()).unwrap_err();

        assert!(matches!(err, ReassignError::Configuration(_)));
    }
}
