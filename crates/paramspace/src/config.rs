//! Defaults for running studies, stored as `config.yaml` in the data directory

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Program invoked once per data point
    pub command: Option<String>,
    /// Arguments passed ahead of the request file path
    pub args: Vec<String>,
    /// Where per-point output directories are created. Relative paths are
    /// resolved against the data directory.
    pub runs_dir: PathBuf,
    /// Where measure revisions are looked up. Relative paths are resolved
    /// against the data directory.
    pub measures_dir: PathBuf,
    /// Cap on data points submitted per run
    pub max_points: Option<usize>,
    /// Worker threads for concurrent runs; 0 uses one per core
    pub threads: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            runs_dir: PathBuf::from("runs"),
            measures_dir: PathBuf::from("measures"),
            max_points: None,
            threads: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: RunConfig = serde_saphyr::from_str("command: ./simulate.sh\nthreads: 4\n").unwrap();
        assert_eq!(config.command.as_deref(), Some("./simulate.sh"));
        assert_eq!(config.threads, 4);
        assert_eq!(config.runs_dir, PathBuf::from("runs"));
        assert!(config.args.is_empty());
        assert_eq!(config.max_points, None);
    }

    #[test]
    fn test_config_round_trip() {
        let config = RunConfig {
            command: Some("python3".into()),
            args: vec!["run_point.py".into()],
            max_points: Some(10),
            ..RunConfig::default()
        };
        let yaml = serde_saphyr::to_string(&config).unwrap();
        let back: RunConfig = serde_saphyr::from_str(&yaml).unwrap();
        assert_eq!(back, config);
    }
}
