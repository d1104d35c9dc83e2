use std::ffi::OsStr;
use std::fs::File;

use justconfig::error::ConfigError;
use justconfig::item::{MapAction, StringItem, ValueExtractor};
use justconfig::processors::Trim;
use justconfig::sources::env::Env;
use justconfig::sources::text::ConfigText;
use justconfig::ConfPath;
use justconfig::Config;

use crate::errors::{MetricError, Result};
use crate::metrics::FitPolicy;

// Set some default values
const DEFAULT_K: usize = 10;
const DEFAULT_CLUSTERING_SEED: u64 = 42;
const DEFAULT_CLUSTERING_MAX_ITERATIONS: usize = 300;
const DEFAULT_LOG_LEVEL: &str = "info";

pub struct AppConfig {
    pub data: DataConfig,
    pub metrics: MetricsConfig,
    pub clustering: ClusteringConfig,
    pub runtime: RuntimeConfig,
    pub log: LogConfig,
}

pub struct DataConfig {
    pub training_data_path: String,
    pub predictions_path: String,
    pub embeddings_path: Option<String>,
}

pub struct MetricsConfig {
    pub k: usize,
    pub fit_policy: FitPolicy,
}

pub struct ClusteringConfig {
    pub seed: u64,
    pub max_iterations: usize,
}

pub struct RuntimeConfig {
    pub num_workers: usize,
}

pub struct LogConfig {
    pub level: String,
}

/// Strips one pair of surrounding double quotes, unquoted values are kept as they are.
trait StripQuotes {
    fn strip_quotes(self) -> std::result::Result<StringItem, ConfigError>;
}

impl StripQuotes for std::result::Result<StringItem, ConfigError> {
    fn strip_quotes(self) -> std::result::Result<StringItem, ConfigError> {
        self?.map(|value| {
            let value = value.trim();
            match value.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) {
                Some(inner) => MapAction::Replace(vec![inner.to_owned()]),
                None => MapAction::Keep,
            }
        })
    }
}

fn required_string(conf: &Config, path: ConfPath, name: &str) -> Result<String> {
    conf.get(path)
        .strip_quotes()
        .value()
        .map_err(|err| MetricError::config(format!("{}: {}", name, err)))
}

fn optional_string(conf: &Config, path: ConfPath) -> Option<String> {
    conf.get(path).strip_quotes().value().ok()
}

impl AppConfig {
    /// Loads the configuration file at `config_path`, if it exists, with
    /// environment variables taking precedence.
    pub fn new(config_path: &str) -> Result<AppConfig> {
        let mut conf = Config::default();

        if let Ok(config_file) = File::open(config_path) {
            let config_text = ConfigText::new(config_file, config_path)
                .map_err(|err| MetricError::config(format!("{}: {}", config_path, err)))?;
            conf.add_source(config_text);
        }

        let config_env = Env::new(&[
            (
                ConfPath::from(&["data", "training_data_path"]),
                OsStr::new("TRAINING_DATA"),
            ),
            (
                ConfPath::from(&["data", "predictions_path"]),
                OsStr::new("PREDICTIONS"),
            ),
            (
                ConfPath::from(&["data", "embeddings_path"]),
                OsStr::new("EMBEDDINGS"),
            ),
            (
                ConfPath::from(&["runtime", "num_workers"]),
                OsStr::new("NUM_WORKERS"),
            ),
            (ConfPath::from(&["log", "level"]), OsStr::new("LOG_LEVEL")),
        ]);
        conf.add_source(config_env);

        AppConfig::parse(&conf)
    }

    pub fn parse(conf: &Config) -> Result<AppConfig> {
        Ok(AppConfig {
            data: DataConfig::parse(conf, ConfPath::from(&["data"]))?,
            metrics: MetricsConfig::parse(conf, ConfPath::from(&["metrics"]))?,
            clustering: ClusteringConfig::parse(conf, ConfPath::from(&["clustering"])),
            runtime: RuntimeConfig::parse(conf, ConfPath::from(&["runtime"])),
            log: LogConfig::parse(conf, ConfPath::from(&["log"])),
        })
    }
}

impl DataConfig {
    fn parse(conf: &Config, path: ConfPath) -> Result<DataConfig> {
        Ok(DataConfig {
            training_data_path: required_string(
                conf,
                path.push("training_data_path"),
                "data.training_data_path",
            )?,
            predictions_path: required_string(
                conf,
                path.push("predictions_path"),
                "data.predictions_path",
            )?,
            embeddings_path: optional_string(conf, path.push("embeddings_path")),
        })
    }
}

impl MetricsConfig {
    fn parse(conf: &Config, path: ConfPath) -> Result<MetricsConfig> {
        let fit_policy = match optional_string(conf, path.push("fit_policy")) {
            Some(raw) => raw.parse::<FitPolicy>()?,
            None => FitPolicy::default(),
        };
        Ok(MetricsConfig {
            k: conf.get(path.push("k")).trim().value().unwrap_or(DEFAULT_K),
            fit_policy,
        })
    }
}

impl ClusteringConfig {
    fn parse(conf: &Config, path: ConfPath) -> ClusteringConfig {
        ClusteringConfig {
            seed: conf
                .get(path.push("seed"))
                .trim()
                .value()
                .unwrap_or(DEFAULT_CLUSTERING_SEED),
            max_iterations: conf
                .get(path.push("max_iterations"))
                .trim()
                .value()
                .unwrap_or(DEFAULT_CLUSTERING_MAX_ITERATIONS),
        }
    }
}

impl RuntimeConfig {
    fn parse(conf: &Config, path: ConfPath) -> RuntimeConfig {
        RuntimeConfig {
            num_workers: conf
                .get(path.push("num_workers"))
                .trim()
                .value()
                // Detect number of CPUs
                .unwrap_or_else(|_| sys_info::cpu_num().map_or(1, |cpus| cpus as usize))
                .max(1),
        }
    }
}

impl LogConfig {
    fn parse(conf: &Config, path: ConfPath) -> LogConfig {
        LogConfig {
            level: optional_string(conf, path.push("level"))
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        }
    }
}
