//! Error types shared by the metrics, the item index and the readers.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MetricError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    /// A caller supplied an argument outside the domain of a metric, e.g. `k <= 1`
    /// for the rank-discount serendipity scorers.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// An item that is not part of the item universe the metric was built with.
    #[error("Unknown item: {item}")]
    UnknownItem { item: String },

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Unable to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("Unable to parse line {line}: {message}")]
    Parse { line: usize, message: String },
}

impl MetricError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn unknown_item(item: impl std::fmt::Debug) -> Self {
        Self::UnknownItem {
            item: format!("{:?}", item),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Io {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

impl From<csv::Error> for MetricError {
    fn from(err: csv::Error) -> Self {
        let line = err
            .position()
            .map(|position| position.line() as usize)
            .unwrap_or_default();
        Self::parse(line, err.to_string())
    }
}
