use std::path::PathBuf;

use thiserror::Error;

/// Problems with the command line, the config file or the colour file.
/// All of them are fatal at start-up.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0}")]
    Usage(String),

    #[error("help requested")]
    Help,

    #[error("invalid size {0:?}: expected a positive integer")]
    InvalidSize(String),

    #[error("invalid time {0:?}: expected HH:MM with hour 0-23 and minute 0-59")]
    InvalidTime(String),

    #[error("invalid font {pattern:?}: {reason}")]
    InvalidFont { pattern: String, reason: &'static str },

    #[error("invalid color {value:?} for {key}")]
    InvalidColor { key: String, value: String },

    #[error("-{0} and -{1} are mutually exclusive")]
    ConflictingEdges(&'static str, &'static str),

    #[error("invalid tick interval {0}: must be at least one second")]
    InvalidTick(u64),

    #[error("invalid popup padding {0}: must be at most {max} pixels", max = crate::config::MAX_POPUP_PADDING)]
    InvalidPadding(u32),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    /// Errors caused by a bad argument, which get the usage text too.
    pub fn wants_usage(&self) -> bool {
        matches!(
            self,
            Self::Usage(_)
                | Self::InvalidSize(_)
                | Self::InvalidTime(_)
                | Self::InvalidFont { .. }
                | Self::ConflictingEdges(..)
        )
    }
}

#[derive(Error, Debug)]
pub enum ClockError {
    #[error("system clock is set before the Unix epoch")]
    BeforeEpoch,

    #[error("local time for timestamp {0} is out of range")]
    OutOfRange(u64),
}
