//! Error types for address resolution.
//!
//! # Design
//! - Constant error messages; the offending path or value lives in typed fields.
//! - Underlying IO and parse errors are preserved as sources.

use std::io;
use std::net::AddrParseError;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for address resolution.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Failures raised while producing a destination address.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The directory of the running executable could not be determined.
    #[error("failed to locate executable directory")]
    ExecutableLocation {
        /// Underlying IO error.
        source: io::Error,
    },
    /// The config file could not be read.
    #[error("failed to read config file")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The config file bytes were not valid text in any accepted encoding.
    #[error("config file is not valid text")]
    Decode {
        /// Config file path.
        path: PathBuf,
        /// Static reason for the failure.
        reason: &'static str,
    },
    /// The address source yielded nothing but whitespace.
    #[error("address source is empty")]
    Empty {
        /// Human description of the source that was consulted.
        source_desc: String,
    },
    /// The address argument is not valid Unicode.
    #[error("address is not valid unicode")]
    NonUnicode {
        /// Human description of the source that was consulted.
        source_desc: String,
        /// Lossy rendering of the offending value.
        value: String,
    },
    /// The address text is not standard IPv4 or IPv6 notation.
    #[error("invalid network address")]
    InvalidAddress {
        /// Human description of the source that was consulted.
        source_desc: String,
        /// Offending (trimmed) text.
        value: String,
        /// Underlying parse error.
        source: AddrParseError,
    },
}

impl ConfigError {
    /// Describe the failure for an end user, including the underlying cause.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::ExecutableLocation { source } => format!("{self}: {source}"),
            Self::Read { path, source } => format!("{self} {}: {source}", path.display()),
            Self::Decode { path, reason } => format!("{self} {}: {reason}", path.display()),
            Self::Empty { source_desc } => format!("{self} ({source_desc})"),
            Self::NonUnicode { source_desc, value } => {
                format!("{self} '{value}' from {source_desc}")
            }
            Self::InvalidAddress {
                source_desc,
                value,
                source,
            } => format!("{self} '{value}' from {source_desc}: {source}"),
        }
    }
}
