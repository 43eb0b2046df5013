//! Shared HTTP client construction, run errors, and exit-code mapping.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use lsdrop_config::ConfigError;
use reqwest::Client;
use reqwest::redirect::Policy;

/// Default bound on the whole upload request.
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;

const USER_AGENT: &str = concat!("lsdrop/", env!("CARGO_PKG_VERSION"));

/// How device-side rejections map onto the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum ExitPolicy {
    /// Rejections exit with 0, like a successful upload.
    #[default]
    Compatible,
    /// Rejections exit with their own non-zero code.
    Strict,
}

/// Terminal run failures. Each maps to a distinct exit code and user message.
#[derive(Debug)]
pub(crate) enum RunError {
    Usage(String),
    MissingArgument,
    FileNotFound { path: PathBuf },
    Config(ConfigError),
    Transport(anyhow::Error),
    UploadRejected { file_name: String },
}

/// Convenience alias for functions returning a `RunError`.
pub(crate) type RunResult<T> = Result<T, RunError>;

impl RunError {
    pub(crate) fn transport(error: impl Into<anyhow::Error>) -> Self {
        Self::Transport(error.into())
    }

    pub(crate) const fn exit_code(&self, policy: ExitPolicy) -> i32 {
        match self {
            Self::Usage(_) | Self::MissingArgument => 1,
            Self::FileNotFound { .. } => 2,
            Self::Config(_) => 3,
            Self::Transport(_) => 4,
            Self::UploadRejected { .. } => match policy {
                ExitPolicy::Compatible => 0,
                ExitPolicy::Strict => 5,
            },
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Usage(message) => message.trim_end().to_string(),
            Self::MissingArgument => "Argument 1 must be a valid torrent.".to_string(),
            Self::FileNotFound { path } => {
                format!("Argument is not a valid file:\n{}", path.display())
            }
            Self::Config(error) => {
                format!("Error while getting LinkStation IP:\n{}", error.detail())
            }
            Self::Transport(error) => format!("Error while posting to LinkStation:\n{error:#}"),
            Self::UploadRejected { file_name } => {
                format!("LinkStation did not accept torrent: {file_name}")
            }
        }
    }

    /// Stable label used in structured logs.
    pub(crate) const fn kind(&self) -> &'static str {
        match self {
            Self::Usage(_) => "usage",
            Self::MissingArgument => "missing_argument",
            Self::FileNotFound { .. } => "file_not_found",
            Self::Config(_) => "config",
            Self::Transport(_) => "transport",
            Self::UploadRejected { .. } => "upload_rejected",
        }
    }
}

impl Display for RunError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("lsdrop run failed")
    }
}

impl std::error::Error for RunError {}

impl From<ConfigError> for RunError {
    fn from(error: ConfigError) -> Self {
        Self::Config(error)
    }
}

/// Build the single-use HTTP client for the upload.
///
/// Redirects are not followed and requests are bounded by `timeout`.
pub(crate) fn build_client(timeout: Duration) -> RunResult<Client> {
    Client::builder()
        .timeout(timeout)
        .redirect(Policy::none())
        .user_agent(USER_AGENT)
        .build()
        .map_err(|err| RunError::transport(anyhow!("failed to build HTTP client: {err}")))
}
