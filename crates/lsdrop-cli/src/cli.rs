//! Argument parsing and the one-shot run controller.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use lsdrop_config::{argument_text, resolve_address};
use lsdrop_telemetry::{LoggingConfig, build_sha, init_logging};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::client::{DEFAULT_TIMEOUT_SECS, ExitPolicy, RunError, RunResult, build_client};
use crate::notify::{
    ConsoleNotifier, NOTIFY_DURATION, Notice, NotificationScope, Notifier, Severity,
};
use crate::upload::{DEFAULT_PORT, TargetFile, UploadOutcome, UploadTarget, Uploader};

/// Parses process arguments, performs the upload, and notifies on the console.
/// Returns the process exit code.
pub async fn run() -> i32 {
    match Cli::try_parse() {
        Ok(cli) => {
            install_logging(&cli);
            let notifier = ConsoleNotifier::new(cli.output, cli.notify_hold());
            execute(cli, &notifier).await
        }
        Err(err) => report_parse_error(err, &ConsoleNotifier::default()).await,
    }
}

/// Run against explicit arguments (including the program name) and notifier.
///
/// Does not install a tracing subscriber; embedders own their logging setup.
pub async fn run_from<I, T>(args: I, notifier: &dyn Notifier) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => execute(cli, notifier).await,
        Err(err) => report_parse_error(err, notifier).await,
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "lsdrop",
    version,
    about = "Upload a .torrent file to a LinkStation download manager"
)]
pub(crate) struct Cli {
    #[arg(allow_hyphen_values = true, help = "Path to the .torrent file to upload")]
    torrent: Option<PathBuf>,
    #[arg(
        allow_hyphen_values = true,
        help = "Device IP address; read from the config file when omitted"
    )]
    address: Option<OsString>,
    #[arg(hide = true)]
    extra: Vec<OsString>,
    #[arg(
        long,
        env = "LSDROP_CONFIG",
        help = "Address config file (defaults to lsip.txt beside the executable)"
    )]
    config: Option<PathBuf>,
    #[arg(long, env = "LSDROP_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,
    #[arg(
        long,
        env = "LSDROP_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Upper bound in seconds for the upload request"
    )]
    timeout: u64,
    #[arg(
        long,
        env = "LSDROP_NOTIFY_MS",
        default_value_t = default_notify_ms(),
        help = "How long the final notice stays up before exiting"
    )]
    notify_ms: u64,
    #[arg(
        long = "output",
        alias = "format",
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Select how notices are rendered"
    )]
    output: OutputFormat,
    #[arg(long, env = "LSDROP_LOG_FILE", help = "Append a diagnostic log to this file")]
    log_file: Option<PathBuf>,
    #[arg(long, help = "Exit with code 5 when the device rejects the torrent")]
    strict_exit: bool,
}

impl Cli {
    const fn notify_hold(&self) -> Duration {
        Duration::from_millis(self.notify_ms)
    }

    const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    const fn exit_policy(&self) -> ExitPolicy {
        if self.strict_exit {
            ExitPolicy::Strict
        } else {
            ExitPolicy::Compatible
        }
    }
}

fn default_notify_ms() -> u64 {
    u64::try_from(NOTIFY_DURATION.as_millis()).unwrap_or(u64::MAX)
}

/// Rendering of end-of-run notices.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `lsdrop [severity] message` lines.
    #[default]
    Text,
    /// One JSON object per notice.
    Json,
}

/// Controller stages, in the only order they may occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Start,
    ValidatingArgs,
    ResolvingAddress,
    Uploading,
    Notifying,
    Exiting,
}

impl Stage {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::ValidatingArgs => "validating_args",
            Self::ResolvingAddress => "resolving_address",
            Self::Uploading => "uploading",
            Self::Notifying => "notifying",
            Self::Exiting => "exiting",
        }
    }
}

#[derive(Debug)]
struct Progress {
    current: Stage,
}

impl Progress {
    const fn start() -> Self {
        Self {
            current: Stage::Start,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(next > self.current, "stages only move forward");
        debug!(from = self.current.as_str(), to = next.as_str(), "stage");
        self.current = next;
    }
}

fn install_logging(cli: &Cli) {
    let config = LoggingConfig {
        log_file: cli.log_file.as_deref(),
        build_sha: option_env!("LSDROP_BUILD_SHA").unwrap_or("dev"),
        ..LoggingConfig::default()
    };
    match init_logging(&config) {
        Ok(Some(path)) => debug!(path = %path.display(), "diagnostic log active"),
        Ok(None) => {}
        Err(err) => eprintln!("logging unavailable: {err:#}"),
    }
}

async fn report_parse_error(err: clap::Error, notifier: &dyn Notifier) -> i32 {
    if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
        if let Err(print_err) = err.print() {
            warn!(error = %print_err, "failed to print usage");
        }
        return 0;
    }

    let failure = RunError::Usage(err.render().to_string());
    let scope = NotificationScope::acquire(notifier);
    scope
        .show(&Notice::new(Severity::Error, failure.display_message()))
        .await;
    failure.exit_code(ExitPolicy::default())
}

async fn execute(cli: Cli, notifier: &dyn Notifier) -> i32 {
    let trace_id = Uuid::new_v4();
    let span = info_span!("lsdrop", %trace_id, build_sha = build_sha());
    let policy = cli.exit_policy();

    async move {
        let mut progress = Progress::start();
        let scope = NotificationScope::acquire(notifier);
        let result = deliver(&cli, &mut progress).await;

        progress.advance(Stage::Notifying);
        let (notice, exit_code) = match result {
            Ok(file_name) => {
                info!(file = %file_name, "torrent accepted");
                let message = format!("Torrent added successfully: {file_name}");
                (Notice::new(Severity::Info, message), 0)
            }
            Err(err) => {
                let exit_code = err.exit_code(policy);
                let message = err.display_message();
                error!(kind = err.kind(), exit_code, %message, "run failed");
                (Notice::new(Severity::Error, message), exit_code)
            }
        };
        scope.show(&notice).await;

        progress.advance(Stage::Exiting);
        drop(scope);
        info!(exit_code, "run finished");
        exit_code
    }
    .instrument(span)
    .await
}

/// Validate, resolve, and upload. Returns the accepted file name.
async fn deliver(cli: &Cli, progress: &mut Progress) -> RunResult<String> {
    progress.advance(Stage::ValidatingArgs);
    let path = cli.torrent.as_deref().ok_or(RunError::MissingArgument)?;
    let file = TargetFile::inspect(path).ok_or_else(|| RunError::FileNotFound {
        path: path.to_path_buf(),
    })?;
    debug!(file = file.file_name(), bytes = file.len(), "torrent file validated");

    progress.advance(Stage::ResolvingAddress);
    if !cli.extra.is_empty() {
        warn!(count = cli.extra.len(), "ignoring extra arguments");
    }
    let explicit = cli.address.as_deref().map(argument_text).transpose()?;
    let (address, source) = resolve_address(explicit, cli.config.as_deref())?;
    debug!(%address, %source, "destination resolved");

    progress.advance(Stage::Uploading);
    let uploader = Uploader::new(build_client(cli.request_timeout())?);
    let target = UploadTarget::new(address, cli.port);
    match uploader
        .send(&file, &target)
        .await
        .map_err(RunError::transport)?
    {
        UploadOutcome::Accepted => Ok(file.file_name().to_string()),
        UploadOutcome::Rejected { response } => {
            warn!(%response, "device rejected torrent");
            Err(RunError::UploadRejected {
                file_name: file.file_name().to_string(),
            })
        }
    }
}
