//! User-facing notices and the notification channel abstraction.
//!
//! # Design
//! - A notice stays visible for a fixed hold before the run may continue to exit.
//! - The run controller owns a [`NotificationScope`]; dropping it dismisses the
//!   channel exactly once on every exit path.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::time::sleep;
use tracing::debug;

use crate::cli::OutputFormat;

/// How long a notice stays visible before the run proceeds.
pub const NOTIFY_DURATION: Duration = Duration::from_millis(5000);

const NOTICE_TITLE: &str = "lsdrop";

/// Notice severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The upload went through.
    Info,
    /// The run failed or the device refused the torrent.
    Error,
}

impl Severity {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Error => "error",
        }
    }
}

/// A short message surfaced to the user at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Channel title.
    pub title: String,
    /// Severity tag.
    pub severity: Severity,
    /// Human-readable message, possibly multi-line.
    pub message: String,
}

impl Notice {
    /// Build a notice with the standard title.
    #[must_use]
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            title: NOTICE_TITLE.to_string(),
            severity,
            message: message.into(),
        }
    }
}

/// Sink for end-of-run notices.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Display `notice`, returning once it has been visible for the channel's hold.
    async fn show(&self, notice: &Notice);

    /// Release presentation resources. Called once, after the last notice.
    fn dismiss(&self) {}
}

/// Notifier that writes notices to the terminal.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleNotifier {
    format: OutputFormat,
    hold: Duration,
}

impl ConsoleNotifier {
    /// Create a console notifier rendering in `format` and holding for `hold`.
    #[must_use]
    pub const fn new(format: OutputFormat, hold: Duration) -> Self {
        Self { format, hold }
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new(OutputFormat::Text, NOTIFY_DURATION)
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn show(&self, notice: &Notice) {
        let rendered = render_notice(notice, self.format);
        match (self.format, notice.severity) {
            (OutputFormat::Text, Severity::Error) => eprintln!("{rendered}"),
            _ => println!("{rendered}"),
        }
        if !self.hold.is_zero() {
            sleep(self.hold).await;
        }
    }

    fn dismiss(&self) {
        debug!("console notifier dismissed");
    }
}

/// Render a notice for terminal output.
#[must_use]
pub(crate) fn render_notice(notice: &Notice, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!(
            "{} [{}] {}",
            notice.title,
            notice.severity.as_str(),
            notice.message
        ),
        OutputFormat::Json => serde_json::to_string(notice).unwrap_or_else(|err| {
            format!(
                "{{\"severity\":\"error\",\"message\":\"failed to format notice: {err}\"}}"
            )
        }),
    }
}

/// Scoped ownership of the notification channel for one run.
pub(crate) struct NotificationScope<'a> {
    notifier: &'a dyn Notifier,
}

impl<'a> NotificationScope<'a> {
    pub(crate) fn acquire(notifier: &'a dyn Notifier) -> Self {
        debug!("notification channel acquired");
        Self { notifier }
    }

    pub(crate) async fn show(&self, notice: &Notice) {
        self.notifier.show(notice).await;
    }
}

impl Drop for NotificationScope<'_> {
    fn drop(&mut self) {
        self.notifier.dismiss();
    }
}
