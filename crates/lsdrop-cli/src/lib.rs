#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::redundant_pub_crate)]

//! Command-line helper that uploads a torrent file to a LinkStation device.
//!
//! Layout:
//! - `cli.rs`: argument parsing and the run controller
//! - `client.rs`: HTTP client construction, run errors, and exit codes
//! - `upload.rs`: multipart framing, the upload request, response classification
//! - `notify.rs`: notices and the notification channel
//! - `main.rs`: thin entrypoint delegating to `run()`

pub(crate) mod cli;
pub(crate) mod client;
pub(crate) mod notify;
pub(crate) mod upload;

pub use cli::{OutputFormat, run, run_from};
pub use notify::{ConsoleNotifier, NOTIFY_DURATION, Notice, Notifier, Severity};
