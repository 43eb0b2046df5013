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

//! Destination address resolution for the lsdrop uploader.
//!
//! Layout: `error.rs` (`ConfigError`), `decode.rs` (config file text decoding),
//! `resolve.rs` (address sources, parsing, and the resolver entry point).

pub mod decode;
pub mod error;
pub mod resolve;

pub use decode::{decode_config_text, read_config_file};
pub use error::{ConfigError, ConfigResult};
pub use resolve::{
    AddressSource, CONFIG_FILE_NAME, DestinationAddress, argument_text, default_config_path,
    parse_address, resolve_address,
};
