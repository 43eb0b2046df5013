//! Destination address sources and the resolver entry point.

use std::ffi::OsStr;
use std::fmt::{self, Display, Formatter};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::decode::read_config_file;
use crate::error::{ConfigError, ConfigResult};

/// File name of the address config, stored next to the executable.
pub const CONFIG_FILE_NAME: &str = "lsip.txt";

/// Where a destination address came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressSource {
    /// The second positional command-line argument.
    Argument,
    /// The address config file at the given path.
    File(PathBuf),
}

impl Display for AddressSource {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Argument => formatter.write_str("command-line argument"),
            Self::File(path) => write!(formatter, "config file {}", path.display()),
        }
    }
}

/// Network address of the device receiving the upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DestinationAddress(IpAddr);

impl DestinationAddress {
    /// Wrap an already parsed IP address.
    #[must_use]
    pub const fn new(ip: IpAddr) -> Self {
        Self(ip)
    }

    /// The underlying IP address.
    #[must_use]
    pub const fn ip(self) -> IpAddr {
        self.0
    }

    /// Socket address for `port`; IPv6 renders bracketed (`[::1]:8080`).
    #[must_use]
    pub const fn socket_addr(self, port: u16) -> SocketAddr {
        SocketAddr::new(self.0, port)
    }
}

impl Display for DestinationAddress {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, formatter)
    }
}

/// Location of the address config when none is supplied: `lsip.txt` beside the executable.
///
/// # Errors
///
/// Returns [`ConfigError::ExecutableLocation`] if the executable path is unavailable.
pub fn default_config_path() -> ConfigResult<PathBuf> {
    let exe = std::env::current_exe().map_err(|source| ConfigError::ExecutableLocation { source })?;
    Ok(exe.parent().map_or_else(
        || PathBuf::from(CONFIG_FILE_NAME),
        |dir| dir.join(CONFIG_FILE_NAME),
    ))
}

/// Parse `text` as standard IPv4 or IPv6 notation after trimming whitespace.
///
/// # Errors
///
/// Returns [`ConfigError::Empty`] for blank input and [`ConfigError::InvalidAddress`]
/// for anything that is not a literal IP address (host names included).
pub fn parse_address(text: &str, source: &AddressSource) -> ConfigResult<DestinationAddress> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Empty {
            source_desc: source.to_string(),
        });
    }
    trimmed
        .parse::<IpAddr>()
        .map(DestinationAddress)
        .map_err(|err| ConfigError::InvalidAddress {
            source_desc: source.to_string(),
            value: trimmed.to_string(),
            source: err,
        })
}

/// Text of an address given on the command line.
///
/// # Errors
///
/// Returns [`ConfigError::NonUnicode`] when the argument is not valid Unicode.
pub fn argument_text(raw: &OsStr) -> ConfigResult<&str> {
    raw.to_str().ok_or_else(|| ConfigError::NonUnicode {
        source_desc: AddressSource::Argument.to_string(),
        value: raw.to_string_lossy().into_owned(),
    })
}

/// Resolve the destination address once for this run.
///
/// An explicit argument always wins. Otherwise the config file is read, from
/// `config_path` when given or from [`default_config_path`].
///
/// # Errors
///
/// Propagates any [`ConfigError`] from locating, reading, decoding, or parsing the source.
pub fn resolve_address(
    explicit: Option<&str>,
    config_path: Option<&Path>,
) -> ConfigResult<(DestinationAddress, AddressSource)> {
    let (text, source) = if let Some(value) = explicit {
        (value.to_string(), AddressSource::Argument)
    } else {
        let path = match config_path {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };
        debug!(path = %path.display(), "reading address config");
        (read_config_file(&path)?, AddressSource::File(path))
    };

    let address = parse_address(&text, &source)?;
    info!(%address, %source, "resolved destination address");
    Ok((address, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn parse_address_accepts_ipv4_and_ipv6() {
        let v4 = parse_address(" 192.168.11.150\r\n", &AddressSource::Argument).expect("ipv4");
        assert_eq!(v4.ip(), IpAddr::V4(Ipv4Addr::new(192, 168, 11, 150)));

        let v6 = parse_address("::1", &AddressSource::Argument).expect("ipv6");
        assert_eq!(v6.ip(), IpAddr::V6(Ipv6Addr::LOCALHOST));
        assert_eq!(v6.socket_addr(8080).to_string(), "[::1]:8080");
    }

    #[test]
    fn parse_address_rejects_host_names_and_garbage() {
        for input in ["linkstation.local", "300.1.1.1", "192.168.1", "1.2.3.4:8080"] {
            let err = parse_address(input, &AddressSource::Argument).expect_err(input);
            assert!(
                matches!(err, ConfigError::InvalidAddress { ref value, .. } if value == input),
                "unexpected error for {input}: {err:?}"
            );
        }
    }

    #[test]
    fn parse_address_rejects_blank_input() {
        let source = AddressSource::File(PathBuf::from("/opt/lsdrop/lsip.txt"));
        let err = parse_address("  \n", &source).expect_err("blank");
        match err {
            ConfigError::Empty { source_desc } => {
                assert_eq!(source_desc, "config file /opt/lsdrop/lsip.txt");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn explicit_argument_skips_config_file() {
        let (address, source) = resolve_address(
            Some("10.1.2.3"),
            Some(Path::new("/definitely/missing/lsip.txt")),
        )
        .expect("explicit address");
        assert_eq!(address.to_string(), "10.1.2.3");
        assert_eq!(source, AddressSource::Argument);
    }

    #[test]
    fn argument_text_passes_unicode_through() {
        assert_eq!(argument_text(OsStr::new("10.0.0.9")).expect("unicode"), "10.0.0.9");
    }

    #[cfg(unix)]
    #[test]
    fn argument_text_rejects_non_unicode() {
        use std::os::unix::ffi::OsStrExt;

        let err = argument_text(OsStr::from_bytes(&[0xff, 0x31])).expect_err("non-unicode");
        match err {
            ConfigError::NonUnicode { source_desc, value } => {
                assert_eq!(source_desc, "command-line argument");
                assert_eq!(value, "\u{fffd}1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn default_config_path_sits_beside_executable() {
        let path = default_config_path().expect("current exe available in tests");
        assert_eq!(
            path.file_name().and_then(|name| name.to_str()),
            Some(CONFIG_FILE_NAME)
        );
    }
}
