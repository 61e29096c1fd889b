//! Configuration file handling.
//!
//! Controller (`.ctrl`) and device (`.spec`) configurations share a
//! line-oriented `KEY=VALUE` format: `#` starts a comment, whitespace is
//! insignificant, and keys are case-insensitive. Values are lowercased
//! before interpretation. Unknown keys and unparsable values are logged
//! and skipped; a missing required parameter fails initialization.

mod ctrl;
mod device;
mod timing;

pub use ctrl::CtrlConfig;
pub use device::{DeviceConfig, Timings};
pub use timing::Timing;

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;

/// Errors raised while loading or validating a configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Underlying I/O error (file not found, unreadable, a directory, ...).
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file does not carry the expected extension.
    BadExtension {
        path: PathBuf,
        expected: &'static str,
    },

    /// A required parameter was never assigned a value.
    MissingParam { path: PathBuf, name: &'static str },

    /// A parameter combination failed validation.
    Invalid(String),

    /// The address-mapping scheme could not be built.
    AddrMap(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::BadExtension { path, expected } => {
                write!(f, "{} is not a <.{expected}> file", path.display())
            }
            Self::MissingParam { path, name } => {
                write!(f, "{}: {name} needs a value", path.display())
            }
            Self::Invalid(msg) => write!(f, "{msg}"),
            Self::AddrMap(msg) => write!(f, "address map: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Outcome of assigning a single `KEY=VALUE` pair to a config struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SetResult {
    Ok,
    UnknownKey,
    BadValue,
}

/// Verify a file name ends in `.{expected}`.
pub(crate) fn check_extension(path: &Path, expected: &'static str) -> Result<(), ConfigError> {
    match path.extension() {
        Some(ext) if ext.eq_ignore_ascii_case(expected) => Ok(()),
        _ => Err(ConfigError::BadExtension {
            path: path.to_path_buf(),
            expected,
        }),
    }
}

/// Read a `KEY=VALUE` file, feeding each pair to `apply`.
///
/// Comments (`#` to end of line) and whitespace are stripped, blank lines
/// skipped. Keys are uppercased and values lowercased before `apply` sees
/// them. Per-line faults are warnings, not errors: lines without `=`,
/// unknown keys, and unparsable values are logged and ignored.
pub(crate) fn read_file<F>(path: &Path, mut apply: F) -> Result<(), ConfigError>
where
    F: FnMut(&str, &str) -> SetResult,
{
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    for (idx, raw) in text.lines().enumerate() {
        let uncommented = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let line: String = uncommented.chars().filter(|c| !c.is_whitespace()).collect();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            warn!(
                "{}:{}: ignoring line '{line}' because '=' is missing",
                path.display(),
                idx + 1
            );
            continue;
        };
        let key = key.to_ascii_uppercase();
        let value = value.to_ascii_lowercase();
        match apply(&key, &value) {
            SetResult::Ok => {}
            SetResult::UnknownKey => {
                warn!(
                    "{}:{}: ignoring {key} because it is not a valid parameter name",
                    path.display(),
                    idx + 1
                );
            }
            SetResult::BadValue => {
                warn!(
                    "{}:{}: ignoring {key} because '{value}' cannot be parsed",
                    path.display(),
                    idx + 1
                );
            }
        }
    }

    Ok(())
}
