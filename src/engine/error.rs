//! Error taxonomy for refusals surfaced to the caller.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Stable category names reported alongside every refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    FileNotFound,
    FileCorrupted,
    FileTimeout,
    ProbeError,
    HardwareUnavailable,
    UnsupportedSource,
    ConfigurationError,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileNotFound => "FILE_NOT_FOUND",
            Self::FileCorrupted => "FILE_CORRUPTED",
            Self::FileTimeout => "FILE_TIMEOUT",
            Self::ProbeError => "PROBE_ERROR",
            Self::HardwareUnavailable => "HARDWARE_UNAVAILABLE",
            Self::UnsupportedSource => "UNSUPPORTED_SOURCE",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("file corrupted: {0}")]
    FileCorrupted(String),

    #[error("media probe timed out after {secs}s: {}", .path.display())]
    FileTimeout { path: PathBuf, secs: u64 },

    #[error("media probe failed: {0}")]
    ProbeError(String),

    #[error("hardware unavailable: {0}")]
    HardwareUnavailable(String),

    #[error("unsupported source: {0}")]
    UnsupportedSource(String),

    #[error("configuration error: {0}")]
    ConfigurationError(String),
}

impl EngineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::FileNotFound(_) => ErrorCategory::FileNotFound,
            Self::FileCorrupted(_) => ErrorCategory::FileCorrupted,
            Self::FileTimeout { .. } => ErrorCategory::FileTimeout,
            Self::ProbeError(_) => ErrorCategory::ProbeError,
            Self::HardwareUnavailable(_) => ErrorCategory::HardwareUnavailable,
            Self::UnsupportedSource(_) => ErrorCategory::UnsupportedSource,
            Self::ConfigurationError(_) => ErrorCategory::ConfigurationError,
        }
    }

    /// Remediation hint shown next to the refusal, where one is known.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Self::FileNotFound(_) => Some("check the input path and library mount"),
            Self::FileCorrupted(_) => Some("re-download or remux the source file"),
            Self::FileTimeout { .. } => {
                Some("check that the file is readable and not on a stalled network share")
            }
            Self::ProbeError(_) => Some("check that ffprobe is installed and on PATH"),
            Self::HardwareUnavailable(_) => Some(
                "enable software fallback (encoding_mode = auto) or check /dev/dri device mapping",
            ),
            Self::UnsupportedSource(_) => {
                Some("enable software fallback (encoding_mode = auto) for this source")
            }
            Self::ConfigurationError(_) => Some("fix the expert command template"),
        }
    }
}
