// Source inspection using ffprobe

use crate::engine::core::{HdrKind, SourceCodec};
use crate::engine::error::EngineError;
use crate::engine::hardware::ProbeSettings;
use crate::engine::process::{ProcessError, run_with_timeout};
use serde::Serialize;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{debug, warn};

/// Share of the container bitrate attributed to video when the stream
/// carries no bit rate of its own.
pub const VIDEO_SHARE_OF_TOTAL: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceProfile {
    pub codec: SourceCodec,
    pub bit_depth: u8,
    pub width: u32,
    pub height: u32,
    /// 0.0 means unknown
    pub duration_seconds: f64,
    pub video_bitrate_bps: u64,
    pub is_hdr: bool,
    pub hdr_kind: HdrKind,
}

impl Default for SourceProfile {
    fn default() -> Self {
        Self {
            codec: SourceCodec::H264,
            bit_depth: 8,
            width: 1920,
            height: 1080,
            duration_seconds: 0.0,
            video_bitrate_bps: 0,
            is_hdr: false,
            hdr_kind: HdrKind::Sdr,
        }
    }
}

fn json_f64(v: &serde_json::Value) -> Option<f64> {
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        .filter(|n| n.is_finite())
}

fn json_u64(v: &serde_json::Value) -> Option<u64> {
    v.as_u64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse::<u64>().ok()))
}

/// Bit depth from a pixel format name (`yuv420p10le`, `p010le`, ...)
pub fn bit_depth_from_pix_fmt(pix_fmt: &str) -> Option<u8> {
    let fmt = pix_fmt.to_ascii_lowercase();
    if fmt.contains("12le") || fmt.contains("12be") || fmt.starts_with("p012") {
        Some(12)
    } else if fmt.contains("10le") || fmt.contains("10be") || fmt.starts_with("p010") {
        Some(10)
    } else if fmt.is_empty() {
        None
    } else {
        Some(8)
    }
}

/// Map a color transfer characteristic to an HDR kind
pub fn hdr_kind_from_transfer(transfer: &str) -> HdrKind {
    match transfer.trim().to_ascii_lowercase().as_str() {
        "smpte2084" => HdrKind::Hdr10,
        "arib-std-b67" => HdrKind::Hlg,
        _ => HdrKind::Sdr,
    }
}

/// `VIDEO_SHARE_OF_TOTAL * file_size * 8 / duration`
pub fn derived_video_bitrate(file_size_bytes: u64, duration_seconds: f64) -> u64 {
    if duration_seconds <= 0.0 || !duration_seconds.is_finite() {
        return 0;
    }
    (VIDEO_SHARE_OF_TOTAL * (file_size_bytes as f64 * 8.0 / duration_seconds)).round() as u64
}

impl SourceProfile {
    /// Parse ffprobe `-print_format json -show_format -show_streams` output.
    ///
    /// Missing fields keep their defaults. Unparseable JSON, or output without
    /// a video stream, is an error.
    pub fn from_ffprobe_json(json: &str, file_size_bytes: u64) -> Result<Self, String> {
        let root: serde_json::Value =
            serde_json::from_str(json).map_err(|e| format!("Failed to parse ffprobe JSON: {}", e))?;

        let mut profile = SourceProfile::default();
        let format = &root["format"];

        let stream = root["streams"]
            .as_array()
            .and_then(|streams| {
                streams
                    .iter()
                    .find(|s| s["codec_type"].as_str() == Some("video"))
            })
            .ok_or_else(|| "no video stream".to_string())?;

        if let Some(name) = stream["codec_name"].as_str() {
            profile.codec = SourceCodec::from_ffprobe_name(name);
        }

        let raw_depth = json_u64(&stream["bits_per_raw_sample"]).and_then(|d| match d {
            8 | 10 | 12 => Some(d as u8),
            _ => None,
        });
        let fmt_depth = stream["pix_fmt"].as_str().and_then(bit_depth_from_pix_fmt);
        if let Some(depth) = raw_depth.or(fmt_depth) {
            profile.bit_depth = depth;
        }

        if let (Some(w), Some(h)) = (json_u64(&stream["width"]), json_u64(&stream["height"])) {
            if w > 0 && h > 0 {
                profile.width = w as u32;
                profile.height = h as u32;
            }
        }

        profile.duration_seconds = json_f64(&stream["duration"])
            .or_else(|| json_f64(&format["duration"]))
            .filter(|d| *d > 0.0)
            .unwrap_or(0.0);

        let size = json_u64(&format["size"]).unwrap_or(file_size_bytes);
        profile.video_bitrate_bps = json_u64(&stream["bit_rate"])
            .filter(|b| *b > 0)
            .unwrap_or_else(|| derived_video_bitrate(size, profile.duration_seconds));

        if let Some(transfer) = stream["color_transfer"].as_str() {
            profile.hdr_kind = hdr_kind_from_transfer(transfer);
            profile.is_hdr = profile.hdr_kind != HdrKind::Sdr;
        }

        Ok(profile)
    }
}

/// Runs ffprobe with a bounded timeout.
#[derive(Debug, Clone)]
pub struct SourceInspector {
    settings: ProbeSettings,
}

impl SourceInspector {
    pub fn new(settings: ProbeSettings) -> Self {
        Self { settings }
    }

    /// Probe a file, reporting failures with their category.
    pub fn probe_source(&self, path: &Path) -> Result<SourceProfile, EngineError> {
        let timeout = self.settings.ffprobe_timeout();
        let mut args: Vec<&OsStr> = [
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "-select_streams",
            "v:0", // First video stream only
        ]
        .into_iter()
        .map(OsStr::new)
        .collect();
        args.push(path.as_os_str());

        let output =
            run_with_timeout(&self.settings.ffprobe_bin, args, timeout).map_err(|e| match e {
                ProcessError::Timeout { .. } => EngineError::FileTimeout {
                    path: path.to_path_buf(),
                    secs: timeout.as_secs(),
                },
                ProcessError::Spawn { .. } => EngineError::ProbeError(e.to_string()),
                ProcessError::Failed { .. } => {
                    EngineError::FileCorrupted(format!("{}: {}", path.display(), e))
                }
            })?;

        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let profile = SourceProfile::from_ffprobe_json(&output.stdout, size)
            .map_err(|e| EngineError::FileCorrupted(format!("{}: {}", path.display(), e)))?;

        debug!(
            path = %path.display(),
            codec = profile.codec.as_str(),
            bit_depth = profile.bit_depth,
            width = profile.width,
            height = profile.height,
            duration = profile.duration_seconds,
            bitrate = profile.video_bitrate_bps,
            hdr = ?profile.hdr_kind,
            "probed source"
        );
        Ok(profile)
    }

    /// Best-effort inspection: any failure yields the default profile.
    pub fn inspect(&self, path: &Path) -> SourceProfile {
        match self.probe_source(path) {
            Ok(profile) => profile,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "source probe failed, using defaults");
                SourceProfile::default()
            }
        }
    }
}
