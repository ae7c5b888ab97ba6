//! Pre-flight checks run before a job is enqueued or encoded.

use crate::engine::core::{EncodingPolicy, SourceCodec, VideoCodec, parse_bitrate};
use crate::engine::error::EngineError;
use crate::engine::probe::{SourceInspector, SourceProfile};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Anything smaller cannot hold a playable video stream
pub const MIN_PLAUSIBLE_SIZE_BYTES: u64 = 10 * 1024;

pub const MIN_DURATION_SECONDS: f64 = 1.0;

/// Tolerance above the optimal bitrate still counted as well compressed
pub const OPTIMAL_SLACK: f64 = 1.2;

/// Resolution buckets: (width, height, h264, hevc, av1) in bits per second
const BITRATE_BUCKETS: &[(u32, u32, u64, u64, u64)] = &[
    (854, 480, 1_500_000, 800_000, 600_000),
    (1280, 720, 3_000_000, 2_000_000, 1_500_000),
    (1920, 1080, 6_000_000, 4_000_000, 3_000_000),
    (2560, 1440, 10_000_000, 6_000_000, 4_500_000),
    (3840, 2160, 20_000_000, 12_000_000, 9_000_000),
];

/// Recommended video bitrate for `codec` at `width`x`height`.
///
/// Exact bucket dimensions return that bucket; anything else uses the
/// bucket nearest by pixel count, ties going to the smaller bucket.
pub fn get_optimal_bitrate_for_resolution(codec: VideoCodec, width: u32, height: u32) -> u64 {
    let pixels = width as i64 * height as i64;
    let bucket = BITRATE_BUCKETS
        .iter()
        .find(|(w, h, ..)| *w == width && *h == height)
        .or_else(|| {
            // min_by_key keeps the first minimum, i.e. the lower bucket on ties
            BITRATE_BUCKETS
                .iter()
                .min_by_key(|(w, h, ..)| (*w as i64 * *h as i64 - pixels).abs())
        });

    let Some(&(_, _, h264, hevc, av1)) = bucket else {
        return 0;
    };
    match codec {
        VideoCodec::H264 => h264,
        VideoCodec::Hevc => hevc,
        VideoCodec::Av1 => av1,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkipDecision {
    pub skip: bool,
    pub reason: String,
}

impl SkipDecision {
    fn skip(reason: impl Into<String>) -> Self {
        Self {
            skip: true,
            reason: reason.into(),
        }
    }

    fn encode(reason: impl Into<String>) -> Self {
        Self {
            skip: false,
            reason: reason.into(),
        }
    }
}

/// Decide whether re-encoding `source` under `policy` would be wasted work.
pub fn should_skip_as_optimal(source: &SourceProfile, policy: &EncodingPolicy) -> SkipDecision {
    if !policy.skip_optimal {
        return SkipDecision::encode("optimality check disabled");
    }

    let target = policy.target_codec.resolve(source.codec);

    if source.codec.efficiency() > target.efficiency() {
        return SkipDecision::skip(format!(
            "source already better: {} is more efficient than target {}",
            source.codec.as_str(),
            target
        ));
    }

    if policy.skip_if_target_codec
        && source.codec == target.as_source()
        && source.codec != SourceCodec::Other
        && source.bit_depth == target_bit_depth(source, target)
    {
        return SkipDecision::skip(format!(
            "already {} at {}-bit",
            target, source.bit_depth
        ));
    }

    let optimal = get_optimal_bitrate_for_resolution(target, source.width, source.height);
    if source.video_bitrate_bps > 0 && source.video_bitrate_bps as f64 <= optimal as f64 * OPTIMAL_SLACK {
        return SkipDecision::skip(format!(
            "already well compressed: {:.2} Mbps <= {:.2} Mbps for {} at {}x{}",
            source.video_bitrate_bps as f64 / 1_000_000.0,
            optimal as f64 * OPTIMAL_SLACK / 1_000_000.0,
            target,
            source.width,
            source.height
        ));
    }

    SkipDecision::encode(format!(
        "re-encode to {} worthwhile ({} bps source, {} bps optimal)",
        target, source.video_bitrate_bps, optimal
    ))
}

/// Bit depth the output would have; H.264 is always produced as 8-bit.
fn target_bit_depth(source: &SourceProfile, target: VideoCodec) -> u8 {
    match target {
        VideoCodec::H264 => 8,
        VideoCodec::Hevc | VideoCodec::Av1 => source.bit_depth,
    }
}

/// Soft issues that still allow a command to be built.
pub fn bitrate_warnings(policy: &EncodingPolicy, source: &SourceProfile) -> Vec<String> {
    let mut warnings = Vec::new();
    if !policy.rate_control.uses_bitrate() {
        return warnings;
    }
    let target = policy.target_codec.resolve(source.codec);
    let optimal = get_optimal_bitrate_for_resolution(target, source.width, source.height);
    if let Some(requested) = parse_bitrate(&policy.bitrate) {
        if requested < optimal / 2 {
            warnings.push(format!(
                "requested bitrate {} is under half the recommended {:.1} Mbps for {} at {}x{}",
                policy.bitrate,
                optimal as f64 / 1_000_000.0,
                target,
                source.width,
                source.height
            ));
        }
    }
    warnings
}

#[derive(Debug, Clone)]
pub struct Validator {
    inspector: SourceInspector,
}

impl Validator {
    pub fn new(inspector: SourceInspector) -> Self {
        Self { inspector }
    }

    /// Run the checks in order; the first failure wins.
    pub fn validate(&self, path: &Path) -> Result<SourceProfile, EngineError> {
        let meta = fs::metadata(path).map_err(|_| EngineError::FileNotFound(path.to_path_buf()))?;
        if !meta.is_file() {
            return Err(EngineError::FileNotFound(path.to_path_buf()));
        }

        let size = meta.len();
        if size == 0 {
            return Err(EngineError::FileCorrupted(format!(
                "{}: file is empty",
                path.display()
            )));
        }
        if size < MIN_PLAUSIBLE_SIZE_BYTES {
            return Err(EngineError::FileCorrupted(format!(
                "{}: {} bytes is too small to be a video (minimum {})",
                path.display(),
                size,
                MIN_PLAUSIBLE_SIZE_BYTES
            )));
        }

        let profile = self.inspector.probe_source(path)?;

        if profile.duration_seconds <= 0.0 {
            return Err(EngineError::FileCorrupted(format!(
                "{}: no duration reported",
                path.display()
            )));
        }
        if profile.duration_seconds < MIN_DURATION_SECONDS {
            return Err(EngineError::FileCorrupted(format!(
                "{}: duration {:.3}s is below {}s",
                path.display(),
                profile.duration_seconds,
                MIN_DURATION_SECONDS
            )));
        }

        debug!(path = %path.display(), size, "pre-flight passed");
        Ok(profile)
    }

    /// Probe `path` and apply [`should_skip_as_optimal`]. Probe failures never skip.
    pub fn should_skip_path(&self, path: &Path, policy: &EncodingPolicy) -> SkipDecision {
        match self.inspector.probe_source(path) {
            Ok(source) => {
                let decision = should_skip_as_optimal(&source, policy);
                if decision.skip {
                    info!(path = %path.display(), reason = %decision.reason, "skipping");
                }
                decision
            }
            Err(e) => SkipDecision::encode(format!("could not inspect source: {}", e)),
        }
    }
}
