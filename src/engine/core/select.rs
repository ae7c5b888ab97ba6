//! Encoder selection: (policy, capabilities, source) -> encoder choice.

use super::profile::{EncodingPolicy, resolve_policy};
use super::settings::{EncodingMode, RawSettings};
use super::types::{Backend, EncoderChoice, TargetCodec, VideoCodec};
use crate::engine::error::EngineError;
use crate::engine::hardware::CapabilitySnapshot;
use crate::engine::probe::SourceProfile;
use tracing::info;

/// Chosen encoder plus the decisions that led to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub codec: VideoCodec,
    pub choice: EncoderChoice,
    /// Human-readable decision log, oldest first
    pub decisions: Vec<String>,
}

/// Effective policy and encoder for one job.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub policy: EncodingPolicy,
    pub codec: VideoCodec,
    pub choice: EncoderChoice,
    pub decisions: Vec<String>,
}

/// Software in auto mode, the given error in hardware-only mode.
fn fallback(
    mode: EncodingMode,
    codec: VideoCodec,
    decisions: &mut Vec<String>,
    reason: &str,
    hard_stop: impl FnOnce(String) -> EngineError,
) -> Result<EncoderChoice, EngineError> {
    if mode == EncodingMode::HardwareOnly {
        return Err(hard_stop(reason.to_string()));
    }
    let choice = EncoderChoice::software(codec);
    decisions.push(format!("{}; falling back to software encoder {}", reason, choice.name));
    Ok(choice)
}

/// Pick the encoder for the policy's target codec.
///
/// 1. software-only mode always picks software.
/// 2. no graphics device: software (auto) or `HardwareUnavailable`.
/// 3. AV1 needs `supports_av1_encode`: software (auto) or `HardwareUnavailable`.
/// 4. AMF when preferred and present, else VA-API when present, else fallback.
/// 5. 10-bit source on VA-API without 10-bit encode: software (auto) or
///    `UnsupportedSource`.
pub fn select_encoder(
    policy: &EncodingPolicy,
    snapshot: &CapabilitySnapshot,
    source: &SourceProfile,
) -> Result<Selection, EngineError> {
    let codec = policy.target_codec.resolve(source.codec);
    let mut decisions = Vec::new();
    if policy.target_codec == TargetCodec::Copy {
        decisions.push(format!(
            "target codec 'copy' resolved to {} from source {}",
            codec,
            source.codec.as_str()
        ));
    }

    let choice = choose(policy, snapshot, source, codec, &mut decisions)?;

    if !choice.is_hardware()
        && !snapshot.encoders.software.is_empty()
        && !snapshot.encoders.software.contains(&choice.name)
    {
        decisions.push(format!(
            "warning: ffmpeg did not report {}; the encode may fail",
            choice.name
        ));
    }

    decisions.push(format!(
        "selected {} ({:?}, {:?}) for {}",
        choice.name, choice.class, choice.backend, codec
    ));
    info!(encoder = %choice.name, codec = %codec, mode = ?policy.mode, "encoder selected");

    Ok(Selection {
        codec,
        choice,
        decisions,
    })
}

fn choose(
    policy: &EncodingPolicy,
    snapshot: &CapabilitySnapshot,
    source: &SourceProfile,
    codec: VideoCodec,
    decisions: &mut Vec<String>,
) -> Result<EncoderChoice, EngineError> {
    if policy.mode == EncodingMode::SoftwareOnly {
        decisions.push("software-only mode".to_string());
        return Ok(EncoderChoice::software(codec));
    }

    let gfx = &snapshot.graphics;
    let mode = policy.mode;

    if !gfx.vendor_detected {
        return fallback(
            mode,
            codec,
            decisions,
            "no supported graphics device detected",
            EngineError::HardwareUnavailable,
        );
    }

    if codec == VideoCodec::Av1 && !gfx.supports_av1_encode {
        let reason = format!(
            "{} generation GPU has no AV1 hardware encoder",
            gfx.generation.display_name()
        );
        return fallback(mode, codec, decisions, &reason, EngineError::HardwareUnavailable);
    }

    let encoders = &snapshot.encoders;
    let candidate = if policy.prefer_class_a && encoders.hardware_class_a.contains(codec.amf_encoder())
    {
        EncoderChoice::amf(codec)
    } else if encoders.hardware_class_b.contains(codec.vaapi_encoder()) {
        EncoderChoice::vaapi(codec)
    } else {
        let reason = format!("no hardware {} encoder reported by ffmpeg", codec);
        return fallback(mode, codec, decisions, &reason, EngineError::HardwareUnavailable);
    };

    if source.bit_depth >= 10 && candidate.backend == Backend::Vaapi && !gfx.supports_10bit_encode {
        let reason = format!(
            "{}-bit source but {} generation GPU cannot encode 10-bit via VA-API",
            source.bit_depth,
            gfx.generation.display_name()
        );
        return fallback(mode, codec, decisions, &reason, EngineError::UnsupportedSource);
    }

    Ok(candidate)
}

/// Resolve the tier and select the encoder in one step.
pub fn resolve(
    raw: &RawSettings,
    snapshot: &CapabilitySnapshot,
    source: &SourceProfile,
) -> Result<Resolution, EngineError> {
    let policy = resolve_policy(raw)?;
    let selection = select_encoder(&policy, snapshot, source)?;
    Ok(Resolution {
        policy,
        codec: selection.codec,
        choice: selection.choice,
        decisions: selection.decisions,
    })
}
