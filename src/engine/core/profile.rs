//! Tier resolution: raw settings in, one plain `EncodingPolicy` out.

use super::settings::{
    AudioMode, ConfigTier, EncodingMode, PresetProfile, QualityLevel, RateControl, RawSettings,
    SubtitleMode,
};
use super::template;
use super::types::TargetCodec;
use crate::engine::error::EngineError;
use serde::Serialize;

/// Highest quantizer any supported encoder accepts (SVT-AV1 CRF range).
pub const MAX_QUALITY_VALUE: u8 = 63;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioPolicy {
    pub mode: AudioMode,
    pub languages: Vec<String>,
    pub codec: String,
    pub bitrate: String,
}

impl AudioPolicy {
    pub fn is_copy(&self) -> bool {
        self.codec.eq_ignore_ascii_case("copy")
    }
}

/// Effective, read-only configuration for one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodingPolicy {
    pub tier: ConfigTier,
    pub mode: EncodingMode,
    pub prefer_class_a: bool,
    pub target_codec: TargetCodec,
    pub rate_control: RateControl,
    pub quality: Option<u8>,
    pub quality_level: QualityLevel,
    pub software_preset: Option<String>,
    pub bitrate: String,
    pub max_bitrate: String,
    pub audio: AudioPolicy,
    pub subtitles: SubtitleMode,
    pub preserve_hdr: bool,
    pub hardware_decode: bool,
    pub threads: Option<usize>,
    pub skip_optimal: bool,
    pub skip_if_target_codec: bool,
    pub container: Option<String>,
    /// Set only for the expert tier; replaces the built command entirely
    pub template: Option<String>,
}

/// Field overrides contributed by an easy-tier row or an advanced preset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresetOverrides {
    pub target_codec: Option<TargetCodec>,
    pub rate_control: Option<RateControl>,
    pub quality: Option<u8>,
    pub quality_level: Option<QualityLevel>,
    pub software_preset: Option<&'static str>,
}

/// Fixed easy-tier table keyed by the quality level.
pub fn easy_tier_row(level: QualityLevel) -> PresetOverrides {
    let (codec, quality, preset) = match level {
        QualityLevel::Speed => (TargetCodec::H264, 26, "veryfast"),
        QualityLevel::Balanced => (TargetCodec::Hevc, 24, "medium"),
        QualityLevel::Quality => (TargetCodec::Hevc, 20, "slow"),
    };
    PresetOverrides {
        target_codec: Some(codec),
        rate_control: Some(RateControl::ConstantQuality),
        quality: Some(quality),
        quality_level: Some(level),
        software_preset: Some(preset),
    }
}

impl PresetProfile {
    pub fn overrides(&self) -> PresetOverrides {
        match self {
            Self::Fast => PresetOverrides {
                target_codec: Some(TargetCodec::H264),
                rate_control: Some(RateControl::ConstantQuality),
                quality: Some(26),
                quality_level: Some(QualityLevel::Speed),
                software_preset: Some("veryfast"),
            },
            Self::Balanced => PresetOverrides {
                target_codec: Some(TargetCodec::Hevc),
                rate_control: Some(RateControl::ConstantQuality),
                quality: Some(24),
                quality_level: Some(QualityLevel::Balanced),
                software_preset: Some("medium"),
            },
            // Leaves the codec to the user: "quality" applies to any target
            Self::Quality => PresetOverrides {
                target_codec: None,
                rate_control: Some(RateControl::ConstantQuality),
                quality: Some(20),
                quality_level: Some(QualityLevel::Quality),
                software_preset: Some("slow"),
            },
            Self::Archive => PresetOverrides {
                target_codec: Some(TargetCodec::Av1),
                rate_control: Some(RateControl::ConstantQuality),
                quality: Some(28),
                quality_level: Some(QualityLevel::Quality),
                software_preset: Some("slower"),
            },
        }
    }
}

fn base_policy(raw: &RawSettings) -> EncodingPolicy {
    EncodingPolicy {
        tier: raw.tier,
        mode: raw.encoding_mode,
        prefer_class_a: raw.prefer_class_a,
        target_codec: raw.target_codec,
        rate_control: raw.rate_control,
        quality: raw.quality,
        quality_level: raw.quality_level,
        software_preset: raw.software_preset.clone(),
        bitrate: raw.bitrate.trim().to_string(),
        max_bitrate: raw.max_bitrate.trim().to_string(),
        audio: AudioPolicy {
            mode: raw.audio_mode,
            languages: raw.audio_languages.clone(),
            codec: raw.audio_codec.trim().to_string(),
            bitrate: raw.audio_bitrate.trim().to_string(),
        },
        subtitles: raw.subtitles,
        preserve_hdr: raw.preserve_hdr,
        hardware_decode: raw.hardware_decode,
        threads: raw.threads,
        skip_optimal: raw.skip_optimal,
        skip_if_target_codec: raw.skip_if_target_codec,
        container: raw.container.clone(),
        template: None,
    }
}

fn apply(policy: &mut EncodingPolicy, o: PresetOverrides) {
    if let Some(codec) = o.target_codec {
        policy.target_codec = codec;
    }
    if let Some(rc) = o.rate_control {
        policy.rate_control = rc;
    }
    if let Some(q) = o.quality {
        policy.quality = Some(q);
    }
    if let Some(level) = o.quality_level {
        policy.quality_level = level;
    }
    if let Some(preset) = o.software_preset {
        policy.software_preset = Some(preset.to_string());
    }
}

/// Resolve the effective policy for exactly one tier.
pub fn resolve_policy(raw: &RawSettings) -> Result<EncodingPolicy, EngineError> {
    let mut policy = base_policy(raw);

    match raw.tier {
        ConfigTier::Easy => apply(&mut policy, easy_tier_row(raw.quality_level)),
        ConfigTier::Advanced => {
            if let Some(preset) = raw.preset_profile {
                apply(&mut policy, preset.overrides());
            }
        }
        ConfigTier::Expert => {
            // Parse now so a broken template refuses the job before any probing
            template::parse_template(&raw.expert_template)?;
            policy.template = Some(raw.expert_template.clone());
        }
    }

    validate_policy(&policy)?;
    Ok(policy)
}

fn validate_policy(policy: &EncodingPolicy) -> Result<(), EngineError> {
    if let Some(q) = policy.quality {
        if q > MAX_QUALITY_VALUE {
            return Err(EngineError::ConfigurationError(format!(
                "quality {} is out of range (0-{})",
                q, MAX_QUALITY_VALUE
            )));
        }
    }

    if policy.rate_control.uses_bitrate() {
        for (name, value) in [("bitrate", &policy.bitrate), ("max_bitrate", &policy.max_bitrate)] {
            if parse_bitrate(value).is_none() {
                return Err(EngineError::ConfigurationError(format!(
                    "{} '{}' is not a valid bitrate (e.g. 2M, 2500k)",
                    name, value
                )));
            }
        }
    }

    if policy.audio.mode == AudioMode::Language && policy.audio.languages.is_empty() {
        return Err(EngineError::ConfigurationError(
            "audio_mode = language needs at least one entry in audio_languages".to_string(),
        ));
    }

    if !policy.audio.is_copy() && policy.audio.bitrate.is_empty() {
        return Err(EngineError::ConfigurationError(
            "audio_bitrate is required when transcoding audio".to_string(),
        ));
    }

    Ok(())
}

/// Parse an ffmpeg-style bitrate ("2M", "2500k", "1.5M", "800000") into bits/s.
pub fn parse_bitrate(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let (number, multiplier) = match value.chars().last()? {
        'k' | 'K' => (&value[..value.len() - 1], 1_000.0),
        'm' | 'M' => (&value[..value.len() - 1], 1_000_000.0),
        'g' | 'G' => (&value[..value.len() - 1], 1_000_000_000.0),
        _ => (value, 1.0),
    };
    let n: f64 = number.parse().ok()?;
    if !n.is_finite() || n <= 0.0 {
        return None;
    }
    Some((n * multiplier).round() as u64)
}
