//! Raw user settings as stored by the host (key/value map or TOML table).

use super::types::TargetCodec;
use crate::engine::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration tier. Always read from settings, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigTier {
    Easy,
    #[default]
    Advanced,
    Expert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingMode {
    #[default]
    Auto,
    #[serde(alias = "gpu_only")]
    HardwareOnly,
    #[serde(alias = "cpu_only")]
    SoftwareOnly,
}

/// Speed/quality knob shared by the easy tier table and the AMF `-quality` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Speed,
    #[default]
    Balanced,
    Quality,
}

impl QualityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Speed => "speed",
            Self::Balanced => "balanced",
            Self::Quality => "quality",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateControl {
    /// Constant quantizer / CRF, no bitrate flags
    #[default]
    #[serde(alias = "cq", alias = "cqp", alias = "crf")]
    ConstantQuality,
    Vbr,
    Cbr,
}

impl RateControl {
    pub fn uses_bitrate(&self) -> bool {
        matches!(self, Self::Vbr | Self::Cbr)
    }
}

/// Named preset profile for the advanced tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetProfile {
    Fast,
    Balanced,
    Quality,
    Archive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioMode {
    #[default]
    All,
    First,
    Language,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleMode {
    #[default]
    Copy,
    Drop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSettings {
    pub tier: ConfigTier,
    pub encoding_mode: EncodingMode,
    #[serde(alias = "prefer_amf_over_vaapi")]
    pub prefer_class_a: bool,
    pub target_codec: TargetCodec,
    #[serde(alias = "video_quality")]
    pub quality_level: QualityLevel,
    /// Only read by the advanced tier
    pub preset_profile: Option<PresetProfile>,
    pub rate_control: RateControl,
    /// QP / CRF value; encoder default when unset
    pub quality: Option<u8>,
    /// x264/x265 preset name, or an SVT-AV1 preset number
    pub software_preset: Option<String>,
    pub bitrate: String,
    pub max_bitrate: String,
    pub audio_mode: AudioMode,
    pub audio_languages: Vec<String>,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub subtitles: SubtitleMode,
    pub preserve_hdr: bool,
    pub hardware_decode: bool,
    /// Software encoder threads; cores - 1 when unset
    pub threads: Option<usize>,
    pub skip_optimal: bool,
    pub skip_if_target_codec: bool,
    pub container: Option<String>,
    pub expert_template: String,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            tier: ConfigTier::Advanced,
            encoding_mode: EncodingMode::Auto,
            prefer_class_a: true,
            target_codec: TargetCodec::H264,
            quality_level: QualityLevel::Balanced,
            preset_profile: None,
            rate_control: RateControl::ConstantQuality,
            quality: None,
            software_preset: None,
            bitrate: "2M".to_string(),
            max_bitrate: "4M".to_string(),
            audio_mode: AudioMode::All,
            audio_languages: Vec::new(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
            subtitles: SubtitleMode::Copy,
            preserve_hdr: true,
            hardware_decode: true,
            threads: None,
            skip_optimal: true,
            skip_if_target_codec: false,
            container: None,
            expert_template: String::new(),
        }
    }
}

const BOOL_KEYS: &[&str] = &[
    "prefer_class_a",
    "prefer_amf_over_vaapi",
    "preserve_hdr",
    "hardware_decode",
    "skip_optimal",
    "skip_if_target_codec",
];
const NUMBER_KEYS: &[&str] = &["quality", "threads"];
const LIST_KEYS: &[&str] = &["audio_languages"];

impl RawSettings {
    /// Build settings from a flat string map, the shape hosts usually store.
    ///
    /// Empty values are treated as unset. Unknown keys are rejected.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, EngineError> {
        let mut obj = serde_json::Map::new();
        for (key, raw) in map {
            let value = raw.trim();
            if value.is_empty() && key != "expert_template" {
                continue;
            }
            let json = if BOOL_KEYS.contains(&key.as_str()) {
                match value.to_ascii_lowercase().as_str() {
                    "true" | "1" | "yes" | "on" => serde_json::Value::Bool(true),
                    "false" | "0" | "no" | "off" => serde_json::Value::Bool(false),
                    _ => {
                        return Err(EngineError::ConfigurationError(format!(
                            "{} must be a boolean, got '{}'",
                            key, raw
                        )));
                    }
                }
            } else if NUMBER_KEYS.contains(&key.as_str()) {
                let n: u64 = value.parse().map_err(|_| {
                    EngineError::ConfigurationError(format!(
                        "{} must be a number, got '{}'",
                        key, raw
                    ))
                })?;
                serde_json::Value::from(n)
            } else if LIST_KEYS.contains(&key.as_str()) {
                serde_json::Value::Array(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(|s| serde_json::Value::String(s.to_string()))
                        .collect(),
                )
            } else {
                serde_json::Value::String(raw.to_string())
            };
            obj.insert(key.clone(), json);
        }

        Self::from_json(serde_json::Value::Object(obj))
    }

    fn from_json(value: serde_json::Value) -> Result<Self, EngineError> {
        if let serde_json::Value::Object(map) = &value {
            let known = known_keys();
            if let Some(bad) = map.keys().find(|k| !known.contains(&k.as_str())) {
                return Err(EngineError::ConfigurationError(format!(
                    "unknown setting '{}'",
                    bad
                )));
            }
        }
        serde_json::from_value(value)
            .map_err(|e| EngineError::ConfigurationError(format!("invalid settings: {}", e)))
    }
}

fn known_keys() -> &'static [&'static str] {
    &[
        "tier",
        "encoding_mode",
        "prefer_class_a",
        "prefer_amf_over_vaapi",
        "target_codec",
        "quality_level",
        "video_quality",
        "preset_profile",
        "rate_control",
        "quality",
        "software_preset",
        "bitrate",
        "max_bitrate",
        "audio_mode",
        "audio_languages",
        "audio_codec",
        "audio_bitrate",
        "subtitles",
        "preserve_hdr",
        "hardware_decode",
        "threads",
        "skip_optimal",
        "skip_if_target_codec",
        "container",
        "expert_template",
    ]
}
