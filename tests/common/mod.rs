#![allow(dead_code)] // each test binary uses a different subset

pub mod fake_tools;

use ffplan::engine::device_table::GpuGeneration;
use ffplan::engine::hardware::{EncoderSets, GraphicsInfo, ProcessorInfo};
use ffplan::engine::{
    CapabilitySnapshot, EncodingPolicy, HdrKind, RawSettings, SourceCodec, SourceProfile,
    resolve_policy,
};

pub const RENDER_NODE: &str = "/dev/dri/renderD128";

/// Every encoder name an AMD host with a full ffmpeg build reports
pub const ALL_AMF: &[&str] = &["h264_amf", "hevc_amf", "av1_amf"];
pub const ALL_VAAPI: &[&str] = &["h264_vaapi", "hevc_vaapi", "av1_vaapi"];
pub const ALL_SOFTWARE: &[&str] = &["libx264", "libx265", "libsvtav1"];

fn names(list: &[&str]) -> std::collections::BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// AMD host of the given generation with the given encoder lists.
pub fn amd_host(
    generation: GpuGeneration,
    amf: &[&str],
    vaapi: &[&str],
    cores: usize,
) -> CapabilitySnapshot {
    let mut graphics = GraphicsInfo::detected("AMD Radeon", "73bf", generation);
    graphics.render_device_path = RENDER_NODE.to_string();
    CapabilitySnapshot::new(
        ProcessorInfo {
            vendor_detected: true,
            model: "AMD Ryzen 9 7950X".to_string(),
            core_count: cores,
        },
        graphics,
        EncoderSets {
            hardware_class_a: names(amf),
            hardware_class_b: names(vaapi),
            software: names(ALL_SOFTWARE),
        },
    )
}

/// Host with no graphics device and only software encoders.
pub fn cpu_only_host(cores: usize) -> CapabilitySnapshot {
    CapabilitySnapshot::new(
        ProcessorInfo {
            vendor_detected: false,
            model: "Generic CPU".to_string(),
            core_count: cores,
        },
        GraphicsInfo::default(),
        EncoderSets {
            software: names(ALL_SOFTWARE),
            ..EncoderSets::default()
        },
    )
}

pub fn source_1080p(codec: SourceCodec, bitrate_bps: u64) -> SourceProfile {
    SourceProfile {
        codec,
        bit_depth: 8,
        width: 1920,
        height: 1080,
        duration_seconds: 120.0,
        video_bitrate_bps: bitrate_bps,
        is_hdr: false,
        hdr_kind: HdrKind::Sdr,
    }
}

pub fn hdr10_2160p() -> SourceProfile {
    SourceProfile {
        codec: SourceCodec::Hevc,
        bit_depth: 10,
        width: 3840,
        height: 2160,
        duration_seconds: 3600.0,
        video_bitrate_bps: 40_000_000,
        is_hdr: true,
        hdr_kind: HdrKind::Hdr10,
    }
}

pub fn policy(raw: RawSettings) -> EncodingPolicy {
    resolve_policy(&raw).expect("test settings must resolve")
}

/// ffprobe JSON for a single video stream
pub fn ffprobe_json(codec: &str, width: u32, height: u32, duration: &str, bit_rate: Option<u64>) -> String {
    let bit_rate = bit_rate
        .map(|b| format!(r#", "bit_rate": "{}""#, b))
        .unwrap_or_default();
    format!(
        r#"{{"streams": [{{"codec_type": "video", "codec_name": "{}", "width": {}, "height": {}, "pix_fmt": "yuv420p"{}}}], "format": {{"duration": "{}", "size": "20000"}}}}"#,
        codec, width, height, bit_rate, duration
    )
}
