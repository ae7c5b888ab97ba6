//! ffmpeg argument assembly.
//!
//! Token groups are appended in a fixed order; each group may be empty
//! without disturbing the others:
//! global, hardware init, input, maps, encoder, encoder flags, bitrate,
//! HDR, audio, subtitles, container, overwrite, output.

use super::profile::EncodingPolicy;
use super::settings::{AudioMode, RateControl, SubtitleMode};
use super::template::{TemplateVars, build_from_template};
use super::types::{Backend, CommandBuilder, CommandVector, EncoderChoice, HdrKind, VideoCodec};
use crate::engine::error::EngineError;
use crate::engine::hardware::{CapabilitySnapshot, DEFAULT_RENDER_DEVICE, GraphicsInfo};
use crate::engine::probe::SourceProfile;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

/// Name given to the VA-API device created with `-init_hw_device`
const VAAPI_DEVICE_NAME: &str = "va";

/// Default quantizer for hardware encoders in constant-quality mode
pub const DEFAULT_HW_QP: u8 = 23;

/// libsvtav1 preset: 0-13 (higher = faster). Maps x264-style preset names.
static SVTAV1_PRESET_MAP: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    [
        ("ultrafast", "12"),
        ("superfast", "11"),
        ("veryfast", "10"),
        ("faster", "9"),
        ("fast", "8"),
        ("medium", "6"),
        ("slow", "4"),
        ("slower", "3"),
        ("veryslow", "2"),
    ]
    .into_iter()
    .collect()
});

fn default_software_crf(codec: VideoCodec) -> u8 {
    match codec {
        VideoCodec::H264 => 23,
        VideoCodec::Hevc => 25,
        VideoCodec::Av1 => 30,
    }
}

fn path_str(p: &Path) -> String {
    p.to_string_lossy().to_string()
}

fn render_device(graphics: &GraphicsInfo) -> &str {
    if graphics.render_device_path.is_empty() {
        DEFAULT_RENDER_DEVICE
    } else {
        &graphics.render_device_path
    }
}

/// Container from the policy override, else the output extension, else mkv
pub fn container_for(output: &Path, policy_container: Option<&str>) -> String {
    policy_container
        .map(|c| c.trim_start_matches('.').to_ascii_lowercase())
        .or_else(|| {
            output
                .extension()
                .and_then(|s| s.to_str())
                .map(|s| s.to_ascii_lowercase())
        })
        .unwrap_or_else(|| "mkv".to_string())
}

fn is_mp4_family(container: &str) -> bool {
    matches!(container, "mp4" | "m4v" | "mov")
}

/// ffmpeg muxer name for a container
fn muxer_for(container: &str) -> &str {
    match container {
        "mp4" | "m4v" => "mp4",
        "mkv" => "matroska",
        other => other,
    }
}

/// `-f` is needed when the output extension does not already select the container.
fn needs_explicit_muxer(output: &Path, container: &str) -> bool {
    output
        .extension()
        .and_then(|s| s.to_str())
        .map(|ext| muxer_for(&ext.to_ascii_lowercase()) != muxer_for(container))
        .unwrap_or(true)
}

/// Whether the GPU can decode this source (AV1 needs explicit support).
fn hw_decodable(source: &SourceProfile, graphics: &GraphicsInfo) -> bool {
    use super::types::SourceCodec;
    match source.codec {
        SourceCodec::H264 | SourceCodec::Hevc => true,
        SourceCodec::Av1 => graphics.supports_av1_decode,
        SourceCodec::Other => false,
    }
}

/// 10-bit output for 10/12-bit sources, except H.264 which is always 8-bit.
fn ten_bit_output(source: &SourceProfile, codec: VideoCodec) -> bool {
    source.bit_depth >= 10 && codec != VideoCodec::H264
}

/// Build the ffmpeg invocation for one job. Pure and deterministic.
pub fn build_command(
    source: &SourceProfile,
    snapshot: &CapabilitySnapshot,
    policy: &EncodingPolicy,
    choice: &EncoderChoice,
    input: &Path,
    output: &Path,
) -> CommandVector {
    let codec = policy.target_codec.resolve(source.codec);
    let container = container_for(output, policy.container.as_deref());
    let gfx = &snapshot.graphics;
    let render = render_device(gfx);
    let hw_decode = policy.hardware_decode && hw_decodable(source, gfx);
    let ten_bit = ten_bit_output(source, codec);

    let mut cmd = CommandBuilder::new("ffmpeg");
    cmd.args(["-hide_banner", "-loglevel", "info"]);

    // Hardware init must precede -i
    match choice.backend {
        Backend::Vaapi if hw_decode => {
            cmd.opt(
                "-init_hw_device",
                format!("vaapi={}:{}", VAAPI_DEVICE_NAME, render),
            )
            .opt("-hwaccel", "vaapi")
            .opt("-hwaccel_output_format", "vaapi")
            .opt("-hwaccel_device", VAAPI_DEVICE_NAME);
        }
        Backend::Vaapi => {
            cmd.opt("-vaapi_device", render);
        }
        Backend::Amf if hw_decode => {
            // Decode on the GPU, frames come back to system memory for AMF
            cmd.opt("-hwaccel", "vaapi").opt("-hwaccel_device", render);
        }
        Backend::Amf | Backend::Software => {}
    }

    cmd.opt("-i", path_str(input));

    apply_stream_maps(&mut cmd, policy);

    cmd.opt("-c:v", choice.name.as_str());

    match choice.backend {
        Backend::Vaapi => apply_vaapi_flags(&mut cmd, policy, codec, hw_decode, ten_bit),
        Backend::Amf => apply_amf_flags(&mut cmd, policy, codec, ten_bit),
        Backend::Software => apply_software_flags(&mut cmd, policy, snapshot, source, codec, ten_bit),
    }

    apply_bitrate(&mut cmd, policy);

    if policy.preserve_hdr && source.is_hdr && ten_bit {
        apply_hdr_metadata(&mut cmd, source.hdr_kind);
    }

    if policy.audio.is_copy() {
        cmd.opt("-c:a", "copy");
    } else {
        cmd.opt("-c:a", policy.audio.codec.as_str())
            .opt("-b:a", policy.audio.bitrate.as_str());
    }

    match policy.subtitles {
        SubtitleMode::Copy if is_mp4_family(&container) => {
            cmd.opt("-c:s", "mov_text");
        }
        SubtitleMode::Copy => {
            cmd.opt("-c:s", "copy");
        }
        SubtitleMode::Drop => {
            cmd.arg("-sn");
        }
    }

    if needs_explicit_muxer(output, &container) {
        cmd.opt("-f", muxer_for(&container));
    }
    if is_mp4_family(&container) {
        cmd.opt("-movflags", "+faststart");
    }

    cmd.arg("-y");
    cmd.arg(path_str(output));
    cmd.finish()
}

fn apply_stream_maps(cmd: &mut CommandBuilder, policy: &EncodingPolicy) {
    cmd.opt("-map", "0:v:0");
    match policy.audio.mode {
        AudioMode::All => {
            cmd.opt("-map", "0:a?");
        }
        AudioMode::First => {
            cmd.opt("-map", "0:a:0?");
        }
        AudioMode::Language => {
            for lang in &policy.audio.languages {
                cmd.opt("-map", format!("0:a:m:language:{}?", lang));
            }
        }
    }
    if policy.subtitles == SubtitleMode::Copy {
        cmd.opt("-map", "0:s?");
    }
}

fn apply_vaapi_flags(
    cmd: &mut CommandBuilder,
    policy: &EncodingPolicy,
    codec: VideoCodec,
    hw_decode: bool,
    ten_bit: bool,
) {
    let surface = if ten_bit { "p010" } else { "nv12" };
    if hw_decode {
        // Decoded frames are already VA-API surfaces; hwupload passes them through
        cmd.opt("-filter_hw_device", VAAPI_DEVICE_NAME)
            .opt("-vf", format!("format={}|vaapi,hwupload", surface));
    } else {
        cmd.opt("-vf", format!("format={},hwupload", surface));
    }

    match policy.rate_control {
        RateControl::ConstantQuality => {
            let qp = policy.quality.unwrap_or(DEFAULT_HW_QP);
            cmd.opt("-rc_mode", "CQP").opt("-qp", qp.to_string());
        }
        RateControl::Vbr => {
            cmd.opt("-rc_mode", "VBR");
        }
        RateControl::Cbr => {
            cmd.opt("-rc_mode", "CBR");
        }
    }

    if ten_bit && codec == VideoCodec::Hevc {
        cmd.opt("-profile:v", "main10");
    }
}

fn apply_amf_flags(
    cmd: &mut CommandBuilder,
    policy: &EncodingPolicy,
    codec: VideoCodec,
    ten_bit: bool,
) {
    cmd.opt("-quality", policy.quality_level.as_str());

    match policy.rate_control {
        RateControl::ConstantQuality => {
            let qp = policy.quality.unwrap_or(DEFAULT_HW_QP).to_string();
            cmd.opt("-rc", "cqp")
                .opt("-qp_i", qp.as_str())
                .opt("-qp_p", qp.as_str());
        }
        RateControl::Vbr => {
            cmd.opt("-rc", "vbr_peak");
        }
        RateControl::Cbr => {
            cmd.opt("-rc", "cbr");
        }
    }

    if ten_bit && codec == VideoCodec::Hevc {
        cmd.opt("-profile:v", "main10");
    }
}

/// SVT-AV1 takes a number; x264-style names are mapped.
fn svtav1_preset(preset: &str) -> String {
    if preset.parse::<u8>().is_ok() {
        return preset.to_string();
    }
    SVTAV1_PRESET_MAP
        .get(preset)
        .copied()
        .unwrap_or("6")
        .to_string()
}

fn apply_software_flags(
    cmd: &mut CommandBuilder,
    policy: &EncodingPolicy,
    snapshot: &CapabilitySnapshot,
    source: &SourceProfile,
    codec: VideoCodec,
    ten_bit: bool,
) {
    let preset = policy.software_preset.as_deref().unwrap_or("medium");
    match codec {
        VideoCodec::Av1 => cmd.opt("-preset", svtav1_preset(preset)),
        VideoCodec::H264 | VideoCodec::Hevc => cmd.opt("-preset", preset),
    };

    if policy.rate_control == RateControl::ConstantQuality {
        let crf = policy.quality.unwrap_or_else(|| default_software_crf(codec));
        cmd.opt("-crf", crf.to_string());
    }

    if ten_bit {
        cmd.opt("-pix_fmt", "yuv420p10le");
    } else if source.bit_depth >= 10 {
        cmd.opt("-pix_fmt", "yuv420p");
    }

    let threads = policy
        .threads
        .unwrap_or_else(|| snapshot.processor.core_count.saturating_sub(1));
    if threads > 0 {
        cmd.opt("-threads", threads.to_string());
    }

    match codec {
        VideoCodec::Hevc => {
            cmd.opt("-x265-params", "log-level=error");
        }
        VideoCodec::Av1 => {
            cmd.opt("-svtav1-params", "tune=0");
        }
        VideoCodec::H264 => {}
    }
}

fn apply_bitrate(cmd: &mut CommandBuilder, policy: &EncodingPolicy) {
    match policy.rate_control {
        RateControl::ConstantQuality => {}
        RateControl::Vbr => {
            cmd.opt("-b:v", policy.bitrate.as_str())
                .opt("-maxrate", policy.max_bitrate.as_str())
                .opt("-bufsize", policy.max_bitrate.as_str());
        }
        RateControl::Cbr => {
            cmd.opt("-b:v", policy.bitrate.as_str())
                .opt("-minrate", policy.bitrate.as_str())
                .opt("-maxrate", policy.bitrate.as_str())
                .opt("-bufsize", policy.bitrate.as_str());
        }
    }
}

fn apply_hdr_metadata(cmd: &mut CommandBuilder, kind: HdrKind) {
    let trc = match kind {
        HdrKind::Hdr10 => "smpte2084",
        HdrKind::Hlg => "arib-std-b67",
        HdrKind::Sdr => return,
    };
    cmd.opt("-color_primaries", "bt2020")
        .opt("-color_trc", trc)
        .opt("-colorspace", "bt2020nc");
}

/// Template variables for an expert-tier job.
pub fn template_vars(
    source: &SourceProfile,
    snapshot: &CapabilitySnapshot,
    policy: &EncodingPolicy,
    choice: &EncoderChoice,
    input: &Path,
    output: &Path,
) -> TemplateVars {
    TemplateVars {
        input: path_str(input),
        output: path_str(output),
        render_device: render_device(&snapshot.graphics).to_string(),
        width: source.width,
        height: source.height,
        bitrate: policy.bitrate.clone(),
        duration: source.duration_seconds,
        codec: choice.name.clone(),
    }
}

/// Expert tier renders its template; other tiers use [`build_command`].
pub fn build_job_command(
    source: &SourceProfile,
    snapshot: &CapabilitySnapshot,
    policy: &EncodingPolicy,
    choice: &EncoderChoice,
    input: &Path,
    output: &Path,
) -> Result<CommandVector, EngineError> {
    match &policy.template {
        Some(template) => build_from_template(
            template,
            &template_vars(source, snapshot, policy, choice, input, output),
        ),
        None => Ok(build_command(source, snapshot, policy, choice, input, output)),
    }
}
