mod ffmpeg_cmd;
mod profile;
mod progress;
mod scan;
mod select;
mod settings;
mod template;
mod types;

pub use ffmpeg_cmd::{DEFAULT_HW_QP, build_command, build_job_command, container_for, template_vars};
pub use profile::{
    AudioPolicy, EncodingPolicy, MAX_QUALITY_VALUE, PresetOverrides, easy_tier_row, parse_bitrate,
    resolve_policy,
};
pub use progress::{
    MAX_RUNNING_PERCENT, ProcessInfo, ProgressPhase, ProgressReport, ProgressSink, ProgressState,
    ProgressTracker, percent_for,
};
pub use scan::{derive_output_path, is_video_file, scan, scan_streaming};
pub use select::{Resolution, Selection, resolve, select_encoder};
pub use settings::{
    AudioMode, ConfigTier, EncodingMode, PresetProfile, QualityLevel, RateControl, RawSettings,
    SubtitleMode,
};
pub use template::{PLACEHOLDERS, TemplateVars, build_from_template, parse_template};
pub use types::{
    Backend, CommandBuilder, CommandVector, EncoderChoice, EncoderClass, HdrKind, JobRequest,
    SourceCodec, TargetCodec, VideoCodec,
};
