use super::ffmpeg_cmd::container_for;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Video codec of a probed source stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceCodec {
    #[default]
    H264,
    Hevc,
    Av1,
    Other,
}

impl SourceCodec {
    /// Map an ffprobe `codec_name` to a source codec
    pub fn from_ffprobe_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "h264" | "avc" | "avc1" => Self::H264,
            "hevc" | "h265" | "hvc1" => Self::Hevc,
            "av1" => Self::Av1,
            _ => Self::Other,
        }
    }

    /// Compression efficiency rank: av1 > hevc > h264 > other.
    /// Only used for skip decisions.
    pub fn efficiency(&self) -> u8 {
        match self {
            Self::Av1 => 3,
            Self::Hevc => 2,
            Self::H264 => 1,
            Self::Other => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::Hevc => "hevc",
            Self::Av1 => "av1",
            Self::Other => "other",
        }
    }
}

/// Codec requested by the user. `Copy` means "same as the source".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetCodec {
    #[default]
    H264,
    Hevc,
    Av1,
    Copy,
}

impl TargetCodec {
    /// Resolve the concrete output codec. `Copy` follows the source and falls
    /// back to h264 for sources we have no encoder family for.
    pub fn resolve(&self, source: SourceCodec) -> VideoCodec {
        match self {
            Self::H264 => VideoCodec::H264,
            Self::Hevc => VideoCodec::Hevc,
            Self::Av1 => VideoCodec::Av1,
            Self::Copy => match source {
                SourceCodec::Hevc => VideoCodec::Hevc,
                SourceCodec::Av1 => VideoCodec::Av1,
                SourceCodec::H264 | SourceCodec::Other => VideoCodec::H264,
            },
        }
    }
}

/// Concrete output codec after `copy` resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    Hevc,
    Av1,
}

impl VideoCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::Hevc => "hevc",
            Self::Av1 => "av1",
        }
    }

    pub fn amf_encoder(&self) -> &'static str {
        match self {
            Self::H264 => "h264_amf",
            Self::Hevc => "hevc_amf",
            Self::Av1 => "av1_amf",
        }
    }

    pub fn vaapi_encoder(&self) -> &'static str {
        match self {
            Self::H264 => "h264_vaapi",
            Self::Hevc => "hevc_vaapi",
            Self::Av1 => "av1_vaapi",
        }
    }

    pub fn software_encoder(&self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::Hevc => "libx265",
            Self::Av1 => "libsvtav1",
        }
    }

    /// Same ranking as [`SourceCodec::efficiency`]
    pub fn efficiency(&self) -> u8 {
        self.as_source().efficiency()
    }

    pub fn as_source(&self) -> SourceCodec {
        match self {
            Self::H264 => SourceCodec::H264,
            Self::Hevc => SourceCodec::Hevc,
            Self::Av1 => SourceCodec::Av1,
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HdrKind {
    #[default]
    Sdr,
    Hdr10,
    Hlg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderClass {
    Hardware,
    Software,
}

/// Encoder family; class A is AMF, class B is VA-API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Amf,
    Vaapi,
    Software,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncoderChoice {
    pub name: String,
    pub class: EncoderClass,
    pub backend: Backend,
}

impl EncoderChoice {
    pub fn software(codec: VideoCodec) -> Self {
        Self {
            name: codec.software_encoder().to_string(),
            class: EncoderClass::Software,
            backend: Backend::Software,
        }
    }

    pub fn amf(codec: VideoCodec) -> Self {
        Self {
            name: codec.amf_encoder().to_string(),
            class: EncoderClass::Hardware,
            backend: Backend::Amf,
        }
    }

    pub fn vaapi(codec: VideoCodec) -> Self {
        Self {
            name: codec.vaapi_encoder().to_string(),
            class: EncoderClass::Hardware,
            backend: Backend::Vaapi,
        }
    }

    pub fn is_hardware(&self) -> bool {
        self.class == EncoderClass::Hardware
    }
}

/// Ordered ffmpeg invocation, program first. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CommandVector(Vec<String>);

impl CommandVector {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    pub fn program(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn args(&self) -> &[String] {
        self.0.get(1..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index of the first token equal to `token`
    pub fn position(&self, token: &str) -> Option<usize> {
        self.0.iter().position(|t| t == token)
    }

    /// Build a `std::process::Command` for the host launcher
    pub fn to_command(&self) -> Option<std::process::Command> {
        let program = self.program()?;
        let mut cmd = std::process::Command::new(program);
        cmd.args(self.args());
        Some(cmd)
    }
}

impl fmt::Display for CommandVector {
    /// Shell-quoted rendering for logs and dry runs
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quoted = shlex::try_join(self.0.iter().map(String::as_str))
            .unwrap_or_else(|_| self.0.join(" "));
        f.write_str(&quoted)
    }
}

/// Append-only builder for [`CommandVector`].
#[derive(Debug, Default)]
pub struct CommandBuilder {
    tokens: Vec<String>,
}

impl CommandBuilder {
    pub fn new(program: &str) -> Self {
        Self {
            tokens: vec![program.to_string()],
        }
    }

    pub fn arg(&mut self, token: impl Into<String>) -> &mut Self {
        self.tokens.push(token.into());
        self
    }

    pub fn args<I, S>(&mut self, tokens: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens.extend(tokens.into_iter().map(Into::into));
        self
    }

    pub fn opt(&mut self, flag: &str, value: impl Into<String>) -> &mut Self {
        self.arg(flag).arg(value)
    }

    pub fn finish(self) -> CommandVector {
        CommandVector(self.tokens)
    }

    pub(crate) fn from_tokens(tokens: Vec<String>) -> CommandVector {
        CommandVector(tokens)
    }
}

/// One transcode job as handed over by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Container of a pre-existing output the host wants to keep (e.g. "mkv")
    #[serde(default)]
    pub container_override: Option<String>,
}

impl JobRequest {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            container_override: None,
        }
    }

    /// Container resolution: explicit override, then policy, then output extension, then mkv
    pub fn container(&self, policy_container: Option<&str>) -> String {
        container_for(
            &self.output,
            self.container_override.as_deref().or(policy_container),
        )
    }
}
