//! Stand-in shell scripts for ffprobe, ffmpeg and lspci.
//!
//! Tests that execute these must be `#[serial]`: spawning a script while
//! another thread still holds a write handle to it fails with ETXTBSY.

use std::fs;
use std::path::{Path, PathBuf};

#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write script");
    let mut perms = fs::metadata(&path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod script");
    path
}

/// Script printing `stdout` verbatim, whatever the arguments
#[cfg(unix)]
pub fn printing_tool(dir: &Path, name: &str, stdout: &str) -> PathBuf {
    write_script(dir, name, &format!("cat <<'FFPLAN_EOF'\n{}\nFFPLAN_EOF", stdout))
}

#[cfg(unix)]
pub fn failing_tool(dir: &Path, name: &str, stderr: &str, code: i32) -> PathBuf {
    write_script(dir, name, &format!("echo '{}' >&2\nexit {}", stderr, code))
}

#[cfg(unix)]
pub fn hanging_tool(dir: &Path, name: &str) -> PathBuf {
    write_script(dir, name, "exec sleep 30")
}

/// A file of `size` bytes standing in for a media file
pub fn media_file(dir: &Path, name: &str, size: usize) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, vec![0u8; size]).expect("write media file");
    path
}

pub const LSPCI_RDNA3: &str = "\
00:00.0 Host bridge [0600]: Advanced Micro Devices, Inc. [AMD] Raphael Root Complex [1022:14d8]
03:00.0 VGA compatible controller [0300]: Advanced Micro Devices, Inc. [AMD/ATI] Navi 31 [Radeon RX 7900 XT/7900 XTX] [1002:744c] (rev c8)
03:00.1 Audio device [0403]: Advanced Micro Devices, Inc. [AMD/ATI] Navi 31 HDMI/DP Audio [1002:ab30]";

pub const ENCODERS_AMD: &str = "\
Encoders:
 V..... = Video
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC (codec h264)
 V....D libx265              libx265 H.265 / HEVC (codec hevc)
 V....D libsvtav1            SVT-AV1 (codec av1)
 V....D h264_amf             AMD AMF H.264 Encoder (codec h264)
 V....D hevc_amf             AMD AMF HEVC encoder (codec hevc)
 V....D av1_amf              AMD AMF AV1 encoder (codec av1)
 V....D h264_vaapi           H.264/AVC (VAAPI) (codec h264)
 V....D hevc_vaapi           H.265/HEVC (VAAPI) (codec hevc)
 V....D av1_vaapi            AV1 (VAAPI) (codec av1)
 A....D aac                  AAC (Advanced Audio Coding)";
