// Pre-flight checks against generated ffprobe stand-ins

use crate::common::fake_tools::media_file;
use crate::common::{ffprobe_json, policy};
use ffplan::engine::validate::{
    MIN_PLAUSIBLE_SIZE_BYTES, get_optimal_bitrate_for_resolution, should_skip_as_optimal,
};
use ffplan::engine::{
    EngineError, ErrorCategory, ProbeSettings, RawSettings, SourceCodec, SourceInspector,
    SourceProfile, TargetCodec, Validator, VideoCodec,
};
use tempfile::TempDir;

const MEDIA_SIZE: usize = 16 * 1024;

#[cfg(unix)]
fn validator_with(ffprobe: std::path::PathBuf) -> Validator {
    Validator::new(SourceInspector::new(ProbeSettings {
        ffprobe_bin: ffprobe.to_string_lossy().to_string(),
        ffprobe_timeout_secs: 2,
        ..ProbeSettings::default()
    }))
}

#[test]
fn test_hevc_1080p_at_3_5_mbps_is_skipped() {
    let source = SourceProfile {
        codec: SourceCodec::Hevc,
        video_bitrate_bps: 3_500_000,
        duration_seconds: 60.0,
        ..SourceProfile::default()
    };
    let decision = should_skip_as_optimal(
        &source,
        &policy(RawSettings {
            target_codec: TargetCodec::Hevc,
            ..Default::default()
        }),
    );
    assert!(decision.skip);
    assert!(decision.reason.contains("already well compressed"));
}

#[test]
fn test_every_bucket_boundary_returns_its_own_value() {
    let buckets = [(854, 480), (1280, 720), (1920, 1080), (2560, 1440), (3840, 2160)];
    for codec in [VideoCodec::H264, VideoCodec::Hevc, VideoCodec::Av1] {
        let values: Vec<u64> = buckets
            .iter()
            .map(|(w, h)| get_optimal_bitrate_for_resolution(codec, *w, *h))
            .collect();
        // Strictly increasing means no boundary borrowed a neighbour's value
        assert!(values.windows(2).all(|w| w[0] < w[1]), "{:?}: {:?}", codec, values);
    }
    assert_eq!(get_optimal_bitrate_for_resolution(VideoCodec::Hevc, 1920, 1080), 4_000_000);
}

#[test]
fn test_missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let v = Validator::new(SourceInspector::new(ProbeSettings::default()));
    let err = v.validate(&dir.path().join("nope.mkv")).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::FileNotFound);
}

#[test]
fn test_size_threshold_is_inclusive() {
    let dir = TempDir::new().unwrap();
    let v = Validator::new(SourceInspector::new(ProbeSettings {
        ffprobe_bin: "ffplan-missing-ffprobe".to_string(),
        ..ProbeSettings::default()
    }));

    let under = media_file(dir.path(), "under.mkv", MIN_PLAUSIBLE_SIZE_BYTES as usize - 1);
    assert!(matches!(v.validate(&under), Err(EngineError::FileCorrupted(_))));

    // At the threshold the size check passes and the probe runs next
    let exact = media_file(dir.path(), "exact.mkv", MIN_PLAUSIBLE_SIZE_BYTES as usize);
    assert!(matches!(v.validate(&exact), Err(EngineError::ProbeError(_))));
}

#[cfg(unix)]
mod with_fake_ffprobe {
    use super::*;
    use crate::common::fake_tools::{failing_tool, hanging_tool, printing_tool};
    use serial_test::serial;
    use std::time::Instant;

    #[test]
    #[serial]
    fn test_valid_file_passes() {
        let dir = TempDir::new().unwrap();
        let ffprobe = printing_tool(
            dir.path(),
            "ffprobe",
            &ffprobe_json("hevc", 1920, 1080, "42.5", Some(3_000_000)),
        );
        let input = media_file(dir.path(), "ok.mkv", MEDIA_SIZE);

        let profile = validator_with(ffprobe).validate(&input).unwrap();
        assert_eq!(profile.codec, SourceCodec::Hevc);
        assert_eq!(profile.duration_seconds, 42.5);
        assert_eq!(profile.video_bitrate_bps, 3_000_000);
    }

    #[test]
    #[serial]
    fn test_short_and_zero_duration_are_corrupted() {
        let dir = TempDir::new().unwrap();
        let input = media_file(dir.path(), "clip.mkv", MEDIA_SIZE);

        let short = printing_tool(dir.path(), "ffprobe-short", &ffprobe_json("h264", 640, 360, "0.4", None));
        let err = validator_with(short).validate(&input).unwrap_err();
        assert!(matches!(&err, EngineError::FileCorrupted(m) if m.contains("below")), "{}", err);

        let zero = printing_tool(dir.path(), "ffprobe-zero", &ffprobe_json("h264", 640, 360, "0", None));
        let err = validator_with(zero).validate(&input).unwrap_err();
        assert!(matches!(&err, EngineError::FileCorrupted(m) if m.contains("no duration")), "{}", err);
    }

    #[test]
    #[serial]
    fn test_probe_failure_is_corrupted() {
        let dir = TempDir::new().unwrap();
        let ffprobe = failing_tool(dir.path(), "ffprobe", "Invalid data found when processing input", 1);
        let input = media_file(dir.path(), "broken.mkv", MEDIA_SIZE);

        let err = validator_with(ffprobe).validate(&input).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::FileCorrupted);
        assert!(err.to_string().contains("Invalid data"));
    }

    #[test]
    #[serial]
    fn test_garbage_output_is_corrupted() {
        let dir = TempDir::new().unwrap();
        let ffprobe = printing_tool(dir.path(), "ffprobe", "this is not json");
        let input = media_file(dir.path(), "odd.mkv", MEDIA_SIZE);
        let err = validator_with(ffprobe).validate(&input).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::FileCorrupted);
    }

    #[test]
    #[serial]
    fn test_no_video_stream_is_corrupted() {
        let dir = TempDir::new().unwrap();
        let input = media_file(dir.path(), "audio.mka", MEDIA_SIZE);

        let empty = printing_tool(
            dir.path(),
            "ffprobe-empty",
            r#"{"streams": [], "format": {"duration": "120.0", "size": "16384"}}"#,
        );
        let err = validator_with(empty).validate(&input).unwrap_err();
        assert!(matches!(&err, EngineError::FileCorrupted(m) if m.contains("no video stream")), "{}", err);

        let audio = printing_tool(
            dir.path(),
            "ffprobe-audio",
            r#"{"streams": [{"codec_type": "audio", "codec_name": "aac"}], "format": {"duration": "120.0"}}"#,
        );
        let err = validator_with(audio).validate(&input).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::FileCorrupted);
    }

    #[test]
    #[serial]
    fn test_hanging_probe_times_out() {
        let dir = TempDir::new().unwrap();
        let ffprobe = hanging_tool(dir.path(), "ffprobe");
        let input = media_file(dir.path(), "slow.mkv", MEDIA_SIZE);

        let started = Instant::now();
        let err = validator_with(ffprobe).validate(&input).unwrap_err();
        assert!(matches!(err, EngineError::FileTimeout { secs: 2, .. }), "{}", err);
        assert!(started.elapsed().as_secs() < 10);
    }

    #[test]
    #[serial]
    fn test_skip_path_uses_probe() {
        let dir = TempDir::new().unwrap();
        let ffprobe = printing_tool(dir.path(), "ffprobe", &ffprobe_json("av1", 1920, 1080, "60", Some(2_000_000)));
        let input = media_file(dir.path(), "av1.mkv", MEDIA_SIZE);
        let p = policy(RawSettings {
            target_codec: TargetCodec::Hevc,
            ..Default::default()
        });

        let decision = validator_with(ffprobe).should_skip_path(&input, &p);
        assert!(decision.skip);
        assert!(decision.reason.contains("source already better"));
    }
}
