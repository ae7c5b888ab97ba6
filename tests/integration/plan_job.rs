// End-to-end job planning through the Engine facade

use crate::common::{ALL_AMF, ALL_VAAPI, amd_host, cpu_only_host};
use ffplan::engine::device_table::GpuGeneration;
use ffplan::engine::{
    Decision, Engine, ErrorCategory, JobRequest, ProbeSettings, RawSettings, TargetCodec,
};
use tempfile::TempDir;

#[test]
fn test_missing_input_is_refused_without_command() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::new(RawSettings::default(), ProbeSettings::default());
    let job = JobRequest::new(dir.path().join("gone.mkv"), dir.path().join("out.mkv"));

    let outcome = engine.plan_with_snapshot(&job, &amd_host(GpuGeneration::GenV3, ALL_AMF, ALL_VAAPI, 8));
    match &outcome.decision {
        Decision::Refuse {
            category,
            remediation,
            ..
        } => {
            assert_eq!(*category, ErrorCategory::FileNotFound);
            assert!(remediation.is_some());
        }
        other => panic!("expected refusal, got {:?}", other),
    }
    assert!(outcome.decision.command().is_none());
    assert!(outcome.log.last().unwrap().starts_with("refused:"));

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["decision"]["decision"], "refuse");
    assert_eq!(json["decision"]["category"], "FILE_NOT_FOUND");
}

#[test]
fn test_bad_settings_refuse_before_touching_the_file() {
    let engine = Engine::new(
        RawSettings {
            tier: ffplan::engine::ConfigTier::Expert,
            expert_template: "-i {input} {nope} {output}".to_string(),
            ..Default::default()
        },
        ProbeSettings::default(),
    );
    // The input does not exist, yet the settings error wins
    let job = JobRequest::new("/nonexistent/in.mkv", "/nonexistent/out.mkv");
    let outcome = engine.plan_with_snapshot(&job, &cpu_only_host(4));
    assert!(matches!(
        outcome.decision,
        Decision::Refuse {
            category: ErrorCategory::ConfigurationError,
            ..
        }
    ));
}

#[cfg(unix)]
mod with_fake_ffprobe {
    use super::*;
    use crate::common::fake_tools::{media_file, printing_tool};
    use crate::common::ffprobe_json;
    use ffplan::engine::{Backend, RateControl};
    use serial_test::serial;

    struct Fixture {
        dir: TempDir,
        ffprobe: String,
    }

    impl Fixture {
        fn new(probe_output: &str) -> Self {
            let dir = TempDir::new().unwrap();
            let ffprobe = printing_tool(dir.path(), "ffprobe", probe_output)
                .to_string_lossy()
                .to_string();
            Self { dir, ffprobe }
        }

        fn engine(&self, settings: RawSettings) -> Engine {
            Engine::new(
                settings,
                ProbeSettings {
                    ffprobe_bin: self.ffprobe.clone(),
                    ffprobe_timeout_secs: 2,
                    ..ProbeSettings::default()
                },
            )
        }

        fn job(&self, output: &str) -> JobRequest {
            let input = media_file(self.dir.path(), "input.mkv", 16 * 1024);
            JobRequest::new(input, self.dir.path().join(output))
        }
    }

    fn hevc_settings() -> RawSettings {
        RawSettings {
            target_codec: TargetCodec::Hevc,
            ..Default::default()
        }
    }

    #[test]
    #[serial]
    fn test_heavy_h264_is_encoded_on_amf() {
        let fx = Fixture::new(&ffprobe_json("h264", 1920, 1080, "120", Some(8_000_000)));
        let engine = fx.engine(hevc_settings());
        let job = fx.job("out.mkv");

        let outcome = engine.plan_with_snapshot(&job, &amd_host(GpuGeneration::GenV3, ALL_AMF, ALL_VAAPI, 8));
        let Decision::Encode { command, encoder } = &outcome.decision else {
            panic!("expected encode, got {:?}", outcome.decision);
        };
        assert_eq!(encoder.name, "hevc_amf");
        assert_eq!(encoder.backend, Backend::Amf);
        assert_eq!(command.program(), Some("ffmpeg"));
        assert_eq!(command.as_slice().last().map(String::as_str), job.output.to_str());
        assert!(command.position("-i").unwrap() < command.position("-c:v").unwrap());
        assert!(outcome.log[0].starts_with("source: h264 8-bit 1920x1080"));
        assert!(outcome.log.iter().any(|l| l.contains("worthwhile")));
        assert!(outcome.warnings.is_empty());

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["decision"]["decision"], "encode");
        assert_eq!(json["decision"]["command"][0], "ffmpeg");
        assert_eq!(json["decision"]["encoder"]["backend"], "amf");
    }

    #[test]
    #[serial]
    fn test_well_compressed_hevc_is_skipped() {
        let fx = Fixture::new(&ffprobe_json("hevc", 1920, 1080, "120", Some(3_500_000)));
        let engine = fx.engine(hevc_settings());
        let outcome = engine.plan_with_snapshot(
            &fx.job("out.mkv"),
            &amd_host(GpuGeneration::GenV3, ALL_AMF, ALL_VAAPI, 8),
        );
        match &outcome.decision {
            Decision::Skip { reason } => assert!(reason.contains("already well compressed")),
            other => panic!("expected skip, got {:?}", other),
        }
        assert!(outcome.decision.command().is_none());
        assert!(outcome.log.last().unwrap().starts_with("skip:"));
    }

    #[test]
    #[serial]
    fn test_source_without_video_is_refused_not_skipped() {
        let fx = Fixture::new(r#"{"streams": [], "format": {"duration": "120.0", "size": "16384"}}"#);
        let engine = fx.engine(hevc_settings());
        let outcome = engine.plan_with_snapshot(&fx.job("out.mkv"), &cpu_only_host(8));
        match &outcome.decision {
            Decision::Refuse { category, message, .. } => {
                assert_eq!(*category, ErrorCategory::FileCorrupted);
                assert!(message.contains("no video stream"));
            }
            other => panic!("expected refusal, got {:?}", other),
        }
        assert!(outcome.decision.command().is_none());
    }

    #[test]
    #[serial]
    fn test_hardware_only_on_cpu_host_is_refused() {
        let fx = Fixture::new(&ffprobe_json("h264", 1920, 1080, "120", Some(8_000_000)));
        let engine = fx.engine(RawSettings {
            encoding_mode: ffplan::engine::EncodingMode::HardwareOnly,
            ..hevc_settings()
        });
        let outcome = engine.plan_with_snapshot(&fx.job("out.mkv"), &cpu_only_host(8));
        match &outcome.decision {
            Decision::Refuse {
                category,
                remediation,
                ..
            } => {
                assert_eq!(*category, ErrorCategory::HardwareUnavailable);
                assert!(remediation.as_deref().unwrap().contains("encoding_mode"));
            }
            other => panic!("expected refusal, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_container_override_drives_mp4_flags() {
        let fx = Fixture::new(&ffprobe_json("h264", 1920, 1080, "120", Some(8_000_000)));
        let engine = fx.engine(hevc_settings());

        let plain = engine.plan_with_snapshot(&fx.job("out.mkv"), &cpu_only_host(8));
        let plain = plain.decision.command().unwrap().clone();
        assert!(plain.position("-movflags").is_none());
        assert!(plain.as_slice().windows(2).any(|w| w == ["-c:s", "copy"]));

        let mut job = fx.job("out.mkv");
        job.container_override = Some("MP4".to_string());
        let outcome = engine.plan_with_snapshot(&job, &cpu_only_host(8));
        let cmd = outcome.decision.command().unwrap();
        // The .mkv path alone would select Matroska, so the muxer is forced
        assert!(cmd.as_slice().windows(2).any(|w| w == ["-f", "mp4"]));
        assert!(cmd.position("-f").unwrap() < cmd.position("-y").unwrap());
        assert!(cmd.as_slice().windows(2).any(|w| w == ["-movflags", "+faststart"]));
        assert!(cmd.as_slice().windows(2).any(|w| w == ["-c:s", "mov_text"]));
        assert!(plain.position("-f").is_none());
    }

    #[test]
    #[serial]
    fn test_low_bitrate_request_warns() {
        let fx = Fixture::new(&ffprobe_json("h264", 1920, 1080, "120", Some(8_000_000)));
        let engine = fx.engine(RawSettings {
            rate_control: RateControl::Vbr,
            bitrate: "1M".to_string(),
            max_bitrate: "2M".to_string(),
            ..hevc_settings()
        });
        let outcome = engine.plan_with_snapshot(
            &fx.job("out.mkv"),
            &amd_host(GpuGeneration::GenV3, ALL_AMF, ALL_VAAPI, 8),
        );
        assert!(outcome.decision.command().is_some());
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("under half the recommended"));
    }

    #[test]
    #[serial]
    fn test_tracker_seeded_from_source() {
        let fx = Fixture::new(&ffprobe_json("h264", 1280, 720, "80", Some(4_000_000)));
        let engine = fx.engine(hevc_settings());
        let job = fx.job("out.mkv");
        let source = engine.validator().validate(&job.input).unwrap();
        let tracker = engine.progress_tracker(&source);
        assert_eq!(tracker.state().total_duration_seconds, 80.0);
    }
}
