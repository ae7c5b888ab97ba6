// Capability probing with stand-in tools and a fake /dev/dri + sysfs tree

use ffplan::engine::device_table::{DeviceTable, GpuGeneration};
use ffplan::engine::hardware::{CapabilityCache, CapabilityProber, ProbeSettings};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn fake_dri(root: &Path) -> std::path::PathBuf {
    let dri = root.join("dri");
    fs::create_dir_all(&dri).unwrap();
    fs::write(dri.join("card0"), b"").unwrap();
    fs::write(dri.join("renderD129"), b"").unwrap();
    fs::write(dri.join("renderD128"), b"").unwrap();
    dri
}

#[test]
fn test_nothing_detectable_yields_empty_snapshot() {
    let dir = TempDir::new().unwrap();
    let prober = CapabilityProber::with_table(
        ProbeSettings {
            ffmpeg_bin: "ffplan-missing-ffmpeg".to_string(),
            lspci_bin: "ffplan-missing-lspci".to_string(),
            render_dir: dir.path().join("no-dri"),
            sysfs_drm_dir: dir.path().join("no-sysfs"),
            ..ProbeSettings::default()
        },
        DeviceTable::builtin(),
    );
    let snap = prober.probe();
    assert!(!snap.graphics.vendor_detected);
    assert_eq!(snap.graphics.generation, GpuGeneration::Unknown);
    assert_eq!(snap.graphics.render_device_path, "/dev/dri/renderD128");
    assert!(snap.encoders.hardware_class_a.is_empty());
    assert!(snap.encoders.software.is_empty());
}

#[test]
fn test_device_table_override_file() {
    let dir = TempDir::new().unwrap();
    let table = dir.path().join("devices.toml");
    fs::write(
        &table,
        "version = \"site-7\"\n[[device]]\nid = \"abcd\"\ngeneration = \"gen_v3\"\n",
    )
    .unwrap();

    let settings = ProbeSettings {
        device_table: Some(table),
        ..ProbeSettings::default()
    };
    let loaded = settings.load_device_table();
    assert_eq!(loaded.version(), "site-7");
    assert_eq!(loaded.lookup("abcd"), GpuGeneration::GenV3);

    // A broken override falls back to the built-in table
    let broken = dir.path().join("broken.toml");
    fs::write(&broken, "[[device]]\nid = 12\n").unwrap();
    let settings = ProbeSettings {
        device_table: Some(broken),
        ..ProbeSettings::default()
    };
    assert_eq!(settings.load_device_table(), DeviceTable::builtin());
}

#[test]
fn test_cache_reuses_snapshot_within_ttl() {
    let dir = TempDir::new().unwrap();
    let prober = CapabilityProber::with_table(
        ProbeSettings {
            ffmpeg_bin: "ffplan-missing-ffmpeg".to_string(),
            lspci_bin: "ffplan-missing-lspci".to_string(),
            render_dir: dir.path().join("no-dri"),
            sysfs_drm_dir: dir.path().join("no-sysfs"),
            ..ProbeSettings::default()
        },
        DeviceTable::builtin(),
    );
    let mut cache = CapabilityCache::new(Duration::from_secs(3600));
    let first = cache.get_or_probe(&prober);
    let second = cache.get_or_probe(&prober);
    assert_eq!(first.probed_at, second.probed_at);
}

#[cfg(unix)]
mod with_fake_tools {
    use super::*;
    use crate::common::fake_tools::{ENCODERS_AMD, LSPCI_RDNA3, hanging_tool, printing_tool};
    use serial_test::serial;
    use std::time::Instant;

    #[test]
    #[serial]
    fn test_rdna3_host() {
        let dir = TempDir::new().unwrap();
        let prober = CapabilityProber::with_table(
            ProbeSettings {
                ffmpeg_bin: printing_tool(dir.path(), "ffmpeg", ENCODERS_AMD)
                    .to_string_lossy()
                    .to_string(),
                lspci_bin: printing_tool(dir.path(), "lspci", LSPCI_RDNA3)
                    .to_string_lossy()
                    .to_string(),
                render_dir: fake_dri(dir.path()),
                sysfs_drm_dir: dir.path().join("no-sysfs"),
                ..ProbeSettings::default()
            },
            DeviceTable::builtin(),
        );

        let snap = prober.probe();
        let gpu = &snap.graphics;
        assert!(gpu.vendor_detected);
        assert_eq!(gpu.device_id, "744c");
        assert_eq!(gpu.generation, GpuGeneration::GenV3);
        assert!(gpu.supports_av1_encode);
        assert!(gpu.render_device_path.ends_with("renderD128"));
        assert!(gpu.model.contains("Navi 31"));

        assert!(snap.encoders.hardware_class_a.contains("av1_amf"));
        assert!(snap.encoders.hardware_class_b.contains("hevc_vaapi"));
        assert!(snap.encoders.software.contains("libsvtav1"));
        assert!(!snap.encoders.software.contains("aac"));
    }

    #[test]
    #[serial]
    fn test_hanging_lspci_is_bounded() {
        let dir = TempDir::new().unwrap();
        let prober = CapabilityProber::with_table(
            ProbeSettings {
                lspci_bin: hanging_tool(dir.path(), "lspci").to_string_lossy().to_string(),
                lspci_timeout_secs: 1,
                render_dir: dir.path().join("no-dri"),
                sysfs_drm_dir: dir.path().join("no-sysfs"),
                ..ProbeSettings::default()
            },
            DeviceTable::builtin(),
        );

        let started = Instant::now();
        let gpu = prober.probe_graphics();
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!gpu.vendor_detected);
    }
}
