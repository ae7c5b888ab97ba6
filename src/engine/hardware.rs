//! AMD host capability detection
//!
//! Every step is best-effort: a failed or timed-out call leaves its part of
//! the snapshot at the zero value and the probe carries on.

use crate::engine::device_table::{self, DeviceTable, GpuGeneration};
use crate::engine::process::run_with_timeout;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use sysinfo::System;
use tracing::{debug, info, warn};

/// Render node used when none can be enumerated
pub const DEFAULT_RENDER_DEVICE: &str = "/dev/dri/renderD128";

/// Upper bound for any single media-probe call
pub const MAX_FFPROBE_TIMEOUT_SECS: u64 = 10;

/// Software encoders this engine knows how to drive
pub const KNOWN_SOFTWARE_ENCODERS: &[&str] =
    &["libx264", "libx265", "libsvtav1", "libaom-av1", "librav1e"];

static PCI_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([0-9a-fA-F]{4}):([0-9a-fA-F]{4})\]").expect("invalid pci id regex")
});

// ============================================================================
// Settings
// ============================================================================

/// Tool paths, probe locations and timeouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub lspci_bin: String,
    /// Directory holding `renderD*` nodes
    pub render_dir: PathBuf,
    pub sysfs_drm_dir: PathBuf,
    pub lspci_timeout_secs: u64,
    pub encoders_timeout_secs: u64,
    /// Clamped to 1..=10
    pub ffprobe_timeout_secs: u64,
    /// 0 disables caching: every job gets a fresh snapshot
    pub capability_cache_secs: u64,
    /// Optional TOML file replacing the built-in device table
    pub device_table: Option<PathBuf>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            lspci_bin: "lspci".to_string(),
            render_dir: PathBuf::from("/dev/dri"),
            sysfs_drm_dir: PathBuf::from("/sys/class/drm"),
            lspci_timeout_secs: 5,
            encoders_timeout_secs: 5,
            ffprobe_timeout_secs: MAX_FFPROBE_TIMEOUT_SECS,
            capability_cache_secs: 0,
            device_table: None,
        }
    }
}

impl ProbeSettings {
    pub fn ffprobe_timeout(&self) -> Duration {
        Duration::from_secs(self.ffprobe_timeout_secs.clamp(1, MAX_FFPROBE_TIMEOUT_SECS))
    }

    pub fn lspci_timeout(&self) -> Duration {
        Duration::from_secs(self.lspci_timeout_secs.max(1))
    }

    pub fn encoders_timeout(&self) -> Duration {
        Duration::from_secs(self.encoders_timeout_secs.max(1))
    }

    /// Device table from `device_table`, or the built-in one.
    pub fn load_device_table(&self) -> DeviceTable {
        let Some(path) = &self.device_table else {
            return DeviceTable::builtin();
        };
        match fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|s| DeviceTable::from_toml_str(&s))
        {
            Ok(table) => {
                info!(path = %path.display(), version = table.version(), "loaded device table override");
                table
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "device table override unusable, using built-in table");
                DeviceTable::builtin()
            }
        }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessorInfo {
    pub vendor_detected: bool,
    pub model: String,
    pub core_count: usize,
}

impl ProcessorInfo {
    /// Build from `(vendor_id, brand)` pairs, one per logical CPU.
    pub fn from_cpus<'a, I>(cpus: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut info = Self::default();
        for (vendor, brand) in cpus {
            info.core_count += 1;
            if vendor == "AuthenticAMD" || brand.contains("AMD") {
                info.vendor_detected = true;
            }
            if info.model.is_empty() && !brand.trim().is_empty() {
                info.model = brand.trim().to_string();
            }
        }
        info
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphicsInfo {
    pub vendor_detected: bool,
    pub model: String,
    pub device_id: String,
    pub generation: GpuGeneration,
    pub render_device_path: String,
    pub driver: String,
    pub supports_10bit_encode: bool,
    pub supports_av1_encode: bool,
    pub supports_av1_decode: bool,
}

impl Default for GraphicsInfo {
    fn default() -> Self {
        Self {
            vendor_detected: false,
            model: String::new(),
            device_id: String::new(),
            generation: GpuGeneration::Unknown,
            render_device_path: DEFAULT_RENDER_DEVICE.to_string(),
            driver: String::new(),
            supports_10bit_encode: false,
            supports_av1_encode: false,
            supports_av1_decode: false,
        }
    }
}

impl GraphicsInfo {
    /// A detected device of the given generation; capability flags follow the generation.
    pub fn detected(model: &str, device_id: &str, generation: GpuGeneration) -> Self {
        let mut info = Self {
            vendor_detected: true,
            model: model.to_string(),
            device_id: device_id.to_string(),
            ..Self::default()
        };
        info.set_generation(generation);
        info
    }

    pub fn set_generation(&mut self, generation: GpuGeneration) {
        self.generation = generation;
        self.supports_10bit_encode = generation.supports_10bit_encode();
        self.supports_av1_encode = generation.supports_av1_encode();
        self.supports_av1_decode = generation.supports_av1_decode();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EncoderSets {
    /// `*_amf` encoders
    pub hardware_class_a: BTreeSet<String>,
    /// `*_vaapi` encoders
    pub hardware_class_b: BTreeSet<String>,
    pub software: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilitySnapshot {
    pub processor: ProcessorInfo,
    pub graphics: GraphicsInfo,
    pub encoders: EncoderSets,
    pub probed_at: DateTime<Utc>,
}

impl CapabilitySnapshot {
    pub fn new(processor: ProcessorInfo, graphics: GraphicsInfo, encoders: EncoderSets) -> Self {
        Self {
            processor,
            graphics,
            encoders,
            probed_at: Utc::now(),
        }
    }

    /// Snapshot of a host where nothing could be detected
    pub fn empty() -> Self {
        Self::new(
            ProcessorInfo::default(),
            GraphicsInfo::default(),
            EncoderSets::default(),
        )
    }
}

// ============================================================================
// Text parsers
// ============================================================================

/// Qualifying graphics device from `lspci -nn`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LspciDevice {
    pub model: String,
    pub vendor_id: Option<String>,
    pub device_id: Option<String>,
}

fn words(line: &str) -> Vec<String> {
    line.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_ascii_lowercase())
        .collect()
}

fn is_video_class(words: &[String]) -> bool {
    words.iter().any(|w| matches!(w.as_str(), "vga" | "display" | "3d"))
}

fn mentions_target_vendor(line_lower: &str, words: &[String]) -> bool {
    // Whole words only, so "Corporation" never matches "ati"
    line_lower.contains("advanced micro devices")
        || words
            .iter()
            .any(|w| matches!(w.as_str(), "amd" | "ati" | "radeon"))
}

/// First line mentioning both a video-class device and the target vendor.
pub fn parse_lspci(output: &str) -> Option<LspciDevice> {
    for line in output.lines() {
        let lower = line.to_ascii_lowercase();
        let w = words(line);
        if !is_video_class(&w) || !mentions_target_vendor(&lower, &w) {
            continue;
        }

        // "03:00.0 VGA compatible controller [0300]: <model> [1002:73bf] (rev c1)"
        let after_class = line.split_once(": ").map(|(_, rest)| rest).unwrap_or(line);
        let (model, vendor_id, device_id) = match PCI_ID_RE.captures(after_class) {
            Some(cap) => {
                let start = cap.get(0).map(|m| m.start()).unwrap_or(after_class.len());
                (
                    after_class[..start].trim().to_string(),
                    Some(cap[1].to_ascii_lowercase()),
                    Some(cap[2].to_ascii_lowercase()),
                )
            }
            None => {
                let model = after_class
                    .split(" (rev")
                    .next()
                    .unwrap_or(after_class)
                    .trim()
                    .to_string();
                (model, None, None)
            }
        };

        return Some(LspciDevice {
            model,
            vendor_id,
            device_id,
        });
    }
    None
}

/// Sort encoder names from `ffmpeg -hide_banner -encoders` into backend sets.
pub fn parse_encoder_list(output: &str) -> EncoderSets {
    let mut sets = EncoderSets::default();
    for line in output.lines() {
        let mut parts = line.split_whitespace();
        let (Some(flags), Some(name)) = (parts.next(), parts.next()) else {
            continue;
        };
        // Flag column looks like "V....D"; skips the legend and separator rows
        let is_flag_col = flags.len() == 6
            && flags.starts_with('V')
            && flags.chars().all(|c| "VASFXBD.".contains(c));
        if !is_flag_col || name == "=" {
            continue;
        }

        if name.ends_with("_amf") {
            sets.hardware_class_a.insert(name.to_string());
        } else if name.ends_with("_vaapi") {
            sets.hardware_class_b.insert(name.to_string());
        } else if KNOWN_SOFTWARE_ENCODERS.contains(&name) {
            sets.software.insert(name.to_string());
        }
    }
    sets
}

/// `renderD*` nodes under `dir`, sorted.
pub fn find_render_nodes(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut nodes: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|n| n.starts_with("renderD"))
                .unwrap_or(false)
        })
        .map(|e| e.path())
        .collect();
    nodes.sort();
    nodes
}

/// Vendor/device/driver for a DRM node, from sysfs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SysfsDevice {
    pub vendor_id: Option<String>,
    pub device_id: Option<String>,
    pub driver: Option<String>,
}

fn read_id(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| device_table::normalize_pci_id(&s))
}

fn read_device_dir(device_dir: &Path) -> Option<SysfsDevice> {
    if !device_dir.is_dir() {
        return None;
    }
    let driver = fs::read_link(device_dir.join("driver"))
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()));
    Some(SysfsDevice {
        vendor_id: read_id(&device_dir.join("vendor")),
        device_id: read_id(&device_dir.join("device")),
        driver,
    })
}

/// Look up the PCI device behind a render node.
///
/// Tries `<sysfs>/<node>/device` first, then the `cardN` whose
/// `device/drm/<node>` exists.
pub fn read_sysfs_device(sysfs_drm_dir: &Path, node_name: &str) -> Option<SysfsDevice> {
    if let Some(dev) = read_device_dir(&sysfs_drm_dir.join(node_name).join("device")) {
        return Some(dev);
    }

    let mut cards: Vec<PathBuf> = fs::read_dir(sysfs_drm_dir)
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|n| n.starts_with("card") && !n.contains('-'))
                .unwrap_or(false)
        })
        .map(|e| e.path())
        .collect();
    cards.sort();

    cards
        .iter()
        .find(|card| card.join("device").join("drm").join(node_name).exists())
        .and_then(|card| read_device_dir(&card.join("device")))
}

/// Combine lspci and sysfs evidence into the graphics facet.
pub fn graphics_from_evidence(
    lspci: Option<&LspciDevice>,
    render_node: Option<&Path>,
    sysfs: Option<&SysfsDevice>,
    table: &DeviceTable,
) -> GraphicsInfo {
    let mut info = GraphicsInfo::default();

    if let Some(node) = render_node {
        info.render_device_path = node.to_string_lossy().to_string();
    }

    if let Some(dev) = lspci {
        info.vendor_detected = true;
        info.model = dev.model.clone();
        if let Some(id) = &dev.device_id {
            info.device_id = id.clone();
        }
    }

    if let Some(dev) = sysfs {
        let is_target = dev.vendor_id.as_deref() == Some(device_table::TARGET_VENDOR_ID);
        if is_target {
            info.vendor_detected = true;
            if info.device_id.is_empty() {
                if let Some(id) = &dev.device_id {
                    info.device_id = id.clone();
                }
            }
            if info.model.is_empty() {
                info.model = device_table::vendor_name(device_table::TARGET_VENDOR_ID)
                    .map(|v| format!("{} GPU", v))
                    .unwrap_or_default();
            }
        }
        if let Some(driver) = &dev.driver {
            info.driver = device_table::driver_display_name(driver);
        }
    }

    if info.vendor_detected {
        info.set_generation(table.lookup(&info.device_id));
    }
    info
}

// ============================================================================
// Prober
// ============================================================================

pub struct CapabilityProber {
    settings: ProbeSettings,
    table: DeviceTable,
}

impl CapabilityProber {
    pub fn new(settings: ProbeSettings) -> Self {
        let table = settings.load_device_table();
        Self { settings, table }
    }

    pub fn with_table(settings: ProbeSettings, table: DeviceTable) -> Self {
        Self { settings, table }
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    /// Never fails; undetectable facets come back as zero values.
    pub fn probe(&self) -> CapabilitySnapshot {
        let processor = self.probe_processor();
        let graphics = self.probe_graphics();
        let encoders = self.probe_encoders();

        info!(
            cpu = %processor.model,
            cores = processor.core_count,
            gpu_detected = graphics.vendor_detected,
            gpu = %graphics.model,
            generation = graphics.generation.display_name(),
            render = %graphics.render_device_path,
            amf = encoders.hardware_class_a.len(),
            vaapi = encoders.hardware_class_b.len(),
            software = encoders.software.len(),
            "capability probe finished"
        );

        CapabilitySnapshot::new(processor, graphics, encoders)
    }

    pub fn probe_processor(&self) -> ProcessorInfo {
        let mut sys = System::new();
        sys.refresh_cpu();
        let info = ProcessorInfo::from_cpus(sys.cpus().iter().map(|c| (c.vendor_id(), c.brand())));
        if info.core_count == 0 {
            debug!("processor information unavailable");
        }
        info
    }

    pub fn probe_graphics(&self) -> GraphicsInfo {
        let lspci = match run_with_timeout(
            &self.settings.lspci_bin,
            ["-nn"],
            self.settings.lspci_timeout(),
        ) {
            Ok(out) => parse_lspci(&out.stdout),
            Err(e) => {
                debug!(error = %e, "lspci unavailable");
                None
            }
        };

        let nodes = find_render_nodes(&self.settings.render_dir);
        let render = nodes.first();
        if render.is_none() {
            debug!(dir = %self.settings.render_dir.display(), "no render nodes found");
        }

        let sysfs = render
            .and_then(|node| node.file_name())
            .and_then(|name| read_sysfs_device(&self.settings.sysfs_drm_dir, &name.to_string_lossy()));

        graphics_from_evidence(
            lspci.as_ref(),
            render.map(PathBuf::as_path),
            sysfs.as_ref(),
            &self.table,
        )
    }

    pub fn probe_encoders(&self) -> EncoderSets {
        match run_with_timeout(
            &self.settings.ffmpeg_bin,
            ["-hide_banner", "-encoders"],
            self.settings.encoders_timeout(),
        ) {
            Ok(out) => parse_encoder_list(&out.stdout),
            Err(e) => {
                warn!(error = %e, "could not list ffmpeg encoders");
                EncoderSets::default()
            }
        }
    }
}

/// Time-bounded snapshot cache owned by one engine.
#[derive(Debug)]
pub struct CapabilityCache {
    ttl: Duration,
    entry: Option<(Instant, CapabilitySnapshot)>,
}

impl CapabilityCache {
    /// A zero TTL disables caching.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    pub fn get_or_probe(&mut self, prober: &CapabilityProber) -> CapabilitySnapshot {
        self.get_or_insert_with(|| prober.probe())
    }

    pub fn get_or_insert_with<F>(&mut self, probe: F) -> CapabilitySnapshot
    where
        F: FnOnce() -> CapabilitySnapshot,
    {
        if !self.ttl.is_zero() {
            if let Some((at, snapshot)) = &self.entry {
                if at.elapsed() < self.ttl {
                    return snapshot.clone();
                }
            }
        }
        let snapshot = probe();
        if !self.ttl.is_zero() {
            self.entry = Some((Instant::now(), snapshot.clone()));
        }
        snapshot
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}
