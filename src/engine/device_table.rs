//! Versioned lookup tables for graphics hardware.
//!
//! Hardware support updates only touch the rows below (or an override file),
//! never the selection logic.

use serde::{Deserialize, Serialize};

/// Version of the built-in generation table
pub const BUILTIN_TABLE_VERSION: &str = "2025.1";

/// GPU architecture generation, ordered oldest to newest
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum GpuGeneration {
    #[default]
    Unknown,
    /// RDNA1 (Navi 1x)
    GenV1,
    /// RDNA2 (Navi 2x, Rembrandt/Van Gogh APUs)
    GenV2,
    /// RDNA3 (Navi 3x, Phoenix APUs)
    GenV3,
    /// RDNA3.5 (Strix APUs)
    #[serde(rename = "gen_v3_5")]
    GenV3_5,
}

impl GpuGeneration {
    pub fn supports_10bit_encode(&self) -> bool {
        matches!(self, Self::GenV2 | Self::GenV3 | Self::GenV3_5)
    }

    pub fn supports_av1_decode(&self) -> bool {
        matches!(self, Self::GenV2 | Self::GenV3 | Self::GenV3_5)
    }

    pub fn supports_av1_encode(&self) -> bool {
        matches!(self, Self::GenV3 | Self::GenV3_5)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::GenV1 => "RDNA1",
            Self::GenV2 => "RDNA2",
            Self::GenV3 => "RDNA3",
            Self::GenV3_5 => "RDNA3.5",
        }
    }
}

use GpuGeneration::{GenV1, GenV2, GenV3, GenV3_5};

const BUILTIN_DEVICES: &[(&str, GpuGeneration)] = &[
    // Navi 10/12/14
    ("7310", GenV1),
    ("7312", GenV1),
    ("7318", GenV1),
    ("7319", GenV1),
    ("731a", GenV1),
    ("731b", GenV1),
    ("731e", GenV1),
    ("731f", GenV1),
    ("7340", GenV1),
    ("7341", GenV1),
    ("7347", GenV1),
    ("734f", GenV1),
    ("7360", GenV1),
    ("7362", GenV1),
    // Navi 21/22/23/24, Van Gogh, Rembrandt
    ("73a1", GenV2),
    ("73a2", GenV2),
    ("73a3", GenV2),
    ("73a5", GenV2),
    ("73ab", GenV2),
    ("73af", GenV2),
    ("73bf", GenV2),
    ("73c3", GenV2),
    ("73df", GenV2),
    ("73e1", GenV2),
    ("73e3", GenV2),
    ("73ef", GenV2),
    ("73ff", GenV2),
    ("7422", GenV2),
    ("7423", GenV2),
    ("743f", GenV2),
    ("163f", GenV2),
    ("1681", GenV2),
    // Navi 31/32/33, Phoenix
    ("744c", GenV3),
    ("7448", GenV3),
    ("745e", GenV3),
    ("7470", GenV3),
    ("747e", GenV3),
    ("7480", GenV3),
    ("7483", GenV3),
    ("7489", GenV3),
    ("15bf", GenV3),
    ("15c8", GenV3),
    // Strix Point / Strix Halo
    ("150e", GenV3_5),
    ("1586", GenV3_5),
];

/// PCI vendor id -> vendor name
pub const VENDOR_NAMES: &[(&str, &str)] = &[
    ("1002", "AMD"),
    ("1022", "AMD"),
    ("8086", "Intel"),
    ("10de", "NVIDIA"),
];

/// Kernel driver name -> display name
pub const DRIVER_NAMES: &[(&str, &str)] = &[
    ("amdgpu", "AMD GPU Driver"),
    ("radeon", "Legacy Radeon Driver"),
    ("i915", "Intel Graphics Driver"),
    ("xe", "Intel Xe Driver"),
    ("nouveau", "Nouveau (NVIDIA)"),
    ("nvidia", "NVIDIA Proprietary Driver"),
];

/// PCI vendor id of the devices this engine targets
pub const TARGET_VENDOR_ID: &str = "1002";

/// Normalize a PCI id: trim, drop `0x`, lowercase. `None` unless exactly 4 hex digits.
pub fn normalize_pci_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if hex.len() == 4 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(hex.to_ascii_lowercase())
    } else {
        None
    }
}

pub fn vendor_name(vendor_id: &str) -> Option<&'static str> {
    let id = normalize_pci_id(vendor_id)?;
    VENDOR_NAMES
        .iter()
        .find(|(v, _)| *v == id)
        .map(|(_, name)| *name)
}

pub fn driver_display_name(driver: &str) -> String {
    DRIVER_NAMES
        .iter()
        .find(|(d, _)| *d == driver)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| driver.to_string())
}

#[derive(Debug, Clone, Deserialize)]
struct TableFile {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    device: Vec<TableRow>,
}

#[derive(Debug, Clone, Deserialize)]
struct TableRow {
    id: String,
    generation: GpuGeneration,
}

/// Device id -> generation table
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceTable {
    version: String,
    rows: Vec<(String, GpuGeneration)>,
}

impl Default for DeviceTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl DeviceTable {
    pub fn builtin() -> Self {
        Self {
            version: BUILTIN_TABLE_VERSION.to_string(),
            rows: BUILTIN_DEVICES
                .iter()
                .map(|(id, generation)| (id.to_string(), *generation))
                .collect(),
        }
    }

    /// Load a table from TOML:
    ///
    /// ```toml
    /// version = "local-1"
    /// [[device]]
    /// id = "73bf"
    /// generation = "gen_v2"
    /// ```
    ///
    /// Rows with malformed ids are rejected.
    pub fn from_toml_str(contents: &str) -> Result<Self, String> {
        let file: TableFile =
            toml::from_str(contents).map_err(|e| format!("invalid device table: {}", e))?;
        let mut rows = Vec::with_capacity(file.device.len());
        for row in file.device {
            let id = normalize_pci_id(&row.id)
                .ok_or_else(|| format!("invalid device id '{}' in device table", row.id))?;
            rows.push((id, row.generation));
        }
        Ok(Self {
            version: file.version.unwrap_or_else(|| "custom".to_string()),
            rows,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Unknown or malformed ids map to `GpuGeneration::Unknown`.
    pub fn lookup(&self, device_id: &str) -> GpuGeneration {
        let Some(id) = normalize_pci_id(device_id) else {
            return GpuGeneration::Unknown;
        };
        self.rows
            .iter()
            .find(|(row_id, _)| *row_id == id)
            .map(|(_, generation)| *generation)
            .unwrap_or(GpuGeneration::Unknown)
    }
}
