//! Memory cell parameter sets, one per cell technology under evaluation.
//! Loaded from TOML files; every electrical field is optional with a
//! type-appropriate default so that a cell file only states what its
//! technology actually defines.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemCellType {
    Sram,
    Dram,
    Edram,
    Mram,
    Pcram,
    Memristor,
    Fbram,
    SlcNand,
    MlcNand,
}

impl MemCellType {
    /// Resistive cell technologies read through a resistance divider or a
    /// current path rather than a charge-sharing bitline.
    pub fn is_nvm(&self) -> bool {
        matches!(
            self,
            MemCellType::Mram | MemCellType::Pcram | MemCellType::Memristor | MemCellType::Fbram
        )
    }

    pub fn needs_refresh(&self) -> bool {
        matches!(self, MemCellType::Dram | MemCellType::Edram)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellAccessType {
    CmosAccess,
    BjtAccess,
    DiodeAccess,
    NoneAccess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    Voltage,
    Current,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    Voltage,
    Current,
}

fn default_one() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemCell {
    pub mem_cell_type: MemCellType,
    /// Process node the cell parameters were characterized at. Unit: nm.
    #[serde(default)]
    pub process_node: u32,
    /// Cell footprint. Unit: F^2.
    pub area: f64,
    /// Height / width ratio of the cell.
    #[serde(default = "default_one")]
    pub aspect_ratio: f64,

    /// Low / high resistance states. Unit: ohm.
    #[serde(default)]
    pub resistance_on: f64,
    #[serde(default)]
    pub resistance_off: f64,
    #[serde(default)]
    pub resistance_on_at_read_voltage: Option<f64>,
    #[serde(default)]
    pub resistance_off_at_read_voltage: Option<f64>,
    #[serde(default)]
    pub resistance_on_at_half_read_voltage: Option<f64>,
    #[serde(default)]
    pub resistance_off_at_half_read_voltage: Option<f64>,
    #[serde(default)]
    pub resistance_on_at_set_voltage: Option<f64>,
    #[serde(default)]
    pub resistance_off_at_set_voltage: Option<f64>,
    #[serde(default)]
    pub resistance_on_at_reset_voltage: Option<f64>,
    #[serde(default)]
    pub resistance_off_at_reset_voltage: Option<f64>,
    #[serde(default)]
    pub capacitance_on: f64,
    #[serde(default)]
    pub capacitance_off: f64,

    #[serde(default)]
    pub read_mode: Option<ReadMode>,
    #[serde(default)]
    pub read_voltage: f64,
    #[serde(default)]
    pub read_current: f64,
    #[serde(default)]
    pub read_power: f64,
    #[serde(default = "default_one")]
    pub wordline_boost_ratio: f64,
    #[serde(default)]
    pub min_sense_voltage: f64,

    #[serde(default)]
    pub reset_mode: Option<WriteMode>,
    #[serde(default)]
    pub reset_voltage: f64,
    #[serde(default)]
    pub reset_current: f64,
    /// Unit: s.
    #[serde(default)]
    pub reset_pulse: f64,
    #[serde(default)]
    pub reset_energy: f64,
    #[serde(default)]
    pub set_mode: Option<WriteMode>,
    #[serde(default)]
    pub set_voltage: f64,
    #[serde(default)]
    pub set_current: f64,
    #[serde(default)]
    pub set_pulse: f64,
    #[serde(default)]
    pub set_energy: f64,

    #[serde(default)]
    pub access_type: Option<CellAccessType>,
    /// Gate oxide thickness multiplier of the access device (FBRAM).
    #[serde(default = "default_one")]
    pub gate_ox_thickness_factor: f64,
    /// Unit: F (feature sizes).
    #[serde(default)]
    pub width_soi_device: f64,
    /// Access transistor width. Unit: F.
    #[serde(default)]
    pub width_access_cmos: f64,
    #[serde(default)]
    pub voltage_drop_access_device: f64,
    /// Unit: A.
    #[serde(default)]
    pub leakage_current_access_device: f64,
    /// Storage capacitance of a DRAM/eDRAM cell. Unit: F.
    #[serde(default)]
    pub cap_dram_cell: f64,

    /// SRAM cell device widths. Unit: F.
    #[serde(default)]
    pub width_sram_cell_nmos: f64,
    #[serde(default)]
    pub width_sram_cell_pmos: f64,

    /// eDRAM retention at 300 K. Unit: s.
    #[serde(default)]
    pub retention_time: f64,
}

impl MemCell {
    pub fn height_in_feature_size(&self) -> f64 {
        (self.area * self.aspect_ratio).sqrt()
    }

    pub fn width_in_feature_size(&self) -> f64 {
        (self.area / self.aspect_ratio).sqrt()
    }

    pub fn read_mode(&self) -> ReadMode {
        self.read_mode.unwrap_or(ReadMode::Voltage)
    }

    pub fn access_type(&self) -> CellAccessType {
        self.access_type.unwrap_or(CellAccessType::NoneAccess)
    }

    pub fn resistance_on_at_read_voltage(&self) -> f64 {
        self.resistance_on_at_read_voltage.unwrap_or(self.resistance_on)
    }

    pub fn resistance_off_at_read_voltage(&self) -> f64 {
        self.resistance_off_at_read_voltage.unwrap_or(self.resistance_off)
    }

    /// Retention at the operating temperature: halves for every 10 K above
    /// the 300 K characterization point.
    pub fn retention_time_at(&self, temperature: u32) -> f64 {
        let delta = temperature.saturating_sub(300) as f64;
        self.retention_time * 2f64.powf(-delta / 10.0)
    }

    /// Sanity checks that do not depend on the organization being swept.
    pub fn validate(&self) -> Result<()> {
        if self.area <= 0.0 {
            bail!("cell area must be positive");
        }
        if self.aspect_ratio <= 0.0 {
            bail!("cell aspect ratio must be positive");
        }
        match self.mem_cell_type {
            MemCellType::Sram => {
                if self.width_access_cmos <= 0.0 {
                    bail!("SRAM cell requires width_access_cmos");
                }
                if self.width_sram_cell_nmos <= 0.0 || self.width_sram_cell_pmos <= 0.0 {
                    bail!("SRAM cell requires width_sram_cell_nmos and width_sram_cell_pmos");
                }
            }
            MemCellType::Edram => {
                if self.cap_dram_cell <= 0.0 {
                    bail!("eDRAM cell requires cap_dram_cell");
                }
                if self.retention_time <= 0.0 {
                    bail!("eDRAM cell requires retention_time");
                }
            }
            t if t.is_nvm() => {
                if self.resistance_on <= 0.0 || self.resistance_off <= 0.0 {
                    bail!("resistive cell requires resistance_on and resistance_off");
                }
                if self.resistance_off <= self.resistance_on {
                    bail!("resistance_off must exceed resistance_on");
                }
            }
            _ => {}
        }
        Ok(())
    }
}

pub fn parse_cell_config(path: impl AsRef<Path>) -> Result<MemCell> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read cell file {}", path.display()))?;
    let cell: MemCell = toml::from_str(&contents)
        .with_context(|| format!("failed to parse cell file {}", path.display()))?;
    cell.validate()?;
    Ok(cell)
}
