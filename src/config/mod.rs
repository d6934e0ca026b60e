//! Sweep configuration: everything the search driver needs to enumerate
//! candidate organizations. Loaded from a TOML file; every field has a
//! default so a config only states what it wants to constrain.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blocks::BufferDesignTarget;
use crate::formula::MAX_NMOS_SIZE;
use crate::tech::{DeviceRoadmap, TsvProjection};
use crate::wire::{WireRepeaterType, WireType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignTarget {
    Cache,
    RamChip,
    CamChip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationTarget {
    ReadLatency = 0,
    WriteLatency = 1,
    ReadEnergy = 2,
    WriteEnergy = 3,
    ReadEdp = 4,
    WriteEdp = 5,
    Leakage = 6,
    Area = 7,
    /// Keep the best candidate for every one of the eight metrics.
    FullExploration = 8,
}

impl OptimizationTarget {
    pub const METRIC_COUNT: usize = 8;

    /// The eight concrete metrics, in index order. `FullExploration` is a
    /// search mode, not a metric, so it is not listed here.
    pub const METRICS: [OptimizationTarget; Self::METRIC_COUNT] = [
        OptimizationTarget::ReadLatency,
        OptimizationTarget::WriteLatency,
        OptimizationTarget::ReadEnergy,
        OptimizationTarget::WriteEnergy,
        OptimizationTarget::ReadEdp,
        OptimizationTarget::WriteEdp,
        OptimizationTarget::Leakage,
        OptimizationTarget::Area,
    ];

    pub fn from_index(i: usize) -> Option<Self> {
        match i {
            0 => Some(OptimizationTarget::ReadLatency),
            1 => Some(OptimizationTarget::WriteLatency),
            2 => Some(OptimizationTarget::ReadEnergy),
            3 => Some(OptimizationTarget::WriteEnergy),
            4 => Some(OptimizationTarget::ReadEdp),
            5 => Some(OptimizationTarget::WriteEdp),
            6 => Some(OptimizationTarget::Leakage),
            7 => Some(OptimizationTarget::Area),
            8 => Some(OptimizationTarget::FullExploration),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OptimizationTarget::ReadLatency => "read latency",
            OptimizationTarget::WriteLatency => "write latency",
            OptimizationTarget::ReadEnergy => "read dynamic energy",
            OptimizationTarget::WriteEnergy => "write dynamic energy",
            OptimizationTarget::ReadEdp => "read energy-delay product",
            OptimizationTarget::WriteEdp => "write energy-delay product",
            OptimizationTarget::Leakage => "leakage power",
            OptimizationTarget::Area => "area",
            OptimizationTarget::FullExploration => "full exploration",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheAccessMode {
    /// Tag and data arrays are accessed in parallel; the selected block is
    /// driven out once the tag lookup resolves the way.
    Normal,
    /// Data array is accessed only after the tag lookup completes.
    Sequential,
    /// All ways are read out in parallel with the tag lookup.
    Fast,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    #[default]
    HTree,
    /// Balanced-load direct routing without an H-tree.
    NonHTree,
}

/// An inclusive sweep range over a power-of-two organization axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub min: u32,
    pub max: u32,
}

impl Range {
    pub const fn new(min: u32, max: u32) -> Self {
        Range { min, max }
    }

    pub const fn fixed(v: u32) -> Self {
        Range { min: v, max: v }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported configuration: {0}")]
    Unsupported(String),
    #[error("{name} bounds are inverted ({min} > {max})")]
    InvertedRange {
        name: &'static str,
        min: u32,
        max: u32,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    pub design_target: DesignTarget,
    pub optimization_target: OptimizationTarget,
    /// Unit: nm.
    pub process_node: u32,
    /// Unit: byte.
    pub capacity: u64,
    /// Unit: bit.
    pub word_width: u64,
    pub device_roadmap: DeviceRoadmap,
    /// Cell parameter files, tried one after another.
    pub cell_files: Vec<PathBuf>,
    /// Unit: K. Valid between 300 and 400.
    pub temperature: u32,
    /// Minimum current the wordline/bitline drivers must source. Unit: A.
    pub max_driver_current: f64,
    pub associativity: u32,
    pub cache_access_mode: CacheAccessMode,
    pub routing_mode: RoutingMode,
    /// Sense amplifiers inside the mat (as opposed to sensing at the bank).
    pub internal_sensing: bool,
    /// Unit: F.
    pub max_nmos_size: f64,

    pub num_row_mat: Range,
    pub num_column_mat: Range,
    pub num_active_mat_per_row: Range,
    pub num_active_mat_per_column: Range,
    pub num_row_subarray: Range,
    pub num_column_subarray: Range,
    pub num_active_subarray_per_row: Range,
    pub num_active_subarray_per_column: Range,
    pub mux_senseamp: Range,
    pub mux_output_lev1: Range,
    pub mux_output_lev2: Range,
    pub num_row_per_set: Range,
    /// Bounds over [`BufferDesignTarget`] indices.
    pub area_optimization_level: Range,
    /// Bounds over [`WireType`] indices.
    pub local_wire_type: Range,
    pub global_wire_type: Range,
    /// Bounds over [`WireRepeaterType`] indices.
    pub local_wire_repeater_type: Range,
    pub global_wire_repeater_type: Range,
    /// 0 = full swing only, 1 = low swing only, 0..=1 sweeps both.
    pub local_wire_low_swing: Range,
    pub global_wire_low_swing: Range,

    /// 0 routes whole dies through TSVs; 1 gives every mat its own TSVs.
    pub partition_granularity: u32,
    pub local_tsv_projection: TsvProjection,
    pub global_tsv_projection: TsvProjection,
    pub tsv_redundancy: f64,
    pub monolithic_stack_count: u32,
    pub stack_layer: Range,
    /// Evaluate only the configured stack layer counts instead of letting
    /// the search pick the best.
    pub force_stack_layers: bool,

    /// Allowed worsening over the per-metric optimum, as a fraction
    /// (e.g. 0.1 allows 10% over the best). `None` leaves the metric
    /// unconstrained.
    pub read_latency_constraint: Option<f64>,
    pub write_latency_constraint: Option<f64>,
    pub read_dynamic_energy_constraint: Option<f64>,
    pub write_dynamic_energy_constraint: Option<f64>,
    pub read_edp_constraint: Option<f64>,
    pub write_edp_constraint: Option<f64>,
    pub leakage_constraint: Option<f64>,
    pub area_constraint: Option<f64>,

    pub pruning_enabled: bool,
    pub print_all_optimals: bool,
    /// Let the tag array settle on a different cell file than the data
    /// array.
    pub allow_different_tag_tech: bool,
    pub output_file_prefix: Option<String>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            design_target: DesignTarget::RamChip,
            optimization_target: OptimizationTarget::ReadLatency,
            process_node: 65,
            capacity: 128 * 1024,
            word_width: 64,
            device_roadmap: DeviceRoadmap::Lop,
            cell_files: Vec::new(),
            temperature: 350,
            max_driver_current: 0.0,
            associativity: 1,
            cache_access_mode: CacheAccessMode::Normal,
            routing_mode: RoutingMode::HTree,
            internal_sensing: true,
            max_nmos_size: MAX_NMOS_SIZE,
            num_row_mat: Range::new(1, 64),
            num_column_mat: Range::new(1, 64),
            num_active_mat_per_row: Range::new(1, 64),
            num_active_mat_per_column: Range::new(1, 64),
            num_row_subarray: Range::new(1, 2),
            num_column_subarray: Range::new(1, 2),
            num_active_subarray_per_row: Range::new(1, 2),
            num_active_subarray_per_column: Range::new(1, 2),
            mux_senseamp: Range::new(1, 64),
            mux_output_lev1: Range::new(1, 64),
            mux_output_lev2: Range::new(1, 64),
            num_row_per_set: Range::fixed(1),
            area_optimization_level: Range::new(0, 2),
            local_wire_type: Range::new(0, WireType::COUNT as u32 - 1),
            global_wire_type: Range::new(0, WireType::COUNT as u32 - 1),
            local_wire_repeater_type: Range::fixed(0),
            global_wire_repeater_type: Range::fixed(0),
            local_wire_low_swing: Range::fixed(0),
            global_wire_low_swing: Range::fixed(0),
            partition_granularity: 0,
            local_tsv_projection: TsvProjection::Aggressive,
            global_tsv_projection: TsvProjection::Conservative,
            tsv_redundancy: 1.0,
            monolithic_stack_count: 1,
            stack_layer: Range::fixed(1),
            force_stack_layers: false,
            read_latency_constraint: None,
            write_latency_constraint: None,
            read_dynamic_energy_constraint: None,
            write_dynamic_energy_constraint: None,
            read_edp_constraint: None,
            write_edp_constraint: None,
            leakage_constraint: None,
            area_constraint: None,
            pruning_enabled: false,
            print_all_optimals: false,
            allow_different_tag_tech: false,
            output_file_prefix: None,
        }
    }
}

impl SweepConfig {
    pub fn is_cache(&self) -> bool {
        self.design_target == DesignTarget::Cache
    }

    pub fn constraints_applied(&self) -> bool {
        self.read_latency_constraint.is_some()
            || self.write_latency_constraint.is_some()
            || self.read_dynamic_energy_constraint.is_some()
            || self.write_dynamic_energy_constraint.is_some()
            || self.read_edp_constraint.is_some()
            || self.write_edp_constraint.is_some()
            || self.leakage_constraint.is_some()
            || self.area_constraint.is_some()
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.design_target == DesignTarget::CamChip {
            return Err(ConfigError::Unsupported(
                "CAM designs are not modeled".into(),
            ));
        }
        if self.capacity == 0 || !self.capacity.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "capacity must be a power of two bytes, got {}",
                self.capacity
            )));
        }
        if self.word_width == 0 {
            return Err(ConfigError::Invalid("word_width must be positive".into()));
        }
        if self.is_cache() && !self.associativity.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "associativity must be a power of two, got {}",
                self.associativity
            )));
        }
        if !(300..=400).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must lie in [300, 400] K, got {}",
                self.temperature
            )));
        }
        if self.cell_files.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one cell file is required".into(),
            ));
        }
        if self.max_nmos_size <= 0.0 {
            return Err(ConfigError::Invalid("max_nmos_size must be positive".into()));
        }
        if self.tsv_redundancy < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "tsv_redundancy must be at least 1.0, got {}",
                self.tsv_redundancy
            )));
        }
        if self.monolithic_stack_count != 1 && self.monolithic_stack_count != 2 {
            return Err(ConfigError::Invalid(format!(
                "monolithic_stack_count must be 1 or 2, got {}",
                self.monolithic_stack_count
            )));
        }
        if self.partition_granularity > 1 {
            return Err(ConfigError::Invalid(
                "partition_granularity must be 0 or 1".into(),
            ));
        }

        for (name, r) in self.ranges() {
            if r.min > r.max {
                return Err(ConfigError::InvertedRange {
                    name,
                    min: r.min,
                    max: r.max,
                });
            }
            if r.min == 0 && !name.ends_with("low_swing") && !name.ends_with("_type") && name != "area_optimization_level" {
                return Err(ConfigError::Invalid(format!(
                    "{} bounds must be at least 1",
                    name
                )));
            }
        }
        if self.stack_layer.min < 1 {
            return Err(ConfigError::Invalid("stack_layer must be at least 1".into()));
        }
        if BufferDesignTarget::from_index(self.area_optimization_level.max as usize).is_none() {
            return Err(ConfigError::Invalid(
                "area_optimization_level bounds must lie in [0, 2]".into(),
            ));
        }
        for (name, r) in [
            ("local_wire_type", self.local_wire_type),
            ("global_wire_type", self.global_wire_type),
        ] {
            if WireType::from_index(r.max as usize).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "{} bounds must name a wire type index below {}",
                    name,
                    WireType::COUNT
                )));
            }
        }
        for (name, r) in [
            ("local_wire_repeater_type", self.local_wire_repeater_type),
            ("global_wire_repeater_type", self.global_wire_repeater_type),
        ] {
            if WireRepeaterType::from_index(r.max as usize).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "{} bounds exceed the known repeater styles",
                    name
                )));
            }
        }
        for (name, r) in [
            ("local_wire_low_swing", self.local_wire_low_swing),
            ("global_wire_low_swing", self.global_wire_low_swing),
        ] {
            if r.max > 1 {
                return Err(ConfigError::Invalid(format!("{} bounds must be 0 or 1", name)));
            }
        }
        for (name, c) in [
            ("read_latency_constraint", self.read_latency_constraint),
            ("write_latency_constraint", self.write_latency_constraint),
            (
                "read_dynamic_energy_constraint",
                self.read_dynamic_energy_constraint,
            ),
            (
                "write_dynamic_energy_constraint",
                self.write_dynamic_energy_constraint,
            ),
            ("read_edp_constraint", self.read_edp_constraint),
            ("write_edp_constraint", self.write_edp_constraint),
            ("leakage_constraint", self.leakage_constraint),
            ("area_constraint", self.area_constraint),
        ] {
            if let Some(v) = c {
                if v < 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "{} must be non-negative, got {}",
                        name, v
                    )));
                }
            }
        }
        Ok(())
    }

    fn ranges(&self) -> [(&'static str, Range); 19] {
        [
            ("num_row_mat", self.num_row_mat),
            ("num_column_mat", self.num_column_mat),
            ("num_active_mat_per_row", self.num_active_mat_per_row),
            ("num_active_mat_per_column", self.num_active_mat_per_column),
            ("num_row_subarray", self.num_row_subarray),
            ("num_column_subarray", self.num_column_subarray),
            (
                "num_active_subarray_per_row",
                self.num_active_subarray_per_row,
            ),
            (
                "num_active_subarray_per_column",
                self.num_active_subarray_per_column,
            ),
            ("mux_senseamp", self.mux_senseamp),
            ("mux_output_lev1", self.mux_output_lev1),
            ("mux_output_lev2", self.mux_output_lev2),
            ("num_row_per_set", self.num_row_per_set),
            ("area_optimization_level", self.area_optimization_level),
            ("local_wire_type", self.local_wire_type),
            ("global_wire_type", self.global_wire_type),
            ("local_wire_repeater_type", self.local_wire_repeater_type),
            ("global_wire_repeater_type", self.global_wire_repeater_type),
            ("local_wire_low_swing", self.local_wire_low_swing),
            ("global_wire_low_swing", self.global_wire_low_swing),
        ]
    }
}

pub fn parse_sweep_config(path: impl AsRef<Path>) -> Result<SweepConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let cfg: SweepConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> SweepConfig {
        SweepConfig {
            cell_files: vec![PathBuf::from("cells/sram.toml")],
            ..SweepConfig::default()
        }
    }

    #[test]
    fn default_config_with_cells_is_valid() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn rejects_cam_target() {
        let cfg = SweepConfig {
            design_target: DesignTarget::CamChip,
            ..valid_config()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Unsupported(_))
        ));
    }

    #[test]
    fn rejects_inverted_range() {
        let cfg = SweepConfig {
            num_row_mat: Range::new(8, 2),
            ..valid_config()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvertedRange { name: "num_row_mat", .. })
        ));
    }

    #[test]
    fn rejects_non_power_of_two_capacity() {
        let cfg = SweepConfig {
            capacity: 3000,
            ..valid_config()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_out_of_band_temperature() {
        let cfg = SweepConfig {
            temperature: 450,
            ..valid_config()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_partial_toml() {
        let cfg: SweepConfig = toml::from_str(
            r#"
design_target = "cache"
optimization_target = "read_edp"
capacity = 1048576
word_width = 512
associativity = 8
cell_files = ["cells/sram.toml"]

[num_row_mat]
min = 1
max = 8
"#,
        )
        .unwrap();
        assert_eq!(cfg.design_target, DesignTarget::Cache);
        assert_eq!(cfg.optimization_target, OptimizationTarget::ReadEdp);
        assert_eq!(cfg.associativity, 8);
        assert_eq!(cfg.num_row_mat, Range::new(1, 8));
        // untouched fields keep their defaults
        assert_eq!(cfg.temperature, 350);
        assert!(cfg.validate().is_ok());
    }
}
