//! Circuit models, leaves first: each block owns its sizing and, after the
//! evaluation phases run, its metrics. Every block follows the same
//! lifecycle: `initialize` -> `calculate_area` -> `calculate_rc` ->
//! `calculate_latency` -> `calculate_power`, with capacitances feeding
//! latency and each stage's output ramp feeding the next stage.

pub mod bank;
pub mod comparator;
pub mod decoder;
pub mod driver;
pub mod mat;
pub mod mux;
pub mod precharger;
pub mod predecode;
pub mod senseamp;
pub mod subarray;
pub mod tsv;

use serde::{Deserialize, Serialize};

use crate::INVALID;

/// Diffusion region height used for standalone logic layout, in feature
/// sizes.
pub(crate) const AREA_REGION_HEIGHT: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferDesignTarget {
    LatencyFirst = 0,
    /// Fixed two-stage buffer.
    LatencyAreaTradeOff = 1,
    AreaFirst = 2,
}

impl Default for BufferDesignTarget {
    fn default() -> Self {
        BufferDesignTarget::LatencyFirst
    }
}

impl BufferDesignTarget {
    pub fn from_index(i: usize) -> Option<Self> {
        match i {
            0 => Some(BufferDesignTarget::LatencyFirst),
            1 => Some(BufferDesignTarget::LatencyAreaTradeOff),
            2 => Some(BufferDesignTarget::AreaFirst),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    #[default]
    Data,
    Tag,
    Cam,
}

/// Physical and per-operation metrics shared by every circuit model.
/// Meaningful only after the owning block has run its evaluation phases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UnitMetrics {
    /// Unit: m.
    pub height: f64,
    pub width: f64,
    /// Unit: m^2.
    pub area: f64,
    /// Unit: s.
    pub read_latency: f64,
    pub write_latency: f64,
    pub reset_latency: f64,
    pub set_latency: f64,
    pub refresh_latency: f64,
    /// Unit: J.
    pub read_dynamic_energy: f64,
    pub write_dynamic_energy: f64,
    pub reset_dynamic_energy: f64,
    pub set_dynamic_energy: f64,
    pub refresh_dynamic_energy: f64,
    pub cell_read_energy: f64,
    pub cell_set_energy: f64,
    pub cell_reset_energy: f64,
    /// Unit: W.
    pub leakage: f64,
}

impl UnitMetrics {
    /// Force every field to the invalid sentinel so a rejected candidate can
    /// never masquerade as a good one.
    pub fn invalidate(&mut self) {
        *self = UnitMetrics {
            height: INVALID,
            width: INVALID,
            area: INVALID,
            read_latency: INVALID,
            write_latency: INVALID,
            reset_latency: INVALID,
            set_latency: INVALID,
            refresh_latency: INVALID,
            read_dynamic_energy: INVALID,
            write_dynamic_energy: INVALID,
            reset_dynamic_energy: INVALID,
            set_dynamic_energy: INVALID,
            refresh_dynamic_energy: INVALID,
            cell_read_energy: INVALID,
            cell_set_energy: INVALID,
            cell_reset_energy: INVALID,
            leakage: INVALID,
        };
    }

    pub fn is_invalidated(&self) -> bool {
        self.read_latency >= INVALID
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Shared evaluation fixtures for block-level tests: a config, a
    /// technology, a cell, and a pair of wires, owned together so an
    /// [`crate::EvalCtx`] can borrow them.
    pub(crate) mod fixture {
        use crate::cell::{tests as cell_fixtures, MemCell};
        use crate::config::SweepConfig;
        use crate::tech::{DeviceRoadmap, Technology, TsvProjection};
        use crate::wire::{Wire, WireRepeaterType, WireType};
        use crate::EvalCtx;

        pub(crate) struct Fixture {
            pub cfg: SweepConfig,
            pub tech: Technology,
            pub cell: MemCell,
            pub local_wire: Wire,
            pub global_wire: Wire,
        }

        impl Fixture {
            pub(crate) fn ctx(&self) -> EvalCtx<'_> {
                EvalCtx {
                    cfg: &self.cfg,
                    tech: &self.tech,
                    cell: &self.cell,
                    local_wire: &self.local_wire,
                    global_wire: &self.global_wire,
                }
            }
        }

        fn build(cell: MemCell, roadmap: DeviceRoadmap) -> Fixture {
            let cfg = SweepConfig::default();
            let mut tech = Technology::for_node(cfg.process_node, roadmap).unwrap();
            tech.set_layer_count(TsvProjection::Aggressive, TsvProjection::Conservative, 1);
            let local_wire = Wire::new(
                &tech,
                WireType::LocalAggressive,
                WireRepeaterType::None,
                cfg.temperature,
                false,
            )
            .unwrap();
            let global_wire = Wire::new(
                &tech,
                WireType::GlobalAggressive,
                WireRepeaterType::None,
                cfg.temperature,
                false,
            )
            .unwrap();
            Fixture {
                cfg,
                tech,
                cell,
                local_wire,
                global_wire,
            }
        }

        pub(crate) fn sram() -> Fixture {
            build(cell_fixtures::sram_cell(), DeviceRoadmap::Lop)
        }

        pub(crate) fn edram() -> Fixture {
            build(cell_fixtures::edram_cell(), DeviceRoadmap::Edram)
        }

        pub(crate) fn mram() -> Fixture {
            build(cell_fixtures::mram_cell(), DeviceRoadmap::Lop)
        }
    }

    #[test]
    fn invalidate_poisons_every_metric() {
        let mut m = UnitMetrics::default();
        m.read_latency = 1e-9;
        m.area = 1e-8;
        m.invalidate();
        assert!(m.is_invalidated());
        assert_eq!(m.area, INVALID);
        assert_eq!(m.leakage, INVALID);
        assert_eq!(m.refresh_dynamic_energy, INVALID);
    }
}
