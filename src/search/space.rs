//! Lazy enumeration of the structural half of the design space. Wire and
//! die-stacking choices are layered on by the driver; this module walks the
//! power-of-two organization axes as an odometer so the full cross product
//! never has to be materialized.

use itertools::iproduct;

use crate::blocks::BufferDesignTarget;
use crate::config::{Range, SweepConfig};
use crate::search::result::WireSelection;
use crate::wire::{WireRepeaterType, WireType};

/// Axis caps used while sizing the tag array, which only needs a coarse
/// answer before the data-array search runs.
const REDUCED_MAT_LIMIT: u32 = 16;
const REDUCED_MUX_LIMIT: u32 = 16;

/// One structural point of the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPoint {
    pub num_row_mat: u64,
    pub num_column_mat: u64,
    pub num_active_mat_per_row: u64,
    pub num_active_mat_per_column: u64,
    pub num_row_subarray: u64,
    pub num_column_subarray: u64,
    pub num_active_subarray_per_row: u64,
    pub num_active_subarray_per_column: u64,
    pub mux_sense_amp: u64,
    pub mux_output_lev1: u64,
    pub mux_output_lev2: u64,
    pub num_row_per_set: u64,
    pub area_optimization_level: BufferDesignTarget,
}

impl SweepPoint {
    pub fn active_product(&self) -> u64 {
        self.num_active_mat_per_row
            * self.num_active_mat_per_column
            * self.num_active_subarray_per_row
            * self.num_active_subarray_per_column
    }
}

fn pow2_values(r: Range) -> Vec<u64> {
    let mut out = Vec::new();
    let mut v = u64::from(r.min.max(1)).next_power_of_two();
    while v <= u64::from(r.max) {
        out.push(v);
        v <<= 1;
    }
    out
}

fn linear_values(r: Range) -> Vec<u64> {
    (u64::from(r.min)..=u64::from(r.max)).collect()
}

fn capped(r: Range, cap: u32) -> Range {
    Range::new(r.min.min(cap), r.max.min(cap))
}

const AXIS_COUNT: usize = 13;

pub struct SweepSpace {
    axes: [Vec<u64>; AXIS_COUNT],
    idx: [usize; AXIS_COUNT],
    exhausted: bool,
}

impl SweepSpace {
    pub fn new(cfg: &SweepConfig) -> Self {
        Self::build(cfg, false)
    }

    /// Capped variant used for the tag-array phase.
    pub fn reduced(cfg: &SweepConfig) -> Self {
        Self::build(cfg, true)
    }

    fn build(cfg: &SweepConfig, reduced: bool) -> Self {
        let cap = |r: Range, c: u32| if reduced { capped(r, c) } else { r };
        let axes = [
            pow2_values(cap(cfg.num_row_mat, REDUCED_MAT_LIMIT)),
            pow2_values(cap(cfg.num_column_mat, REDUCED_MAT_LIMIT)),
            pow2_values(cap(cfg.num_active_mat_per_row, REDUCED_MAT_LIMIT)),
            pow2_values(cap(cfg.num_active_mat_per_column, REDUCED_MAT_LIMIT)),
            pow2_values(cfg.num_row_subarray),
            pow2_values(cfg.num_column_subarray),
            pow2_values(cfg.num_active_subarray_per_row),
            pow2_values(cfg.num_active_subarray_per_column),
            pow2_values(cap(cfg.mux_senseamp, REDUCED_MUX_LIMIT)),
            pow2_values(cap(cfg.mux_output_lev1, REDUCED_MUX_LIMIT)),
            pow2_values(cap(cfg.mux_output_lev2, REDUCED_MUX_LIMIT)),
            pow2_values(cfg.num_row_per_set),
            linear_values(cfg.area_optimization_level),
        ];
        let exhausted = axes.iter().any(|a| a.is_empty());
        SweepSpace {
            axes,
            idx: [0; AXIS_COUNT],
            exhausted,
        }
    }

    fn current(&self) -> Option<SweepPoint> {
        let v = |i: usize| self.axes[i][self.idx[i]];
        let area_optimization_level = BufferDesignTarget::from_index(v(12) as usize)?;
        Some(SweepPoint {
            num_row_mat: v(0),
            num_column_mat: v(1),
            num_active_mat_per_row: v(2),
            num_active_mat_per_column: v(3),
            num_row_subarray: v(4),
            num_column_subarray: v(5),
            num_active_subarray_per_row: v(6),
            num_active_subarray_per_column: v(7),
            mux_sense_amp: v(8),
            mux_output_lev1: v(9),
            mux_output_lev2: v(10),
            num_row_per_set: v(11),
            area_optimization_level,
        })
    }

    fn advance(&mut self) {
        for i in (0..AXIS_COUNT).rev() {
            self.idx[i] += 1;
            if self.idx[i] < self.axes[i].len() {
                return;
            }
            self.idx[i] = 0;
        }
        self.exhausted = true;
    }
}

impl Iterator for SweepSpace {
    type Item = SweepPoint;

    fn next(&mut self) -> Option<SweepPoint> {
        while !self.exhausted {
            let point = self.current();
            self.advance();
            // a row of the mat grid holds num_column_mat mats, so the active
            // counts are bounded by the opposite dimension
            if let Some(p) = point {
                if p.num_active_mat_per_row <= p.num_column_mat
                    && p.num_active_mat_per_column <= p.num_row_mat
                    && p.num_active_subarray_per_row <= p.num_column_subarray
                    && p.num_active_subarray_per_column <= p.num_row_subarray
                {
                    return Some(p);
                }
            }
        }
        None
    }
}

/// Die counts the search evaluates. Unless the count is forced, everything
/// from a single die up to the configured maximum is tried and the best
/// candidate decides.
pub fn stack_layers(cfg: &SweepConfig) -> Vec<u64> {
    let range = if cfg.force_stack_layers {
        cfg.stack_layer
    } else {
        Range::new(1, cfg.stack_layer.max)
    };
    pow2_values(range)
}

/// All wire flavors inside the configured index ranges. Low-swing signaling
/// cannot be combined with repeaters, so those points are skipped.
pub fn wire_selections(types: Range, repeaters: Range, low_swing: Range) -> Vec<WireSelection> {
    iproduct!(
        types.min..=types.max,
        repeaters.min..=repeaters.max,
        low_swing.min..=low_swing.max.min(1)
    )
    .filter_map(|(t, r, ls)| {
        let wire_type = WireType::from_index(t as usize)?;
        let repeater = WireRepeaterType::from_index(r as usize)?;
        let low_swing = ls == 1;
        if low_swing && repeater.is_repeated() {
            return None;
        }
        Some(WireSelection {
            wire_type,
            repeater,
            low_swing,
        })
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pow2_axis_rounds_the_lower_bound_up() {
        assert_eq!(pow2_values(Range::new(3, 20)), vec![4, 8, 16]);
        assert_eq!(pow2_values(Range::new(1, 1)), vec![1]);
        assert_eq!(pow2_values(Range::new(5, 7)), Vec::<u64>::new());
    }

    #[test]
    fn odometer_covers_the_cross_product_once() {
        let cfg = SweepConfig {
            num_row_mat: Range::new(1, 2),
            num_column_mat: Range::new(1, 2),
            num_active_mat_per_row: Range::fixed(1),
            num_active_mat_per_column: Range::fixed(1),
            num_row_subarray: Range::fixed(1),
            num_column_subarray: Range::fixed(1),
            num_active_subarray_per_row: Range::fixed(1),
            num_active_subarray_per_column: Range::fixed(1),
            mux_senseamp: Range::new(1, 4),
            mux_output_lev1: Range::fixed(1),
            mux_output_lev2: Range::fixed(1),
            num_row_per_set: Range::fixed(1),
            area_optimization_level: Range::new(0, 2),
            ..SweepConfig::default()
        };
        // 2 * 2 * 3 (mux) * 3 (area levels)
        assert_eq!(SweepSpace::new(&cfg).count(), 36);
    }

    #[test]
    fn active_counts_never_exceed_the_grid() {
        let cfg = SweepConfig {
            num_row_mat: Range::new(1, 2),
            num_column_mat: Range::new(1, 2),
            num_active_mat_per_row: Range::new(1, 4),
            num_active_mat_per_column: Range::new(1, 4),
            num_row_subarray: Range::fixed(1),
            num_column_subarray: Range::fixed(1),
            num_active_subarray_per_row: Range::fixed(1),
            num_active_subarray_per_column: Range::fixed(1),
            mux_senseamp: Range::fixed(1),
            mux_output_lev1: Range::fixed(1),
            mux_output_lev2: Range::fixed(1),
            num_row_per_set: Range::fixed(1),
            area_optimization_level: Range::fixed(0),
            ..SweepConfig::default()
        };
        for p in SweepSpace::new(&cfg) {
            assert!(p.num_active_mat_per_row <= p.num_column_mat);
            assert!(p.num_active_mat_per_column <= p.num_row_mat);
        }
    }

    #[test]
    fn reduced_space_caps_the_mat_and_mux_axes() {
        let cfg = SweepConfig {
            num_row_mat: Range::new(1, 256),
            mux_senseamp: Range::new(1, 256),
            ..SweepConfig::default()
        };
        let full = SweepSpace::build(&cfg, false);
        let reduced = SweepSpace::build(&cfg, true);
        assert_eq!(*full.axes[0].last().unwrap(), 256);
        assert_eq!(*reduced.axes[0].last().unwrap(), u64::from(REDUCED_MAT_LIMIT));
        assert_eq!(*reduced.axes[8].last().unwrap(), u64::from(REDUCED_MUX_LIMIT));
    }

    #[test]
    fn stack_layers_default_to_a_single_die() {
        let cfg = SweepConfig::default();
        assert_eq!(stack_layers(&cfg), vec![1]);
        let forced = SweepConfig {
            stack_layer: Range::new(4, 8),
            force_stack_layers: true,
            ..SweepConfig::default()
        };
        assert_eq!(stack_layers(&forced), vec![4, 8]);
        let free = SweepConfig {
            stack_layer: Range::new(4, 8),
            force_stack_layers: false,
            ..SweepConfig::default()
        };
        assert_eq!(stack_layers(&free), vec![1, 2, 4, 8]);
    }

    #[test]
    fn low_swing_wires_never_carry_repeaters() {
        let picks = wire_selections(Range::fixed(0), Range::new(0, 2), Range::new(0, 1));
        assert!(picks
            .iter()
            .all(|s| !(s.low_swing && s.repeater.is_repeated())));
        // full swing keeps all three repeater styles, low swing only the bare wire
        assert_eq!(picks.len(), 4);
    }
}
