//! A mat is a grid of identical subarrays driven by shared predecoding
//! logic. Row and column select bits are each split across two predecode
//! blocks whose outputs fan out to the NAND decoders inside every
//! subarray. Tag mats additionally carry the match comparator.

use log::{error, warn};

use crate::blocks::comparator::Comparator;
use crate::blocks::predecode::PredecodeBlock;
use crate::blocks::subarray::SubArray;
use crate::blocks::{BufferDesignTarget, MemoryType, UnitMetrics};
use crate::EvalCtx;

fn log2_exact(n: u64) -> Option<usize> {
    if n.is_power_of_two() {
        Some(n.trailing_zeros() as usize)
    } else {
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mat {
    pub initialized: bool,
    pub invalid: bool,
    pub metrics: UnitMetrics,

    pub memory_type: MemoryType,
    pub num_row_subarray: u64,
    pub num_column_subarray: u64,
    pub num_active_subarray_per_row: u64,
    pub num_active_subarray_per_column: u64,
    pub num_tag_bits: usize,

    pub subarray: SubArray,
    pub row_predecoder_block1: PredecodeBlock,
    pub row_predecoder_block2: PredecodeBlock,
    pub bitline_mux_predecoder_block1: PredecodeBlock,
    pub bitline_mux_predecoder_block2: PredecodeBlock,
    pub senseamp_mux_lev1_predecoder_block1: PredecodeBlock,
    pub senseamp_mux_lev1_predecoder_block2: PredecodeBlock,
    pub senseamp_mux_lev2_predecoder_block1: PredecodeBlock,
    pub senseamp_mux_lev2_predecoder_block2: PredecodeBlock,
    pub comparator: Comparator,

    pub predecoder_latency: f64,
    pub ramp_input: f64,
    pub ramp_output: f64,
}

impl Mat {
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        &mut self,
        ctx: &EvalCtx,
        memory_type: MemoryType,
        num_row_subarray: u64,
        num_column_subarray: u64,
        num_active_subarray_per_row: u64,
        num_active_subarray_per_column: u64,
        num_row_per_subarray: u64,
        num_column_per_subarray: u64,
        multiple_row_per_set: bool,
        split: bool,
        mux_sense_amp: u64,
        internal_sense_amp: bool,
        mux_output_lev1: u64,
        mux_output_lev2: u64,
        num_tag_bits: usize,
        area_optimization_level: BufferDesignTarget,
        num_3d_levels: u64,
    ) {
        if self.initialized {
            warn!("[mat] already initialized");
        }
        self.memory_type = memory_type;
        self.num_row_subarray = num_row_subarray;
        self.num_column_subarray = num_column_subarray;
        self.num_active_subarray_per_row = num_active_subarray_per_row.min(num_column_subarray);
        self.num_active_subarray_per_column =
            num_active_subarray_per_column.min(num_row_subarray);
        self.num_tag_bits = num_tag_bits;

        let bit_budget = |count: u64| -> Option<(usize, usize)> {
            let bits = log2_exact(count)?;
            let first = bits.div_ceil(2);
            Some((first, bits - first))
        };
        let row_bits = bit_budget(num_row_per_subarray);
        let bitline_bits = bit_budget(mux_sense_amp);
        let lev1_bits = bit_budget(mux_output_lev1.max(1));
        let lev2_bits = bit_budget(mux_output_lev2.max(1));
        let (Some(row_bits), Some(bitline_bits), Some(lev1_bits), Some(lev2_bits)) =
            (row_bits, bitline_bits, lev1_bits, lev2_bits)
        else {
            self.invalid = true;
            self.initialized = true;
            return;
        };

        self.subarray.initialize(
            ctx,
            num_row_per_subarray,
            num_column_per_subarray,
            multiple_row_per_set,
            split,
            mux_sense_amp,
            internal_sense_amp,
            mux_output_lev1,
            mux_output_lev2,
            area_optimization_level,
            num_3d_levels,
        );
        if self.subarray.invalid {
            self.invalid = true;
        }

        // loads are refined in calculate_rc once the decoder input caps of
        // the subarray are known
        self.row_predecoder_block1.initialize(ctx, row_bits.0, 0.0, 0.0);
        self.row_predecoder_block2.initialize(ctx, row_bits.1, 0.0, 0.0);
        self.bitline_mux_predecoder_block1
            .initialize(ctx, bitline_bits.0, 0.0, 0.0);
        self.bitline_mux_predecoder_block2
            .initialize(ctx, bitline_bits.1, 0.0, 0.0);
        self.senseamp_mux_lev1_predecoder_block1
            .initialize(ctx, lev1_bits.0, 0.0, 0.0);
        self.senseamp_mux_lev1_predecoder_block2
            .initialize(ctx, lev1_bits.1, 0.0, 0.0);
        self.senseamp_mux_lev2_predecoder_block1
            .initialize(ctx, lev2_bits.0, 0.0, 0.0);
        self.senseamp_mux_lev2_predecoder_block2
            .initialize(ctx, lev2_bits.1, 0.0, 0.0);

        if memory_type == MemoryType::Tag {
            self.comparator.initialize(ctx, num_tag_bits, 0.0);
        }

        if self.predecoder_blocks().iter().any(|block| block.invalid) {
            self.invalid = true;
        }
        self.initialized = true;
    }

    fn predecoder_blocks(&self) -> [&PredecodeBlock; 8] {
        [
            &self.row_predecoder_block1,
            &self.row_predecoder_block2,
            &self.bitline_mux_predecoder_block1,
            &self.bitline_mux_predecoder_block2,
            &self.senseamp_mux_lev1_predecoder_block1,
            &self.senseamp_mux_lev1_predecoder_block2,
            &self.senseamp_mux_lev2_predecoder_block1,
            &self.senseamp_mux_lev2_predecoder_block2,
        ]
    }

    fn predecoder_blocks_mut(&mut self) -> [&mut PredecodeBlock; 8] {
        [
            &mut self.row_predecoder_block1,
            &mut self.row_predecoder_block2,
            &mut self.bitline_mux_predecoder_block1,
            &mut self.bitline_mux_predecoder_block2,
            &mut self.senseamp_mux_lev1_predecoder_block1,
            &mut self.senseamp_mux_lev1_predecoder_block2,
            &mut self.senseamp_mux_lev2_predecoder_block1,
            &mut self.senseamp_mux_lev2_predecoder_block2,
        ]
    }

    fn num_subarrays(&self) -> f64 {
        (self.num_row_subarray * self.num_column_subarray) as f64
    }

    fn num_active_subarrays(&self) -> f64 {
        (self.num_active_subarray_per_row * self.num_active_subarray_per_column) as f64
    }

    pub fn calculate_area(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[mat] calculate_area before initialize");
            return;
        }
        if self.invalid {
            self.metrics.invalidate();
            return;
        }
        self.subarray.calculate_area(ctx);
        let grid_height = self.num_row_subarray as f64 * self.subarray.metrics.height;
        let grid_width = self.num_column_subarray as f64 * self.subarray.metrics.width;
        let mut logic_area = 0.0;
        for block in self.predecoder_blocks_mut() {
            block.calculate_area(ctx);
            logic_area += block.metrics.area;
        }
        if self.memory_type == MemoryType::Tag {
            self.comparator.calculate_area(ctx);
            logic_area += self.comparator.metrics.area;
        }
        // predecoders stack below the grid, keeping the grid width
        self.metrics.width = grid_width;
        self.metrics.area = grid_height * grid_width + logic_area;
        self.metrics.height = self.metrics.area / self.metrics.width;
    }

    pub fn calculate_rc(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[mat] calculate_rc before initialize");
            return;
        }
        if self.invalid {
            return;
        }
        self.subarray.calculate_rc(ctx);

        // every predecode output line crosses the subarray grid and fans
        // out to the NAND gates it selects in each subarray
        let line_length = self.num_column_subarray as f64 * self.subarray.len_wordline;
        let wire_cap = line_length * ctx.local_wire.cap_wire_per_unit;
        let wire_res = line_length * ctx.local_wire.res_wire_per_unit;
        let num_subarrays = self.num_subarrays();

        let row_cap = self.subarray.row_decoder.cap_nand_input;
        let row_count = self.subarray.num_row as f64;
        let bitline_cap = self.subarray.bitline_mux_decoder.cap_nand_input;
        let bitline_count = self.subarray.mux_sense_amp as f64;
        let lev1_cap = self.subarray.sense_amp_mux_lev1_decoder.cap_nand_input;
        let lev1_count = self.subarray.mux_output_lev1 as f64;
        let lev2_cap = self.subarray.sense_amp_mux_lev2_decoder.cap_nand_input;
        let lev2_count = self.subarray.mux_output_lev2 as f64;
        let loads = [
            (row_cap, row_count),
            (row_cap, row_count),
            (bitline_cap, bitline_count),
            (bitline_cap, bitline_count),
            (lev1_cap, lev1_count),
            (lev1_cap, lev1_count),
            (lev2_cap, lev2_count),
            (lev2_cap, lev2_count),
        ];
        for (block, (cap_per_gate, gate_count)) in
            self.predecoder_blocks_mut().into_iter().zip(loads)
        {
            if block.num_address_bit == 0 {
                block.calculate_rc(ctx);
                continue;
            }
            let fanout = gate_count / block.num_outputs() as f64;
            let bits = block.num_address_bit;
            let cap_load = wire_cap + fanout * num_subarrays * cap_per_gate;
            block.initialize(ctx, bits, cap_load, wire_res);
            block.calculate_rc(ctx);
        }
        if self.memory_type == MemoryType::Tag {
            self.comparator.calculate_rc(ctx);
        }
    }

    pub fn calculate_latency(&mut self, ctx: &EvalCtx, ramp_input: f64) {
        if !self.initialized {
            error!("[mat] calculate_latency before initialize");
            return;
        }
        if self.invalid {
            self.metrics.invalidate();
            return;
        }
        self.ramp_input = ramp_input;

        let mut slowest = 0.0f64;
        let mut ramp_for_subarray = ramp_input;
        for block in self.predecoder_blocks_mut() {
            block.calculate_latency(ctx, ramp_input);
            if block.metrics.read_latency > slowest {
                slowest = block.metrics.read_latency;
                ramp_for_subarray = block.ramp_output;
            }
        }
        self.predecoder_latency = slowest;

        self.subarray.calculate_latency(ctx, ramp_for_subarray);
        let mut read = self.predecoder_latency + self.subarray.metrics.read_latency;
        if self.memory_type == MemoryType::Tag {
            self.comparator.calculate_latency(ctx, self.subarray.ramp_output);
            read += self.comparator.metrics.read_latency;
            self.ramp_output = self.comparator.ramp_output;
        } else {
            self.ramp_output = self.subarray.ramp_output;
        }
        self.metrics.read_latency = read;
        self.metrics.write_latency =
            self.predecoder_latency + self.subarray.metrics.write_latency;
        self.metrics.set_latency = self.predecoder_latency + self.subarray.metrics.set_latency;
        self.metrics.reset_latency =
            self.predecoder_latency + self.subarray.metrics.reset_latency;
        if ctx.cell.mem_cell_type.needs_refresh() {
            // subarrays refresh in lockstep, so one subarray's sweep bounds
            // the mat
            self.metrics.refresh_latency = self.subarray.metrics.refresh_latency;
        }
    }

    pub fn calculate_power(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[mat] calculate_power before initialize");
            return;
        }
        if self.invalid {
            self.metrics.invalidate();
            return;
        }
        self.subarray.calculate_power(ctx);
        let mut predecode_energy = 0.0;
        let mut leakage = 0.0;
        for block in self.predecoder_blocks_mut() {
            block.calculate_power(ctx);
            predecode_energy += block.metrics.read_dynamic_energy;
            leakage += block.metrics.leakage;
        }

        // inactive subarrays are power gated but still leak
        let active = self.num_active_subarrays();
        let total = self.num_subarrays();
        self.metrics.read_dynamic_energy =
            predecode_energy + active * self.subarray.metrics.read_dynamic_energy;
        self.metrics.write_dynamic_energy =
            predecode_energy + active * self.subarray.metrics.write_dynamic_energy;
        self.metrics.set_dynamic_energy =
            predecode_energy + active * self.subarray.metrics.set_dynamic_energy;
        self.metrics.reset_dynamic_energy =
            predecode_energy + active * self.subarray.metrics.reset_dynamic_energy;
        self.metrics.cell_read_energy = active * self.subarray.metrics.cell_read_energy;
        self.metrics.cell_set_energy = active * self.subarray.metrics.cell_set_energy;
        self.metrics.cell_reset_energy = active * self.subarray.metrics.cell_reset_energy;
        if ctx.cell.mem_cell_type.needs_refresh() {
            self.metrics.refresh_dynamic_energy =
                total * self.subarray.metrics.refresh_dynamic_energy;
        }
        leakage += total * self.subarray.metrics.leakage;
        if self.memory_type == MemoryType::Tag {
            self.comparator.calculate_power(ctx);
            self.metrics.read_dynamic_energy += self.comparator.metrics.read_dynamic_energy;
            leakage += self.comparator.metrics.leakage;
        }
        self.metrics.leakage = leakage;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::tests::fixture;
    use crate::INFINITE_RAMP;

    fn evaluate(mat: &mut Mat, ctx: &EvalCtx) {
        mat.calculate_area(ctx);
        mat.calculate_rc(ctx);
        mat.calculate_latency(ctx, INFINITE_RAMP);
        mat.calculate_power(ctx);
    }

    fn build(fx: &fixture::Fixture, memory_type: MemoryType, rows: u64, cols: u64) -> Mat {
        let ctx = fx.ctx();
        let mut mat = Mat::default();
        mat.initialize(
            &ctx,
            memory_type,
            2,
            2,
            2,
            2,
            rows,
            cols,
            false,
            false,
            4,
            true,
            2,
            1,
            24,
            BufferDesignTarget::LatencyFirst,
            1,
        );
        mat
    }

    #[test]
    fn data_mat_produces_full_metrics() {
        let fx = fixture::sram();
        let mut mat = build(&fx, MemoryType::Data, 256, 256);
        let ctx = fx.ctx();
        assert!(!mat.invalid);
        evaluate(&mut mat, &ctx);
        assert!(mat.metrics.area > 4.0 * mat.subarray.metrics.area);
        assert!(mat.predecoder_latency > 0.0);
        assert!(mat.metrics.read_latency > mat.subarray.metrics.read_latency);
        assert!(mat.metrics.read_dynamic_energy > 4.0 * mat.subarray.metrics.read_dynamic_energy);
        assert!(mat.metrics.leakage > 4.0 * mat.subarray.metrics.leakage);
    }

    #[test]
    fn tag_mat_adds_the_comparator() {
        let fx = fixture::sram();
        let mut data = build(&fx, MemoryType::Data, 128, 128);
        let mut tag = build(&fx, MemoryType::Tag, 128, 128);
        let ctx = fx.ctx();
        evaluate(&mut data, &ctx);
        evaluate(&mut tag, &ctx);
        assert!(tag.metrics.read_latency > data.metrics.read_latency);
        assert!(tag.metrics.read_dynamic_energy > data.metrics.read_dynamic_energy);
    }

    #[test]
    fn rejects_non_power_of_two_rows() {
        let fx = fixture::sram();
        let mut mat = build(&fx, MemoryType::Data, 300, 256);
        let ctx = fx.ctx();
        assert!(mat.invalid);
        evaluate(&mut mat, &ctx);
        assert!(mat.metrics.is_invalidated());
    }

    #[test]
    fn row_bits_split_across_the_two_blocks() {
        let fx = fixture::sram();
        let mat = build(&fx, MemoryType::Data, 256, 256);
        assert_eq!(
            mat.row_predecoder_block1.num_address_bit
                + mat.row_predecoder_block2.num_address_bit,
            8
        );
        assert_eq!(
            mat.bitline_mux_predecoder_block1.num_address_bit
                + mat.bitline_mux_predecoder_block2.num_address_bit,
            2
        );
    }

    #[test]
    fn edram_mat_carries_refresh_costs() {
        let fx = fixture::edram();
        let ctx = fx.ctx();
        let mut mat = Mat::default();
        mat.initialize(
            &ctx,
            MemoryType::Data,
            2,
            2,
            2,
            2,
            64,
            64,
            false,
            false,
            1,
            true,
            1,
            1,
            0,
            BufferDesignTarget::LatencyFirst,
            1,
        );
        assert!(!mat.invalid);
        evaluate(&mut mat, &ctx);
        assert!(mat.metrics.refresh_latency > 0.0);
        assert!(mat.metrics.refresh_dynamic_energy > 0.0);
    }
}
