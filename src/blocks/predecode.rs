//! Predecoder block: takes a slice of the row (or mux) address and turns
//! it into one-hot predecoded lines. Address bits are split into groups of
//! at most three, each decoded by a [`BasicDecoder`]; with more than one
//! group a second-stage [`RowDecoder`] NANDs the group outputs together.

use log::error;

use crate::blocks::decoder::{BasicDecoder, RowDecoder};
use crate::blocks::{BufferDesignTarget, UnitMetrics};
use crate::EvalCtx;

/// At most three groups of three bits each.
const MAX_ADDRESS_BITS: usize = 9;

#[derive(Debug, Clone, Default)]
pub struct PredecodeBlock {
    pub initialized: bool,
    pub invalid: bool,
    pub metrics: UnitMetrics,

    pub num_address_bit: usize,
    pub cap_load: f64,
    pub res_load: f64,
    /// One decoder per group of 1..=3 address bits.
    pub group_decoders: Vec<BasicDecoder>,
    group_bits: Vec<usize>,
    pub stage2: Option<RowDecoder>,
    pub ramp_input: f64,
    pub ramp_output: f64,
}

/// Split `n` address bits into groups of three, then two, so that no
/// two-group split produces fewer than four bits total.
fn split_bits(n: usize) -> Vec<usize> {
    match n {
        0 => vec![],
        1..=3 => vec![n],
        4 => vec![2, 2],
        5 => vec![3, 2],
        6 => vec![3, 3],
        7 => vec![3, 2, 2],
        8 => vec![3, 3, 2],
        _ => vec![3, 3, 3],
    }
}

impl PredecodeBlock {
    pub fn initialize(&mut self, ctx: &EvalCtx, num_address_bit: usize, cap_load: f64, res_load: f64) {
        self.num_address_bit = num_address_bit;
        self.cap_load = cap_load;
        self.res_load = res_load;

        if num_address_bit == 0 {
            self.initialized = true;
            return;
        }
        if num_address_bit > MAX_ADDRESS_BITS {
            self.invalid = true;
            self.initialized = true;
            return;
        }

        self.group_bits = split_bits(num_address_bit);
        self.group_decoders = vec![BasicDecoder::default(); self.group_bits.len()];

        if self.group_bits.len() == 1 {
            self.group_decoders[0].initialize(ctx, num_address_bit, cap_load, res_load);
            self.stage2 = None;
        } else {
            // group outputs get their real load once stage-2 caps are known
            for (dec, &bits) in self.group_decoders.iter_mut().zip(&self.group_bits) {
                dec.initialize(ctx, bits, 0.0, 0.0);
            }
            let mut stage2 = RowDecoder::default();
            stage2.initialize(
                ctx,
                self.num_outputs(),
                cap_load,
                res_load,
                self.group_bits.len() == 3,
                BufferDesignTarget::LatencyFirst,
                0.0,
            );
            if stage2.invalid {
                self.invalid = true;
                self.initialized = true;
                return;
            }
            self.stage2 = Some(stage2);
        }
        self.initialized = true;
    }

    pub fn num_outputs(&self) -> usize {
        1 << self.num_address_bit
    }

    pub fn calculate_area(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[predecode block] calculate_area before initialize");
            return;
        }
        if self.num_address_bit == 0 {
            return;
        }
        if self.invalid {
            self.metrics.invalidate();
            return;
        }
        let mut height = 0.0;
        let mut width: f64 = 0.0;
        for dec in &mut self.group_decoders {
            dec.calculate_area(ctx);
            height += dec.metrics.height;
            width = width.max(dec.metrics.width);
        }
        if let Some(stage2) = &mut self.stage2 {
            stage2.calculate_area(ctx);
            height += stage2.metrics.height;
            width = width.max(stage2.metrics.width);
        }
        self.metrics.height = height;
        self.metrics.width = width;
        self.metrics.area = height * width;
    }

    pub fn calculate_rc(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[predecode block] calculate_rc before initialize");
            return;
        }
        if self.num_address_bit == 0 || self.invalid {
            return;
        }
        if let Some(stage2) = &mut self.stage2 {
            stage2.calculate_rc(ctx);
            let num_outputs = 1usize << self.num_address_bit;
            let gate_cap_in = stage2.cap_nand_input;
            // each group line fans out to the stage-2 gates it selects
            for (dec, &bits) in self.group_decoders.iter_mut().zip(&self.group_bits) {
                let fanout = num_outputs >> bits;
                dec.initialize(ctx, bits, fanout as f64 * gate_cap_in, 0.0);
                dec.calculate_rc(ctx);
            }
        } else {
            self.group_decoders[0].calculate_rc(ctx);
        }
    }

    pub fn calculate_latency(&mut self, ctx: &EvalCtx, ramp_input: f64) {
        if !self.initialized {
            error!("[predecode block] calculate_latency before initialize");
            return;
        }
        if self.num_address_bit == 0 {
            self.ramp_input = ramp_input;
            self.ramp_output = ramp_input;
            return;
        }
        if self.invalid {
            self.metrics.invalidate();
            return;
        }
        self.ramp_input = ramp_input;
        let mut slowest = 0.0;
        let mut ramp_after_groups = ramp_input;
        for dec in &mut self.group_decoders {
            dec.calculate_latency(ctx, ramp_input);
            if dec.metrics.read_latency > slowest {
                slowest = dec.metrics.read_latency;
                ramp_after_groups = dec.ramp_output;
            }
        }
        if let Some(stage2) = &mut self.stage2 {
            stage2.calculate_latency(ctx, ramp_after_groups);
            self.metrics.read_latency = slowest + stage2.metrics.read_latency;
            self.ramp_output = stage2.ramp_output;
        } else {
            self.metrics.read_latency = slowest;
            self.ramp_output = ramp_after_groups;
        }
        self.metrics.write_latency = self.metrics.read_latency;
    }

    pub fn calculate_power(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[predecode block] calculate_power before initialize");
            return;
        }
        if self.num_address_bit == 0 {
            return;
        }
        if self.invalid {
            self.metrics.invalidate();
            return;
        }
        let mut energy = 0.0;
        let mut leakage = 0.0;
        for dec in &mut self.group_decoders {
            dec.calculate_power(ctx);
            energy += dec.metrics.read_dynamic_energy;
            leakage += dec.metrics.leakage;
        }
        if let Some(stage2) = &mut self.stage2 {
            stage2.calculate_power(ctx);
            energy += stage2.metrics.read_dynamic_energy;
            leakage += stage2.metrics.leakage;
        }
        self.metrics.read_dynamic_energy = energy;
        self.metrics.write_dynamic_energy = energy;
        self.metrics.leakage = leakage;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::tests::fixture;
    use crate::INFINITE_RAMP;

    fn evaluate(block: &mut PredecodeBlock, ctx: &EvalCtx) {
        block.calculate_area(ctx);
        block.calculate_rc(ctx);
        block.calculate_latency(ctx, INFINITE_RAMP);
        block.calculate_power(ctx);
    }

    #[test]
    fn splits_follow_group_budget() {
        assert_eq!(split_bits(0), Vec::<usize>::new());
        assert_eq!(split_bits(3), vec![3]);
        assert_eq!(split_bits(4), vec![2, 2]);
        assert_eq!(split_bits(7), vec![3, 2, 2]);
        assert_eq!(split_bits(9), vec![3, 3, 3]);
    }

    #[test]
    fn three_bits_use_a_single_decoder() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut block = PredecodeBlock::default();
        block.initialize(&ctx, 3, 20e-15, 0.0);
        assert!(block.stage2.is_none());
        assert_eq!(block.num_outputs(), 8);
        evaluate(&mut block, &ctx);
        assert!(block.metrics.read_latency > 0.0);
        assert!(block.metrics.area > 0.0);
    }

    #[test]
    fn six_bits_need_a_second_stage() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut block = PredecodeBlock::default();
        block.initialize(&ctx, 6, 20e-15, 0.0);
        assert!(block.stage2.is_some());
        assert_eq!(block.num_outputs(), 64);
        evaluate(&mut block, &ctx);
        assert!(block.metrics.read_latency > 0.0);
        assert!(block.metrics.leakage > 0.0);
    }

    #[test]
    fn zero_bits_is_an_empty_block() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut block = PredecodeBlock::default();
        block.initialize(&ctx, 0, 0.0, 0.0);
        evaluate(&mut block, &ctx);
        assert_eq!(block.metrics.read_latency, 0.0);
        assert_eq!(block.metrics.area, 0.0);
        assert_eq!(block.ramp_output, INFINITE_RAMP);
    }

    #[test]
    fn too_many_bits_invalidate() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut block = PredecodeBlock::default();
        block.initialize(&ctx, 12, 0.0, 0.0);
        assert!(block.invalid);
        evaluate(&mut block, &ctx);
        assert!(block.metrics.is_invalidated());
    }

    #[test]
    fn more_bits_cost_more_latency() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut small = PredecodeBlock::default();
        small.initialize(&ctx, 2, 20e-15, 0.0);
        evaluate(&mut small, &ctx);
        let mut large = PredecodeBlock::default();
        large.initialize(&ctx, 8, 20e-15, 0.0);
        evaluate(&mut large, &ctx);
        assert!(large.metrics.read_latency > small.metrics.read_latency);
        assert!(large.metrics.read_dynamic_energy > small.metrics.read_dynamic_energy);
    }
}
