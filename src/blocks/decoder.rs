//! Address decoders. [`BasicDecoder`] is the 1-of-N stage used inside
//! predecoder blocks; [`RowDecoder`] combines predecoder outputs into a
//! one-hot wordline (or way) select and drives the line.

use log::error;

use crate::blocks::driver::OutputDriver;
use crate::blocks::{BufferDesignTarget, UnitMetrics, AREA_REGION_HEIGHT};
use crate::cell::MemCellType;
use crate::formula::{
    gate_area, gate_cap, gate_capacitance, gate_leakage, horowitz, on_resistance,
    transconductance, GateType, TransistorType, MAX_TRANSISTOR_HEIGHT, MIN_NMOS_SIZE,
};
use crate::EvalCtx;

/// NAND widths and logical effort for a decoder stage with `num_input`
/// series NMOS devices.
fn nand_stage(num_input: usize, ctx: &EvalCtx) -> (f64, f64, f64) {
    let f = ctx.tech.feature_size;
    let pn = ctx.tech.pn_size_ratio;
    let width_nand_n = num_input as f64 * MIN_NMOS_SIZE * f;
    let width_nand_p = pn * MIN_NMOS_SIZE * f;
    let logic_effort = (num_input as f64 + pn) / (1.0 + pn);
    (width_nand_n, width_nand_p, logic_effort)
}

/// 1-of-2, 1-of-4, or 1-of-8 decoder over one, two, or three address bits.
/// The single-bit flavor degenerates to a complementary inverter pair.
#[derive(Debug, Clone, Default)]
pub struct BasicDecoder {
    pub initialized: bool,
    pub metrics: UnitMetrics,

    pub num_nand_input: usize,
    pub num_nand_gate: usize,
    pub cap_load: f64,
    pub res_load: f64,
    pub width_nand_n: f64,
    pub width_nand_p: f64,
    pub cap_nand_input: f64,
    pub cap_nand_output: f64,
    pub output_driver: OutputDriver,
    pub ramp_input: f64,
    pub ramp_output: f64,
}

impl BasicDecoder {
    /// May be re-initialized by the owning predecoder block while it
    /// searches for a good bit grouping.
    pub fn initialize(&mut self, ctx: &EvalCtx, num_address_bit: usize, cap_load: f64, res_load: f64) {
        self.num_nand_input = if num_address_bit == 1 { 0 } else { num_address_bit };
        self.cap_load = cap_load;
        self.res_load = res_load;

        if self.num_nand_input == 0 {
            self.num_nand_gate = 0;
            let f = ctx.tech.feature_size;
            self.width_nand_n = MIN_NMOS_SIZE * f;
            self.width_nand_p = ctx.tech.pn_size_ratio * MIN_NMOS_SIZE * f;
            let cap_inv =
                gate_cap(self.width_nand_n, ctx.tech) + gate_cap(self.width_nand_p, ctx.tech);
            self.output_driver.initialize(
                ctx,
                1.0,
                cap_inv,
                cap_load,
                res_load,
                true,
                BufferDesignTarget::LatencyFirst,
                0.0,
            );
        } else {
            self.num_nand_gate = 1 << self.num_nand_input;
            let (wn, wp, le) = nand_stage(self.num_nand_input, ctx);
            self.width_nand_n = wn;
            self.width_nand_p = wp;
            let cap_nand = gate_cap(wn, ctx.tech) + gate_cap(wp, ctx.tech);
            self.output_driver.initialize(
                ctx,
                le,
                cap_nand,
                cap_load,
                res_load,
                true,
                BufferDesignTarget::LatencyFirst,
                0.0,
            );
        }
        self.initialized = true;
    }

    pub fn calculate_area(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[basic decoder] calculate_area before initialize");
            return;
        }
        self.output_driver.calculate_area(ctx);
        if self.num_nand_input == 0 {
            self.metrics.height = 2.0 * self.output_driver.metrics.height;
            self.metrics.width = self.output_driver.metrics.width;
        } else {
            let (h_nand, w_nand) = gate_area(
                GateType::Nand,
                self.num_nand_input,
                self.width_nand_n,
                self.width_nand_p,
                ctx.tech.feature_size * AREA_REGION_HEIGHT,
                ctx.tech,
            );
            self.metrics.height =
                h_nand.max(self.output_driver.metrics.height) * self.num_nand_gate as f64;
            self.metrics.width = w_nand + self.output_driver.metrics.width;
        }
        self.metrics.area = self.metrics.height * self.metrics.width;
    }

    pub fn calculate_rc(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[basic decoder] calculate_rc before initialize");
            return;
        }
        self.output_driver.calculate_rc(ctx);
        if self.num_nand_input > 0 {
            let (ci, co) = gate_capacitance(
                GateType::Nand,
                self.num_nand_input,
                self.width_nand_n,
                self.width_nand_p,
                ctx.tech.feature_size * MAX_TRANSISTOR_HEIGHT,
                ctx.tech,
            );
            self.cap_nand_input = ci;
            self.cap_nand_output = co;
        }
    }

    pub fn calculate_latency(&mut self, ctx: &EvalCtx, ramp_input: f64) {
        if !self.initialized {
            error!("[basic decoder] calculate_latency before initialize");
            return;
        }
        self.ramp_input = ramp_input;
        if self.num_nand_input == 0 {
            self.output_driver.calculate_latency(ctx, ramp_input);
            self.metrics.read_latency = self.output_driver.metrics.read_latency;
        } else {
            let res_pull_down = on_resistance(
                self.width_nand_n,
                TransistorType::Nmos,
                ctx.cfg.temperature,
                ctx.tech,
            ) * self.num_nand_input as f64;
            let cap_load = self.cap_nand_output + self.output_driver.first_stage_input_cap();
            let tr = res_pull_down * cap_load;
            let gm = transconductance(self.width_nand_n, TransistorType::Nmos, ctx.tech);
            let beta = 1.0 / (res_pull_down * gm);
            let (delay, ramp_for_driver) = horowitz(tr, beta, ramp_input);
            self.output_driver.calculate_latency(ctx, ramp_for_driver);
            self.metrics.read_latency = delay + self.output_driver.metrics.read_latency;
        }
        self.metrics.write_latency = self.metrics.read_latency;
        self.ramp_output = self.output_driver.ramp_output;
    }

    pub fn calculate_power(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[basic decoder] calculate_power before initialize");
            return;
        }
        self.output_driver.calculate_power(ctx);
        let vdd = ctx.tech.vdd;
        if self.num_nand_input == 0 {
            self.metrics.leakage = 2.0 * self.output_driver.metrics.leakage;
            let cap_load =
                self.output_driver.first_stage_input_cap() + self.output_driver.cap_output[0];
            self.metrics.read_dynamic_energy =
                cap_load * vdd * vdd + self.output_driver.metrics.read_dynamic_energy;
        } else {
            let mut leakage = gate_leakage(
                GateType::Nand,
                self.num_nand_input,
                self.width_nand_n,
                self.width_nand_p,
                ctx.cfg.temperature,
                ctx.tech,
            ) * vdd;
            leakage += self.output_driver.metrics.leakage;
            self.metrics.leakage = leakage * self.num_nand_gate as f64;
            let cap_load = self.cap_nand_output + self.output_driver.first_stage_input_cap();
            // only one output switches per access
            self.metrics.read_dynamic_energy =
                cap_load * vdd * vdd + self.output_driver.metrics.read_dynamic_energy;
        }
        self.metrics.write_dynamic_energy = self.metrics.read_dynamic_energy;
    }
}

/// Final decode stage in front of the wordlines. Rows beyond 8 need two or
/// three predecoder outputs NANDed together; small arrays use the
/// predecoder outputs directly.
#[derive(Debug, Clone, Default)]
pub struct RowDecoder {
    pub initialized: bool,
    pub invalid: bool,
    pub metrics: UnitMetrics,

    pub num_row: usize,
    pub multiple_row_per_set: bool,
    pub num_nand_input: usize,
    pub cap_load: f64,
    pub res_load: f64,
    pub area_optimization_level: BufferDesignTarget,
    pub min_driver_current: f64,
    pub width_nand_n: f64,
    pub width_nand_p: f64,
    pub cap_nand_input: f64,
    pub cap_nand_output: f64,
    pub output_driver: OutputDriver,
    pub ramp_input: f64,
    pub ramp_output: f64,
}

impl RowDecoder {
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        &mut self,
        ctx: &EvalCtx,
        num_row: usize,
        cap_load: f64,
        res_load: f64,
        multiple_row_per_set: bool,
        area_optimization_level: BufferDesignTarget,
        min_driver_current: f64,
    ) {
        self.num_row = num_row;
        self.cap_load = cap_load;
        self.res_load = res_load;
        self.multiple_row_per_set = multiple_row_per_set;
        self.area_optimization_level = area_optimization_level;
        self.min_driver_current = min_driver_current;

        self.num_nand_input = if num_row <= 8 {
            // predecoder output drives the wordline directly, unless a
            // way select has to be folded in
            if multiple_row_per_set {
                2
            } else {
                0
            }
        } else if multiple_row_per_set {
            3
        } else {
            2
        };

        if self.num_nand_input > 0 {
            let (wn, wp, le) = nand_stage(self.num_nand_input, ctx);
            self.width_nand_n = wn;
            self.width_nand_p = wp;
            let cap_nand = gate_cap(wn, ctx.tech) + gate_cap(wp, ctx.tech);
            self.output_driver.initialize(
                ctx,
                le,
                cap_nand,
                cap_load,
                res_load,
                true,
                area_optimization_level,
                min_driver_current,
            );
        } else {
            let f = ctx.tech.feature_size;
            self.width_nand_n = MIN_NMOS_SIZE * f;
            self.width_nand_p = ctx.tech.pn_size_ratio * MIN_NMOS_SIZE * f;
            let cap_inv =
                gate_cap(self.width_nand_n, ctx.tech) + gate_cap(self.width_nand_p, ctx.tech);
            self.output_driver.initialize(
                ctx,
                1.0,
                cap_inv,
                cap_load,
                res_load,
                true,
                area_optimization_level,
                min_driver_current,
            );
        }

        if self.output_driver.invalid {
            self.invalid = true;
            return;
        }
        self.initialized = true;
    }

    pub fn calculate_area(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[row decoder] calculate_area before initialize");
            return;
        }
        self.output_driver.calculate_area(ctx);
        if self.num_nand_input == 0 {
            self.metrics.height = self.output_driver.metrics.height;
            self.metrics.width = self.output_driver.metrics.width;
        } else {
            let (h_nand, w_nand) = gate_area(
                GateType::Nand,
                self.num_nand_input,
                self.width_nand_n,
                self.width_nand_p,
                ctx.tech.feature_size * AREA_REGION_HEIGHT,
                ctx.tech,
            );
            self.metrics.height = h_nand.max(self.output_driver.metrics.height);
            self.metrics.width = w_nand + self.output_driver.metrics.width;
        }
        self.metrics.height *= self.num_row as f64;
        self.metrics.area = self.metrics.height * self.metrics.width;
    }

    pub fn calculate_rc(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[row decoder] calculate_rc before initialize");
            return;
        }
        self.output_driver.calculate_rc(ctx);
        if self.num_nand_input == 0 {
            self.cap_nand_input = 0.0;
            self.cap_nand_output = 0.0;
        } else {
            let (ci, co) = gate_capacitance(
                GateType::Nand,
                self.num_nand_input,
                self.width_nand_n,
                self.width_nand_p,
                ctx.tech.feature_size * MAX_TRANSISTOR_HEIGHT,
                ctx.tech,
            );
            self.cap_nand_input = ci;
            self.cap_nand_output = co;
        }
    }

    pub fn calculate_latency(&mut self, ctx: &EvalCtx, ramp_input: f64) {
        if !self.initialized {
            error!("[row decoder] calculate_latency before initialize");
            return;
        }
        self.ramp_input = ramp_input;
        if self.num_nand_input == 0 {
            self.output_driver.calculate_latency(ctx, ramp_input);
            self.metrics.read_latency = self.output_driver.metrics.read_latency;
        } else {
            let res_pull_down = on_resistance(
                self.width_nand_n,
                TransistorType::Nmos,
                ctx.cfg.temperature,
                ctx.tech,
            ) * self.num_nand_input as f64;
            let cap_load = self.cap_nand_output + self.output_driver.first_stage_input_cap();
            let tr = res_pull_down * cap_load;
            let gm = transconductance(self.width_nand_n, TransistorType::Nmos, ctx.tech);
            let beta = 1.0 / (res_pull_down * gm);
            let (delay, ramp_for_driver) = horowitz(tr, beta, ramp_input);
            self.output_driver.calculate_latency(ctx, ramp_for_driver);
            self.metrics.read_latency = delay + self.output_driver.metrics.read_latency;
        }
        self.metrics.write_latency = self.metrics.read_latency;
        self.ramp_output = self.output_driver.ramp_output;
    }

    pub fn calculate_power(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[row decoder] calculate_power before initialize");
            return;
        }
        self.output_driver.calculate_power(ctx);
        self.metrics.leakage = self.output_driver.metrics.leakage;
        if self.num_nand_input == 0 {
            self.metrics.read_dynamic_energy = self.output_driver.metrics.read_dynamic_energy;
        } else {
            self.metrics.leakage += gate_leakage(
                GateType::Nand,
                self.num_nand_input,
                self.width_nand_n,
                self.width_nand_p,
                ctx.cfg.temperature,
                ctx.tech,
            ) * ctx.tech.vdd;
            let cap_load = self.cap_nand_output + self.output_driver.first_stage_input_cap();
            // DRAM wordlines are overdriven to the boosted rail
            let swing = match ctx.cell.mem_cell_type {
                MemCellType::Dram | MemCellType::Edram => ctx.tech.vpp,
                _ => ctx.tech.vdd,
            };
            self.metrics.read_dynamic_energy =
                cap_load * swing * swing + self.output_driver.metrics.read_dynamic_energy;
        }
        self.metrics.write_dynamic_energy = self.metrics.read_dynamic_energy;
        self.metrics.leakage *= self.num_row as f64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::tests::fixture;
    use crate::INFINITE_RAMP;

    // a few hundred cells worth of wordline
    fn wordline_load() -> (f64, f64) {
        (50e-15, 5e3)
    }

    #[test]
    fn basic_decoder_two_bits_builds_four_gates() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let (cap, res) = wordline_load();
        let mut dec = BasicDecoder::default();
        dec.initialize(&ctx, 2, cap, res);
        assert_eq!(dec.num_nand_input, 2);
        assert_eq!(dec.num_nand_gate, 4);
        dec.calculate_area(&ctx);
        dec.calculate_rc(&ctx);
        dec.calculate_latency(&ctx, INFINITE_RAMP);
        dec.calculate_power(&ctx);
        assert!(dec.metrics.area > 0.0);
        assert!(dec.metrics.read_latency > 0.0);
        assert!(dec.metrics.leakage > 0.0);
    }

    #[test]
    fn basic_decoder_single_bit_degenerates_to_inverters() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let (cap, res) = wordline_load();
        let mut dec = BasicDecoder::default();
        dec.initialize(&ctx, 1, cap, res);
        assert_eq!(dec.num_nand_input, 0);
        assert_eq!(dec.num_nand_gate, 0);
    }

    #[test]
    fn row_decoder_nand_width_grows_with_rows() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let (cap, res) = wordline_load();
        let mut small = RowDecoder::default();
        small.initialize(&ctx, 8, cap, res, false, BufferDesignTarget::LatencyFirst, 0.0);
        assert_eq!(small.num_nand_input, 0);
        let mut large = RowDecoder::default();
        large.initialize(&ctx, 256, cap, res, false, BufferDesignTarget::LatencyFirst, 0.0);
        assert_eq!(large.num_nand_input, 2);
        let mut ways = RowDecoder::default();
        ways.initialize(&ctx, 256, cap, res, true, BufferDesignTarget::LatencyFirst, 0.0);
        assert_eq!(ways.num_nand_input, 3);
        assert!(ways.width_nand_n > large.width_nand_n);
    }

    #[test]
    fn row_decoder_latency_scales_with_height() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let (cap, res) = wordline_load();
        let mut dec = RowDecoder::default();
        dec.initialize(&ctx, 128, cap, res, false, BufferDesignTarget::LatencyFirst, 0.0);
        assert!(!dec.invalid);
        dec.calculate_area(&ctx);
        dec.calculate_rc(&ctx);
        dec.calculate_latency(&ctx, INFINITE_RAMP);
        dec.calculate_power(&ctx);
        let h128 = dec.metrics.height;

        let mut dec2 = RowDecoder::default();
        dec2.initialize(&ctx, 256, cap, res, false, BufferDesignTarget::LatencyFirst, 0.0);
        dec2.calculate_area(&ctx);
        assert!(dec2.metrics.height > h128);
    }

    #[test]
    fn edram_wordline_energy_uses_boosted_rail() {
        let fx_sram = fixture::sram();
        let fx_edram = fixture::edram();
        let (cap, res) = (50e-15, 5e3);

        let ctx = fx_sram.ctx();
        let mut sram_dec = RowDecoder::default();
        sram_dec.initialize(&ctx, 256, cap, res, false, BufferDesignTarget::LatencyFirst, 0.0);
        sram_dec.calculate_area(&ctx);
        sram_dec.calculate_rc(&ctx);
        sram_dec.calculate_latency(&ctx, INFINITE_RAMP);
        sram_dec.calculate_power(&ctx);

        let ctx = fx_edram.ctx();
        assert!(ctx.tech.vpp > ctx.tech.vdd);
        let mut edram_dec = RowDecoder::default();
        edram_dec.initialize(&ctx, 256, cap, res, false, BufferDesignTarget::LatencyFirst, 0.0);
        edram_dec.calculate_area(&ctx);
        edram_dec.calculate_rc(&ctx);
        edram_dec.calculate_latency(&ctx, INFINITE_RAMP);
        edram_dec.calculate_power(&ctx);
        assert!(edram_dec.metrics.read_dynamic_energy > 0.0);
    }
}
