//! Tag comparator: four quarter comparators, each a fixed inverter chain
//! discharging a dynamic match line through per-bit NAND compare stacks.

use log::{error, warn};

use crate::blocks::{UnitMetrics, AREA_REGION_HEIGHT};
use crate::formula::{
    drain_cap, gate_area, gate_capacitance, gate_leakage, horowitz, on_resistance,
    transconductance, GateType, TransistorType, MAX_TRANSISTOR_HEIGHT,
};
use crate::EvalCtx;

const INV_CHAIN_LEN: usize = 4;
const NUM_QUARTERS: usize = 4;

#[derive(Debug, Clone, Default)]
pub struct Comparator {
    pub initialized: bool,
    pub metrics: UnitMetrics,

    /// Tag bits handled by one quarter comparator.
    pub num_tag_bits: usize,
    pub cap_load: f64,
    pub width_nmos_inv: [f64; INV_CHAIN_LEN],
    pub width_pmos_inv: [f64; INV_CHAIN_LEN],
    pub width_nmos_comp: f64,
    pub width_pmos_comp: f64,
    pub cap_input: [f64; INV_CHAIN_LEN],
    pub cap_output: [f64; INV_CHAIN_LEN],
    pub cap_bottom: f64,
    pub cap_top: f64,
    pub res_bottom: f64,
    pub res_top: f64,
    pub ramp_input: f64,
    pub ramp_output: f64,
}

impl Comparator {
    /// `num_tag_bits` is rounded up to a multiple of four by the caller.
    pub fn initialize(&mut self, ctx: &EvalCtx, num_tag_bits: usize, cap_load: f64) {
        if self.initialized {
            warn!("[comparator] already initialized");
        }
        self.num_tag_bits = num_tag_bits / NUM_QUARTERS;
        self.cap_load = cap_load;
        let f = ctx.tech.feature_size;
        self.width_nmos_inv = [7.5 * f, 15.0 * f, 30.0 * f, 50.0 * f];
        self.width_pmos_inv = [12.5 * f, 25.0 * f, 50.0 * f, 100.0 * f];
        self.width_nmos_comp = 12.5 * f;
        self.width_pmos_comp = 37.5 * f;
        self.initialized = true;
    }

    pub fn calculate_area(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[comparator] calculate_area before initialize");
            return;
        }
        let region = ctx.tech.feature_size * AREA_REGION_HEIGHT;
        let mut total_height: f64 = 0.0;
        let mut total_width = 0.0;
        for i in 0..INV_CHAIN_LEN {
            let (h, w) = gate_area(
                GateType::Inv,
                1,
                self.width_nmos_inv[i],
                self.width_pmos_inv[i],
                region,
                ctx.tech,
            );
            total_height = total_height.max(h);
            total_width += w;
        }
        let (h, w) = gate_area(GateType::Nand, 2, self.width_nmos_comp, 0.0, region, ctx.tech);
        total_height += h;
        total_width = total_width.max(self.num_tag_bits as f64 * w);
        // quarters placed side by side
        self.metrics.height = total_height;
        self.metrics.width = total_width * NUM_QUARTERS as f64;
        self.metrics.area = self.metrics.height * self.metrics.width;
    }

    pub fn calculate_rc(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[comparator] calculate_rc before initialize");
            return;
        }
        let region = ctx.tech.feature_size * MAX_TRANSISTOR_HEIGHT;
        for i in 0..INV_CHAIN_LEN {
            let (ci, co) = gate_capacitance(
                GateType::Inv,
                1,
                self.width_nmos_inv[i],
                self.width_pmos_inv[i],
                region,
                ctx.tech,
            );
            self.cap_input[i] = ci;
            self.cap_output[i] = co;
        }
        let (_, cap_comp) = gate_capacitance(
            GateType::Nand,
            2,
            self.width_nmos_comp,
            0.0,
            ctx.tech.feature_size * AREA_REGION_HEIGHT,
            ctx.tech,
        );
        self.cap_bottom =
            self.cap_output[INV_CHAIN_LEN - 1] + self.num_tag_bits as f64 * cap_comp;
        self.cap_top = self.num_tag_bits as f64 * cap_comp
            + drain_cap(self.width_pmos_comp, TransistorType::Pmos, region, ctx.tech)
            + self.cap_load;
        self.res_bottom = on_resistance(
            self.width_nmos_inv[INV_CHAIN_LEN - 1],
            TransistorType::Nmos,
            ctx.cfg.temperature,
            ctx.tech,
        );
        self.res_top = 2.0
            * on_resistance(
                self.width_nmos_comp,
                TransistorType::Nmos,
                ctx.cfg.temperature,
                ctx.tech,
            );
    }

    pub fn calculate_latency(&mut self, ctx: &EvalCtx, ramp_input: f64) {
        if !self.initialized {
            error!("[comparator] calculate_latency before initialize");
            return;
        }
        self.ramp_input = ramp_input;
        let mut ramp = ramp_input;
        let mut latency = 0.0;
        for i in 0..INV_CHAIN_LEN - 1 {
            let res_pull_down = on_resistance(
                self.width_nmos_inv[i],
                TransistorType::Nmos,
                ctx.cfg.temperature,
                ctx.tech,
            );
            let cap_node = self.cap_output[i] + self.cap_input[i + 1];
            let tr = res_pull_down * cap_node;
            let gm = transconductance(self.width_nmos_inv[i], TransistorType::Nmos, ctx.tech);
            let beta = 1.0 / (res_pull_down * gm);
            let (delay, ramp_out) = horowitz(tr, beta, ramp);
            latency += delay;
            ramp = ramp_out;
        }
        // two-node discharge through the compare stacks
        let tr = self.res_bottom * self.cap_bottom + (self.res_bottom + self.res_top) * self.cap_top;
        let (delay, ramp_out) = horowitz(tr, 0.0, ramp);
        latency += delay;
        self.ramp_output = ramp_out;
        self.metrics.read_latency = latency;
        self.metrics.write_latency = latency;
    }

    pub fn calculate_power(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[comparator] calculate_power before initialize");
            return;
        }
        let vdd = ctx.tech.vdd;
        let mut leakage = 0.0;
        for i in 0..INV_CHAIN_LEN {
            leakage += gate_leakage(
                GateType::Inv,
                1,
                self.width_nmos_inv[i],
                self.width_pmos_inv[i],
                ctx.cfg.temperature,
                ctx.tech,
            ) * vdd;
        }
        leakage += self.num_tag_bits as f64
            * gate_leakage(
                GateType::Nand,
                2,
                self.width_nmos_comp,
                0.0,
                ctx.cfg.temperature,
                ctx.tech,
            )
            * vdd;
        self.metrics.leakage = leakage * NUM_QUARTERS as f64;

        let mut energy = 0.0;
        for i in 0..INV_CHAIN_LEN - 1 {
            let cap_node = self.cap_output[i] + self.cap_input[i + 1];
            energy += cap_node * vdd * vdd;
        }
        energy += (self.cap_bottom + self.cap_top) * vdd * vdd;
        self.metrics.read_dynamic_energy = energy * NUM_QUARTERS as f64;
        self.metrics.write_dynamic_energy = self.metrics.read_dynamic_energy;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::tests::fixture;
    use crate::INFINITE_RAMP;

    fn evaluate(cmp: &mut Comparator, ctx: &EvalCtx) {
        cmp.calculate_area(ctx);
        cmp.calculate_rc(ctx);
        cmp.calculate_latency(ctx, INFINITE_RAMP);
        cmp.calculate_power(ctx);
    }

    #[test]
    fn splits_tag_bits_across_quarters() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut cmp = Comparator::default();
        cmp.initialize(&ctx, 24, 5e-15);
        assert_eq!(cmp.num_tag_bits, 6);
    }

    #[test]
    fn produces_positive_metrics() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut cmp = Comparator::default();
        cmp.initialize(&ctx, 24, 5e-15);
        evaluate(&mut cmp, &ctx);
        assert!(cmp.metrics.area > 0.0);
        assert!(cmp.metrics.read_latency > 0.0);
        assert!(cmp.metrics.read_dynamic_energy > 0.0);
        assert!(cmp.metrics.leakage > 0.0);
        assert!(cmp.ramp_output > 0.0);
    }

    #[test]
    fn wider_tags_cost_more() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut short = Comparator::default();
        short.initialize(&ctx, 16, 5e-15);
        evaluate(&mut short, &ctx);
        let mut long = Comparator::default();
        long.initialize(&ctx, 48, 5e-15);
        evaluate(&mut long, &ctx);
        assert!(long.metrics.read_latency > short.metrics.read_latency);
        assert!(long.metrics.read_dynamic_energy > short.metrics.read_dynamic_energy);
        assert!(long.metrics.leakage > short.metrics.leakage);
    }
}
