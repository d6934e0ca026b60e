//! Bitline precharge and equalization row. Each column carries two
//! precharge PMOS devices and one equalizer; a shared enable inverter plus
//! buffer chain drives all of their gates.

use log::{error, warn};

use crate::blocks::driver::OutputDriver;
use crate::blocks::{BufferDesignTarget, UnitMetrics, AREA_REGION_HEIGHT};
use crate::formula::{
    drain_cap, gate_area, gate_cap, gate_capacitance, gate_leakage, horowitz, on_resistance,
    transconductance, GateType, TransistorType, MAX_TRANSISTOR_HEIGHT, MIN_NMOS_SIZE,
};
use crate::EvalCtx;

#[derive(Debug, Clone, Default)]
pub struct Precharger {
    pub initialized: bool,
    pub metrics: UnitMetrics,

    /// Rail the bitlines are restored to. Unit: V.
    pub voltage_precharge: f64,
    pub num_column: u64,
    pub cap_bitline: f64,
    pub res_bitline: f64,

    pub width_pmos_bitline_precharger: f64,
    pub width_pmos_bitline_equal: f64,
    pub width_inv_nmos: f64,
    pub width_inv_pmos: f64,
    pub output_driver: OutputDriver,

    pub cap_load_per_column: f64,
    pub cap_load_inv: f64,
    /// Drain cap the precharge devices add to each bitline.
    pub cap_output_bitline_precharger: f64,
    pub cap_inv_input: f64,
    pub cap_inv_output: f64,
    /// Time for the enable signal to reach the gates.
    pub enable_latency: f64,
    pub ramp_input: f64,
    pub ramp_output: f64,
}

impl Precharger {
    pub fn initialize(
        &mut self,
        ctx: &EvalCtx,
        voltage_precharge: f64,
        num_column: u64,
        cap_bitline: f64,
        res_bitline: f64,
    ) {
        if self.initialized {
            warn!("[precharger] already initialized");
        }
        self.voltage_precharge = voltage_precharge;
        self.num_column = num_column;
        self.cap_bitline = cap_bitline;
        self.res_bitline = res_bitline;

        let f = ctx.tech.feature_size;
        self.width_pmos_bitline_precharger = 6.0 * MIN_NMOS_SIZE * f;
        self.width_pmos_bitline_equal = MIN_NMOS_SIZE * f;
        self.width_inv_nmos = MIN_NMOS_SIZE * f;
        self.width_inv_pmos = ctx.tech.pn_size_ratio * MIN_NMOS_SIZE * f;

        self.cap_load_per_column = 2.0 * gate_cap(self.width_pmos_bitline_precharger, ctx.tech)
            + gate_cap(self.width_pmos_bitline_equal, ctx.tech);
        self.cap_load_inv = num_column as f64 * self.cap_load_per_column;

        let cap_inv =
            gate_cap(self.width_inv_nmos, ctx.tech) + gate_cap(self.width_inv_pmos, ctx.tech);
        self.output_driver.initialize(
            ctx,
            1.0,
            cap_inv,
            self.cap_load_inv,
            0.0,
            false,
            BufferDesignTarget::LatencyFirst,
            0.0,
        );
        self.initialized = true;
    }

    pub fn calculate_area(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[precharger] calculate_area before initialize");
            return;
        }
        self.output_driver.calculate_area(ctx);
        let region = ctx.tech.feature_size * AREA_REGION_HEIGHT;
        let (h_pre, w_pre) = gate_area(
            GateType::Inv,
            1,
            0.0,
            self.width_pmos_bitline_precharger,
            region,
            ctx.tech,
        );
        let (h_eq, w_eq) = gate_area(
            GateType::Inv,
            1,
            0.0,
            self.width_pmos_bitline_equal,
            region,
            ctx.tech,
        );
        let (h_inv, w_inv) = gate_area(
            GateType::Inv,
            1,
            self.width_inv_nmos,
            self.width_inv_pmos,
            region,
            ctx.tech,
        );
        let column_width = (2.0 * w_pre + w_eq).max(w_inv);
        self.metrics.height = h_pre.max(h_eq) + h_inv + self.output_driver.metrics.height;
        self.metrics.width = column_width * self.num_column as f64;
        self.metrics.area = self.metrics.height * self.metrics.width;
    }

    pub fn calculate_rc(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[precharger] calculate_rc before initialize");
            return;
        }
        self.output_driver.calculate_rc(ctx);
        let region = ctx.tech.feature_size * MAX_TRANSISTOR_HEIGHT;
        self.cap_output_bitline_precharger = drain_cap(
            self.width_pmos_bitline_precharger,
            TransistorType::Pmos,
            region,
            ctx.tech,
        ) + drain_cap(
            self.width_pmos_bitline_equal,
            TransistorType::Pmos,
            region,
            ctx.tech,
        );
        let (ci, co) = gate_capacitance(
            GateType::Inv,
            1,
            self.width_inv_nmos,
            self.width_inv_pmos,
            region,
            ctx.tech,
        );
        self.cap_inv_input = ci;
        self.cap_inv_output = co;
    }

    pub fn calculate_latency(&mut self, ctx: &EvalCtx, ramp_input: f64) {
        if !self.initialized {
            error!("[precharger] calculate_latency before initialize");
            return;
        }
        self.ramp_input = ramp_input;
        // enable inverter into the gate-drive buffer chain
        let res_pull_down = on_resistance(
            self.width_inv_nmos,
            TransistorType::Nmos,
            ctx.cfg.temperature,
            ctx.tech,
        );
        let cap_load = self.cap_inv_output + self.output_driver.first_stage_input_cap();
        let tr = res_pull_down * cap_load;
        let gm = transconductance(self.width_inv_nmos, TransistorType::Nmos, ctx.tech);
        let beta = 1.0 / (res_pull_down * gm);
        let (inv_delay, ramp_for_driver) = horowitz(tr, beta, ramp_input);
        self.output_driver.calculate_latency(ctx, ramp_for_driver);
        self.enable_latency = inv_delay + self.output_driver.metrics.read_latency;

        // restoring the bitline through the precharge PMOS
        let res_pull_up = on_resistance(
            self.width_pmos_bitline_precharger,
            TransistorType::Pmos,
            ctx.cfg.temperature,
            ctx.tech,
        );
        let tau = res_pull_up * (self.cap_bitline + self.cap_output_bitline_precharger)
            + self.res_bitline * self.cap_bitline / 2.0;
        let gm_pre = transconductance(
            self.width_pmos_bitline_precharger,
            TransistorType::Pmos,
            ctx.tech,
        );
        let beta_pre = 1.0 / (res_pull_up * gm_pre);
        let (precharge_delay, ramp_out) = horowitz(tau, beta_pre, self.output_driver.ramp_output);
        self.metrics.read_latency = self.enable_latency + precharge_delay;
        self.metrics.write_latency = self.metrics.read_latency;
        self.metrics.refresh_latency = self.metrics.read_latency;
        self.ramp_output = ramp_out;
    }

    pub fn calculate_power(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[precharger] calculate_power before initialize");
            return;
        }
        self.output_driver.calculate_power(ctx);
        let vdd = ctx.tech.vdd;
        // gate switching of every column's precharge devices; restoring the
        // bitline charge itself is accounted with the bitlines
        let mut energy = self.cap_load_inv * vdd * vdd;
        energy += (self.cap_inv_input + self.cap_inv_output) * vdd * vdd;
        energy += self.output_driver.metrics.read_dynamic_energy;
        self.metrics.read_dynamic_energy = energy;
        self.metrics.write_dynamic_energy = energy;
        self.metrics.refresh_dynamic_energy = energy;

        let mut leakage = self.output_driver.metrics.leakage;
        leakage += gate_leakage(
            GateType::Inv,
            1,
            self.width_inv_nmos,
            self.width_inv_pmos,
            ctx.cfg.temperature,
            ctx.tech,
        ) * vdd;
        self.metrics.leakage = leakage;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::tests::fixture;
    use crate::INFINITE_RAMP;

    fn evaluate(pre: &mut Precharger, ctx: &EvalCtx) {
        pre.calculate_area(ctx);
        pre.calculate_rc(ctx);
        pre.calculate_latency(ctx, INFINITE_RAMP);
        pre.calculate_power(ctx);
    }

    #[test]
    fn produces_positive_metrics() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut pre = Precharger::default();
        pre.initialize(&ctx, ctx.tech.vdd, 128, 60e-15, 8e3);
        evaluate(&mut pre, &ctx);
        assert!(pre.metrics.area > 0.0);
        assert!(pre.enable_latency > 0.0);
        assert!(pre.metrics.read_latency > pre.enable_latency);
        assert!(pre.metrics.read_dynamic_energy > 0.0);
        assert!(pre.metrics.leakage > 0.0);
    }

    #[test]
    fn heavier_bitline_precharges_slower() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut light = Precharger::default();
        light.initialize(&ctx, ctx.tech.vdd, 128, 30e-15, 4e3);
        evaluate(&mut light, &ctx);
        let mut heavy = Precharger::default();
        heavy.initialize(&ctx, ctx.tech.vdd, 128, 120e-15, 16e3);
        evaluate(&mut heavy, &ctx);
        assert!(heavy.metrics.read_latency > light.metrics.read_latency);
    }

    #[test]
    fn more_columns_cost_more_energy_and_width() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut narrow = Precharger::default();
        narrow.initialize(&ctx, ctx.tech.vdd, 64, 60e-15, 8e3);
        evaluate(&mut narrow, &ctx);
        let mut wide = Precharger::default();
        wide.initialize(&ctx, ctx.tech.vdd, 256, 60e-15, 8e3);
        evaluate(&mut wide, &ctx);
        assert!(wide.metrics.width > narrow.metrics.width);
        assert!(wide.metrics.read_dynamic_energy > narrow.metrics.read_dynamic_energy);
    }
}
