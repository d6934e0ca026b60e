//! Inverter-chain output driver. Sizes a buffer chain by logical effort to
//! drive a given load, with three sizing policies trading latency against
//! area.

use log::{error, warn};

use crate::blocks::{BufferDesignTarget, UnitMetrics, AREA_REGION_HEIGHT};
use crate::formula::{
    drain_cap, gate_area, gate_cap, gate_capacitance, gate_leakage, horowitz, on_resistance,
    transconductance, GateType, TransistorType, MAX_INV_CHAIN_LEN, MAX_TRANSISTOR_HEIGHT,
    MIN_NMOS_SIZE, OPT_F,
};
use crate::EvalCtx;

#[derive(Debug, Clone, Default)]
pub struct OutputDriver {
    pub initialized: bool,
    pub invalid: bool,
    pub metrics: UnitMetrics,

    pub logic_effort: f64,
    pub input_cap: f64,
    pub output_cap: f64,
    pub output_res: f64,
    /// Whether the chain inverts the signal polarity.
    pub inv: bool,
    pub num_stage: usize,
    pub area_optimization_level: BufferDesignTarget,
    pub min_driver_current: f64,

    pub width_nmos: [f64; MAX_INV_CHAIN_LEN],
    pub width_pmos: [f64; MAX_INV_CHAIN_LEN],
    pub cap_input: [f64; MAX_INV_CHAIN_LEN],
    pub cap_output: [f64; MAX_INV_CHAIN_LEN],
    pub ramp_input: f64,
    pub ramp_output: f64,
}

impl OutputDriver {
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        &mut self,
        ctx: &EvalCtx,
        logic_effort: f64,
        input_cap: f64,
        output_cap: f64,
        output_res: f64,
        inv: bool,
        area_optimization_level: BufferDesignTarget,
        min_driver_current: f64,
    ) {
        if self.initialized {
            warn!("[output driver] already initialized");
        }
        self.logic_effort = logic_effort;
        self.input_cap = input_cap;
        self.output_cap = output_cap;
        self.output_res = output_res;
        self.inv = inv;
        self.area_optimization_level = area_optimization_level;
        self.min_driver_current = min_driver_current;

        let tech = ctx.tech;
        let f = tech.feature_size;
        let min_nmos = MIN_NMOS_SIZE * f;
        let max_nmos = ctx.cfg.max_nmos_size * f;
        let min_driver_width = if min_driver_current > 0.0 {
            min_driver_current / tech.current_on_nmos(ctx.cfg.temperature)
        } else {
            0.0
        };
        if min_driver_width > max_nmos {
            // no legal device can source the required write current
            self.invalid = true;
            self.initialized = true;
            return;
        }

        let big_f = (logic_effort * output_cap / input_cap).max(1.0);
        self.num_stage = match area_optimization_level {
            BufferDesignTarget::LatencyFirst => {
                ((big_f.ln() / OPT_F.ln()).ceil() as usize).max(1)
            }
            BufferDesignTarget::LatencyAreaTradeOff => 2,
            BufferDesignTarget::AreaFirst => 1,
        };
        if self.num_stage > MAX_INV_CHAIN_LEN {
            self.invalid = true;
            self.initialized = true;
            return;
        }

        let stage_effort = big_f.powf(1.0 / self.num_stage as f64);
        let cap_per_width = gate_cap(1.0, tech);
        for i in 0..self.num_stage {
            // size backward from the load: stage i sees F^((i+1)/n) of it
            let cap_in = output_cap / stage_effort.powi((self.num_stage - i) as i32);
            let mut w_n = cap_in / ((1.0 + tech.pn_size_ratio) * cap_per_width);
            w_n = w_n.clamp(min_nmos, max_nmos);
            self.width_nmos[i] = w_n;
            self.width_pmos[i] = tech.pn_size_ratio * w_n;
        }
        let last = self.num_stage - 1;
        if self.width_nmos[last] < min_driver_width {
            self.width_nmos[last] = min_driver_width.min(max_nmos);
            self.width_pmos[last] = tech.pn_size_ratio * self.width_nmos[last];
        }

        self.initialized = true;
    }

    pub fn calculate_area(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[output driver] calculate_area before initialize");
            return;
        }
        if self.invalid {
            self.metrics.invalidate();
            return;
        }
        let region = ctx.tech.feature_size * AREA_REGION_HEIGHT;
        let mut total_height: f64 = 0.0;
        let mut total_width = 0.0;
        for i in 0..self.num_stage {
            let (h, w) = gate_area(
                GateType::Inv,
                1,
                self.width_nmos[i],
                self.width_pmos[i],
                region,
                ctx.tech,
            );
            total_height = total_height.max(h);
            total_width += w;
        }
        self.metrics.height = total_height;
        self.metrics.width = total_width;
        self.metrics.area = total_height * total_width;
    }

    pub fn calculate_rc(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[output driver] calculate_rc before initialize");
            return;
        }
        if self.invalid {
            return;
        }
        let region = ctx.tech.feature_size * MAX_TRANSISTOR_HEIGHT;
        for i in 0..self.num_stage {
            let (ci, co) = gate_capacitance(
                GateType::Inv,
                1,
                self.width_nmos[i],
                self.width_pmos[i],
                region,
                ctx.tech,
            );
            self.cap_input[i] = ci;
            self.cap_output[i] = co;
        }
    }

    pub fn calculate_latency(&mut self, ctx: &EvalCtx, ramp_input: f64) {
        if !self.initialized {
            error!("[output driver] calculate_latency before initialize");
            return;
        }
        if self.invalid {
            self.metrics.invalidate();
            return;
        }
        self.ramp_input = ramp_input;
        let mut ramp = ramp_input;
        let mut latency = 0.0;
        for i in 0..self.num_stage {
            let res_pull_down = on_resistance(
                self.width_nmos[i],
                TransistorType::Nmos,
                ctx.cfg.temperature,
                ctx.tech,
            );
            let tr = if i == self.num_stage - 1 {
                let c = self.cap_output[i] + self.output_cap;
                res_pull_down * c + self.output_res * self.output_cap / 2.0
            } else {
                let c = self.cap_output[i] + self.cap_input[i + 1];
                res_pull_down * c
            };
            let gm = transconductance(self.width_nmos[i], TransistorType::Nmos, ctx.tech);
            let beta = 1.0 / (res_pull_down * gm);
            let (delay, ramp_out) = horowitz(tr, beta, ramp);
            latency += delay;
            ramp = ramp_out;
        }
        self.metrics.read_latency = latency;
        self.metrics.write_latency = latency;
        self.ramp_output = ramp;
    }

    pub fn calculate_power(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[output driver] calculate_power before initialize");
            return;
        }
        if self.invalid {
            self.metrics.invalidate();
            return;
        }
        let vdd = ctx.tech.vdd;
        let mut energy = 0.0;
        let mut leakage = 0.0;
        for i in 0..self.num_stage {
            let cap_load = if i == self.num_stage - 1 {
                self.cap_output[i] + self.output_cap
            } else {
                self.cap_output[i] + self.cap_input[i + 1]
            };
            energy += cap_load * vdd * vdd;
            leakage += gate_leakage(
                GateType::Inv,
                1,
                self.width_nmos[i],
                self.width_pmos[i],
                ctx.cfg.temperature,
                ctx.tech,
            ) * vdd;
        }
        self.metrics.read_dynamic_energy = energy;
        self.metrics.write_dynamic_energy = energy;
        self.metrics.leakage = leakage;
    }

    /// Input capacitance of the first chain stage, as seen by the driving
    /// gate.
    pub fn first_stage_input_cap(&self) -> f64 {
        self.cap_input[0]
    }

    /// Drain capacitance presented on the output node by the last stage.
    pub fn last_stage_output_cap(&self, ctx: &EvalCtx) -> f64 {
        let last = self.num_stage.saturating_sub(1);
        drain_cap(
            self.width_nmos[last],
            TransistorType::Nmos,
            ctx.tech.feature_size * MAX_TRANSISTOR_HEIGHT,
            ctx.tech,
        ) + drain_cap(
            self.width_pmos[last],
            TransistorType::Pmos,
            ctx.tech.feature_size * MAX_TRANSISTOR_HEIGHT,
            ctx.tech,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::tests::fixture;
    use crate::INFINITE_RAMP;

    #[test]
    fn chain_grows_with_load() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let cap_in = gate_cap(MIN_NMOS_SIZE * ctx.tech.feature_size, ctx.tech);

        let mut small = OutputDriver::default();
        small.initialize(&ctx, 1.0, cap_in, cap_in * 8.0, 0.0, true, BufferDesignTarget::LatencyFirst, 0.0);
        let mut large = OutputDriver::default();
        large.initialize(&ctx, 1.0, cap_in, cap_in * 4000.0, 0.0, true, BufferDesignTarget::LatencyFirst, 0.0);

        assert!(!small.invalid && !large.invalid);
        assert!(large.num_stage > small.num_stage);
    }

    #[test]
    fn evaluates_to_positive_metrics() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let cap_in = gate_cap(MIN_NMOS_SIZE * ctx.tech.feature_size, ctx.tech);
        let mut drv = OutputDriver::default();
        drv.initialize(&ctx, 1.0, cap_in, cap_in * 100.0, 10.0, true, BufferDesignTarget::LatencyFirst, 0.0);
        drv.calculate_area(&ctx);
        drv.calculate_rc(&ctx);
        drv.calculate_latency(&ctx, INFINITE_RAMP);
        drv.calculate_power(&ctx);
        assert!(drv.metrics.area > 0.0);
        assert!(drv.metrics.read_latency > 0.0);
        assert!(drv.metrics.read_dynamic_energy > 0.0);
        assert!(drv.metrics.leakage > 0.0);
        assert!(drv.ramp_output > 0.0);
    }

    #[test]
    fn impossible_drive_current_is_invalid() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let cap_in = gate_cap(MIN_NMOS_SIZE * ctx.tech.feature_size, ctx.tech);
        let mut drv = OutputDriver::default();
        // far beyond what the widest legal device can source
        drv.initialize(&ctx, 1.0, cap_in, cap_in * 10.0, 0.0, true, BufferDesignTarget::LatencyFirst, 1.0);
        assert!(drv.invalid);
        drv.calculate_area(&ctx);
        assert!(drv.metrics.is_invalidated());
    }

    #[test]
    fn area_first_uses_single_stage() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let cap_in = gate_cap(MIN_NMOS_SIZE * ctx.tech.feature_size, ctx.tech);
        let mut drv = OutputDriver::default();
        drv.initialize(&ctx, 1.0, cap_in, cap_in * 1000.0, 0.0, true, BufferDesignTarget::AreaFirst, 0.0);
        assert_eq!(drv.num_stage, 1);
    }
}
