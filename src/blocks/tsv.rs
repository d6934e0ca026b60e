//! Through-silicon via with an optional inverter chain driving it. The
//! chain is sized by logical effort against the via's parasitic load; an
//! unbuffered via is just an RC hop.

use log::{error, warn};

use crate::blocks::UnitMetrics;
use crate::formula::{
    drain_cap, gate_area, gate_cap, gate_capacitance, gate_leakage, horowitz, logical_effort,
    on_resistance, GateType, TransistorType, MAX_NUMBER_GATES_STAGE, MAX_TRANSISTOR_HEIGHT,
    MIN_NMOS_SIZE,
};
use crate::tech::TsvType;
use crate::EvalCtx;

#[derive(Debug, Clone)]
pub struct Tsv {
    pub initialized: bool,
    pub invalid: bool,
    pub metrics: UnitMetrics,

    pub tsv_type: TsvType,
    pub num_gates: usize,
    pub w_tsv_n: [f64; MAX_NUMBER_GATES_STAGE],
    pub w_tsv_p: [f64; MAX_NUMBER_GATES_STAGE],
    /// Via parasitics for one crossing.
    pub cap: f64,
    pub res: f64,
    pub c_load_tsv: f64,
    /// Keep-out footprint of the via itself. Unit: m^2.
    pub min_area: f64,
    pub buffer_area: f64,

    pub num_total_bits: u64,
    pub num_access_bits: u64,
    pub num_read_bits: u64,
    pub num_data_bits: u64,
}

impl Default for Tsv {
    fn default() -> Self {
        Tsv {
            initialized: false,
            invalid: true,
            metrics: UnitMetrics::default(),
            tsv_type: TsvType::Fine,
            num_gates: 0,
            w_tsv_n: [0.0; MAX_NUMBER_GATES_STAGE],
            w_tsv_p: [0.0; MAX_NUMBER_GATES_STAGE],
            cap: 0.0,
            res: 0.0,
            c_load_tsv: 0.0,
            min_area: 0.0,
            buffer_area: 0.0,
            num_total_bits: 0,
            num_access_bits: 0,
            num_read_bits: 0,
            num_data_bits: 0,
        }
    }
}

impl Tsv {
    pub fn initialize(&mut self, ctx: &EvalCtx, tsv_type: TsvType, buffered: bool) {
        if self.initialized {
            warn!("[tsv] already initialized");
        }
        self.tsv_type = tsv_type;
        self.invalid = false;

        let tech = ctx.tech;
        let f = tech.feature_size;
        let min_w_pmos = tech.pn_size_ratio * MIN_NMOS_SIZE * f;
        self.cap = tech.cap_tsv[tsv_type as usize];
        self.res = tech.res_tsv[tsv_type as usize];
        self.min_area = tech.area_tsv[tsv_type as usize] * 1e-12;

        if !buffered {
            self.num_gates = 0;
        } else {
            // first stage oversized to pull the chain delay down
            let first_buf_stg_coef = 5.0;
            self.w_tsv_n[0] = MIN_NMOS_SIZE * first_buf_stg_coef * f;
            self.w_tsv_p[0] = self.w_tsv_n[0] * tech.pn_size_ratio;

            self.c_load_tsv = self.cap + gate_cap(MIN_NMOS_SIZE * f + min_w_pmos, tech);
            let big_f = self.c_load_tsv / gate_cap(self.w_tsv_n[0] + self.w_tsv_p[0], tech);
            self.num_gates = logical_effort(
                1,
                1.0,
                big_f,
                &mut self.w_tsv_n,
                &mut self.w_tsv_p,
                self.c_load_tsv,
                tech.pn_size_ratio,
                ctx.cfg.max_nmos_size * f,
                tech,
            );
        }

        self.initialized = true;
        if self.num_gates > MAX_NUMBER_GATES_STAGE {
            self.invalid = true;
        }
    }

    pub fn calculate_area(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[tsv] calculate_area before initialize");
            return;
        }
        if self.invalid {
            self.metrics.invalidate();
            return;
        }
        let tech = ctx.tech;
        let mut cumulative_area = 0.0;
        let mut cumulative_leak = 0.0;
        for i in 0..self.num_gates {
            let (h, w) = gate_area(
                GateType::Inv,
                1,
                self.w_tsv_n[i],
                self.w_tsv_p[i],
                tech.feature_size * MAX_TRANSISTOR_HEIGHT,
                tech,
            );
            cumulative_area += h * w;
            cumulative_leak += gate_leakage(
                GateType::Inv,
                1,
                self.w_tsv_n[i],
                self.w_tsv_p[i],
                ctx.cfg.temperature,
                tech,
            );
        }
        self.metrics.leakage = cumulative_leak * tech.vdd;
        self.buffer_area = cumulative_area;

        let tsv_metal_area = self.min_area * std::f64::consts::PI / 16.0;
        self.metrics.area = if self.buffer_area < self.min_area - tsv_metal_area {
            self.min_area
        } else {
            self.buffer_area + tsv_metal_area
        };
    }

    /// Same via is driven both ways; only the launching ramp differs.
    pub fn calculate_latency_and_power(
        &mut self,
        ctx: &EvalCtx,
        ramp_input_read: f64,
        ramp_input_write: f64,
    ) {
        if !self.initialized {
            error!("[tsv] calculate_latency_and_power before initialize");
            return;
        }
        if self.invalid {
            self.metrics.invalidate();
            return;
        }
        let (read_energy, read_latency) = self.chain_latency_and_energy(ctx, ramp_input_read);
        let (write_energy, write_latency) = self.chain_latency_and_energy(ctx, ramp_input_write);
        self.metrics.read_dynamic_energy = read_energy;
        self.metrics.read_latency = read_latency;
        self.metrics.write_dynamic_energy = write_energy;
        self.metrics.write_latency = write_latency;
        self.metrics.reset_dynamic_energy = write_energy;
        self.metrics.set_dynamic_energy = write_energy;
        self.metrics.reset_latency = write_latency;
        self.metrics.set_latency = write_latency;
    }

    fn chain_latency_and_energy(&self, ctx: &EvalCtx, ramp_input: f64) -> (f64, f64) {
        let tech = ctx.tech;
        let region = tech.feature_size * MAX_TRANSISTOR_HEIGHT;
        let vdd = tech.vdd;
        let beta = 0.5;
        let mut delay = 0.0;
        let mut energy = 0.0;

        if self.num_gates == 0 {
            let tf = self.res * self.cap / 2.0;
            let (d, _) = horowitz(tf, beta, ramp_input);
            return (self.cap * vdd * vdd, d);
        }

        let mut ramp = ramp_input;
        for i in 0..self.num_gates {
            let rd = on_resistance(
                self.w_tsv_n[i],
                TransistorType::Nmos,
                ctx.cfg.temperature,
                tech,
            );
            let c_intrinsic = drain_cap(self.w_tsv_p[i], TransistorType::Pmos, region, tech)
                + drain_cap(self.w_tsv_n[i], TransistorType::Nmos, region, tech);
            let (c_load, tf) = if i == self.num_gates - 1 {
                // last inverter drives the via itself
                let c_load = self.c_load_tsv;
                (c_load, rd * (c_intrinsic + c_load) + self.res * c_load / 2.0)
            } else {
                let (ci, co) = gate_capacitance(
                    GateType::Inv,
                    1,
                    self.w_tsv_n[i + 1],
                    self.w_tsv_p[i + 1],
                    region,
                    tech,
                );
                let c_load = ci + co;
                (c_load, rd * (c_intrinsic + c_load))
            };
            let (d, ramp_out) = horowitz(tf, beta, ramp);
            delay += d;
            ramp = ramp_out;
            energy += (c_load + c_intrinsic) * vdd * vdd;
        }
        (energy, delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::tests::fixture;
    use crate::INFINITE_RAMP;

    #[test]
    fn buffered_via_sizes_a_chain() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut tsv = Tsv::default();
        tsv.initialize(&ctx, TsvType::Coarse, true);
        assert!(!tsv.invalid);
        assert!(tsv.num_gates >= 1);
        tsv.calculate_area(&ctx);
        tsv.calculate_latency_and_power(&ctx, INFINITE_RAMP, INFINITE_RAMP);
        assert!(tsv.metrics.area >= tsv.min_area.min(tsv.buffer_area));
        assert!(tsv.metrics.read_latency > 0.0);
        assert!(tsv.metrics.read_dynamic_energy > 0.0);
        assert!(tsv.metrics.leakage > 0.0);
    }

    #[test]
    fn unbuffered_via_is_a_bare_rc_hop() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut tsv = Tsv::default();
        tsv.initialize(&ctx, TsvType::Fine, false);
        assert_eq!(tsv.num_gates, 0);
        tsv.calculate_area(&ctx);
        tsv.calculate_latency_and_power(&ctx, INFINITE_RAMP, INFINITE_RAMP);
        assert_eq!(tsv.metrics.area, tsv.min_area);
        assert_eq!(tsv.metrics.leakage, 0.0);
        assert!(tsv.metrics.read_latency > 0.0);
    }

    #[test]
    fn write_direction_mirrors_read_for_symmetric_ramps() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut tsv = Tsv::default();
        tsv.initialize(&ctx, TsvType::Coarse, true);
        tsv.calculate_area(&ctx);
        tsv.calculate_latency_and_power(&ctx, INFINITE_RAMP, INFINITE_RAMP);
        assert_eq!(tsv.metrics.read_latency, tsv.metrics.write_latency);
        assert_eq!(tsv.metrics.set_latency, tsv.metrics.write_latency);
        assert_eq!(tsv.metrics.reset_dynamic_energy, tsv.metrics.write_dynamic_energy);
    }
}
