//! NMOS pass-transistor column multiplexer. Used at three points in the
//! column path: in front of the sense amplifiers and at the two output
//! select levels behind them.

use log::{error, warn};

use crate::blocks::UnitMetrics;
use crate::cell::MemCellType;
use crate::formula::{
    drain_cap, gate_area, on_resistance, GateType, TransistorType, IR_DROP_TOLERANCE,
    MIN_NMOS_SIZE,
};
use crate::EvalCtx;

#[derive(Debug, Clone, Default)]
pub struct Mux {
    pub initialized: bool,
    pub metrics: UnitMetrics,

    /// Select ratio; 1 means the mux is a wire.
    pub num_input: usize,
    /// Number of parallel mux instances.
    pub num_mux: u64,
    pub cap_load: f64,
    pub cap_input_next_stage: f64,
    pub min_driver_current: f64,

    pub width_nmos_pass_transistor: f64,
    pub res_nmos_pass_transistor: f64,
    pub cap_nmos_pass_transistor: f64,
    /// Drain cap seen on the shared output node.
    pub cap_output: f64,
    /// Load the previous stage sees through this mux when computing its
    /// delay and switching energy.
    pub cap_for_previous_delay_calculation: f64,
    pub cap_for_previous_power_calculation: f64,
    pub ramp_input: f64,
}

impl Mux {
    fn is_active(&self) -> bool {
        self.num_input > 1 && self.num_mux > 0
    }

    pub fn initialize(
        &mut self,
        ctx: &EvalCtx,
        num_input: usize,
        num_mux: u64,
        cap_load: f64,
        cap_input_next_stage: f64,
        min_driver_current: f64,
    ) {
        if self.initialized {
            warn!("[mux] already initialized");
        }
        self.num_input = num_input;
        self.num_mux = num_mux;
        self.cap_load = cap_load;
        self.cap_input_next_stage = cap_input_next_stage;
        self.min_driver_current = min_driver_current;

        if self.is_active() {
            let f = ctx.tech.feature_size;
            let min_nmos_width =
                min_driver_current / ctx.tech.current_on_nmos(ctx.cfg.temperature);
            self.width_nmos_pass_transistor = match ctx.cell.mem_cell_type {
                MemCellType::Mram | MemCellType::Pcram | MemCellType::Memristor => {
                    // the pass device sits in the read voltage divider, so
                    // its resistance must stay well under the cell's
                    let max_res = ctx.cell.resistance_on * IR_DROP_TOLERANCE;
                    let mut width =
                        on_resistance(f, TransistorType::Nmos, ctx.cfg.temperature, ctx.tech) * f
                            / max_res;
                    if width > ctx.cfg.max_nmos_size * f {
                        width = ctx.cfg.max_nmos_size * f;
                    }
                    width.max(min_nmos_width).max(6.0 * MIN_NMOS_SIZE * f)
                }
                _ => (6.0 * MIN_NMOS_SIZE * f).max(min_nmos_width),
            };
        }
        self.initialized = true;
    }

    pub fn calculate_area(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[mux] calculate_area before initialize");
            return;
        }
        if self.is_active() {
            let (h, w) = gate_area(
                GateType::Inv,
                1,
                self.width_nmos_pass_transistor,
                0.0,
                ctx.tech.feature_size * 40.0,
                ctx.tech,
            );
            self.metrics.height = h;
            self.metrics.width = self.num_mux as f64 * self.num_input as f64 * w;
            self.metrics.area = self.metrics.height * self.metrics.width;
        } else {
            self.metrics.height = 0.0;
            self.metrics.width = 0.0;
            self.metrics.area = 0.0;
        }
    }

    pub fn calculate_rc(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[mux] calculate_rc before initialize");
            return;
        }
        if self.is_active() {
            self.cap_nmos_pass_transistor = drain_cap(
                self.width_nmos_pass_transistor,
                TransistorType::Nmos,
                ctx.tech.feature_size * 40.0,
                ctx.tech,
            );
            self.cap_for_previous_power_calculation = self.cap_nmos_pass_transistor;
            self.cap_output = self.num_input as f64 * self.cap_nmos_pass_transistor;
            self.cap_for_previous_delay_calculation =
                self.cap_output + self.cap_nmos_pass_transistor + self.cap_load;
            self.res_nmos_pass_transistor = on_resistance(
                self.width_nmos_pass_transistor,
                TransistorType::Nmos,
                ctx.cfg.temperature,
                ctx.tech,
            );
        }
    }

    /// The input ramp has no bearing on a pass transistor's settling time.
    pub fn calculate_latency(&mut self, _ctx: &EvalCtx, ramp_input: f64) {
        if !self.initialized {
            error!("[mux] calculate_latency before initialize");
            return;
        }
        if self.is_active() {
            self.ramp_input = ramp_input;
            let tr = self.res_nmos_pass_transistor * (self.cap_output + self.cap_load);
            self.metrics.read_latency = 2.3 * tr;
            self.metrics.write_latency = self.metrics.read_latency;
        } else {
            self.metrics.read_latency = 0.0;
            self.metrics.write_latency = 0.0;
        }
    }

    pub fn calculate_power(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[mux] calculate_power before initialize");
            return;
        }
        if self.is_active() {
            // pass gates do not leak a static path
            self.metrics.leakage = 0.0;
            let vdd = ctx.tech.vdd;
            // worst case: every mux instance switches
            self.metrics.read_dynamic_energy = (self.cap_output + self.cap_input_next_stage)
                * vdd
                * (vdd - ctx.tech.vth)
                * self.num_mux as f64;
            self.metrics.write_dynamic_energy = self.metrics.read_dynamic_energy;
        } else {
            self.metrics.read_dynamic_energy = 0.0;
            self.metrics.write_dynamic_energy = 0.0;
            self.metrics.leakage = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::tests::fixture;
    use crate::INFINITE_RAMP;

    #[test]
    fn degenerate_mux_costs_nothing() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut mux = Mux::default();
        mux.initialize(&ctx, 1, 64, 10e-15, 5e-15, 0.0);
        mux.calculate_area(&ctx);
        mux.calculate_rc(&ctx);
        mux.calculate_latency(&ctx, INFINITE_RAMP);
        mux.calculate_power(&ctx);
        assert_eq!(mux.metrics.area, 0.0);
        assert_eq!(mux.metrics.read_latency, 0.0);
        assert_eq!(mux.metrics.read_dynamic_energy, 0.0);
    }

    #[test]
    fn active_mux_has_positive_cost() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut mux = Mux::default();
        mux.initialize(&ctx, 4, 64, 10e-15, 5e-15, 0.0);
        mux.calculate_area(&ctx);
        mux.calculate_rc(&ctx);
        mux.calculate_latency(&ctx, INFINITE_RAMP);
        mux.calculate_power(&ctx);
        assert!(mux.metrics.area > 0.0);
        assert!(mux.metrics.read_latency > 0.0);
        assert!(mux.metrics.read_dynamic_energy > 0.0);
        assert_eq!(mux.metrics.leakage, 0.0);
    }

    #[test]
    fn resistive_cells_widen_the_pass_device() {
        let fx_sram = fixture::sram();
        let ctx = fx_sram.ctx();
        let mut cmos_mux = Mux::default();
        cmos_mux.initialize(&ctx, 4, 1, 10e-15, 5e-15, 0.0);

        let fx_mram = fixture::mram();
        let ctx = fx_mram.ctx();
        let mut nvm_mux = Mux::default();
        nvm_mux.initialize(&ctx, 4, 1, 10e-15, 5e-15, 0.0);
        // Ron * tolerance forces a wider device than the 6x minimum
        assert!(nvm_mux.width_nmos_pass_transistor >= cmos_mux.width_nmos_pass_transistor);
        assert!(nvm_mux.width_nmos_pass_transistor <= ctx.cfg.max_nmos_size * ctx.tech.feature_size);
    }

    #[test]
    fn width_honors_drive_current_floor() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut weak = Mux::default();
        weak.initialize(&ctx, 4, 1, 10e-15, 5e-15, 0.0);
        let mut strong = Mux::default();
        let demanding = ctx.tech.current_on_nmos(ctx.cfg.temperature)
            * 20.0
            * MIN_NMOS_SIZE
            * ctx.tech.feature_size;
        strong.initialize(&ctx, 4, 1, 10e-15, 5e-15, demanding);
        assert!(strong.width_nmos_pass_transistor > weak.width_nmos_pass_transistor);
    }
}
