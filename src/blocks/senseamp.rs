//! Latch-style sense amplifier column, one amp per bitline pair after the
//! sense-level mux. Current sensing adds a calibrated I-V converter in
//! front of the latch.

use log::{error, warn};

use crate::blocks::UnitMetrics;
use crate::formula::{
    drain_cap, gate_area, gate_cap, gate_leakage, transconductance, GateType, TransistorType,
    MIN_GAP_BET_P_AND_N_DIFFS, MIN_GAP_BET_SAME_TYPE_DIFFS,
};
use crate::wire::{W_SENSE_EN, W_SENSE_ISO, W_SENSE_MUX, W_SENSE_N, W_SENSE_P};
use crate::EvalCtx;

/// Footprint of the I-V converter used for current sensing. Unit: F^2.
const IV_CONVERTER_AREA: f64 = 50000.0;

#[derive(Debug, Clone, Default)]
pub struct SenseAmp {
    pub initialized: bool,
    pub invalid: bool,
    pub metrics: UnitMetrics,

    pub num_column: u64,
    pub current_sense: bool,
    /// Bitline swing the latch must resolve. Unit: V.
    pub sense_voltage: f64,
    /// Column pitch the amp must fit under. Unit: m.
    pub pitch_sense_amp: f64,
    pub cap_load: f64,
}

impl SenseAmp {
    pub fn initialize(
        &mut self,
        ctx: &EvalCtx,
        num_column: u64,
        current_sense: bool,
        sense_voltage: f64,
        pitch_sense_amp: f64,
    ) {
        if self.initialized {
            warn!("[sense amp] already initialized");
        }
        self.num_column = num_column;
        self.current_sense = current_sense;
        self.sense_voltage = sense_voltage;
        self.pitch_sense_amp = pitch_sense_amp;

        // under 3F there is no room to lay the latch out
        if pitch_sense_amp <= ctx.tech.feature_size * 3.0 {
            self.invalid = true;
        }
        self.initialized = true;
    }

    pub fn calculate_area(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[sense amp] calculate_area before initialize");
            return;
        }
        if self.invalid {
            self.metrics.invalidate();
            return;
        }
        let f = ctx.tech.feature_size;
        let mut converter_area = 0.0;
        if self.current_sense {
            converter_area = IV_CONVERTER_AREA * f * f;
        }

        // width and height swap so the stack runs along the bitline
        let mut width: f64 = 0.0;
        let mut height = 0.0;
        let (h, w) = gate_area(GateType::Inv, 1, 0.0, W_SENSE_P * f, self.pitch_sense_amp, ctx.tech);
        width = width.max(h);
        height += 2.0 * w;
        let (h, w) = gate_area(GateType::Inv, 1, 0.0, W_SENSE_ISO * f, self.pitch_sense_amp, ctx.tech);
        width = width.max(h);
        height += w;
        height += 2.0 * MIN_GAP_BET_SAME_TYPE_DIFFS * f;

        let (h, w) = gate_area(GateType::Inv, 1, W_SENSE_N * f, 0.0, self.pitch_sense_amp, ctx.tech);
        width = width.max(h);
        height += 2.0 * w;
        let (h, w) = gate_area(GateType::Inv, 1, W_SENSE_EN * f, 0.0, self.pitch_sense_amp, ctx.tech);
        width = width.max(h);
        height += w;
        height += 2.0 * MIN_GAP_BET_SAME_TYPE_DIFFS * f;

        height += MIN_GAP_BET_P_AND_N_DIFFS * f;

        // squeeze to the column pitch
        height = height * width / self.pitch_sense_amp;
        width = self.pitch_sense_amp;

        height += converter_area / width;
        width *= self.num_column as f64;

        self.metrics.height = height;
        self.metrics.width = width;
        self.metrics.area = height * width;
    }

    pub fn calculate_rc(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[sense amp] calculate_rc before initialize");
            return;
        }
        if self.invalid {
            return;
        }
        let f = ctx.tech.feature_size;
        self.cap_load = gate_cap((W_SENSE_P + W_SENSE_N) * f, ctx.tech)
            + drain_cap(W_SENSE_N * f, TransistorType::Nmos, self.pitch_sense_amp, ctx.tech)
            + drain_cap(W_SENSE_P * f, TransistorType::Pmos, self.pitch_sense_amp, ctx.tech)
            + drain_cap(W_SENSE_ISO * f, TransistorType::Pmos, self.pitch_sense_amp, ctx.tech)
            + drain_cap(W_SENSE_MUX * f, TransistorType::Nmos, self.pitch_sense_amp, ctx.tech);
    }

    /// The input ramp does not matter once the latch regenerates on its
    /// own.
    pub fn calculate_latency(&mut self, ctx: &EvalCtx, _ramp_input: f64) {
        if !self.initialized {
            error!("[sense amp] calculate_latency before initialize");
            return;
        }
        if self.invalid {
            self.metrics.invalidate();
            return;
        }
        let f = ctx.tech.feature_size;
        let mut latency = 0.0;
        if self.current_sense {
            // converter delays fitted from circuit simulation per node
            latency += if f >= 179e-9 {
                0.46e-9
            } else if f >= 119e-9 {
                0.49e-9
            } else if f >= 89e-9 {
                0.53e-9
            } else if f >= 64e-9 {
                0.62e-9
            } else if f >= 44e-9 {
                0.80e-9
            } else if f >= 31e-9 {
                1.07e-9
            } else {
                1.45e-9
            };
        }

        let gm = transconductance(W_SENSE_N * f, TransistorType::Nmos, ctx.tech)
            + transconductance(W_SENSE_P * f, TransistorType::Pmos, ctx.tech);
        let tau = self.cap_load / gm;
        latency += tau * (ctx.tech.vdd / self.sense_voltage).ln();
        self.metrics.read_latency = latency;
        self.metrics.write_latency = 0.0;
        self.metrics.refresh_latency = latency;
    }

    pub fn calculate_power(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[sense amp] calculate_power before initialize");
            return;
        }
        if self.invalid {
            self.metrics.invalidate();
            return;
        }
        let f = ctx.tech.feature_size;
        let vdd = ctx.tech.vdd;
        let mut energy = 0.0;
        let mut leakage = 0.0;
        if self.current_sense {
            // converter numbers fitted from circuit simulation per node
            let (e, l) = if f >= 119e-9 {
                (8.52e-14, 1.40e-8)
            } else if f >= 89e-9 {
                (8.72e-14, 1.87e-8)
            } else if f >= 64e-9 {
                (9.00e-14, 2.57e-8)
            } else if f >= 44e-9 {
                (10.26e-14, 4.41e-9)
            } else if f >= 31e-9 {
                (12.56e-14, 12.54e-8)
            } else {
                (15e-14, 15e-8)
            };
            energy += e;
            leakage += l;
        }

        energy += self.cap_load * vdd * vdd;
        let idle_current =
            gate_leakage(GateType::Inv, 1, W_SENSE_EN * f, 0.0, ctx.cfg.temperature, ctx.tech)
                * vdd;
        leakage += idle_current * vdd;

        self.metrics.read_dynamic_energy = energy * self.num_column as f64;
        self.metrics.leakage = leakage * self.num_column as f64;
        self.metrics.write_dynamic_energy = 0.0;
        self.metrics.refresh_dynamic_energy = self.metrics.read_dynamic_energy;
    }
}
