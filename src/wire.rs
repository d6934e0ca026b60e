//! Interconnect model: six wire flavors (local/semi-global/global, each in
//! an aggressive and a conservative projection), optional repeater insertion
//! with delay-penalty variants, and optional low-swing differential
//! signaling.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::formula::{
    self, drain_cap, gate_cap, gate_leakage, on_resistance, transconductance, GateType,
    TransistorType, COPPER_RESISTIVITY, COPPER_RESISTIVITY_TEMPERATURE_COEFFICIENT,
    MAX_TRANSISTOR_HEIGHT, MIN_NMOS_SIZE, PERMITTIVITY,
};
use crate::tech::Technology;

/// Voltage swing used on low-swing differential wires. Unit: V.
pub const LOW_SWING_VOLTAGE: f64 = 0.1;

/// Sense-amp device widths, in feature sizes (shared with the subarray
/// sense amplifier).
pub const W_SENSE_P: f64 = 7.5;
pub const W_SENSE_N: f64 = 3.75;
pub const W_SENSE_ISO: f64 = 12.5;
pub const W_SENSE_EN: f64 = 5.0;
pub const W_SENSE_MUX: f64 = 9.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireType {
    /// Pitch 2.5 F.
    LocalAggressive = 0,
    LocalConservative = 1,
    /// Pitch 4 F.
    SemiAggressive = 2,
    SemiConservative = 3,
    /// Pitch 8 F.
    GlobalAggressive = 4,
    GlobalConservative = 5,
}

impl WireType {
    pub const COUNT: usize = 6;

    pub fn from_index(i: usize) -> Option<Self> {
        match i {
            0 => Some(WireType::LocalAggressive),
            1 => Some(WireType::LocalConservative),
            2 => Some(WireType::SemiAggressive),
            3 => Some(WireType::SemiConservative),
            4 => Some(WireType::GlobalAggressive),
            5 => Some(WireType::GlobalConservative),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireRepeaterType {
    None = 0,
    /// Repeaters sized/spaced for minimum delay.
    Opt = 1,
    /// Smaller/sparser repeaters trading the given delay overhead for
    /// energy.
    Penalty5 = 2,
    Penalty10 = 3,
    Penalty20 = 4,
    Penalty30 = 5,
    Penalty40 = 6,
    Penalty50 = 7,
}

impl WireRepeaterType {
    pub const COUNT: usize = 8;

    pub fn from_index(i: usize) -> Option<Self> {
        match i {
            0 => Some(WireRepeaterType::None),
            1 => Some(WireRepeaterType::Opt),
            2 => Some(WireRepeaterType::Penalty5),
            3 => Some(WireRepeaterType::Penalty10),
            4 => Some(WireRepeaterType::Penalty20),
            5 => Some(WireRepeaterType::Penalty30),
            6 => Some(WireRepeaterType::Penalty40),
            7 => Some(WireRepeaterType::Penalty50),
            _ => None,
        }
    }

    pub fn penalty(&self) -> Option<f64> {
        match self {
            WireRepeaterType::None | WireRepeaterType::Opt => None,
            WireRepeaterType::Penalty5 => Some(0.05),
            WireRepeaterType::Penalty10 => Some(0.10),
            WireRepeaterType::Penalty20 => Some(0.20),
            WireRepeaterType::Penalty30 => Some(0.30),
            WireRepeaterType::Penalty40 => Some(0.40),
            WireRepeaterType::Penalty50 => Some(0.50),
        }
    }

    pub fn is_repeated(&self) -> bool {
        !matches!(self, WireRepeaterType::None)
    }
}

struct WireGeometry {
    pitch_in_f: f64,
    aspect_ratio: f64,
    barrier_thickness: f64,
    horizontal_dielectric: f64,
    vertical_dielectric: f64,
    miller_value: f64,
    fringe_cap: f64,
    alpha_scatter: f64,
    ild_relative_thickness: f64,
}

fn wire_geometry(wire_type: WireType) -> WireGeometry {
    let aggressive = matches!(
        wire_type,
        WireType::LocalAggressive | WireType::SemiAggressive | WireType::GlobalAggressive
    );
    let pitch_in_f = match wire_type {
        WireType::LocalAggressive | WireType::LocalConservative => 2.5,
        WireType::SemiAggressive | WireType::SemiConservative => 4.0,
        WireType::GlobalAggressive | WireType::GlobalConservative => 8.0,
    };
    if aggressive {
        WireGeometry {
            pitch_in_f,
            aspect_ratio: 2.2,
            barrier_thickness: 0.0,
            horizontal_dielectric: 2.0,
            vertical_dielectric: 2.2,
            miller_value: 1.5,
            fringe_cap: 1.15e-10,
            alpha_scatter: 1.0,
            ild_relative_thickness: 0.8,
        }
    } else {
        WireGeometry {
            pitch_in_f,
            aspect_ratio: 2.0,
            barrier_thickness: 3e-9,
            horizontal_dielectric: 2.7,
            vertical_dielectric: 2.9,
            miller_value: 1.5,
            fringe_cap: 1.15e-10,
            alpha_scatter: 1.05,
            ild_relative_thickness: 1.0,
        }
    }
}

/// One fully characterized wire style. Immutable during a candidate
/// evaluation; the search clones and re-initializes wires when sweeping
/// styles.
#[derive(Debug, Clone)]
pub struct Wire {
    pub wire_type: WireType,
    pub wire_repeater_type: WireRepeaterType,
    pub temperature: u32,
    pub is_low_swing: bool,

    pub feature_size: f64,
    pub wire_pitch: f64,
    pub wire_width: f64,
    pub wire_thickness: f64,
    pub wire_spacing: f64,
    pub barrier_thickness: f64,
    pub ild_thickness: f64,
    pub aspect_ratio: f64,

    /// Unit: ohm/m.
    pub res_wire_per_unit: f64,
    /// Unit: F/m.
    pub cap_wire_per_unit: f64,

    /// Repeater sizing; zero / infinite when the wire is unrepeated.
    pub repeater_size: f64,
    pub repeater_spacing: f64,
    pub repeater_height: f64,
    pub repeater_width: f64,

    vdd: f64,
    unit_delay: f64,
    unit_dynamic_energy: f64,
    unit_leakage: f64,

    // low-swing receiver characteristics
    sense_delay: f64,
    sense_energy: f64,
    sense_leakage: f64,
    // cached minimum-inverter characteristics used by the repeater solver
    cap_min_inv_in: f64,
    cap_min_inv_out: f64,
    res_min_inv: f64,
    leak_min_inv: f64,
}

impl Wire {
    pub fn new(
        tech: &Technology,
        wire_type: WireType,
        wire_repeater_type: WireRepeaterType,
        temperature: u32,
        is_low_swing: bool,
    ) -> Result<Self> {
        if is_low_swing && wire_repeater_type.is_repeated() {
            bail!("low-swing wires cannot carry repeaters");
        }
        let g = wire_geometry(wire_type);
        let f = tech.feature_size;
        let wire_pitch = g.pitch_in_f * f;
        let wire_width = wire_pitch / 2.0;
        let wire_spacing = wire_pitch / 2.0;
        let wire_thickness = g.aspect_ratio * wire_width;
        let ild_thickness = g.ild_relative_thickness * wire_thickness;

        let resistivity = COPPER_RESISTIVITY
            * (1.0
                + COPPER_RESISTIVITY_TEMPERATURE_COEFFICIENT * (temperature as f64 - 293.0));
        let res_wire_per_unit = formula::wire_resistance(
            resistivity,
            wire_width,
            wire_thickness,
            g.barrier_thickness,
            0.0,
            g.alpha_scatter,
        );
        let cap_wire_per_unit = formula::wire_capacitance(
            PERMITTIVITY,
            wire_width,
            wire_thickness,
            wire_spacing,
            ild_thickness,
            g.miller_value,
            g.horizontal_dielectric,
            g.vertical_dielectric,
            g.fringe_cap,
        );

        let w_min_n = MIN_NMOS_SIZE * f;
        let w_min_p = tech.pn_size_ratio * w_min_n;
        let region = MAX_TRANSISTOR_HEIGHT * f;
        let cap_min_inv_in = gate_cap(w_min_n, tech) + gate_cap(w_min_p, tech);
        let cap_min_inv_out = drain_cap(w_min_n, TransistorType::Nmos, region, tech)
            + drain_cap(w_min_p, TransistorType::Pmos, region, tech);
        let res_min_inv = on_resistance(w_min_n, TransistorType::Nmos, temperature, tech);
        let leak_min_inv =
            gate_leakage(GateType::Inv, 1, w_min_n, w_min_p, temperature, tech) * tech.vdd;

        // low-swing receiver: cross-coupled pair resolving a LOW_SWING_VOLTAGE
        // differential
        let gm = transconductance(W_SENSE_N * f, TransistorType::Nmos, tech)
            + transconductance(W_SENSE_P * f, TransistorType::Pmos, tech);
        let cap_sense = gate_cap((W_SENSE_P + W_SENSE_N) * f, tech)
            + drain_cap(W_SENSE_N * f, TransistorType::Nmos, region, tech)
            + drain_cap(W_SENSE_P * f, TransistorType::Pmos, region, tech);
        let sense_delay = cap_sense / gm * (tech.vdd / LOW_SWING_VOLTAGE).ln();
        let sense_energy = cap_sense * tech.vdd * tech.vdd;
        let sense_leakage =
            gate_leakage(GateType::Inv, 1, W_SENSE_EN * f, 0.0, temperature, tech) * tech.vdd;

        let mut wire = Wire {
            wire_type,
            wire_repeater_type,
            temperature,
            is_low_swing,
            feature_size: f,
            wire_pitch,
            wire_width,
            wire_thickness,
            wire_spacing,
            barrier_thickness: g.barrier_thickness,
            ild_thickness,
            aspect_ratio: g.aspect_ratio,
            res_wire_per_unit,
            cap_wire_per_unit,
            repeater_size: 0.0,
            repeater_spacing: f64::INFINITY,
            repeater_height: 0.0,
            repeater_width: 0.0,
            vdd: tech.vdd,
            unit_delay: 0.0,
            unit_dynamic_energy: 0.0,
            unit_leakage: 0.0,
            sense_delay,
            sense_energy,
            sense_leakage,
            cap_min_inv_in,
            cap_min_inv_out,
            res_min_inv,
            leak_min_inv,
        };

        if wire_repeater_type.is_repeated() {
            wire.find_optimal_repeater(tech);
            if let Some(penalty) = wire_repeater_type.penalty() {
                wire.find_penalized_repeater(penalty);
            }
        }
        Ok(wire)
    }

    /// Delay, dynamic energy, and leakage of one repeated segment, per
    /// meter of wire.
    fn unit_metrics(&self, size: f64, spacing: f64) -> (f64, f64, f64) {
        let r_drv = self.res_min_inv / size;
        let c_gate = self.cap_min_inv_in * size;
        let c_drain = self.cap_min_inv_out * size;
        let tr = r_drv * (c_drain + self.cap_wire_per_unit * spacing + c_gate)
            + self.res_wire_per_unit * spacing
                * (self.cap_wire_per_unit * spacing / 2.0 + c_gate);
        let delay = 0.693 * tr / spacing;
        let energy = ((c_gate + c_drain) + self.cap_wire_per_unit * spacing) * self.vdd * self.vdd
            / spacing;
        let leakage = self.leak_min_inv * size / spacing;
        (delay, energy, leakage)
    }

    pub fn find_optimal_repeater(&mut self, tech: &Technology) {
        self.repeater_size = (self.res_min_inv * self.cap_wire_per_unit
            / (self.res_wire_per_unit * self.cap_min_inv_in))
            .sqrt();
        self.repeater_spacing = (2.0
            * self.res_min_inv
            * (self.cap_min_inv_in + self.cap_min_inv_out)
            / (self.res_wire_per_unit * self.cap_wire_per_unit))
            .sqrt();
        let (d, e, l) = self.unit_metrics(self.repeater_size, self.repeater_spacing);
        self.unit_delay = d;
        self.unit_dynamic_energy = e;
        self.unit_leakage = l;

        let f = self.feature_size;
        let (h, w) = formula::gate_area(
            GateType::Inv,
            1,
            MIN_NMOS_SIZE * f * self.repeater_size,
            tech.pn_size_ratio * MIN_NMOS_SIZE * f * self.repeater_size,
            MAX_TRANSISTOR_HEIGHT * f,
            tech,
        );
        self.repeater_height = h;
        self.repeater_width = w;
    }

    /// Shrink and spread the repeaters until the delay penalty budget is
    /// spent, minimizing energy within it.
    pub fn find_penalized_repeater(&mut self, penalty: f64) {
        let opt_delay = self.unit_delay;
        let opt_size = self.repeater_size;
        let opt_spacing = self.repeater_spacing;
        let mut best = (opt_size, opt_spacing, self.unit_dynamic_energy);

        let mut size_frac = 1.0;
        while size_frac >= 0.2 {
            let mut spacing_mult = 1.0;
            while spacing_mult <= 4.0 {
                let size = opt_size * size_frac;
                let spacing = opt_spacing * spacing_mult;
                let (d, e, _) = self.unit_metrics(size, spacing);
                if d <= opt_delay * (1.0 + penalty) && e < best.2 {
                    best = (size, spacing, e);
                }
                spacing_mult += 0.05;
            }
            size_frac -= 0.01;
        }

        self.repeater_size = best.0;
        self.repeater_spacing = best.1;
        let (d, e, l) = self.unit_metrics(best.0, best.1);
        self.unit_delay = d;
        self.unit_dynamic_energy = e;
        self.unit_leakage = l;
        self.repeater_height *= best.0 / opt_size;
    }

    pub fn repeated_wire_unit_delay(&self) -> f64 {
        self.unit_delay
    }

    pub fn repeated_wire_unit_dynamic_energy(&self) -> f64 {
        self.unit_dynamic_energy
    }

    pub fn repeated_wire_unit_leakage(&self) -> f64 {
        self.unit_leakage
    }

    /// Latency, dynamic energy, and leakage of a run of this wire style.
    pub fn latency_and_power(&self, wire_length: f64) -> (f64, f64, f64) {
        if wire_length <= 0.0 {
            return (0.0, 0.0, 0.0);
        }
        if self.is_low_swing {
            let c_wire = self.cap_wire_per_unit * wire_length;
            let r_wire = self.res_wire_per_unit * wire_length;
            // min-size driver charging the differential pair to the reduced
            // swing, then the receiver resolves
            let delay =
                0.693 * (self.res_min_inv * c_wire + r_wire * c_wire / 2.0) + self.sense_delay;
            let energy = c_wire * LOW_SWING_VOLTAGE * self.vdd + self.sense_energy;
            return (delay, energy, self.sense_leakage);
        }
        if self.wire_repeater_type.is_repeated() {
            (
                self.unit_delay * wire_length,
                self.unit_dynamic_energy * wire_length,
                self.unit_leakage * wire_length,
            )
        } else {
            let delay =
                0.38 * self.res_wire_per_unit * self.cap_wire_per_unit * wire_length * wire_length;
            let energy = self.cap_wire_per_unit * wire_length * self.vdd * self.vdd;
            (delay, energy, 0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tech::DeviceRoadmap;

    fn tech() -> Technology {
        Technology::for_node(45, DeviceRoadmap::Hp).unwrap()
    }

    #[test]
    fn global_wire_has_lower_resistance_than_local() {
        let t = tech();
        let local = Wire::new(&t, WireType::LocalAggressive, WireRepeaterType::None, 350, false)
            .unwrap();
        let global =
            Wire::new(&t, WireType::GlobalAggressive, WireRepeaterType::None, 350, false).unwrap();
        assert!(global.res_wire_per_unit < local.res_wire_per_unit);
    }

    #[test]
    fn repeaters_win_on_long_wires() {
        let t = tech();
        let plain =
            Wire::new(&t, WireType::GlobalAggressive, WireRepeaterType::None, 350, false).unwrap();
        let repeated =
            Wire::new(&t, WireType::GlobalAggressive, WireRepeaterType::Opt, 350, false).unwrap();
        let len = 5e-3;
        let (d_plain, _, _) = plain.latency_and_power(len);
        let (d_rep, _, _) = repeated.latency_and_power(len);
        assert!(d_rep < d_plain);
    }

    #[test]
    fn penalized_repeater_trades_delay_for_energy() {
        let t = tech();
        let opt =
            Wire::new(&t, WireType::GlobalAggressive, WireRepeaterType::Opt, 350, false).unwrap();
        let pen = Wire::new(
            &t,
            WireType::GlobalAggressive,
            WireRepeaterType::Penalty30,
            350,
            false,
        )
        .unwrap();
        assert!(pen.repeated_wire_unit_delay() <= opt.repeated_wire_unit_delay() * 1.3 + 1e-18);
        assert!(pen.repeated_wire_unit_dynamic_energy() <= opt.repeated_wire_unit_dynamic_energy());
    }

    #[test]
    fn low_swing_rejects_repeaters() {
        let t = tech();
        assert!(Wire::new(&t, WireType::GlobalAggressive, WireRepeaterType::Opt, 350, true).is_err());
    }

    #[test]
    fn zero_length_run_is_free() {
        let t = tech();
        let w =
            Wire::new(&t, WireType::LocalAggressive, WireRepeaterType::None, 350, false).unwrap();
        assert_eq!(w.latency_and_power(0.0), (0.0, 0.0, 0.0));
    }
}
