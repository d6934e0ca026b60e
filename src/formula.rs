//! Closed-form electrical and layout primitives shared by every circuit
//! model: gate capacitance and area, junction capacitance, on-resistance,
//! transconductance, the Horowitz delay approximation, logical-effort buffer
//! sizing, and wire R/C.

use crate::tech::Technology;

/// Layout design rules, in feature-size units.
pub const MIN_GAP_BET_P_AND_N_DIFFS: f64 = 2.0;
pub const MIN_GAP_BET_SAME_TYPE_DIFFS: f64 = 1.5;
pub const MIN_GAP_BET_POLY: f64 = 1.5;
pub const MIN_GAP_BET_CONTACT_POLY: f64 = 0.75;
pub const CONTACT_SIZE: f64 = 1.0;
pub const MIN_WIDTH_POWER_RAIL: f64 = 2.0;

pub const MIN_NMOS_SIZE: f64 = 1.5;
pub const MAX_NMOS_SIZE: f64 = 100.0;
pub const MAX_TRANSISTOR_HEIGHT: f64 = 20.0;

/// Optimal stage effort for buffer chains.
pub const OPT_F: f64 = 4.0;
pub const MAX_INV_CHAIN_LEN: usize = 20;
pub const MAX_NUMBER_GATES_STAGE: usize = 20;

/// Average stack leakage ratios relative to a single device.
pub const AVG_RATIO_LEAK_2INPUT_NAND: f64 = 0.48;
pub const AVG_RATIO_LEAK_3INPUT_NAND: f64 = 0.31;
pub const AVG_RATIO_LEAK_2INPUT_NOR: f64 = 0.95;
pub const AVG_RATIO_LEAK_3INPUT_NOR: f64 = 0.62;

/// Fraction of the cell's on-resistance a select device may add before
/// the read voltage divider degrades too far.
pub const IR_DROP_TOLERANCE: f64 = 0.2;

pub const COPPER_RESISTIVITY: f64 = 2.2e-8; // ohm*m at 293 K
pub const COPPER_RESISTIVITY_TEMPERATURE_COEFFICIENT: f64 = 0.0039;
pub const PERMITTIVITY: f64 = 8.85e-12; // F/m

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateType {
    Inv,
    Nor,
    Nand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransistorType {
    Nmos,
    Pmos,
}

pub fn is_pow2(n: u64) -> bool {
    n != 0 && (n & (n - 1)) == 0
}

/// Gate capacitance of a transistor of the given channel width. Unit: F.
pub fn gate_cap(width: f64, tech: &Technology) -> f64 {
    (tech.cap_ideal_gate + tech.cap_overlap + 3.0 * tech.cap_fringe) * width
        + tech.phy_gate_length * tech.cap_polywire
}

/// Gate capacitance of a floating-body cell access device with a thicker
/// gate oxide.
pub fn fbram_gate_cap(width: f64, thickness_factor: f64, tech: &Technology) -> f64 {
    (tech.cap_ideal_gate / thickness_factor + tech.cap_overlap + 3.0 * tech.cap_fringe) * width
        + tech.phy_gate_length * tech.cap_polywire
}

pub fn fbram_drain_cap(width: f64, tech: &Technology) -> f64 {
    3.0 * tech.cap_sidewall * width
}

/// Diffusion-row geometry for a folded transistor: number of fingers, the
/// diffusion height, and the length of the diffusion row along the poly
/// direction. All derived from contact/poly pitch rules.
fn fold_transistor(width: f64, max_width: f64, num_series: usize, tech: &Technology) -> (usize, f64, f64) {
    if width <= 0.0 {
        return (0, 0.0, 0.0);
    }
    let f = tech.feature_size;
    let (num_folded, height) = if width <= max_width {
        (1, width)
    } else {
        let n = (width / max_width).ceil() as usize;
        (n, max_width)
    };
    let num_fingers = num_folded * num_series.max(1);
    let row_length = (num_fingers as f64 + 1.0) * CONTACT_SIZE * f
        + 2.0 * num_fingers as f64 * MIN_GAP_BET_CONTACT_POLY * f
        + num_fingers as f64 * tech.phy_gate_length
        + (num_fingers as f64 - 1.0) * MIN_GAP_BET_POLY * f;
    (num_folded, height, row_length)
}

fn diffusion_budget(width_nmos: f64, width_pmos: f64, height_region: f64, tech: &Technology) -> (f64, f64) {
    let f = tech.feature_size;
    let total = width_nmos + width_pmos;
    if width_pmos <= 0.0 {
        (height_region, 0.0)
    } else if width_nmos <= 0.0 {
        (0.0, height_region)
    } else {
        let ratio = width_pmos / total;
        let usable = height_region - MIN_GAP_BET_P_AND_N_DIFFS * f;
        (usable * (1.0 - ratio), usable * ratio)
    }
}

/// Footprint of one logic gate laid out within a diffusion region of the
/// given height. Returns `(height, width)`; the area is their product.
pub fn gate_area(
    gate_type: GateType,
    num_input: usize,
    width_nmos: f64,
    width_pmos: f64,
    height_region: f64,
    tech: &Technology,
) -> (f64, f64) {
    let f = tech.feature_size;
    let (max_n, max_p) = diffusion_budget(width_nmos, width_pmos, height_region, tech);
    // Series devices share one diffusion row; parallel devices repeat fingers.
    let (series_n, series_p) = match gate_type {
        GateType::Inv => (1, 1),
        GateType::Nand => (num_input, num_input),
        GateType::Nor => (num_input, num_input),
    };
    let (_, height_n, row_n) = fold_transistor(width_nmos, max_n, series_n, tech);
    let (_, height_p, row_p) = fold_transistor(width_pmos, max_p, series_p, tech);

    let mut height = height_n + height_p;
    if height_n > 0.0 && height_p > 0.0 {
        height += MIN_GAP_BET_P_AND_N_DIFFS * f;
    }
    height += 2.0 * MIN_WIDTH_POWER_RAIL * f;
    let width = row_n.max(row_p);
    (height, width)
}

/// Input and output (drain-node) capacitance of one logic gate.
pub fn gate_capacitance(
    gate_type: GateType,
    num_input: usize,
    width_nmos: f64,
    width_pmos: f64,
    height_region: f64,
    tech: &Technology,
) -> (f64, f64) {
    let cap_input = gate_cap(width_nmos, tech) + gate_cap(width_pmos, tech);
    let (max_n, max_p) = diffusion_budget(width_nmos, width_pmos, height_region, tech);
    let (series_n, series_p) = match gate_type {
        GateType::Inv => (1, 1),
        GateType::Nand | GateType::Nor => (num_input, num_input),
    };
    let cap_output = drain_node_cap(width_nmos, max_n, series_n, tech)
        + drain_node_cap(width_pmos, max_p, series_p, tech);
    (cap_input, cap_output)
}

fn drain_node_cap(width: f64, max_width: f64, num_series: usize, tech: &Technology) -> f64 {
    if width <= 0.0 {
        return 0.0;
    }
    let f = tech.feature_size;
    let (num_folded, height, _) = fold_transistor(width, max_width, num_series, tech);
    // One shared drain contact strip per pair of fingers.
    let num_drain = ((num_folded as f64) / 2.0).ceil();
    let drain_width = (CONTACT_SIZE + 2.0 * MIN_GAP_BET_CONTACT_POLY) * f;
    let cap_bottom = tech.cap_junction * num_drain * drain_width * height;
    let cap_sidewall = tech.cap_sidewall * num_drain * 2.0 * (drain_width + height);
    let cap_channel = tech.cap_drain_to_channel * num_folded as f64 * height;
    let cap_overlap = tech.cap_overlap * width;
    cap_bottom + cap_sidewall + cap_channel + cap_overlap
}

/// Drain capacitance of a single transistor, modeled as the output node of
/// a one-input gate.
pub fn drain_cap(width: f64, ttype: TransistorType, height_region: f64, tech: &Technology) -> f64 {
    let (wn, wp) = match ttype {
        TransistorType::Nmos => (width, 0.0),
        TransistorType::Pmos => (0.0, width),
    };
    gate_capacitance(GateType::Inv, 1, wn, wp, height_region, tech).1
}

/// Subthreshold leakage current of one gate. Unit: A.
pub fn gate_leakage(
    gate_type: GateType,
    num_input: usize,
    width_nmos: f64,
    width_pmos: f64,
    temperature: u32,
    tech: &Technology,
) -> f64 {
    let leak_n = width_nmos * tech.current_off_nmos(temperature);
    let leak_p = width_pmos * tech.current_off_pmos(temperature);
    match gate_type {
        GateType::Inv => (leak_n + leak_p) / 2.0,
        GateType::Nand => {
            let ratio = if num_input == 2 {
                AVG_RATIO_LEAK_2INPUT_NAND
            } else {
                AVG_RATIO_LEAK_3INPUT_NAND
            };
            ratio * (leak_n + num_input as f64 * leak_p) / 2.0
        }
        GateType::Nor => {
            let ratio = if num_input == 2 {
                AVG_RATIO_LEAK_2INPUT_NOR
            } else {
                AVG_RATIO_LEAK_3INPUT_NOR
            };
            ratio * (num_input as f64 * leak_n + leak_p) / 2.0
        }
    }
}

/// Effective switching resistance of a transistor. Unit: ohm.
pub fn on_resistance(width: f64, ttype: TransistorType, temperature: u32, tech: &Technology) -> f64 {
    let current = match ttype {
        TransistorType::Nmos => tech.current_on_nmos(temperature),
        TransistorType::Pmos => tech.current_on_pmos(temperature),
    };
    tech.effective_resistance_multiplier * tech.vdd / (current * width)
}

/// Transconductance in the saturation region. Unit: S.
pub fn transconductance(width: f64, ttype: TransistorType, tech: &Technology) -> f64 {
    match ttype {
        TransistorType::Nmos => {
            let vsat = tech.vdsat_nmos.min(tech.vdd - tech.vth);
            tech.effective_electron_mobility * tech.cap_ox / 2.0 * width / tech.phy_gate_length
                * vsat
        }
        TransistorType::Pmos => {
            let vsat = tech.vdsat_pmos.min(tech.vdd - tech.vth);
            tech.effective_hole_mobility * tech.cap_ox / 2.0 * width / tech.phy_gate_length * vsat
        }
    }
}

/// Horowitz approximation for the delay of one RC stage with a finite input
/// ramp. Returns the delay and the output ramp slope fed to the next stage.
pub fn horowitz(tr: f64, beta: f64, ramp_input: f64) -> (f64, f64) {
    let alpha = 1.0 / (ramp_input * tr);
    let vs: f64 = 0.5; // switching threshold as a fraction of vdd
    let result = tr * (vs.ln() * vs.ln() + 2.0 * alpha * beta * (1.0 - vs)).sqrt();
    let ramp_output = (1.0 - vs) / result;
    (result, ramp_output)
}

/// Resistance per meter of a wire cross-section. Unit: ohm/m.
pub fn wire_resistance(
    resistivity: f64,
    wire_width: f64,
    wire_thickness: f64,
    barrier_thickness: f64,
    dishing_thickness: f64,
    alpha_scatter: f64,
) -> f64 {
    alpha_scatter * resistivity
        / ((wire_thickness - barrier_thickness - dishing_thickness)
            * (wire_width - 2.0 * barrier_thickness))
}

/// Capacitance per meter of a wire: vertical plate, sidewall (with Miller
/// coupling), and fringe components. Unit: F/m.
#[allow(clippy::too_many_arguments)]
pub fn wire_capacitance(
    permittivity: f64,
    wire_width: f64,
    wire_thickness: f64,
    wire_spacing: f64,
    ild_thickness: f64,
    miller_value: f64,
    horizontal_dielectric: f64,
    vertical_dielectric: f64,
    fringe_cap: f64,
) -> f64 {
    let vertical = 2.0 * permittivity * vertical_dielectric * wire_width / ild_thickness;
    let sidewall =
        2.0 * permittivity * miller_value * horizontal_dielectric * wire_thickness / wire_spacing;
    vertical + sidewall + fringe_cap
}

/// Logical-effort sizing of an inverter chain that must drive `c_load`
/// through total effort `big_f`. Fills `w_n`/`w_p` backward from the load
/// and returns the number of stages.
#[allow(clippy::too_many_arguments)]
pub fn logical_effort(
    num_gates_min: usize,
    g: f64,
    big_f: f64,
    w_n: &mut [f64],
    w_p: &mut [f64],
    c_load: f64,
    p_to_n_ratio: f64,
    max_w_nmos: f64,
    tech: &Technology,
) -> usize {
    let mut big_f = big_f;
    let mut num_gates = (big_f.ln() / OPT_F.ln()) as usize;
    if num_gates % 2 != 0 {
        num_gates += 1;
    }
    num_gates = num_gates.max(num_gates_min);
    if num_gates > w_n.len() {
        // caller rejects the chain; nothing sensible to size
        return num_gates;
    }

    let mut f = big_f.powf(1.0 / num_gates as f64);
    let mut i = num_gates - 1;
    let c_in = c_load / f;
    w_n[i] = (1.0 / (1.0 + p_to_n_ratio)) * c_in / gate_cap(1.0, tech);
    w_n[i] = w_n[i].max(MIN_NMOS_SIZE * tech.feature_size);
    w_p[i] = p_to_n_ratio * w_n[i];

    if w_n[i] > max_w_nmos {
        let c_ld = gate_cap((1.0 + p_to_n_ratio) * max_w_nmos, tech);
        big_f = g * c_ld / gate_cap(w_n[0] + w_p[0], tech);
        num_gates = (big_f.ln() / OPT_F.ln()) as usize + 1;
        if num_gates % 2 != 0 {
            num_gates += 1;
        }
        num_gates = num_gates.max(num_gates_min);
        if num_gates > w_n.len() {
            return num_gates;
        }
        f = big_f.powf(1.0 / (num_gates as f64 - 1.0));
        i = num_gates - 1;
        w_n[i] = max_w_nmos;
        w_p[i] = p_to_n_ratio * w_n[i];
    }
    for i in (1..num_gates.saturating_sub(1)).rev() {
        w_n[i] = (w_n[i + 1] / f).max(MIN_NMOS_SIZE * tech.feature_size);
        w_p[i] = p_to_n_ratio * w_n[i];
    }

    // callers reject chains longer than MAX_NUMBER_GATES_STAGE
    num_gates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tech::{DeviceRoadmap, Technology};
    use approx::assert_relative_eq;

    fn tech() -> Technology {
        Technology::for_node(65, DeviceRoadmap::Lop).unwrap()
    }

    #[test]
    fn horowitz_matches_closed_form() {
        let (delay, ramp) = horowitz(1e-10, 0.5, 1e10);
        let alpha = 1.0 / (1e10 * 1e-10);
        let expected = 1e-10 * (0.5f64.ln().powi(2) + 2.0 * alpha * 0.5 * 0.5).sqrt();
        assert_relative_eq!(delay, expected, max_relative = 1e-12);
        assert_relative_eq!(ramp, 0.5 / expected, max_relative = 1e-12);
    }

    #[test]
    fn horowitz_sharper_input_is_faster() {
        let (slow, _) = horowitz(1e-10, 0.5, 1e9);
        let (fast, _) = horowitz(1e-10, 0.5, 1e11);
        assert!(fast < slow);
    }

    #[test]
    fn gate_cap_scales_with_width() {
        let t = tech();
        let c1 = gate_cap(1e-7, &t);
        let c2 = gate_cap(2e-7, &t);
        assert!(c2 > c1);
        assert!(c2 < 2.0 * c1 + 1e-18); // poly term is width-independent
    }

    #[test]
    fn folding_keeps_height_bounded() {
        let t = tech();
        let region = t.feature_size * MAX_TRANSISTOR_HEIGHT;
        let (h_small, w_small) = gate_area(GateType::Inv, 1, t.feature_size * 2.0, 0.0, region, &t);
        let (h_big, w_big) = gate_area(GateType::Inv, 1, t.feature_size * 200.0, 0.0, region, &t);
        assert!(h_big <= region + 2.0 * MIN_WIDTH_POWER_RAIL * t.feature_size + 1e-12);
        assert!(w_big > w_small);
        assert!(h_small < h_big + 1e-12);
    }

    #[test]
    fn on_resistance_decreases_with_width() {
        let t = tech();
        let r1 = on_resistance(1e-7, TransistorType::Nmos, 350, &t);
        let r2 = on_resistance(2e-7, TransistorType::Nmos, 350, &t);
        assert_relative_eq!(r1, 2.0 * r2, max_relative = 1e-12);
    }

    #[test]
    fn logical_effort_sizes_monotonically() {
        let t = tech();
        let mut w_n = [0.0; MAX_NUMBER_GATES_STAGE];
        let mut w_p = [0.0; MAX_NUMBER_GATES_STAGE];
        w_n[0] = MIN_NMOS_SIZE * t.feature_size;
        w_p[0] = t.pn_size_ratio * w_n[0];
        let c_load = gate_cap(1e-5, &t);
        let big_f = c_load / gate_cap(w_n[0] + w_p[0], &t);
        let n = logical_effort(
            1,
            1.0,
            big_f,
            &mut w_n,
            &mut w_p,
            c_load,
            t.pn_size_ratio,
            MAX_NMOS_SIZE * t.feature_size,
            &t,
        );
        assert!(n >= 1);
        for i in 1..n {
            assert!(w_n[i] >= w_n[i - 1] - 1e-18, "stage {i} shrank");
        }
    }

    #[test]
    fn pow2_check() {
        assert!(is_pow2(1));
        assert!(is_pow2(64));
        assert!(!is_pow2(0));
        assert!(!is_pow2(48));
    }
}
