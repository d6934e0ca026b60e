//! Process technology parameters: tabulated per-node device data with linear
//! interpolation between neighboring nodes, temperature-indexed current
//! tables, and TSV parasitics for die stacking.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::wire::WireType;

/// Tabulated process nodes, in nm. Other nodes are produced by linear
/// interpolation between the two neighbors.
pub const TABULATED_NODES: [u32; 7] = [22, 32, 45, 65, 90, 120, 200];

pub const NUM_TSV_TYPES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRoadmap {
    /// High performance.
    Hp,
    /// Low standby power.
    Lstp,
    /// Low operating power.
    Lop,
    /// Embedded DRAM process (boosted wordline supply).
    Edram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TsvType {
    /// ITRS-style high density.
    Fine = 0,
    /// Coarse, industry-reported geometry.
    Coarse = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TsvProjection {
    Aggressive = 0,
    Conservative = 1,
}

#[derive(Debug, Clone)]
pub struct Technology {
    pub feature_size_nm: u32,
    /// Process feature size. Unit: m.
    pub feature_size: f64,
    pub device_roadmap: DeviceRoadmap,
    /// Supply voltage. Unit: V.
    pub vdd: f64,
    /// Wordline overdrive voltage (eDRAM). Unit: V.
    pub vpp: f64,
    pub vth: f64,
    pub vdsat_nmos: f64,
    pub vdsat_pmos: f64,
    /// Physical gate length. Unit: m.
    pub phy_gate_length: f64,
    /// Ideal gate capacitance. Unit: F/m of width.
    pub cap_ideal_gate: f64,
    pub cap_fringe: f64,
    /// Junction bottom capacitance. Unit: F/m^2.
    pub cap_junction: f64,
    pub cap_overlap: f64,
    pub cap_sidewall: f64,
    pub cap_drain_to_channel: f64,
    /// Electrical oxide capacitance. Unit: F/m^2.
    pub cap_ox: f64,
    pub build_in_potential: f64,
    pub effective_electron_mobility: f64,
    pub effective_hole_mobility: f64,
    pub pn_size_ratio: f64,
    pub effective_resistance_multiplier: f64,
    pub cap_polywire: f64,

    /// Saturation / off currents indexed from 300 K to 400 K. Unit: A/m.
    current_on_nmos: [f64; 101],
    current_on_pmos: [f64; 101],
    current_off_nmos: [f64; 101],
    current_off_pmos: [f64; 101],

    /// Per-crossing TSV parasitics, indexed by [`TsvType`].
    pub cap_tsv: [f64; NUM_TSV_TYPES],
    pub res_tsv: [f64; NUM_TSV_TYPES],
    /// Occupied area per TSV. Unit: m^2.
    pub area_tsv: [f64; NUM_TSV_TYPES],

    layer_count: usize,
}

/// One tabulated node entry. Currents are given at 300 K; the temperature
/// curves are generated analytically.
struct NodeParams {
    vdd: f64,
    vpp: f64,
    vth: f64,
    vdsat_nmos: f64,
    vdsat_pmos: f64,
    phy_gate_length: f64,
    cap_ox: f64,
    cap_fringe: f64,
    cap_junction: f64,
    cap_overlap_per_width: f64,
    cap_sidewall: f64,
    cap_drain_to_channel: f64,
    mobility_electron: f64,
    mobility_hole: f64,
    pn_size_ratio: f64,
    effective_resistance_multiplier: f64,
    ion_nmos: f64,
    ion_pmos: f64,
    ioff_nmos: f64,
    ioff_pmos: f64,
}

fn node_params(node: u32, roadmap: DeviceRoadmap) -> NodeParams {
    // Representative ITRS-class values. Gate length ~0.55x of the node,
    // oxide capacitance rising and supply falling as nodes shrink.
    let f = node as f64 * 1e-9;
    let lg = 0.55 * f;
    let cap_ox = match node {
        200 => 0.9e-2,
        120 => 1.1e-2,
        90 => 1.4e-2,
        65 => 1.7e-2,
        45 => 2.2e-2,
        32 => 2.7e-2,
        _ => 3.3e-2,
    };
    let (vdd, vth, ion_n, ioff_n) = match roadmap {
        DeviceRoadmap::Hp => match node {
            200 => (1.5, 0.31, 750.0, 1e-2),
            120 => (1.2, 0.28, 900.0, 1e-1),
            90 => (1.1, 0.26, 1000.0, 1.0),
            65 => (1.1, 0.22, 1100.0, 10.0),
            45 => (1.0, 0.18, 1250.0, 30.0),
            32 => (0.9, 0.17, 1400.0, 80.0),
            _ => (0.8, 0.15, 1550.0, 100.0),
        },
        DeviceRoadmap::Lstp => match node {
            200 => (1.5, 0.60, 380.0, 1e-5),
            120 => (1.3, 0.56, 440.0, 1e-5),
            90 => (1.2, 0.53, 480.0, 2e-5),
            65 => (1.2, 0.50, 520.0, 3e-5),
            45 => (1.1, 0.47, 580.0, 5e-5),
            32 => (1.0, 0.44, 650.0, 1e-4),
            _ => (0.9, 0.42, 720.0, 2e-4),
        },
        DeviceRoadmap::Lop => match node {
            200 => (1.2, 0.42, 520.0, 1e-3),
            120 => (1.0, 0.38, 600.0, 3e-3),
            90 => (0.9, 0.35, 650.0, 1e-2),
            65 => (0.8, 0.32, 700.0, 4e-2),
            45 => (0.7, 0.29, 770.0, 1e-1),
            32 => (0.6, 0.27, 840.0, 3e-1),
            _ => (0.55, 0.25, 900.0, 1.0),
        },
        // eDRAM processes pair LSTP-like access devices with a boosted
        // wordline rail.
        DeviceRoadmap::Edram => match node {
            200 => (1.6, 0.65, 360.0, 5e-6),
            120 => (1.4, 0.60, 420.0, 5e-6),
            90 => (1.3, 0.56, 460.0, 1e-5),
            65 => (1.2, 0.52, 500.0, 2e-5),
            45 => (1.1, 0.49, 560.0, 3e-5),
            32 => (1.0, 0.46, 620.0, 6e-5),
            _ => (0.9, 0.44, 690.0, 1e-4),
        },
    };
    let vpp = match roadmap {
        DeviceRoadmap::Edram => vdd + 0.4,
        _ => vdd,
    };
    NodeParams {
        vdd,
        vpp,
        vth,
        vdsat_nmos: 0.1 + 0.5 * vth,
        vdsat_pmos: 0.12 + 0.6 * vth,
        phy_gate_length: lg,
        cap_ox,
        cap_fringe: 2.4e-10,
        cap_junction: 1.0e-3,
        cap_overlap_per_width: 1.8e-10,
        cap_sidewall: 2.5e-10,
        cap_drain_to_channel: 3.0e-10,
        mobility_electron: 0.032 * (node as f64 / 90.0).powf(0.3),
        mobility_hole: 0.012 * (node as f64 / 90.0).powf(0.3),
        pn_size_ratio: 2.0,
        effective_resistance_multiplier: match roadmap {
            DeviceRoadmap::Hp => 1.54,
            _ => 1.92,
        },
        ion_nmos: ion_n,
        ion_pmos: ion_n * 0.55,
        ioff_nmos: ioff_n,
        ioff_pmos: ioff_n * 0.9,
    }
}

impl Technology {
    fn from_tabulated(node: u32, roadmap: DeviceRoadmap) -> Self {
        let p = node_params(node, roadmap);
        let feature_size = node as f64 * 1e-9;

        let mut current_on_nmos = [0.0; 101];
        let mut current_on_pmos = [0.0; 101];
        let mut current_off_nmos = [0.0; 101];
        let mut current_off_pmos = [0.0; 101];
        for i in 0..101 {
            // Drive current degrades slowly with temperature; subthreshold
            // leakage grows exponentially (about 30x from 300 K to 400 K).
            let on_derate = 1.0 - 0.0015 * i as f64;
            let off_boost = (i as f64 * 30f64.ln() / 100.0).exp();
            current_on_nmos[i] = p.ion_nmos * on_derate;
            current_on_pmos[i] = p.ion_pmos * on_derate;
            current_off_nmos[i] = p.ioff_nmos * off_boost;
            current_off_pmos[i] = p.ioff_pmos * off_boost;
        }

        Technology {
            feature_size_nm: node,
            feature_size,
            device_roadmap: roadmap,
            vdd: p.vdd,
            vpp: p.vpp,
            vth: p.vth,
            vdsat_nmos: p.vdsat_nmos,
            vdsat_pmos: p.vdsat_pmos,
            phy_gate_length: p.phy_gate_length,
            cap_ideal_gate: p.cap_ox * p.phy_gate_length,
            cap_fringe: p.cap_fringe,
            cap_junction: p.cap_junction,
            cap_overlap: p.cap_overlap_per_width,
            cap_sidewall: p.cap_sidewall,
            cap_drain_to_channel: p.cap_drain_to_channel,
            cap_ox: p.cap_ox,
            build_in_potential: 0.9,
            effective_electron_mobility: p.mobility_electron,
            effective_hole_mobility: p.mobility_hole,
            pn_size_ratio: p.pn_size_ratio,
            effective_resistance_multiplier: p.effective_resistance_multiplier,
            cap_polywire: 1.0e-10,
            current_on_nmos,
            current_on_pmos,
            current_off_nmos,
            current_off_pmos,
            cap_tsv: [0.0; NUM_TSV_TYPES],
            res_tsv: [0.0; NUM_TSV_TYPES],
            area_tsv: [0.0; NUM_TSV_TYPES],
            layer_count: 1,
        }
    }

    /// Build the technology object for an arbitrary process node, linearly
    /// interpolating between the two neighboring tabulated nodes.
    pub fn for_node(node_nm: u32, roadmap: DeviceRoadmap) -> Result<Self> {
        let min = TABULATED_NODES[0];
        let max = TABULATED_NODES[TABULATED_NODES.len() - 1];
        if node_nm < min || node_nm > max {
            bail!("process node {node_nm} nm is outside the supported range {min}-{max} nm");
        }
        if TABULATED_NODES.contains(&node_nm) {
            return Ok(Self::from_tabulated(node_nm, roadmap));
        }
        let upper = *TABULATED_NODES.iter().find(|&&n| n > node_nm).unwrap();
        let lower = *TABULATED_NODES.iter().rev().find(|&&n| n < node_nm).unwrap();
        let alpha = (node_nm - lower) as f64 / (upper - lower) as f64;
        let mut tech = Self::from_tabulated(lower, roadmap);
        let other = Self::from_tabulated(upper, roadmap);
        tech.interpolate_with(&other, alpha);
        tech.feature_size_nm = node_nm;
        tech.feature_size = node_nm as f64 * 1e-9;
        Ok(tech)
    }

    /// Linear mix of every electrical parameter: `self = (1 - alpha) * self
    /// + alpha * rhs`.
    pub fn interpolate_with(&mut self, rhs: &Technology, alpha: f64) {
        let mix = |a: f64, b: f64| a * (1.0 - alpha) + b * alpha;
        self.vdd = mix(self.vdd, rhs.vdd);
        self.vpp = mix(self.vpp, rhs.vpp);
        self.vth = mix(self.vth, rhs.vth);
        self.vdsat_nmos = mix(self.vdsat_nmos, rhs.vdsat_nmos);
        self.vdsat_pmos = mix(self.vdsat_pmos, rhs.vdsat_pmos);
        self.phy_gate_length = mix(self.phy_gate_length, rhs.phy_gate_length);
        self.cap_ideal_gate = mix(self.cap_ideal_gate, rhs.cap_ideal_gate);
        self.cap_fringe = mix(self.cap_fringe, rhs.cap_fringe);
        self.cap_junction = mix(self.cap_junction, rhs.cap_junction);
        self.cap_overlap = mix(self.cap_overlap, rhs.cap_overlap);
        self.cap_sidewall = mix(self.cap_sidewall, rhs.cap_sidewall);
        self.cap_drain_to_channel = mix(self.cap_drain_to_channel, rhs.cap_drain_to_channel);
        self.cap_ox = mix(self.cap_ox, rhs.cap_ox);
        self.build_in_potential = mix(self.build_in_potential, rhs.build_in_potential);
        self.effective_electron_mobility =
            mix(self.effective_electron_mobility, rhs.effective_electron_mobility);
        self.effective_hole_mobility =
            mix(self.effective_hole_mobility, rhs.effective_hole_mobility);
        self.pn_size_ratio = mix(self.pn_size_ratio, rhs.pn_size_ratio);
        self.effective_resistance_multiplier = mix(
            self.effective_resistance_multiplier,
            rhs.effective_resistance_multiplier,
        );
        self.cap_polywire = mix(self.cap_polywire, rhs.cap_polywire);
        for i in 0..101 {
            self.current_on_nmos[i] = mix(self.current_on_nmos[i], rhs.current_on_nmos[i]);
            self.current_on_pmos[i] = mix(self.current_on_pmos[i], rhs.current_on_pmos[i]);
            self.current_off_nmos[i] = mix(self.current_off_nmos[i], rhs.current_off_nmos[i]);
            self.current_off_pmos[i] = mix(self.current_off_pmos[i], rhs.current_off_pmos[i]);
        }
    }

    fn temp_index(temperature: u32) -> usize {
        (temperature.clamp(300, 400) - 300) as usize
    }

    pub fn current_on_nmos(&self, temperature: u32) -> f64 {
        self.current_on_nmos[Self::temp_index(temperature)]
    }

    pub fn current_on_pmos(&self, temperature: u32) -> f64 {
        self.current_on_pmos[Self::temp_index(temperature)]
    }

    pub fn current_off_nmos(&self, temperature: u32) -> f64 {
        self.current_off_nmos[Self::temp_index(temperature)]
    }

    pub fn current_off_pmos(&self, temperature: u32) -> f64 {
        self.current_off_pmos[Self::temp_index(temperature)]
    }

    pub fn layer_count(&self) -> usize {
        self.layer_count
    }

    /// Map a wire flavor to the TSV geometry used alongside it: local and
    /// semi-global wires pair with fine TSVs, global wires with coarse ones.
    pub fn wire_type_to_tsv_type(wire_type: WireType) -> TsvType {
        match wire_type {
            WireType::LocalAggressive
            | WireType::LocalConservative
            | WireType::SemiAggressive
            | WireType::SemiConservative => TsvType::Fine,
            WireType::GlobalAggressive | WireType::GlobalConservative => TsvType::Coarse,
        }
    }

    pub fn tsv_resistance(
        resistivity: f64,
        tsv_len: f64,
        tsv_diam: f64,
        tsv_contact_resistance: f64,
    ) -> f64 {
        resistivity * tsv_len / (std::f64::consts::PI * (tsv_diam / 2.0) * (tsv_diam / 2.0))
            + tsv_contact_resistance
    }

    /// Coaxial MOS capacitance of a TSV: oxide liner in series with the
    /// silicon depletion region.
    pub fn tsv_capacitance(
        tsv_len: f64,
        tsv_diam: f64,
        _tsv_pitch: f64,
        dielec_thickness: f64,
        liner_dielectric_constant: f64,
        depletion_width: f64,
    ) -> f64 {
        const EPS0: f64 = 8.85e-12;
        const K_SILICON: f64 = 11.9;
        let r = tsv_diam / 2.0;
        let c_oxide = 2.0 * std::f64::consts::PI * EPS0 * liner_dielectric_constant * tsv_len
            / ((r + dielec_thickness) / r).ln();
        let c_depletion = 2.0 * std::f64::consts::PI * EPS0 * K_SILICON * tsv_len
            / ((r + dielec_thickness + depletion_width) / (r + dielec_thickness)).ln();
        c_oxide * c_depletion / (c_oxide + c_depletion)
    }

    pub fn tsv_area(tsv_pitch: f64) -> f64 {
        tsv_pitch * tsv_pitch
    }

    /// Record the die count and resolve the per-crossing TSV parasitics
    /// from the configured projection for each TSV class. One crossing spans
    /// one die; the bank model charges crossings per access, so the
    /// per-crossing R/C does not depend on the stack height.
    pub fn set_layer_count(
        &mut self,
        local_projection: TsvProjection,
        global_projection: TsvProjection,
        layers: usize,
    ) {
        const CU_RESISTIVITY: f64 = 1.8e-8; // ohm*m, bulk copper

        self.layer_count = layers.max(1);
        for (idx, tsv_type) in [TsvType::Fine, TsvType::Coarse].into_iter().enumerate() {
            let projection = match tsv_type {
                TsvType::Fine => local_projection,
                TsvType::Coarse => global_projection,
            };
            let g = tsv_geometry(projection, tsv_type);
            self.res_tsv[idx] =
                Self::tsv_resistance(CU_RESISTIVITY, g.length, g.diameter, g.contact_resistance);
            self.cap_tsv[idx] = Self::tsv_capacitance(
                g.length,
                g.diameter,
                g.pitch,
                g.dielec_thickness,
                g.liner_dielectric_constant,
                g.depletion_width,
            );
            self.area_tsv[idx] = Self::tsv_area(g.pitch);
        }
    }
}

struct TsvGeometry {
    pitch: f64,
    diameter: f64,
    length: f64,
    dielec_thickness: f64,
    contact_resistance: f64,
    depletion_width: f64,
    liner_dielectric_constant: f64,
}

fn tsv_geometry(projection: TsvProjection, tsv_type: TsvType) -> TsvGeometry {
    match (projection, tsv_type) {
        (TsvProjection::Aggressive, TsvType::Fine) => TsvGeometry {
            pitch: 4.4e-6,
            diameter: 1.3e-6,
            length: 20e-6,
            dielec_thickness: 0.1e-6,
            contact_resistance: 0.1,
            depletion_width: 0.6e-6,
            liner_dielectric_constant: 3.9,
        },
        (TsvProjection::Aggressive, TsvType::Coarse) => TsvGeometry {
            pitch: 10e-6,
            diameter: 4e-6,
            length: 40e-6,
            dielec_thickness: 0.2e-6,
            contact_resistance: 0.15,
            depletion_width: 0.6e-6,
            liner_dielectric_constant: 3.9,
        },
        (TsvProjection::Conservative, TsvType::Fine) => TsvGeometry {
            pitch: 15e-6,
            diameter: 5e-6,
            length: 50e-6,
            dielec_thickness: 0.3e-6,
            contact_resistance: 0.2,
            depletion_width: 0.6e-6,
            liner_dielectric_constant: 3.9,
        },
        (TsvProjection::Conservative, TsvType::Coarse) => TsvGeometry {
            pitch: 25e-6,
            diameter: 10e-6,
            length: 60e-6,
            dielec_thickness: 0.5e-6,
            contact_resistance: 0.25,
            depletion_width: 0.6e-6,
            liner_dielectric_constant: 3.9,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn tabulated_node_is_exact() {
        let t = Technology::for_node(65, DeviceRoadmap::Hp).unwrap();
        assert_eq!(t.feature_size_nm, 65);
        assert_relative_eq!(t.vdd, 1.1);
    }

    #[test]
    fn interpolated_node_lies_between_neighbors() {
        let lo = Technology::for_node(65, DeviceRoadmap::Hp).unwrap();
        let hi = Technology::for_node(90, DeviceRoadmap::Hp).unwrap();
        let mid = Technology::for_node(70, DeviceRoadmap::Hp).unwrap();
        assert!(mid.vdd >= lo.vdd.min(hi.vdd) && mid.vdd <= lo.vdd.max(hi.vdd));
        assert!(mid.phy_gate_length > lo.phy_gate_length);
        assert!(mid.phy_gate_length < hi.phy_gate_length);
    }

    #[test]
    fn out_of_range_node_is_rejected() {
        assert!(Technology::for_node(14, DeviceRoadmap::Hp).is_err());
        assert!(Technology::for_node(350, DeviceRoadmap::Hp).is_err());
    }

    #[test]
    fn leakage_grows_with_temperature() {
        let t = Technology::for_node(45, DeviceRoadmap::Lop).unwrap();
        assert!(t.current_off_nmos(400) > t.current_off_nmos(300) * 10.0);
        assert!(t.current_on_nmos(400) < t.current_on_nmos(300));
    }

    #[test]
    fn tsv_tables_populated_after_layer_setup() {
        let mut t = Technology::for_node(32, DeviceRoadmap::Hp).unwrap();
        t.set_layer_count(TsvProjection::Aggressive, TsvProjection::Conservative, 4);
        assert_eq!(t.layer_count(), 4);
        for i in 0..NUM_TSV_TYPES {
            assert!(t.res_tsv[i] > 0.0);
            assert!(t.cap_tsv[i] > 0.0);
            assert!(t.area_tsv[i] > 0.0);
        }
        // coarse TSVs are physically larger
        assert!(t.area_tsv[TsvType::Coarse as usize] > t.area_tsv[TsvType::Fine as usize]);
    }

    #[test]
    fn tsv_parasitics_are_per_crossing() {
        let mut short = Technology::for_node(32, DeviceRoadmap::Hp).unwrap();
        short.set_layer_count(TsvProjection::Aggressive, TsvProjection::Conservative, 2);
        let mut tall = short.clone();
        tall.set_layer_count(TsvProjection::Aggressive, TsvProjection::Conservative, 8);
        assert_eq!(tall.layer_count(), 8);
        // one crossing spans one die; taller stacks pay more crossings, not
        // larger ones
        assert_eq!(short.res_tsv, tall.res_tsv);
        assert_eq!(short.cap_tsv, tall.cap_tsv);
    }

    #[test]
    fn edram_roadmap_boosts_wordline() {
        let t = Technology::for_node(65, DeviceRoadmap::Edram).unwrap();
        assert!(t.vpp > t.vdd);
    }
}
