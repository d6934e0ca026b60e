//! One grid of memory cells with its local periphery: row decoder,
//! precharger, bitline mux, sense amplifiers, and two output mux levels.
//! The access-path timing walks decoder -> wordline -> bitline -> mux ->
//! sense amp, with the bitline stage chosen by cell type and read mode.

use log::{error, warn};

use crate::blocks::decoder::RowDecoder;
use crate::blocks::mux::Mux;
use crate::blocks::precharger::Precharger;
use crate::blocks::senseamp::SenseAmp;
use crate::blocks::{BufferDesignTarget, UnitMetrics};
use crate::cell::{CellAccessType, MemCellType, ReadMode};
use crate::formula::{drain_cap, gate_cap, on_resistance, TransistorType};
use crate::wire::{W_SENSE_N, W_SENSE_P};
use crate::{EvalCtx, INFINITE_RAMP};

/// Smallest bitline swing a voltage sense amp can resolve. Unit: V.
pub const VOLTAGE_BIT_SENSE_MIN: f64 = 0.08;

#[derive(Debug, Clone, Default)]
pub struct SubArray {
    pub initialized: bool,
    pub invalid: bool,
    pub metrics: UnitMetrics,

    pub num_row: u64,
    pub num_column: u64,
    pub multiple_row_per_set: bool,
    /// Row decoder sits in the middle and drives half a wordline each way.
    pub split: bool,
    pub mux_sense_amp: u64,
    pub internal_sense_amp: bool,
    pub mux_output_lev1: u64,
    pub mux_output_lev2: u64,
    pub area_optimization_level: BufferDesignTarget,
    pub num_3d_levels: u64,

    pub voltage_sense: bool,
    pub sense_voltage: f64,
    pub voltage_precharge: f64,
    pub num_sense_amp: u64,
    /// Unit: m.
    pub len_wordline: f64,
    pub len_bitline: f64,
    /// Unit: F / ohm.
    pub cap_wordline: f64,
    pub cap_bitline: f64,
    pub res_wordline: f64,
    pub res_bitline: f64,
    pub res_cell_access: f64,
    pub cap_cell_access: f64,
    pub res_mem_cell_off: f64,
    pub res_mem_cell_on: f64,
    /// Series leg of the read voltage divider.
    pub res_in_serial_for_sense_amp: f64,
    pub res_equivalent_on: f64,
    pub res_equivalent_off: f64,
    /// Divider node voltages for the on and off cell states. Unit: V.
    pub voltage_mem_cell_on: f64,
    pub voltage_mem_cell_off: f64,
    pub bitline_delay: f64,
    pub bitline_delay_on: f64,
    pub bitline_delay_off: f64,
    pub charge_latency: f64,
    pub column_decoder_latency: f64,

    pub row_decoder: RowDecoder,
    pub bitline_mux_decoder: RowDecoder,
    pub bitline_mux: Mux,
    pub sense_amp_mux_lev1_decoder: RowDecoder,
    pub sense_amp_mux_lev1: Mux,
    pub sense_amp_mux_lev2_decoder: RowDecoder,
    pub sense_amp_mux_lev2: Mux,
    pub precharger: Precharger,
    pub sense_amp: SenseAmp,

    pub ramp_input: f64,
    pub ramp_output: f64,
}

fn parallel(a: f64, b: f64) -> f64 {
    a * b / (a + b)
}

impl SubArray {
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        &mut self,
        ctx: &EvalCtx,
        num_row: u64,
        num_column: u64,
        multiple_row_per_set: bool,
        split: bool,
        mux_sense_amp: u64,
        internal_sense_amp: bool,
        mux_output_lev1: u64,
        mux_output_lev2: u64,
        area_optimization_level: BufferDesignTarget,
        num_3d_levels: u64,
    ) {
        if self.initialized {
            warn!("[subarray] already initialized");
        }
        self.num_row = num_row;
        self.num_column = num_column;
        self.multiple_row_per_set = multiple_row_per_set;
        self.split = split;
        self.mux_sense_amp = mux_sense_amp;
        self.internal_sense_amp = internal_sense_amp;
        self.mux_output_lev1 = mux_output_lev1;
        self.mux_output_lev2 = mux_output_lev2;
        self.area_optimization_level = area_optimization_level;
        self.num_3d_levels = num_3d_levels.max(1);

        let cell = ctx.cell;
        let tech = ctx.tech;
        let f = tech.feature_size;

        if num_row == 0 || num_column == 0 || num_column % mux_sense_amp != 0 {
            self.invalid = true;
            self.initialized = true;
            return;
        }
        self.num_sense_amp = num_column / mux_sense_amp;

        // monolithic levels stack rows without widening the footprint
        let rows_per_level = (num_row as f64 / self.num_3d_levels as f64).ceil();
        self.len_wordline = num_column as f64 * cell.width_in_feature_size() * f;
        self.len_bitline = rows_per_level * cell.height_in_feature_size() * f;

        let local = ctx.local_wire;
        let access_width = cell.width_access_cmos * f;
        let wordline_load_per_cell = match cell.mem_cell_type {
            // both pass gates of the 6T cell hang off the wordline
            MemCellType::Sram => 2.0 * gate_cap(access_width, tech),
            _ => match cell.access_type() {
                CellAccessType::CmosAccess => gate_cap(access_width, tech),
                _ => 0.0,
            },
        };
        self.cap_wordline = self.len_wordline * local.cap_wire_per_unit
            + num_column as f64 * wordline_load_per_cell;
        self.res_wordline = self.len_wordline * local.res_wire_per_unit;
        if split {
            self.cap_wordline /= 2.0;
            self.res_wordline /= 2.0;
        }

        let bitline_load_per_cell = match cell.access_type() {
            CellAccessType::CmosAccess => {
                drain_cap(access_width, TransistorType::Nmos, 40.0 * f, tech)
            }
            _ => cell.capacitance_on,
        };
        self.cap_bitline =
            self.len_bitline * local.cap_wire_per_unit + rows_per_level * bitline_load_per_cell;
        self.res_bitline = self.len_bitline * local.res_wire_per_unit;

        if cell.access_type() == CellAccessType::CmosAccess {
            self.res_cell_access =
                on_resistance(access_width, TransistorType::Nmos, ctx.cfg.temperature, tech);
            self.cap_cell_access =
                drain_cap(access_width, TransistorType::Nmos, 40.0 * f, tech);
        }

        match cell.mem_cell_type {
            MemCellType::Sram => {
                self.voltage_sense = true;
                self.voltage_precharge = tech.vdd;
                self.sense_voltage = cell.min_sense_voltage.max(VOLTAGE_BIT_SENSE_MIN);
            }
            MemCellType::Dram | MemCellType::Edram => {
                self.voltage_sense = true;
                self.voltage_precharge = tech.vdd / 2.0;
                self.sense_voltage = cell.min_sense_voltage.max(VOLTAGE_BIT_SENSE_MIN);
                // charge sharing must leave a resolvable swing
                let swing = tech.vdd / 2.0 * cell.cap_dram_cell
                    / (cell.cap_dram_cell + self.cap_bitline);
                if swing < self.sense_voltage {
                    self.invalid = true;
                }
            }
            t if t.is_nvm() => {
                self.voltage_sense = cell.read_mode() == ReadMode::Voltage;
                self.res_mem_cell_on = cell.resistance_on_at_read_voltage();
                self.res_mem_cell_off = cell.resistance_off_at_read_voltage();
                let read_voltage = if cell.read_voltage > 0.0 {
                    cell.read_voltage
                } else {
                    tech.vdd
                };
                self.voltage_precharge = read_voltage;
                if self.voltage_sense {
                    self.res_in_serial_for_sense_amp =
                        (self.res_mem_cell_on * self.res_mem_cell_off).sqrt();
                    self.res_equivalent_on =
                        parallel(self.res_in_serial_for_sense_amp, self.res_mem_cell_on);
                    self.res_equivalent_off =
                        parallel(self.res_in_serial_for_sense_amp, self.res_mem_cell_off);
                    let divider = |r_cell: f64| {
                        read_voltage * r_cell
                            / (r_cell + self.res_in_serial_for_sense_amp + self.res_cell_access)
                    };
                    self.voltage_mem_cell_on = divider(self.res_mem_cell_on);
                    self.voltage_mem_cell_off = divider(self.res_mem_cell_off);
                    let swing =
                        (self.voltage_mem_cell_off - self.voltage_mem_cell_on).abs() / 2.0;
                    self.sense_voltage = cell.min_sense_voltage.max(1e-3);
                    if swing < self.sense_voltage {
                        self.invalid = true;
                    }
                } else {
                    self.sense_voltage = cell.min_sense_voltage.max(VOLTAGE_BIT_SENSE_MIN);
                }
            }
            _ => {
                self.voltage_sense = true;
                self.voltage_precharge = tech.vdd;
                self.sense_voltage = cell.min_sense_voltage.max(VOLTAGE_BIT_SENSE_MIN);
            }
        }

        self.row_decoder.initialize(
            ctx,
            num_row as usize,
            self.cap_wordline,
            self.res_wordline,
            multiple_row_per_set,
            area_optimization_level,
            ctx.cfg.max_driver_current,
        );

        let sense_amp_input_cap = gate_cap((W_SENSE_P + W_SENSE_N) * f, tech);
        self.bitline_mux.initialize(
            ctx,
            mux_sense_amp as usize,
            self.num_sense_amp,
            0.0,
            sense_amp_input_cap,
            ctx.cfg.max_driver_current,
        );
        let num_output_lev1 = self.num_sense_amp / mux_output_lev1.max(1);
        self.sense_amp_mux_lev1.initialize(
            ctx,
            mux_output_lev1 as usize,
            num_output_lev1,
            0.0,
            0.0,
            0.0,
        );
        let num_output_lev2 = num_output_lev1 / mux_output_lev2.max(1);
        self.sense_amp_mux_lev2.initialize(
            ctx,
            mux_output_lev2 as usize,
            num_output_lev2,
            0.0,
            0.0,
            0.0,
        );

        // one select line per mux input, loaded by every mux instance
        if mux_sense_amp > 1 {
            let cap_select = self.num_sense_amp as f64
                * gate_cap(self.bitline_mux.width_nmos_pass_transistor, tech);
            self.bitline_mux_decoder.initialize(
                ctx,
                mux_sense_amp as usize,
                cap_select,
                0.0,
                false,
                BufferDesignTarget::LatencyFirst,
                0.0,
            );
        }
        if mux_output_lev1 > 1 {
            let cap_select = num_output_lev1 as f64
                * gate_cap(self.sense_amp_mux_lev1.width_nmos_pass_transistor, tech);
            self.sense_amp_mux_lev1_decoder.initialize(
                ctx,
                mux_output_lev1 as usize,
                cap_select,
                0.0,
                false,
                BufferDesignTarget::LatencyFirst,
                0.0,
            );
        }
        if mux_output_lev2 > 1 {
            let cap_select = num_output_lev2 as f64
                * gate_cap(self.sense_amp_mux_lev2.width_nmos_pass_transistor, tech);
            self.sense_amp_mux_lev2_decoder.initialize(
                ctx,
                mux_output_lev2 as usize,
                cap_select,
                0.0,
                false,
                BufferDesignTarget::LatencyFirst,
                0.0,
            );
        }

        if self.uses_precharger(ctx) {
            self.precharger.initialize(
                ctx,
                self.voltage_precharge,
                num_column,
                self.cap_bitline,
                self.res_bitline,
            );
        }
        if internal_sense_amp {
            let pitch = self.len_wordline / self.num_sense_amp as f64;
            self.sense_amp.initialize(
                ctx,
                self.num_sense_amp,
                !self.voltage_sense,
                self.sense_voltage,
                pitch,
            );
            if self.sense_amp.invalid {
                self.invalid = true;
            }
        }

        if self.row_decoder.invalid
            || (mux_sense_amp > 1 && self.bitline_mux_decoder.invalid)
            || (mux_output_lev1 > 1 && self.sense_amp_mux_lev1_decoder.invalid)
            || (mux_output_lev2 > 1 && self.sense_amp_mux_lev2_decoder.invalid)
        {
            self.invalid = true;
        }
        self.initialized = true;
    }

    fn uses_precharger(&self, ctx: &EvalCtx) -> bool {
        self.internal_sense_amp && !ctx.cell.mem_cell_type.is_nvm()
    }

    /// Bits actually written per access, after all three mux levels.
    pub fn num_written_columns(&self) -> u64 {
        self.num_column
            / (self.mux_sense_amp * self.mux_output_lev1.max(1) * self.mux_output_lev2.max(1))
    }

    pub fn calculate_area(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[subarray] calculate_area before initialize");
            return;
        }
        if self.invalid {
            self.metrics.invalidate();
            return;
        }
        self.row_decoder.calculate_area(ctx);
        self.bitline_mux.calculate_area(ctx);
        self.sense_amp_mux_lev1.calculate_area(ctx);
        self.sense_amp_mux_lev2.calculate_area(ctx);
        if self.mux_sense_amp > 1 {
            self.bitline_mux_decoder.calculate_area(ctx);
        }
        if self.mux_output_lev1 > 1 {
            self.sense_amp_mux_lev1_decoder.calculate_area(ctx);
        }
        if self.mux_output_lev2 > 1 {
            self.sense_amp_mux_lev2_decoder.calculate_area(ctx);
        }

        let mut height = self.len_bitline;
        let mut width = self.len_wordline + self.row_decoder.metrics.width;
        if self.mux_sense_amp > 1 {
            width = width.max(self.len_wordline + self.bitline_mux_decoder.metrics.width);
        }
        height += self.bitline_mux.metrics.height;
        height += self.sense_amp_mux_lev1.metrics.height;
        height += self.sense_amp_mux_lev2.metrics.height;
        if self.uses_precharger(ctx) {
            self.precharger.calculate_area(ctx);
            height += self.precharger.metrics.height;
        }
        if self.internal_sense_amp {
            self.sense_amp.calculate_area(ctx);
            height += self.sense_amp.metrics.height;
        }
        self.metrics.height = height;
        self.metrics.width = width;
        self.metrics.area = height * width;
    }

    pub fn calculate_rc(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[subarray] calculate_rc before initialize");
            return;
        }
        if self.invalid {
            return;
        }
        self.row_decoder.calculate_rc(ctx);
        self.bitline_mux.calculate_rc(ctx);
        self.sense_amp_mux_lev1.calculate_rc(ctx);
        self.sense_amp_mux_lev2.calculate_rc(ctx);
        if self.mux_sense_amp > 1 {
            self.bitline_mux_decoder.calculate_rc(ctx);
        }
        if self.mux_output_lev1 > 1 {
            self.sense_amp_mux_lev1_decoder.calculate_rc(ctx);
        }
        if self.mux_output_lev2 > 1 {
            self.sense_amp_mux_lev2_decoder.calculate_rc(ctx);
        }
        if self.uses_precharger(ctx) {
            self.precharger.calculate_rc(ctx);
        }
        if self.internal_sense_amp {
            self.sense_amp.calculate_rc(ctx);
        }
    }

    fn bitline_delay(&mut self, ctx: &EvalCtx) {
        let cell = ctx.cell;
        let tech = ctx.tech;
        match cell.mem_cell_type {
            MemCellType::Sram => {
                let f = tech.feature_size;
                let res_pull_down = on_resistance(
                    cell.width_sram_cell_nmos * f,
                    TransistorType::Nmos,
                    ctx.cfg.temperature,
                    tech,
                );
                let tau = (self.res_cell_access + res_pull_down)
                    * (self.cap_cell_access + self.cap_bitline)
                    + self.res_bitline * self.cap_bitline / 2.0;
                self.bitline_delay = tau
                    * (self.voltage_precharge
                        / (self.voltage_precharge - self.sense_voltage))
                        .ln();
            }
            MemCellType::Dram | MemCellType::Edram => {
                // charge sharing between the cell and the bitline
                let tau = self.res_cell_access * (cell.cap_dram_cell + self.cap_bitline)
                    + self.res_bitline * self.cap_bitline / 2.0;
                self.bitline_delay = 2.3 * tau;
            }
            t if t.is_nvm() => {
                if self.voltage_sense {
                    let tau_on = self.res_equivalent_on
                        * (self.cap_cell_access + self.cap_bitline)
                        + self.res_bitline * self.cap_bitline / 2.0;
                    let tau_off = self.res_equivalent_off
                        * (self.cap_cell_access + self.cap_bitline)
                        + self.res_bitline * self.cap_bitline / 2.0;
                    self.bitline_delay_on = 2.3 * tau_on;
                    self.bitline_delay_off = 2.3 * tau_off;
                    self.bitline_delay = self.bitline_delay_on.max(self.bitline_delay_off);
                } else {
                    // current sensing holds the bitline near a fixed voltage
                    let tau = (self.res_cell_access + self.res_bitline / 2.0) * self.cap_bitline;
                    self.bitline_delay = 2.3 * tau;
                }
            }
            _ => {
                let tau = self.res_bitline * self.cap_bitline / 2.0;
                self.bitline_delay = 2.3 * tau;
            }
        }
    }

    pub fn calculate_latency(&mut self, ctx: &EvalCtx, ramp_input: f64) {
        if !self.initialized {
            error!("[subarray] calculate_latency before initialize");
            return;
        }
        if self.invalid {
            self.metrics.invalidate();
            return;
        }
        self.ramp_input = ramp_input;
        self.row_decoder.calculate_latency(ctx, ramp_input);
        self.column_decoder_latency = 0.0;
        if self.mux_sense_amp > 1 {
            self.bitline_mux_decoder.calculate_latency(ctx, ramp_input);
            self.column_decoder_latency = self
                .column_decoder_latency
                .max(self.bitline_mux_decoder.metrics.read_latency);
        }
        if self.mux_output_lev1 > 1 {
            self.sense_amp_mux_lev1_decoder.calculate_latency(ctx, ramp_input);
            self.column_decoder_latency = self
                .column_decoder_latency
                .max(self.sense_amp_mux_lev1_decoder.metrics.read_latency);
        }
        if self.mux_output_lev2 > 1 {
            self.sense_amp_mux_lev2_decoder.calculate_latency(ctx, ramp_input);
            self.column_decoder_latency = self
                .column_decoder_latency
                .max(self.sense_amp_mux_lev2_decoder.metrics.read_latency);
        }

        self.bitline_delay(ctx);
        self.bitline_mux.calculate_latency(ctx, INFINITE_RAMP);
        self.sense_amp_mux_lev1.calculate_latency(ctx, INFINITE_RAMP);
        self.sense_amp_mux_lev2.calculate_latency(ctx, INFINITE_RAMP);
        if self.uses_precharger(ctx) {
            self.precharger.calculate_latency(ctx, ramp_input);
        }

        let array_path = self.row_decoder.metrics.read_latency + self.bitline_delay;
        let mut read = array_path.max(self.column_decoder_latency);
        read += self.bitline_mux.metrics.read_latency;
        if self.internal_sense_amp {
            self.sense_amp.calculate_latency(ctx, INFINITE_RAMP);
            read += self.sense_amp.metrics.read_latency;
        }
        read += self.sense_amp_mux_lev1.metrics.read_latency;
        read += self.sense_amp_mux_lev2.metrics.read_latency;
        self.metrics.read_latency = read;

        self.charge_latency = 2.3 * self.res_bitline * self.cap_bitline / 2.0;
        let setup = self
            .row_decoder
            .metrics
            .read_latency
            .max(self.column_decoder_latency);
        let cell = ctx.cell;
        match cell.mem_cell_type {
            t if t.is_nvm() => {
                self.metrics.set_latency = setup + self.charge_latency + cell.set_pulse;
                self.metrics.reset_latency = setup + self.charge_latency + cell.reset_pulse;
                self.metrics.write_latency =
                    self.metrics.set_latency.max(self.metrics.reset_latency);
            }
            _ => {
                self.metrics.write_latency = setup + self.charge_latency;
                self.metrics.set_latency = self.metrics.write_latency;
                self.metrics.reset_latency = self.metrics.write_latency;
            }
        }

        if cell.mem_cell_type.needs_refresh() {
            // refresh walks every row: decode, sense, restore
            let per_row = self.row_decoder.metrics.read_latency
                + self.bitline_delay
                + self.sense_amp.metrics.refresh_latency;
            self.metrics.refresh_latency = self.num_row as f64 * per_row;
        }

        self.ramp_output = if self.internal_sense_amp {
            INFINITE_RAMP
        } else {
            self.row_decoder.ramp_output
        };
    }

    pub fn calculate_power(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[subarray] calculate_power before initialize");
            return;
        }
        if self.invalid {
            self.metrics.invalidate();
            return;
        }
        let cell = ctx.cell;
        let tech = ctx.tech;
        let vdd = tech.vdd;

        self.row_decoder.calculate_power(ctx);
        self.bitline_mux.calculate_power(ctx);
        self.sense_amp_mux_lev1.calculate_power(ctx);
        self.sense_amp_mux_lev2.calculate_power(ctx);
        let mut decoder_energy = self.row_decoder.metrics.read_dynamic_energy;
        let mut leakage = self.row_decoder.metrics.leakage;
        if self.mux_sense_amp > 1 {
            self.bitline_mux_decoder.calculate_power(ctx);
            decoder_energy += self.bitline_mux_decoder.metrics.read_dynamic_energy;
            leakage += self.bitline_mux_decoder.metrics.leakage;
        }
        if self.mux_output_lev1 > 1 {
            self.sense_amp_mux_lev1_decoder.calculate_power(ctx);
            decoder_energy += self.sense_amp_mux_lev1_decoder.metrics.read_dynamic_energy;
            leakage += self.sense_amp_mux_lev1_decoder.metrics.leakage;
        }
        if self.mux_output_lev2 > 1 {
            self.sense_amp_mux_lev2_decoder.calculate_power(ctx);
            decoder_energy += self.sense_amp_mux_lev2_decoder.metrics.read_dynamic_energy;
            leakage += self.sense_amp_mux_lev2_decoder.metrics.leakage;
        }

        let mux_energy = self.bitline_mux.metrics.read_dynamic_energy
            + self.sense_amp_mux_lev1.metrics.read_dynamic_energy
            + self.sense_amp_mux_lev2.metrics.read_dynamic_energy;

        let mut read = decoder_energy + mux_energy;
        let mut write = decoder_energy + mux_energy;
        if self.uses_precharger(ctx) {
            self.precharger.calculate_power(ctx);
            read += self.precharger.metrics.read_dynamic_energy;
            write += self.precharger.metrics.write_dynamic_energy;
            leakage += self.precharger.metrics.leakage;
        }
        if self.internal_sense_amp {
            self.sense_amp.calculate_power(ctx);
            read += self.sense_amp.metrics.read_dynamic_energy;
            leakage += self.sense_amp.metrics.leakage;
        }

        let written = self.num_written_columns() as f64;
        match cell.mem_cell_type {
            MemCellType::Sram => {
                // partial swing on every column during a read, full swing on
                // the written columns
                read += self.num_column as f64
                    * self.cap_bitline
                    * self.voltage_precharge
                    * self.sense_voltage;
                write += written * self.cap_bitline * vdd * vdd;
                let f = tech.feature_size;
                let cell_leak = cell.width_sram_cell_nmos
                    * f
                    * tech.current_off_nmos(ctx.cfg.temperature)
                    * vdd;
                leakage += self.num_row as f64 * self.num_column as f64 * cell_leak;
            }
            MemCellType::Dram | MemCellType::Edram => {
                read += self.num_column as f64
                    * self.cap_bitline
                    * self.voltage_precharge
                    * self.sense_voltage;
                // destructive read: restore is a full write-back
                write += written * self.cap_bitline * vdd * vdd;
                let per_row = self.row_decoder.metrics.read_dynamic_energy
                    + self.num_column as f64
                        * self.cap_bitline
                        * self.voltage_precharge
                        * self.sense_voltage
                    + self.sense_amp.metrics.refresh_dynamic_energy;
                self.metrics.refresh_dynamic_energy = self.num_row as f64 * per_row;
            }
            t if t.is_nvm() => {
                let read_voltage = self.voltage_precharge;
                self.metrics.cell_read_energy = if self.voltage_sense {
                    self.num_sense_amp as f64 * read_voltage * read_voltage
                        / self.res_equivalent_on
                        * self.bitline_delay
                } else {
                    self.num_sense_amp as f64
                        * cell.read_current
                        * read_voltage
                        * self.bitline_delay
                };
                read += self.metrics.cell_read_energy;

                let set_energy_per_cell = if cell.set_energy > 0.0 {
                    cell.set_energy
                } else {
                    let v = if cell.set_voltage > 0.0 { cell.set_voltage } else { vdd };
                    cell.set_current * v * cell.set_pulse
                };
                let reset_energy_per_cell = if cell.reset_energy > 0.0 {
                    cell.reset_energy
                } else {
                    let v = if cell.reset_voltage > 0.0 { cell.reset_voltage } else { vdd };
                    cell.reset_current * v * cell.reset_pulse
                };
                self.metrics.cell_set_energy = written * set_energy_per_cell;
                self.metrics.cell_reset_energy = written * reset_energy_per_cell;
                self.metrics.set_dynamic_energy = write + self.metrics.cell_set_energy;
                self.metrics.reset_dynamic_energy = write + self.metrics.cell_reset_energy;
                // writes flip half the bits each way on average
                write += (self.metrics.cell_set_energy + self.metrics.cell_reset_energy) / 2.0;
            }
            _ => {}
        }

        self.metrics.read_dynamic_energy = read;
        self.metrics.write_dynamic_energy = write;
        if !cell.mem_cell_type.is_nvm() {
            self.metrics.set_dynamic_energy = write;
            self.metrics.reset_dynamic_energy = write;
        }
        self.metrics.leakage = leakage;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::tests::fixture;
    use crate::INFINITE_RAMP;

    fn evaluate(sub: &mut SubArray, ctx: &EvalCtx) {
        sub.calculate_area(ctx);
        sub.calculate_rc(ctx);
        sub.calculate_latency(ctx, INFINITE_RAMP);
        sub.calculate_power(ctx);
    }

    fn build_sram(rows: u64, cols: u64) -> (fixture::Fixture, SubArray) {
        let fx = fixture::sram();
        let mut sub = SubArray::default();
        {
            let ctx = fx.ctx();
            sub.initialize(
                &ctx,
                rows,
                cols,
                false,
                false,
                4,
                true,
                2,
                1,
                BufferDesignTarget::LatencyFirst,
                1,
            );
        }
        (fx, sub)
    }

    #[test]
    fn sram_subarray_produces_full_metrics() {
        let (fx, mut sub) = build_sram(256, 256);
        let ctx = fx.ctx();
        assert!(!sub.invalid);
        evaluate(&mut sub, &ctx);
        assert!(sub.metrics.area > 0.0);
        assert!(sub.bitline_delay > 0.0);
        assert!(sub.metrics.read_latency > sub.bitline_delay);
        assert!(sub.metrics.write_latency > 0.0);
        assert!(sub.metrics.read_dynamic_energy > 0.0);
        assert!(sub.metrics.leakage > 0.0);
        assert_eq!(sub.num_sense_amp, 64);
        assert_eq!(sub.num_written_columns(), 32);
        assert_eq!(sub.ramp_output, INFINITE_RAMP);
    }

    #[test]
    fn taller_array_has_slower_bitlines() {
        let (fx_short, mut short) = build_sram(128, 256);
        let ctx = fx_short.ctx();
        evaluate(&mut short, &ctx);
        let (fx_tall, mut tall) = build_sram(1024, 256);
        let ctx = fx_tall.ctx();
        evaluate(&mut tall, &ctx);
        assert!(tall.bitline_delay > short.bitline_delay);
        assert!(tall.metrics.read_latency > short.metrics.read_latency);
    }

    #[test]
    fn invalid_child_poisons_the_subarray() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut sub = SubArray::default();
        // mux ratio does not divide the columns
        sub.initialize(
            &ctx,
            64,
            100,
            false,
            false,
            8,
            true,
            1,
            1,
            BufferDesignTarget::LatencyFirst,
            1,
        );
        assert!(sub.invalid);
        evaluate(&mut sub, &ctx);
        assert!(sub.metrics.is_invalidated());
    }

    #[test]
    fn edram_gets_a_refresh_budget() {
        let fx = fixture::edram();
        let ctx = fx.ctx();
        let mut sub = SubArray::default();
        sub.initialize(
            &ctx,
            64,
            64,
            false,
            false,
            1,
            true,
            1,
            1,
            BufferDesignTarget::LatencyFirst,
            1,
        );
        assert!(!sub.invalid);
        evaluate(&mut sub, &ctx);
        assert!(sub.metrics.refresh_latency > sub.metrics.read_latency);
        assert!(sub.metrics.refresh_dynamic_energy > 0.0);
    }

    #[test]
    fn mram_write_includes_the_programming_pulse() {
        let fx = fixture::mram();
        let ctx = fx.ctx();
        let mut sub = SubArray::default();
        sub.initialize(
            &ctx,
            128,
            128,
            false,
            false,
            4,
            true,
            1,
            1,
            BufferDesignTarget::LatencyFirst,
            1,
        );
        assert!(!sub.invalid);
        evaluate(&mut sub, &ctx);
        assert!(sub.metrics.set_latency >= ctx.cell.set_pulse);
        assert!(sub.metrics.write_latency >= sub.metrics.set_latency.max(sub.metrics.reset_latency) - 1e-18);
        assert!(sub.metrics.cell_set_energy > 0.0);
        assert!(sub.metrics.cell_read_energy > 0.0);
    }

    #[test]
    fn monolithic_levels_shorten_bitlines() {
        let fx = fixture::mram();
        let mut flat = SubArray::default();
        let mut stacked = SubArray::default();
        {
            let ctx = fx.ctx();
            flat.initialize(&ctx, 256, 128, false, false, 4, true, 1, 1, BufferDesignTarget::LatencyFirst, 1);
            stacked.initialize(&ctx, 256, 128, false, false, 4, true, 1, 1, BufferDesignTarget::LatencyFirst, 2);
        }
        assert!(stacked.len_bitline < flat.len_bitline);
    }
}
