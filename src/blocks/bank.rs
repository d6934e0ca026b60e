//! A bank is a grid of mats plus the routing that carries address and
//! data between the bank edge and the active mats. Routing is either an
//! H-tree over the global wire flavor or direct wiring with optional
//! external (bank-edge) sensing. Stacked dies replicate the bank and
//! connect through a TSV array.

use log::{error, warn};
use serde::Serialize;

use crate::blocks::comparator::Comparator;
use crate::blocks::mat::Mat;
use crate::blocks::mux::Mux;
use crate::blocks::senseamp::SenseAmp;
use crate::blocks::tsv::Tsv;
use crate::blocks::{BufferDesignTarget, MemoryType, UnitMetrics};
use crate::cell::{MemCellType, ReadMode};
use crate::config::{CacheAccessMode, DesignTarget, RoutingMode};
use crate::tech::Technology;
use crate::{EvalCtx, INFINITE_RAMP};

/// Data banks must not be more elongated than this.
pub const CONSTRAINT_ASPECT_RATIO_BANK: f64 = 3.0;

fn log2_exact(n: u64) -> Option<u32> {
    if n.is_power_of_two() {
        Some(n.trailing_zeros())
    } else {
        None
    }
}

/// Full organization of one bank candidate, produced by the sweep.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BankOrg {
    pub memory_type: MemoryType,
    pub routing: RoutingMode,
    /// Storage of the whole bank across all dies. Unit: bit.
    pub capacity_bits: u64,
    /// Bits delivered per access.
    pub block_size: u64,
    pub associativity: u64,
    pub num_row_mat: u64,
    pub num_column_mat: u64,
    pub num_active_mat_per_row: u64,
    pub num_active_mat_per_column: u64,
    pub num_row_subarray: u64,
    pub num_column_subarray: u64,
    pub num_active_subarray_per_row: u64,
    pub num_active_subarray_per_column: u64,
    pub num_row_per_set: u64,
    pub mux_sense_amp: u64,
    pub mux_output_lev1: u64,
    pub mux_output_lev2: u64,
    pub internal_sense_amp: bool,
    pub area_optimization_level: BufferDesignTarget,
    pub stacked_die_count: u64,
    pub partition_granularity: u32,
    pub monolithic_stack_count: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Bank {
    pub initialized: bool,
    pub invalid: bool,
    pub metrics: UnitMetrics,

    pub memory_type: MemoryType,
    pub routing: RoutingMode,
    pub capacity_bits: u64,
    pub block_size: u64,
    pub associativity: u64,
    pub num_row_mat: u64,
    pub num_column_mat: u64,
    pub num_active_mat_per_row: u64,
    pub num_active_mat_per_column: u64,
    pub internal_sense_amp: bool,
    pub stacked_die_count: u64,
    pub partition_granularity: u32,

    pub num_way: u64,
    pub num_address_bit: u32,
    pub num_address_bit_route_to_mat: u32,
    pub num_data_bit_route_to_mat: u64,

    pub mat: Mat,
    pub global_sense_amp: SenseAmp,
    pub global_bitline_mux: Mux,
    pub global_comparator: Comparator,
    pub tsv_array: Tsv,

    /// Interconnect share of the bank metrics, for reporting.
    pub routing_metrics: UnitMetrics,
}

impl Bank {
    pub fn initialize(&mut self, ctx: &EvalCtx, org: &BankOrg) {
        if self.initialized {
            // sweeps re-initialize the same bank object
            *self = Bank::default();
        }
        let cell = ctx.cell;
        self.memory_type = org.memory_type;
        self.routing = org.routing;
        self.capacity_bits = org.capacity_bits;
        self.block_size = org.block_size;
        self.associativity = org.associativity;
        self.num_row_mat = org.num_row_mat;
        self.num_column_mat = org.num_column_mat;
        self.internal_sense_amp = org.internal_sense_amp;
        self.stacked_die_count = org.stacked_die_count.max(1);
        self.partition_granularity = org.partition_granularity;
        self.num_way = 1;

        if !org.internal_sense_amp {
            if cell.mem_cell_type.needs_refresh() {
                error!("[bank] destructive-read cells require internal sense amplification");
                self.invalid = true;
                self.initialized = true;
                return;
            }
            if ctx.global_wire.wire_repeater_type.is_repeated() {
                // repeaters would regenerate the analog bitline signal
                self.invalid = true;
                self.initialized = true;
                return;
            }
        }

        if org.num_active_mat_per_row > org.num_column_mat {
            warn!(
                "[bank] clamping active mats per row {} to {}",
                org.num_active_mat_per_row, org.num_column_mat
            );
        }
        if org.num_active_mat_per_column > org.num_row_mat {
            warn!(
                "[bank] clamping active mats per column {} to {}",
                org.num_active_mat_per_column, org.num_row_mat
            );
        }
        self.num_active_mat_per_row = org.num_active_mat_per_row.min(org.num_column_mat);
        self.num_active_mat_per_column = org.num_active_mat_per_column.min(org.num_row_mat);

        let words = org.capacity_bits
            / org.block_size
            / org.associativity
            / self.stacked_die_count;
        let Some(num_address_bit) = log2_exact(words) else {
            self.invalid = true;
            self.initialized = true;
            return;
        };
        self.num_address_bit = num_address_bit;

        let num_mats = org.num_row_mat * org.num_column_mat;
        let num_active_mats = self.num_active_mat_per_row * self.num_active_mat_per_column;
        let Some(gating_bits) = log2_exact(num_mats / num_active_mats) else {
            self.invalid = true;
            self.initialized = true;
            return;
        };
        if gating_bits > num_address_bit {
            self.invalid = true;
            self.initialized = true;
            return;
        }
        self.num_address_bit_route_to_mat = num_address_bit - gating_bits;

        let mut mux_sense_amp = org.mux_sense_amp;
        let mut mux_output_lev1 = org.mux_output_lev1;
        let mut mux_output_lev2 = org.mux_output_lev2;
        match org.memory_type {
            MemoryType::Data => {
                if org.block_size % num_active_mats != 0 || org.num_row_per_set > org.associativity
                {
                    self.invalid = true;
                    self.initialized = true;
                    return;
                }
                self.num_data_bit_route_to_mat = org.block_size / num_active_mats;
                self.num_way = org.associativity;
                let num_way_per_row = self.num_way / org.num_row_per_set;
                if num_way_per_row * org.num_row_per_set != self.num_way {
                    self.invalid = true;
                    self.initialized = true;
                    return;
                }
                if num_way_per_row > 1 {
                    // spread the extra ways across the mux levels
                    let Some(way_bits) = log2_exact(num_way_per_row) else {
                        self.invalid = true;
                        self.initialized = true;
                        return;
                    };
                    if cell.mem_cell_type.needs_refresh() {
                        // the charge-sharing sense amp cannot mux its inputs
                        let extra_lev2 = 1u64 << (way_bits / 2);
                        let extra_lev1 = num_way_per_row / extra_lev2;
                        mux_output_lev1 *= extra_lev1;
                        mux_output_lev2 *= extra_lev2;
                    } else {
                        let extra_lev2 = 1u64 << (way_bits / 3);
                        let extra_lev1 = extra_lev2;
                        let extra_sense_amp = num_way_per_row / extra_lev1 / extra_lev2;
                        mux_sense_amp *= extra_sense_amp;
                        mux_output_lev1 *= extra_lev1;
                        mux_output_lev2 *= extra_lev2;
                    }
                }
            }
            MemoryType::Tag => {
                if org.num_row_per_set > 1 {
                    // ways in a set would have to share bitlines
                    self.invalid = true;
                    self.initialized = true;
                    return;
                }
                self.num_data_bit_route_to_mat = org.block_size;
                if org.associativity % num_active_mats != 0 {
                    self.invalid = true;
                    self.initialized = true;
                    return;
                }
                self.num_way = org.associativity / num_active_mats;
                if self.num_way < 1 {
                    self.invalid = true;
                    self.initialized = true;
                    return;
                }
            }
            MemoryType::Cam => {
                self.num_data_bit_route_to_mat = org.block_size;
            }
        }

        // translate the per-mat address and data budget into a physical grid
        let mux_total = mux_sense_amp * mux_output_lev1 * mux_output_lev2;
        let bits_per_mat = (1u64 << self.num_address_bit_route_to_mat)
            * self.num_data_bit_route_to_mat
            * self.num_way;
        let output_bits_per_mat = self.num_data_bit_route_to_mat
            * if org.memory_type == MemoryType::Tag {
                self.num_way
            } else {
                1
            };
        let num_column_per_mat = output_bits_per_mat * mux_total;
        if num_column_per_mat == 0 || bits_per_mat % num_column_per_mat != 0 {
            self.invalid = true;
            self.initialized = true;
            return;
        }
        let num_row_per_mat = bits_per_mat / num_column_per_mat;
        if num_row_per_mat % org.num_row_subarray != 0
            || num_column_per_mat % org.num_column_subarray != 0
        {
            self.invalid = true;
            self.initialized = true;
            return;
        }

        self.mat.initialize(
            ctx,
            org.memory_type,
            org.num_row_subarray,
            org.num_column_subarray,
            org.num_active_subarray_per_row,
            org.num_active_subarray_per_column,
            num_row_per_mat / org.num_row_subarray,
            num_column_per_mat / org.num_column_subarray,
            org.num_row_per_set > 1,
            false,
            mux_sense_amp,
            org.internal_sense_amp,
            mux_output_lev1,
            mux_output_lev2,
            org.block_size as usize,
            org.area_optimization_level,
            org.monolithic_stack_count,
        );
        if self.mat.invalid {
            self.invalid = true;
            self.initialized = true;
            return;
        }
        self.mat.calculate_area(ctx);

        if !org.internal_sense_amp {
            let voltage_sense = match cell.mem_cell_type {
                t if t.is_nvm() => cell.read_mode() == ReadMode::Voltage,
                _ => true,
            };
            let num_sense_amp = if org.memory_type == MemoryType::Data {
                org.block_size
            } else {
                org.block_size * org.associativity
            };
            self.global_sense_amp.initialize(
                ctx,
                num_sense_amp,
                !voltage_sense,
                cell.min_sense_voltage,
                self.mat.metrics.width * org.num_column_mat as f64 / num_sense_amp as f64,
            );
            if self.global_sense_amp.invalid {
                self.invalid = true;
                self.initialized = true;
                return;
            }
            self.global_sense_amp.calculate_rc(ctx);
            self.global_bitline_mux.initialize(
                ctx,
                (num_mats / num_active_mats) as usize,
                num_sense_amp,
                self.global_sense_amp.cap_load,
                self.global_sense_amp.cap_load,
                0.0,
            );
            self.global_bitline_mux.calculate_rc(ctx);
            if org.memory_type == MemoryType::Tag {
                self.global_comparator
                    .initialize(ctx, org.block_size as usize, 0.0);
            }
        }

        if self.stacked_die_count > 1 {
            let tsv_type = Technology::wire_type_to_tsv_type(ctx.global_wire.wire_type);
            self.tsv_array.initialize(ctx, tsv_type, true);
            if self.tsv_array.invalid {
                self.invalid = true;
                self.initialized = true;
                return;
            }
            self.assign_tsv_bit_counts(ctx);
        }

        self.initialized = true;
    }

    fn assign_tsv_bit_counts(&mut self, ctx: &EvalCtx) {
        let control_bits = self.stacked_die_count;
        let address_bits = if self.partition_granularity == 1 {
            // fine partitioning keeps the predecoders on the logic die
            0
        } else {
            self.num_address_bit as u64
        };
        let data_bits = self.block_size * 2; // separate read and write vias
        let r = ctx.cfg.tsv_redundancy;
        self.tsv_array.num_total_bits =
            ((control_bits + address_bits + data_bits) as f64 * r) as u64;
        self.tsv_array.num_access_bits =
            ((control_bits + address_bits + self.block_size) as f64 * r) as u64;
        self.tsv_array.num_read_bits = ((control_bits + address_bits) as f64 * r) as u64;
        self.tsv_array.num_data_bits = (self.block_size as f64 * r) as u64;
    }

    fn num_active_mats(&self) -> f64 {
        (self.num_active_mat_per_row * self.num_active_mat_per_column) as f64
    }

    pub fn calculate_area(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[bank] calculate_area before initialize");
            return;
        }
        if self.invalid {
            self.metrics.invalidate();
            return;
        }
        self.mat.calculate_area(ctx);
        let mut height = self.mat.metrics.height * self.num_row_mat as f64;
        let mut width = self.mat.metrics.width * self.num_column_mat as f64;

        if self.routing == RoutingMode::NonHTree {
            // direct routing burns tracks next to the mats unless the
            // global wires are unrepeated and live on upper metal
            let gw = ctx.global_wire;
            if gw.wire_repeater_type.is_repeated() {
                let num_wire_sharing_width =
                    (gw.repeater_spacing / gw.repeater_height).floor().max(1.0);
                let tracks = (self.num_row_mat * self.num_column_mat) as f64
                    * self.num_address_bit_route_to_mat as f64
                    / num_wire_sharing_width;
                width += tracks.ceil() * gw.wire_pitch;
            }
        }

        if !self.internal_sense_amp {
            self.global_sense_amp.calculate_area(ctx);
            height += self.global_sense_amp.metrics.height;
            self.global_bitline_mux.calculate_area(ctx);
            height += self.global_bitline_mux.metrics.height;
            if self.memory_type == MemoryType::Tag {
                self.global_comparator.calculate_area(ctx);
                height += self.associativity as f64 * self.global_comparator.metrics.area / width;
            }
        }

        if self.memory_type == MemoryType::Data
            && (height / width > CONSTRAINT_ASPECT_RATIO_BANK
                || width / height > CONSTRAINT_ASPECT_RATIO_BANK)
        {
            self.invalid = true;
            self.metrics.invalidate();
            return;
        }

        self.metrics.height = height;
        self.metrics.width = width;
        self.metrics.area = height * width;

        if self.stacked_die_count > 1 {
            self.tsv_array.calculate_area(ctx);
            self.metrics.area +=
                self.tsv_array.num_total_bits as f64 * self.tsv_array.metrics.area;
        }
    }

    pub fn calculate_rc(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[bank] calculate_rc before initialize");
            return;
        }
        if self.invalid {
            return;
        }
        self.mat.calculate_rc(ctx);
        if !self.internal_sense_amp {
            self.global_bitline_mux.calculate_rc(ctx);
            self.global_sense_amp.calculate_rc(ctx);
            if self.memory_type == MemoryType::Tag {
                self.global_comparator.calculate_rc(ctx);
            }
        }
    }

    /// Wire run from the bank edge to the farthest mat row.
    fn longest_wire_length(&self) -> f64 {
        self.mat.metrics.height * self.num_row_mat as f64
    }

    fn htree_routing_latency(&self, ctx: &EvalCtx) -> f64 {
        let mut latency = 0.0;
        let width = self.mat.metrics.width * self.num_column_mat as f64;
        let height = self.mat.metrics.height * self.num_row_mat as f64;
        let h_levels = (self.num_column_mat as f64).log2().round() as u32;
        let v_levels = (self.num_row_mat as f64).log2().round() as u32;
        for i in 0..h_levels {
            let len = width / 2f64.powi(i as i32 + 1);
            latency += ctx.global_wire.latency_and_power(len).0;
        }
        for i in 0..v_levels {
            let len = height / 2f64.powi(i as i32 + 1);
            latency += ctx.global_wire.latency_and_power(len).0;
        }
        latency
    }

    pub fn calculate_latency(&mut self, ctx: &EvalCtx, ramp_input: f64) {
        if !self.initialized {
            error!("[bank] calculate_latency before initialize");
            return;
        }
        if self.invalid {
            self.metrics.invalidate();
            return;
        }
        let cell = ctx.cell;
        self.mat.calculate_latency(ctx, ramp_input);

        let mut routing_read = 0.0;
        let mut routing_write = 0.0;
        match self.routing {
            RoutingMode::HTree => {
                let path = self.htree_routing_latency(ctx);
                routing_read = path;
                routing_write = path;
            }
            RoutingMode::NonHTree => {
                if self.internal_sense_amp {
                    let (latency, _, _) =
                        ctx.global_wire.latency_and_power(self.longest_wire_length());
                    routing_read = latency;
                    routing_write = latency;
                } else {
                    let (read, write) = self.external_sense_latency(ctx);
                    routing_read = read;
                    routing_write = write;
                }
            }
        }

        self.routing_metrics.read_latency = routing_read;
        self.routing_metrics.write_latency = routing_write;
        self.metrics.read_latency = routing_read + self.mat.metrics.read_latency;
        self.metrics.write_latency = routing_write + self.mat.metrics.write_latency;
        self.metrics.set_latency = routing_write + self.mat.metrics.set_latency;
        self.metrics.reset_latency = routing_write + self.mat.metrics.reset_latency;
        if cell.mem_cell_type.needs_refresh() {
            // mats in a row refresh together, rows take turns
            self.metrics.refresh_latency =
                self.mat.metrics.refresh_latency * self.num_column_mat as f64 + routing_read;
        }

        if self.stacked_die_count > 1 {
            // the data crosses to the farthest die and back
            self.tsv_array
                .calculate_latency_and_power(ctx, INFINITE_RAMP, INFINITE_RAMP);
            let crossings = (self.stacked_die_count - 1) as f64;
            self.metrics.read_latency += crossings
                * (self.tsv_array.metrics.read_latency + self.tsv_array.metrics.write_latency);
            self.metrics.write_latency += crossings * self.tsv_array.metrics.write_latency;
            self.metrics.set_latency += crossings * self.tsv_array.metrics.write_latency;
            self.metrics.reset_latency += crossings * self.tsv_array.metrics.write_latency;
            self.metrics.refresh_latency += crossings * self.tsv_array.metrics.write_latency;
        }

        if cell.mem_cell_type == MemCellType::Edram
            && self.metrics.refresh_latency > cell.retention_time_at(ctx.cfg.temperature)
        {
            // the array cannot be refreshed before it decays
            self.invalid = true;
            self.metrics.invalidate();
        }
    }

    /// Latency of reading and writing through the shared global bitlines
    /// when sensing happens at the bank edge.
    fn external_sense_latency(&mut self, ctx: &EvalCtx) -> (f64, f64) {
        let cell = ctx.cell;
        let sub = &self.mat.subarray;
        let gw = ctx.global_wire;
        let length = self.longest_wire_length();

        let cap_bitline_mux = self.global_bitline_mux.cap_nmos_pass_transistor;
        let res_bitline_mux = self.global_bitline_mux.res_nmos_pass_transistor;
        let mut res_local_bitline = sub.res_bitline + 3.0 * res_bitline_mux;
        let cap_local_bitline = sub.cap_bitline + 6.0 * cap_bitline_mux;
        let res_global_bitline = length * gw.res_wire_per_unit;
        let cap_global_bitline = length * gw.cap_wire_per_unit;
        let cap_global_bitline_mux = self.global_bitline_mux.cap_for_previous_delay_calculation;

        let mut read_latency = 0.0;
        let mut write_latency = 0.0;
        match cell.mem_cell_type {
            MemCellType::Sram => {
                let vpre = if cell.read_voltage > 0.0 {
                    cell.read_voltage
                } else {
                    ctx.tech.vdd
                };
                let mut latency = res_local_bitline * cap_global_bitline / 2.0
                    + (res_local_bitline + res_global_bitline)
                        * (cap_global_bitline / 2.0 + cap_global_bitline_mux);
                latency *= (vpre / (vpre - self.global_sense_amp.sense_voltage)).ln();
                latency += res_local_bitline * cap_global_bitline / 2.0;
                read_latency += latency;
                write_latency += latency;
            }
            t if t.is_nvm() => {
                let tau = res_bitline_mux * cap_global_bitline / 2.0
                    + (res_bitline_mux + res_global_bitline)
                        * (cap_global_bitline + cap_local_bitline)
                        / 2.0
                    + (res_bitline_mux + res_global_bitline + res_local_bitline)
                        * cap_local_bitline
                        / 2.0;
                write_latency += 0.63 * tau;
                if cell.read_mode() == ReadMode::Current {
                    res_local_bitline += sub.res_mem_cell_off;
                    let tau = res_global_bitline * cap_global_bitline / 2.0
                        * (res_local_bitline + res_global_bitline / 3.0)
                        / (res_local_bitline + res_global_bitline);
                    read_latency += 0.63 * tau;
                } else {
                    let v_pre = sub.voltage_precharge;
                    let v_on = sub.voltage_mem_cell_on;
                    let v_off = sub.voltage_mem_cell_off;
                    let sense = self.global_sense_amp.sense_voltage;
                    let tau_for = |res_local: f64| {
                        res_local * cap_global_bitline
                            + (res_local + res_global_bitline) * cap_global_bitline / 2.0
                    };
                    let latency_on = tau_for(res_local_bitline + sub.res_equivalent_on)
                        * ((v_pre - v_on) / (v_pre - v_on - sense)).ln();
                    let latency_off = tau_for(res_local_bitline + sub.res_equivalent_off)
                        * ((v_off - v_pre) / (v_off - v_pre - sense)).ln();
                    // the global wire re-develops the swing, so the local
                    // bitline delay is replaced by the combined one
                    read_latency -= sub.bitline_delay;
                    read_latency += (latency_on + sub.bitline_delay_on)
                        .max(latency_off + sub.bitline_delay_off);
                }
            }
            _ => {
                let (latency, _, _) = gw.latency_and_power(length);
                read_latency += latency;
                write_latency += latency;
            }
        }

        self.global_bitline_mux.calculate_latency(ctx, INFINITE_RAMP);
        self.global_sense_amp.calculate_latency(ctx, INFINITE_RAMP);
        write_latency += self.global_bitline_mux.metrics.read_latency;
        read_latency += self.global_bitline_mux.metrics.read_latency
            + self.global_sense_amp.metrics.read_latency;
        if self.memory_type == MemoryType::Tag {
            self.global_comparator
                .calculate_latency(ctx, INFINITE_RAMP);
            read_latency += self.global_comparator.metrics.read_latency;
        }
        (read_latency, write_latency)
    }

    pub fn calculate_power(&mut self, ctx: &EvalCtx) {
        if !self.initialized {
            error!("[bank] calculate_power before initialize");
            return;
        }
        if self.invalid {
            self.metrics.invalidate();
            return;
        }
        let cell = ctx.cell;
        self.mat.calculate_power(ctx);

        let mut routing_read_energy = 0.0;
        let mut routing_write_energy = 0.0;
        let mut routing_leakage = 0.0;

        let bits_per_mat = self.num_address_bit_route_to_mat as f64
            + self.num_data_bit_route_to_mat as f64
            + if self.memory_type == MemoryType::Tag {
                self.num_way as f64
            } else {
                0.0
            };

        match self.routing {
            RoutingMode::HTree => {
                let width = self.mat.metrics.width * self.num_column_mat as f64;
                let height = self.mat.metrics.height * self.num_row_mat as f64;
                let h_levels = (self.num_column_mat as f64).log2().round() as i32;
                let v_levels = (self.num_row_mat as f64).log2().round() as i32;
                let mut active_branches = 1.0;
                let max_branches = self.num_active_mats();
                for i in 0..h_levels {
                    let len = width / 2f64.powi(i + 1);
                    let (_, energy, leak) = ctx.global_wire.latency_and_power(len);
                    routing_read_energy += energy * bits_per_mat * active_branches;
                    routing_leakage += leak * bits_per_mat * 2f64.powi(i + 1);
                    active_branches = (active_branches * 2.0).min(max_branches);
                }
                for i in 0..v_levels {
                    let len = height / 2f64.powi(i + 1);
                    let (_, energy, leak) = ctx.global_wire.latency_and_power(len);
                    routing_read_energy += energy * bits_per_mat * active_branches;
                    routing_leakage += leak * bits_per_mat * 2f64.powi(h_levels + i + 1);
                    active_branches = (active_branches * 2.0).min(max_branches);
                }
                routing_write_energy = routing_read_energy;
            }
            RoutingMode::NonHTree => {
                // one vertical run per mat row; shorter rows use less wire
                for i in 0..self.num_row_mat {
                    let length = self.mat.metrics.height * (self.num_row_mat - i) as f64;
                    let (_, energy, leak) = ctx.global_wire.latency_and_power(length);
                    if self.internal_sense_amp {
                        if i < self.num_active_mat_per_column {
                            let e = energy * bits_per_mat * self.num_active_mat_per_row as f64;
                            routing_read_energy += e;
                            routing_write_energy += e;
                        }
                        routing_leakage += leak * bits_per_mat * self.num_column_mat as f64;
                    } else if i < self.num_active_mat_per_column {
                        let cap_global_bitline = length * ctx.global_wire.cap_wire_per_unit;
                        let vdd = ctx.tech.vdd;
                        let address_energy = cap_global_bitline
                            * vdd
                            * vdd
                            * self.num_address_bit_route_to_mat as f64;
                        routing_read_energy += address_energy;
                        routing_write_energy += address_energy;
                        match cell.mem_cell_type {
                            MemCellType::Sram => {
                                let vpre = if cell.read_voltage > 0.0 {
                                    cell.read_voltage
                                } else {
                                    vdd
                                };
                                routing_read_energy +=
                                    cap_global_bitline * vpre * vpre * self.num_way as f64;
                                routing_write_energy += cap_global_bitline
                                    * vpre
                                    * vpre
                                    * self.num_data_bit_route_to_mat as f64;
                            }
                            t if t.is_nvm() => {
                                let v_write =
                                    cell.reset_voltage.abs().max(cell.set_voltage.abs());
                                routing_write_energy += cap_global_bitline
                                    * v_write
                                    * v_write
                                    * self.num_data_bit_route_to_mat as f64;
                                if cell.read_mode() == ReadMode::Voltage {
                                    let sub = &self.mat.subarray;
                                    let v_pre = sub.voltage_precharge;
                                    let v_on = sub.voltage_mem_cell_on;
                                    routing_read_energy += cap_global_bitline
                                        * (v_pre * v_pre - v_on * v_on)
                                        * self.num_data_bit_route_to_mat as f64;
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
        }

        if !self.internal_sense_amp {
            self.global_bitline_mux.calculate_power(ctx);
            self.global_sense_amp.calculate_power(ctx);
            let active_row = self.num_active_mat_per_row as f64;
            routing_read_energy += (self.global_bitline_mux.metrics.read_dynamic_energy
                + self.global_sense_amp.metrics.read_dynamic_energy)
                * active_row;
            routing_write_energy += (self.global_bitline_mux.metrics.write_dynamic_energy
                + self.global_sense_amp.metrics.write_dynamic_energy)
                * active_row;
            routing_leakage += (self.global_bitline_mux.metrics.leakage
                + self.global_sense_amp.metrics.leakage)
                * self.num_column_mat as f64;
            if self.memory_type == MemoryType::Tag {
                self.global_comparator.calculate_power(ctx);
                routing_read_energy +=
                    self.num_way as f64 * self.global_comparator.metrics.read_dynamic_energy;
                routing_leakage +=
                    self.associativity as f64 * self.global_comparator.metrics.leakage;
            }
        }

        // fast-access cache writes only drive the matching way
        if ctx.cfg.design_target == DesignTarget::Cache
            && ctx.cfg.cache_access_mode == CacheAccessMode::Fast
            && self.memory_type == MemoryType::Data
        {
            routing_write_energy /= ctx.cfg.associativity.max(1) as f64;
        }

        let active_mats = self.num_active_mats();
        let total_mats = (self.num_row_mat * self.num_column_mat) as f64;
        self.routing_metrics.read_dynamic_energy = routing_read_energy;
        self.routing_metrics.write_dynamic_energy = routing_write_energy;
        self.routing_metrics.leakage = routing_leakage;

        self.metrics.read_dynamic_energy =
            routing_read_energy + self.mat.metrics.read_dynamic_energy * active_mats;
        self.metrics.write_dynamic_energy =
            routing_write_energy + self.mat.metrics.write_dynamic_energy * active_mats;
        self.metrics.set_dynamic_energy =
            routing_write_energy + self.mat.metrics.set_dynamic_energy * active_mats;
        self.metrics.reset_dynamic_energy =
            routing_write_energy + self.mat.metrics.reset_dynamic_energy * active_mats;
        self.metrics.cell_read_energy = self.mat.metrics.cell_read_energy * active_mats;
        self.metrics.cell_set_energy = self.mat.metrics.cell_set_energy * active_mats;
        self.metrics.cell_reset_energy = self.mat.metrics.cell_reset_energy * active_mats;
        self.metrics.leakage = routing_leakage + self.mat.metrics.leakage * total_mats;
        if cell.mem_cell_type.needs_refresh() {
            self.metrics.refresh_dynamic_energy =
                self.mat.metrics.refresh_dynamic_energy * total_mats + routing_read_energy;
        }

        if self.stacked_die_count > 1 {
            // every die leaks; accesses pay for the worst-case crossing
            self.metrics.leakage *= self.stacked_die_count as f64;
            let crossings = (self.stacked_die_count - 1) as f64;
            let tsv = &self.tsv_array;
            self.metrics.read_dynamic_energy += crossings
                * (tsv.num_read_bits as f64 * tsv.metrics.write_dynamic_energy
                    + tsv.num_data_bits as f64 * tsv.metrics.read_dynamic_energy);
            self.metrics.write_dynamic_energy +=
                crossings * tsv.num_access_bits as f64 * tsv.metrics.write_dynamic_energy;
            self.metrics.set_dynamic_energy +=
                crossings * tsv.num_access_bits as f64 * tsv.metrics.set_dynamic_energy;
            self.metrics.reset_dynamic_energy +=
                crossings * tsv.num_access_bits as f64 * tsv.metrics.reset_dynamic_energy;
            self.metrics.refresh_dynamic_energy +=
                crossings * tsv.num_read_bits as f64 * tsv.metrics.write_dynamic_energy;
            self.metrics.leakage +=
                tsv.num_total_bits as f64 * crossings * self.tsv_array.metrics.leakage;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::tests::fixture;
    use crate::INFINITE_RAMP;

    fn sram_org() -> BankOrg {
        BankOrg {
            memory_type: MemoryType::Data,
            routing: RoutingMode::HTree,
            capacity_bits: 8 * 1024 * 1024, // 1 MB
            block_size: 512,
            associativity: 1,
            num_row_mat: 2,
            num_column_mat: 2,
            num_active_mat_per_row: 2,
            num_active_mat_per_column: 2,
            num_row_subarray: 2,
            num_column_subarray: 2,
            num_active_subarray_per_row: 2,
            num_active_subarray_per_column: 2,
            num_row_per_set: 1,
            mux_sense_amp: 4,
            mux_output_lev1: 2,
            mux_output_lev2: 1,
            internal_sense_amp: true,
            area_optimization_level: BufferDesignTarget::LatencyFirst,
            stacked_die_count: 1,
            partition_granularity: 0,
            monolithic_stack_count: 1,
        }
    }

    fn evaluate(bank: &mut Bank, ctx: &EvalCtx) {
        bank.calculate_area(ctx);
        bank.calculate_rc(ctx);
        bank.calculate_latency(ctx, INFINITE_RAMP);
        bank.calculate_power(ctx);
    }

    #[test]
    fn htree_bank_produces_full_metrics() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut bank = Bank::default();
        bank.initialize(&ctx, &sram_org());
        assert!(!bank.invalid);
        evaluate(&mut bank, &ctx);
        assert!(bank.metrics.area > 0.0);
        assert!(bank.metrics.read_latency > bank.mat.metrics.read_latency);
        assert!(bank.metrics.read_dynamic_energy > 0.0);
        assert!(bank.metrics.leakage > 4.0 * bank.mat.metrics.leakage);
    }

    #[test]
    fn derives_the_mat_grid_from_the_address_budget() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut bank = Bank::default();
        bank.initialize(&ctx, &sram_org());
        // 8Mib / 512b = 16384 words -> 14 address bits, no gating
        assert_eq!(bank.num_address_bit, 14);
        assert_eq!(bank.num_address_bit_route_to_mat, 14);
        assert_eq!(bank.num_data_bit_route_to_mat, 128);
        let sub = &bank.mat.subarray;
        let stored = sub.num_row as u64
            * sub.num_column as u64
            * 4  // subarrays per mat
            * 4; // mats
        assert_eq!(stored, 8 * 1024 * 1024);
    }

    #[test]
    fn rejects_capacity_that_is_not_a_power_of_two_of_words() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut org = sram_org();
        org.capacity_bits = 3 * 1024 * 1024;
        let mut bank = Bank::default();
        bank.initialize(&ctx, &org);
        assert!(bank.invalid);
        evaluate(&mut bank, &ctx);
        assert!(bank.metrics.is_invalidated());
    }

    #[test]
    fn direct_routing_also_completes() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut org = sram_org();
        org.routing = RoutingMode::NonHTree;
        let mut bank = Bank::default();
        bank.initialize(&ctx, &org);
        assert!(!bank.invalid);
        evaluate(&mut bank, &ctx);
        assert!(bank.metrics.read_latency > 0.0);
        assert!(bank.routing_metrics.read_latency > 0.0);
        assert!(bank.routing_metrics.leakage > 0.0);
    }

    #[test]
    fn stacking_splits_capacity_and_adds_via_overheads() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut flat = Bank::default();
        flat.initialize(&ctx, &sram_org());
        evaluate(&mut flat, &ctx);

        let mut org = sram_org();
        org.stacked_die_count = 4;
        let mut stacked = Bank::default();
        stacked.initialize(&ctx, &org);
        assert!(!stacked.invalid);
        evaluate(&mut stacked, &ctx);

        // each die holds a quarter of the rows
        assert_eq!(stacked.num_address_bit, flat.num_address_bit - 2);
        assert!(stacked.tsv_array.num_total_bits > 0);
        assert!(stacked.metrics.leakage > flat.metrics.leakage);
    }

    #[test]
    fn gated_mats_route_fewer_address_bits() {
        let fx = fixture::sram();
        let ctx = fx.ctx();
        let mut org = sram_org();
        org.num_active_mat_per_row = 1;
        org.num_active_mat_per_column = 1;
        org.block_size = 128;
        let mut bank = Bank::default();
        bank.initialize(&ctx, &org);
        assert!(!bank.invalid);
        assert_eq!(
            bank.num_address_bit_route_to_mat,
            bank.num_address_bit - 2
        );
    }

    #[test]
    fn edram_bank_that_cannot_refresh_in_time_is_invalid() {
        let mut fx = fixture::edram();
        // the array decays before a refresh sweep can complete
        fx.cell.retention_time = 1e-12;
        let ctx = fx.ctx();
        let mut bank = Bank::default();
        bank.initialize(&ctx, &sram_org());
        assert!(!bank.invalid);
        evaluate(&mut bank, &ctx);
        assert!(bank.invalid);
        assert!(bank.metrics.is_invalidated());
    }

    #[test]
    fn external_sensing_rejects_destructive_read_cells() {
        let fx = fixture::edram();
        let ctx = fx.ctx();
        let mut org = sram_org();
        org.internal_sense_amp = false;
        let mut bank = Bank::default();
        bank.initialize(&ctx, &org);
        assert!(bank.invalid);
    }
}
