//! Best-candidate tracking. A [`SearchResult`] holds the incumbent bank for
//! one optimization objective plus the limits a candidate must clear before
//! it is even compared. Limits default to the invalid sentinel, which admits
//! everything; the constrained re-search tightens them.

use crate::blocks::bank::{Bank, BankOrg};
use crate::cell::MemCellType;
use crate::config::OptimizationTarget;
use crate::tech::Technology;
use crate::wire::{Wire, WireRepeaterType, WireType};
use crate::{EvalCtx, Result, INVALID};

/// The wire flavor a candidate was evaluated with. Kept alongside the bank
/// so a stored organization can be re-evaluated under different wires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct WireSelection {
    pub wire_type: WireType,
    pub repeater: WireRepeaterType,
    pub low_swing: bool,
}

impl WireSelection {
    /// Starting local wire for the structural sweep, before refinement.
    pub fn basic_local() -> Self {
        WireSelection {
            wire_type: WireType::LocalAggressive,
            repeater: WireRepeaterType::None,
            low_swing: false,
        }
    }

    /// Starting global wire for the structural sweep, before refinement.
    pub fn basic_global() -> Self {
        WireSelection {
            wire_type: WireType::GlobalAggressive,
            repeater: WireRepeaterType::None,
            low_swing: false,
        }
    }

    pub fn build(&self, tech: &Technology, temperature: u32) -> Result<Wire> {
        Wire::new(tech, self.wire_type, self.repeater, temperature, self.low_swing)
    }
}

/// Per-candidate figures the CSV dumps need beyond the bank metrics record:
/// the mat/subarray geometry and the refresh costs, snapshotted while the
/// evaluation context is still alive. Refresh fields are zero for cell
/// technologies that do not refresh.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct RowDetail {
    pub subarray_rows: u64,
    pub subarray_columns: u64,
    pub mat_height: f64,
    pub mat_width: f64,
    pub mat_area: f64,
    pub subarray_height: f64,
    pub subarray_width: f64,
    pub subarray_area: f64,
    /// Memory-cell area over total bank area, in percent.
    pub area_efficiency: f64,
    pub refresh_latency: f64,
    pub refresh_energy: f64,
    /// Refresh energy spread over the retention period.
    pub refresh_power: f64,
}

impl RowDetail {
    pub fn of(bank: &Bank, org: &BankOrg, ctx: &EvalCtx) -> Self {
        let sub = &bank.mat.subarray;
        let f = ctx.tech.feature_size;
        let cell_area = ctx.cell.area * f * f * org.capacity_bits as f64;
        let refreshes = ctx.cell.mem_cell_type.needs_refresh();
        RowDetail {
            subarray_rows: sub.num_row,
            subarray_columns: sub.num_column,
            mat_height: bank.mat.metrics.height,
            mat_width: bank.mat.metrics.width,
            mat_area: bank.mat.metrics.area,
            subarray_height: sub.metrics.height,
            subarray_width: sub.metrics.width,
            subarray_area: sub.metrics.area,
            area_efficiency: cell_area / bank.metrics.area * 100.0,
            refresh_latency: if refreshes { bank.metrics.refresh_latency } else { 0.0 },
            refresh_energy: if refreshes {
                bank.metrics.refresh_dynamic_energy
            } else {
                0.0
            },
            refresh_power: if refreshes {
                bank.metrics.refresh_dynamic_energy / ctx.cell.retention_time
            } else {
                0.0
            },
        }
    }
}

/// A fully evaluated bank together with everything needed to rebuild it.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub bank: Bank,
    pub org: BankOrg,
    pub local_wire: WireSelection,
    pub global_wire: WireSelection,
    pub detail: RowDetail,
    /// Index into the configured cell file list.
    pub cell_index: usize,
    pub cell_type: MemCellType,
}

impl Candidate {
    pub fn metric(&self, target: OptimizationTarget) -> f64 {
        metric_of(&self.bank, target)
    }
}

/// The scalar a bank scores under one objective. EDPs are formed on the fly
/// from the latency and energy metrics.
pub fn metric_of(bank: &Bank, target: OptimizationTarget) -> f64 {
    let m = &bank.metrics;
    match target {
        OptimizationTarget::ReadLatency => m.read_latency,
        OptimizationTarget::WriteLatency => m.write_latency,
        OptimizationTarget::ReadEnergy => m.read_dynamic_energy,
        OptimizationTarget::WriteEnergy => m.write_dynamic_energy,
        OptimizationTarget::ReadEdp => m.read_latency * m.read_dynamic_energy,
        OptimizationTarget::WriteEdp => m.write_latency * m.write_dynamic_energy,
        OptimizationTarget::Leakage => m.leakage,
        OptimizationTarget::Area => m.area,
        // full exploration tracks one result per concrete metric; a tracker
        // handed this target scores by read latency
        OptimizationTarget::FullExploration => m.read_latency,
    }
}

/// Upper bounds a candidate must satisfy on all eight metrics before its
/// objective score is considered at all.
#[derive(Debug, Clone, Copy)]
pub struct MetricLimits {
    pub read_latency: f64,
    pub write_latency: f64,
    pub read_dynamic_energy: f64,
    pub write_dynamic_energy: f64,
    pub read_edp: f64,
    pub write_edp: f64,
    pub leakage: f64,
    pub area: f64,
}

impl Default for MetricLimits {
    fn default() -> Self {
        MetricLimits {
            read_latency: INVALID,
            write_latency: INVALID,
            read_dynamic_energy: INVALID,
            write_dynamic_energy: INVALID,
            read_edp: INVALID,
            write_edp: INVALID,
            leakage: INVALID,
            area: INVALID,
        }
    }
}

impl MetricLimits {
    pub fn admits(&self, bank: &Bank) -> bool {
        let m = &bank.metrics;
        m.read_latency <= self.read_latency
            && m.write_latency <= self.write_latency
            && m.read_dynamic_energy <= self.read_dynamic_energy
            && m.write_dynamic_energy <= self.write_dynamic_energy
            && m.read_latency * m.read_dynamic_energy <= self.read_edp
            && m.write_latency * m.write_dynamic_energy <= self.write_edp
            && m.leakage <= self.leakage
            && m.area <= self.area
    }

    pub fn set(&mut self, metric: OptimizationTarget, value: f64) {
        match metric {
            OptimizationTarget::ReadLatency => self.read_latency = value,
            OptimizationTarget::WriteLatency => self.write_latency = value,
            OptimizationTarget::ReadEnergy => self.read_dynamic_energy = value,
            OptimizationTarget::WriteEnergy => self.write_dynamic_energy = value,
            OptimizationTarget::ReadEdp => self.read_edp = value,
            OptimizationTarget::WriteEdp => self.write_edp = value,
            OptimizationTarget::Leakage => self.leakage = value,
            OptimizationTarget::Area => self.area = value,
            OptimizationTarget::FullExploration => {}
        }
    }
}

/// Incumbent tracker for a single objective.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub target: OptimizationTarget,
    pub limits: MetricLimits,
    pub best: Option<Candidate>,
}

impl SearchResult {
    pub fn new(target: OptimizationTarget) -> Self {
        SearchResult {
            target,
            limits: MetricLimits::default(),
            best: None,
        }
    }

    /// Trackers for all eight concrete objectives, in metric index order.
    pub fn per_metric() -> Vec<SearchResult> {
        OptimizationTarget::METRICS
            .into_iter()
            .map(SearchResult::new)
            .collect()
    }

    pub fn reset(&mut self) {
        self.best = None;
    }

    pub fn best_metric(&self) -> f64 {
        self.best
            .as_ref()
            .map(|c| c.metric(self.target))
            .unwrap_or(INVALID)
    }

    /// Adopt the candidate if it clears every limit and strictly improves
    /// the objective. Ties keep the incumbent, so among equals the first
    /// candidate found wins.
    pub fn compare_and_update(&mut self, candidate: &Candidate) -> bool {
        if candidate.bank.invalid || candidate.bank.metrics.is_invalidated() {
            return false;
        }
        if !self.limits.admits(&candidate.bank) {
            return false;
        }
        let score = candidate.metric(self.target);
        if score < self.best_metric() {
            self.best = Some(candidate.clone());
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{BufferDesignTarget, MemoryType};
    use crate::config::RoutingMode;

    fn dummy_org() -> BankOrg {
        BankOrg {
            memory_type: MemoryType::Data,
            routing: RoutingMode::HTree,
            capacity_bits: 1 << 20,
            block_size: 64,
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

    fn candidate(read_latency: f64, area: f64) -> Candidate {
        let mut bank = Bank::default();
        bank.initialized = true;
        bank.metrics.read_latency = read_latency;
        bank.metrics.write_latency = read_latency;
        bank.metrics.read_dynamic_energy = 1e-12;
        bank.metrics.write_dynamic_energy = 1e-12;
        bank.metrics.leakage = 1e-3;
        bank.metrics.area = area;
        Candidate {
            bank,
            org: dummy_org(),
            local_wire: WireSelection::basic_local(),
            global_wire: WireSelection::basic_global(),
            detail: RowDetail::default(),
            cell_index: 0,
            cell_type: MemCellType::Sram,
        }
    }

    #[test]
    fn strictly_better_candidate_replaces_the_incumbent() {
        let mut r = SearchResult::new(OptimizationTarget::ReadLatency);
        assert!(r.compare_and_update(&candidate(2e-9, 1e-6)));
        assert!(r.compare_and_update(&candidate(1e-9, 1e-6)));
        assert_eq!(r.best_metric(), 1e-9);
    }

    #[test]
    fn ties_keep_the_first_candidate() {
        let mut r = SearchResult::new(OptimizationTarget::Area);
        let mut first = candidate(2e-9, 1e-6);
        first.cell_index = 7;
        assert!(r.compare_and_update(&first));
        assert!(!r.compare_and_update(&candidate(1e-9, 1e-6)));
        assert_eq!(r.best.as_ref().unwrap().cell_index, 7);
    }

    #[test]
    fn invalid_candidates_never_win() {
        let mut r = SearchResult::new(OptimizationTarget::ReadLatency);
        let mut bad = candidate(1e-9, 1e-6);
        bad.bank.invalid = true;
        assert!(!r.compare_and_update(&bad));
        let mut poisoned = candidate(1e-9, 1e-6);
        poisoned.bank.metrics.invalidate();
        assert!(!r.compare_and_update(&poisoned));
        assert!(r.best.is_none());
    }

    #[test]
    fn limits_gate_before_the_objective_is_compared() {
        let mut r = SearchResult::new(OptimizationTarget::ReadLatency);
        r.limits.set(OptimizationTarget::Area, 5e-7);
        // faster but too big
        assert!(!r.compare_and_update(&candidate(1e-9, 1e-6)));
        // slower but within the area limit
        assert!(r.compare_and_update(&candidate(3e-9, 4e-7)));
        assert_eq!(r.best_metric(), 3e-9);
    }

    #[test]
    fn edp_objective_multiplies_latency_and_energy() {
        let c = candidate(2e-9, 1e-6);
        approx::assert_relative_eq!(
            c.metric(OptimizationTarget::ReadEdp),
            2e-9 * 1e-12,
            max_relative = 1e-12
        );
    }
}
