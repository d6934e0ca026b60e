//! Search driver: sweeps the organization space for each configured cell
//! technology and keeps the best bank per objective. Cache designs run a
//! coarse tag-array search first, then the data array; both phases start on
//! plain aggressive wires and refine the local and global wire choices
//! around the incumbents afterwards.

pub mod result;
pub mod space;

use anyhow::{bail, Context};
use log::{debug, info, warn};

use crate::blocks::bank::{Bank, BankOrg};
use crate::blocks::{MemoryType, UnitMetrics};
use crate::cell::{parse_cell_config, MemCell, MemCellType};
use crate::config::{CacheAccessMode, OptimizationTarget, RoutingMode, SweepConfig};
use crate::search::result::{Candidate, RowDetail, SearchResult, WireSelection};
use crate::search::space::{stack_layers, wire_selections, SweepPoint, SweepSpace};
use crate::tech::Technology;
use crate::{clog2, EvalCtx, Result, INFINITE_RAMP};

/// Physical address width assumed when sizing tag arrays.
const TOTAL_ADDRESS_BIT: u32 = 48;

/// Relaxation bands applied around each per-metric optimum during the
/// pruned full exploration, as fractions over the best value.
const PRUNING_BANDS: [f64; 3] = [0.1, 0.2, 0.3];

/// One row of the full-exploration dump: a valid organization, its metrics,
/// and the wires and geometry the CSV schema reports, with no comparison
/// applied.
#[derive(Debug, Clone)]
pub struct ExplorationRow {
    pub org: BankOrg,
    pub metrics: UnitMetrics,
    pub local_wire: WireSelection,
    pub global_wire: WireSelection,
    pub detail: RowDetail,
    pub cell_index: usize,
}

/// A pruned-exploration tracker: the best bank for `target` subject to
/// `limited` staying within `band` over its unconstrained optimum.
#[derive(Debug, Clone)]
pub struct PrunedResult {
    pub limited: OptimizationTarget,
    pub band: f64,
    pub result: SearchResult,
}

#[derive(Debug, Default)]
pub struct SweepStats {
    /// Organizations handed to the bank model.
    pub designs: u64,
    /// Organizations that survived every validity check.
    pub solutions: u64,
}

impl SweepStats {
    fn absorb(&mut self, other: &SweepStats) {
        self.designs += other.designs;
        self.solutions += other.solutions;
    }
}

/// Everything the search produced for one run.
pub struct SearchOutcome {
    /// Best data array per metric, in metric index order.
    pub data: Vec<SearchResult>,
    /// Best tag array per metric; empty unless the design is a cache.
    pub tag: Vec<SearchResult>,
    /// Banded optima from the pruned full exploration.
    pub pruned: Vec<PrunedResult>,
    /// Every valid candidate, when an unpruned full exploration ran.
    pub exploration: Vec<ExplorationRow>,
    pub stats: SweepStats,
}

impl SearchOutcome {
    pub fn best_data(&self, target: OptimizationTarget) -> Option<&Candidate> {
        self.data.get(target as usize).and_then(|r| r.best.as_ref())
    }

    pub fn best_tag(&self, target: OptimizationTarget) -> Option<&Candidate> {
        self.tag.get(target as usize).and_then(|r| r.best.as_ref())
    }
}

/// Geometry of one search phase: how a sweep point becomes a bank
/// organization.
enum Phase {
    Data {
        capacity_bits: u64,
        block_size: u64,
        associativity: u64,
        /// Overrides the swept rows-per-set axis (parallel-access caches
        /// must keep every way on its own bitline).
        num_row_per_set: Option<u64>,
    },
    Tag {
        /// Cache blocks in the data array; one tag entry each.
        num_blocks: u64,
        /// Tag bits per entry before padding to the active-unit count.
        base_bits: u64,
        associativity: u64,
    },
}

impl Phase {
    fn memory_type(&self) -> MemoryType {
        match self {
            Phase::Data { .. } => MemoryType::Data,
            Phase::Tag { .. } => MemoryType::Tag,
        }
    }

    fn org_for(&self, cfg: &SweepConfig, point: &SweepPoint, layers: u64) -> Option<BankOrg> {
        let (capacity_bits, block_size, associativity, num_row_per_set) = match *self {
            Phase::Data {
                capacity_bits,
                block_size,
                associativity,
                num_row_per_set,
            } => (
                capacity_bits,
                block_size,
                associativity,
                num_row_per_set.unwrap_or(point.num_row_per_set),
            ),
            Phase::Tag {
                num_blocks,
                base_bits,
                associativity,
            } => {
                // pad the entry so every active unit holds a whole number
                // of tag bits
                let active = point.active_product();
                let mut bits = base_bits;
                if bits % active != 0 {
                    bits += active - bits % active;
                }
                if bits / active == 0 {
                    return None;
                }
                (num_blocks * bits, bits, associativity, 1)
            }
        };
        Some(BankOrg {
            memory_type: self.memory_type(),
            routing: cfg.routing_mode,
            capacity_bits,
            block_size,
            associativity,
            num_row_mat: point.num_row_mat,
            num_column_mat: point.num_column_mat,
            num_active_mat_per_row: point.num_active_mat_per_row,
            num_active_mat_per_column: point.num_active_mat_per_column,
            num_row_subarray: point.num_row_subarray,
            num_column_subarray: point.num_column_subarray,
            num_active_subarray_per_row: point.num_active_subarray_per_row,
            num_active_subarray_per_column: point.num_active_subarray_per_column,
            num_row_per_set,
            mux_sense_amp: point.mux_sense_amp,
            mux_output_lev1: point.mux_output_lev1,
            mux_output_lev2: point.mux_output_lev2,
            internal_sense_amp: cfg.internal_sensing,
            area_optimization_level: point.area_optimization_level,
            stacked_die_count: layers,
            partition_granularity: cfg.partition_granularity,
            monolithic_stack_count: u64::from(cfg.monolithic_stack_count),
        })
    }
}

/// Run the four evaluation phases over one organization.
fn evaluate(ctx: &EvalCtx, org: &BankOrg) -> Bank {
    let mut bank = Bank::default();
    bank.initialize(ctx, org);
    if !bank.invalid {
        bank.calculate_area(ctx);
    }
    if !bank.invalid {
        bank.calculate_rc(ctx);
        bank.calculate_latency(ctx, INFINITE_RAMP);
    }
    if !bank.invalid {
        bank.calculate_power(ctx);
    }
    if bank.invalid {
        bank.metrics.invalidate();
    }
    bank
}

fn technology_for(cfg: &SweepConfig, layers: u64) -> Result<Technology> {
    let mut tech = Technology::for_node(cfg.process_node, cfg.device_roadmap)?;
    tech.set_layer_count(
        cfg.local_tsv_projection,
        cfg.global_tsv_projection,
        layers as usize,
    );
    Ok(tech)
}

/// Re-evaluate a stored organization under a different wire pair.
fn reevaluate(
    cfg: &SweepConfig,
    cell: &MemCell,
    cell_index: usize,
    org: &BankOrg,
    local: WireSelection,
    global: WireSelection,
) -> Result<Candidate> {
    let tech = technology_for(cfg, org.stacked_die_count)?;
    let local_wire = local.build(&tech, cfg.temperature)?;
    let global_wire = global.build(&tech, cfg.temperature)?;
    let ctx = EvalCtx {
        cfg,
        tech: &tech,
        cell,
        local_wire: &local_wire,
        global_wire: &global_wire,
    };
    let bank = evaluate(&ctx, org);
    let detail = RowDetail::of(&bank, org, &ctx);
    Ok(Candidate {
        bank,
        org: *org,
        local_wire: local,
        global_wire: global,
        detail,
        cell_index,
        cell_type: cell.mem_cell_type,
    })
}

/// Walk the structural space once under a fixed wire pair, updating every
/// tracker in `results` and optionally recording all valid candidates.
#[allow(clippy::too_many_arguments)]
fn sweep_structures(
    cfg: &SweepConfig,
    cell: &MemCell,
    cell_index: usize,
    phase: &Phase,
    local: WireSelection,
    global: WireSelection,
    reduced: bool,
    results: &mut [SearchResult],
    mut exploration: Option<&mut Vec<ExplorationRow>>,
    stats: &mut SweepStats,
) -> Result<()> {
    for layers in stack_layers(cfg) {
        let tech = technology_for(cfg, layers)?;
        let local_wire = local.build(&tech, cfg.temperature)?;
        let global_wire = global.build(&tech, cfg.temperature)?;
        let ctx = EvalCtx {
            cfg,
            tech: &tech,
            cell,
            local_wire: &local_wire,
            global_wire: &global_wire,
        };
        let points = if reduced {
            SweepSpace::reduced(cfg)
        } else {
            SweepSpace::new(cfg)
        };
        for point in points {
            let Some(org) = phase.org_for(cfg, &point, layers) else {
                continue;
            };
            stats.designs += 1;
            let bank = evaluate(&ctx, &org);
            if bank.invalid {
                continue;
            }
            stats.solutions += 1;
            let detail = RowDetail::of(&bank, &org, &ctx);
            let candidate = Candidate {
                bank,
                org,
                local_wire: local,
                global_wire: global,
                detail,
                cell_index,
                cell_type: cell.mem_cell_type,
            };
            if let Some(rows) = exploration.as_deref_mut() {
                rows.push(ExplorationRow {
                    org,
                    metrics: candidate.bank.metrics,
                    local_wire: local,
                    global_wire: global,
                    detail,
                    cell_index,
                });
            }
            for r in results.iter_mut() {
                r.compare_and_update(&candidate);
            }
        }
    }
    Ok(())
}

/// Revisit each incumbent under every configured wire flavor, one dimension
/// at a time: first the local wire with the stored global wire, then the
/// global wire with whatever local wire the incumbent settled on.
fn refine_wires(
    cfg: &SweepConfig,
    cell: &MemCell,
    cell_index: usize,
    results: &mut [SearchResult],
    stats: &mut SweepStats,
) -> Result<()> {
    let locals = wire_selections(
        cfg.local_wire_type,
        cfg.local_wire_repeater_type,
        cfg.local_wire_low_swing,
    );
    for &sel in &locals {
        for r in results.iter_mut() {
            let Some(current) = r.best.clone() else {
                continue;
            };
            if current.local_wire == sel {
                continue;
            }
            let candidate =
                reevaluate(cfg, cell, cell_index, &current.org, sel, current.global_wire)?;
            stats.designs += 1;
            if !candidate.bank.invalid {
                stats.solutions += 1;
                r.compare_and_update(&candidate);
            }
        }
    }
    let globals = wire_selections(
        cfg.global_wire_type,
        cfg.global_wire_repeater_type,
        cfg.global_wire_low_swing,
    );
    for &sel in &globals {
        for r in results.iter_mut() {
            let Some(current) = r.best.clone() else {
                continue;
            };
            if current.global_wire == sel {
                continue;
            }
            let candidate =
                reevaluate(cfg, cell, cell_index, &current.org, current.local_wire, sel)?;
            stats.designs += 1;
            if !candidate.bank.invalid {
                stats.solutions += 1;
                r.compare_and_update(&candidate);
            }
        }
    }
    Ok(())
}

/// Data-array geometry after the cache access mode is folded in.
fn data_phase(cfg: &SweepConfig) -> Phase {
    let mut block_size = cfg.word_width;
    let mut associativity = if cfg.is_cache() {
        u64::from(cfg.associativity)
    } else {
        1
    };
    let mut num_row_per_set = None;
    if cfg.is_cache() {
        match cfg.cache_access_mode {
            // the tag lookup resolves the way first, so only one way is
            // ever read; ways may share a wordline
            CacheAccessMode::Sequential => associativity = 1,
            // every way is driven out at once and the tag match picks late
            CacheAccessMode::Fast => {
                block_size *= associativity;
                associativity = 1;
            }
            // ways are read in parallel columns of the same row
            CacheAccessMode::Normal => num_row_per_set = Some(1),
        }
    }
    Phase::Data {
        capacity_bits: cfg.capacity * 8,
        block_size,
        associativity,
        num_row_per_set,
    }
}

/// Tag-array geometry: address tag plus valid and dirty bits per block.
fn tag_phase(cfg: &SweepConfig) -> Result<Phase> {
    let total_bits = cfg.capacity * 8;
    let num_blocks = total_bits / cfg.word_width;
    let num_sets = num_blocks / u64::from(cfg.associativity);
    if num_sets == 0 || !num_sets.is_power_of_two() {
        bail!(
            "cache with {} blocks and associativity {} does not yield a power-of-two set count",
            num_blocks,
            cfg.associativity
        );
    }
    let num_index_bit = clog2(num_sets);
    let num_offset_bit = clog2((cfg.word_width / 8).max(1));
    let tag_bits = TOTAL_ADDRESS_BIT
        .checked_sub(num_index_bit + num_offset_bit)
        .with_context(|| {
            format!(
                "index ({}) and offset ({}) bits exceed the {}-bit address",
                num_index_bit, num_offset_bit, TOTAL_ADDRESS_BIT
            )
        })?;
    Ok(Phase::Tag {
        num_blocks,
        base_bits: u64::from(tag_bits) + 2,
        associativity: u64::from(cfg.associativity),
    })
}

struct CellOutcome {
    data: Vec<SearchResult>,
    tag: Vec<SearchResult>,
    pruned: Vec<PrunedResult>,
    exploration: Vec<ExplorationRow>,
    stats: SweepStats,
}

fn search_cell(cfg: &SweepConfig, cell: &MemCell, cell_index: usize) -> Result<CellOutcome> {
    match cell.mem_cell_type {
        MemCellType::Dram => bail!("commodity DRAM cells are not modeled"),
        MemCellType::MlcNand => bail!("multi-level NAND cells are not modeled"),
        _ => {}
    }

    let basic_local = WireSelection::basic_local();
    let basic_global = WireSelection::basic_global();
    let mut stats = SweepStats::default();

    // Tag first: the data array is the expensive search, and a cache with
    // no feasible tag organization is dead on arrival.
    let mut tag = Vec::new();
    if cfg.is_cache() {
        let phase = tag_phase(cfg)?;
        tag = SearchResult::per_metric();
        info!("[search] tag array sweep (cell {})", cell_index);
        sweep_structures(
            cfg,
            cell,
            cell_index,
            &phase,
            basic_local,
            basic_global,
            true,
            &mut tag,
            None,
            &mut stats,
        )?;
        refine_wires(cfg, cell, cell_index, &mut tag, &mut stats)?;
        if tag.iter().all(|r| r.best.is_none()) {
            bail!(
                "no valid tag array organization found for cell file {}",
                cfg.cell_files
                    .get(cell_index)
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| cell_index.to_string())
            );
        }
    }

    let phase = data_phase(cfg);
    let mut data = SearchResult::per_metric();
    let explore_all =
        cfg.optimization_target == OptimizationTarget::FullExploration && !cfg.pruning_enabled;
    let mut exploration = Vec::new();
    info!("[search] data array sweep (cell {})", cell_index);
    sweep_structures(
        cfg,
        cell,
        cell_index,
        &phase,
        basic_local,
        basic_global,
        false,
        &mut data,
        explore_all.then_some(&mut exploration),
        &mut stats,
    )?;
    refine_wires(cfg, cell, cell_index, &mut data, &mut stats)?;
    debug!(
        "[search] cell {}: {} designs, {} solutions",
        cell_index, stats.designs, stats.solutions
    );

    // Banded exploration: for every (objective, limited metric, band)
    // combination, the best bank whose limited metric stays within the band
    // over its unconstrained optimum.
    let mut pruned = Vec::new();
    if cfg.optimization_target == OptimizationTarget::FullExploration && cfg.pruning_enabled {
        for (limited_idx, limited) in OptimizationTarget::METRICS.into_iter().enumerate() {
            let best = data[limited_idx].best_metric();
            if data[limited_idx].best.is_none() {
                continue;
            }
            for target in OptimizationTarget::METRICS {
                for band in PRUNING_BANDS {
                    let mut result = SearchResult::new(target);
                    result.limits.set(limited, best * (1.0 + band));
                    pruned.push(PrunedResult {
                        limited,
                        band,
                        result,
                    });
                }
            }
        }
        info!(
            "[search] pruned exploration over {} trackers (cell {})",
            pruned.len(),
            cell_index
        );
        let mut trackers: Vec<SearchResult> = pruned.iter().map(|p| p.result.clone()).collect();
        sweep_structures(
            cfg,
            cell,
            cell_index,
            &phase,
            basic_local,
            basic_global,
            false,
            &mut trackers,
            None,
            &mut stats,
        )?;
        for (slot, tracker) in pruned.iter_mut().zip(trackers) {
            slot.result = tracker;
        }
    }

    // Constrained re-search: tighten every tracker to the per-metric optima
    // scaled by the configured allowances, then sweep again from scratch.
    if cfg.optimization_target != OptimizationTarget::FullExploration && cfg.constraints_applied() {
        let mut allowed = result::MetricLimits::default();
        let constraints = [
            (OptimizationTarget::ReadLatency, cfg.read_latency_constraint),
            (OptimizationTarget::WriteLatency, cfg.write_latency_constraint),
            (
                OptimizationTarget::ReadEnergy,
                cfg.read_dynamic_energy_constraint,
            ),
            (
                OptimizationTarget::WriteEnergy,
                cfg.write_dynamic_energy_constraint,
            ),
            (OptimizationTarget::ReadEdp, cfg.read_edp_constraint),
            (OptimizationTarget::WriteEdp, cfg.write_edp_constraint),
            (OptimizationTarget::Leakage, cfg.leakage_constraint),
            (OptimizationTarget::Area, cfg.area_constraint),
        ];
        for (metric, constraint) in constraints {
            if let Some(c) = constraint {
                let best = data[metric as usize].best_metric();
                allowed.set(metric, best * (1.0 + c));
            }
        }
        info!("[search] constrained re-search (cell {})", cell_index);
        for r in data.iter_mut() {
            r.limits = allowed;
            r.reset();
        }
        sweep_structures(
            cfg,
            cell,
            cell_index,
            &phase,
            basic_local,
            basic_global,
            false,
            &mut data,
            None,
            &mut stats,
        )?;
        refine_wires(cfg, cell, cell_index, &mut data, &mut stats)?;
    }

    Ok(CellOutcome {
        data,
        tag,
        pruned,
        exploration,
        stats,
    })
}

/// Run the full search over every configured cell file.
pub fn run(cfg: &SweepConfig) -> Result<SearchOutcome> {
    let mut cells = Vec::with_capacity(cfg.cell_files.len());
    for path in &cfg.cell_files {
        cells.push(parse_cell_config(path)?);
    }
    run_with_cells(cfg, &cells)
}

/// Search with the cell parameter sets already parsed. The best candidate
/// per metric is reduced across cell technologies; the tag array follows
/// the data array's winning cell unless the config decouples them.
pub fn run_with_cells(cfg: &SweepConfig, cells: &[MemCell]) -> Result<SearchOutcome> {
    cfg.validate()?;
    if cells.is_empty() {
        bail!("no cell technologies to evaluate");
    }
    if cfg.routing_mode == RoutingMode::HTree && !cfg.internal_sensing {
        bail!("external sensing requires direct routing; H-tree repeats the bitline signal");
    }

    let mut combined: Option<CellOutcome> = None;
    for (cell_index, cell) in cells.iter().enumerate() {
        let outcome = search_cell(cfg, cell, cell_index)?;
        if let Some(acc) = combined.as_mut() {
            for t in 0..OptimizationTarget::METRIC_COUNT {
                let adopted = match &outcome.data[t].best {
                    Some(c) => acc.data[t].compare_and_update(c),
                    None => false,
                };
                if adopted && cfg.is_cache() && !cfg.allow_different_tag_tech {
                    acc.tag[t] = outcome.tag[t].clone();
                }
            }
            if cfg.is_cache() && cfg.allow_different_tag_tech {
                for t in 0..OptimizationTarget::METRIC_COUNT {
                    if let Some(c) = &outcome.tag[t].best {
                        acc.tag[t].compare_and_update(c);
                    }
                }
            }
            for (mine, theirs) in acc.pruned.iter_mut().zip(&outcome.pruned) {
                if let Some(c) = &theirs.result.best {
                    mine.result.compare_and_update(c);
                }
            }
            acc.exploration.extend(outcome.exploration);
            acc.stats.absorb(&outcome.stats);
        } else {
            combined = Some(outcome);
        }
    }
    let Some(combined) = combined else {
        bail!("no cell technologies to evaluate");
    };
    if combined.data.iter().all(|r| r.best.is_none()) {
        warn!("[search] no valid organization found for any cell technology");
    }
    Ok(SearchOutcome {
        data: combined.data,
        tag: combined.tag,
        pruned: combined.pruned,
        exploration: combined.exploration,
        stats: combined.stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::tests as cell_fixtures;
    use crate::config::{DesignTarget, Range};
    use crate::tech::DeviceRoadmap;
    use crate::wire::WireType;
    use crate::INVALID;

    /// A sweep small enough to walk exhaustively in a unit test.
    fn tight_config() -> SweepConfig {
        SweepConfig {
            capacity: 8 * 1024,
            word_width: 64,
            device_roadmap: DeviceRoadmap::Lop,
            cell_files: vec!["sram.toml".into()],
            num_row_mat: Range::fixed(2),
            num_column_mat: Range::fixed(2),
            num_active_mat_per_row: Range::fixed(2),
            num_active_mat_per_column: Range::fixed(2),
            num_row_subarray: Range::fixed(2),
            num_column_subarray: Range::fixed(2),
            num_active_subarray_per_row: Range::fixed(2),
            num_active_subarray_per_column: Range::fixed(2),
            mux_senseamp: Range::new(1, 4),
            mux_output_lev1: Range::fixed(2),
            mux_output_lev2: Range::fixed(1),
            num_row_per_set: Range::fixed(1),
            area_optimization_level: Range::fixed(0),
            local_wire_type: Range::fixed(WireType::LocalAggressive as u32),
            global_wire_type: Range::fixed(WireType::GlobalAggressive as u32),
            ..SweepConfig::default()
        }
    }

    #[test]
    fn finds_a_valid_sram_organization() {
        let cfg = tight_config();
        let outcome = run_with_cells(&cfg, &[cell_fixtures::sram_cell()]).unwrap();
        assert!(outcome.stats.solutions > 0);
        let best = outcome.best_data(OptimizationTarget::ReadLatency).unwrap();
        assert!(best.bank.metrics.read_latency > 0.0);
        assert!(best.bank.metrics.read_latency < INVALID);
        assert!(best.bank.metrics.area > 0.0);
        assert!(outcome.tag.is_empty());
    }

    #[test]
    fn objectives_order_their_own_metric() {
        let cfg = tight_config();
        let outcome = run_with_cells(&cfg, &[cell_fixtures::sram_cell()]).unwrap();
        let fastest = outcome.best_data(OptimizationTarget::ReadLatency).unwrap();
        let smallest = outcome.best_data(OptimizationTarget::Area).unwrap();
        assert!(fastest.bank.metrics.read_latency <= smallest.bank.metrics.read_latency);
        assert!(smallest.bank.metrics.area <= fastest.bank.metrics.area);
    }

    #[test]
    fn cache_search_produces_tag_and_data_arrays() {
        let cfg = SweepConfig {
            design_target: DesignTarget::Cache,
            capacity: 32 * 1024,
            word_width: 256,
            associativity: 4,
            num_row_mat: Range::fixed(1),
            num_column_mat: Range::fixed(1),
            num_active_mat_per_row: Range::fixed(1),
            num_active_mat_per_column: Range::fixed(1),
            num_row_subarray: Range::fixed(1),
            num_column_subarray: Range::fixed(1),
            num_active_subarray_per_row: Range::fixed(1),
            num_active_subarray_per_column: Range::fixed(1),
            mux_senseamp: Range::new(1, 2),
            mux_output_lev1: Range::fixed(1),
            mux_output_lev2: Range::fixed(1),
            ..tight_config()
        };
        let outcome = run_with_cells(&cfg, &[cell_fixtures::sram_cell()]).unwrap();
        let tag = outcome.best_tag(OptimizationTarget::ReadLatency).unwrap();
        assert_eq!(tag.org.memory_type, MemoryType::Tag);
        // 32 KiB / 256-bit blocks, 4-way: 256 sets -> 8 index bits, 5 offset
        // bits, 48 - 8 - 5 + 2 = 37 tag bits per entry
        assert_eq!(tag.org.block_size, 37);
        let data = outcome.best_data(OptimizationTarget::ReadLatency).unwrap();
        assert_eq!(data.org.memory_type, MemoryType::Data);
        assert_eq!(data.org.associativity, 4);
    }

    #[test]
    fn fast_access_mode_widens_the_data_block() {
        let cfg = SweepConfig {
            design_target: DesignTarget::Cache,
            capacity: 32 * 1024,
            word_width: 256,
            associativity: 4,
            cache_access_mode: CacheAccessMode::Fast,
            ..tight_config()
        };
        match data_phase(&cfg) {
            Phase::Data {
                block_size,
                associativity,
                ..
            } => {
                assert_eq!(block_size, 1024);
                assert_eq!(associativity, 1);
            }
            Phase::Tag { .. } => unreachable!(),
        }
    }

    #[test]
    fn full_exploration_keeps_every_solution() {
        let cfg = SweepConfig {
            optimization_target: OptimizationTarget::FullExploration,
            ..tight_config()
        };
        let outcome = run_with_cells(&cfg, &[cell_fixtures::sram_cell()]).unwrap();
        assert!(!outcome.exploration.is_empty());
        assert!(outcome.pruned.is_empty());
        for row in &outcome.exploration {
            assert!(!row.metrics.is_invalidated());
            assert!(row.metrics.area > 0.0);
        }
    }

    #[test]
    fn pruned_exploration_tracks_banded_optima() {
        let cfg = SweepConfig {
            optimization_target: OptimizationTarget::FullExploration,
            pruning_enabled: true,
            ..tight_config()
        };
        let outcome = run_with_cells(&cfg, &[cell_fixtures::sram_cell()]).unwrap();
        assert!(outcome.exploration.is_empty());
        assert!(!outcome.pruned.is_empty());
        let baseline = outcome.best_data(OptimizationTarget::Area).unwrap();
        for p in &outcome.pruned {
            if p.limited != OptimizationTarget::Area {
                continue;
            }
            if let Some(best) = &p.result.best {
                assert!(
                    best.bank.metrics.area
                        <= baseline.bank.metrics.area * (1.0 + p.band) * (1.0 + 1e-9)
                );
            }
        }
    }

    #[test]
    fn constraints_bound_every_returned_candidate() {
        let cfg = SweepConfig {
            read_latency_constraint: Some(0.5),
            ..tight_config()
        };
        let outcome = run_with_cells(&cfg, &[cell_fixtures::sram_cell()]).unwrap();
        let unconstrained = run_with_cells(&tight_config(), &[cell_fixtures::sram_cell()]).unwrap();
        let floor = unconstrained
            .best_data(OptimizationTarget::ReadLatency)
            .unwrap()
            .bank
            .metrics
            .read_latency;
        for r in &outcome.data {
            if let Some(best) = &r.best {
                assert!(best.bank.metrics.read_latency <= floor * 1.5 * (1.0 + 1e-9));
            }
        }
    }

    #[test]
    fn external_sensing_requires_direct_routing() {
        let cfg = SweepConfig {
            internal_sensing: false,
            routing_mode: RoutingMode::HTree,
            ..tight_config()
        };
        assert!(run_with_cells(&cfg, &[cell_fixtures::sram_cell()]).is_err());
    }
}
