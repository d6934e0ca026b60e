//! Result reporting: a text summary per optimization objective, the cache
//! hit/miss/write roll-up that combines the tag and data arrays, and the
//! optional CSV / JSON dumps selected by `output_file_prefix`.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, Write};

use colored::Colorize;
use serde::Serialize;

use crate::blocks::bank::BankOrg;
use crate::blocks::{BufferDesignTarget, MemoryType, UnitMetrics};
use crate::config::{CacheAccessMode, OptimizationTarget, RoutingMode, SweepConfig};
use crate::search::result::{Candidate, RowDetail, WireSelection};
use crate::search::SearchOutcome;
use crate::wire::{WireRepeaterType, WireType};
use crate::Result;

fn to_second(v: f64) -> String {
    if v < 1e-9 {
        format!("{:.3}ps", v * 1e12)
    } else if v < 1e-6 {
        format!("{:.3}ns", v * 1e9)
    } else if v < 1e-3 {
        format!("{:.3}us", v * 1e6)
    } else {
        format!("{:.3}ms", v * 1e3)
    }
}

fn to_joule(v: f64) -> String {
    if v < 1e-9 {
        format!("{:.3}pJ", v * 1e12)
    } else if v < 1e-6 {
        format!("{:.3}nJ", v * 1e9)
    } else {
        format!("{:.3}uJ", v * 1e6)
    }
}

fn to_watt(v: f64) -> String {
    if v < 1e-3 {
        format!("{:.3}uW", v * 1e6)
    } else if v < 1.0 {
        format!("{:.3}mW", v * 1e3)
    } else {
        format!("{:.3}W", v)
    }
}

fn to_sqm(v: f64) -> String {
    if v < 1e-6 {
        format!("{:.3}um^2", v * 1e12)
    } else {
        format!("{:.4}mm^2", v * 1e6)
    }
}

fn to_meter(v: f64) -> String {
    if v < 1e-3 {
        format!("{:.2}um", v * 1e6)
    } else {
        format!("{:.3}mm", v * 1e3)
    }
}

pub fn wire_type_label(t: WireType) -> &'static str {
    match t {
        WireType::LocalAggressive => "Local Aggressive",
        WireType::LocalConservative => "Local Conservative",
        WireType::SemiAggressive => "Semi-Global Aggressive",
        WireType::SemiConservative => "Semi-Global Conservative",
        WireType::GlobalAggressive => "Global Aggressive",
        WireType::GlobalConservative => "Global Conservative",
    }
}

pub fn repeater_label(t: WireRepeaterType) -> &'static str {
    match t {
        WireRepeaterType::None => "No Repeaters",
        WireRepeaterType::Opt => "Fully-Optimized Repeaters",
        WireRepeaterType::Penalty5 => "Repeaters with 5% Overhead",
        WireRepeaterType::Penalty10 => "Repeaters with 10% Overhead",
        WireRepeaterType::Penalty20 => "Repeaters with 20% Overhead",
        WireRepeaterType::Penalty30 => "Repeaters with 30% Overhead",
        WireRepeaterType::Penalty40 => "Repeaters with 40% Overhead",
        WireRepeaterType::Penalty50 => "Repeaters with 50% Overhead",
    }
}

fn buffer_style_label(t: BufferDesignTarget) -> &'static str {
    match t {
        BufferDesignTarget::LatencyFirst => "Latency-Optimized",
        BufferDesignTarget::LatencyAreaTradeOff => "Balanced",
        BufferDesignTarget::AreaFirst => "Area-Optimized",
    }
}

fn wire_lines(label: &str, sel: &WireSelection, out: &mut String, indent: usize) {
    let pad = " ".repeat(indent);
    let _ = writeln!(out, "{pad}{label}:");
    let _ = writeln!(out, "{pad} - Wire Type    : {}", wire_type_label(sel.wire_type));
    let _ = writeln!(out, "{pad} - Repeater Type: {}", repeater_label(sel.repeater));
    let _ = writeln!(
        out,
        "{pad} - Low Swing    : {}",
        if sel.low_swing { "Yes" } else { "No" }
    );
}

/// Organization, wires, and the area/timing/power trees for one candidate,
/// as an indented text block.
pub fn describe_candidate(cfg: &SweepConfig, c: &Candidate, indent: usize) -> String {
    let pad = " ".repeat(indent);
    let bank = &c.bank;
    let org = &c.org;
    let sub = &bank.mat.subarray;
    let mut s = String::new();

    if org.stacked_die_count > 1 {
        let _ = writeln!(
            s,
            "{pad}Bank Organization: {} x {} x {} dies",
            org.num_row_mat, org.num_column_mat, org.stacked_die_count
        );
    } else {
        let _ = writeln!(
            s,
            "{pad}Bank Organization: {} x {}",
            org.num_row_mat, org.num_column_mat
        );
    }
    let _ = writeln!(
        s,
        "{pad} - Row Activation   : {} / {}",
        org.num_active_mat_per_column, org.num_row_mat
    );
    let _ = writeln!(
        s,
        "{pad} - Column Activation: {} / {}",
        org.num_active_mat_per_row, org.num_column_mat
    );
    let _ = writeln!(
        s,
        "{pad}Mat Organization: {} x {}",
        org.num_row_subarray, org.num_column_subarray
    );
    let _ = writeln!(
        s,
        "{pad} - Row Activation   : {} / {}",
        org.num_active_subarray_per_column, org.num_row_subarray
    );
    let _ = writeln!(
        s,
        "{pad} - Column Activation: {} / {}",
        org.num_active_subarray_per_row, org.num_column_subarray
    );
    let _ = writeln!(
        s,
        "{pad} - Subarray Size    : {} Rows x {} Columns",
        sub.num_row, sub.num_column
    );
    let _ = writeln!(s, "{pad}Mux Level:");
    let _ = writeln!(s, "{pad} - Senseamp Mux      : {}", org.mux_sense_amp);
    let _ = writeln!(s, "{pad} - Output Level-1 Mux: {}", org.mux_output_lev1);
    let _ = writeln!(s, "{pad} - Output Level-2 Mux: {}", org.mux_output_lev2);
    if cfg.is_cache() && org.memory_type == MemoryType::Data {
        let _ = writeln!(
            s,
            "{pad} - One set is partitioned into {} rows",
            org.num_row_per_set
        );
    }
    wire_lines("Local Wire", &c.local_wire, &mut s, indent);
    wire_lines("Global Wire", &c.global_wire, &mut s, indent);
    let _ = writeln!(
        s,
        "{pad}Buffer Design Style: {}",
        buffer_style_label(org.area_optimization_level)
    );

    let m = &bank.metrics;
    let _ = writeln!(s, "{pad}Area:");
    let _ = writeln!(
        s,
        "{pad} - Total Area = {} x {} = {}",
        to_meter(m.height),
        to_meter(m.width),
        to_sqm(m.area)
    );
    let _ = writeln!(
        s,
        "{pad} |--- Mat Area      = {} x {} = {}",
        to_meter(bank.mat.metrics.height),
        to_meter(bank.mat.metrics.width),
        to_sqm(bank.mat.metrics.area)
    );
    let _ = writeln!(
        s,
        "{pad} |--- Subarray Area = {} x {} = {}",
        to_meter(sub.metrics.height),
        to_meter(sub.metrics.width),
        to_sqm(sub.metrics.area)
    );
    if org.stacked_die_count > 1 {
        let _ = writeln!(
            s,
            "{pad} |--- TSV Area      = {}",
            to_sqm(bank.tsv_array.metrics.area)
        );
    }

    let _ = writeln!(s, "{pad}Timing:");
    let _ = writeln!(s, "{pad} - Read Latency = {}", to_second(m.read_latency));
    let routing_label = match org.routing {
        RoutingMode::HTree => "H-Tree Latency",
        RoutingMode::NonHTree => "Non-H-Tree Latency",
    };
    let _ = writeln!(
        s,
        "{pad} |--- {routing_label} = {}",
        to_second(bank.routing_metrics.read_latency)
    );
    let _ = writeln!(
        s,
        "{pad} |--- Mat Latency    = {}",
        to_second(bank.mat.metrics.read_latency)
    );
    let _ = writeln!(
        s,
        "{pad}    |--- Predecoder Latency = {}",
        to_second(bank.mat.predecoder_latency)
    );
    let _ = writeln!(
        s,
        "{pad}    |--- Subarray Latency   = {}",
        to_second(sub.metrics.read_latency)
    );
    let _ = writeln!(
        s,
        "{pad}       |--- Row Decoder Latency = {}",
        to_second(sub.row_decoder.metrics.read_latency)
    );
    let _ = writeln!(
        s,
        "{pad}       |--- Bitline Latency     = {}",
        to_second(sub.bitline_delay)
    );
    if org.internal_sense_amp {
        let _ = writeln!(
            s,
            "{pad}       |--- Senseamp Latency    = {}",
            to_second(sub.sense_amp.metrics.read_latency)
        );
    }
    let _ = writeln!(
        s,
        "{pad}       |--- Mux Latency         = {}",
        to_second(
            sub.bitline_mux.metrics.read_latency
                + sub.sense_amp_mux_lev1.metrics.read_latency
                + sub.sense_amp_mux_lev2.metrics.read_latency
        )
    );
    let _ = writeln!(
        s,
        "{pad}       |--- Precharge Latency   = {}",
        to_second(sub.precharger.metrics.read_latency)
    );
    if org.memory_type == MemoryType::Tag && org.internal_sense_amp {
        let _ = writeln!(
            s,
            "{pad}    |--- Comparator Latency  = {}",
            to_second(bank.mat.comparator.metrics.read_latency)
        );
    }
    let _ = writeln!(s, "{pad} - Write Latency = {}", to_second(m.write_latency));
    let _ = writeln!(
        s,
        "{pad} |--- {routing_label} = {}",
        to_second(bank.routing_metrics.write_latency)
    );
    let _ = writeln!(
        s,
        "{pad} |--- Mat Latency    = {}",
        to_second(bank.mat.metrics.write_latency)
    );
    if c.cell_type.is_nvm() {
        let _ = writeln!(s, "{pad} - SET Latency   = {}", to_second(m.set_latency));
        let _ = writeln!(s, "{pad} - RESET Latency = {}", to_second(m.reset_latency));
    }
    if c.cell_type.needs_refresh()
        && m.refresh_latency > 0.0
        && m.refresh_latency < crate::INVALID
    {
        let _ = writeln!(
            s,
            "{pad} - Refresh Latency = {}",
            to_second(m.refresh_latency)
        );
    }

    let _ = writeln!(s, "{pad}Power:");
    let _ = writeln!(
        s,
        "{pad} - Read Dynamic Energy  = {}",
        to_joule(m.read_dynamic_energy)
    );
    let _ = writeln!(
        s,
        "{pad} |--- Routing Dynamic Energy = {}",
        to_joule(bank.routing_metrics.read_dynamic_energy)
    );
    let _ = writeln!(
        s,
        "{pad} |--- Mat Dynamic Energy     = {} per mat",
        to_joule(bank.mat.metrics.read_dynamic_energy)
    );
    let _ = writeln!(
        s,
        "{pad} - Write Dynamic Energy = {}",
        to_joule(m.write_dynamic_energy)
    );
    if c.cell_type.is_nvm() {
        let _ = writeln!(
            s,
            "{pad} |--- Cell SET Dynamic Energy   = {}",
            to_joule(m.cell_set_energy)
        );
        let _ = writeln!(
            s,
            "{pad} |--- Cell RESET Dynamic Energy = {}",
            to_joule(m.cell_reset_energy)
        );
    }
    let _ = writeln!(s, "{pad} - Leakage Power = {}", to_watt(m.leakage));
    s
}

/// The metrics a cache presents once tag and data arrays are composed
/// according to the access mode.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheSummary {
    pub hit_latency: f64,
    pub miss_latency: f64,
    pub write_latency: f64,
    pub hit_dynamic_energy: f64,
    pub miss_dynamic_energy: f64,
    pub write_dynamic_energy: f64,
    pub refresh_latency: f64,
    pub leakage: f64,
    pub area: f64,
}

/// Compose tag and data array results into cache-level numbers.
pub fn combine_cache(data: &Candidate, tag: &Candidate, mode: CacheAccessMode) -> CacheSummary {
    let d = &data.bank.metrics;
    let t = &tag.bank.metrics;
    let (hit_latency, miss_latency, write_latency) = match mode {
        CacheAccessMode::Normal => {
            // tag access and data row activation run in parallel; the column
            // path waits for the hit signal, then the routing drives out
            let mat_read = data.bank.mat.metrics.read_latency;
            let hit = t.read_latency.max(mat_read)
                + data.bank.mat.subarray.column_decoder_latency
                + (d.read_latency - mat_read);
            (hit, t.read_latency, t.write_latency.max(d.write_latency))
        }
        CacheAccessMode::Fast => (
            t.read_latency.max(d.read_latency),
            t.read_latency,
            t.write_latency.max(d.write_latency),
        ),
        CacheAccessMode::Sequential => (
            t.read_latency + d.read_latency,
            t.read_latency,
            t.write_latency.max(d.write_latency),
        ),
    };
    CacheSummary {
        hit_latency,
        miss_latency,
        write_latency,
        // the tag is always accessed; on a miss the data array has already
        // started too
        hit_dynamic_energy: t.read_dynamic_energy + d.read_dynamic_energy,
        miss_dynamic_energy: t.read_dynamic_energy + d.read_dynamic_energy,
        write_dynamic_energy: t.write_dynamic_energy + d.write_dynamic_energy,
        refresh_latency: t.refresh_latency.max(d.refresh_latency),
        leakage: t.leakage + d.leakage,
        area: t.area + d.area,
    }
}

fn write_cache_summary(
    out: &mut dyn Write,
    cfg: &SweepConfig,
    summary: &CacheSummary,
    data: &Candidate,
    tag: &Candidate,
) -> io::Result<()> {
    writeln!(out, "{}", "Cache Summary:".bold())?;
    let mode = match cfg.cache_access_mode {
        CacheAccessMode::Normal => "Normal",
        CacheAccessMode::Fast => "Fast",
        CacheAccessMode::Sequential => "Sequential",
    };
    writeln!(out, " - Access Mode = {mode}")?;
    writeln!(out, " - Total Area  = {}", to_sqm(summary.area))?;
    writeln!(
        out,
        " |--- Data Array Area = {}",
        to_sqm(data.bank.metrics.area)
    )?;
    writeln!(
        out,
        " |--- Tag Array Area  = {}",
        to_sqm(tag.bank.metrics.area)
    )?;
    writeln!(out, " - Hit Latency   = {}", to_second(summary.hit_latency))?;
    writeln!(out, " - Miss Latency  = {}", to_second(summary.miss_latency))?;
    writeln!(
        out,
        " - Write Latency = {}",
        to_second(summary.write_latency)
    )?;
    writeln!(
        out,
        " - Hit Dynamic Energy   = {} per access",
        to_joule(summary.hit_dynamic_energy)
    )?;
    writeln!(
        out,
        " - Miss Dynamic Energy  = {} per access",
        to_joule(summary.miss_dynamic_energy)
    )?;
    writeln!(
        out,
        " - Write Dynamic Energy = {} per access",
        to_joule(summary.write_dynamic_energy)
    )?;
    // stacked banks accumulate a TSV term here even for non-refresh cells
    let refreshes = data.cell_type.needs_refresh() || tag.cell_type.needs_refresh();
    if refreshes && summary.refresh_latency > 0.0 && summary.refresh_latency < crate::INVALID {
        writeln!(
            out,
            " - Refresh Latency = {} per bank",
            to_second(summary.refresh_latency)
        )?;
    }
    writeln!(out, " - Total Leakage Power = {}", to_watt(summary.leakage))?;
    Ok(())
}

fn csv_header() -> &'static str {
    "cell_index,num_row_mat,num_column_mat,stacked_die_count,\
     num_active_mat_per_column,num_active_mat_per_row,\
     num_row_subarray,num_column_subarray,\
     num_active_subarray_per_column,num_active_subarray_per_row,\
     subarray_rows,subarray_columns,\
     mux_sense_amp,mux_output_lev1,mux_output_lev2,num_row_per_set,\
     local_wire_type,local_wire_repeater,local_wire_low_swing,\
     global_wire_type,global_wire_repeater,global_wire_low_swing,\
     buffer_style,\
     bank_height_m,bank_width_m,bank_area_m2,\
     mat_height_m,mat_width_m,mat_area_m2,\
     subarray_height_m,subarray_width_m,subarray_area_m2,\
     area_efficiency_pct,\
     read_latency_s,write_latency_s,refresh_latency_s,\
     read_energy_j,write_energy_j,refresh_energy_j,\
     leakage_w,refresh_power_w"
}

fn csv_row(
    org: &BankOrg,
    metrics: &UnitMetrics,
    local: &WireSelection,
    global: &WireSelection,
    detail: &RowDetail,
    cell_index: usize,
) -> String {
    let mut row = format!(
        "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
        cell_index,
        org.num_row_mat,
        org.num_column_mat,
        org.stacked_die_count,
        org.num_active_mat_per_column,
        org.num_active_mat_per_row,
        org.num_row_subarray,
        org.num_column_subarray,
        org.num_active_subarray_per_column,
        org.num_active_subarray_per_row,
        detail.subarray_rows,
        detail.subarray_columns,
        org.mux_sense_amp,
        org.mux_output_lev1,
        org.mux_output_lev2,
        org.num_row_per_set,
    );
    let _ = write!(
        row,
        ",{},{},{},{},{},{},{}",
        wire_type_label(local.wire_type),
        repeater_label(local.repeater),
        if local.low_swing { "Yes" } else { "No" },
        wire_type_label(global.wire_type),
        repeater_label(global.repeater),
        if global.low_swing { "Yes" } else { "No" },
        buffer_style_label(org.area_optimization_level),
    );
    let _ = write!(
        row,
        ",{:e},{:e},{:e},{:e},{:e},{:e},{:e},{:e},{:e},{:e}",
        metrics.height,
        metrics.width,
        metrics.area,
        detail.mat_height,
        detail.mat_width,
        detail.mat_area,
        detail.subarray_height,
        detail.subarray_width,
        detail.subarray_area,
        detail.area_efficiency,
    );
    let _ = write!(
        row,
        ",{:e},{:e},{:e},{:e},{:e},{:e},{:e},{:e}",
        metrics.read_latency,
        metrics.write_latency,
        detail.refresh_latency,
        metrics.read_dynamic_energy,
        metrics.write_dynamic_energy,
        detail.refresh_energy,
        metrics.leakage,
        detail.refresh_power,
    );
    row
}

/// Every valid candidate from an unpruned full exploration, one CSV row each.
pub fn write_exploration_csv(outcome: &SearchOutcome, path: &str) -> Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "{}", csv_header())?;
    for row in &outcome.exploration {
        writeln!(
            file,
            "{}",
            csv_row(
                &row.org,
                &row.metrics,
                &row.local_wire,
                &row.global_wire,
                &row.detail,
                row.cell_index
            )
        )?;
    }
    Ok(())
}

/// Banded optima from a pruned exploration.
pub fn write_pruned_csv(outcome: &SearchOutcome, path: &str) -> Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "limited_metric,band,objective,{}", csv_header())?;
    for p in &outcome.pruned {
        if let Some(best) = &p.result.best {
            writeln!(
                file,
                "{},{},{},{}",
                p.limited.label(),
                p.band,
                p.result.target.label(),
                csv_row(
                    &best.org,
                    &best.bank.metrics,
                    &best.local_wire,
                    &best.global_wire,
                    &best.detail,
                    best.cell_index
                )
            )?;
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonCandidate<'a> {
    org: &'a BankOrg,
    metrics: &'a UnitMetrics,
    local_wire: WireSelection,
    global_wire: WireSelection,
    cell_index: usize,
}

impl<'a> JsonCandidate<'a> {
    fn new(c: &'a Candidate) -> Self {
        JsonCandidate {
            org: &c.org,
            metrics: &c.bank.metrics,
            local_wire: c.local_wire,
            global_wire: c.global_wire,
            cell_index: c.cell_index,
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    objective: &'static str,
    data: Vec<JsonObjectiveEntry<'a>>,
}

#[derive(Serialize)]
struct JsonObjectiveEntry<'a> {
    objective: &'static str,
    data_array: JsonCandidate<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag_array: Option<JsonCandidate<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache: Option<CacheSummary>,
}

/// Machine-readable dump of the per-objective winners.
pub fn write_json(cfg: &SweepConfig, outcome: &SearchOutcome, path: &str) -> Result<()> {
    let mut entries = Vec::new();
    for target in OptimizationTarget::METRICS {
        let Some(data) = outcome.best_data(target) else {
            continue;
        };
        let tag = outcome.best_tag(target);
        entries.push(JsonObjectiveEntry {
            objective: target.label(),
            data_array: JsonCandidate::new(data),
            tag_array: tag.map(JsonCandidate::new),
            cache: tag.map(|t| combine_cache(data, t, cfg.cache_access_mode)),
        });
    }
    let report = JsonReport {
        objective: cfg.optimization_target.label(),
        data: entries,
    };
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, &report)?;
    Ok(())
}

/// Objectives the text summary covers for this run.
fn reported_targets(cfg: &SweepConfig) -> Vec<OptimizationTarget> {
    if cfg.optimization_target == OptimizationTarget::FullExploration || cfg.print_all_optimals {
        OptimizationTarget::METRICS.to_vec()
    } else {
        vec![cfg.optimization_target]
    }
}

/// The text report: per-objective winners, plus the cache roll-up for cache
/// designs.
pub fn write_results(out: &mut dyn Write, cfg: &SweepConfig, outcome: &SearchOutcome) -> Result<()> {
    writeln!(
        out,
        "Explored {} organizations, {} valid",
        outcome.stats.designs, outcome.stats.solutions
    )?;
    for target in reported_targets(cfg) {
        writeln!(out)?;
        let header = format!("=== OPTIMIZED FOR: {} ===", target.label().to_uppercase());
        writeln!(out, "{}", header.bold())?;
        let Some(data) = outcome.best_data(target) else {
            writeln!(out, "{}", "No valid organization found.".yellow())?;
            continue;
        };
        if cfg.cell_files.len() > 1 {
            if let Some(path) = cfg.cell_files.get(data.cell_index) {
                writeln!(out, "Cell file: {}", path.display())?;
            }
        }
        if let Some(tag) = outcome.best_tag(target) {
            let summary = combine_cache(data, tag, cfg.cache_access_mode);
            write_cache_summary(out, cfg, &summary, data, tag)?;
            writeln!(out, "\n{}", "Data Array:".bold())?;
            write!(out, "{}", describe_candidate(cfg, data, 0))?;
            writeln!(out, "\n{}", "Tag Array:".bold())?;
            write!(out, "{}", describe_candidate(cfg, tag, 0))?;
        } else {
            write!(out, "{}", describe_candidate(cfg, data, 0))?;
        }
    }
    Ok(())
}

/// Print the report to stdout and emit any configured output files.
pub fn print_results(cfg: &SweepConfig, outcome: &SearchOutcome) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_results(&mut out, cfg, outcome)?;
    if let Some(prefix) = &cfg.output_file_prefix {
        if !outcome.exploration.is_empty() {
            let path = format!("{prefix}_exploration.csv");
            write_exploration_csv(outcome, &path)?;
            writeln!(out, "\nWrote {} candidates to {path}", outcome.exploration.len())?;
        }
        if !outcome.pruned.is_empty() {
            let path = format!("{prefix}_pruned.csv");
            write_pruned_csv(outcome, &path)?;
            writeln!(out, "\nWrote banded optima to {path}")?;
        }
        let json_path = format!("{prefix}.json");
        write_json(cfg, outcome, &json_path)?;
        writeln!(out, "Wrote summary to {json_path}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::tests as cell_fixtures;
    use crate::config::{DesignTarget, Range};
    use crate::search::run_with_cells;
    use crate::tech::DeviceRoadmap;

    fn searched_outcome(cache: bool) -> (SweepConfig, SearchOutcome) {
        let mut cfg = SweepConfig {
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
            mux_senseamp: Range::fixed(4),
            mux_output_lev1: Range::fixed(2),
            mux_output_lev2: Range::fixed(1),
            num_row_per_set: Range::fixed(1),
            area_optimization_level: Range::fixed(0),
            local_wire_type: Range::fixed(WireType::LocalAggressive as u32),
            global_wire_type: Range::fixed(WireType::GlobalAggressive as u32),
            ..SweepConfig::default()
        };
        if cache {
            cfg.design_target = DesignTarget::Cache;
            cfg.capacity = 32 * 1024;
            cfg.word_width = 256;
            cfg.associativity = 4;
            cfg.num_row_mat = Range::fixed(1);
            cfg.num_column_mat = Range::fixed(1);
            cfg.num_active_mat_per_row = Range::fixed(1);
            cfg.num_active_mat_per_column = Range::fixed(1);
            cfg.num_row_subarray = Range::fixed(1);
            cfg.num_column_subarray = Range::fixed(1);
            cfg.num_active_subarray_per_row = Range::fixed(1);
            cfg.num_active_subarray_per_column = Range::fixed(1);
            cfg.mux_senseamp = Range::new(1, 2);
            cfg.mux_output_lev1 = Range::fixed(1);
            cfg.mux_output_lev2 = Range::fixed(1);
        }
        let outcome = run_with_cells(&cfg, &[cell_fixtures::sram_cell()]).unwrap();
        (cfg, outcome)
    }

    #[test]
    fn text_report_names_the_objective_and_sizes() {
        let (cfg, outcome) = searched_outcome(false);
        let mut buf = Vec::new();
        write_results(&mut buf, &cfg, &outcome).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("OPTIMIZED FOR: READ LATENCY"));
        assert!(text.contains("Bank Organization: 2 x 2"));
        assert!(text.contains("Read Latency"));
        assert!(text.contains("Leakage Power"));
    }

    #[test]
    fn cache_report_includes_both_arrays() {
        let (cfg, outcome) = searched_outcome(true);
        let mut buf = Vec::new();
        write_results(&mut buf, &cfg, &outcome).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Cache Summary:"));
        assert!(text.contains("Data Array:"));
        assert!(text.contains("Tag Array:"));
        assert!(text.contains("Hit Latency"));
    }

    #[test]
    fn sequential_hits_pay_both_arrays_in_series() {
        let (cfg, outcome) = searched_outcome(true);
        let data = outcome
            .best_data(crate::config::OptimizationTarget::ReadLatency)
            .unwrap();
        let tag = outcome
            .best_tag(crate::config::OptimizationTarget::ReadLatency)
            .unwrap();
        let normal = combine_cache(data, tag, CacheAccessMode::Normal);
        let sequential = combine_cache(data, tag, CacheAccessMode::Sequential);
        let fast = combine_cache(data, tag, CacheAccessMode::Fast);
        approx::assert_relative_eq!(
            sequential.hit_latency,
            tag.bank.metrics.read_latency + data.bank.metrics.read_latency,
            max_relative = 1e-12
        );
        assert!(fast.hit_latency <= sequential.hit_latency);
        assert!(normal.hit_latency <= sequential.hit_latency);
        assert_eq!(normal.miss_latency, tag.bank.metrics.read_latency);
        let _ = cfg;
    }

    #[test]
    fn exploration_csv_round_trips_row_counts() {
        let mut cfg = searched_outcome(false).0;
        cfg.optimization_target = OptimizationTarget::FullExploration;
        let outcome = run_with_cells(&cfg, &[cell_fixtures::sram_cell()]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.csv");
        write_exploration_csv(&outcome, path.to_str().unwrap()).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        // header plus one line per candidate
        assert_eq!(contents.lines().count(), outcome.exploration.len() + 1);
        assert!(contents.starts_with("cell_index,num_row_mat"));
    }

    #[test]
    fn exploration_rows_carry_wires_geometry_and_refresh_columns() {
        let mut cfg = searched_outcome(false).0;
        cfg.optimization_target = OptimizationTarget::FullExploration;
        let outcome = run_with_cells(&cfg, &[cell_fixtures::sram_cell()]).unwrap();
        let header: Vec<&str> = csv_header().split(',').collect();
        for col in [
            "subarray_rows",
            "subarray_columns",
            "local_wire_type",
            "local_wire_repeater",
            "local_wire_low_swing",
            "global_wire_type",
            "global_wire_repeater",
            "global_wire_low_swing",
            "buffer_style",
            "bank_height_m",
            "bank_width_m",
            "bank_area_m2",
            "mat_height_m",
            "mat_width_m",
            "mat_area_m2",
            "subarray_height_m",
            "subarray_width_m",
            "subarray_area_m2",
            "area_efficiency_pct",
            "refresh_latency_s",
            "refresh_energy_j",
            "refresh_power_w",
        ] {
            assert!(header.contains(&col), "missing column {col}");
        }
        let row = &outcome.exploration[0];
        let line = csv_row(
            &row.org,
            &row.metrics,
            &row.local_wire,
            &row.global_wire,
            &row.detail,
            row.cell_index,
        );
        assert_eq!(line.split(',').count(), header.len());
        assert!(line.contains("Local Aggressive"));
        assert!(line.contains("Latency-Optimized"));
        assert!(row.detail.area_efficiency > 0.0);
        assert!(row.detail.area_efficiency < 100.0);
        // an SRAM never refreshes
        assert_eq!(row.detail.refresh_power, 0.0);
        assert!(line.ends_with(",0e0"));
    }

    #[test]
    fn refresh_lines_only_appear_for_refreshing_cells() {
        let (cfg, outcome) = searched_outcome(false);
        let mut c = outcome
            .best_data(OptimizationTarget::ReadLatency)
            .unwrap()
            .clone();
        // a stacked bank accumulates a TSV term here even for SRAM
        c.bank.metrics.refresh_latency = 1e-9;
        let text = describe_candidate(&cfg, &c, 0);
        assert!(!text.contains("Refresh"));

        let (cache_cfg, cache_outcome) = searched_outcome(true);
        let data = cache_outcome
            .best_data(OptimizationTarget::ReadLatency)
            .unwrap();
        let tag = cache_outcome
            .best_tag(OptimizationTarget::ReadLatency)
            .unwrap();
        let mut summary = combine_cache(data, tag, cache_cfg.cache_access_mode);
        summary.refresh_latency = 1e-9;
        let mut buf = Vec::new();
        write_cache_summary(&mut buf, &cache_cfg, &summary, data, tag).unwrap();
        assert!(!String::from_utf8(buf).unwrap().contains("Refresh"));
    }

    #[test]
    fn json_report_parses_back() {
        let (cfg, outcome) = searched_outcome(false);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        write_json(&cfg, &outcome, path.to_str().unwrap()).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["objective"], "read latency");
        assert!(parsed["data"].as_array().unwrap().len() >= 1);
    }
}
