//! End-to-end runs driven from config files on disk, the way the CLI
//! invokes the library.

use std::fs;

use memsweep::config::{parse_sweep_config, OptimizationTarget};
use memsweep::{report, search};
use tempfile::tempdir;

const SRAM_CELL: &str = r#"
mem_cell_type = "sram"
area = 146.0
aspect_ratio = 1.46
width_access_cmos = 1.31
width_sram_cell_nmos = 2.08
width_sram_cell_pmos = 1.23
min_sense_voltage = 0.08
access_type = "cmos_access"
"#;

fn sweep_ranges() -> &'static str {
    r#"
[num_row_mat]
min = 2
max = 2

[num_column_mat]
min = 2
max = 2

[num_active_mat_per_row]
min = 2
max = 2

[num_active_mat_per_column]
min = 2
max = 2

[num_row_subarray]
min = 2
max = 2

[num_column_subarray]
min = 2
max = 2

[num_active_subarray_per_row]
min = 2
max = 2

[num_active_subarray_per_column]
min = 2
max = 2

[mux_senseamp]
min = 1
max = 4

[mux_output_lev1]
min = 2
max = 2

[mux_output_lev2]
min = 1
max = 1

[area_optimization_level]
min = 0
max = 0

[local_wire_type]
min = 0
max = 0

[global_wire_type]
min = 4
max = 4
"#
}

#[test]
fn sweeps_an_sram_ram_chip_from_config_files() {
    let dir = tempdir().unwrap();
    let cell_path = dir.path().join("sram.toml");
    fs::write(&cell_path, SRAM_CELL).unwrap();
    let config_path = dir.path().join("memsweep.toml");
    fs::write(
        &config_path,
        format!(
            r#"
design_target = "ram_chip"
optimization_target = "read_latency"
capacity = 8192
word_width = 64
cell_files = ["{}"]
{}"#,
            cell_path.display(),
            sweep_ranges()
        ),
    )
    .unwrap();

    let cfg = parse_sweep_config(&config_path).unwrap();
    let outcome = search::run(&cfg).unwrap();
    assert!(outcome.stats.solutions > 0);
    let best = outcome
        .best_data(OptimizationTarget::ReadLatency)
        .expect("a valid organization exists in this space");
    assert!(best.bank.metrics.read_latency > 0.0);
    assert!(best.bank.metrics.read_latency < 1e-6);
    assert_eq!(best.org.capacity_bits, 8192 * 8);

    let json_path = dir.path().join("summary.json");
    report::write_json(&cfg, &outcome, json_path.to_str().unwrap()).unwrap();
    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(parsed["objective"], "read latency");
}

#[test]
fn sweeps_a_cache_and_reports_both_arrays() {
    let dir = tempdir().unwrap();
    let cell_path = dir.path().join("sram.toml");
    fs::write(&cell_path, SRAM_CELL).unwrap();
    let config_path = dir.path().join("memsweep.toml");
    fs::write(
        &config_path,
        format!(
            r#"
design_target = "cache"
optimization_target = "read_edp"
capacity = 32768
word_width = 256
associativity = 4
cell_files = ["{}"]

[num_row_mat]
min = 1
max = 1

[num_column_mat]
min = 1
max = 1

[num_active_mat_per_row]
min = 1
max = 1

[num_active_mat_per_column]
min = 1
max = 1

[num_row_subarray]
min = 1
max = 1

[num_column_subarray]
min = 1
max = 1

[num_active_subarray_per_row]
min = 1
max = 1

[num_active_subarray_per_column]
min = 1
max = 1

[mux_senseamp]
min = 1
max = 2

[mux_output_lev1]
min = 1
max = 1

[mux_output_lev2]
min = 1
max = 1

[area_optimization_level]
min = 0
max = 0

[local_wire_type]
min = 0
max = 0

[global_wire_type]
min = 4
max = 4
"#,
            cell_path.display()
        ),
    )
    .unwrap();

    let cfg = parse_sweep_config(&config_path).unwrap();
    let outcome = search::run(&cfg).unwrap();
    let data = outcome.best_data(OptimizationTarget::ReadEdp).unwrap();
    let tag = outcome.best_tag(OptimizationTarget::ReadEdp).unwrap();
    let summary = report::combine_cache(data, tag, cfg.cache_access_mode);
    assert!(summary.hit_latency >= summary.miss_latency);
    assert!(summary.area > data.bank.metrics.area);

    let mut buf = Vec::new();
    report::write_results(&mut buf, &cfg, &outcome).unwrap();
    let text = String::from_utf8(buf).unwrap();
    assert!(text.contains("Cache Summary:"));
    assert!(text.contains("Tag Array:"));
}
