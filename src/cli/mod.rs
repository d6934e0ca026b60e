use std::fs::canonicalize;
use std::time::Duration;

use clap::Parser;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::args::Args;
use crate::config::parse_sweep_config;
use crate::{report, search, Result};

pub mod args;

pub const BANNER: &str = r"
 __  __  ___  __  __  ____ __      __ ___  ___  ___
|  \/  || __||  \/  |/ ___|\ \ /\ / /| __|| __|| _ \
| |\/| || _| | |\/| |\___ \ \ V  V / | _| | _| |  _/
|_|  |_||___||_|  |_||____/  \_/\_/  |___||___||_|

MEMSWEEP v0.1
";

pub fn run() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let config_path = canonicalize(&args.config)?;

    println!("{BANNER}");

    println!("Reading configuration file...\n");
    let mut config = parse_sweep_config(&config_path)?;
    if let Some(prefix) = args.output_prefix {
        config.output_file_prefix = Some(prefix);
    }
    if args.print_all {
        config.print_all_optimals = true;
    }

    println!("Configuration file: {:?}", &config_path);
    println!("Sweep parameters:");
    println!("\tDesign target: {:?}", config.design_target);
    println!("\tCapacity: {} bytes", config.capacity);
    println!("\tWord width: {} bits", config.word_width);
    println!("\tProcess node: {} nm", config.process_node);
    println!(
        "\tOptimization target: {}",
        config.optimization_target.label()
    );
    println!("\tCell files: {}", config.cell_files.len());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template(
        "{spinner:.green} {msg} [{elapsed}]",
    )?);
    spinner.enable_steady_tick(Duration::from_millis(200));
    spinner.set_message("Exploring design space...");
    let res = search::run(&config);
    spinner.finish_and_clear();
    let outcome = res?;

    report::print_results(&config, &outcome)?;
    Ok(())
}
