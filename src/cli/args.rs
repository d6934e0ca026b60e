use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about,
    help_template(
        "{before-help}{name} {version}\n{author-with-newline}{about-with-newline}\n{usage-heading} {usage}\n\n{all-args}{after-help}"
    )
)]
pub struct Args {
    /// Path to TOML configuration file.
    #[arg(short, long, default_value = "memsweep.toml")]
    pub config: PathBuf,

    /// Prefix for CSV and JSON output files (overrides the config).
    #[arg(short, long)]
    pub output_prefix: Option<String>,

    /// Print the best organization for every metric, not just the
    /// configured optimization target.
    #[arg(long)]
    pub print_all: bool,
}
