use clap::Parser;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "testbed", version, about = "Runs storage benchmarks and compliance suites")]
pub struct CliArgs {
    /// Path to configuration file (yaml, toml or json).
    #[arg(short = 'c', long = "config-path", env = "TESTBED_CONFIG_PATH")]
    pub config_path: Option<String>,

    /// Validate the configuration and exit.
    #[arg(long)]
    pub check_config: bool,
}
