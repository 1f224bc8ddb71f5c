use clap::{Parser, ValueEnum};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::{info, warn};
use std::fs;
use std::path::PathBuf;

use netweave::backend::MemoryBackend;
use netweave::config_loader::{self, ConfigOverrides};
use netweave::orchestrator;
use netweave::topology::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

/// Plan the network wiring of one account/region deployment unit
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the topology YAML file
    #[arg(short, long)]
    config: PathBuf,

    /// Account name the unit runs in
    #[arg(short, long)]
    account: String,

    /// Region the unit runs in
    #[arg(short, long)]
    region: String,

    /// JSON snapshot of published values, shares and attachments
    #[arg(long)]
    values: Option<PathBuf>,

    /// Write the plan to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Plan output format
    #[arg(long, value_enum, default_value = "yaml")]
    format: OutputFormat,

    /// Override the prefix used for value paths and role names
    #[arg(long)]
    prefix: Option<String>,

    /// Override the home region
    #[arg(long)]
    home_region: Option<String>,
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    // Initialize logging with default filter level of "info"
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Starting netweave planner");
    info!("Topology file: {:?}", args.config);

    let mut config = config_loader::load_config(&args.config)?;
    let overrides = ConfigOverrides {
        prefix: args.prefix.clone(),
        home_region: args.home_region.clone(),
    };
    config_loader::apply_overrides(&mut config, &overrides)?;

    let backend = match &args.values {
        Some(path) => MemoryBackend::from_json_file(path)?,
        None => {
            warn!("No values snapshot given; every lookup will come back empty");
            MemoryBackend::new()
        }
    };

    let scope = Scope::new(args.account.clone(), args.region.clone());
    let plan = orchestrator::plan_unit(&config, &scope, &backend)
        .wrap_err_with(|| format!("Planning failed for {}", scope))?;

    let rendered = match args.format {
        OutputFormat::Yaml => plan.to_yaml().wrap_err("Failed to render plan as YAML")?,
        OutputFormat::Json => plan.to_json().wrap_err("Failed to render plan as JSON")?,
    };

    match &args.output {
        Some(path) => {
            fs::write(path, rendered).wrap_err_with(|| format!("Failed to write plan to '{}'", path.display()))?;
            info!("Plan written to {:?}", path);
        }
        None => println!("{}", rendered),
    }

    info!("Planning completed successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from([
            "netweave",
            "--config", "topology.yaml",
            "--account", "Network",
            "--region", "us-east-1",
        ]);

        assert_eq!(args.config, PathBuf::from("topology.yaml"));
        assert_eq!(args.account, "Network");
        assert_eq!(args.format, OutputFormat::Yaml);
        assert!(args.values.is_none());
        assert!(args.output.is_none());
    }

    #[test]
    fn test_json_output_args() {
        let args = Args::parse_from([
            "netweave",
            "-c", "topology.yaml",
            "-a", "Dev",
            "-r", "eu-west-1",
            "--values", "values.json",
            "--format", "json",
            "--prefix", "lz",
        ]);

        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.values, Some(PathBuf::from("values.json")));
        assert_eq!(args.prefix.as_deref(), Some("lz"));
    }
}
