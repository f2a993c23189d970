use std::path::{Path, PathBuf};

use {
    anyhow::Result,
    bpi_config::{BpiConfig, Severity, ValidationResult},
    clap::Subcommand,
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration and report errors and warnings.
    Check {
        /// Config file to check instead of the discovered one.
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Print where config files are searched.
    Paths,
}

pub fn handle_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Check { path } => check(path.as_deref()),
        ConfigAction::Paths => {
            eprintln!("./bpi.{{toml,yaml,yml,json}}");
            if let Some(dir) = bpi_config::config_dir() {
                eprintln!("{}/bpi.{{toml,yaml,yml,json}}", dir.display());
            }
            Ok(())
        },
    }
}

/// Load the config the gateway would run with.
pub fn load(path: Option<&Path>) -> Result<BpiConfig> {
    match path {
        Some(path) => {
            let mut config = bpi_config::load_config(path)?;
            bpi_config::apply_env_overrides(&mut config);
            Ok(config)
        },
        None => Ok(bpi_config::discover_and_load()),
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn check(path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => eprintln!("Checking {}\n", path.display()),
        None => eprintln!("Checking discovered config and environment.\n"),
    }
    let config = load(path)?;
    let result = bpi_config::validate(&config);
    print_diagnostics(&result);

    if result.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_diagnostics(result: &ValidationResult) {
    for d in &result.diagnostics {
        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
        };
        eprintln!("  {BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message);
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("\n{errors} error(s), {warnings} warning(s)");
    }
}
