use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use voltset_cli::ConfigCommands;
use voltset_scenarios::{load_config_from_path, validate, SamplerConfig};

pub fn handle(command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Validate { file } => handle_validate(file),
        ConfigCommands::Template { out } => handle_template(out.as_deref()),
    }
}

fn handle_validate(file: &Path) -> Result<()> {
    let config = load_config_from_path(file)?;
    validate(&config).with_context(|| format!("validating '{}'", file.display()))?;
    println!(
        "Sampler config validated successfully ({} scenarios, output {})",
        config.scenarios,
        config.output.display()
    );
    Ok(())
}

fn handle_template(out: Option<&Path>) -> Result<()> {
    let template = SamplerConfig::template()?;
    match out {
        Some(path) => {
            fs::write(path, template)
                .with_context(|| format!("writing config template '{}'", path.display()))?;
            println!("Config template written to {}", path.display());
        }
        None => print!("{template}"),
    }
    Ok(())
}
