// Config command - show or initialize configuration

use anyhow::{Context, Result, bail};
use std::fs;

use crate::cli::args::ConfigArgs;
use crate::config::Config;

pub fn handle_config(config: &Config, args: &ConfigArgs) -> Result<()> {
    let Some(path) = &args.init else {
        print!("{}", config.to_toml());
        return Ok(());
    };

    if path.exists() {
        bail!("{} already exists", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, Config::default().to_toml())
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("Created default configuration at {}", path.display());
    Ok(())
}
