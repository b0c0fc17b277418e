//! Show or initialize the configuration.

use stride_common::config::AppConfig;

pub fn run(config: &AppConfig, init: bool) -> anyhow::Result<()> {
    println!("Config file: {}", AppConfig::path().display());
    println!("{}", serde_json::to_string_pretty(config)?);
    println!();
    println!("Effective analyzer tuning (pass overrides with --tuning):");
    println!("{}", super::build_tuning(config, None)?.to_json()?);

    if init {
        config.save()?;
        println!("\nConfiguration written to: {}", AppConfig::path().display());
    }
    Ok(())
}
