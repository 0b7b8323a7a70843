//! `cloudwarden options` — the configured catalogue.

use super::CmdResult;
use cloudwarden_config::AppConfig;

pub async fn run() -> CmdResult {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let catalog = &config.catalog;
    println!("Models:   {}", catalog.models.join(", "));
    println!("Services: {}", catalog.services.join(", "));
    println!("Regions:  {}", catalog.regions.join(", "));
    Ok(())
}
