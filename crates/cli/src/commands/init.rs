//! `cloudwarden init` — create the config file and database.

use super::{CmdResult, Runtime};
use cloudwarden_config::AppConfig;

pub async fn run() -> CmdResult {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("CloudWarden — First-Time Setup");
    println!("==============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("⚠️  Config already exists at: {}", config_path.display());
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
    }

    let runtime = Runtime::open().await?;
    println!("✅ Database ready at: {}", runtime.config.database.resolved_path().display());

    println!("\nNext steps:");
    println!("   1. cloudwarden connect --access-key ... --secret-key ... --region us-east-1 --api-key sk-...");
    println!("   2. cloudwarden chat");
    println!("   3. cloudwarden scan --services s3,iam --regions us-east-1\n");

    Ok(())
}
