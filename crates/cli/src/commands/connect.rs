//! `cloudwarden connect` — save AWS and model credentials.

use super::{CmdResult, Runtime};
use cloudwarden_core::store::{Credentials, PersistQueueStore};

pub struct ConnectArgs {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub session_token: Option<String>,
    pub api_key: Option<String>,
}

pub async fn run(args: ConnectArgs) -> CmdResult {
    let runtime = Runtime::open().await?;

    let region = args.region.trim().to_string();
    if !runtime.config.catalog.regions.iter().any(|r| *r == region) {
        eprintln!("  ⚠️  Region {region} is not in the configured catalogue");
    }

    let credentials = Credentials {
        aws_access_key: args.access_key.trim().to_string(),
        aws_secret_key: args.secret_key.trim().to_string(),
        aws_region: region,
        aws_session_token: args.session_token.filter(|t| !t.trim().is_empty()),
        model_api_key: args.api_key.filter(|k| !k.trim().is_empty()),
    };
    if credentials.aws_access_key.is_empty() || credentials.aws_secret_key.is_empty() {
        return Err("Access key and secret key cannot be empty".into());
    }

    tracing::debug!(credentials = ?credentials, "Storing credentials");
    runtime.store.store_credentials(credentials).await?;
    println!("✅ Credentials stored successfully");
    Ok(())
}
