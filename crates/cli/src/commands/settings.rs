//! `cloudwarden settings` — show or update runtime settings.

use super::{CmdResult, Runtime};
use cloudwarden_core::provider::Provider;
use cloudwarden_core::settings::SettingsPatch;
use cloudwarden_core::store::PersistQueueStore;
use cloudwarden_providers::OpenAiCompatProvider;

pub async fn run(model: Option<String>, monitor: Option<bool>, max_requests: Option<u32>) -> CmdResult {
    let runtime = Runtime::open().await?;

    let patch = SettingsPatch {
        model,
        max_requests,
        monitor_mode: monitor,
    };

    if let Some(model) = &patch.model {
        if !runtime.config.catalog.knows_model(model) {
            return Err(format!("Invalid model: {model}").into());
        }
        check_model_access(&runtime, model).await?;
    }
    if patch.max_requests == Some(0) {
        return Err("max-requests must be at least 1".into());
    }

    let settings = if patch.is_empty() {
        runtime.store.get_settings().await?
    } else {
        let updated = runtime.store.update_settings(patch).await?;
        println!("✅ Settings updated successfully");
        updated
    };

    println!("  Model:         {}", settings.model);
    println!("  Max requests:  {}", settings.max_requests);
    println!("  Monitor mode:  {}", if settings.monitor_mode { "on" } else { "off" });
    Ok(())
}

/// Ask the backend whether the key can use `model`; skipped without a key.
async fn check_model_access(runtime: &Runtime, model: &str) -> CmdResult {
    let mut config = runtime.config.clone();
    if !config.has_api_key() {
        config.api_key = runtime.store.get_credentials().await?.and_then(|c| c.model_api_key);
    }
    let Ok(provider) = OpenAiCompatProvider::from_config(&config) else {
        tracing::warn!(model, "No API key available, skipping model access check");
        return Ok(());
    };
    if !provider.has_model(model).await? {
        return Err(format!("Model not available: {model}").into());
    }
    Ok(())
}
