//! `uavchat config`: configuration management commands.

use uavchat_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();

            if !config.has_api_key() {
                warnings.push("No API key set (set UAVCHAT_API_KEY or GEMINI_API_KEY env var)");
            }

            if config.gateway.max_upload_bytes < 1024 * 1024 {
                warnings.push("gateway.max_upload_bytes is below 1 MiB; real flight logs will be rejected");
            }

            if config.session.summary_window < config.session.summary_interval {
                warnings.push("session.summary_window is smaller than summary_interval; some turns never reach the summary");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Provider:  {}", config.default_provider);
            println!("   Model:     {}", config.effective_model());
            println!(
                "   Gateway:   {}:{}",
                config.gateway.host, config.gateway.port
            );
            println!(
                "   Session:   window {} turns, summary every {} turns (≤ {} chars)",
                config.session.history_window,
                config.session.summary_interval,
                config.session.summary_max_chars
            );
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", render(&config)?);
    Ok(())
}

/// The effective config as TOML. API keys are left out.
fn render(config: &AppConfig) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(config)
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
