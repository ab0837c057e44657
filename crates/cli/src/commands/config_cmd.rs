//! `taskloom config`: configuration management commands.

use taskloom_config::AppConfig;

pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete it and re-run `taskloom config init`.");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());

    let workspace_dir = AppConfig::default().workspace_dir();
    if !workspace_dir.exists() {
        std::fs::create_dir_all(&workspace_dir)?;
        println!("✅ Created workspace directory: {}", workspace_dir.display());
    }

    println!("\n📝 Next steps:");
    println!("   1. Add api_key to {} (or set TASKLOOM_API_KEY)", config_path.display());
    println!("   2. Run: taskloom run \"your request\"");
    Ok(())
}

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.has_api_key() {
                warnings.push("No API key set (set TASKLOOM_API_KEY or OPENAI_API_KEY)".to_string());
            }
            if config.run.timeout().is_none() {
                warnings.push("run.timeout_secs = 0: runs are not time-limited".to_string());
            }
            if !config.workspace_dir().exists() {
                warnings.push(format!(
                    "Workspace {} does not exist yet; it is created on first run",
                    config.workspace_dir().display()
                ));
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
            println!("   Endpoint:   {}", config.base_url);
            println!("   Model:      {}", config.model);
            println!("   Max steps:  {}", config.agent.max_steps);
            println!("   Workspace:  {}", config.workspace_dir().display());
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if config.api_key.is_some() {
        config.api_key = Some("[REDACTED]".into());
    }
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
