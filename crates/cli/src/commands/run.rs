//! `taskloom run` and `taskloom plan`: drive an agent until it stops.

use std::io::Write;
use std::time::Duration;

use taskloom_agent::{Agent, Preset, presets};
use taskloom_config::AppConfig;
use taskloom_core::event::EventBus;
use tracing::{info, warn};

use super::progress;

pub async fn run(preset: Preset, prompt: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(prompt) = read_prompt(prompt)? else {
        warn!("Empty prompt provided.");
        return Ok(());
    };
    let config = prepare()?;
    let provider = taskloom_providers::from_config(&config)?;

    let events = EventBus::default();
    let printer = progress::spawn(events.subscribe());
    let mut agent = presets::build(preset, &config, provider, Some(events));

    info!(agent = %preset, model = %config.model, "Processing your request...");
    let outcome = drive(agent.as_mut(), prompt, config.run.timeout()).await;
    printer.abort();

    if let Some(summary) = outcome? {
        println!("{summary}");
    }
    Ok(())
}

pub async fn plan(prompt: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(prompt) = read_prompt(prompt)? else {
        warn!("Empty prompt provided.");
        return Ok(());
    };
    let config = prepare()?;
    let provider = taskloom_providers::from_config(&config)?;

    let events = EventBus::default();
    let printer = progress::spawn(events.subscribe());
    let mut agent = presets::planning_agent(&config, provider, Some(events));

    info!(model = %config.model, "Planning your request...");
    let outcome = drive(&mut agent, prompt, config.run.timeout()).await;
    printer.abort();

    if let Some(summary) = outcome? {
        println!("{summary}");
        println!();
    }
    println!("{}", agent.get_plan());
    Ok(())
}

/// Load config, point the user at setup if no key is set, and make sure
/// the workspace exists.
fn prepare() -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    TASKLOOM_API_KEY=sk-...");
        eprintln!("    OPENAI_API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let workspace = config.workspace_dir();
    std::fs::create_dir_all(&workspace)
        .map_err(|e| format!("Failed to create workspace {}: {e}", workspace.display()))?;
    Ok(config)
}

/// Run `agent` on `prompt`, bounded by `timeout` and Ctrl+C.
///
/// Returns `None` when interrupted.
async fn drive<A: Agent + ?Sized>(
    agent: &mut A,
    prompt: String,
    timeout: Option<Duration>,
) -> Result<Option<String>, taskloom_core::Error> {
    let finished = {
        let run = async {
            match timeout {
                Some(limit) => agent.run_with_timeout(Some(prompt), limit).await,
                None => agent.run(Some(prompt)).await,
            }
        };
        tokio::select! {
            outcome = run => Some(outcome),
            _ = tokio::signal::ctrl_c() => None,
        }
    };

    match finished {
        Some(outcome) => {
            let summary = outcome?;
            info!("Request processing completed.");
            Ok(Some(summary))
        }
        None => {
            warn!("Operation interrupted.");
            agent.core().tools().cleanup_all().await;
            Ok(None)
        }
    }
}

/// Use the argument, or ask on stdin. Blank input yields `None`.
fn read_prompt(arg: Option<String>) -> std::io::Result<Option<String>> {
    let prompt = match arg {
        Some(prompt) => prompt,
        None => {
            eprint!("Enter your prompt: ");
            std::io::stderr().flush()?;
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
            line
        }
    };
    let prompt = prompt.trim();
    Ok((!prompt.is_empty()).then(|| prompt.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_argument_is_trimmed() {
        let prompt = read_prompt(Some("  list files \n".into())).unwrap();
        assert_eq!(prompt.as_deref(), Some("list files"));
    }

    #[test]
    fn blank_prompt_is_none() {
        assert_eq!(read_prompt(Some("   ".into())).unwrap(), None);
    }
}
