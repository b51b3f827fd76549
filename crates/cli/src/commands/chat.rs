//! `uavchat chat`: interactive or single-message chat over a flight log on disk.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use uavchat_agent::{Session, SessionOptions};
use uavchat_config::AppConfig;
use uavchat_core::flight::{TelemetryDocument, join_sections};
use uavchat_providers::ProviderGenerator;

pub async fn run(file: &Path, message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early: give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables (or put it in ./.env):");
        eprintln!("    UAVCHAT_API_KEY=...   (generic)");
        eprintln!("    GEMINI_API_KEY=...    (Google Gemini, the default provider)");
        eprintln!("    OPENAI_API_KEY=...    (with UAVCHAT_PROVIDER=openai)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let text = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let document = TelemetryDocument::from_json_str(&text)?;
    let present = join_sections(&document.present_sections());

    let generator = ProviderGenerator::from_config(&config)?;
    let model = generator.model().to_string();
    let mut session = Session::new(
        document,
        Arc::new(generator),
        &SessionOptions::from(&config.session),
    );

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let answer = session.ask(&msg).await?;
        eprint!("\r              \r");
        println!("{answer}");
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  uavchat: UAV flight log assistant");
    println!();
    println!("  Log:       {}", file.display());
    println!("  Sections:  {present}");
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {model}");
    println!();
    println!("  Ask about your flight. Type 'exit', 'quit' or 'bye' to leave.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            print!("  You > ");
            std::io::stdout().flush()?;
            continue;
        }
        if is_exit_command(line) {
            break;
        }

        eprint!("  ...");
        match session.ask(line).await {
            Ok(answer) => {
                eprint!("\r     \r");
                println!();
                for answer_line in answer.lines() {
                    println!("  Assistant > {answer_line}");
                }
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  [Error] {e}");
                println!();
            }
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}

fn is_exit_command(line: &str) -> bool {
    matches!(
        line.to_ascii_lowercase().as_str(),
        "exit" | "quit" | "bye" | "/exit" | "/quit"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_words_end_the_loop() {
        for word in ["exit", "quit", "bye", "BYE", "/quit"] {
            assert!(is_exit_command(word), "{word} should exit");
        }
        for word in ["goodbye", "what is the max altitude?", ""] {
            assert!(!is_exit_command(word));
        }
    }
}
