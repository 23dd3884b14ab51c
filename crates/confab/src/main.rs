//! A terminal front-end for a `confab` session backed by Gemini.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::time::Duration;

use confab::SessionBuilder;
use confab::core::{Delivery, DispatchStatus, IgnoreReason, TurnOutcome};
use confab_gemini_model::{GeminiConfigBuilder, GeminiProvider};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::time::sleep;

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Ok(api_key) = env::var("GEMINI_API_KEY") else {
        eprintln!("GEMINI_API_KEY environment variable is not set");
        return;
    };

    let mut config_builder = GeminiConfigBuilder::with_api_key(api_key);
    if let Ok(model) = env::var("GEMINI_MODEL") {
        config_builder = config_builder.with_model(model);
    }
    if let Ok(base_url) = env::var("GEMINI_BASE_URL") {
        config_builder = config_builder.with_base_url(base_url);
    }
    let config = config_builder.build();
    debug!("using config: {config:?}");
    let model_provider = GeminiProvider::new(config);

    let persona = match env::var("CONFAB_PERSONA_FILE") {
        Ok(path) => match std::fs::read_to_string(&path) {
            Ok(persona) => persona,
            Err(err) => {
                eprintln!("failed to read persona file {path}: {err}");
                return;
            }
        },
        Err(_) => include_str!("./persona.md").to_owned(),
    };

    let session = SessionBuilder::with_model_provider(model_provider)
        .with_persona(persona)
        .build();

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    loop {
        print!("> ");
        std::io::stdout().flush().unwrap();

        let Some(line) = read_line().await else {
            break;
        };
        let mut handle = session.send_message(&line);
        let mut status = session.status();

        let progress_bar = ProgressBar::new_spinner();
        progress_bar.set_style(progress_style.clone());
        progress_bar.set_message(status_message(&status.borrow()));

        let outcome = loop {
            progress_bar.inc(1);

            select! {
                outcome = &mut handle => break outcome,
                changed = status.changed() => {
                    if changed.is_ok() {
                        progress_bar
                            .set_message(status_message(&status.borrow()));
                    }
                }
                _ = sleep(Duration::from_millis(100)) => {}
            }
        };

        // Finish the progress bar before printing anything else.
        progress_bar.finish_and_clear();

        match outcome {
            TurnOutcome::Replied(report) => {
                let text = report.message.content();
                match report.delivery {
                    Delivery::Fallback => {
                        println!("{}{}", BAR_CHAR.bright_red(), text.red());
                    }
                    Delivery::Model | Delivery::Placeholder => {
                        println!(
                            "{}💬 {}",
                            BAR_CHAR.bright_cyan(),
                            text.bright_white()
                        );
                    }
                }
            }
            TurnOutcome::Ignored(IgnoreReason::EmptyInput) => {}
            TurnOutcome::Ignored(IgnoreReason::SessionNotReady) => {
                println!("{}session is not ready", BAR_CHAR.bright_yellow());
            }
            TurnOutcome::Rejected => {
                println!("{}still replying, try again", BAR_CHAR.bright_yellow());
            }
            TurnOutcome::Cancelled => break,
        }
    }

    session.shutdown();
}

fn status_message(status: &DispatchStatus) -> String {
    match status {
        DispatchStatus::BackingOff { delay, .. } => {
            format!("📡 Retrying in {}s...", delay.as_secs())
        }
        _ => "✍️ Typing...".to_owned(),
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
