use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use colored::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::blink::BlinkType;
use crate::config::Config;
use crate::context::{time_context, ContextAnalyzer};
use crate::core::{Clock, KeyValueStore, ManualClock, MemoryStore, SystemClock};
use crate::easter_eggs::EasterEggArbiter;
use crate::emotion::EmotionalState;
use crate::engine::{EngineSettings, GrumpEngine};
use crate::eye_roll::EyeRollVariation;
use crate::progression::ProgressionTracker;

const AT_FORMAT: &str = "%Y-%m-%dT%H:%M";
const SIMULATED_MESSAGE_GAP_MS: i64 = 2000;

#[derive(Parser)]
#[command(name = "grump")]
#[command(about = "Context-aware emotional animation engine for the Grump chat mascot")]
pub struct Cli {
    /// Directory holding config.json and the progression store
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze one message and print the result as JSON
    Analyze { message: String },
    /// Show the time-of-day context
    Time {
        /// Local time as YYYY-MM-DDTHH:MM (defaults to now)
        #[arg(long)]
        at: Option<String>,
    },
    /// Evaluate the easter eggs once
    Eggs {
        /// Local time as YYYY-MM-DDTHH:MM (defaults to now)
        #[arg(long)]
        at: Option<String>,
        /// Message to evaluate alongside the clock
        #[arg(long)]
        message: Option<String>,
    },
    /// Run the engine on a simulated clock and summarize what happened
    Simulate {
        /// Simulated duration in seconds
        #[arg(long, default_value = "30")]
        seconds: u64,
        /// RNG seed (overrides config)
        #[arg(long)]
        seed: Option<u64>,
        /// Start time as YYYY-MM-DDTHH:MM (defaults to now)
        #[arg(long)]
        at: Option<String>,
        /// Messages sent two seconds apart, in order
        #[arg(long)]
        message: Vec<String>,
    },
    /// Interactive console: type messages, /reply, /error, /eyeroll, /blink, /snapshot, /quit
    Chat,
    /// Show XP, level and unlocked features
    Status,
    /// Reset progression
    Reset,
}

fn parse_at(at: Option<&str>) -> Result<NaiveDateTime> {
    match at {
        Some(raw) => NaiveDateTime::parse_from_str(raw, AT_FORMAT)
            .with_context(|| format!("Invalid time '{}', expected YYYY-MM-DDTHH:MM", raw)),
        None => Ok(Local::now().naive_local()),
    }
}

pub async fn handle_analyze(message: String) -> Result<()> {
    let mut analyzer = ContextAnalyzer::new(0);
    let analysis = analyzer.analyze_message(&message);
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

pub async fn handle_time(at: Option<String>) -> Result<()> {
    let now = parse_at(at.as_deref())?;
    let context = time_context(now);
    println!("{}", serde_json::to_string_pretty(&context)?);
    Ok(())
}

pub async fn handle_eggs(at: Option<String>, message: Option<String>) -> Result<()> {
    let now = parse_at(at.as_deref())?;
    let now_ms = now.and_utc().timestamp_millis();
    let mut arbiter = EasterEggArbiter::new(now_ms);
    let mut rng = StdRng::from_entropy();

    match arbiter.evaluate(message.as_deref(), now, now_ms, &mut rng) {
        Some(trigger) => {
            println!("{} {}", "🥚".yellow(), trigger.name.yellow().bold());
            println!("{}", serde_json::to_string_pretty(&trigger)?);
        }
        None => println!("{}", "No easter egg right now.".dimmed()),
    }
    Ok(())
}

pub async fn handle_simulate(
    data_dir: Option<PathBuf>,
    seconds: u64,
    seed: Option<u64>,
    at: Option<String>,
    messages: Vec<String>,
) -> Result<()> {
    let config = Config::new(data_dir)?;
    let start = parse_at(at.as_deref())?;
    let clock = ManualClock::new(start);

    // Seed the throwaway store from the real one so unlocks carry over,
    // but never write back.
    let mut store = MemoryStore::new();
    ProgressionTracker::load(&config.open_store()?).save(&mut store)?;

    let settings = EngineSettings {
        seed: seed.or(config.seed),
        ..config.engine_settings()
    };
    let mut engine = GrumpEngine::new(clock.clone(), store, settings);

    let frame_ms = config.frame_interval_ms.max(1) as i64;
    let total_ms = seconds as i64 * 1000;
    let mut pending = messages.into_iter().enumerate().peekable();
    let mut last_state = engine.current_state();
    let mut elapsed = 0;

    println!("{} {}", "Simulating from".cyan().bold(), start);
    while elapsed < total_ms {
        while let Some((index, _)) = pending.peek() {
            if (*index as i64) * SIMULATED_MESSAGE_GAP_MS > elapsed {
                break;
            }
            if let Some((_, text)) = pending.next() {
                if let Some(outcome) = engine.send_message(&text) {
                    println!(
                        "{:>7}ms  {} {:?} -> {} (+{} xp)",
                        elapsed,
                        "you:".green(),
                        text,
                        outcome.state,
                        outcome.xp.gained
                    );
                    if let Some(trigger) = outcome.trigger {
                        println!("           {} {}", "easter egg:".yellow(), trigger.name);
                    }
                }
            }
        }

        clock.advance_ms(frame_ms);
        elapsed += frame_ms;
        engine.tick();

        let state = engine.current_state();
        if state != last_state {
            println!("{:>7}ms  {} -> {}", elapsed, last_state, state.to_string().cyan());
            last_state = state;
        }
    }

    let stats = engine.stats();
    let progression = engine.progression();
    println!("\n{}", "Summary".cyan().bold());
    println!("Transitions: {}", stats.transitions);
    println!("Blinks: {}", stats.blinks);
    println!("Eye rolls: {}", stats.eye_rolls);
    println!("Easter eggs: {}", stats.easter_eggs);
    println!("Live particles: {}", engine.particles().len());
    println!("XP: {} (level {})", progression.xp, progression.level);
    println!("\n{}", "Final snapshot".cyan().bold());
    println!("{}", serde_json::to_string_pretty(engine.snapshot())?);

    engine.shutdown();
    Ok(())
}

pub async fn handle_chat(data_dir: Option<PathBuf>) -> Result<()> {
    let config = Config::new(data_dir)?;
    let store = config.open_store()?;
    let mut engine = GrumpEngine::new(SystemClock, store, config.engine_settings());

    let mut frames =
        tokio::time::interval(std::time::Duration::from_millis(config.frame_interval_ms.max(1)));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_state = engine.current_state();

    println!("{}", "Grump is watching. Type a message, or /quit.".cyan().bold());
    loop {
        tokio::select! {
            _ = frames.tick() => {
                engine.tick();
                let state = engine.current_state();
                if state != last_state {
                    println!("{} {}", "grump:".red(), describe(state));
                    last_state = state;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                if !run_chat_line(&mut engine, line.trim())? {
                    break;
                }
            }
        }
    }

    engine.shutdown();
    println!("{}", "Bye. Finally.".dimmed());
    Ok(())
}

/// Returns false when the console should close.
fn run_chat_line<C: Clock, S: KeyValueStore>(
    engine: &mut GrumpEngine<C, S>,
    line: &str,
) -> Result<bool> {
    let (command, argument) = match line.split_once(' ') {
        Some((command, argument)) => (command, argument.trim()),
        None => (line, ""),
    };

    match command {
        "" => {}
        "/quit" | "/exit" => return Ok(false),
        "/reply" => {
            engine.reply_pending();
            engine.receive_reply(argument);
        }
        "/error" => engine.report_error(),
        "/eyeroll" => {
            let variation = if argument.is_empty() {
                EyeRollVariation::Full
            } else {
                match argument.parse::<EyeRollVariation>() {
                    Ok(variation) => variation,
                    Err(err) => {
                        println!("{}", err.to_string().yellow());
                        return Ok(true);
                    }
                }
            };
            if !engine.trigger_eye_roll(variation) {
                println!("{}", "Already rolling.".dimmed());
            }
        }
        "/blink" => {
            let blink_type = if argument.is_empty() {
                BlinkType::Standard
            } else {
                match argument.parse::<BlinkType>() {
                    Ok(blink_type) => blink_type,
                    Err(err) => {
                        println!("{}", err.to_string().yellow());
                        return Ok(true);
                    }
                }
            };
            if !engine.trigger_blink(blink_type) {
                println!("{}", "Mid-blink.".dimmed());
            }
        }
        "/snapshot" => println!("{}", serde_json::to_string_pretty(engine.snapshot())?),
        _ if command.starts_with('/') => {
            println!("{} {}", "Unknown command:".yellow(), command);
        }
        _ => {
            engine.input_changed(line, line.chars().count());
            if let Some(outcome) = engine.send_message(line) {
                if let Some(message) = outcome.trigger.as_ref().and_then(|t| t.message) {
                    println!("{} {}", "grump:".red(), message);
                }
                for unlock in &outcome.unlocked {
                    println!("{} {}", "🔓 Unlocked:".green().bold(), unlock.name());
                }
                if outcome.xp.leveled_up {
                    println!("{} {}", "⬆ Level".green().bold(), outcome.xp.level);
                }
            }
        }
    }
    Ok(true)
}

fn describe(state: EmotionalState) -> String {
    format!("[{}, annoyance {}]", state, state.annoyance_level())
}

pub async fn handle_reset(data_dir: Option<PathBuf>) -> Result<()> {
    let config = Config::new(data_dir)?;
    let mut store = config.open_store()?;
    ProgressionTracker::default()
        .save(&mut store)
        .context("Failed to write progression")?;
    println!("{}", "Progression reset. Grump has forgotten everything.".yellow());
    Ok(())
}
