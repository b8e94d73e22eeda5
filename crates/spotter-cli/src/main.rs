//! `spotter` – runs the interaction routine on a simulated or real robot.
//!
//! 1. Initialises logging (and OTLP export when configured).
//! 2. Loads `~/.spotter/config.toml`, applies `SPOTTER_*` overrides and
//!    validates the result.
//! 3. Opens the configured base and collaborators and runs the routine once.
//! 4. Intercepts **Ctrl-C**: the routine stops at the next phase boundary and
//!    the base is sent a final stop before exit.
//!
//! `spotter init` writes a default config file instead.

mod config;

use colored::Colorize;
use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

use config::Config;
use spotter_hal::open_base;
use spotter_runtime::detector::FACE;
use spotter_runtime::{
    CommandDetector, CommandSpeaker, ConsoleListener, Detector, InteractionRoutine, Listener,
    LlmDriver, LogSpeaker, QuestionInterpreter, RecordingListener, Robot, RoutineOutcome,
    ScriptedDetector, Speaker, Transcriber,
};
use spotter_types::{SpotterError, VelocityCommand};

fn main() -> ExitCode {
    let _telemetry = spotter_runtime::init_tracing("spotter");

    match std::env::args().nth(1).as_deref() {
        None => {}
        Some("init") => return init_config(),
        Some("-h" | "--help" | "help") => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        Some(other) => {
            println!("{}: unknown command `{other}`", "Error".red());
            print_usage();
            return ExitCode::FAILURE;
        }
    }

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!(
            "{}",
            "⚠  Ctrl-C received – finishing the current phase, then stopping …"
                .yellow()
                .bold()
        );
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(
            error = %e,
            "Failed to install Ctrl-C handler; Ctrl-C will kill the process without a final stop"
        );
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!(
                "  Fix {} or run `{}`.",
                config::config_path().display().to_string().bold(),
                "spotter init".bold()
            );
            return ExitCode::FAILURE;
        }
    };
    info!(backend = %cfg.base.backend, model = %cfg.llm.model, "configuration loaded");
    println!(
        "  Base: {}   Model: {}   Input: {}\n",
        cfg.base.backend.to_string().bold(),
        cfg.llm.model.bold(),
        if cfg.audio.console { "console" } else { "microphone" }.bold()
    );

    match run(&cfg, shutdown) {
        Ok(outcome) => {
            print_outcome(&outcome);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "routine failed");
            println!("\n{}: {}", "Routine failed".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Wire the configured collaborators together and run the routine once.
fn run(cfg: &Config, shutdown: Arc<AtomicBool>) -> Result<RoutineOutcome, SpotterError> {
    let mut base = open_base(cfg.base.backend, &cfg.base.rosbridge)?;
    let mut speaker = build_speaker(cfg)?;
    let mut listener = build_listener(cfg);
    let mut detector = build_detector(cfg)?;
    let driver =
        LlmDriver::new(&cfg.llm.base_url, &cfg.llm.model).with_api_key(cfg.llm.api_key.clone());
    let mut assistant = QuestionInterpreter::new(driver, cfg.llm.object_classes.clone())
        .attempts(cfg.llm.attempts);

    let routine = InteractionRoutine::new(cfg.scan.controller(), cfg.routine.routine_config())
        .with_shutdown(shutdown);

    if cfg.audio.console && std::io::stdin().is_terminal() {
        println!("  Type a question and press Enter; Ctrl-D ends the session.\n");
    }

    let result = {
        let mut robot = Robot {
            base: base.as_mut(),
            speaker: speaker.as_mut(),
            listener: listener.as_mut(),
            assistant: &mut assistant,
            detector: detector.as_mut(),
        };
        routine.run(&mut robot)
    };

    // Leave the robot standing still whatever happened above.
    let stop = base.send_velocity(VelocityCommand::stop(cfg.scan.stop_ttl().as_secs_f64()));
    match (result, stop) {
        (Ok(outcome), Ok(())) => Ok(outcome),
        (Ok(_), Err(stop_err)) => Err(stop_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(stop_err)) => {
            warn!(error = %stop_err, "final stop rejected");
            Err(err)
        }
    }
}

fn build_speaker(cfg: &Config) -> Result<Box<dyn Speaker>, SpotterError> {
    if cfg.speech.command.trim().is_empty() {
        return Ok(Box::new(LogSpeaker::new()));
    }
    Ok(Box::new(CommandSpeaker::from_command_line(&cfg.speech.command)?))
}

fn build_listener(cfg: &Config) -> Box<dyn Listener> {
    if cfg.audio.console {
        return Box::new(ConsoleListener::new(std::io::stdin().lock()));
    }
    let transcriber = Transcriber::new(&cfg.llm.base_url)
        .with_model(&cfg.audio.transcription_model)
        .with_api_key(cfg.llm.api_key.clone());
    Box::new(
        RecordingListener::new(transcriber, cfg.audio.record_seconds).device(&cfg.audio.device),
    )
}

fn build_detector(cfg: &Config) -> Result<Box<dyn Detector>, SpotterError> {
    if !cfg.detection.command.trim().is_empty() {
        return Ok(Box::new(CommandDetector::from_command_line(&cfg.detection.command)?));
    }
    let scripted = cfg.llm.object_classes.iter().fold(
        ScriptedDetector::new().fire_after(FACE, cfg.detection.sim_face_after),
        |detector, class| detector.fire_after(class.as_str(), cfg.detection.sim_object_after),
    );
    Ok(Box::new(scripted))
}

fn init_config() -> ExitCode {
    let path = config::config_path();
    if path.exists() {
        println!(
            "  {} already exists; leaving it untouched.",
            path.display().to_string().bold()
        );
        return ExitCode::SUCCESS;
    }
    match config::save(&Config::default()) {
        Ok(()) => {
            println!(
                "  {} Config saved to {}",
                "✓".green().bold(),
                path.display().to_string().bold()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{}: {}", "Error saving config".red(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   _____             __  __           "#.bold().cyan());
    println!("{}", r#"  / ___/____  ____  / /_/ /____  _____"#.bold().cyan());
    println!("{}", r#"  \__ \/ __ \/ __ \/ __/ __/ _ \/ ___/"#.bold().cyan());
    println!("{}", r#" ___/ / /_/ / /_/ / /_/ /_/  __/ /    "#.bold().cyan());
    println!("{}", r#"/____/ .___/\____/\__/\__/\___/_/     "#.bold().cyan());
    println!("{}", r#"    /_/                               "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Spotter".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Scripted interaction routine for a legged robot");
    println!();
}

fn print_usage() {
    println!("Usage: spotter [init]");
    println!();
    println!("  (no command)  run the interaction routine once");
    println!("  init          write a default {}", config::config_path().display());
}

fn print_outcome(outcome: &RoutineOutcome) {
    let yes_no = |b: bool| if b { "yes".green() } else { "no".yellow() };
    println!();
    println!("{}", "  Session summary".bold());
    println!("    Person found:  {}", yes_no(outcome.person_found));
    println!("    Questions:     {}", outcome.questions);
    match &outcome.object_found {
        Some(class) => println!("    Object found:  {}", class.green()),
        None => println!("    Object found:  {}", "none".dimmed()),
    }
    if outcome.interrupted {
        println!("    {}", "Interrupted by Ctrl-C".yellow());
    }
    println!();
}
