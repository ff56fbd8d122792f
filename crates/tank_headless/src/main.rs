//! Headless Tank Arena runner.
//!
//! # Usage
//!
//! ```bash
//! # Evolve with defaults, writing a JSON report
//! cargo run -p tank_headless -- evolve --output results/run.json
//!
//! # Evolve with a RON config and a custom scenario registry
//! cargo run -p tank_headless -- evolve --config arena.ron --registry scenarios.ron
//!
//! # Single battle, result as JSON on stdout
//! cargo run -p tank_headless -- battle --scenario chokepoint --seed 42 --red 3 --blue 5
//!
//! # List registered scenarios
//! cargo run -p tank_headless -- scenarios
//! ```
//!
//! Logs go to stderr; `RUST_LOG` overrides `--verbose`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tank_core::battle::VictoryMode;
use tank_core::genome::Team;
use tank_headless::{
    arena::{Arena, ArenaEvent, BattleRequest},
    config::{load_registry, ArenaConfig},
    export::save_json,
};

#[derive(Parser)]
#[command(name = "tank-arena")]
#[command(about = "Headless tank battles with competitive evolution")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an evolution and export a JSON report
    Evolve {
        /// Arena config (RON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Scenario registry (RON); built-in scenarios when omitted
        #[arg(long)]
        registry: Option<PathBuf>,

        /// Generations to run
        #[arg(short, long)]
        generations: Option<u32>,

        /// Battles per generation
        #[arg(short, long)]
        battles: Option<u32>,

        /// Tanks per team
        #[arg(long)]
        roster: Option<usize>,

        /// Master seed
        #[arg(long)]
        seed: Option<i64>,

        /// Restrict the rotation to these scenarios
        #[arg(long, value_delimiter = ',')]
        scenarios: Vec<String>,

        /// Report path
        #[arg(short, long, default_value = "results/run.json")]
        output: PathBuf,
    },

    /// Fight a single battle between freshly seeded pools
    Battle {
        /// Scenario id
        #[arg(short, long, default_value = "open_field")]
        scenario: String,

        /// Battle seed
        #[arg(long, default_value = "12345")]
        seed: i64,

        /// Red tanks
        #[arg(long, default_value = "4")]
        red: usize,

        /// Blue tanks
        #[arg(long, default_value = "4")]
        blue: usize,

        /// Victory mode
        #[arg(short, long, value_enum, default_value = "king-of-hill")]
        mode: Mode,

        /// Scenario registry (RON)
        #[arg(long)]
        registry: Option<PathBuf>,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List registered scenarios
    Scenarios {
        /// Scenario registry (RON)
        #[arg(long)]
        registry: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Elimination,
    KingOfHill,
}

impl From<Mode> for VictoryMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Elimination => VictoryMode::Elimination,
            Mode::KingOfHill => VictoryMode::KingOfHill,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(%err, "Failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    let outcome = runtime.block_on(async {
        match cli.command {
            Commands::Evolve {
                config,
                registry,
                generations,
                battles,
                roster,
                seed,
                scenarios,
                output,
            } => {
                let overrides = Overrides {
                    generations,
                    battles,
                    roster,
                    seed,
                    scenarios,
                };
                cmd_evolve(config, registry, overrides, output).await
            }
            Commands::Battle {
                scenario,
                seed,
                red,
                blue,
                mode,
                registry,
                output,
            } => {
                let request = BattleRequest {
                    red_size: red,
                    blue_size: blue,
                    scenario_id: scenario,
                    seed,
                };
                cmd_battle(request, mode, registry, output).await
            }
            Commands::Scenarios { registry } => cmd_scenarios(registry),
        }
    });

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            tracing::error!("{message}");
            ExitCode::FAILURE
        }
    }
}

struct Overrides {
    generations: Option<u32>,
    battles: Option<u32>,
    roster: Option<usize>,
    seed: Option<i64>,
    scenarios: Vec<String>,
}

async fn cmd_evolve(
    config_path: Option<PathBuf>,
    registry_path: Option<PathBuf>,
    overrides: Overrides,
    output: PathBuf,
) -> Result<(), String> {
    let mut config = match &config_path {
        Some(path) => ArenaConfig::load(path).map_err(|e| e.to_string())?,
        None => ArenaConfig::default(),
    };
    if let Some(generations) = overrides.generations {
        config.generations = generations;
    }
    if let Some(battles) = overrides.battles {
        config.battles_per_generation = battles;
    }
    if let Some(roster) = overrides.roster {
        config = config.with_roster_size(roster);
    }
    if let Some(seed) = overrides.seed {
        config.seed = seed;
    }
    if !overrides.scenarios.is_empty() {
        config = config.with_scenarios(overrides.scenarios);
    }
    config.validate().map_err(|e| e.to_string())?;
    let registry = load_registry(registry_path.as_deref()).map_err(|e| e.to_string())?;

    tracing::info!(
        generations = config.generations,
        battles_per_generation = config.battles_per_generation,
        roster = config.roster_size,
        seed = config.seed,
        "Starting evolution"
    );

    let arena = Arena::new(config, registry);
    let mut events = arena.subscribe();
    let watcher = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ArenaEvent::BattleFinished {
                    generation, result, ..
                }) => tracing::debug!(
                    generation,
                    scenario = %result.scenario_id,
                    winner = ?result.winner,
                    victory = ?result.victory_type,
                    duration = result.duration,
                    "Battle finished"
                ),
                Ok(ArenaEvent::GenerationAdvanced(_)) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event watcher fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let start = std::time::Instant::now();
    let report = arena.run().await;
    arena.shutdown().await;
    watcher.abort();

    let (red_wins, blue_wins, draws) = report.tally();
    tracing::info!(
        battles = report.battles.len(),
        red_wins,
        blue_wins,
        draws,
        failed = report.failed_tasks,
        seconds = start.elapsed().as_secs_f64(),
        "Evolution complete"
    );
    for champion in &report.champions {
        tracing::info!(
            team = ?champion.team,
            id = %champion.id,
            fitness = champion.fitness,
            source = ?champion.fitness_source,
            "Champion"
        );
    }

    report
        .save(&output)
        .map_err(|e| format!("Failed to write {}: {e}", output.display()))?;
    tracing::info!(path = %output.display(), "Report saved");
    Ok(())
}

async fn cmd_battle(
    request: BattleRequest,
    mode: Mode,
    registry_path: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<(), String> {
    let registry = load_registry(registry_path.as_deref()).map_err(|e| e.to_string())?;
    let mut config = ArenaConfig::default().with_seed(request.seed);
    config.battle = config.battle.with_victory_mode(mode.into());

    let arena = Arena::new(config, registry);
    let result = arena
        .request_battle(request)
        .await
        .map_err(|e| e.to_string())?;
    arena.shutdown().await;

    let winner = match result.winner {
        Some(Team::Red) => "red",
        Some(Team::Blue) => "blue",
        None => "draw",
    };
    tracing::info!(
        scenario = %result.scenario_id,
        winner,
        victory = ?result.victory_type,
        duration = result.duration,
        "Battle complete"
    );

    match output {
        Some(path) => save_json(&result, &path)
            .map_err(|e| format!("Failed to write {}: {e}", path.display())),
        None => {
            let json = serde_json::to_string_pretty(&result).map_err(|e| e.to_string())?;
            println!("{json}");
            Ok(())
        }
    }
}

fn cmd_scenarios(registry_path: Option<PathBuf>) -> Result<(), String> {
    let registry = load_registry(registry_path.as_deref()).map_err(|e| e.to_string())?;
    for descriptor in registry.iter() {
        println!(
            "{:<12} {:<18} {:?}, {} obstacles {:.0}-{:.0}, hill {:?}",
            descriptor.id,
            descriptor.name,
            descriptor.kind,
            descriptor.obstacle_count,
            descriptor.obstacle_size.0,
            descriptor.obstacle_size.1,
            descriptor.hill_placement,
        );
    }
    Ok(())
}
