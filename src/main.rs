//! Mine Arena local driver
//!
//! Runs bot games against the engine and prints the event log as JSON lines.

use clap::{Parser, Subcommand};
use mine_arena::{
    config::ConfigLoader,
    errors::{ArenaResult, ConfigurationError, StorageError},
    Address, Amount, ArenaConfig, Clock, CreateGameRequest, GameRegistry, HashChainRandomness,
    ManualClock, SystemClock,
};
use rand::seq::SliceRandom;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Mine Arena CLI
#[derive(Parser)]
#[command(name = "mine-arena")]
#[command(about = "Staked multiplayer mine-avoidance game engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a bot game to completion and print every event
    Simulate {
        /// Number of seated players
        #[arg(short, long, default_value = "3")]
        players: u8,

        /// Entry fee in wei
        #[arg(short, long, default_value = "10000000000000000")]
        entry_fee: Amount,

        /// Turn duration in seconds
        #[arg(short, long, default_value = "15")]
        turn_duration: u64,

        /// Hex-encoded 32-byte board secret
        #[arg(short, long)]
        secret: Option<String>,

        /// Stop after this many rounds even if the game is still running
        #[arg(short, long, default_value = "50")]
        max_rounds: u8,
    },

    /// Print the effective configuration as JSON
    ShowConfig,
}

#[tokio::main]
async fn main() -> ArenaResult<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_path(path);
    }
    let config = loader.load()?;

    let default_filter = if cli.verbose {
        "debug"
    } else {
        config.monitoring.log_level.as_filter()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match cli.command {
        Commands::Simulate {
            players,
            entry_fee,
            turn_duration,
            secret,
            max_rounds,
        } => simulate(config, players, entry_fee, turn_duration, secret, max_rounds).await,
        Commands::ShowConfig => show_config(config),
    }
}

fn show_config(mut config: ArenaConfig) -> ArenaResult<()> {
    if config.randomness.secret_hex.is_some() {
        config.randomness.secret_hex = Some("<redacted>".to_string());
    }
    let rendered = serde_json::to_string_pretty(&config).map_err(StorageError::from)?;
    println!("{}", rendered);
    Ok(())
}

async fn simulate(
    config: ArenaConfig,
    players: u8,
    entry_fee: Amount,
    turn_duration: u64,
    secret: Option<String>,
    max_rounds: u8,
) -> ArenaResult<()> {
    let randomness = match secret.or_else(|| config.randomness.secret_hex.clone()) {
        Some(hex) => HashChainRandomness::from_hex(&hex).map_err(|reason| {
            ConfigurationError::InvalidValue {
                field: "secret".to_string(),
                value: "<redacted>".to_string(),
                reason,
            }
        })?,
        None => HashChainRandomness::new_random(),
    };
    info!("Board secret for replay: {}", randomness.secret_hex());

    let clock = Arc::new(ManualClock::new(SystemClock.now()));
    let admin = config.admin.admin_address.clone();
    let registry = GameRegistry::builder(config)
        .randomness(Arc::new(randomness))
        .clock(clock.clone())
        .build()?;

    let mut events = registry.events().subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(record) => match serde_json::to_string(&record) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!("Failed to render event {}: {}", record.sequence, e),
                },
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event printer lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let seats: Vec<Address> = (0..players)
        .map(|i| Address::new(format!("0xplayer{}", i)))
        .collect();
    let Some(creator) = seats.first() else {
        return Err(ConfigurationError::ValidationFailed("need at least one player".to_string()).into());
    };

    let game_id = registry.create_game(CreateGameRequest {
        creator: creator.clone(),
        entry_fee,
        max_players: players,
        turn_duration,
        is_public: true,
        stake: entry_fee,
    })?;
    for seat in &seats[1..] {
        registry.join_game(game_id, seat, entry_fee)?;
    }
    registry.start_game(game_id, creator)?;

    let mut rng = rand::thread_rng();
    loop {
        let snapshot = registry.snapshot(game_id)?;
        if snapshot.finished {
            break;
        }
        if snapshot.current_round > max_rounds {
            warn!(game_id, max_rounds, "Round limit reached, leaving game unfinished");
            break;
        }
        let Some(current) = snapshot.current_player else {
            break;
        };

        clock.advance(1);
        let mut hidden = Vec::new();
        for x in 0..snapshot.grid_size {
            for y in 0..snapshot.grid_size {
                if !registry.is_tile_revealed(game_id, x, y)? {
                    hidden.push((x, y));
                }
            }
        }
        match hidden.choose(&mut rng) {
            Some(&(x, y)) => {
                registry.reveal_tile(game_id, &current, x, y)?;
            }
            None => registry.skip_turn(game_id, &current)?,
        }
    }

    for seat in &seats {
        if let Ok(amount) = registry.claim_winnings(game_id, seat) {
            info!(player = %seat, amount = %amount, "Paid out");
        }
    }
    let treasury = registry.treasury()?;
    info!(
        admin = %admin,
        fees_collected = %treasury.fees_collected,
        paid_out = %treasury.total_paid_out,
        "Simulation complete"
    );

    drop(registry);
    if let Err(e) = printer.await {
        warn!("Event printer stopped abnormally: {}", e);
    }
    Ok(())
}
