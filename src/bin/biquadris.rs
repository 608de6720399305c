use std::io;
use std::path::PathBuf;

use biquadris::{Game, GameConfig, GameState, TextDisplay};
use clap::Parser;
use tracing::Level;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

/// Two-player Biquadris played over stdin, drawn as text on stdout.
#[derive(Parser, Debug, Clone)]
#[command(name = "biquadris")]
struct Opts {
    /// Text-only display (the only display available)
    #[arg(long)]
    text: bool,
    /// Seed for both players' block generators
    #[arg(long)]
    seed: Option<u64>,
    /// Level 0 block script for player 1
    #[arg(long)]
    scriptfile1: Option<PathBuf>,
    /// Level 0 block script for player 2
    #[arg(long)]
    scriptfile2: Option<PathBuf>,
    /// Starting level, clamped to 0..=4
    #[arg(long)]
    startlevel: Option<u8>,
    /// Optional JSON game config; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log verbosity on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Opts {
    fn game_config(&self) -> anyhow::Result<GameConfig> {
        let mut config = match &self.config {
            Some(path) => GameConfig::from_json_file(path)?,
            None => GameConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(file) = &self.scriptfile1 {
            config.script_file1 = file.clone();
        }
        if let Some(file) = &self.scriptfile2 {
            config.script_file2 = file.clone();
        }
        if let Some(level) = self.startlevel {
            config.start_level = level;
        }
        Ok(config.clamped())
    }
}

fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .with(LevelFilter::from_level(log_level(opts.verbose)))
        .init();

    let config = opts.game_config()?;
    info!(?config, text = opts.text, "starting");

    let start_level = config.start_level;
    let mut game = Game::new(config, TextDisplay::stdout());
    game.start_new_game(start_level);
    let state = game.run(io::stdin().lock());
    if let GameState::GameOver { winner } = state {
        info!(winner = winner.label(), "finished");
    }
    Ok(())
}
