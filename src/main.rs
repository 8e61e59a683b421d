use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tui_snake::game::{GameConfig, GridSize};
use tui_snake::modes::HumanMode;

#[derive(Parser)]
#[command(name = "tui_snake")]
#[command(version, about = "Single-player Snake for the terminal")]
struct Cli {
    /// Cells per side of the board (10, 20 or 40)
    #[arg(long, default_value = "20", value_parser = parse_grid)]
    grid: GridSize,

    /// Milliseconds of game time per snake step
    #[arg(long, default_value = "150")]
    speed_ms: u64,

    /// Most steps one frame may catch up on after a stall
    #[arg(long, default_value = "5")]
    max_frame_skip: u32,

    /// Display frames per second
    #[arg(long, default_value = "60", value_parser = clap::value_parser!(u32).range(1..=240))]
    fps: u32,

    /// Where the high score is kept
    #[arg(long, default_value = "snake_high_score.json")]
    high_score_file: PathBuf,

    /// Log output; the terminal itself is taken by the game
    #[arg(long, default_value = "tui_snake.log")]
    log_file: PathBuf,
}

fn parse_grid(raw: &str) -> Result<GridSize, String> {
    let tile_count: u32 = raw.parse().map_err(|_| format!("not a number: {}", raw))?;
    GridSize::from_tile_count(tile_count).map_err(|err| err.to_string())
}

fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tui_snake=info".into()),
        )
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_file)?;

    let config = GameConfig::new(cli.grid)
        .with_game_speed(Duration::from_millis(cli.speed_ms))
        .with_max_frame_skip(cli.max_frame_skip);
    config.validate().context("Invalid game configuration")?;

    let mut human_mode = HumanMode::new(config, cli.high_score_file, cli.fps);
    human_mode.run().await?;

    Ok(())
}
