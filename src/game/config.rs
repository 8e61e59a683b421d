use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::food::DEFAULT_FOOD_SCORE;
use super::game_loop::LoopConfig;

/// Supported board sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum GridSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl GridSize {
    pub const ALL: [GridSize; 3] = [GridSize::Small, GridSize::Medium, GridSize::Large];

    /// Cells per side
    pub fn tile_count(&self) -> u32 {
        match self {
            GridSize::Small => 10,
            GridSize::Medium => 20,
            GridSize::Large => 40,
        }
    }

    pub fn from_tile_count(tile_count: u32) -> Result<Self, ConfigError> {
        GridSize::ALL
            .into_iter()
            .find(|size| size.tile_count() == tile_count)
            .ok_or(ConfigError::UnsupportedGrid(tile_count))
    }

    pub fn label(&self) -> &'static str {
        match self {
            GridSize::Small => "10x10",
            GridSize::Medium => "20x20",
            GridSize::Large => "40x40",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unsupported grid size {0} (expected 10, 20 or 40)")]
    UnsupportedGrid(u32),
    #[error("game speed must be greater than zero")]
    ZeroGameSpeed,
    #[error("max frame skip must be at least 1")]
    ZeroFrameSkip,
}

/// Configuration for the game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Board size
    pub grid: GridSize,
    /// Points awarded per food
    pub food_score: u32,
    /// Loop timing
    pub timing: LoopConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            grid: GridSize::default(),
            food_score: DEFAULT_FOOD_SCORE,
            timing: LoopConfig::default(),
        }
    }
}

impl GameConfig {
    pub fn new(grid: GridSize) -> Self {
        Self {
            grid,
            ..Default::default()
        }
    }

    /// Create a small grid for testing
    pub fn small() -> Self {
        Self::new(GridSize::Small)
    }

    /// Create a large grid
    pub fn large() -> Self {
        Self::new(GridSize::Large)
    }

    pub fn with_game_speed(mut self, game_speed: Duration) -> Self {
        self.timing.game_speed = game_speed;
        self
    }

    pub fn with_max_frame_skip(mut self, max_frame_skip: u32) -> Self {
        self.timing.max_frame_skip = max_frame_skip;
        self
    }

    pub fn tile_count(&self) -> u32 {
        self.grid.tile_count()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timing.game_speed.is_zero() {
            return Err(ConfigError::ZeroGameSpeed);
        }
        if self.timing.max_frame_skip == 0 {
            return Err(ConfigError::ZeroFrameSkip);
        }
        Ok(())
    }
}
