//! Core game logic module for Snake
//!
//! Everything here is free of terminal I/O. The session talks to the outside
//! world only through the [`RenderSink`](crate::render::RenderSink) and
//! [`HighScoreStore`](crate::store::HighScoreStore) traits.

pub mod action;
pub mod config;
pub mod events;
pub mod food;
pub mod game_loop;
pub mod session;
pub mod state;

// Re-export commonly used types
pub use action::{Direction, Heading};
pub use config::{ConfigError, GameConfig, GridSize};
pub use events::StateBroadcast;
pub use food::{BoardFull, Food, DEFAULT_FOOD_SCORE};
pub use game_loop::{FrameHandler, FrameOutcome, GameLoop, LoopConfig, LoopControl, LoopState};
pub use session::{CollisionType, Control, GameSession, Outcome, Overlay, OverlayAction, Phase};
pub use state::{DirectionQueue, Position, Snake};
