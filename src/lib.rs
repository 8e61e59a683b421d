//! TUI Snake - a single-player Snake game for the terminal
//!
//! This library provides:
//! - Core game logic: snake, food, fixed-timestep loop and session state machine (game module)
//! - High score persistence (store module)
//! - Keyboard mapping (input module)
//! - TUI rendering (render module)
//! - HUD counters (metrics module)
//! - The interactive terminal host (modes module)

pub mod game;
pub mod input;
pub mod metrics;
pub mod modes;
pub mod render;
pub mod store;
