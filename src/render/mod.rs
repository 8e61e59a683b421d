pub mod renderer;

use anyhow::Result;

use crate::game::{GridSize, Overlay, Phase, Position};

pub use renderer::{Renderer, TerminalRenderer};

/// Read-only view of one frame
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    pub snake: &'a [Position],
    pub food: Position,
    pub grid: GridSize,
    pub score: u32,
    pub high_score: u32,
    pub phase: Phase,
    pub overlay: Option<&'a Overlay>,
    pub fps: u32,
}

impl Scene<'_> {
    pub fn head(&self) -> Option<Position> {
        self.snake.first().copied()
    }
}

/// Something that can draw a [`Scene`]
pub trait RenderSink {
    fn render(&mut self, scene: &Scene<'_>) -> Result<()>;
}
