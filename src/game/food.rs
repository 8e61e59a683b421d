use rand::seq::IteratorRandom;
use rand::Rng;
use thiserror::Error;

use super::state::Position;

/// Points awarded for one piece of food
pub const DEFAULT_FOOD_SCORE: u32 = 10;

/// Random samples to try before falling back to scanning the free cells
const MAX_RANDOM_SAMPLES: usize = 64;

/// Every cell of the grid is covered by the snake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no free cell left on a {tile_count}x{tile_count} grid")]
pub struct BoardFull {
    pub tile_count: u32,
}

/// The single piece of food on the board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Food {
    position: Position,
    score: u32,
}

impl Food {
    pub fn new(position: Position, score: u32) -> Self {
        Self { position, score }
    }

    /// Place a fresh piece of food on a free cell
    pub fn spawn<R: Rng + ?Sized>(
        rng: &mut R,
        snake_body: &[Position],
        tile_count: u32,
        score: u32,
    ) -> Result<Self, BoardFull> {
        let position = random_free_cell(rng, snake_body, tile_count)?;
        Ok(Self { position, score })
    }

    /// Move the food to a uniformly random cell not covered by `snake_body`
    pub fn generate<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        snake_body: &[Position],
        tile_count: u32,
    ) -> Result<Position, BoardFull> {
        self.position = random_free_cell(rng, snake_body, tile_count)?;
        Ok(self.position)
    }

    pub fn check_collision(&self, position: Position) -> bool {
        self.position == position
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn score(&self) -> u32 {
        self.score
    }
}

fn random_free_cell<R: Rng + ?Sized>(
    rng: &mut R,
    snake_body: &[Position],
    tile_count: u32,
) -> Result<Position, BoardFull> {
    let side = tile_count as i32;

    for _ in 0..MAX_RANDOM_SAMPLES {
        let pos = Position::new(rng.gen_range(0..side), rng.gen_range(0..side));
        if !snake_body.contains(&pos) {
            return Ok(pos);
        }
    }

    // Crowded board: choose among the cells that are actually free
    (0..side)
        .flat_map(|y| (0..side).map(move |x| Position::new(x, y)))
        .filter(|pos| !snake_body.contains(pos))
        .choose(rng)
        .ok_or(BoardFull { tile_count })
}
