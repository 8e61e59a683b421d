use std::collections::VecDeque;

use rand::Rng;

use super::action::{Direction, Heading};

/// A position on the game grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Move position by delta
    pub fn moved_by(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Move position in a direction
    pub fn moved_in_direction(&self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        self.moved_by(dx, dy)
    }

    /// Whether the cell lies inside a square grid of `tile_count` cells per side
    pub fn is_within(&self, tile_count: u32) -> bool {
        let limit = tile_count as i32;
        self.x >= 0 && self.x < limit && self.y >= 0 && self.y < limit
    }
}

/// Fixed-capacity FIFO of direction changes waiting for a tick boundary
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirectionQueue {
    pending: VecDeque<Direction>,
}

impl DirectionQueue {
    pub const CAPACITY: usize = 2;

    pub fn new() -> Self {
        Self {
            pending: VecDeque::with_capacity(Self::CAPACITY),
        }
    }

    /// Append a direction; returns false when the queue is already full
    pub fn push(&mut self, direction: Direction) -> bool {
        if self.is_full() {
            return false;
        }
        self.pending.push_back(direction);
        true
    }

    pub fn pop(&mut self) -> Option<Direction> {
        self.pending.pop_front()
    }

    pub fn last(&self) -> Option<Direction> {
        self.pending.back().copied()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.pending.len() >= Self::CAPACITY
    }

    pub fn iter(&self) -> impl Iterator<Item = Direction> + '_ {
        self.pending.iter().copied()
    }
}

/// The snake in the game
#[derive(Debug, Clone, PartialEq)]
pub struct Snake {
    /// Body segments, with head at index 0. Never empty.
    body: Vec<Position>,
    heading: Heading,
    queue: DirectionQueue,
}

impl Snake {
    /// Create a one-cell snake that has not picked a direction yet
    pub fn new(head: Position) -> Self {
        Self {
            body: vec![head],
            heading: Heading::Undecided,
            queue: DirectionQueue::new(),
        }
    }

    /// Create a snake from explicit segments, head first
    pub fn from_body(body: Vec<Position>, heading: Heading) -> Self {
        assert!(!body.is_empty(), "snake body must hold at least one cell");
        Self {
            body,
            heading,
            queue: DirectionQueue::new(),
        }
    }

    /// One-cell snake at the centre of a `tile_count` grid
    pub fn centered(tile_count: u32) -> Self {
        let center = (tile_count / 2) as i32;
        Self::new(Position::new(center, center))
    }

    /// Get the head position
    pub fn head(&self) -> Position {
        self.body[0]
    }

    pub fn body(&self) -> &[Position] {
        &self.body
    }

    /// Get body segments (excluding head)
    pub fn body_segments(&self) -> &[Position] {
        &self.body[1..]
    }

    pub fn heading(&self) -> Heading {
        self.heading
    }

    pub fn direction(&self) -> Option<Direction> {
        self.heading.direction()
    }

    /// Direction that will be active once every queued change has been applied
    pub fn effective_direction(&self) -> Option<Direction> {
        self.queue.last().or(self.heading.direction())
    }

    pub fn queued(&self) -> &DirectionQueue {
        &self.queue
    }

    /// Apply the next queued turn and prepend the new head.
    ///
    /// Bounds and self collision are left to the caller. An undecided heading
    /// is first resolved to a random direction.
    pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Position {
        let direction = match self.queue.pop() {
            Some(next) => next,
            None => self.heading.resolve(rng),
        };
        self.heading = Heading::Toward(direction);

        let new_head = self.head().moved_in_direction(direction);
        self.body.insert(0, new_head);
        new_head
    }

    /// Drop the last segment, keeping at least the head
    pub fn remove_tail(&mut self) -> Option<Position> {
        if self.body.len() > 1 {
            self.body.pop()
        } else {
            None
        }
    }

    /// Buffer a turn for a later tick; refused once two turns are pending
    pub fn queue_direction(&mut self, direction: Direction) -> bool {
        self.queue.push(direction)
    }

    /// Rejects only a reversal of the effective direction
    pub fn is_valid_direction_change(&self, direction: Direction) -> bool {
        match self.effective_direction() {
            Some(effective) => !effective.is_opposite(direction),
            None => true,
        }
    }

    /// Set the direction right away, discarding any buffered turns
    pub fn set_direction<R: Rng + ?Sized>(&mut self, heading: Heading, rng: &mut R) -> Direction {
        let direction = heading.resolve(rng);
        self.heading = Heading::Toward(direction);
        self.queue.clear();
        direction
    }

    pub fn check_self_collision(&self) -> bool {
        let head = self.head();
        self.body_segments().contains(&head)
    }

    pub fn check_wall_collision(&self, tile_count: u32) -> bool {
        !self.head().is_within(tile_count)
    }

    /// Get the length of the snake
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Always false; the body keeps its head
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}
