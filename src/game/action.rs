use rand::Rng;

/// Direction the snake can move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Returns true if turning from self to other would be a 180-degree turn
    pub fn is_opposite(&self, other: Direction) -> bool {
        self.opposite() == other
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Returns the delta (dx, dy) for moving in this direction
    pub fn delta(&self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// Pick one of the four directions uniformly
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Direction {
        Direction::ALL[rng.gen_range(0..Direction::ALL.len())]
    }
}

/// Where the snake is pointed. `Undecided` only exists before the first move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Heading {
    #[default]
    Undecided,
    Toward(Direction),
}

impl Heading {
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Heading::Undecided => None,
            Heading::Toward(direction) => Some(*direction),
        }
    }

    /// Resolve to a concrete direction, drawing a random one when undecided
    pub fn resolve<R: Rng + ?Sized>(self, rng: &mut R) -> Direction {
        match self {
            Heading::Undecided => Direction::random(rng),
            Heading::Toward(direction) => direction,
        }
    }
}

impl From<Direction> for Heading {
    fn from(direction: Direction) -> Self {
        Heading::Toward(direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_opposite_directions() {
        assert!(Direction::Up.is_opposite(Direction::Down));
        assert!(Direction::Down.is_opposite(Direction::Up));
        assert!(Direction::Left.is_opposite(Direction::Right));
        assert!(Direction::Right.is_opposite(Direction::Left));

        assert!(!Direction::Up.is_opposite(Direction::Left));
        assert!(!Direction::Up.is_opposite(Direction::Right));
        assert!(!Direction::Up.is_opposite(Direction::Up));
    }

    #[test]
    fn test_direction_delta() {
        assert_eq!(Direction::Up.delta(), (0, -1));
        assert_eq!(Direction::Down.delta(), (0, 1));
        assert_eq!(Direction::Left.delta(), (-1, 0));
        assert_eq!(Direction::Right.delta(), (1, 0));
    }

    #[test]
    fn test_opposite_delta_negates() {
        for direction in Direction::ALL {
            let (dx, dy) = direction.delta();
            assert_eq!(direction.opposite().delta(), (-dx, -dy));
        }
    }

    #[test]
    fn test_undecided_heading_resolves_to_a_direction() {
        let mut rng = StdRng::seed_from_u64(7);
        let resolved = Heading::Undecided.resolve(&mut rng);
        assert!(Direction::ALL.contains(&resolved));
        assert_eq!(Heading::Undecided.direction(), None);
    }

    #[test]
    fn test_decided_heading_is_kept() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(Heading::from(Direction::Left).resolve(&mut rng), Direction::Left);
    }

    #[test]
    fn test_random_direction_covers_all() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(Direction::random(&mut rng));
        }
        assert_eq!(seen.len(), 4);
    }
}
