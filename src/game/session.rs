//! Game session: owns the snake, the food, the score and the phase machine,
//! and drives the simulation through [`GameLoop`].

use std::time::Instant;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::action::{Direction, Heading};
use super::config::{GameConfig, GridSize};
use super::events::StateBroadcast;
use super::food::{BoardFull, Food};
use super::game_loop::{FrameHandler, FrameOutcome, GameLoop, LoopControl};
use super::state::{Position, Snake};
use crate::render::{RenderSink, Scene};
use crate::store::HighScoreStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Waiting for the first input
    Ready,
    Playing,
    Paused,
    /// Run finished; waits for a restart
    End,
}

/// Type of collision that occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionType {
    /// Snake hit a wall
    Wall,
    /// Snake hit itself
    SelfCollision,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Crashed(CollisionType),
    /// The snake covers the whole board
    Won,
}

/// Non-directional input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    TogglePause,
    Restart,
    OpenSettings,
    OpenInfo,
    CloseOverlay,
    SelectGrid(GridSize),
}

/// Things an overlay lets the player do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayAction {
    Resume,
    Restart,
    ChooseGrid,
    Close,
}

/// Screen shown on top of the board
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    Pause,
    GameOver {
        score: u32,
        high_score: u32,
        new_record: bool,
        outcome: Outcome,
    },
    Settings {
        grid: GridSize,
    },
    Info,
}

impl Overlay {
    pub fn actions(&self) -> &'static [OverlayAction] {
        match self {
            Overlay::Pause => &[OverlayAction::Resume, OverlayAction::Restart],
            Overlay::GameOver { .. } => &[OverlayAction::Restart],
            Overlay::Settings { .. } => &[OverlayAction::ChooseGrid, OverlayAction::Close],
            Overlay::Info => &[OverlayAction::Close],
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Overlay::Pause => "Paused",
            Overlay::GameOver {
                outcome: Outcome::Won,
                ..
            } => "Board Cleared",
            Overlay::GameOver { .. } => "Game Over",
            Overlay::Settings { .. } => "Settings",
            Overlay::Info => "How to Play",
        }
    }
}

/// Settings and info screens suspend the loop without changing the phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Panel {
    Settings,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RunSummary {
    score: u32,
    high_score: u32,
    new_record: bool,
    outcome: Outcome,
}

pub struct GameSession<S, R> {
    game_loop: GameLoop,
    play: Play<S, R>,
}

/// Everything the loop callbacks touch
struct Play<S, R> {
    config: GameConfig,
    snake: Snake,
    food: Food,
    score: u32,
    high_score: u32,
    phase: Phase,
    panel: Option<Panel>,
    last_run: Option<RunSummary>,
    /// Bumped on every reset
    run: u64,
    store: S,
    renderer: R,
    events: StateBroadcast,
    rng: StdRng,
    fps: u32,
    redraw: bool,
}

impl<S: HighScoreStore, R: RenderSink> GameSession<S, R> {
    pub fn new(config: GameConfig, store: S, renderer: R) -> Self {
        Self::with_rng(config, store, renderer, StdRng::from_entropy())
    }

    pub fn with_rng(config: GameConfig, store: S, renderer: R, mut rng: StdRng) -> Self {
        let high_score = match store.get() {
            Ok(value) => value,
            Err(err) => {
                warn!("high score unavailable, starting from 0: {}", err);
                0
            }
        };
        let (snake, food) = fresh_board(&config, &mut rng);

        Self {
            game_loop: GameLoop::new(config.timing.clone()),
            play: Play {
                config,
                snake,
                food,
                score: 0,
                high_score,
                phase: Phase::Ready,
                panel: None,
                last_run: None,
                run: 0,
                store,
                renderer,
                events: StateBroadcast::new(Phase::Ready, 0),
                rng,
                fps: 0,
                redraw: true,
            },
        }
    }

    pub fn phase(&self) -> Phase {
        self.play.phase
    }

    pub fn score(&self) -> u32 {
        self.play.score
    }

    pub fn high_score(&self) -> u32 {
        self.play.high_score
    }

    pub fn snake(&self) -> &Snake {
        &self.play.snake
    }

    pub fn food(&self) -> &Food {
        &self.play.food
    }

    pub fn config(&self) -> &GameConfig {
        &self.play.config
    }

    pub fn overlay(&self) -> Option<Overlay> {
        self.play.overlay()
    }

    pub fn is_running(&self) -> bool {
        self.game_loop.is_running()
    }

    pub fn fps(&self) -> u32 {
        self.play.fps
    }

    /// Identifies the current run; changes whenever the board is reset
    pub fn run(&self) -> u64 {
        self.play.run
    }

    pub fn store(&self) -> &S {
        &self.play.store
    }

    pub fn renderer(&self) -> &R {
        &self.play.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.play.renderer
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<Phase> {
        self.play.events.subscribe_phase()
    }

    pub fn subscribe_score(&self) -> watch::Receiver<u32> {
        self.play.events.subscribe_score()
    }

    /// Drive one display frame. Draws even while the loop is stopped if
    /// something changed since the last draw.
    pub fn frame(&mut self, now: Instant) -> FrameOutcome {
        let outcome = self.game_loop.frame(now, &mut self.play);
        if !outcome.rendered && !outcome.failed && self.play.redraw {
            if let Err(err) = self.play.draw() {
                warn!("failed to draw idle frame: {:#}", err);
            }
        }
        outcome
    }

    /// Arrow / WASD input
    pub fn handle_direction(&mut self, direction: Direction, now: Instant) {
        if self.play.panel.is_some() {
            debug!(?direction, "direction ignored while a panel is open");
            return;
        }

        let snake = &mut self.play.snake;
        if !snake.is_valid_direction_change(direction) {
            debug!(?direction, "reversal rejected");
            return;
        }

        match self.play.phase {
            Phase::Playing => {
                if snake.effective_direction() == Some(direction) {
                    return;
                }
                if !snake.queue_direction(direction) {
                    debug!(?direction, "direction queue full");
                }
            }
            Phase::Ready | Phase::Paused => {
                // Applied at once, so it must not fold back onto the neck either
                if snake.direction().is_some_and(|d| d.is_opposite(direction)) {
                    debug!(?direction, "reversal rejected");
                    return;
                }
                snake.set_direction(Heading::Toward(direction), &mut self.play.rng);
                self.begin_play(now);
            }
            Phase::End => {}
        }
    }

    /// Pause, restart and overlay input
    pub fn handle_control(&mut self, control: Control, now: Instant) {
        match control {
            Control::TogglePause => {
                if self.play.panel.is_some() {
                    return;
                }
                match self.play.phase {
                    Phase::Ready => {
                        let direction = self
                            .play
                            .snake
                            .set_direction(Heading::Undecided, &mut self.play.rng);
                        debug!(?direction, "started without a direction");
                        self.begin_play(now);
                    }
                    Phase::Playing => self.pause(),
                    Phase::Paused => self.begin_play(now),
                    Phase::End => {}
                }
            }
            Control::Restart => {
                self.play.panel = None;
                self.reset();
            }
            Control::OpenSettings => self.toggle_panel(Panel::Settings, now),
            Control::OpenInfo => self.toggle_panel(Panel::Info, now),
            Control::CloseOverlay => self.close_panel(now),
            Control::SelectGrid(grid) => {
                if self.play.panel != Some(Panel::Settings) {
                    return;
                }
                self.set_grid(grid);
            }
        }
    }

    /// Switch board size; always starts over on a fresh board
    pub fn set_grid(&mut self, grid: GridSize) {
        if self.play.config.grid != grid {
            info!(grid = grid.label(), "grid size changed");
        }
        self.play.config.grid = grid;
        self.reset();
    }

    /// Back to `Ready` with a new snake, new food and zero score
    pub fn reset(&mut self) {
        self.game_loop.stop();
        let (snake, food) = fresh_board(&self.play.config, &mut self.play.rng);
        self.play.snake = snake;
        self.play.food = food;
        self.play.score = 0;
        self.play.last_run = None;
        self.play.run += 1;
        self.play.events.publish_score(0);
        self.play.set_phase(Phase::Ready);
    }

    fn begin_play(&mut self, now: Instant) {
        self.play.set_phase(Phase::Playing);
        self.game_loop.start(now);
    }

    fn pause(&mut self) {
        self.game_loop.stop();
        self.play.set_phase(Phase::Paused);
    }

    fn toggle_panel(&mut self, panel: Panel, now: Instant) {
        if self.play.panel == Some(panel) {
            self.close_panel(now);
            return;
        }
        self.game_loop.stop();
        self.play.panel = Some(panel);
        self.play.redraw = true;
    }

    fn close_panel(&mut self, now: Instant) {
        if self.play.panel.take().is_none() {
            return;
        }
        self.play.redraw = true;
        if self.play.phase == Phase::Playing {
            self.game_loop.start(now);
        }
    }
}

impl<S: HighScoreStore, R: RenderSink> Play<S, R> {
    fn overlay(&self) -> Option<Overlay> {
        match self.panel {
            Some(Panel::Settings) => {
                return Some(Overlay::Settings {
                    grid: self.config.grid,
                })
            }
            Some(Panel::Info) => return Some(Overlay::Info),
            None => {}
        }

        match (self.phase, self.last_run) {
            (Phase::Paused, _) => Some(Overlay::Pause),
            (Phase::End, Some(run)) => Some(Overlay::GameOver {
                score: run.score,
                high_score: run.high_score,
                new_record: run.new_record,
                outcome: run.outcome,
            }),
            _ => None,
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            info!(from = ?self.phase, to = ?phase, score = self.score, "phase change");
        }
        self.phase = phase;
        self.events.publish_phase(phase);
        self.redraw = true;
    }

    /// One fixed simulation step
    fn tick(&mut self) -> LoopControl {
        if self.phase != Phase::Playing {
            return LoopControl::Continue;
        }

        let tile_count = self.config.tile_count();
        let head = self.snake.advance(&mut self.rng);

        if self.snake.check_wall_collision(tile_count) {
            return self.finish(Outcome::Crashed(CollisionType::Wall));
        }
        if self.snake.check_self_collision() {
            return self.finish(Outcome::Crashed(CollisionType::SelfCollision));
        }

        if self.food.check_collision(head) {
            self.score += self.food.score();
            self.events.publish_score(self.score);
            debug!(score = self.score, "food eaten");

            if let Err(BoardFull { .. }) =
                self.food.generate(&mut self.rng, self.snake.body(), tile_count)
            {
                return self.finish(Outcome::Won);
            }
        } else {
            self.snake.remove_tail();
        }

        self.redraw = true;
        LoopControl::Continue
    }

    fn finish(&mut self, outcome: Outcome) -> LoopControl {
        let new_record = self.score > self.high_score;
        if new_record {
            self.high_score = self.score;
            if let Err(err) = self.store.set(self.score) {
                warn!("failed to save high score {}: {}", self.score, err);
            }
        }

        info!(?outcome, score = self.score, new_record, "run finished");
        self.last_run = Some(RunSummary {
            score: self.score,
            high_score: self.high_score,
            new_record,
            outcome,
        });
        self.set_phase(Phase::End);
        LoopControl::Halt
    }

    fn draw(&mut self) -> Result<()> {
        let overlay = self.overlay();
        let scene = Scene {
            snake: self.snake.body(),
            food: self.food.position(),
            grid: self.config.grid,
            score: self.score,
            high_score: self.high_score,
            phase: self.phase,
            overlay: overlay.as_ref(),
            fps: self.fps,
        };
        self.renderer.render(&scene)?;
        self.redraw = false;
        Ok(())
    }
}

impl<S: HighScoreStore, R: RenderSink> FrameHandler for Play<S, R> {
    fn update(&mut self) -> Result<LoopControl> {
        Ok(self.tick())
    }

    fn render(&mut self) -> Result<()> {
        self.draw()
    }

    fn on_fps(&mut self, fps: u32) {
        self.fps = fps;
    }

    fn on_error(&mut self, _error: &anyhow::Error) {
        self.redraw = true;
    }
}

fn fresh_board(config: &GameConfig, rng: &mut StdRng) -> (Snake, Food) {
    let tile_count = config.tile_count();
    let snake = Snake::centered(tile_count);
    // A one-cell snake never fills a supported grid
    let food = Food::spawn(rng, snake.body(), tile_count, config.food_score)
        .unwrap_or_else(|_| Food::new(Position::default(), config.food_score));
    (snake, food)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use anyhow::anyhow;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct Drawn {
        snake: Vec<Position>,
        food: Position,
        score: u32,
        phase: Phase,
        overlay: Option<Overlay>,
    }

    #[derive(Default)]
    struct RecordingSink {
        frames: Vec<Drawn>,
        fail_next: bool,
    }

    impl RenderSink for RecordingSink {
        fn render(&mut self, scene: &Scene<'_>) -> Result<()> {
            if self.fail_next {
                self.fail_next = false;
                return Err(anyhow!("display gone"));
            }
            self.frames.push(Drawn {
                snake: scene.snake.to_vec(),
                food: scene.food,
                score: scene.score,
                phase: scene.phase,
                overlay: scene.overlay.cloned(),
            });
            Ok(())
        }
    }

    type TestSession = GameSession<MemoryStore, RecordingSink>;

    fn session_with(config: GameConfig, store: MemoryStore) -> TestSession {
        GameSession::with_rng(
            config,
            store,
            RecordingSink::default(),
            StdRng::seed_from_u64(11),
        )
    }

    fn session() -> TestSession {
        session_with(GameConfig::default(), MemoryStore::default())
    }

    fn tick(n: u32) -> Duration {
        Duration::from_millis(150) * n
    }

    fn park_food(session: &mut TestSession, position: Position) {
        session.play.food = Food::new(position, session.play.config.food_score);
    }

    /// End the run the way a fatal tick does
    fn crash(session: &mut TestSession) {
        session.play.finish(Outcome::Crashed(CollisionType::Wall));
        session.game_loop.stop();
    }

    #[test]
    fn test_new_session_is_ready() {
        let session = session();
        assert_eq!(session.phase(), Phase::Ready);
        assert_eq!(session.score(), 0);
        assert_eq!(session.snake().body(), &[Position::new(10, 10)]);
        assert!(!session.snake().body().contains(&session.food().position()));
        assert!(!session.is_running());
        assert_eq!(session.overlay(), None);
    }

    #[test]
    fn test_high_score_loaded_from_store() {
        let session = session_with(GameConfig::default(), MemoryStore::new(50));
        assert_eq!(session.high_score(), 50);
    }

    #[test]
    fn test_unavailable_store_degrades_to_zero() {
        let session = session_with(GameConfig::default(), MemoryStore::unavailable());
        assert_eq!(session.high_score(), 0);
    }

    #[test]
    fn test_direction_starts_play() {
        let t0 = Instant::now();
        let mut session = session();
        session.handle_direction(Direction::Right, t0);

        assert_eq!(session.phase(), Phase::Playing);
        assert!(session.is_running());
        assert_eq!(session.snake().direction(), Some(Direction::Right));
    }

    #[test]
    fn test_pause_key_starts_with_random_direction() {
        let t0 = Instant::now();
        let mut session = session();
        session.handle_control(Control::TogglePause, t0);

        assert_eq!(session.phase(), Phase::Playing);
        assert!(session.snake().direction().is_some());
    }

    #[test]
    fn test_ticks_move_snake_without_growing() {
        let t0 = Instant::now();
        let mut session = session();
        park_food(&mut session, Position::new(0, 0));
        session.handle_direction(Direction::Right, t0);

        let outcome = session.frame(t0 + tick(3));
        assert_eq!(outcome.updates, 3);
        assert_eq!(session.snake().body(), &[Position::new(13, 10)]);
        assert_eq!(session.phase(), Phase::Playing);
    }

    #[test]
    fn test_eating_food_scores_and_grows() {
        let t0 = Instant::now();
        let mut session = session();
        park_food(&mut session, Position::new(11, 10));
        session.handle_direction(Direction::Right, t0);

        let before = session.snake().len();
        session.frame(t0 + tick(1));

        assert_eq!(session.score(), 10);
        assert_eq!(session.snake().len(), before + 1);
        assert_eq!(
            session.snake().body(),
            &[Position::new(11, 10), Position::new(10, 10)]
        );
        assert!(!session.snake().body().contains(&session.food().position()));
    }

    #[test]
    fn test_length_unchanged_when_food_missed() {
        let t0 = Instant::now();
        let mut session = session();
        park_food(&mut session, Position::new(0, 0));
        session.handle_direction(Direction::Up, t0);

        for n in 1..=5 {
            let before = session.snake().len();
            session.frame(t0 + tick(n));
            assert_eq!(session.snake().len(), before);
        }
    }

    #[test]
    fn test_playing_directions_are_queued() {
        let t0 = Instant::now();
        let mut session = session();
        park_food(&mut session, Position::new(0, 0));
        session.handle_direction(Direction::Right, t0);

        session.handle_direction(Direction::Up, t0);
        session.handle_direction(Direction::Left, t0);
        assert_eq!(session.snake().direction(), Some(Direction::Right));
        assert_eq!(session.snake().queued().len(), 2);

        session.frame(t0 + tick(1));
        assert_eq!(session.snake().head(), Position::new(10, 9));
        session.frame(t0 + tick(2));
        assert_eq!(session.snake().head(), Position::new(9, 9));
    }

    #[test]
    fn test_playing_reversal_is_discarded() {
        let t0 = Instant::now();
        let mut session = session();
        session.handle_direction(Direction::Right, t0);

        session.handle_direction(Direction::Left, t0);
        assert!(session.snake().queued().is_empty());
    }

    #[test]
    fn test_duplicate_of_effective_direction_is_not_queued() {
        let t0 = Instant::now();
        let mut session = session();
        session.handle_direction(Direction::Right, t0);

        session.handle_direction(Direction::Right, t0);
        assert!(session.snake().queued().is_empty());

        session.handle_direction(Direction::Up, t0);
        session.handle_direction(Direction::Up, t0);
        assert_eq!(session.snake().queued().len(), 1);
    }

    #[test]
    fn test_wall_collision_ends_run() {
        let t0 = Instant::now();
        let mut session = session_with(GameConfig::small(), MemoryStore::default());
        park_food(&mut session, Position::new(0, 0));
        session.handle_direction(Direction::Right, t0);

        // Centre of a 10 grid is x = 5; x = 10 is outside
        let outcome = session.frame(t0 + tick(5));
        assert_eq!(outcome.updates, 5);
        assert!(outcome.halted);
        assert_eq!(session.phase(), Phase::End);
        assert!(!session.is_running());
        assert!(matches!(
            session.overlay(),
            Some(Overlay::GameOver {
                outcome: Outcome::Crashed(CollisionType::Wall),
                ..
            })
        ));
    }

    #[test]
    fn test_self_collision_ends_run() {
        let t0 = Instant::now();
        let mut session = session();
        session.play.snake = Snake::from_body(
            vec![
                Position::new(5, 5),
                Position::new(6, 5),
                Position::new(6, 6),
                Position::new(5, 6),
                Position::new(4, 6),
            ],
            Heading::Toward(Direction::Left),
        );
        park_food(&mut session, Position::new(0, 0));
        session.play.set_phase(Phase::Playing);
        session.game_loop.start(t0);
        session.handle_direction(Direction::Down, t0);

        session.frame(t0 + tick(1));
        assert_eq!(session.phase(), Phase::End);
        assert!(matches!(
            session.overlay(),
            Some(Overlay::GameOver {
                outcome: Outcome::Crashed(CollisionType::SelfCollision),
                ..
            })
        ));
    }

    #[test]
    fn test_food_scenario_adds_ten() {
        let t0 = Instant::now();
        let mut session = session();
        park_food(&mut session, Position::new(10, 8));
        session.handle_direction(Direction::Up, t0);

        session.frame(t0 + tick(1));
        assert_eq!(session.score(), 0);
        let before = session.snake().len();

        session.frame(t0 + tick(2));
        assert_eq!(session.score(), 10);
        assert_eq!(session.snake().len(), before + 1);
    }

    #[test]
    fn test_improved_high_score_is_saved() {
        let t0 = Instant::now();
        let mut session = session_with(GameConfig::default(), MemoryStore::new(50));
        session.handle_direction(Direction::Right, t0);
        session.play.score = 70;
        crash(&mut session);

        assert_eq!(session.store().value(), 70);
        assert_eq!(session.high_score(), 70);
        assert!(matches!(
            session.overlay(),
            Some(Overlay::GameOver {
                new_record: true,
                high_score: 70,
                ..
            })
        ));
    }

    #[test]
    fn test_wall_crash_records_new_high_score() {
        let t0 = Instant::now();
        let mut session = session_with(GameConfig::small(), MemoryStore::new(50));
        park_food(&mut session, Position::new(0, 0));
        session.handle_direction(Direction::Right, t0);
        session.play.score = 70;

        let outcome = session.frame(t0 + tick(5));
        assert!(outcome.halted);
        assert_eq!(session.phase(), Phase::End);
        assert_eq!(session.store().value(), 70);
        assert_eq!(session.high_score(), 70);
        assert!(matches!(
            session.overlay(),
            Some(Overlay::GameOver {
                score: 70,
                high_score: 70,
                new_record: true,
                outcome: Outcome::Crashed(CollisionType::Wall),
            })
        ));
    }

    #[test]
    fn test_lower_score_leaves_high_score() {
        let t0 = Instant::now();
        let mut session = session_with(GameConfig::default(), MemoryStore::new(50));
        session.handle_direction(Direction::Right, t0);
        session.play.score = 20;
        crash(&mut session);

        assert_eq!(session.store().value(), 50);
        assert_eq!(session.high_score(), 50);
    }

    #[test]
    fn test_store_failure_does_not_stop_game_over() {
        let t0 = Instant::now();
        let mut session = session_with(GameConfig::default(), MemoryStore::unavailable());
        session.handle_direction(Direction::Right, t0);
        session.play.score = 30;
        crash(&mut session);

        assert_eq!(session.phase(), Phase::End);
        assert_eq!(session.high_score(), 30);
    }

    #[test]
    fn test_full_board_is_a_win() {
        let t0 = Instant::now();
        let mut session = session_with(GameConfig::small(), MemoryStore::default());
        // Fill every cell except (9, 9) and put the food there
        let mut body: Vec<Position> = (0..10)
            .flat_map(|y| (0..10).map(move |x| Position::new(x, y)))
            .filter(|pos| *pos != Position::new(9, 9))
            .collect();
        // Head at (8, 9) facing right; the neck must not be at (9, 9)
        body.retain(|pos| *pos != Position::new(8, 9));
        body.insert(0, Position::new(8, 9));
        session.play.snake = Snake::from_body(body, Heading::Toward(Direction::Right));
        park_food(&mut session, Position::new(9, 9));
        session.play.set_phase(Phase::Playing);
        session.game_loop.start(t0);

        session.frame(t0 + tick(1));
        assert_eq!(session.phase(), Phase::End);
        assert_eq!(session.score(), 10);
        assert!(matches!(
            session.overlay(),
            Some(Overlay::GameOver {
                outcome: Outcome::Won,
                ..
            })
        ));
    }

    #[test]
    fn test_pause_and_resume() {
        let t0 = Instant::now();
        let mut session = session();
        park_food(&mut session, Position::new(0, 0));
        session.handle_direction(Direction::Right, t0);
        session.frame(t0 + tick(1));

        session.handle_control(Control::TogglePause, t0 + tick(1));
        assert_eq!(session.phase(), Phase::Paused);
        assert!(!session.is_running());
        assert_eq!(session.overlay(), Some(Overlay::Pause));

        // Time spent paused is not simulated
        let head = session.snake().head();
        session.frame(t0 + tick(20));
        assert_eq!(session.snake().head(), head);

        session.handle_control(Control::TogglePause, t0 + tick(20));
        assert_eq!(session.phase(), Phase::Playing);
        let outcome = session.frame(t0 + tick(21));
        assert_eq!(outcome.updates, 1);
        assert_eq!(session.snake().head(), head.moved_in_direction(Direction::Right));
    }

    #[test]
    fn test_direction_while_paused_applies_immediately() {
        let t0 = Instant::now();
        let mut session = session();
        park_food(&mut session, Position::new(0, 0));
        session.handle_direction(Direction::Right, t0);
        session.handle_control(Control::TogglePause, t0);

        session.handle_direction(Direction::Down, t0);
        assert_eq!(session.phase(), Phase::Playing);
        assert_eq!(session.snake().direction(), Some(Direction::Down));
        assert!(session.snake().queued().is_empty());
    }

    #[test]
    fn test_paused_reversal_does_not_resume() {
        let t0 = Instant::now();
        let mut session = session();
        session.handle_direction(Direction::Right, t0);
        session.handle_control(Control::TogglePause, t0);

        session.handle_direction(Direction::Left, t0);
        assert_eq!(session.phase(), Phase::Paused);
    }

    #[test]
    fn test_input_ignored_after_end() {
        let t0 = Instant::now();
        let mut session = session();
        session.handle_direction(Direction::Right, t0);
        crash(&mut session);

        session.handle_direction(Direction::Up, t0);
        session.handle_control(Control::TogglePause, t0);
        assert_eq!(session.phase(), Phase::End);
        assert!(!session.is_running());
    }

    #[test]
    fn test_restart_reinitializes() {
        let t0 = Instant::now();
        let mut session = session();
        park_food(&mut session, Position::new(11, 10));
        session.handle_direction(Direction::Right, t0);
        session.frame(t0 + tick(1));
        crash(&mut session);

        session.handle_control(Control::Restart, t0);
        assert_eq!(session.phase(), Phase::Ready);
        assert_eq!(session.score(), 0);
        assert_eq!(session.snake().body(), &[Position::new(10, 10)]);
        assert_eq!(session.snake().heading(), Heading::Undecided);
        assert_eq!(session.overlay(), None);
    }

    #[test]
    fn test_restart_starts_a_new_run() {
        let t0 = Instant::now();
        let mut session = session();
        assert_eq!(session.run(), 0);

        session.handle_direction(Direction::Right, t0);
        assert_eq!(session.run(), 0);

        session.handle_control(Control::Restart, t0 + tick(1));
        assert_eq!(session.run(), 1);
        session.handle_control(Control::SelectGrid(GridSize::Small), t0 + tick(1));
        assert_eq!(session.run(), 1);
    }

    #[test]
    fn test_settings_suspends_and_resumes() {
        let t0 = Instant::now();
        let mut session = session();
        park_food(&mut session, Position::new(0, 0));
        session.handle_direction(Direction::Right, t0);

        session.handle_control(Control::OpenSettings, t0);
        assert_eq!(session.phase(), Phase::Playing);
        assert!(!session.is_running());
        assert_eq!(
            session.overlay(),
            Some(Overlay::Settings {
                grid: GridSize::Medium
            })
        );

        // Directions are ignored behind the panel
        session.handle_direction(Direction::Up, t0);
        assert!(session.snake().queued().is_empty());

        session.handle_control(Control::CloseOverlay, t0 + tick(4));
        assert!(session.is_running());
        assert_eq!(session.overlay(), None);
        assert_eq!(session.frame(t0 + tick(5)).updates, 1);
    }

    #[test]
    fn test_info_panel_over_paused_game() {
        let t0 = Instant::now();
        let mut session = session();
        session.handle_direction(Direction::Right, t0);
        session.handle_control(Control::TogglePause, t0);

        session.handle_control(Control::OpenInfo, t0);
        assert_eq!(session.overlay(), Some(Overlay::Info));

        session.handle_control(Control::OpenInfo, t0);
        assert_eq!(session.overlay(), Some(Overlay::Pause));
        assert!(!session.is_running());
    }

    #[test]
    fn test_grid_change_reinitializes() {
        let t0 = Instant::now();
        let mut session = session();
        session.handle_direction(Direction::Right, t0);
        session.handle_control(Control::OpenSettings, t0);
        session.handle_control(Control::SelectGrid(GridSize::Large), t0);

        assert_eq!(session.config().tile_count(), 40);
        assert_eq!(session.phase(), Phase::Ready);
        assert_eq!(session.snake().body(), &[Position::new(20, 20)]);
        assert!(session.food().position().is_within(40));

        session.handle_control(Control::CloseOverlay, t0);
        assert!(!session.is_running());
    }

    #[test]
    fn test_grid_selection_needs_settings_panel() {
        let t0 = Instant::now();
        let mut session = session();
        session.handle_control(Control::SelectGrid(GridSize::Small), t0);
        assert_eq!(session.config().grid, GridSize::Medium);
    }

    #[test]
    fn test_broadcast_reports_changes_only() {
        let t0 = Instant::now();
        let mut session = session();
        let mut phase = session.subscribe_phase();
        let mut score = session.subscribe_score();
        park_food(&mut session, Position::new(11, 10));

        session.handle_direction(Direction::Right, t0);
        assert!(phase.has_changed().unwrap());
        assert_eq!(*phase.borrow_and_update(), Phase::Playing);

        session.frame(t0 + tick(1));
        assert_eq!(*score.borrow_and_update(), 10);

        park_food(&mut session, Position::new(0, 0));
        session.frame(t0 + tick(2));
        assert!(!score.has_changed().unwrap());
        assert!(!phase.has_changed().unwrap());
    }

    #[test]
    fn test_renderer_sees_each_frame() {
        let t0 = Instant::now();
        let mut session = session();
        park_food(&mut session, Position::new(0, 0));

        // Idle session draws once, then only on change
        session.frame(t0);
        session.frame(t0 + tick(1));
        assert_eq!(session.renderer().frames.len(), 1);
        assert_eq!(session.renderer().frames[0].phase, Phase::Ready);

        session.handle_direction(Direction::Right, t0 + tick(1));
        session.frame(t0 + tick(2));
        let last = session.renderer().frames.last().unwrap();
        assert_eq!(last.snake, vec![Position::new(11, 10)]);
        assert_eq!(last.food, Position::new(0, 0));
        assert_eq!(last.phase, Phase::Playing);
    }

    #[test]
    fn test_render_failure_recovers() {
        let t0 = Instant::now();
        let mut session = session();
        session.handle_direction(Direction::Right, t0);
        session.renderer_mut().fail_next = true;

        let outcome = session.frame(t0 + Duration::from_millis(10));
        assert!(outcome.failed);
        assert!(!session.is_running());
        assert_eq!(session.phase(), Phase::Playing);

        let outcome = session.frame(t0 + Duration::from_millis(1_010));
        assert!(outcome.recovered);
        assert!(session.is_running());
        assert_eq!(session.renderer().frames.last().unwrap().score, 0);
    }

    #[test]
    fn test_failed_render_on_final_tick_stays_ended() {
        let t0 = Instant::now();
        let mut session = session_with(GameConfig::small(), MemoryStore::default());
        park_food(&mut session, Position::new(0, 0));
        session.handle_direction(Direction::Right, t0);
        session.renderer_mut().fail_next = true;

        let outcome = session.frame(t0 + tick(5));
        assert!(outcome.halted);
        assert!(outcome.failed);
        assert_eq!(session.phase(), Phase::End);
        assert!(!session.is_running());

        let outcome = session.frame(t0 + tick(5) + Duration::from_secs(2));
        assert!(!outcome.recovered);
        assert_eq!(outcome.updates, 0);
        assert_eq!(session.phase(), Phase::End);
        assert!(!session.is_running());
    }

    #[test]
    fn test_body_never_empty_over_long_run() {
        let t0 = Instant::now();
        let mut session = session_with(GameConfig::small(), MemoryStore::default());
        let turns = [Direction::Up, Direction::Right, Direction::Down, Direction::Left];
        session.handle_direction(Direction::Up, t0);

        for n in 1..=200u32 {
            if session.phase() != Phase::Playing {
                session.handle_control(Control::Restart, t0 + tick(n));
                session.handle_direction(Direction::Up, t0 + tick(n));
            }
            session.handle_direction(turns[(n as usize / 3) % 4], t0 + tick(n));
            session.frame(t0 + tick(n));
            assert!(!session.snake().is_empty());
        }
    }
}
