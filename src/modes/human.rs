use std::io::Stderr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{Event, EventStream, KeyEventKind};
use futures::StreamExt;
use ratatui::backend::CrosstermBackend;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::game::{GameConfig, GameSession};
use crate::input::{InputHandler, KeyAction};
use crate::render::TerminalRenderer;
use crate::store::JsonFileStore;

type TerminalSession = GameSession<JsonFileStore, TerminalRenderer<CrosstermBackend<Stderr>>>;

pub struct HumanMode {
    config: GameConfig,
    high_score_path: PathBuf,
    frame_interval: Duration,
    input_handler: InputHandler,
    should_quit: bool,
}

impl HumanMode {
    pub fn new(config: GameConfig, high_score_path: PathBuf, fps: u32) -> Self {
        Self {
            config,
            high_score_path,
            frame_interval: frame_interval(fps),
            input_handler: InputHandler::new(),
            should_quit: false,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let renderer = TerminalRenderer::init()?;
        let store = JsonFileStore::new(&self.high_score_path);
        let mut session = GameSession::new(self.config.clone(), store, renderer);
        info!(
            grid = self.config.grid.label(),
            high_score = session.high_score(),
            "session started"
        );

        // Run game loop with cleanup
        let result = self.run_game_loop(&mut session).await;

        session.renderer_mut().restore()?;
        info!(score = session.score(), "session closed");

        result
    }

    async fn run_game_loop(&mut self, session: &mut TerminalSession) -> Result<()> {
        let mut event_stream = EventStream::new();

        let mut frame_timer = interval(self.frame_interval);
        frame_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut phases = session.subscribe_phase();

        loop {
            tokio::select! {
                // Handle terminal events
                maybe_event = event_stream.next() => {
                    match maybe_event {
                        Some(Ok(event)) => self.handle_event(session, event),
                        Some(Err(err)) => return Err(err).context("Failed to read terminal event"),
                        None => self.should_quit = true,
                    }
                }

                // Display frame; the session decides how many ticks it covers
                _ = frame_timer.tick() => {
                    session.frame(Instant::now());
                }

                // Keep the HUD clock in step with the session
                changed = phases.changed() => {
                    if changed.is_ok() {
                        let phase = *phases.borrow_and_update();
                        let run = session.run();
                        session.renderer_mut().metrics_mut().on_phase(phase, run);
                    }
                }

                // Handle Ctrl+C
                _ = tokio::signal::ctrl_c() => {
                    self.should_quit = true;
                }
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    fn handle_event(&mut self, session: &mut TerminalSession, event: Event) {
        let Event::Key(key) = event else {
            return;
        };

        // Only process key press events, not release
        if key.kind != KeyEventKind::Press {
            return;
        }

        let now = Instant::now();
        match self.input_handler.handle_key_event(key) {
            KeyAction::Steer(direction) => session.handle_direction(direction, now),
            KeyAction::Control(control) => session.handle_control(control, now),
            KeyAction::Quit => self.should_quit = true,
            KeyAction::None => {}
        }
    }
}

const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(1);

fn frame_interval(fps: u32) -> Duration {
    (Duration::from_secs(1) / fps.max(1)).max(MIN_FRAME_INTERVAL)
}
