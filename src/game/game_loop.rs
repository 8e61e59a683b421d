//! Fixed-timestep scheduler
//!
//! The loop owns no game data. The host calls [`GameLoop::frame`] once per
//! display frame with the current time; the loop turns accumulated time into
//! whole simulation steps and renders exactly once per frame.

use std::time::{Duration, Instant};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

/// Whether the simulation keeps stepping after an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    /// Stop the loop once the current frame has been rendered
    Halt,
}

/// Callbacks driven by [`GameLoop`]
pub trait FrameHandler {
    /// Advance the simulation by one fixed step
    fn update(&mut self) -> Result<LoopControl>;

    /// Draw the latest state
    fn render(&mut self) -> Result<()>;

    /// Called once per FPS window with the number of frames rendered in it
    fn on_fps(&mut self, _fps: u32) {}

    /// Called when `update` or `render` fails, before the loop stops
    fn on_error(&mut self, _error: &anyhow::Error) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
}

/// Timing parameters for the loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Simulated time covered by one update
    pub game_speed: Duration,
    /// Most updates a single frame may catch up on
    pub max_frame_skip: u32,
    /// Delay before a failed loop restarts itself
    pub recovery_delay: Duration,
    /// Width of the FPS counting window
    pub fps_window: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            game_speed: Duration::from_millis(150),
            max_frame_skip: 5,
            recovery_delay: Duration::from_secs(1),
            fps_window: Duration::from_secs(1),
        }
    }
}

impl LoopConfig {
    /// Largest elapsed time a single frame is allowed to account for
    pub fn max_frame_delta(&self) -> Duration {
        self.game_speed * self.max_frame_skip.max(1)
    }
}

/// What happened during one call to [`GameLoop::frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameOutcome {
    pub updates: u32,
    pub rendered: bool,
    /// The loop restarted itself after an earlier failure
    pub recovered: bool,
    /// A callback failed and the loop stopped
    pub failed: bool,
    /// An update asked the loop to halt
    pub halted: bool,
}

#[derive(Debug)]
pub struct GameLoop {
    config: LoopConfig,
    state: LoopState,
    last_frame: Option<Instant>,
    accumulator: Duration,
    fps_window_start: Option<Instant>,
    frames_in_window: u32,
    fps: u32,
    recovery_at: Option<Instant>,
}

impl GameLoop {
    pub fn new(config: LoopConfig) -> Self {
        Self {
            config,
            state: LoopState::Stopped,
            last_frame: None,
            accumulator: Duration::ZERO,
            fps_window_start: None,
            frames_in_window: 0,
            fps: 0,
            recovery_at: None,
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    /// Last reported frames per second
    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn recovery_pending(&self) -> bool {
        self.recovery_at.is_some()
    }

    /// Start scheduling frames, using `now` as the simulation baseline
    pub fn start(&mut self, now: Instant) {
        if self.is_running() {
            return;
        }
        self.state = LoopState::Running;
        self.last_frame = Some(now);
        self.accumulator = Duration::ZERO;
        self.fps_window_start = Some(now);
        self.frames_in_window = 0;
        self.recovery_at = None;
        debug!("game loop started");
    }

    /// Stop scheduling frames and drop any pending recovery
    pub fn stop(&mut self) {
        self.recovery_at = None;
        if !self.is_running() {
            return;
        }
        self.halt();
        debug!("game loop stopped");
    }

    /// Restart a failed loop once its recovery delay has passed
    pub fn poll_recovery(&mut self, now: Instant) -> bool {
        match self.recovery_at {
            Some(at) if now >= at => {
                self.recovery_at = None;
                if self.is_running() {
                    return false;
                }
                warn!("restarting game loop after failure");
                self.start(now);
                true
            }
            _ => false,
        }
    }

    /// Run one display frame
    pub fn frame<H: FrameHandler + ?Sized>(&mut self, now: Instant, handler: &mut H) -> FrameOutcome {
        let mut outcome = FrameOutcome::default();

        if !self.is_running() {
            outcome.recovered = self.poll_recovery(now);
            if !outcome.recovered {
                return outcome;
            }
        }

        let last = self.last_frame.replace(now).unwrap_or(now);
        let elapsed = now
            .saturating_duration_since(last)
            .min(self.config.max_frame_delta());
        self.accumulator += elapsed;

        while self.accumulator >= self.config.game_speed {
            match handler.update() {
                Ok(control) => {
                    self.accumulator -= self.config.game_speed;
                    outcome.updates += 1;
                    if control == LoopControl::Halt {
                        outcome.halted = true;
                        break;
                    }
                }
                Err(err) => {
                    self.fail(now, err, handler, true);
                    outcome.failed = true;
                    return outcome;
                }
            }
        }

        // A halted run stays stopped even when its last render fails
        if let Err(err) = handler.render() {
            self.fail(now, err, handler, !outcome.halted);
            outcome.failed = true;
            return outcome;
        }
        outcome.rendered = true;

        self.count_frame(now, handler);

        if outcome.halted {
            self.stop();
        }

        outcome
    }

    fn count_frame<H: FrameHandler + ?Sized>(&mut self, now: Instant, handler: &mut H) {
        self.frames_in_window += 1;
        let window_start = *self.fps_window_start.get_or_insert(now);
        if now.saturating_duration_since(window_start) >= self.config.fps_window {
            self.fps = self.frames_in_window;
            self.frames_in_window = 0;
            self.fps_window_start = Some(now);
            handler.on_fps(self.fps);
        }
    }

    fn fail<H: FrameHandler + ?Sized>(
        &mut self,
        now: Instant,
        err: anyhow::Error,
        handler: &mut H,
        recover: bool,
    ) {
        error!("game loop frame failed: {:#}", err);
        handler.on_error(&err);
        self.halt();
        self.recovery_at = recover.then(|| now + self.config.recovery_delay);
    }

    fn halt(&mut self) {
        self.state = LoopState::Stopped;
        self.last_frame = None;
        self.accumulator = Duration::ZERO;
    }
}

impl Default for GameLoop {
    fn default() -> Self {
        Self::new(LoopConfig::default())
    }
}
