use std::time::{Duration, Instant};

use crate::game::Phase;

/// Per-run clock and session counters shown in the HUD
pub struct GameMetrics {
    /// Set while the clock is running
    started_at: Option<Instant>,
    /// Time accumulated before the last pause
    banked: Duration,
    /// Run the clock belongs to
    run: u64,
    pub elapsed_time: Duration,
    pub games_played: u32,
}

impl GameMetrics {
    pub fn new() -> Self {
        Self {
            started_at: None,
            banked: Duration::ZERO,
            run: 0,
            elapsed_time: Duration::ZERO,
            games_played: 0,
        }
    }

    pub fn update(&mut self) {
        self.elapsed_time = self.banked + self.started_at.map_or(Duration::ZERO, |t| t.elapsed());
    }

    /// Follow the session's phase changes.
    ///
    /// `run` changes on every reset, so a new run restarts the clock even
    /// when its `Ready` notification was coalesced away.
    pub fn on_phase(&mut self, phase: Phase, run: u64) {
        if run != self.run {
            self.run = run;
            self.on_game_start();
        }
        match phase {
            Phase::Ready => self.on_game_start(),
            Phase::Playing => {
                self.started_at.get_or_insert_with(Instant::now);
            }
            Phase::Paused => self.stop_clock(),
            Phase::End => self.on_game_over(),
        }
        self.update();
    }

    pub fn on_game_start(&mut self) {
        self.started_at = None;
        self.banked = Duration::ZERO;
        self.elapsed_time = Duration::ZERO;
    }

    pub fn on_game_over(&mut self) {
        self.stop_clock();
        self.games_played += 1;
    }

    fn stop_clock(&mut self) {
        if let Some(started) = self.started_at.take() {
            self.banked += started.elapsed();
        }
    }

    pub fn is_clock_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn format_time(&self) -> String {
        let total_secs = self.elapsed_time.as_secs();
        let minutes = total_secs / 60;
        let seconds = total_secs % 60;
        format!("{:02}:{:02}", minutes, seconds)
    }
}

impl Default for GameMetrics {
    fn default() -> Self {
        Self::new()
    }
}
