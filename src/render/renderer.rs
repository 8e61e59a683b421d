use std::io::{stderr, Stderr};

use anyhow::{Context, Result};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame, Terminal,
};

use super::{RenderSink, Scene};
use crate::game::{CollisionType, GridSize, Outcome, Overlay, Phase, Position};
use crate::metrics::GameMetrics;

/// Stateless painter turning a [`Scene`] into widgets
pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, frame: &mut Frame, scene: &Scene<'_>, metrics: &GameMetrics) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Game area
                Constraint::Length(3), // Footer
            ])
            .split(frame.area());

        let stats = self.render_stats(scene, metrics);
        frame.render_widget(stats, chunks[0]);

        // Center the game grid horizontally
        let game_area = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(10),
                Constraint::Percentage(80),
                Constraint::Percentage(10),
            ])
            .split(chunks[1])[1];

        match scene.overlay {
            Some(overlay) => {
                let panel = self.render_overlay(overlay, scene);
                frame.render_widget(panel, game_area);
            }
            None => {
                let grid = self.render_grid(scene);
                frame.render_widget(grid, game_area);
            }
        }

        let controls = self.render_controls(scene.phase);
        frame.render_widget(controls, chunks[2]);
    }

    fn render_grid(&self, scene: &Scene<'_>) -> Paragraph<'static> {
        let tile_count = scene.grid.tile_count() as i32;
        let head = scene.head();
        let mut lines = Vec::with_capacity(tile_count as usize);

        for y in 0..tile_count {
            let mut spans = Vec::with_capacity(tile_count as usize);

            for x in 0..tile_count {
                let pos = Position::new(x, y);

                let cell = if Some(pos) == head {
                    Span::styled(
                        "■ ",
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    )
                } else if scene.snake.contains(&pos) {
                    Span::styled("□ ", Style::default().fg(Color::Green))
                } else if pos == scene.food {
                    Span::styled(
                        "O ",
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                    )
                } else {
                    Span::styled(". ", Style::default().fg(Color::DarkGray))
                };

                spans.push(cell);
            }

            lines.push(Line::from(spans));
        }

        let title = match scene.phase {
            Phase::Ready => " Snake - press a direction to start ".to_string(),
            _ => format!(" Snake {} ", scene.grid.label()),
        };

        Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Double)
                    .border_style(Style::default().fg(Color::White))
                    .title(title),
            )
            .alignment(Alignment::Center)
    }

    fn render_stats(&self, scene: &Scene<'_>, metrics: &GameMetrics) -> Paragraph<'static> {
        let label = Style::default().fg(Color::Yellow);
        let value = Style::default().fg(Color::White);

        let text = vec![Line::from(vec![
            Span::styled("Score: ", label),
            Span::styled(scene.score.to_string(), value.add_modifier(Modifier::BOLD)),
            Span::raw("    "),
            Span::styled("Best: ", label),
            Span::styled(scene.high_score.to_string(), value),
            Span::raw("    "),
            Span::styled("Time: ", label),
            Span::styled(metrics.format_time(), value),
            Span::raw("    "),
            Span::styled("Games: ", label),
            Span::styled(metrics.games_played.to_string(), value),
            Span::raw("    "),
            Span::styled("FPS: ", label),
            Span::styled(scene.fps.to_string(), value),
        ])];

        Paragraph::new(text).alignment(Alignment::Center)
    }

    fn render_overlay(&self, overlay: &Overlay, scene: &Scene<'_>) -> Paragraph<'static> {
        let mut text = vec![
            Line::from(""),
            Line::from(Span::styled(
                overlay.title().to_uppercase(),
                Style::default()
                    .fg(overlay_color(overlay))
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
        ];

        match overlay {
            Overlay::Pause => {
                text.push(score_line("Score: ", scene.score));
                text.push(Line::from(""));
                text.push(key_hint(&[("Space", "resume"), ("R", "restart")]));
            }
            Overlay::GameOver {
                score,
                high_score,
                new_record,
                outcome,
            } => {
                text.push(Line::from(Span::styled(
                    outcome_text(*outcome),
                    Style::default().fg(Color::Gray),
                )));
                text.push(score_line("Final Score: ", *score));
                text.push(score_line("Best: ", *high_score));
                if *new_record {
                    text.push(Line::from(Span::styled(
                        "New high score!",
                        Style::default()
                            .fg(Color::Green)
                            .add_modifier(Modifier::BOLD),
                    )));
                }
                text.push(Line::from(""));
                text.push(key_hint(&[("R", "restart"), ("Q", "quit")]));
            }
            Overlay::Settings { grid } => {
                for (index, size) in GridSize::ALL.iter().enumerate() {
                    let marker = if size == grid { "> " } else { "  " };
                    let style = if size == grid {
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
                    } else {
                        Style::default().fg(Color::Gray)
                    };
                    text.push(Line::from(Span::styled(
                        format!("{}{}  {}", marker, index + 1, size.label()),
                        style,
                    )));
                }
                text.push(Line::from(""));
                text.push(key_hint(&[("1-3", "grid size"), ("Esc", "close")]));
            }
            Overlay::Info => {
                for line in [
                    "Eat food to grow and score points.",
                    "Hitting a wall or yourself ends the run.",
                    "Up to two turns can be buffered per step.",
                ] {
                    text.push(Line::from(Span::styled(line, Style::default().fg(Color::Gray))));
                }
                text.push(Line::from(""));
                text.push(key_hint(&[("Esc", "close")]));
            }
        }

        Paragraph::new(text).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(overlay_color(overlay))),
        )
    }

    fn render_controls(&self, phase: Phase) -> Paragraph<'static> {
        let pause = match phase {
            Phase::Paused => " to resume | ",
            Phase::Ready => " to start | ",
            _ => " to pause | ",
        };

        let text = vec![Line::from(vec![
            Span::styled("↑↓←→", Style::default().fg(Color::Cyan)),
            Span::raw(" or "),
            Span::styled("WASD", Style::default().fg(Color::Cyan)),
            Span::raw(" to move | "),
            Span::styled("Space", Style::default().fg(Color::Cyan)),
            Span::raw(pause),
            Span::styled("O", Style::default().fg(Color::Cyan)),
            Span::raw(" settings | "),
            Span::styled("I", Style::default().fg(Color::Cyan)),
            Span::raw(" help | "),
            Span::styled("Q", Style::default().fg(Color::Red)),
            Span::raw(" to quit"),
        ])];

        Paragraph::new(text).alignment(Alignment::Center)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

fn overlay_color(overlay: &Overlay) -> Color {
    match overlay {
        Overlay::Pause => Color::Yellow,
        Overlay::GameOver {
            outcome: Outcome::Won,
            ..
        } => Color::Green,
        Overlay::GameOver { .. } => Color::Red,
        Overlay::Settings { .. } | Overlay::Info => Color::Cyan,
    }
}

fn outcome_text(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Crashed(CollisionType::Wall) => "You hit the wall",
        Outcome::Crashed(CollisionType::SelfCollision) => "You ran into yourself",
        Outcome::Won => "The snake fills the whole board",
    }
}

fn score_line(label: &'static str, score: u32) -> Line<'static> {
    Line::from(vec![
        Span::styled(label, Style::default().fg(Color::Yellow)),
        Span::styled(
            score.to_string(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
    ])
}

fn key_hint(keys: &[(&'static str, &'static str)]) -> Line<'static> {
    let mut spans = Vec::new();
    for (i, (key, action)) in keys.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", Style::default().fg(Color::Gray)));
        }
        spans.push(Span::styled(
            *key,
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(format!(" to {}", action), Style::default().fg(Color::Gray)));
    }
    Line::from(spans)
}

/// Draws scenes onto a ratatui terminal
pub struct TerminalRenderer<B: Backend> {
    terminal: Terminal<B>,
    painter: Renderer,
    metrics: GameMetrics,
}

impl TerminalRenderer<CrosstermBackend<Stderr>> {
    /// Switch the terminal to raw mode on the alternate screen
    pub fn init() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stderr = stderr();
        execute!(stderr, EnterAlternateScreen).context("Failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stderr);
        let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;
        terminal.hide_cursor().context("Failed to hide cursor")?;
        terminal.clear().context("Failed to clear terminal")?;
        Ok(Self::with_terminal(terminal))
    }

    /// Give the terminal back to the shell
    pub fn restore(&mut self) -> Result<()> {
        disable_raw_mode().context("Failed to disable raw mode")?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)
            .context("Failed to leave alternate screen")?;
        self.terminal.show_cursor().context("Failed to show cursor")?;
        Ok(())
    }
}

impl<B: Backend> TerminalRenderer<B> {
    pub fn with_terminal(terminal: Terminal<B>) -> Self {
        Self {
            terminal,
            painter: Renderer::new(),
            metrics: GameMetrics::new(),
        }
    }

    pub fn metrics_mut(&mut self) -> &mut GameMetrics {
        &mut self.metrics
    }

    pub fn terminal(&self) -> &Terminal<B> {
        &self.terminal
    }
}

impl<B: Backend> RenderSink for TerminalRenderer<B> {
    fn render(&mut self, scene: &Scene<'_>) -> Result<()> {
        self.metrics.update();
        let Self {
            terminal,
            painter,
            metrics,
        } = self;
        terminal
            .draw(|frame| painter.render(frame, scene, metrics))
            .context("Failed to draw frame")?;
        Ok(())
    }
}
