use plotters::prelude::*;
use plotters::style::text_anchor::HPos;

use crate::instruments::canvas::{draw_badge, draw_dashed_path, draw_grid, draw_label, draw_trace};
use crate::instruments::driver::FrameOutcome;
use crate::instruments::error::BenchError;
use crate::instruments::panels::{format_hz, FrameContext, Panel, AMBER, BACKGROUND, GREEN, GRID, TEXT};
use crate::instruments::signal::network_response;
use crate::types::{NetworkPatch, PanelKind};

pub const NETWORK_CANVAS: (u32, u32) = (1000, 500);
/// Frames per percent of sweep progress.
pub const FRAMES_PER_STEP: u32 = 3;
const GAIN: RGBColor = RGBColor(56, 189, 248);
const PHASE: RGBColor = RGBColor(232, 121, 249);

/// Swept gain/phase analyzer.
#[derive(Debug, Default)]
pub struct NetworkPanel {
    progress: u32,
    sub_frame: u32,
    was_running: bool,
}

impl NetworkPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sweep completion in percent.
    pub fn progress(&self) -> u32 {
        self.progress
    }

    fn advance(&mut self, running: bool) -> bool {
        if running && !self.was_running {
            self.progress = 0;
            self.sub_frame = 0;
        }
        self.was_running = running;
        if !running || self.progress >= 100 {
            return false;
        }
        self.sub_frame += 1;
        if self.sub_frame >= FRAMES_PER_STEP {
            self.sub_frame = 0;
            self.progress += 1;
        }
        self.progress >= 100
    }
}

impl Panel for NetworkPanel {
    type Patch = NetworkPatch;

    fn kind(&self) -> PanelKind {
        PanelKind::Network
    }

    fn canvas_size(&self) -> (u32, u32) {
        NETWORK_CANVAS
    }

    fn render_frame(&mut self, ctx: &mut FrameContext<'_>) -> Result<FrameOutcome<NetworkPatch>, BenchError> {
        let config = ctx.state.network;
        let finished = self.advance(config.running);

        let (w, h) = (ctx.canvas.width() as i32, ctx.canvas.height() as i32);
        let reach = w * self.progress as i32 / 100;
        let (mut gain, mut phase) = (Vec::new(), Vec::new());
        for x in 0..reach {
            let (g, p) = network_response(x as f64 / w as f64);
            gain.push((x, (g * h as f64).round() as i32));
            phase.push((x, (p * h as f64).round() as i32));
        }

        let surface = ctx.canvas.surface();
        surface.fill(&BACKGROUND)?;
        draw_grid(&surface, 10, 8, &GRID)?;
        draw_trace(&surface, gain, &GAIN, 2)?;
        draw_dashed_path(&surface, &phase, 6, 4, PHASE.stroke_width(2))?;

        draw_label(&surface, &format_hz(config.start_freq), (6, h - 14), 12, &TEXT, HPos::Left);
        draw_label(&surface, &format_hz(config.stop_freq), (w - 6, h - 14), 12, &TEXT, HPos::Right);
        draw_label(&surface, "GAIN", (12, 16), 12, &GAIN, HPos::Left);
        draw_label(&surface, "PHASE", (60, 16), 12, &PHASE, HPos::Left);
        draw_label(
            &surface,
            &format!("{} pts", config.points),
            (w / 2, h - 14),
            12,
            &TEXT,
            HPos::Center,
        );
        let (text, accent) = if config.running && !finished {
            (format!("SWEEP {}%", self.progress), AMBER)
        } else if self.progress >= 100 {
            ("COMPLETE".to_owned(), GREEN)
        } else {
            ("IDLE".to_owned(), TEXT)
        };
        draw_badge(&surface, &text, (w - 136, 8), (124, 26), &accent)?;
        surface.present()?;

        if finished {
            log::info!(
                "network sweep {}..{} Hz finished",
                config.start_freq,
                config.stop_freq
            );
            self.was_running = false;
            return Ok(FrameOutcome::settle().with_writeback(Some(NetworkPatch {
                running: Some(false),
                ..Default::default()
            })));
        }
        Ok(FrameOutcome {
            reschedule: config.running,
            writeback: None,
        })
    }
}
