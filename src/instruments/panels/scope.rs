use plotters::prelude::*;
use plotters::style::text_anchor::HPos;

use crate::instruments::canvas::{draw_badge, draw_dashed, draw_grid, draw_label, draw_trace, parse_hex_color};
use crate::instruments::driver::FrameOutcome;
use crate::instruments::error::BenchError;
use crate::instruments::panels::{FrameContext, Panel, AMBER, BACKGROUND, DIM, GREEN, GRID, RED};
use crate::instruments::signal::{auto_lock_phase, scope_reference, REFERENCE_HZ};
use crate::instruments::trigger::{CaptureState, HoldPolicy, TriggerMachine, SCOPE_TIMING};
use crate::types::{ChannelConfig, PanelKind, ScopePatch, TriggerPatch};

pub const SCOPE_CANVAS: (u32, u32) = (1200, 800);
const DIVISIONS_X: u32 = 10;
const DIVISIONS_Y: u32 = 8;
/// CH2 lags the reference by an eighth of a period.
const CH2_SHIFT_SECONDS: f64 = 1.0 / (8.0 * REFERENCE_HZ);

/// Two-channel oscilloscope over the built-in reference signal.
pub struct ScopePanel {
    trigger: TriggerMachine,
}

impl Default for ScopePanel {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopePanel {
    pub fn new() -> Self {
        Self {
            trigger: TriggerMachine::new(SCOPE_TIMING, HoldPolicy::Redraw),
        }
    }

    pub fn trigger(&self) -> &TriggerMachine {
        &self.trigger
    }

    pub fn trigger_mut(&mut self) -> &mut TriggerMachine {
        &mut self.trigger
    }
}

fn volts_to_row(volts: f64, channel: &ChannelConfig, height: f64) -> f64 {
    height / 2.0 - (volts + channel.offset) / channel.scale * (height / DIVISIONS_Y as f64)
}

fn trace_points(channel: &ChannelConfig, timebase: f64, phase: f64, shift: f64, (w, h): (u32, u32)) -> Vec<(i32, i32)> {
    let (wf, hf) = (w as f64, h as f64);
    (0..w)
        .map(|x| {
            let t = x as f64 / wf * timebase * DIVISIONS_X as f64;
            let y = volts_to_row(scope_reference(t + shift, phase), channel, hf);
            (x as i32, y.round().clamp(-hf, 2.0 * hf) as i32)
        })
        .collect()
}

impl Panel for ScopePanel {
    type Patch = ScopePatch;

    fn kind(&self) -> PanelKind {
        PanelKind::Scope
    }

    fn canvas_size(&self) -> (u32, u32) {
        SCOPE_CANVAS
    }

    fn render_frame(&mut self, ctx: &mut FrameContext<'_>) -> Result<FrameOutcome<ScopePatch>, BenchError> {
        let scope = &ctx.state.scope;
        let frame_index = ctx.frame_index;
        let step = self.trigger.advance(&scope.trigger);
        let phase = match step.state {
            CaptureState::FreeRun => auto_lock_phase(scope.trigger.level),
            _ => step.phase,
        };

        let size = (ctx.canvas.width(), ctx.canvas.height());
        let (w, h) = (size.0 as i32, size.1 as i32);
        let ch1_color = parse_hex_color(&scope.ch1.color).unwrap_or(AMBER);
        let ch2_color = parse_hex_color(&scope.ch2.color).unwrap_or(AMBER);

        let surface = ctx.canvas.surface();
        surface.fill(&BACKGROUND)?;
        draw_grid(&surface, DIVISIONS_X, DIVISIONS_Y, &GRID)?;

        for (channel, color, shift) in [
            (&scope.ch1, ch1_color, 0.0),
            (&scope.ch2, ch2_color, CH2_SHIFT_SECONDS),
        ] {
            if channel.enabled {
                draw_trace(&surface, trace_points(channel, scope.timebase, phase, shift, size), &color, 2)?;
            }
        }

        // Trigger level follows CH1's vertical scale.
        let level_y = (h as f64 / 2.0 - scope.trigger.level / scope.ch1.scale * (h as f64 / DIVISIONS_Y as f64))
            .round() as i32;
        let (line_style, handle) = match step.state {
            CaptureState::Armed => {
                let pulse = 0.35 + 0.45 * (frame_index as f64 * 0.2).sin().abs();
                (RED.mix(pulse).stroke_width(1), RED)
            }
            CaptureState::Captured => (GREEN.mix(0.6).stroke_width(1), GREEN),
            CaptureState::FreeRun => (DIM.mix(0.8).stroke_width(1), DIM),
        };
        draw_dashed(&surface, (0, level_y), (w, level_y), 8, 6, line_style)?;
        surface.draw(&Polygon::new(
            vec![(w - 1, level_y), (w - 16, level_y - 8), (w - 16, level_y + 8)],
            handle.filled(),
        ))?;

        draw_badge(
            &surface,
            &format!("CH1 {}V/div", scope.ch1.scale),
            (16, 16),
            (160, 28),
            &ch1_color,
        )?;
        match step.state {
            CaptureState::Armed => draw_badge(&surface, step.state.label(), (w - 256, 16), (240, 28), &RED)?,
            CaptureState::Captured => {
                draw_badge(&surface, step.state.label(), (w - 256, 16), (240, 28), &GREEN)?;
                surface.draw(&Rectangle::new(
                    [(w / 2 - 140, 60), (w / 2 + 140, 110)],
                    GREEN.mix(0.15).filled(),
                ))?;
                draw_label(&surface, "TRIGGERED", (w / 2, 85), 32, &GREEN, HPos::Center);
            }
            CaptureState::FreeRun => {}
        }
        surface.present()?;

        let writeback = step.fired.then(|| ScopePatch {
            trigger: TriggerPatch::disarm(),
            ..Default::default()
        });
        Ok(FrameOutcome {
            reschedule: !step.hold,
            writeback,
        })
    }
}
