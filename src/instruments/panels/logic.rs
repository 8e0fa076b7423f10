use once_cell::sync::Lazy;
use plotters::prelude::*;
use plotters::style::text_anchor::HPos;

use crate::instruments::canvas::{draw_badge, draw_dashed, draw_label, hsl_color};
use crate::instruments::driver::FrameOutcome;
use crate::instruments::error::BenchError;
use crate::instruments::panels::{FrameContext, Panel, AMBER, BACKGROUND, DIM, GREEN, GRID, RED, TEXT};
use crate::instruments::signal::logic_level;
use crate::instruments::trigger::{CaptureState, HoldPolicy, TriggerMachine, LOGIC_TIMING};
use crate::types::{LogicPatch, PanelKind, TriggerPatch, LOGIC_CHANNELS};

pub const LOGIC_CANVAS: (u32, u32) = (1200, 800);
const HEADER_PX: i32 = 28;
const LABEL_PX: i32 = 56;
const TIME_DIVISIONS: i32 = 10;
/// Horizontal scroll per free-running frame.
pub const SCROLL_PX: f64 = 2.0;

/// Lane colours, spread around the hue wheel by the golden angle.
static CHANNEL_COLORS: Lazy<Vec<RGBColor>> = Lazy::new(|| {
    (0..LOGIC_CHANNELS)
        .map(|i| hsl_color((i as f64 * 137.5) % 360.0, 0.8, 0.6))
        .collect()
});

pub fn channel_color(channel: usize) -> RGBColor {
    CHANNEL_COLORS[channel % LOGIC_CHANNELS]
}

/// 16-channel logic analyzer over a synthetic clock pattern.
pub struct LogicPanel {
    trigger: TriggerMachine,
    scroll: f64,
}

impl Default for LogicPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl LogicPanel {
    pub fn new() -> Self {
        Self {
            trigger: TriggerMachine::new(LOGIC_TIMING, HoldPolicy::Halt),
            scroll: 0.0,
        }
    }

    pub fn trigger(&self) -> &TriggerMachine {
        &self.trigger
    }

    pub fn trigger_mut(&mut self) -> &mut TriggerMachine {
        &mut self.trigger
    }

    pub fn scroll(&self) -> f64 {
        self.scroll
    }
}

fn lane_points(channel: usize, offset: f64, left: i32, width: i32, top: i32, lane: i32) -> Vec<(i32, i32)> {
    let high = top + lane / 5;
    let low = top + lane * 4 / 5;
    let row = |x: i32| {
        if logic_level((x - left) as f64, offset, channel, width as f64) {
            high
        } else {
            low
        }
    };
    let mut points = Vec::with_capacity(width as usize + 16);
    let mut current = row(left);
    points.push((left, current));
    for x in left + 1..left + width {
        let next = row(x);
        if next != current {
            points.push((x, current));
            current = next;
        }
        points.push((x, current));
    }
    points
}

impl Panel for LogicPanel {
    type Patch = LogicPatch;

    fn kind(&self) -> PanelKind {
        PanelKind::Logic
    }

    fn canvas_size(&self) -> (u32, u32) {
        LOGIC_CANVAS
    }

    fn render_frame(&mut self, ctx: &mut FrameContext<'_>) -> Result<FrameOutcome<LogicPatch>, BenchError> {
        let logic = &ctx.state.logic;
        let step = self.trigger.advance(&logic.trigger);
        let offset = match step.state {
            CaptureState::FreeRun => {
                self.scroll += SCROLL_PX;
                self.scroll
            }
            // SINGLE captures from the start of the pattern.
            _ => 0.0,
        };

        let (w, h) = (ctx.canvas.width() as i32, ctx.canvas.height() as i32);
        let trace_width = w - LABEL_PX;
        let lane = (h - HEADER_PX) / LOGIC_CHANNELS as i32;

        let surface = ctx.canvas.surface();
        surface.fill(&BACKGROUND)?;

        for k in 0..TIME_DIVISIONS {
            let x = LABEL_PX + k * trace_width / TIME_DIVISIONS;
            draw_dashed(&surface, (x, HEADER_PX), (x, h), 4, 4, GRID.stroke_width(1))?;
            draw_label(&surface, &format!("T{k}"), (x + 4, HEADER_PX / 2), 12, &DIM, HPos::Left);
        }

        for channel in 0..LOGIC_CHANNELS {
            let top = HEADER_PX + channel as i32 * lane;
            let enabled = logic.enabled && logic.channels.get(channel).copied().unwrap_or(false);
            let color = channel_color(channel);
            surface.draw(&PathElement::new(
                vec![(0, top + lane - 1), (w, top + lane - 1)],
                GRID.stroke_width(1),
            ))?;
            draw_label(
                &surface,
                &format!("D{channel}"),
                (8, top + lane / 2),
                13,
                if enabled { &color } else { &DIM },
                HPos::Left,
            );
            if enabled {
                let points = lane_points(channel, offset, LABEL_PX, trace_width, top, lane);
                surface.draw(&PathElement::new(points, color.stroke_width(1)))?;
            }
        }

        let badge = match step.state {
            CaptureState::Armed => Some(("ARMED", AMBER)),
            CaptureState::Captured => Some(("STOPPED", RED)),
            CaptureState::FreeRun if logic.enabled => Some(("RUN", GREEN)),
            CaptureState::FreeRun => Some(("DISABLED", TEXT)),
        };
        if let Some((text, accent)) = badge {
            draw_badge(&surface, text, (w - 120, 2), (110, HEADER_PX - 6), &accent)?;
        }
        surface.present()?;

        if step.fired {
            log::info!("logic analyzer captured {} channels", logic.channels.iter().filter(|c| **c).count());
        }
        let writeback = step.fired.then(|| LogicPatch {
            trigger: TriggerPatch::disarm(),
            ..Default::default()
        });
        Ok(FrameOutcome {
            reschedule: !step.hold,
            writeback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::panels::test_support::{canvas_for, render};
    use crate::store::ParameterStore;
    use crate::types::InstrumentState;

    #[test]
    fn free_run_scrolls_two_pixels_per_frame() {
        let mut panel = LogicPanel::new();
        let mut canvas = canvas_for(&panel);
        let state = InstrumentState::default();
        for i in 0..5 {
            assert!(render(&mut panel, &mut canvas, &state, i).reschedule);
        }
        assert_eq!(panel.scroll(), 10.0);
    }

    #[test]
    fn single_captures_on_first_frame_and_halts() {
        let mut panel = LogicPanel::new();
        let mut canvas = canvas_for(&panel);
        let mut store = ParameterStore::new(InstrumentState::default());
        let arm = panel.trigger_mut().arm();
        store.apply(
            LogicPatch {
                trigger: arm,
                ..Default::default()
            }
            .into(),
        );

        let out = render(&mut panel, &mut canvas, store.state(), 0);
        assert!(!out.reschedule);
        let patch = out.writeback.unwrap();
        store.apply(patch.into());
        assert!(!store.state().logic.trigger.is_armed);

        // A redraw while captured stays halted and writes nothing.
        let again = render(&mut panel, &mut canvas, store.state(), 1);
        assert!(!again.reschedule);
        assert!(again.writeback.is_none());
        assert_eq!(panel.scroll(), 0.0);
    }

    #[test]
    fn lane_trace_follows_channel_clock() {
        // Channel 0: 10 periods over 1000 px, high for the first 50 px.
        let points = lane_points(0, 0.0, 0, 1000, 0, 50);
        assert_eq!(points[0], (0, 10));
        assert!(points.contains(&(50, 10)));
        assert!(points.contains(&(50, 40)));
        assert!(points.contains(&(100, 10)));
    }

    #[test]
    fn colours_follow_golden_angle() {
        assert_eq!(channel_color(0), hsl_color(0.0, 0.8, 0.6));
        assert_eq!(channel_color(3), hsl_color(52.5, 0.8, 0.6));
        assert_ne!(channel_color(1), channel_color(2));
    }
}
