use plotters::style::text_anchor::HPos;

use crate::instruments::canvas::{draw_grid, draw_label, draw_trace};
use crate::instruments::driver::FrameOutcome;
use crate::instruments::error::BenchError;
use crate::instruments::panels::{format_hz, FrameContext, Panel, AMBER, BACKGROUND, DIM, GRID, TEXT};
use crate::instruments::signal::generator_preview_y;
use crate::types::{GeneratorPatch, PanelKind};

pub const GENERATOR_CANVAS: (u32, u32) = (400, 200);

/// Static two-period preview of the function generator's output.
#[derive(Debug, Default)]
pub struct GeneratorPanel;

impl GeneratorPanel {
    pub fn new() -> Self {
        Self
    }
}

impl Panel for GeneratorPanel {
    type Patch = GeneratorPatch;

    fn kind(&self) -> PanelKind {
        PanelKind::Generator
    }

    fn canvas_size(&self) -> (u32, u32) {
        GENERATOR_CANVAS
    }

    fn render_frame(&mut self, ctx: &mut FrameContext<'_>) -> Result<FrameOutcome<GeneratorPatch>, BenchError> {
        let config = ctx.state.generator;
        let (w, h) = (ctx.canvas.width(), ctx.canvas.height());
        let points: Vec<(i32, i32)> = (0..w)
            .map(|x| {
                let y = generator_preview_y(x as f64, w as f64, h as f64, &config);
                (x as i32, y.round() as i32)
            })
            .collect();

        let surface = ctx.canvas.surface();
        surface.fill(&BACKGROUND)?;
        draw_grid(&surface, 8, 4, &GRID)?;
        draw_trace(&surface, points, if config.enabled { &AMBER } else { &DIM }, 2)?;
        draw_label(&surface, config.waveform.label(), (8, 12), 12, &TEXT, HPos::Left);
        draw_label(
            &surface,
            &format!("{} {:.1}Vpp", format_hz(config.frequency), config.amplitude),
            (w as i32 - 8, 12),
            12,
            &TEXT,
            HPos::Right,
        );
        surface.present()?;
        Ok(FrameOutcome::settle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::panels::test_support::{canvas_for, render};
    use crate::types::{InstrumentState, WaveformKind};

    #[test]
    fn preview_is_static() {
        let mut panel = GeneratorPanel::new();
        let mut canvas = canvas_for(&panel);
        let out = render(&mut panel, &mut canvas, &InstrumentState::default(), 0);
        assert!(!out.reschedule);
        assert!(out.writeback.is_none());
    }

    #[test]
    fn frequency_does_not_change_the_picture() {
        let mut panel = GeneratorPanel::new();
        let mut canvas = canvas_for(&panel);
        let mut state = InstrumentState::default();
        state.generator.waveform = WaveformKind::Triangle;
        state.generator.enabled = true;
        render(&mut panel, &mut canvas, &state, 0);
        // Sample the trace area only; the header text shows the frequency.
        let trace_rows = |c: &crate::instruments::canvas::Canvas| -> Vec<[u8; 3]> {
            (30..200).flat_map(|y| (0..400).map(move |x| (x, y))).filter_map(|(x, y)| c.pixel(x, y)).collect()
        };
        let before = trace_rows(&canvas);
        state.generator.frequency = 50_000.0;
        render(&mut panel, &mut canvas, &state, 1);
        assert_eq!(trace_rows(&canvas), before);
    }
}
