use plotters::prelude::*;
use plotters::style::text_anchor::HPos;

use crate::instruments::canvas::{draw_badge, draw_dashed, draw_grid, draw_label, draw_trace, parse_hex_color};
use crate::instruments::driver::FrameOutcome;
use crate::instruments::error::BenchError;
use crate::instruments::fft::{ReadoutCache, SpectrumReadout};
use crate::instruments::markers::{MarkerReading, MarkerSet};
use crate::instruments::panels::{format_hz, FrameContext, Panel, BACKGROUND, DIM, GRID, TEXT};
use crate::instruments::signal::{
    spectrum_amplitude, spectrum_fundamental, spectrum_magnitude, SpectrumGeometry, SPECTRUM_DB_RANGE,
};
use crate::types::{PanelKind, SpectrumConfig, SpectrumPatch};

pub const SPECTRUM_CANVAS: (u32, u32) = (1000, 600);
const CURVE: RGBColor = RGBColor(16, 185, 129);

/// Spectrum analyzer with draggable markers and an FFT readout box.
pub struct SpectrumPanel {
    markers: MarkerSet,
    readout: ReadoutCache,
    last_readout: Option<SpectrumReadout>,
}

impl Default for SpectrumPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumPanel {
    pub fn new() -> Self {
        Self {
            markers: MarkerSet::with_defaults(SpectrumConfig::default().range),
            readout: ReadoutCache::default(),
            last_readout: None,
        }
    }

    pub fn markers(&self) -> &MarkerSet {
        &self.markers
    }

    pub fn markers_mut(&mut self) -> &mut MarkerSet {
        &mut self.markers
    }

    /// Rebinds the marker axis after the span changed.
    pub fn sync_span(&mut self, span_hz: f64) {
        if self.markers.max_span() != span_hz {
            log::debug!("spectrum span -> {span_hz} Hz");
            self.markers.set_span(span_hz);
        }
    }

    /// Readout from the most recent frame.
    pub fn readout(&self) -> Option<SpectrumReadout> {
        self.last_readout
    }

    pub fn geometry(&self, config: &SpectrumConfig) -> SpectrumGeometry {
        SpectrumGeometry {
            width: SPECTRUM_CANVAS.0 as f64,
            height: SPECTRUM_CANVAS.1 as f64,
            span_hz: config.range,
        }
    }
}

impl Panel for SpectrumPanel {
    type Patch = SpectrumPatch;

    fn kind(&self) -> PanelKind {
        PanelKind::Spectrum
    }

    fn canvas_size(&self) -> (u32, u32) {
        SPECTRUM_CANVAS
    }

    fn render_frame(&mut self, ctx: &mut FrameContext<'_>) -> Result<FrameOutcome<SpectrumPatch>, BenchError> {
        let state = ctx.state;
        let config = &state.spectrum;
        self.sync_span(config.range);

        let (w, h) = (ctx.canvas.width(), ctx.canvas.height());
        let geometry = SpectrumGeometry {
            width: w as f64,
            height: h as f64,
            span_hz: config.range,
        };
        let fundamental = spectrum_fundamental(&state.generator);
        let amplitude = spectrum_amplitude(&state.generator);

        let curve: Vec<(i32, i32)> = if config.enabled {
            (0..w)
                .map(|x| {
                    let y = spectrum_magnitude(x as f64, &geometry, fundamental, amplitude, ctx.noise.next_unit());
                    (x as i32, y.round() as i32)
                })
                .collect()
        } else {
            Vec::new()
        };
        let readings: Vec<MarkerReading> = self.markers.readings(&state.generator, &geometry);
        self.last_readout = self.readout.get(&state.generator, config);

        let (wi, hi) = (w as i32, h as i32);
        let surface = ctx.canvas.surface();
        surface.fill(&BACKGROUND)?;
        draw_grid(&surface, 10, 8, &GRID)?;
        draw_trace(&surface, curve, &CURVE, 2)?;

        for (db, y) in [(0.0, 12), (-SPECTRUM_DB_RANGE / 2.0, hi / 2), (-SPECTRUM_DB_RANGE, hi - 12)] {
            draw_label(&surface, &format!("{db:.0}dB"), (6, y), 12, &TEXT, HPos::Left);
        }
        draw_label(&surface, "0Hz", (6, hi - 28), 12, &TEXT, HPos::Left);
        draw_label(&surface, &format_hz(config.range / 2.0), (wi / 2, hi - 28), 12, &TEXT, HPos::Center);
        draw_label(&surface, &format_hz(config.range), (wi - 6, hi - 28), 12, &TEXT, HPos::Right);

        for (marker, reading) in self.markers.markers().iter().zip(&readings) {
            let color = parse_hex_color(&marker.color).unwrap_or(TEXT);
            let x = geometry.x_for_frequency(reading.frequency_hz).round() as i32;
            let y = (-reading.level_db / SPECTRUM_DB_RANGE * geometry.height).round() as i32;
            draw_dashed(&surface, (x, 0), (x, hi), 4, 4, color.mix(0.6).stroke_width(1))?;
            surface.draw(&Polygon::new(vec![(x, y - 7), (x + 6, y), (x, y + 7), (x - 6, y)], color.filled()))?;
            draw_label(
                &surface,
                &format!("M{} {} {:.1}dB", marker.id, format_hz(reading.frequency_hz), reading.level_db),
                (x + 8, y - 14),
                12,
                &color,
                HPos::Left,
            );
        }

        let box_origin = (wi - 210, 12);
        surface.draw(&Rectangle::new(
            [box_origin, (wi - 12, 92)],
            BACKGROUND.mix(0.85).filled(),
        ))?;
        surface.draw(&Rectangle::new([box_origin, (wi - 12, 92)], DIM.stroke_width(1)))?;
        match self.last_readout {
            Some(r) => {
                let lines = [
                    format!("Peak  {}", format_hz((r.peak_hz * 100.0).round() / 100.0)),
                    format!("Level {:.1} dB", r.level_db),
                    format!("THD   {:.2} %", r.thd_percent),
                ];
                for (i, line) in lines.iter().enumerate() {
                    draw_label(&surface, line, (wi - 200, 28 + i as i32 * 24), 13, &CURVE, HPos::Left);
                }
            }
            None => draw_label(&surface, "NO SIGNAL", (wi - 111, 52), 14, &DIM, HPos::Center),
        }
        if !config.enabled {
            draw_badge(&surface, "STANDBY", (wi / 2 - 60, hi / 2 - 16), (120, 32), &DIM)?;
        }
        surface.present()?;
        Ok(FrameOutcome::again())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::noise::SeededNoise;
    use crate::instruments::panels::test_support::{canvas_for, render};
    use crate::types::InstrumentState;

    fn seeded_frame(seed: u64, state: &InstrumentState) -> Vec<u8> {
        let mut panel = SpectrumPanel::new();
        let mut canvas = canvas_for(&panel);
        let mut noise = SeededNoise::with_seed(seed);
        for frame_index in 0..3 {
            let mut ctx = FrameContext {
                state,
                canvas: &mut canvas,
                noise: &mut noise,
                frame_index,
            };
            panel.render_frame(&mut ctx).unwrap();
        }
        canvas.pixels().to_vec()
    }

    #[test]
    fn same_seed_renders_same_pixels() {
        let mut state = InstrumentState::default();
        state.generator.enabled = true;
        let a = seeded_frame(11, &state);
        assert_eq!(a, seeded_frame(11, &state));
        assert_ne!(a, seeded_frame(12, &state));
    }

    #[test]
    fn renders_continuously_with_readout() {
        let mut panel = SpectrumPanel::new();
        let mut canvas = canvas_for(&panel);
        let mut state = InstrumentState::default();
        let out = render(&mut panel, &mut canvas, &state, 0);
        assert!(out.reschedule);
        assert!(out.writeback.is_none());
        assert!(panel.readout().is_none());

        state.generator.enabled = true;
        render(&mut panel, &mut canvas, &state, 1);
        let readout = panel.readout().unwrap();
        assert!((readout.peak_hz - 1000.0).abs() < 20.0);
    }

    #[test]
    fn span_change_pulls_markers_in() {
        let mut panel = SpectrumPanel::new();
        let mut canvas = canvas_for(&panel);
        let mut state = InstrumentState::default();
        state.spectrum.range = 1500.0;
        render(&mut panel, &mut canvas, &state, 0);
        let freqs: Vec<f64> = panel.markers().markers().iter().map(|m| m.frequency_hz).collect();
        assert_eq!(freqs, vec![1000.0, 1500.0]);
    }

    #[test]
    fn silent_noise_floor_sits_on_its_row() {
        let mut panel = SpectrumPanel::new();
        let mut canvas = canvas_for(&panel);
        let state = InstrumentState::default();
        render(&mut panel, &mut canvas, &state, 0);
        // 0.85 * 600, away from labels and markers
        assert_eq!(canvas.pixel(300, 510), Some([CURVE.0, CURVE.1, CURVE.2]));
    }
}
