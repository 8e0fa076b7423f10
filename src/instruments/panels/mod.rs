// src/instruments/panels/mod.rs
pub mod generator;
pub mod logic;
pub mod network;
pub mod scope;
pub mod spectrum;

pub use generator::GeneratorPanel;
pub use logic::LogicPanel;
pub use network::NetworkPanel;
pub use scope::ScopePanel;
pub use spectrum::SpectrumPanel;

use plotters::style::RGBColor;

use crate::instruments::canvas::Canvas;
use crate::instruments::driver::FrameOutcome;
use crate::instruments::error::BenchError;
use crate::instruments::noise::NoiseSource;
use crate::types::{InstrumentState, PanelKind, StoreUpdate};

// Shared bench palette
pub(crate) const BACKGROUND: RGBColor = RGBColor(2, 6, 23);
pub(crate) const GRID: RGBColor = RGBColor(30, 41, 59);
pub(crate) const TEXT: RGBColor = RGBColor(148, 163, 184);
pub(crate) const DIM: RGBColor = RGBColor(71, 85, 105);
pub(crate) const RED: RGBColor = RGBColor(239, 68, 68);
pub(crate) const GREEN: RGBColor = RGBColor(34, 197, 94);
pub(crate) const AMBER: RGBColor = RGBColor(245, 158, 11);

/// Everything one frame may read, plus the surface it draws on.
pub struct FrameContext<'a> {
    pub state: &'a InstrumentState,
    pub canvas: &'a mut Canvas,
    pub noise: &'a mut dyn NoiseSource,
    /// Frames rendered on the bench so far; drives pulsing overlays.
    pub frame_index: u64,
}

/// A virtual instrument with its own canvas and render loop.
///
/// `Patch` is the only kind of update a frame can hand back, so a panel can
/// never write outside its own slice of the store.
pub trait Panel {
    type Patch: Into<StoreUpdate>;

    fn kind(&self) -> PanelKind;

    fn canvas_size(&self) -> (u32, u32);

    fn render_frame(&mut self, ctx: &mut FrameContext<'_>) -> Result<FrameOutcome<Self::Patch>, BenchError>;
}

/// `950Hz`, `10kHz`, `1.25kHz`, `2.5MHz`.
pub fn format_hz(hz: f64) -> String {
    let (value, unit) = if hz.abs() >= 1e6 {
        (hz / 1e6, "MHz")
    } else if hz.abs() >= 1e3 {
        (hz / 1e3, "kHz")
    } else {
        (hz, "Hz")
    };
    if (value - value.round()).abs() < 1e-9 {
        format!("{}{unit}", value.round() as i64)
    } else {
        let text = format!("{value:.2}");
        format!("{}{unit}", text.trim_end_matches('0').trim_end_matches('.'))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::instruments::noise::SilentNoise;

    /// Renders one frame of `panel` into `canvas` against `state`.
    pub fn render<P: Panel>(
        panel: &mut P,
        canvas: &mut Canvas,
        state: &InstrumentState,
        frame_index: u64,
    ) -> FrameOutcome<P::Patch> {
        let mut noise = SilentNoise;
        let mut ctx = FrameContext {
            state,
            canvas,
            noise: &mut noise,
            frame_index,
        };
        panel.render_frame(&mut ctx).unwrap()
    }

    pub fn canvas_for<P: Panel>(panel: &P) -> Canvas {
        let (w, h) = panel.canvas_size();
        Canvas::new(w, h).unwrap()
    }
}
