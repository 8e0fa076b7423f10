use crate::instruments::signal::{
    magnitude_to_db, spectrum_amplitude, spectrum_fundamental, spectrum_magnitude, SpectrumGeometry,
};
use crate::types::GeneratorConfig;

/// Pointer must land within this fraction of the span to pick a marker.
pub const HIT_TOLERANCE: f64 = 0.02;

const PALETTE: [&str; 4] = ["#f43f5e", "#a855f7", "#eab308", "#22d3ee"];

/// Draggable point bound to the spectrum's frequency axis.
#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    pub id: u32,
    pub frequency_hz: f64,
    pub color: String,
}

/// Live reading of a marker against the current curve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarkerReading {
    pub id: u32,
    pub frequency_hz: f64,
    pub level_db: f64,
}

/// Markers in insertion (display) order over `[0, max_span]`.
#[derive(Clone, Debug)]
pub struct MarkerSet {
    markers: Vec<Marker>,
    next_id: u32,
    max_span: f64,
}

impl MarkerSet {
    pub fn new(max_span: f64) -> Self {
        Self {
            markers: Vec::new(),
            next_id: 1,
            max_span: max_span.max(0.0),
        }
    }

    /// M1 on 1 kHz and M2 on 2 kHz, where the default generator puts its
    /// fundamental and second harmonic.
    pub fn with_defaults(max_span: f64) -> Self {
        let mut set = Self::new(max_span);
        set.add(1000.0);
        set.add(2000.0);
        set
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn max_span(&self) -> f64 {
        self.max_span
    }

    pub fn add(&mut self, frequency_hz: f64) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        let color = PALETTE[(id as usize - 1) % PALETTE.len()].to_owned();
        self.markers.push(Marker {
            id,
            frequency_hz: self.clamp(frequency_hz),
            color,
        });
        id
    }

    pub fn remove(&mut self, id: u32) -> bool {
        let before = self.markers.len();
        self.markers.retain(|m| m.id != id);
        self.markers.len() != before
    }

    /// Nearest marker within [`HIT_TOLERANCE`] of the span; earlier markers win ties.
    pub fn hit_test(&self, pointer_hz: f64) -> Option<&Marker> {
        let tolerance = self.max_span * HIT_TOLERANCE;
        self.markers
            .iter()
            .map(|m| (m, (m.frequency_hz - pointer_hz).abs()))
            .filter(|(_, d)| *d <= tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(m, _)| m)
    }

    /// Moves a marker to pixel column `pixel_x` of a `width`-pixel display.
    /// Returns the marker's new frequency.
    pub fn drag(&mut self, id: u32, pixel_x: f64, width: f64) -> Option<f64> {
        if width <= 0.0 || pixel_x.is_nan() {
            return None;
        }
        let span = self.max_span;
        let marker = self.markers.iter_mut().find(|m| m.id == id)?;
        marker.frequency_hz = pixel_x.clamp(0.0, width) / width * span;
        Some(marker.frequency_hz)
    }

    /// Rebinds the axis; markers outside the new span are pulled to its edge.
    pub fn set_span(&mut self, max_span: f64) {
        self.max_span = max_span.max(0.0);
        for i in 0..self.markers.len() {
            let f = self.clamp(self.markers[i].frequency_hz);
            self.markers[i].frequency_hz = f;
        }
    }

    /// Evaluates the curve (without noise floor jitter) under every marker.
    pub fn readings(&self, generator: &GeneratorConfig, geometry: &SpectrumGeometry) -> Vec<MarkerReading> {
        let fundamental = spectrum_fundamental(generator);
        let amplitude = spectrum_amplitude(generator);
        self.markers
            .iter()
            .map(|m| {
                let x = geometry.x_for_frequency(m.frequency_hz);
                let y = spectrum_magnitude(x, geometry, fundamental, amplitude, 0.0);
                MarkerReading {
                    id: m.id,
                    frequency_hz: m.frequency_hz,
                    level_db: magnitude_to_db(y, geometry.height),
                }
            })
            .collect()
    }

    fn clamp(&self, frequency_hz: f64) -> f64 {
        if frequency_hz.is_nan() {
            return 0.0;
        }
        frequency_hz.clamp(0.0, self.max_span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WaveformKind;

    const SPAN: f64 = 20_000.0;

    #[test]
    fn drag_maps_pixels_to_frequency() {
        let mut set = MarkerSet::with_defaults(SPAN);
        let width = 1000.0;
        for p in [-250.0, 0.0, 1.0, 333.3, 999.0, 1000.0, 5000.0, f64::INFINITY] {
            let f = set.drag(1, p, width).unwrap();
            let expected = p.clamp(0.0, width) / width * SPAN;
            assert_eq!(f, expected);
            assert!((0.0..=SPAN).contains(&f));
        }
        assert_eq!(set.drag(1, f64::NAN, width), None);
        assert!((0.0..=SPAN).contains(&set.markers()[0].frequency_hz));
        assert_eq!(set.drag(99, 10.0, width), None);
    }

    #[test]
    fn exact_hit_wins_over_neighbours() {
        let mut set = MarkerSet::new(SPAN);
        let a = set.add(5000.0);
        let b = set.add(5100.0);
        assert_eq!(set.hit_test(5100.0).map(|m| m.id), Some(b));
        assert_eq!(set.hit_test(5000.0).map(|m| m.id), Some(a));
        assert_eq!(set.hit_test(5040.0).map(|m| m.id), Some(a));
    }

    #[test]
    fn hit_test_respects_tolerance() {
        let mut set = MarkerSet::new(SPAN);
        set.add(10_000.0);
        // 2% of 20 kHz is 400 Hz
        assert!(set.hit_test(10_399.0).is_some());
        assert!(set.hit_test(10_401.0).is_none());
        assert!(set.hit_test(0.0).is_none());
    }

    #[test]
    fn duplicate_positions_pick_first_inserted() {
        let mut set = MarkerSet::new(SPAN);
        let first = set.add(3000.0);
        set.add(3000.0);
        assert_eq!(set.hit_test(3000.0).map(|m| m.id), Some(first));
    }

    #[test]
    fn ids_are_unique_after_removal() {
        let mut set = MarkerSet::with_defaults(SPAN);
        assert!(set.remove(1));
        assert!(!set.remove(1));
        let id = set.add(4000.0);
        assert_eq!(id, 3);
        let ids: Vec<u32> = set.markers().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn shrinking_span_clamps_markers() {
        let mut set = MarkerSet::new(SPAN);
        set.add(15_000.0);
        set.set_span(10_000.0);
        assert_eq!(set.markers()[0].frequency_hz, 10_000.0);
    }

    #[test]
    fn readings_follow_generator_frequency() {
        let set = MarkerSet::with_defaults(SPAN);
        let geometry = SpectrumGeometry {
            width: 1000.0,
            height: 600.0,
            span_hz: SPAN,
        };
        let mut generator = GeneratorConfig {
            enabled: true,
            waveform: WaveformKind::Sine,
            frequency: 1000.0,
            amplitude: 5.0,
            offset: 0.0,
        };
        let on_peak = set.readings(&generator, &geometry);
        generator.frequency = 7000.0;
        let off_peak = set.readings(&generator, &geometry);
        assert!(on_peak[0].level_db > off_peak[0].level_db + 10.0);
        // The noise floor sits at -68 dB on the 80 dB axis.
        assert!((off_peak[0].level_db + 68.0).abs() < 1e-6);
        generator.enabled = false;
        let silent = set.readings(&generator, &geometry);
        assert!((silent[1].level_db + 68.0).abs() < 1e-6);
    }
}
