use std::f64::consts::TAU;

use rustfft::{num_complex::Complex64, FftPlanner};

use crate::instruments::signal::generator_volts;
use crate::types::{GeneratorConfig, SpectrumConfig, SpectrumWindow};

/// Samples per readout FFT.
pub const READOUT_SAMPLES: usize = 4096;
/// Level readout reference, volts peak.
pub const REFERENCE_PEAK_VOLTS: f64 = 5.0;
const HARMONIC_RANGE: std::ops::RangeInclusive<usize> = 2..=5;
const LOBE_BINS: usize = 3;

/// Numbers shown in the spectrum readout box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpectrumReadout {
    pub peak_hz: f64,
    pub level_db: f64,
    pub thd_percent: f64,
}

pub fn window_coefficients(window: SpectrumWindow, n: usize) -> Vec<f64> {
    let denom = (n.max(2) - 1) as f64;
    (0..n)
        .map(|i| {
            let c = (TAU * i as f64 / denom).cos();
            match window {
                SpectrumWindow::Rect => 1.0,
                SpectrumWindow::Hanning => 0.5 - 0.5 * c,
                SpectrumWindow::Hamming => 0.54 - 0.46 * c,
            }
        })
        .collect()
}

/// Windowed FFT of the generator output sampled at four times the span.
/// The DC offset is removed first. `None` while the generator is off.
pub fn compute_readout(generator: &GeneratorConfig, spectrum: &SpectrumConfig) -> Option<SpectrumReadout> {
    if !generator.enabled || !(spectrum.range > 0.0) {
        return None;
    }
    let n = READOUT_SAMPLES;
    let sample_rate = 4.0 * spectrum.range;
    let window = window_coefficients(spectrum.window, n);
    let window_energy: f64 = window.iter().map(|w| w * w).sum();

    let mut buffer: Vec<Complex64> = window
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let v = generator_volts(generator, i as f64 / sample_rate) - generator.offset;
            Complex64::new(v * w, 0.0)
        })
        .collect();
    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(n).process(&mut buffer);

    let power: Vec<f64> = buffer.iter().take(n / 2).map(|c| c.norm_sqr()).collect();
    let bin_hz = sample_rate / n as f64;

    let peak_bin = (LOBE_BINS + 1..power.len())
        .max_by(|&a, &b| power[a].total_cmp(&power[b]))?;
    let fundamental = lobe(&power, peak_bin);
    if fundamental.energy <= f64::EPSILON {
        return None;
    }
    let amplitude = |energy: f64| 2.0 * (energy / (n as f64 * window_energy)).sqrt();
    let fundamental_amplitude = amplitude(fundamental.energy);
    let peak_hz = fundamental.centroid * bin_hz;

    let nyquist_bin = power.len() - LOBE_BINS - 1;
    let harmonic_energy: f64 = HARMONIC_RANGE
        .map(|h| (fundamental.centroid * h as f64).round() as usize)
        .take_while(|&bin| bin <= nyquist_bin)
        .map(|bin| amplitude(lobe(&power, bin).energy).powi(2))
        .sum();

    Some(SpectrumReadout {
        peak_hz,
        level_db: 20.0 * (fundamental_amplitude / REFERENCE_PEAK_VOLTS).log10(),
        thd_percent: harmonic_energy.sqrt() / fundamental_amplitude * 100.0,
    })
}

struct Lobe {
    energy: f64,
    centroid: f64,
}

fn lobe(power: &[f64], center: usize) -> Lobe {
    let lo = center.saturating_sub(LOBE_BINS);
    let hi = (center + LOBE_BINS).min(power.len() - 1);
    let energy: f64 = power[lo..=hi].iter().sum();
    let weighted: f64 = (lo..=hi).map(|k| k as f64 * power[k]).sum();
    Lobe {
        energy,
        centroid: if energy > 0.0 { weighted / energy } else { center as f64 },
    }
}

/// Keeps the last readout until the generator or spectrum settings change.
#[derive(Debug, Default)]
pub struct ReadoutCache {
    key: Option<(GeneratorConfig, SpectrumConfig)>,
    value: Option<SpectrumReadout>,
}

impl ReadoutCache {
    pub fn get(&mut self, generator: &GeneratorConfig, spectrum: &SpectrumConfig) -> Option<SpectrumReadout> {
        let key = (*generator, *spectrum);
        if self.key != Some(key) {
            self.value = compute_readout(generator, spectrum);
            self.key = Some(key);
            log::debug!("spectrum readout recomputed: {:?}", self.value);
        }
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WaveformKind;

    fn generator(waveform: WaveformKind) -> GeneratorConfig {
        GeneratorConfig {
            enabled: true,
            waveform,
            frequency: 1000.0,
            amplitude: 5.0,
            offset: 0.0,
        }
    }

    #[test]
    fn clean_sine_reads_fundamental() {
        let readout = compute_readout(&generator(WaveformKind::Sine), &SpectrumConfig::default()).unwrap();
        let bin_hz = 4.0 * 20_000.0 / READOUT_SAMPLES as f64;
        assert!((readout.peak_hz - 1000.0).abs() < bin_hz, "{readout:?}");
        // 5 Vpp is 2.5 V peak, half the reference
        assert!((readout.level_db + 6.02).abs() < 0.5, "{readout:?}");
        assert!(readout.thd_percent < 1.0, "{readout:?}");
    }

    #[test]
    fn square_wave_is_distorted() {
        let readout = compute_readout(&generator(WaveformKind::Square), &SpectrumConfig::default()).unwrap();
        assert!(readout.thd_percent > 30.0, "{readout:?}");
    }

    #[test]
    fn offset_does_not_move_the_peak() {
        let mut cfg = generator(WaveformKind::Sine);
        cfg.offset = 3.0;
        let readout = compute_readout(&cfg, &SpectrumConfig::default()).unwrap();
        assert!((readout.peak_hz - 1000.0).abs() < 20.0);
    }

    #[test]
    fn disabled_generator_has_no_readout() {
        let mut cfg = generator(WaveformKind::Sine);
        cfg.enabled = false;
        assert!(compute_readout(&cfg, &SpectrumConfig::default()).is_none());
    }

    #[test]
    fn cache_tracks_settings() {
        let mut cache = ReadoutCache::default();
        let mut cfg = generator(WaveformKind::Sine);
        let spectrum = SpectrumConfig::default();
        let first = cache.get(&cfg, &spectrum).unwrap();
        assert_eq!(cache.get(&cfg, &spectrum), Some(first));
        cfg.frequency = 3000.0;
        let moved = cache.get(&cfg, &spectrum).unwrap();
        assert!((moved.peak_hz - 3000.0).abs() < 20.0);
    }

    #[test]
    fn windows_have_expected_shape() {
        let hann = window_coefficients(SpectrumWindow::Hanning, 9);
        assert!(hann[0].abs() < 1e-12);
        assert!((hann[4] - 1.0).abs() < 1e-12);
        let hamming = window_coefficients(SpectrumWindow::Hamming, 9);
        assert!((hamming[0] - 0.08).abs() < 1e-12);
        assert!(window_coefficients(SpectrumWindow::Rect, 4).iter().all(|w| *w == 1.0));
    }
}
