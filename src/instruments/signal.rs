//! Stateless signal model shared by every panel.
//!
//! All functions are pure: the same inputs always produce the same sample,
//! and randomness (the spectrum noise floor) is passed in by the caller.
use std::f64::consts::{PI, TAU};

use crate::types::{GeneratorConfig, WaveformKind};

/// Frequency of the scope's built-in reference signal.
pub const REFERENCE_HZ: f64 = 1000.0;
/// Peak amplitude (volts) of the scope's reference signal.
pub const REFERENCE_AMPLITUDE: f64 = 2.0;

/// Noise floor position as a fraction of the spectrum canvas height.
pub const NOISE_FLOOR_RATIO: f64 = 0.85;
/// Peak-to-peak jitter of the noise floor in pixels.
pub const NOISE_JITTER_PX: f64 = 5.0;
/// Vertical range of the spectrum display.
pub const SPECTRUM_DB_RANGE: f64 = 80.0;

const FUNDAMENTAL_SPREAD: f64 = 80.0;
const SECOND_HARMONIC_SPREAD: f64 = 25.0;
const THIRD_HARMONIC_SPREAD: f64 = 16.0;

/// Normalised waveform value in [-1, 1]. `t + phase` is in radians, period 2π.
pub fn sample(kind: WaveformKind, t: f64, phase: f64) -> f64 {
    let theta = t + phase;
    match kind {
        WaveformKind::Sine => theta.sin(),
        WaveformKind::Square => {
            if theta.sin() >= 0.0 {
                1.0
            } else {
                -1.0
            }
        }
        WaveformKind::Triangle => theta.sin().asin() * 2.0 / PI,
        WaveformKind::Sawtooth => {
            let u = theta / TAU;
            2.0 * (u - (0.5 + u).floor())
        }
    }
}

/// Instantaneous generator output in volts at `t_seconds`.
pub fn generator_volts(config: &GeneratorConfig, t_seconds: f64) -> f64 {
    let theta = TAU * config.frequency * t_seconds;
    config.amplitude * 0.5 * sample(config.waveform, theta, 0.0) + config.offset
}

/// The scope's reference sine in volts. Both arguments are in seconds.
pub fn scope_reference(t_seconds: f64, phase_seconds: f64) -> f64 {
    REFERENCE_AMPLITUDE * sample(WaveformKind::Sine, TAU * REFERENCE_HZ * (t_seconds + phase_seconds), 0.0)
}

/// Phase (seconds) that puts the reference sine's crossing of `level` at the left edge.
/// Levels the reference never reaches lock to zero.
pub fn auto_lock_phase(level: f64) -> f64 {
    let target = level / REFERENCE_AMPLITUDE;
    if target.abs() <= 1.0 {
        target.asin() / (TAU * REFERENCE_HZ)
    } else {
        0.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpectrumGeometry {
    pub width: f64,
    pub height: f64,
    pub span_hz: f64,
}

impl SpectrumGeometry {
    pub fn x_for_frequency(&self, hz: f64) -> f64 {
        hz / self.span_hz * self.width
    }

    pub fn frequency_for_x(&self, x: f64) -> f64 {
        x / self.width * self.span_hz
    }
}

/// Peak height scale used by the spectrum display for a generator setting.
pub fn spectrum_amplitude(config: &GeneratorConfig) -> f64 {
    if config.enabled {
        config.amplitude * 10.0
    } else {
        0.0
    }
}

/// Fundamental shown by the spectrum display; zero when the generator is off.
pub fn spectrum_fundamental(config: &GeneratorConfig) -> f64 {
    if config.enabled {
        config.frequency
    } else {
        0.0
    }
}

/// Pixel row of the spectrum curve at column `x`. Smaller means stronger.
///
/// `noise` is a unit random value in [0, 1) scaled to the noise floor jitter.
/// A non-positive fundamental yields the bare noise floor.
pub fn spectrum_magnitude(
    x: f64,
    geometry: &SpectrumGeometry,
    fundamental_hz: f64,
    amplitude: f64,
    noise: f64,
) -> f64 {
    let mut y = geometry.height * NOISE_FLOOR_RATIO + noise * NOISE_JITTER_PX;
    if fundamental_hz > 0.0 && geometry.span_hz > 0.0 {
        let lobes = [
            (1.0, 5.0, FUNDAMENTAL_SPREAD),
            (2.0, 1.5, SECOND_HARMONIC_SPREAD),
            (3.0, 0.6, THIRD_HARMONIC_SPREAD),
        ];
        for (harmonic, weight, spread) in lobes {
            let peak_x = geometry.x_for_frequency(fundamental_hz * harmonic);
            let d = x - peak_x;
            y -= amplitude * weight * (-(d * d) / spread).exp();
        }
    }
    y.clamp(0.0, geometry.height)
}

/// Converts a spectrum pixel row to dB on the 0 dB (top) .. -80 dB (bottom) axis.
pub fn magnitude_to_db(y: f64, height: f64) -> f64 {
    -(y / height) * SPECTRUM_DB_RANGE
}

/// Logic level of channel `channel` at column `x`. Channels cycle 1x..4x the
/// base clock of ten periods per screen; high for the first half period.
pub fn logic_level(x: f64, offset: f64, channel: usize, width: f64) -> bool {
    let base_period = width / 10.0;
    let period = base_period / ((channel % 4) + 1) as f64;
    (x + offset).rem_euclid(period) < period / 2.0
}

/// Simulated low-pass response at normalised sweep position `nx` in [0, 1].
/// Returns (gain_row, phase_row) as fractions of the canvas height.
pub fn network_response(nx: f64) -> (f64, f64) {
    let gain = if nx < 0.4 { 0.2 } else { 0.2 + (nx - 0.4) * 0.8 };
    let phase = if nx < 0.3 { 0.3 } else { nx * 0.9 };
    (0.2 + gain * 0.6, 0.1 + phase * 0.8)
}

/// Row of the generator's static preview at column `x`; two periods span the width.
/// Full scale is 10 Vpp, so the swing is `amplitude / 10` of 80% of the height.
pub fn generator_preview_y(x: f64, width: f64, height: f64, config: &GeneratorConfig) -> f64 {
    let t = x / width * 2.0 * TAU;
    let value = sample(config.waveform, t, 0.0);
    let vertical_scale = (config.amplitude / 10.0) * (height * 0.4);
    let vertical_offset = config.offset * (height / 10.0);
    height / 2.0 - value * vertical_scale - vertical_offset
}

/// Two-period PWM outline for a preview plot, y pointing up.
pub fn pwm_preview_points(duty_cycle: f64, width: f64, height: f64, padding: f64) -> Vec<[f64; 2]> {
    let period = width / 2.0;
    let pulse = duty_cycle.clamp(0.0, 100.0) / 100.0 * period;
    let (low, high) = (padding, height - padding);
    let mut points = Vec::with_capacity(10);
    for cycle in 0..2 {
        let start = cycle as f64 * period;
        points.push([start, low]);
        points.push([start, high]);
        points.push([start + pulse, high]);
        points.push([start + pulse, low]);
        points.push([start + period, low]);
    }
    points
}
