// src/store.rs
use crate::types::*;

// Widget ranges. Every numeric update is clamped into these.
pub const FREQUENCY_RANGE: (f64, f64) = (1.0, 1_000_000.0);
pub const AMPLITUDE_RANGE: (f64, f64) = (0.0, 10.0);
pub const OFFSET_RANGE: (f64, f64) = (-5.0, 5.0);
pub const DUTY_RANGE: (f64, f64) = (0.0, 100.0);
pub const DC_RANGE: (f64, f64) = (-5.0, 5.0);
pub const TRIGGER_LEVEL_RANGE: (f64, f64) = (-5.0, 5.0);
pub const TIMEBASE_RANGE: (f64, f64) = (0.0001, 0.02);
pub const MIN_CHANNEL_SCALE: f64 = 0.001;
pub const MIN_SPAN_HZ: f64 = 1.0;
pub const NETWORK_POINTS_RANGE: (u32, u32) = (2, 10_000);

/// Owns the instrument configuration. Mutated only through [`ParameterStore::apply`].
#[derive(Debug, Default)]
pub struct ParameterStore {
    state: InstrumentState,
}

impl ParameterStore {
    pub fn new(state: InstrumentState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &InstrumentState {
        &self.state
    }

    pub fn snapshot_json(&self) -> String {
        serde_json::to_string(&self.state).unwrap_or_else(|e| {
            log::warn!("failed to serialise instrument state: {e}");
            String::from("{}")
        })
    }

    /// Shallow merge of one slice patch. Returns whether anything changed.
    pub fn apply(&mut self, update: StoreUpdate) -> bool {
        let before = self.state.clone();
        match update {
            StoreUpdate::Scope(p) => apply_scope(&mut self.state.scope, p),
            StoreUpdate::Generator(p) => apply_generator(&mut self.state.generator, p),
            StoreUpdate::Pwm(p) => {
                let pwm = &mut self.state.pwm;
                set_bool(&mut pwm.enabled, p.enabled);
                set_clamped(&mut pwm.frequency, p.frequency, FREQUENCY_RANGE);
                set_clamped(&mut pwm.duty_cycle, p.duty_cycle, DUTY_RANGE);
            }
            StoreUpdate::Dc(p) => set_clamped(&mut self.state.dc.voltage, p.voltage, DC_RANGE),
            StoreUpdate::Logic(p) => apply_logic(&mut self.state.logic, p),
            StoreUpdate::Spectrum(p) => {
                let spec = &mut self.state.spectrum;
                set_bool(&mut spec.enabled, p.enabled);
                set_clamped(&mut spec.range, p.range, (MIN_SPAN_HZ, f64::MAX));
                if let Some(window) = p.window {
                    spec.window = window;
                }
            }
            StoreUpdate::Network(p) => apply_network(&mut self.state.network, p),
        }
        self.state != before
    }
}

/// Free-text numeric entry. Anything that is not a finite number is ignored.
pub fn parse_numeric(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn set_bool(target: &mut bool, value: Option<bool>) {
    if let Some(v) = value {
        *target = v;
    }
}

fn set_clamped(target: &mut f64, value: Option<f64>, (min, max): (f64, f64)) {
    if let Some(v) = value.filter(|v| v.is_finite()) {
        *target = v.clamp(min, max);
    }
}

fn apply_trigger(trigger: &mut TriggerConfig, p: TriggerPatch) {
    if let Some(mode) = p.mode {
        trigger.mode = mode;
        match mode {
            TriggerMode::Auto => trigger.is_armed = false,
            // Selecting SINGLE is an arm request unless told otherwise.
            TriggerMode::Single => trigger.is_armed = p.is_armed.unwrap_or(true),
        }
    } else if let Some(armed) = p.is_armed {
        trigger.is_armed = armed && trigger.mode == TriggerMode::Single;
    }
    set_clamped(&mut trigger.level, p.level, TRIGGER_LEVEL_RANGE);
}

fn apply_channel(channel: &mut ChannelConfig, p: ChannelPatch) {
    set_bool(&mut channel.enabled, p.enabled);
    set_clamped(&mut channel.scale, p.scale, (MIN_CHANNEL_SCALE, f64::MAX));
    set_clamped(&mut channel.offset, p.offset, OFFSET_RANGE);
    if let Some(color) = p.color {
        channel.color = color;
    }
}

fn apply_scope(scope: &mut ScopeConfig, p: ScopePatch) {
    if let Some(ch) = p.ch1 {
        apply_channel(&mut scope.ch1, ch);
    }
    if let Some(ch) = p.ch2 {
        apply_channel(&mut scope.ch2, ch);
    }
    set_clamped(&mut scope.timebase, p.timebase, TIMEBASE_RANGE);
    apply_trigger(&mut scope.trigger, p.trigger);
}

fn apply_generator(gen: &mut GeneratorConfig, p: GeneratorPatch) {
    set_bool(&mut gen.enabled, p.enabled);
    if let Some(waveform) = p.waveform {
        gen.waveform = waveform;
    }
    set_clamped(&mut gen.frequency, p.frequency, FREQUENCY_RANGE);
    set_clamped(&mut gen.amplitude, p.amplitude, AMPLITUDE_RANGE);
    set_clamped(&mut gen.offset, p.offset, OFFSET_RANGE);
}

fn apply_logic(logic: &mut LogicAnalyzerConfig, p: LogicPatch) {
    set_bool(&mut logic.enabled, p.enabled);
    if let Some((index, enabled)) = p.channel {
        if let Some(slot) = logic.channels.get_mut(index) {
            *slot = enabled;
        }
    }
    set_clamped(&mut logic.sample_rate, p.sample_rate, (1.0, f64::MAX));
    apply_trigger(&mut logic.trigger, p.trigger);
}

fn apply_network(net: &mut NetworkConfig, p: NetworkPatch) {
    set_clamped(&mut net.start_freq, p.start_freq, FREQUENCY_RANGE);
    set_clamped(&mut net.stop_freq, p.stop_freq, FREQUENCY_RANGE);
    if net.stop_freq <= net.start_freq {
        // Keep the sweep non-empty: move whichever edge was not just edited,
        // and the stop edge as well when start is already at the floor.
        if p.stop_freq.is_some() && p.start_freq.is_none() {
            net.start_freq = (net.stop_freq / 10.0).max(FREQUENCY_RANGE.0);
        }
        if net.stop_freq <= net.start_freq {
            net.stop_freq = (net.start_freq * 10.0).min(FREQUENCY_RANGE.1);
        }
        if net.stop_freq <= net.start_freq {
            net.start_freq = net.stop_freq / 10.0;
        }
    }
    if let Some(points) = p.points {
        net.points = points.clamp(NETWORK_POINTS_RANGE.0, NETWORK_POINTS_RANGE.1);
    }
    set_bool(&mut net.running, p.running);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_update_leaves_other_fields_alone() {
        let mut store = ParameterStore::default();
        let changed = store.apply(
            GeneratorPatch {
                amplitude: Some(2.5),
                ..Default::default()
            }
            .into(),
        );
        assert!(changed);
        let gen = store.state().generator;
        assert_eq!(gen.amplitude, 2.5);
        assert_eq!(gen.frequency, 1000.0);
        assert_eq!(gen.waveform, WaveformKind::Sine);
    }

    #[test]
    fn numeric_updates_are_clamped() {
        let mut store = ParameterStore::default();
        store.apply(
            GeneratorPatch {
                frequency: Some(0.0),
                amplitude: Some(42.0),
                offset: Some(-9.0),
                ..Default::default()
            }
            .into(),
        );
        store.apply(PwmPatch {
            duty_cycle: Some(140.0),
            ..Default::default()
        }
        .into());
        let state = store.state();
        assert_eq!(state.generator.frequency, FREQUENCY_RANGE.0);
        assert_eq!(state.generator.amplitude, AMPLITUDE_RANGE.1);
        assert_eq!(state.generator.offset, OFFSET_RANGE.0);
        assert_eq!(state.pwm.duty_cycle, 100.0);
    }

    #[test]
    fn non_finite_values_are_dropped() {
        let mut store = ParameterStore::default();
        let changed = store.apply(
            DcPatch {
                voltage: Some(f64::NAN),
            }
            .into(),
        );
        assert!(!changed);
        assert_eq!(store.state().dc.voltage, 0.0);
    }

    #[test]
    fn selecting_single_arms_and_auto_disarms() {
        let mut store = ParameterStore::default();
        store.apply(
            ScopePatch {
                trigger: TriggerPatch {
                    mode: Some(TriggerMode::Single),
                    ..Default::default()
                },
                ..Default::default()
            }
            .into(),
        );
        assert!(store.state().scope.trigger.is_armed);
        store.apply(
            ScopePatch {
                trigger: TriggerPatch {
                    mode: Some(TriggerMode::Auto),
                    ..Default::default()
                },
                ..Default::default()
            }
            .into(),
        );
        assert!(!store.state().scope.trigger.is_armed);
        // Arming outside SINGLE has no effect.
        store.apply(
            ScopePatch {
                trigger: TriggerPatch {
                    is_armed: Some(true),
                    ..Default::default()
                },
                ..Default::default()
            }
            .into(),
        );
        assert!(!store.state().scope.trigger.is_armed);
    }

    #[test]
    fn network_sweep_stays_ordered() {
        let mut store = ParameterStore::default();
        store.apply(
            NetworkPatch {
                start_freq: Some(500_000.0),
                ..Default::default()
            }
            .into(),
        );
        let net = store.state().network;
        assert!(net.stop_freq > net.start_freq);
        store.apply(
            NetworkPatch {
                stop_freq: Some(20.0),
                ..Default::default()
            }
            .into(),
        );
        let net = store.state().network;
        assert_eq!(net.stop_freq, 20.0);
        assert!(net.start_freq < net.stop_freq);

        // Stop pulled down to the range floor.
        store.apply(
            NetworkPatch {
                stop_freq: Some(1.0),
                ..Default::default()
            }
            .into(),
        );
        let net = store.state().network;
        assert_eq!(net.start_freq, 1.0);
        assert_eq!(net.stop_freq, 10.0);

        // Start pushed to the ceiling.
        store.apply(
            NetworkPatch {
                start_freq: Some(5_000_000.0),
                ..Default::default()
            }
            .into(),
        );
        let net = store.state().network;
        assert!(net.stop_freq > net.start_freq);
        assert_eq!(net.stop_freq, FREQUENCY_RANGE.1);
    }

    #[test]
    fn parse_numeric_ignores_garbage() {
        assert_eq!(parse_numeric(" 12.5 "), Some(12.5));
        assert_eq!(parse_numeric("1e3"), Some(1000.0));
        assert_eq!(parse_numeric("abc"), None);
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("NaN"), None);
    }

    #[test]
    fn snapshot_is_json() {
        let store = ParameterStore::default();
        let json: serde_json::Value = serde_json::from_str(&store.snapshot_json()).unwrap();
        assert_eq!(json["generator"]["waveform"], "SINE");
        assert_eq!(json["scope"]["trigger"]["mode"], "AUTO");
    }
}
