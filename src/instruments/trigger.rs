//! Per-panel trigger/capture state machine.
//!
//! The machine owns the running phase accumulator and the frozen capture; the
//! parameter store owns `mode`/`is_armed`. Each frame the render loop calls
//! [`TriggerMachine::advance`] with the store's view and gets back the phase to
//! draw plus whether this frame fired the trigger.
use crate::types::{TriggerConfig, TriggerMode, TriggerPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    FreeRun,
    Armed,
    Captured,
}

impl CaptureState {
    pub fn label(&self) -> &'static str {
        match self {
            CaptureState::FreeRun => "FREE RUN",
            CaptureState::Armed => "WAITING FOR TRIGGER",
            CaptureState::Captured => "TRIGGERED / CAPTURED",
        }
    }
}

/// Phase frozen at the instant of trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureResult {
    pub phase: f64,
}

/// What the render loop does once a capture is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldPolicy {
    /// Keep redrawing the frozen phase every frame.
    Redraw,
    /// Stop requesting frames until re-armed.
    Halt,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerTiming {
    /// Accumulator advance per armed frame.
    pub step: f64,
    /// Detection fires once the accumulator exceeds this.
    pub threshold: f64,
}

/// Scope: seconds of signal time.
pub const SCOPE_TIMING: TriggerTiming = TriggerTiming {
    step: 0.0002,
    threshold: 0.005,
};

/// Logic analyzer: pixels of scroll; fires on the first armed frame.
pub const LOGIC_TIMING: TriggerTiming = TriggerTiming {
    step: 2.0,
    threshold: 0.0,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStep {
    pub state: CaptureState,
    /// Phase to feed the signal model this frame.
    pub phase: f64,
    /// True on the single frame where ARMED became CAPTURED.
    pub fired: bool,
    /// The render loop should not reschedule after this frame.
    pub hold: bool,
}

#[derive(Debug, Clone)]
pub struct TriggerMachine {
    state: CaptureState,
    running_phase: f64,
    capture: Option<CaptureResult>,
    timing: TriggerTiming,
    policy: HoldPolicy,
}

impl TriggerMachine {
    pub fn new(timing: TriggerTiming, policy: HoldPolicy) -> Self {
        Self {
            state: CaptureState::FreeRun,
            running_phase: 0.0,
            capture: None,
            timing,
            policy,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn capture(&self) -> Option<CaptureResult> {
        self.capture
    }

    pub fn running_phase(&self) -> f64 {
        self.running_phase
    }

    /// User picked AUTO. Returns the store patch to queue alongside.
    pub fn select_auto(&mut self) -> TriggerPatch {
        self.enter(CaptureState::FreeRun);
        TriggerPatch {
            mode: Some(TriggerMode::Auto),
            is_armed: Some(false),
            ..Default::default()
        }
    }

    /// User picked SINGLE (arm or re-arm). Returns the store patch to queue alongside.
    pub fn arm(&mut self) -> TriggerPatch {
        self.enter(CaptureState::Armed);
        TriggerPatch {
            mode: Some(TriggerMode::Single),
            is_armed: Some(true),
            ..Default::default()
        }
    }

    pub fn advance(&mut self, config: &TriggerConfig) -> FrameStep {
        self.reconcile(config);
        match self.state {
            CaptureState::FreeRun => FrameStep {
                state: CaptureState::FreeRun,
                phase: 0.0,
                fired: false,
                hold: false,
            },
            CaptureState::Armed => {
                self.running_phase += self.timing.step;
                if self.running_phase > self.timing.threshold {
                    let capture = CaptureResult {
                        phase: self.running_phase,
                    };
                    self.capture = Some(capture);
                    self.state = CaptureState::Captured;
                    log::info!("trigger captured at phase {:.6}", capture.phase);
                    FrameStep {
                        state: CaptureState::Captured,
                        phase: capture.phase,
                        fired: true,
                        hold: self.policy == HoldPolicy::Halt,
                    }
                } else {
                    FrameStep {
                        state: CaptureState::Armed,
                        phase: self.running_phase,
                        fired: false,
                        hold: false,
                    }
                }
            }
            CaptureState::Captured => FrameStep {
                state: CaptureState::Captured,
                phase: self.capture.map(|c| c.phase).unwrap_or(0.0),
                fired: false,
                hold: self.policy == HoldPolicy::Halt,
            },
        }
    }

    // Follow mode changes made directly in the store. Leaving CAPTURED needs an
    // explicit `arm`, so a stale `is_armed` read can never fire twice.
    fn reconcile(&mut self, config: &TriggerConfig) {
        match (config.mode, self.state) {
            (TriggerMode::Auto, CaptureState::FreeRun) => {}
            (TriggerMode::Auto, _) => self.enter(CaptureState::FreeRun),
            (TriggerMode::Single, CaptureState::FreeRun) => {
                if config.is_armed {
                    self.enter(CaptureState::Armed);
                } else {
                    // SINGLE without an arm: hold the origin.
                    self.enter(CaptureState::Captured);
                    self.capture = Some(CaptureResult { phase: 0.0 });
                }
            }
            (TriggerMode::Single, _) => {}
        }
    }

    fn enter(&mut self, state: CaptureState) {
        if self.state != state {
            log::debug!("trigger state {:?} -> {:?}", self.state, state);
        }
        self.state = state;
        self.running_phase = 0.0;
        self.capture = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(config: &mut TriggerConfig, patch: TriggerPatch) {
        if let Some(mode) = patch.mode {
            config.mode = mode;
        }
        if let Some(armed) = patch.is_armed {
            config.is_armed = armed;
        }
    }

    #[test]
    fn starts_free_running() {
        let mut machine = TriggerMachine::new(SCOPE_TIMING, HoldPolicy::Redraw);
        let step = machine.advance(&TriggerConfig::default());
        assert_eq!(step.state, CaptureState::FreeRun);
        assert_eq!(step.phase, 0.0);
        assert!(!step.fired);
    }

    #[test]
    fn arming_clears_previous_capture() {
        let mut machine = TriggerMachine::new(SCOPE_TIMING, HoldPolicy::Redraw);
        let mut config = TriggerConfig::default();
        apply(&mut config, machine.arm());
        for _ in 0..100 {
            if machine.advance(&config).fired {
                apply(&mut config, TriggerPatch::disarm());
            }
        }
        assert!(machine.capture().is_some());

        let patch = machine.arm();
        apply(&mut config, patch);
        assert_eq!(machine.state(), CaptureState::Armed);
        assert!(machine.capture().is_none());
        assert_eq!(machine.running_phase(), 0.0);
        assert!(config.is_armed);
        assert_eq!(config.mode, TriggerMode::Single);
    }

    #[test]
    fn armed_fires_exactly_once() {
        let mut machine = TriggerMachine::new(SCOPE_TIMING, HoldPolicy::Redraw);
        let mut config = TriggerConfig::default();
        apply(&mut config, machine.arm());
        let mut fired = 0;
        let mut disarm_writes = 0;
        for _ in 0..500 {
            let step = machine.advance(&config);
            if step.fired {
                fired += 1;
                disarm_writes += 1;
                apply(&mut config, TriggerPatch::disarm());
            }
        }
        assert_eq!(fired, 1);
        assert_eq!(disarm_writes, 1);
        assert!(!config.is_armed);
        let capture = machine.capture().unwrap();
        assert!(capture.phase > SCOPE_TIMING.threshold);
        assert!(capture.phase <= SCOPE_TIMING.threshold + SCOPE_TIMING.step + 1e-12);
    }

    #[test]
    fn stale_armed_flag_does_not_refire() {
        let mut machine = TriggerMachine::new(SCOPE_TIMING, HoldPolicy::Redraw);
        let mut config = TriggerConfig::default();
        apply(&mut config, machine.arm());
        let mut fired = 0;
        // Write-back never lands: the store keeps reporting armed.
        for _ in 0..200 {
            if machine.advance(&config).fired {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn captured_frames_are_identical() {
        let mut machine = TriggerMachine::new(SCOPE_TIMING, HoldPolicy::Redraw);
        let mut config = TriggerConfig::default();
        apply(&mut config, machine.arm());
        let first = loop {
            let step = machine.advance(&config);
            if step.fired {
                apply(&mut config, TriggerPatch::disarm());
                break step;
            }
        };
        for _ in 0..50 {
            let step = machine.advance(&config);
            assert_eq!(step.state, CaptureState::Captured);
            assert_eq!(step.phase, first.phase);
            assert!(!step.fired);
            assert!(!step.hold);
        }
    }

    #[test]
    fn auto_discards_capture_and_resets_phase() {
        let mut machine = TriggerMachine::new(SCOPE_TIMING, HoldPolicy::Redraw);
        let mut config = TriggerConfig::default();
        apply(&mut config, machine.arm());
        for _ in 0..100 {
            if machine.advance(&config).fired {
                apply(&mut config, TriggerPatch::disarm());
            }
        }
        apply(&mut config, machine.select_auto());
        assert_eq!(machine.state(), CaptureState::FreeRun);
        assert!(machine.capture().is_none());
        assert_eq!(machine.running_phase(), 0.0);
        let step = machine.advance(&config);
        assert_eq!(step.phase, 0.0);
        assert!(!config.is_armed);
    }

    #[test]
    fn store_side_mode_change_is_followed() {
        let mut machine = TriggerMachine::new(SCOPE_TIMING, HoldPolicy::Redraw);
        let armed = TriggerConfig {
            mode: TriggerMode::Single,
            level: 0.0,
            is_armed: true,
        };
        assert_eq!(machine.advance(&armed).state, CaptureState::Armed);
        let auto = TriggerConfig::default();
        assert_eq!(machine.advance(&auto).state, CaptureState::FreeRun);
        let idle_single = TriggerConfig {
            mode: TriggerMode::Single,
            level: 0.0,
            is_armed: false,
        };
        let step = machine.advance(&idle_single);
        assert_eq!(step.state, CaptureState::Captured);
        assert_eq!(step.phase, 0.0);
        assert!(!step.fired);
    }

    #[test]
    fn halt_policy_holds_on_first_armed_frame() {
        let mut machine = TriggerMachine::new(LOGIC_TIMING, HoldPolicy::Halt);
        let mut config = TriggerConfig::default();
        apply(&mut config, machine.arm());
        let step = machine.advance(&config);
        assert!(step.fired);
        assert!(step.hold);
        assert_eq!(step.phase, LOGIC_TIMING.step);
    }

    #[test]
    fn unreachable_threshold_stays_armed() {
        let timing = TriggerTiming {
            step: 0.0,
            threshold: 1.0,
        };
        let mut machine = TriggerMachine::new(timing, HoldPolicy::Redraw);
        let mut config = TriggerConfig::default();
        apply(&mut config, machine.arm());
        for _ in 0..1000 {
            let step = machine.advance(&config);
            assert_eq!(step.state, CaptureState::Armed);
        }
        assert!(config.is_armed);
    }
}
