// src/engine.rs
use std::collections::{HashMap, VecDeque};

use crate::instruments::canvas::Canvas;
use crate::instruments::driver::FrameDriver;
use crate::instruments::error::BenchError;
use crate::instruments::fft::SpectrumReadout;
use crate::instruments::markers::{Marker, MarkerReading};
use crate::instruments::noise::NoiseSource;
use crate::instruments::panels::{
    FrameContext, GeneratorPanel, LogicPanel, NetworkPanel, Panel, ScopePanel, SpectrumPanel,
};
use crate::instruments::trigger::CaptureState;
use crate::store::ParameterStore;
use crate::types::*;

const EVENT_LOG_LEN: usize = 8;

/// Panels with a trigger/capture state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerTarget {
    Scope,
    Logic,
}

/// User intent queued between display refreshes.
#[derive(Clone, Debug, PartialEq)]
pub enum BenchAction {
    Update(StoreUpdate),
    SelectAuto(TriggerTarget),
    Arm(TriggerTarget),
}

struct PanelSlot {
    canvas: Canvas,
    driver: FrameDriver,
}

impl PanelSlot {
    fn for_panel<P: Panel>(panel: &P) -> Result<Self, BenchError> {
        let (w, h) = panel.canvas_size();
        Ok(Self {
            canvas: Canvas::new(w, h)?,
            driver: FrameDriver::new(),
        })
    }
}

/// Runs one pending frame of `panel`. `Ok(None)` when nothing was pending.
fn tick<P: Panel>(
    panel: &mut P,
    slot: &mut PanelSlot,
    state: &InstrumentState,
    noise: &mut dyn NoiseSource,
    frame_index: u64,
) -> Result<Option<Option<StoreUpdate>>, BenchError> {
    let PanelSlot { canvas, driver } = slot;
    let outcome = driver.run(|_| {
        let mut ctx = FrameContext {
            state,
            canvas,
            noise,
            frame_index,
        };
        panel.render_frame(&mut ctx)
    })?;
    Ok(outcome.map(|o| o.writeback.map(Into::into)))
}

/// Trigger intent carried by a user edit, judged against the mode in the store
/// before the edit lands. `Some(true)` arms, `Some(false)` returns to AUTO.
fn trigger_request(patch: &TriggerPatch, current: TriggerMode) -> Option<bool> {
    match (patch.mode, patch.is_armed) {
        (Some(TriggerMode::Auto), _) => Some(false),
        (Some(TriggerMode::Single), None | Some(true)) => Some(true),
        (None, Some(true)) if current == TriggerMode::Single => Some(true),
        _ => None,
    }
}

/// The whole bench: parameter store, panels, their canvases and render loops.
///
/// Single-threaded and cooperative. User actions are queued and applied at the
/// start of the next display refresh, before the active panel draws.
pub struct LabBench {
    store: ParameterStore,
    scope: ScopePanel,
    logic: LogicPanel,
    spectrum: SpectrumPanel,
    network: NetworkPanel,
    generator: GeneratorPanel,
    slots: HashMap<PanelKind, PanelSlot>,
    active: PanelKind,
    running: bool,
    noise: Box<dyn NoiseSource>,
    queue: VecDeque<BenchAction>,
    frame_index: u64,
    events: Vec<String>,
}

impl LabBench {
    pub fn new(state: InstrumentState, noise: Box<dyn NoiseSource>) -> Result<Self, BenchError> {
        let scope = ScopePanel::new();
        let logic = LogicPanel::new();
        let spectrum = SpectrumPanel::new();
        let network = NetworkPanel::new();
        let generator = GeneratorPanel::new();

        let mut slots = HashMap::new();
        slots.insert(scope.kind(), PanelSlot::for_panel(&scope)?);
        slots.insert(logic.kind(), PanelSlot::for_panel(&logic)?);
        slots.insert(spectrum.kind(), PanelSlot::for_panel(&spectrum)?);
        slots.insert(network.kind(), PanelSlot::for_panel(&network)?);
        slots.insert(generator.kind(), PanelSlot::for_panel(&generator)?);

        let mut bench = Self {
            store: ParameterStore::new(state),
            scope,
            logic,
            spectrum,
            network,
            generator,
            slots,
            active: PanelKind::default(),
            running: true,
            noise,
            queue: VecDeque::new(),
            frame_index: 0,
            events: Vec::new(),
        };
        let span = bench.store.state().spectrum.range;
        bench.spectrum.sync_span(span);
        bench.mount();
        bench.note("Virtual lab bench ready.");
        Ok(bench)
    }

    // ---- queries -------------------------------------------------------

    pub fn state(&self) -> &InstrumentState {
        self.store.state()
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    pub fn active_panel(&self) -> PanelKind {
        self.active
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn canvas(&self, kind: PanelKind) -> Option<&Canvas> {
        self.slots.get(&kind).map(|s| &s.canvas)
    }

    pub fn is_pending(&self, kind: PanelKind) -> bool {
        self.slots.get(&kind).map_or(false, |s| s.driver.is_pending())
    }

    pub fn frames_rendered(&self, kind: PanelKind) -> u64 {
        self.slots.get(&kind).map_or(0, |s| s.driver.frames_rendered())
    }

    pub fn has_pending_frame(&self) -> bool {
        self.is_pending(self.active)
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn has_queued_actions(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn capture_state(&self, target: TriggerTarget) -> CaptureState {
        match target {
            TriggerTarget::Scope => self.scope.trigger().state(),
            TriggerTarget::Logic => self.logic.trigger().state(),
        }
    }

    pub fn network_progress(&self) -> u32 {
        self.network.progress()
    }

    pub fn spectrum_readout(&self) -> Option<SpectrumReadout> {
        self.spectrum.readout()
    }

    /// PNG of the active panel's canvas; `None` for panels without one.
    pub fn snapshot_png(&self) -> Option<Result<Vec<u8>, BenchError>> {
        self.canvas(self.active).map(Canvas::to_png)
    }

    // ---- user actions --------------------------------------------------

    pub fn queue_update(&mut self, update: impl Into<StoreUpdate>) {
        self.queue.push_back(BenchAction::Update(update.into()));
    }

    pub fn select_trigger_auto(&mut self, target: TriggerTarget) {
        self.queue.push_back(BenchAction::SelectAuto(target));
    }

    pub fn arm_trigger(&mut self, target: TriggerTarget) {
        self.queue.push_back(BenchAction::Arm(target));
    }

    /// Unmounts the current panel (its render loop is cancelled) and mounts `kind`.
    pub fn select_panel(&mut self, kind: PanelKind) {
        if kind == self.active {
            return;
        }
        if let Some(slot) = self.slots.get_mut(&self.active) {
            slot.driver.cancel();
        }
        log::info!("panel {} -> {}", self.active.label(), kind.label());
        self.active = kind;
        self.mount();
    }

    pub fn set_running(&mut self, running: bool) {
        if running == self.running {
            return;
        }
        self.running = running;
        self.note(if running { "Acquisition running." } else { "Acquisition stopped." });
        if running {
            self.mount();
        } else if self.active.follows_run_switch() {
            if let Some(slot) = self.slots.get_mut(&self.active) {
                slot.driver.cancel();
            }
        }
    }

    // ---- markers -------------------------------------------------------

    pub fn markers(&self) -> &[Marker] {
        self.spectrum.markers().markers()
    }

    pub fn marker_readings(&self) -> Vec<MarkerReading> {
        let state = self.store.state();
        let geometry = self.spectrum.geometry(&state.spectrum);
        self.spectrum.markers().readings(&state.generator, &geometry)
    }

    pub fn add_marker(&mut self, frequency_hz: f64) -> u32 {
        let id = self.spectrum.markers_mut().add(frequency_hz);
        self.mount();
        id
    }

    pub fn remove_marker(&mut self, id: u32) -> bool {
        let removed = self.spectrum.markers_mut().remove(id);
        self.mount();
        removed
    }

    pub fn hit_test_marker(&self, frequency_hz: f64) -> Option<u32> {
        self.spectrum.markers().hit_test(frequency_hz).map(|m| m.id)
    }

    pub fn drag_marker(&mut self, id: u32, pixel_x: f64, width: f64) -> Option<f64> {
        let moved = self.spectrum.markers_mut().drag(id, pixel_x, width);
        if moved.is_some() {
            self.mount();
        }
        moved
    }

    // ---- render loop ---------------------------------------------------

    /// One display refresh. Applies queued actions, runs the active panel's
    /// pending frame and applies its write-back. Returns the panel whose
    /// canvas changed, if any.
    pub fn on_display_refresh(&mut self) -> Option<PanelKind> {
        if self.drain_actions() {
            self.mount();
        }
        if !self.may_render(self.active) {
            return None;
        }

        let state = self.store.state();
        let slot = self.slots.get_mut(&self.active)?;
        let noise = self.noise.as_mut();
        let frame_index = self.frame_index;
        let result = match self.active {
            PanelKind::Scope => tick(&mut self.scope, slot, state, noise, frame_index),
            PanelKind::Logic => tick(&mut self.logic, slot, state, noise, frame_index),
            PanelKind::Spectrum => tick(&mut self.spectrum, slot, state, noise, frame_index),
            PanelKind::Network => tick(&mut self.network, slot, state, noise, frame_index),
            PanelKind::Generator => tick(&mut self.generator, slot, state, noise, frame_index),
            PanelKind::Pwm | PanelKind::Dc => Ok(None),
        };

        match result {
            Ok(Some(writeback)) => {
                self.frame_index += 1;
                if let Some(update) = writeback {
                    self.apply_writeback(update);
                }
                Some(self.active)
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("{} frame failed: {e}", self.active.label());
                self.note(&format!("{} render error: {e}", self.active.label()));
                None
            }
        }
    }

    fn drain_actions(&mut self) -> bool {
        let mut touched = false;
        while let Some(action) = self.queue.pop_front() {
            touched = true;
            match action {
                BenchAction::Update(update) => {
                    let state = self.store.state();
                    let request = match &update {
                        StoreUpdate::Scope(p) => trigger_request(&p.trigger, state.scope.trigger.mode)
                            .map(|arm| (TriggerTarget::Scope, arm)),
                        StoreUpdate::Logic(p) => trigger_request(&p.trigger, state.logic.trigger.mode)
                            .map(|arm| (TriggerTarget::Logic, arm)),
                        _ => None,
                    };
                    if !self.store.apply(update) {
                        log::trace!("update left the store unchanged");
                    }
                    // Mode edits go through the machine so a held capture is released.
                    match request {
                        Some((target, true)) => self.arm(target),
                        Some((target, false)) => self.select_auto(target),
                        None => {}
                    }
                }
                BenchAction::SelectAuto(target) => self.select_auto(target),
                BenchAction::Arm(target) => self.arm(target),
            }
        }
        if touched {
            let span = self.store.state().spectrum.range;
            self.spectrum.sync_span(span);
        }
        touched
    }

    fn select_auto(&mut self, target: TriggerTarget) {
        match target {
            TriggerTarget::Scope => {
                let trigger = self.scope.trigger_mut().select_auto();
                self.store.apply(ScopePatch { trigger, ..Default::default() }.into());
            }
            TriggerTarget::Logic => {
                let trigger = self.logic.trigger_mut().select_auto();
                self.store.apply(LogicPatch { trigger, ..Default::default() }.into());
            }
        }
    }

    fn arm(&mut self, target: TriggerTarget) {
        match target {
            TriggerTarget::Scope => {
                let trigger = self.scope.trigger_mut().arm();
                self.store.apply(ScopePatch { trigger, ..Default::default() }.into());
                self.note("Scope armed, waiting for trigger.");
            }
            TriggerTarget::Logic => {
                let trigger = self.logic.trigger_mut().arm();
                self.store.apply(LogicPatch { trigger, ..Default::default() }.into());
                self.note("Logic analyzer armed.");
            }
        }
    }

    fn apply_writeback(&mut self, update: StoreUpdate) {
        let message = match &update {
            StoreUpdate::Scope(_) => "Scope triggered, capture held.",
            StoreUpdate::Logic(_) => "Logic capture stored.",
            StoreUpdate::Network(_) => "Network sweep complete.",
            _ => "Panel state updated.",
        };
        log::debug!("write-back {update:?}");
        self.store.apply(update);
        self.note(message);
    }

    fn may_render(&self, kind: PanelKind) -> bool {
        self.running || !kind.follows_run_switch()
    }

    /// Requests a frame for the active panel when it is allowed to draw.
    fn mount(&mut self) {
        if !self.may_render(self.active) {
            return;
        }
        if let Some(slot) = self.slots.get_mut(&self.active) {
            slot.driver.request_frame();
        }
    }

    /// Appends a line to the rolling event log.
    pub fn note(&mut self, msg: &str) {
        self.events.push(format!("> {msg}"));
        if self.events.len() > EVENT_LOG_LEN {
            self.events.remove(0);
        }
    }
}
