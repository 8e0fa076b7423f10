// src/gui.rs
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context as _;
use eframe::egui;
use egui::{Color32, Pos2, Rect, RichText, Sense, TextureOptions, Vec2};
use egui_plot::{Line, Plot, PlotPoints};

use crate::assistant::{Assistant, Role, UnconfiguredGenerator};
use crate::config::LabConfig;
use crate::engine::{LabBench, TriggerTarget};
use crate::instruments::noise::{NoiseSource, SeededNoise};
use crate::instruments::signal::pwm_preview_points;
use crate::instruments::trigger::CaptureState;
use crate::store::{parse_numeric, DC_RANGE, DUTY_RANGE, TRIGGER_LEVEL_RANGE};
use crate::types::*;
use crate::visualizer;

const ACCENT: Color32 = Color32::from_rgb(59, 130, 246);

pub struct VirtualLabApp {
    bench: LabBench,
    assistant: Assistant,
    snapshot_dir: PathBuf,

    // 画布纹理，每个面板一张
    textures: HashMap<PanelKind, egui::TextureHandle>,
    // 数值输入框的编辑缓冲
    entries: HashMap<&'static str, String>,
    chat_input: String,
    show_assistant: bool,
    dragging_marker: Option<u32>,
    log_messages: Vec<String>,
}

impl VirtualLabApp {
    pub fn new(config: &LabConfig) -> anyhow::Result<Self> {
        let noise: Box<dyn NoiseSource> = match config.noise_seed {
            Some(seed) => Box::new(SeededNoise::with_seed(seed)),
            None => Box::new(SeededNoise::from_entropy()),
        };
        let mut bench = LabBench::new(InstrumentState::default(), noise).context("creating panel canvases")?;
        bench.select_panel(config.initial_panel);
        bench.set_running(config.start_running);
        let assistant = Assistant::spawn(
            Box::new(UnconfiguredGenerator),
            config.system_instruction.clone(),
            config.greeting.clone(),
        );
        Ok(Self {
            bench,
            assistant,
            snapshot_dir: config.snapshot_dir.clone(),
            textures: HashMap::new(),
            entries: HashMap::new(),
            chat_input: String::new(),
            show_assistant: true,
            dragging_marker: None,
            log_messages: Vec::new(),
        })
    }

    fn log(&mut self, msg: &str) {
        self.log_messages.push(format!("> {}", msg));
        if self.log_messages.len() > 8 {
            self.log_messages.remove(0);
        }
    }

    fn upload_canvas(&mut self, ctx: &egui::Context, kind: PanelKind) {
        let Some(canvas) = self.bench.canvas(kind) else {
            return;
        };
        let image = egui::ColorImage::from_rgb(
            [canvas.width() as usize, canvas.height() as usize],
            canvas.pixels(),
        );
        match self.textures.get_mut(&kind) {
            Some(handle) => handle.set(image, TextureOptions::LINEAR),
            None => {
                let handle = ctx.load_texture(format!("canvas-{}", kind.label()), image, TextureOptions::LINEAR);
                self.textures.insert(kind, handle);
            }
        }
    }

    fn save_snapshot(&self) -> anyhow::Result<PathBuf> {
        let png = self
            .bench
            .snapshot_png()
            .context("this panel has no canvas")??;
        std::fs::create_dir_all(&self.snapshot_dir)
            .with_context(|| format!("creating {}", self.snapshot_dir.display()))?;
        let stamp = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
        let path = self.snapshot_dir.join(format!(
            "{}_{stamp}.png",
            self.bench.active_panel().label().to_lowercase()
        ));
        std::fs::write(&path, png).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    /// Free-text numeric entry. Returns a value only when editing finished
    /// with something that parses; otherwise the field tracks `current`.
    fn numeric_entry(&mut self, ui: &mut egui::Ui, key: &'static str, label: &str, current: f64) -> Option<f64> {
        let buffer = self.entries.entry(key).or_insert_with(|| current.to_string());
        let mut committed = None;
        ui.horizontal(|ui| {
            ui.label(label);
            let response = ui.add(egui::TextEdit::singleline(buffer).desired_width(90.0));
            if response.lost_focus() {
                committed = parse_numeric(buffer);
                if committed.is_none() {
                    *buffer = current.to_string();
                }
            } else if !response.has_focus() {
                *buffer = current.to_string();
            }
        });
        committed
    }

    // === 面板控制区 ===

    fn generator_controls(&mut self, ui: &mut egui::Ui) {
        let gen = self.bench.state().generator;
        let mut enabled = gen.enabled;
        if ui.checkbox(&mut enabled, "Output enabled").changed() {
            self.bench.queue_update(GeneratorPatch {
                enabled: Some(enabled),
                ..Default::default()
            });
        }
        let mut waveform = gen.waveform;
        egui::ComboBox::from_id_source("waveform")
            .selected_text(waveform.label())
            .show_ui(ui, |ui| {
                for kind in WaveformKind::ALL {
                    ui.selectable_value(&mut waveform, kind, kind.label());
                }
            });
        if waveform != gen.waveform {
            self.bench.queue_update(GeneratorPatch {
                waveform: Some(waveform),
                ..Default::default()
            });
        }
        if let Some(v) = self.numeric_entry(ui, "gen.freq", "Frequency (Hz)", gen.frequency) {
            self.bench.queue_update(GeneratorPatch {
                frequency: Some(v),
                ..Default::default()
            });
        }
        if let Some(v) = self.numeric_entry(ui, "gen.amp", "Amplitude (Vpp)", gen.amplitude) {
            self.bench.queue_update(GeneratorPatch {
                amplitude: Some(v),
                ..Default::default()
            });
        }
        if let Some(v) = self.numeric_entry(ui, "gen.offset", "Offset (V)", gen.offset) {
            self.bench.queue_update(GeneratorPatch {
                offset: Some(v),
                ..Default::default()
            });
        }
    }

    fn channel_controls(&mut self, ui: &mut egui::Ui, name: &str, which: u8, channel: &ChannelConfig) {
        let (scale_key, offset_key) = if which == 1 {
            ("ch1.scale", "ch1.offset")
        } else {
            ("ch2.scale", "ch2.offset")
        };
        let wrap = |patch: ChannelPatch| {
            if which == 1 {
                ScopePatch {
                    ch1: Some(patch),
                    ..Default::default()
                }
            } else {
                ScopePatch {
                    ch2: Some(patch),
                    ..Default::default()
                }
            }
        };
        let mut enabled = channel.enabled;
        if ui.checkbox(&mut enabled, name).changed() {
            self.bench.queue_update(wrap(ChannelPatch {
                enabled: Some(enabled),
                ..Default::default()
            }));
        }
        if let Some(v) = self.numeric_entry(ui, scale_key, "  V/div", channel.scale) {
            self.bench.queue_update(wrap(ChannelPatch {
                scale: Some(v),
                ..Default::default()
            }));
        }
        if let Some(v) = self.numeric_entry(ui, offset_key, "  Offset (V)", channel.offset) {
            self.bench.queue_update(wrap(ChannelPatch {
                offset: Some(v),
                ..Default::default()
            }));
        }
    }

    fn trigger_buttons(&mut self, ui: &mut egui::Ui, target: TriggerTarget, mode: TriggerMode) {
        let state = self.bench.capture_state(target);
        ui.horizontal(|ui| {
            if ui.selectable_label(mode == TriggerMode::Auto, "AUTO").clicked() {
                self.bench.select_trigger_auto(target);
            }
            let single = if state == CaptureState::Captured { "RE-ARM" } else { "SINGLE" };
            if ui.selectable_label(mode == TriggerMode::Single, single).clicked() {
                self.bench.arm_trigger(target);
            }
        });
        let color = match state {
            CaptureState::FreeRun => Color32::GRAY,
            CaptureState::Armed => Color32::from_rgb(239, 68, 68),
            CaptureState::Captured => Color32::from_rgb(34, 197, 94),
        };
        ui.label(RichText::new(state.label()).color(color).small());
    }

    fn scope_controls(&mut self, ui: &mut egui::Ui) {
        let scope = self.bench.state().scope.clone();
        self.channel_controls(ui, "CH1", 1, &scope.ch1);
        self.channel_controls(ui, "CH2", 2, &scope.ch2);
        ui.separator();
        if let Some(ms) = self.numeric_entry(ui, "scope.timebase", "Timebase (ms/div)", scope.timebase * 1000.0) {
            self.bench.queue_update(ScopePatch {
                timebase: Some(ms / 1000.0),
                ..Default::default()
            });
        }
        let mut level = scope.trigger.level;
        let (lo, hi) = TRIGGER_LEVEL_RANGE;
        if ui
            .add(egui::Slider::new(&mut level, lo..=hi).text("Trigger (V)"))
            .changed()
        {
            self.bench.queue_update(ScopePatch {
                trigger: TriggerPatch {
                    level: Some(level),
                    ..Default::default()
                },
                ..Default::default()
            });
        }
        self.trigger_buttons(ui, TriggerTarget::Scope, scope.trigger.mode);
    }

    fn spectrum_controls(&mut self, ui: &mut egui::Ui) {
        let spectrum = self.bench.state().spectrum;
        let mut enabled = spectrum.enabled;
        if ui.checkbox(&mut enabled, "Analyzer enabled").changed() {
            self.bench.queue_update(SpectrumPatch {
                enabled: Some(enabled),
                ..Default::default()
            });
        }
        if let Some(v) = self.numeric_entry(ui, "spec.range", "Span (Hz)", spectrum.range) {
            self.bench.queue_update(SpectrumPatch {
                range: Some(v),
                ..Default::default()
            });
        }
        let mut window = spectrum.window;
        egui::ComboBox::from_id_source("window")
            .selected_text(window.label())
            .show_ui(ui, |ui| {
                for w in SpectrumWindow::ALL {
                    ui.selectable_value(&mut window, w, w.label());
                }
            });
        if window != spectrum.window {
            self.bench.queue_update(SpectrumPatch {
                window: Some(window),
                ..Default::default()
            });
        }

        ui.separator();
        ui.label("MARKERS");
        let mut remove = None;
        for (marker, reading) in self.bench.markers().iter().zip(self.bench.marker_readings()) {
            ui.horizontal(|ui| {
                let color = crate::instruments::canvas::parse_hex_color(&marker.color)
                    .map(|c| Color32::from_rgb(c.0, c.1, c.2))
                    .unwrap_or(Color32::GRAY);
                ui.label(RichText::new(format!("M{}", marker.id)).color(color).strong());
                ui.monospace(format!("{:>9.1} Hz {:>6.1} dB", reading.frequency_hz, reading.level_db));
                if ui.small_button("x").clicked() {
                    remove = Some(marker.id);
                }
            });
        }
        if let Some(id) = remove {
            self.bench.remove_marker(id);
        }
        if ui.button("+ Marker").clicked() {
            self.bench.add_marker(spectrum.range / 2.0);
        }
        if let Some(r) = self.bench.spectrum_readout() {
            ui.separator();
            ui.monospace(format!("Peak  {:.1} Hz", r.peak_hz));
            ui.monospace(format!("Level {:.1} dB", r.level_db));
            ui.monospace(format!("THD   {:.2} %", r.thd_percent));
        }
    }

    fn network_controls(&mut self, ui: &mut egui::Ui) {
        let net = self.bench.state().network;
        if let Some(v) = self.numeric_entry(ui, "net.start", "Start (Hz)", net.start_freq) {
            self.bench.queue_update(NetworkPatch {
                start_freq: Some(v),
                ..Default::default()
            });
        }
        if let Some(v) = self.numeric_entry(ui, "net.stop", "Stop (Hz)", net.stop_freq) {
            self.bench.queue_update(NetworkPatch {
                stop_freq: Some(v),
                ..Default::default()
            });
        }
        if let Some(v) = self.numeric_entry(ui, "net.points", "Points", net.points as f64) {
            self.bench.queue_update(NetworkPatch {
                points: Some(v.round().max(0.0) as u32),
                ..Default::default()
            });
        }
        if ui
            .add_enabled(!net.running, egui::Button::new("RUN SWEEP"))
            .clicked()
        {
            self.bench.queue_update(NetworkPatch {
                running: Some(true),
                ..Default::default()
            });
        }
        ui.add(egui::ProgressBar::new(self.bench.network_progress() as f32 / 100.0).show_percentage());
    }

    fn pwm_controls(&mut self, ui: &mut egui::Ui) {
        let pwm = self.bench.state().pwm;
        let mut enabled = pwm.enabled;
        if ui.checkbox(&mut enabled, "PWM output").changed() {
            self.bench.queue_update(PwmPatch {
                enabled: Some(enabled),
                ..Default::default()
            });
        }
        if let Some(v) = self.numeric_entry(ui, "pwm.freq", "Frequency (Hz)", pwm.frequency) {
            self.bench.queue_update(PwmPatch {
                frequency: Some(v),
                ..Default::default()
            });
        }
        let mut duty = pwm.duty_cycle;
        let (lo, hi) = DUTY_RANGE;
        if ui.add(egui::Slider::new(&mut duty, lo..=hi).text("Duty %")).changed() {
            self.bench.queue_update(PwmPatch {
                duty_cycle: Some(duty),
                ..Default::default()
            });
        }
    }

    fn logic_controls(&mut self, ui: &mut egui::Ui) {
        let logic = self.bench.state().logic.clone();
        let mut enabled = logic.enabled;
        if ui.checkbox(&mut enabled, "Capture enabled").changed() {
            self.bench.queue_update(LogicPatch {
                enabled: Some(enabled),
                ..Default::default()
            });
        }
        egui::Grid::new("logic_channels").num_columns(4).show(ui, |ui| {
            for (i, on) in logic.channels.iter().enumerate() {
                let mut value = *on;
                if ui.checkbox(&mut value, format!("D{i}")).changed() {
                    self.bench.queue_update(LogicPatch {
                        channel: Some((i, value)),
                        ..Default::default()
                    });
                }
                if i % 4 == 3 {
                    ui.end_row();
                }
            }
        });
        if let Some(v) = self.numeric_entry(ui, "logic.rate", "Sample rate (S/s)", logic.sample_rate) {
            self.bench.queue_update(LogicPatch {
                sample_rate: Some(v),
                ..Default::default()
            });
        }
        self.trigger_buttons(ui, TriggerTarget::Logic, logic.trigger.mode);
    }

    fn dc_controls(&mut self, ui: &mut egui::Ui) {
        let mut voltage = self.bench.state().dc.voltage;
        let (lo, hi) = DC_RANGE;
        if ui
            .add(egui::Slider::new(&mut voltage, lo..=hi).step_by(0.01).text("V"))
            .changed()
        {
            self.bench.queue_update(DcPatch { voltage: Some(voltage) });
        }
    }

    // === 中央显示区 ===

    fn show_canvas(&mut self, ui: &mut egui::Ui, kind: PanelKind) {
        let Some(texture) = self.textures.get(&kind) else {
            ui.label("Waiting for first frame...");
            return;
        };
        let native = texture.size_vec2();
        let avail = ui.available_size();
        let scale = (avail.x / native.x).min(avail.y / native.y).max(0.1);
        let (response, painter) = ui.allocate_painter(native * scale, Sense::click_and_drag());
        let rect = response.rect;
        painter.image(
            texture.id(),
            rect,
            Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
            Color32::WHITE,
        );

        if kind != PanelKind::Spectrum {
            return;
        }
        let span = self.bench.state().spectrum.range;
        let to_hz = |pos: Pos2| ((pos.x - rect.min.x) / rect.width()) as f64 * span;
        if let Some(pos) = response.hover_pos() {
            if self.dragging_marker.is_some() || self.bench.hit_test_marker(to_hz(pos)).is_some() {
                ui.ctx().set_cursor_icon(egui::CursorIcon::ResizeHorizontal);
            }
        }
        if response.drag_started() {
            self.dragging_marker = response
                .interact_pointer_pos()
                .and_then(|pos| self.bench.hit_test_marker(to_hz(pos)));
        }
        if response.dragged() {
            if let (Some(id), Some(pos)) = (self.dragging_marker, response.interact_pointer_pos()) {
                self.bench
                    .drag_marker(id, (pos.x - rect.min.x) as f64, rect.width() as f64);
            }
        }
        if response.drag_released() {
            self.dragging_marker = None;
        }
    }

    fn show_pwm_preview(&self, ui: &mut egui::Ui) {
        let pwm = self.bench.state().pwm;
        let points = pwm_preview_points(pwm.duty_cycle, 1000.0, 100.0, 15.0);
        let color = if pwm.enabled { ACCENT } else { Color32::DARK_GRAY };
        Plot::new("pwm_preview")
            .view_aspect(5.0)
            .include_y(0.0)
            .include_y(100.0)
            .allow_drag(false)
            .allow_zoom(false)
            .allow_scroll(false)
            .show_axes([false, false])
            .show(ui, |plot_ui| {
                plot_ui.line(Line::new(PlotPoints::new(points)).color(color).width(2.0));
            });
        ui.label(format!(
            "{:.0} Hz, {:.1} % duty, {}",
            pwm.frequency,
            pwm.duty_cycle,
            if pwm.enabled { "ACTIVE" } else { "IDLE" }
        ));
    }

    fn assistant_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("LAB ASSISTANT");
        ui.separator();
        let input_height = 36.0;
        egui::ScrollArea::vertical()
            .max_height(ui.available_height() - input_height)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for msg in self.assistant.transcript() {
                    let (align, fill) = match msg.role {
                        Role::User => (egui::Align::Max, ACCENT),
                        Role::Assistant => (egui::Align::Min, Color32::from_rgb(30, 41, 59)),
                    };
                    ui.with_layout(egui::Layout::top_down(align), |ui| {
                        egui::Frame::none()
                            .fill(fill)
                            .rounding(8.0)
                            .inner_margin(6.0)
                            .show(ui, |ui| {
                                ui.label(RichText::new(&msg.content).color(Color32::WHITE).small());
                            });
                    });
                    ui.add_space(4.0);
                }
                if self.assistant.is_pending() {
                    ui.label(RichText::new("...").color(Color32::GRAY));
                }
            });
        ui.horizontal(|ui| {
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.chat_input)
                    .hint_text("Ask lab assistant...")
                    .desired_width(ui.available_width() - 40.0),
            );
            let submit = ui.button(">").clicked()
                || (response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)));
            if submit && self.assistant.send(&self.chat_input, self.bench.store()) {
                self.chat_input.clear();
            }
        });
    }
}

impl eframe::App for VirtualLabApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // 1. 渲染循环：应用排队的修改并推进当前面板一帧
        if let Some(kind) = self.bench.on_display_refresh() {
            self.upload_canvas(ctx, kind);
        }
        let active = self.bench.active_panel();
        if active.has_canvas() && !self.textures.contains_key(&active) {
            self.upload_canvas(ctx, active);
        }
        self.assistant.poll();

        // 2. UI 绘制
        let mut visuals = egui::Visuals::dark();
        visuals.widgets.noninteractive.bg_fill = Color32::from_rgb(10, 10, 15);
        ctx.set_visuals(visuals);

        egui::TopBottomPanel::top("tabs").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("VIRTUAL LAB");
                ui.separator();
                for kind in PanelKind::ALL {
                    if ui.selectable_label(active == kind, kind.label()).clicked() {
                        self.bench.select_panel(kind);
                    }
                }
                ui.separator();
                let running = self.bench.is_running();
                let (text, fill) = if running {
                    ("STOP", Color32::from_rgb(185, 28, 28))
                } else {
                    ("RUN", Color32::from_rgb(21, 128, 61))
                };
                if ui
                    .add(egui::Button::new(RichText::new(text).color(Color32::WHITE)).fill(fill))
                    .clicked()
                {
                    self.bench.set_running(!running);
                }
                if ui
                    .add_enabled(active.has_canvas(), egui::Button::new("SNAPSHOT"))
                    .clicked()
                {
                    match self.save_snapshot() {
                        Ok(path) => self.log(&format!("Saved {}", path.display())),
                        Err(e) => {
                            log::warn!("snapshot failed: {e:#}");
                            self.log(&format!("Snapshot failed: {e}"));
                        }
                    }
                }
                ui.toggle_value(&mut self.show_assistant, "ASSISTANT");
            });
        });

        egui::TopBottomPanel::bottom("events").show(ctx, |ui| {
            if active.has_canvas() {
                ui.small(format!("{} frames: {}", active.label(), self.bench.frames_rendered(active)));
            }
            egui::ScrollArea::vertical().max_height(90.0).show(ui, |ui| {
                for m in self.bench.events().iter().chain(&self.log_messages) {
                    ui.monospace(m);
                }
            });
        });

        egui::SidePanel::left("controls").min_width(260.0).show(ctx, |ui| {
            ui.add_space(6.0);
            ui.label(RichText::new(active.label()).strong().color(ACCENT));
            ui.separator();
            match active {
                PanelKind::Generator => self.generator_controls(ui),
                PanelKind::Scope => self.scope_controls(ui),
                PanelKind::Spectrum => self.spectrum_controls(ui),
                PanelKind::Network => self.network_controls(ui),
                PanelKind::Pwm => self.pwm_controls(ui),
                PanelKind::Logic => self.logic_controls(ui),
                PanelKind::Dc => self.dc_controls(ui),
            }
        });

        if self.show_assistant {
            egui::SidePanel::right("assistant").min_width(300.0).show(ctx, |ui| {
                self.assistant_panel(ui);
            });
        }

        egui::CentralPanel::default().show(ctx, |ui| match active {
            PanelKind::Pwm => self.show_pwm_preview(ui),
            PanelKind::Dc => {
                ui.add_space(20.0);
                visualizer::draw_dc_gauge(ui, self.bench.state().dc.voltage);
            }
            kind => {
                ui.allocate_ui(Vec2::new(ui.available_width(), ui.available_height()), |ui| {
                    self.show_canvas(ui, kind);
                });
            }
        });

        // 3. 有待渲染的帧或待处理的请求时继续重绘
        if self.bench.has_pending_frame() || self.bench.has_queued_actions() {
            ctx.request_repaint();
        } else if self.assistant.is_pending() {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }
}
