// src/types.rs
use serde::{Deserialize, Serialize};

// Waveform families the generator can synthesise
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Debug, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaveformKind {
    #[default]
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

impl WaveformKind {
    pub const ALL: [WaveformKind; 4] = [
        WaveformKind::Sine,
        WaveformKind::Square,
        WaveformKind::Triangle,
        WaveformKind::Sawtooth,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            WaveformKind::Sine => "SINE",
            WaveformKind::Square => "SQUARE",
            WaveformKind::Triangle => "TRIANGLE",
            WaveformKind::Sawtooth => "SAWTOOTH",
        }
    }
}

// Acquisition mode shared by the scope and the logic analyzer
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Debug, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerMode {
    #[default]
    Auto,
    Single,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Debug, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpectrumWindow {
    Rect,
    #[default]
    Hanning,
    Hamming,
}

impl SpectrumWindow {
    pub const ALL: [SpectrumWindow; 3] = [
        SpectrumWindow::Rect,
        SpectrumWindow::Hanning,
        SpectrumWindow::Hamming,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SpectrumWindow::Rect => "RECT",
            SpectrumWindow::Hanning => "HANNING",
            SpectrumWindow::Hamming => "HAMMING",
        }
    }
}

// One tab of the bench
#[derive(Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy, Debug, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PanelKind {
    Generator,
    #[default]
    Scope,
    Spectrum,
    Network,
    Pwm,
    Logic,
    Dc,
}

impl PanelKind {
    pub const ALL: [PanelKind; 7] = [
        PanelKind::Generator,
        PanelKind::Scope,
        PanelKind::Spectrum,
        PanelKind::Network,
        PanelKind::Pwm,
        PanelKind::Logic,
        PanelKind::Dc,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PanelKind::Generator => "GEN",
            PanelKind::Scope => "SCOPE",
            PanelKind::Spectrum => "SPEC",
            PanelKind::Network => "NET",
            PanelKind::Pwm => "PWM",
            PanelKind::Logic => "LOGIC",
            PanelKind::Dc => "DC",
        }
    }

    /// Panels that own a pixel canvas and a frame driver.
    pub fn has_canvas(&self) -> bool {
        !matches!(self, PanelKind::Pwm | PanelKind::Dc)
    }

    /// Panels whose render loop stops while the bench is halted.
    pub fn follows_run_switch(&self) -> bool {
        matches!(self, PanelKind::Scope | PanelKind::Spectrum | PanelKind::Logic)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChannelConfig {
    pub enabled: bool,
    /// Volts per division.
    pub scale: f64,
    /// Volts added before scaling.
    pub offset: f64,
    pub color: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct TriggerConfig {
    pub mode: TriggerMode,
    pub level: f64,
    pub is_armed: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ScopeConfig {
    pub ch1: ChannelConfig,
    pub ch2: ChannelConfig,
    /// Seconds per division.
    pub timebase: f64,
    pub trigger: TriggerConfig,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            ch1: ChannelConfig {
                enabled: true,
                scale: 1.0,
                offset: 0.0,
                color: "#0ea5e9".to_owned(),
            },
            ch2: ChannelConfig {
                enabled: true,
                scale: 2.0,
                offset: 0.0,
                color: "#f59e0b".to_owned(),
            },
            timebase: 0.001,
            trigger: TriggerConfig::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct GeneratorConfig {
    pub enabled: bool,
    pub waveform: WaveformKind,
    /// Hz
    pub frequency: f64,
    /// Volts peak-to-peak
    pub amplitude: f64,
    /// Volts
    pub offset: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            waveform: WaveformKind::Sine,
            frequency: 1000.0,
            amplitude: 5.0,
            offset: 0.0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct PwmConfig {
    pub enabled: bool,
    pub frequency: f64,
    /// Percent, 0-100
    pub duty_cycle: f64,
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            frequency: 10_000.0,
            duty_cycle: 50.0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct DcConfig {
    pub voltage: f64,
}

pub const LOGIC_CHANNELS: usize = 16;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LogicAnalyzerConfig {
    pub enabled: bool,
    pub channels: Vec<bool>,
    pub sample_rate: f64,
    pub trigger: TriggerConfig,
}

impl Default for LogicAnalyzerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channels: vec![true; LOGIC_CHANNELS],
            sample_rate: 1_000_000.0,
            trigger: TriggerConfig::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct SpectrumConfig {
    pub enabled: bool,
    /// Highest displayed frequency (the span), Hz
    pub range: f64,
    pub window: SpectrumWindow,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            range: 20_000.0,
            window: SpectrumWindow::Hanning,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct NetworkConfig {
    pub start_freq: f64,
    pub stop_freq: f64,
    pub points: u32,
    pub running: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            start_freq: 10.0,
            stop_freq: 100_000.0,
            points: 100,
            running: false,
        }
    }
}

/// Aggregate configuration of every virtual instrument.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct InstrumentState {
    pub scope: ScopeConfig,
    pub generator: GeneratorConfig,
    pub pwm: PwmConfig,
    pub dc: DcConfig,
    pub logic: LogicAnalyzerConfig,
    pub spectrum: SpectrumConfig,
    pub network: NetworkConfig,
}

// Partial updates, one per state slice. `None` leaves the field untouched.

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChannelPatch {
    pub enabled: Option<bool>,
    pub scale: Option<f64>,
    pub offset: Option<f64>,
    pub color: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TriggerPatch {
    pub mode: Option<TriggerMode>,
    pub level: Option<f64>,
    pub is_armed: Option<bool>,
}

impl TriggerPatch {
    pub fn disarm() -> Self {
        Self {
            is_armed: Some(false),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScopePatch {
    pub ch1: Option<ChannelPatch>,
    pub ch2: Option<ChannelPatch>,
    pub timebase: Option<f64>,
    pub trigger: TriggerPatch,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GeneratorPatch {
    pub enabled: Option<bool>,
    pub waveform: Option<WaveformKind>,
    pub frequency: Option<f64>,
    pub amplitude: Option<f64>,
    pub offset: Option<f64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PwmPatch {
    pub enabled: Option<bool>,
    pub frequency: Option<f64>,
    pub duty_cycle: Option<f64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DcPatch {
    pub voltage: Option<f64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LogicPatch {
    pub enabled: Option<bool>,
    /// (channel index, enabled)
    pub channel: Option<(usize, bool)>,
    pub sample_rate: Option<f64>,
    pub trigger: TriggerPatch,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpectrumPatch {
    pub enabled: Option<bool>,
    pub range: Option<f64>,
    pub window: Option<SpectrumWindow>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NetworkPatch {
    pub start_freq: Option<f64>,
    pub stop_freq: Option<f64>,
    pub points: Option<u32>,
    pub running: Option<bool>,
}

/// A scoped update addressed to exactly one slice of [`InstrumentState`].
#[derive(Clone, Debug, PartialEq)]
pub enum StoreUpdate {
    Scope(ScopePatch),
    Generator(GeneratorPatch),
    Pwm(PwmPatch),
    Dc(DcPatch),
    Logic(LogicPatch),
    Spectrum(SpectrumPatch),
    Network(NetworkPatch),
}

impl From<ScopePatch> for StoreUpdate {
    fn from(value: ScopePatch) -> Self {
        StoreUpdate::Scope(value)
    }
}
impl From<GeneratorPatch> for StoreUpdate {
    fn from(value: GeneratorPatch) -> Self {
        StoreUpdate::Generator(value)
    }
}
impl From<PwmPatch> for StoreUpdate {
    fn from(value: PwmPatch) -> Self {
        StoreUpdate::Pwm(value)
    }
}
impl From<DcPatch> for StoreUpdate {
    fn from(value: DcPatch) -> Self {
        StoreUpdate::Dc(value)
    }
}
impl From<LogicPatch> for StoreUpdate {
    fn from(value: LogicPatch) -> Self {
        StoreUpdate::Logic(value)
    }
}
impl From<SpectrumPatch> for StoreUpdate {
    fn from(value: SpectrumPatch) -> Self {
        StoreUpdate::Spectrum(value)
    }
}
impl From<NetworkPatch> for StoreUpdate {
    fn from(value: NetworkPatch) -> Self {
        StoreUpdate::Network(value)
    }
}
