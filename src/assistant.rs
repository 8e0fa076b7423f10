// src/assistant.rs
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use anyhow::{anyhow, Result};

use crate::store::ParameterStore;
use crate::types::InstrumentState;

pub const FALLBACK_REPLY: &str = "Connection to the AI engineering hub lost. Please check your network.";
pub const EMPTY_REPLY: &str = "I'm sorry, I couldn't process that signal analysis.";

/// Backend that turns a prompt into a reply. Runs on the assistant's worker thread.
pub trait TextGenerator: Send {
    fn generate(&self, system_instruction: &str, prompt: &str) -> Result<String>;
}

/// Stand-in used until a backend is wired in; every request fails.
pub struct UnconfiguredGenerator;

impl TextGenerator for UnconfiguredGenerator {
    fn generate(&self, _system_instruction: &str, _prompt: &str) -> Result<String> {
        Err(anyhow!("no text generation backend configured"))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Human-readable summary of the bench handed to the backend with each question.
pub fn lab_context(state: &InstrumentState) -> String {
    let on_off = |b: bool| if b { "ON" } else { "OFF" };
    let scope = &state.scope;
    let gen = &state.generator;
    let active_channels = state.logic.channels.iter().filter(|c| **c).count();
    format!(
        "Current Lab State:\n\
         Oscilloscope: CH1={} @ {}V/div, CH2={} @ {}V/div, Timebase: {}s/div, Trigger: {:?} @ {}V.\n\
         Gen: {} ({}, {}Hz, {}Vpp, offset {}V).\n\
         DC: {}V.\n\
         PWM: {} ({}% Duty, {}Hz).\n\
         Logic Analyzer: {} ({} of {} channels).\n\
         Spectrum: span {}Hz, {} window.",
        on_off(scope.ch1.enabled),
        scope.ch1.scale,
        on_off(scope.ch2.enabled),
        scope.ch2.scale,
        scope.timebase,
        scope.trigger.mode,
        scope.trigger.level,
        if gen.enabled { "RUNNING" } else { "STOPPED" },
        gen.waveform.label(),
        gen.frequency,
        gen.amplitude,
        gen.offset,
        state.dc.voltage,
        if state.pwm.enabled { "ACTIVE" } else { "IDLE" },
        state.pwm.duty_cycle,
        state.pwm.frequency,
        on_off(state.logic.enabled),
        active_channels,
        state.logic.channels.len(),
        state.spectrum.range,
        state.spectrum.window.label(),
    )
}

fn build_prompt(store: &ParameterStore, question: &str) -> String {
    format!(
        "{}\nState snapshot: {}\n\nUser Question: {question}",
        lab_context(store.state()),
        store.snapshot_json()
    )
}

/// Chat transcript plus a worker thread that talks to the backend.
pub struct Assistant {
    transcript: Vec<ChatMessage>,
    pending: bool,
    tx_prompt: Sender<String>,
    rx_reply: Receiver<String>,
}

impl Assistant {
    pub fn spawn(generator: Box<dyn TextGenerator>, system_instruction: String, greeting: String) -> Self {
        let (tx_prompt, rx_prompt) = mpsc::channel::<String>();
        let (tx_reply, rx_reply) = mpsc::channel::<String>();
        thread::spawn(move || {
            for prompt in rx_prompt {
                let reply = match generator.generate(&system_instruction, &prompt) {
                    Ok(text) if !text.trim().is_empty() => text,
                    Ok(_) => EMPTY_REPLY.to_owned(),
                    Err(e) => {
                        log::warn!("assistant request failed: {e:#}");
                        FALLBACK_REPLY.to_owned()
                    }
                };
                if tx_reply.send(reply).is_err() {
                    break;
                }
            }
            log::debug!("assistant worker stopped");
        });
        Self {
            transcript: vec![ChatMessage {
                role: Role::Assistant,
                content: greeting,
            }],
            pending: false,
            tx_prompt,
            rx_reply,
        }
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Queues a question. Blank input, or input while a reply is outstanding, is ignored.
    pub fn send(&mut self, input: &str, store: &ParameterStore) -> bool {
        if input.trim().is_empty() || self.pending {
            return false;
        }
        self.transcript.push(ChatMessage {
            role: Role::User,
            content: input.to_owned(),
        });
        if self.tx_prompt.send(build_prompt(store, input)).is_err() {
            self.push_reply(FALLBACK_REPLY.to_owned());
            return true;
        }
        self.pending = true;
        true
    }

    /// Collects a finished reply. Returns true when the transcript grew.
    pub fn poll(&mut self) -> bool {
        match self.rx_reply.try_recv() {
            Ok(reply) => {
                self.pending = false;
                self.push_reply(reply);
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) if self.pending => {
                self.pending = false;
                self.push_reply(FALLBACK_REPLY.to_owned());
                true
            }
            Err(TryRecvError::Disconnected) => false,
        }
    }

    fn push_reply(&mut self, content: String) {
        self.transcript.push(ChatMessage {
            role: Role::Assistant,
            content,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    struct Echo;
    impl TextGenerator for Echo {
        fn generate(&self, system_instruction: &str, prompt: &str) -> Result<String> {
            Ok(format!("[{system_instruction}] {prompt}"))
        }
    }

    struct Blank;
    impl TextGenerator for Blank {
        fn generate(&self, _: &str, _: &str) -> Result<String> {
            Ok("   ".to_owned())
        }
    }

    fn wait(assistant: &mut Assistant) {
        let start = Instant::now();
        while !assistant.poll() {
            assert!(start.elapsed() < Duration::from_secs(5), "no reply");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn assistant(generator: Box<dyn TextGenerator>) -> Assistant {
        Assistant::spawn(generator, "sys".to_owned(), "hi".to_owned())
    }

    #[test]
    fn reply_carries_context_and_question() {
        let mut a = assistant(Box::new(Echo));
        assert!(a.send("why is CH2 flat?", &ParameterStore::default()));
        assert!(a.is_pending());
        wait(&mut a);
        assert!(!a.is_pending());
        let reply = &a.transcript()[2];
        assert_eq!(reply.role, Role::Assistant);
        assert!(reply.content.starts_with("[sys] Current Lab State:"));
        assert!(reply.content.contains("\"timebase\":0.001"));
        assert!(reply.content.ends_with("User Question: why is CH2 flat?"));
    }

    #[test]
    fn blank_and_overlapping_input_is_ignored() {
        let mut a = assistant(Box::new(Echo));
        assert!(!a.send("   ", &ParameterStore::default()));
        assert!(a.send("one", &ParameterStore::default()));
        assert!(!a.send("two", &ParameterStore::default()));
        wait(&mut a);
        assert_eq!(a.transcript().len(), 3);
    }

    #[test]
    fn failures_become_fallback_text() {
        let mut a = assistant(Box::new(UnconfiguredGenerator));
        a.send("hello", &ParameterStore::default());
        wait(&mut a);
        assert_eq!(a.transcript().last().unwrap().content, FALLBACK_REPLY);

        let mut b = assistant(Box::new(Blank));
        b.send("hello", &ParameterStore::default());
        wait(&mut b);
        assert_eq!(b.transcript().last().unwrap().content, EMPTY_REPLY);
    }

    #[test]
    fn context_reports_settings() {
        let mut state = InstrumentState::default();
        state.generator.enabled = true;
        state.logic.channels[0] = false;
        let text = lab_context(&state);
        assert!(text.contains("Gen: RUNNING (SINE, 1000Hz, 5Vpp"));
        assert!(text.contains("15 of 16 channels"));
        assert!(text.contains("CH1=ON @ 1V/div"));
    }
}
