// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
mod assistant;
mod config;
mod engine;
mod gui;
mod instruments;
mod store;
mod types;
mod visualizer;
use eframe::egui;
// 入口函数
fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = config::LabConfig::load();
    let app = gui::VirtualLabApp::new(&config)?;
    let [width, height] = config.window_size;
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([width, height])
        .with_min_inner_size([960.0, 640.0])
        .with_title("Virtual Lab Bench");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native("VirtualLab", options, Box::new(move |_cc| Box::new(app)))
        .map_err(|e| anyhow::anyhow!("window closed with error: {e}"))
}
