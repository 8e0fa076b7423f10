// src/instruments/mod.rs
pub mod canvas;
pub mod driver;
pub mod error;
pub mod fft;
pub mod markers;
pub mod noise;
pub mod panels;
pub mod signal;
pub mod trigger;

