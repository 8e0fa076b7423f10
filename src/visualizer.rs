// src/visualizer.rs
use std::f32::consts::PI;

use eframe::egui;
use egui::{Color32, Pos2, Rect, Rounding, Shape, Stroke, Vec2};

use crate::store::DC_RANGE;

/// Needle angle for a supply voltage: the left stop is the negative rail, the right stop the positive rail.
pub fn gauge_angle(voltage: f64) -> f32 {
    let (lo, hi) = DC_RANGE;
    let t = ((voltage.clamp(lo, hi) - lo) / (hi - lo)) as f32;
    PI * (1.0 - t)
}

fn arc_points(center: Pos2, radius: f32, from: f32, to: f32) -> Vec<Pos2> {
    let steps = 48;
    (0..=steps)
        .map(|i| {
            let a = from + (to - from) * i as f32 / steps as f32;
            center + Vec2::new(a.cos(), -a.sin()) * radius
        })
        .collect()
}

/// Bench power supply readout drawn with the egui painter.
pub fn draw_dc_gauge(ui: &mut egui::Ui, voltage: f64) {
    let track_color = Color32::from_rgb(30, 41, 59);
    let text_color = Color32::from_rgb(180, 180, 180);
    let active_color = if voltage >= 0.0 {
        Color32::from_rgb(34, 197, 94)
    } else {
        Color32::from_rgb(239, 68, 68)
    };
    let width = 280.0;
    let height = 180.0;
    let (response, painter) = ui.allocate_painter(Vec2::new(width, height), egui::Sense::hover());
    let rect = response.rect;
    painter.rect_filled(rect, Rounding::same(8.0), Color32::from_rgb(2, 6, 23));
    painter.rect_stroke(rect, Rounding::same(8.0), Stroke::new(1.0, track_color));

    let center = Pos2::new(rect.center().x, rect.max.y - 40.0);
    let radius = 100.0;
    painter.add(Shape::line(arc_points(center, radius, PI, 0.0), Stroke::new(10.0, track_color)));
    // Filled from 0 V towards the needle.
    let zero = gauge_angle(0.0);
    let needle = gauge_angle(voltage);
    if (needle - zero).abs() > f32::EPSILON {
        painter.add(Shape::line(arc_points(center, radius, zero, needle), Stroke::new(10.0, active_color)));
    }
    let tip = center + Vec2::new(needle.cos(), -needle.sin()) * (radius - 18.0);
    painter.line_segment([center, tip], Stroke::new(3.0, Color32::WHITE));
    painter.circle_filled(center, 6.0, Color32::WHITE);

    for (label, v) in [("-5", DC_RANGE.0), ("0", 0.0), ("+5", DC_RANGE.1)] {
        let a = gauge_angle(v);
        painter.text(
            center + Vec2::new(a.cos(), -a.sin()) * (radius + 16.0),
            egui::Align2::CENTER_CENTER,
            label,
            egui::FontId::proportional(11.0),
            text_color,
        );
    }
    painter.text(
        Rect::from_min_max(Pos2::new(rect.min.x, center.y + 8.0), rect.max).center(),
        egui::Align2::CENTER_CENTER,
        format!("{voltage:+.2} V"),
        egui::FontId::monospace(22.0),
        active_color,
    );
}
