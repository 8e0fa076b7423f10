use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::instruments::error::BenchError;

pub type Surface<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Fixed-resolution RGB8 pixel buffer owned by one panel.
#[derive(Clone, Debug)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Result<Self, BenchError> {
        if width == 0 || height == 0 {
            return Err(BenchError::InvalidCanvas { width, height });
        }
        Ok(Self {
            width,
            height,
            pixels: vec![0u8; (width * height * 3) as usize],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 3) as usize;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]])
    }

    /// Drawing surface over the whole buffer in pixel coordinates.
    pub fn surface(&mut self) -> Surface<'_> {
        BitMapBackend::with_buffer(&mut self.pixels, (self.width, self.height)).into_drawing_area()
    }

    pub fn to_png(&self) -> Result<Vec<u8>, BenchError> {
        let expected = (self.width * self.height * 3) as usize;
        let image = ImageBuffer::<Rgb<u8>, _>::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or(BenchError::BufferSize {
                expected,
                actual: self.pixels.len(),
            })?;
        let mut output = Vec::new();
        DynamicImage::ImageRgb8(image).write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
        Ok(output)
    }
}

/// `#rrggbb` (or `rrggbb`) to a colour.
pub fn parse_hex_color(text: &str) -> Option<RGBColor> {
    let hex = text.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some(RGBColor(channel(0)?, channel(2)?, channel(4)?))
}

/// HSL with hue in degrees and saturation/lightness in [0, 1].
pub fn hsl_color(hue: f64, saturation: f64, lightness: f64) -> RGBColor {
    let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let h = hue.rem_euclid(360.0) / 60.0;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = lightness - c / 2.0;
    let to_u8 = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    RGBColor(to_u8(r), to_u8(g), to_u8(b))
}

/// Evenly spaced grid lines including both borders.
pub fn draw_grid(surface: &Surface<'_>, columns: u32, rows: u32, color: &RGBColor) -> Result<(), BenchError> {
    let (w, h) = surface.dim_in_pixel();
    let (w, h) = (w as i32, h as i32);
    for i in 0..=columns {
        let x = (i as i64 * (w - 1) as i64 / columns as i64) as i32;
        surface.draw(&PathElement::new(vec![(x, 0), (x, h - 1)], color.stroke_width(1)))?;
    }
    for i in 0..=rows {
        let y = (i as i64 * (h - 1) as i64 / rows as i64) as i32;
        surface.draw(&PathElement::new(vec![(0, y), (w - 1, y)], color.stroke_width(1)))?;
    }
    Ok(())
}

/// Trace with a soft halo underneath.
pub fn draw_trace(
    surface: &Surface<'_>,
    points: Vec<(i32, i32)>,
    color: &RGBColor,
    stroke: u32,
) -> Result<(), BenchError> {
    if points.len() < 2 {
        return Ok(());
    }
    surface.draw(&PathElement::new(points.clone(), color.mix(0.25).stroke_width(stroke + 4)))?;
    surface.draw(&PathElement::new(points, color.stroke_width(stroke)))?;
    Ok(())
}

/// Dashed straight segment from `from` to `to`.
pub fn draw_dashed(
    surface: &Surface<'_>,
    from: (i32, i32),
    to: (i32, i32),
    dash: i32,
    gap: i32,
    style: ShapeStyle,
) -> Result<(), BenchError> {
    let (dx, dy) = ((to.0 - from.0) as f64, (to.1 - from.1) as f64);
    let length = (dx * dx + dy * dy).sqrt();
    if length < 1.0 {
        return Ok(());
    }
    let (ux, uy) = (dx / length, dy / length);
    let mut t = 0.0;
    while t < length {
        let end = (t + dash as f64).min(length);
        let a = (from.0 + (ux * t) as i32, from.1 + (uy * t) as i32);
        let b = (from.0 + (ux * end) as i32, from.1 + (uy * end) as i32);
        surface.draw(&PathElement::new(vec![a, b], style))?;
        t += (dash + gap) as f64;
    }
    Ok(())
}

/// Dashed polyline; dashes restart at every vertex.
pub fn draw_dashed_path(
    surface: &Surface<'_>,
    points: &[(i32, i32)],
    dash: i32,
    gap: i32,
    style: ShapeStyle,
) -> Result<(), BenchError> {
    let mut carried = 0;
    let period = dash + gap;
    for pair in points.windows(2) {
        // Short per-pixel segments: toggle pen by accumulated length.
        if carried % period < dash {
            surface.draw(&PathElement::new(vec![pair[0], pair[1]], style))?;
        }
        carried += (pair[1].0 - pair[0].0).abs().max((pair[1].1 - pair[0].1).abs()).max(1);
    }
    Ok(())
}

/// Text overlay. Missing system fonts only cost the label, never the frame.
pub fn draw_label(
    surface: &Surface<'_>,
    text: &str,
    at: (i32, i32),
    size: u32,
    color: &RGBColor,
    anchor: HPos,
) {
    let style = ("monospace", size)
        .into_font()
        .color(color)
        .pos(Pos::new(anchor, VPos::Center));
    if let Err(e) = surface.draw(&Text::new(text.to_owned(), at, style)) {
        log::trace!("label {text:?} skipped: {e:?}");
    }
}

/// Filled, outlined status box with centred text.
pub fn draw_badge(
    surface: &Surface<'_>,
    text: &str,
    top_left: (i32, i32),
    size: (i32, i32),
    accent: &RGBColor,
) -> Result<(), BenchError> {
    let bottom_right = (top_left.0 + size.0, top_left.1 + size.1);
    surface.draw(&Rectangle::new([top_left, bottom_right], accent.mix(0.2).filled()))?;
    surface.draw(&Rectangle::new([top_left, bottom_right], accent.stroke_width(1)))?;
    draw_label(
        surface,
        text,
        (top_left.0 + size.0 / 2, top_left.1 + size.1 / 2),
        14,
        accent,
        HPos::Center,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_canvas() {
        assert!(matches!(
            Canvas::new(0, 10),
            Err(BenchError::InvalidCanvas { width: 0, height: 10 })
        ));
    }

    #[test]
    fn fill_and_png_export() {
        let mut canvas = Canvas::new(32, 16).unwrap();
        {
            let surface = canvas.surface();
            surface.fill(&RGBColor(15, 23, 42)).unwrap();
            surface.present().unwrap();
        }
        assert_eq!(canvas.pixel(5, 5), Some([15, 23, 42]));
        assert_eq!(canvas.pixel(32, 0), None);
        let png = canvas.to_png().unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    fn grid_lines_land_on_borders() {
        let mut canvas = Canvas::new(101, 81).unwrap();
        {
            let surface = canvas.surface();
            surface.fill(&BLACK).unwrap();
            draw_grid(&surface, 10, 8, &WHITE).unwrap();
            surface.present().unwrap();
        }
        assert_eq!(canvas.pixel(0, 40), Some([255, 255, 255]));
        assert_eq!(canvas.pixel(10, 45), Some([255, 255, 255]));
        assert_eq!(canvas.pixel(5, 5), Some([0, 0, 0]));
    }

    #[test]
    fn colour_helpers() {
        assert_eq!(parse_hex_color("#3b82f6"), Some(RGBColor(0x3b, 0x82, 0xf6)));
        assert_eq!(parse_hex_color("zz82f6"), None);
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(hsl_color(0.0, 1.0, 0.5), RGBColor(255, 0, 0));
        assert_eq!(hsl_color(120.0, 1.0, 0.5), RGBColor(0, 255, 0));
        assert_eq!(hsl_color(240.0, 1.0, 0.5), RGBColor(0, 0, 255));
    }
}
