use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut, draw_polygon_mut, Blend,
};
use imageproc::point::Point;
use imageproc::rect::Rect;

use crate::error::{ExportError, Result};
use crate::settings::{Color, FrameFormat};

pub const JPEG_QUALITY: u8 = 80;

/// Halo rings drawn around a glowing shape, outermost first.
const GLOW_RINGS: usize = 4;
const GLOW_RING_ALPHA: f32 = 0.12;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Paint {
    pub color: Color,
    /// Opacity in 0..=1.
    pub alpha: f32,
    /// Glow radius in pixels; 0 draws a hard edge only.
    pub glow: f32,
}

impl Paint {
    pub fn solid(color: Color) -> Self {
        Self {
            color,
            alpha: 1.0,
            glow: 0.0,
        }
    }

    pub fn with_alpha(self, alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            ..self
        }
    }

    pub fn with_glow(self, glow: f32) -> Self {
        Self {
            glow: glow.max(0.0),
            ..self
        }
    }

    fn halo_rings(&self) -> impl Iterator<Item = (f32, Paint)> + '_ {
        let rings = if self.glow > 0.0 { GLOW_RINGS } else { 0 };
        (0..rings).map(move |i| {
            let spread = self.glow * (rings - i) as f32 / rings as f32;
            let paint = Paint {
                color: self.color,
                alpha: self.alpha * GLOW_RING_ALPHA,
                glow: 0.0,
            };
            (spread, paint)
        })
    }
}

/// 2D raster target the style renderers draw into.
///
/// Coordinates are in pixels with the origin at the top-left corner.
/// Rectangles cover the pixels whose centres they contain; every shape is
/// blended source-over.
pub trait Surface {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn clear(&mut self, color: Color);

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, paint: &Paint);

    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, paint: &Paint);

    /// Even-odd fill of a closed polygon.
    fn fill_polygon(&mut self, points: &[(f32, f32)], paint: &Paint);

    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, paint: &Paint);

    fn stroke_polyline(&mut self, points: &[(f32, f32)], width: f32, paint: &Paint) {
        for pair in points.windows(2) {
            self.stroke_line(pair[0], pair[1], width, paint);
        }
    }

    fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]>;

    /// Serialize the current contents as a still image.
    fn encode(&self, format: FrameFormat) -> Result<Vec<u8>>;
}

/// Creates drawing surfaces at export resolution.
pub trait SurfaceFactory {
    fn create(&self, width: u32, height: u32) -> Result<Box<dyn Surface>>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RasterSurfaceFactory;

impl SurfaceFactory for RasterSurfaceFactory {
    fn create(&self, width: u32, height: u32) -> Result<Box<dyn Surface>> {
        Ok(Box::new(RasterSurface::new(width, height)?))
    }
}

/// CPU surface backed by an `image::RgbaImage`, drawn with `imageproc`.
///
/// The canvas is wrapped in [`Blend`] so every primitive composites
/// source-over instead of replacing pixels.
pub struct RasterSurface {
    canvas: Blend<RgbaImage>,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ExportError::Resource(format!("empty surface {width}x{height}")));
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(4))
            .ok_or_else(|| ExportError::Resource(format!("surface {width}x{height} too large")))?;

        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(len)
            .map_err(|e| ExportError::Resource(format!("surface {width}x{height}: {e}")))?;
        buffer.resize(len, 0);

        let image = RgbaImage::from_raw(width, height, buffer)
            .ok_or_else(|| ExportError::Resource(format!("surface {width}x{height}")))?;
        Ok(Self {
            canvas: Blend(image),
        })
    }

    pub fn image(&self) -> &RgbaImage {
        &self.canvas.0
    }

    /// First pixel whose centre lies at or beyond edge `v`, kept within one
    /// pixel of the canvas.
    fn edge(v: f32, limit: u32) -> i32 {
        (v - 0.5).ceil().clamp(-1.0, limit as f32 + 1.0) as i32
    }

    fn raw_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba<u8>) {
        if width <= 0.0 || height <= 0.0 || color[3] == 0 {
            return;
        }
        let (w, h) = self.canvas.0.dimensions();
        let (x0, x1) = (Self::edge(x, w), Self::edge(x + width, w));
        let (y0, y1) = (Self::edge(y, h), Self::edge(y + height, h));
        if x1 <= x0 || y1 <= y0 {
            return;
        }
        let rect = Rect::at(x0, y0).of_size((x1 - x0) as u32, (y1 - y0) as u32);
        draw_filled_rect_mut(&mut self.canvas, rect, color);
    }

    fn raw_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgba<u8>) {
        if radius < 0.5 || color[3] == 0 || !cx.is_finite() || !cy.is_finite() {
            return;
        }
        let (w, h) = self.canvas.0.dimensions();
        if cx + radius < 0.0 || cy + radius < 0.0 || cx - radius > w as f32 || cy - radius > h as f32 {
            return;
        }
        let center = (cx.floor() as i32, cy.floor() as i32);
        draw_filled_circle_mut(&mut self.canvas, center, radius.round() as i32, color);
    }

    fn raw_polygon(&mut self, points: &[(f32, f32)], color: Rgba<u8>) {
        if color[3] == 0 {
            return;
        }
        let mut poly: Vec<Point<i32>> = points
            .iter()
            .map(|&(x, y)| Point::new(x.round() as i32, y.round() as i32))
            .collect();
        poly.dedup();
        while poly.len() > 1 && poly.first() == poly.last() {
            poly.pop();
        }
        if poly.len() < 3 {
            return;
        }
        draw_polygon_mut(&mut self.canvas, &poly, color);
    }

    fn raw_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Rgba<u8>) {
        if width <= THIN_LINE {
            if width > 0.0 && color[3] > 0 {
                draw_line_segment_mut(&mut self.canvas, from, to, color);
            }
        } else if let Some(quad) = line_quad(from, to, width) {
            self.raw_polygon(&quad, color);
        }
    }
}

/// Strokes at most this wide are drawn as single-pixel segments.
const THIN_LINE: f32 = 1.5;

fn rgba(color: Color, alpha: f32) -> Rgba<u8> {
    Rgba([color.r, color.g, color.b, (alpha.clamp(0.0, 1.0) * 255.0).round() as u8])
}

fn line_quad(from: (f32, f32), to: (f32, f32), width: f32) -> Option<[(f32, f32); 4]> {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let len = (dx * dx + dy * dy).sqrt();
    if len <= f32::EPSILON || width <= 0.0 {
        return None;
    }
    let (nx, ny) = (-dy / len * width / 2.0, dx / len * width / 2.0);
    Some([
        (from.0 + nx, from.1 + ny),
        (to.0 + nx, to.1 + ny),
        (to.0 - nx, to.1 - ny),
        (from.0 - nx, from.1 - ny),
    ])
}

impl Surface for RasterSurface {
    fn width(&self) -> u32 {
        self.canvas.0.width()
    }

    fn height(&self) -> u32 {
        self.canvas.0.height()
    }

    fn clear(&mut self, color: Color) {
        let px = Rgba([color.r, color.g, color.b, 255]);
        for pixel in self.canvas.0.pixels_mut() {
            *pixel = px;
        }
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, paint: &Paint) {
        for (spread, halo) in paint.halo_rings() {
            self.raw_rect(
                x - spread,
                y - spread,
                width + 2.0 * spread,
                height + 2.0 * spread,
                rgba(halo.color, halo.alpha),
            );
        }
        self.raw_rect(x, y, width, height, rgba(paint.color, paint.alpha));
    }

    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, paint: &Paint) {
        for (spread, halo) in paint.halo_rings() {
            self.raw_circle(cx, cy, radius + spread, rgba(halo.color, halo.alpha));
        }
        self.raw_circle(cx, cy, radius, rgba(paint.color, paint.alpha));
    }

    fn fill_polygon(&mut self, points: &[(f32, f32)], paint: &Paint) {
        self.raw_polygon(points, rgba(paint.color, paint.alpha));
    }

    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), width: f32, paint: &Paint) {
        for (spread, halo) in paint.halo_rings() {
            self.raw_line(from, to, width + 2.0 * spread, rgba(halo.color, halo.alpha));
        }
        self.raw_line(from, to, width, rgba(paint.color, paint.alpha));
    }

    fn stroke_polyline(&mut self, points: &[(f32, f32)], width: f32, paint: &Paint) {
        for pair in points.windows(2) {
            self.stroke_line(pair[0], pair[1], width, paint);
        }
        // round joints
        if width > 2.0 && points.len() > 2 {
            let color = rgba(paint.color, paint.alpha);
            for &(x, y) in &points[1..points.len() - 1] {
                self.raw_circle(x, y, width / 2.0, color);
            }
        }
    }

    fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let image = &self.canvas.0;
        if x < image.width() && y < image.height() {
            Some(image.get_pixel(x, y).0)
        } else {
            None
        }
    }

    fn encode(&self, format: FrameFormat) -> Result<Vec<u8>> {
        let image = &self.canvas.0;
        let (width, height) = image.dimensions();
        let mut bytes = Vec::new();
        match format {
            FrameFormat::Png => {
                PngEncoder::new(&mut bytes).write_image(
                    image.as_raw(),
                    width,
                    height,
                    ExtendedColorType::Rgba8,
                )?;
            }
            FrameFormat::Jpeg => {
                let rgb: Vec<u8> = image
                    .pixels()
                    .flat_map(|p| [p[0], p[1], p[2]])
                    .collect();
                JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY).write_image(
                    &rgb,
                    width,
                    height,
                    ExtendedColorType::Rgb8,
                )?;
            }
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Color = Color::rgb(255, 0, 0);
    const BLACK: Color = Color::rgb(0, 0, 0);

    fn surface(w: u32, h: u32) -> RasterSurface {
        let mut s = RasterSurface::new(w, h).unwrap();
        s.clear(BLACK);
        s
    }

    #[test]
    fn rects_cover_pixel_centres() {
        let mut s = surface(10, 10);
        s.fill_rect(2.0, 2.0, 3.0, 2.0, &Paint::solid(RED));
        assert_eq!(s.pixel(2, 2), Some([255, 0, 0, 255]));
        assert_eq!(s.pixel(4, 3), Some([255, 0, 0, 255]));
        assert_eq!(s.pixel(5, 3), Some([0, 0, 0, 255]));
        assert_eq!(s.pixel(2, 4), Some([0, 0, 0, 255]));
        assert_eq!(s.pixel(10, 0), None);
    }

    #[test]
    fn alpha_blends_over_background() {
        let mut s = surface(4, 4);
        s.fill_rect(0.0, 0.0, 4.0, 4.0, &Paint::solid(RED).with_alpha(0.5));
        let [r, g, _, a] = s.pixel(1, 1).unwrap();
        assert!((r as i32 - 128).abs() <= 1);
        assert_eq!(g, 0);
        assert!(a >= 254);
    }

    #[test]
    fn glow_spills_outside_the_shape() {
        let mut s = surface(20, 20);
        s.fill_rect(8.0, 8.0, 4.0, 4.0, &Paint::solid(RED).with_glow(4.0));
        assert!(s.pixel(6, 10).unwrap()[0] > 0);
        assert_eq!(s.pixel(1, 1), Some([0, 0, 0, 255]));
    }

    #[test]
    fn shapes_clip_to_bounds() {
        let mut s = surface(8, 8);
        s.fill_circle(0.0, 0.0, 50.0, &Paint::solid(RED));
        s.fill_rect(-100.0, -100.0, 1000.0, 1000.0, &Paint::solid(RED));
        s.stroke_line((-5.0, 4.0), (50.0, 4.0), 2.0, &Paint::solid(RED));
        assert_eq!(s.pixel(7, 7), Some([255, 0, 0, 255]));
    }

    #[test]
    fn polygon_fills_interior() {
        let mut s = surface(10, 10);
        s.fill_polygon(&[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)], &Paint::solid(RED));
        assert_eq!(s.pixel(1, 1).unwrap()[0], 255);
        assert_eq!(s.pixel(9, 9).unwrap()[0], 0);
    }

    #[test]
    fn encodes_png_and_jpeg() {
        let mut s = surface(16, 8);
        s.fill_circle(8.0, 4.0, 3.0, &Paint::solid(RED));
        let png = s.encode(FrameFormat::Png).unwrap();
        assert_eq!(&png[1..4], b"PNG");
        let jpeg = s.encode(FrameFormat::Jpeg).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn zero_sized_surface_is_a_resource_error() {
        assert!(matches!(
            RasterSurface::new(0, 10),
            Err(ExportError::Resource(_))
        ));
    }
}
