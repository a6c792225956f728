//! Window/canvas view transform

use crate::math::{Mat4, Vec2, Vec4};

/// Pan and zoom of the canvas inside the window.
///
/// `window = canvas * scale + canvas_pos`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub canvas_pos: Vec2,
    pub scale: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            canvas_pos: Vec2::ZERO,
            scale: 1.0,
        }
    }
}

impl ViewTransform {
    pub fn new(canvas_pos: Vec2, scale: f32) -> Self {
        Self { canvas_pos, scale }
    }

    #[inline]
    pub fn to_canvas(&self, window_pos: Vec2) -> Vec2 {
        (window_pos - self.canvas_pos) / self.scale
    }

    #[inline]
    pub fn to_window(&self, canvas_pos: Vec2) -> Vec2 {
        canvas_pos * self.scale + self.canvas_pos
    }

    /// Canvas-space length of a window-space length.
    pub fn canvas_length(&self, window_length: f32) -> f32 {
        window_length / self.scale
    }

    pub fn pan(&mut self, window_delta: Vec2) {
        self.canvas_pos += window_delta;
    }

    /// Zoom by `exp(scroll * zoom_scale_factor)` keeping the canvas point under
    /// `window_pos` in place.
    pub fn zoom_at(&mut self, window_pos: Vec2, scroll: f32, zoom_scale_factor: f32) {
        let cursor = self.to_canvas(window_pos);
        let new_scale = (self.scale * (scroll * zoom_scale_factor).exp()).max(f32::MIN_POSITIVE);

        let delta_scale = new_scale - self.scale;
        self.scale = new_scale;
        self.canvas_pos -= cursor * delta_scale;
    }

    /// Orthographic projection from canvas space to clip space for a
    /// `width` x `height` window, y pointing down.
    pub fn projection(&self, width: f32, height: f32) -> Mat4 {
        let l = -self.canvas_pos.x / self.scale;
        let r = (width - self.canvas_pos.x) / self.scale;
        let t = -self.canvas_pos.y / self.scale;
        let b = (height - self.canvas_pos.y) / self.scale;

        Mat4::from_cols(
            Vec4::new(2.0 / (r - l), 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 / (t - b), 0.0, 0.0),
            Vec4::new(0.0, 0.0, 0.5, 0.0),
            Vec4::new((r + l) / (l - r), (t + b) / (b - t), 0.5, 1.0),
        )
    }
}
