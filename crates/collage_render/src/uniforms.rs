//! Per-frame view uniforms

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use collage_core::selection::SelectDispatch;
use collage_core::view::ViewTransform;
use glam::Vec2;

bitflags! {
    /// Per-pass switches read by the layer shaders.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ViewFlags: u32 {
        const SELECTION_RASTER_TARGET = 1 << 0;
        const RENDER_SELECTION_OUTLINE = 1 << 1;
    }
}

/// Uniform block shared by every layer pass. Size is a multiple of a `mat4`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ViewUniforms {
    pub proj: [[f32; 4]; 4],
    pub canvas_pos: [f32; 2],
    /// Cursor in canvas space.
    pub mouse_pos: [f32; 2],
    /// Drag start in canvas space.
    pub mouse_select_pos: [f32; 2],
    pub select_dispatch: u32,
    pub view_flags: u32,
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    pub num_layers: u32,
    pub dpi_scale: f32,
    pub ticks: u32,
    _pad: [f32; 2],
}

const _: () = assert!(std::mem::size_of::<ViewUniforms>() == 128);

impl ViewUniforms {
    pub fn new(view: &ViewTransform, width: u32, height: u32) -> Self {
        Self {
            proj: view.projection(width as f32, height as f32).to_cols_array_2d(),
            canvas_pos: view.canvas_pos.to_array(),
            mouse_pos: [0.0; 2],
            mouse_select_pos: [0.0; 2],
            select_dispatch: SelectDispatch::None as u32,
            view_flags: 0,
            width,
            height,
            scale: view.scale,
            num_layers: 0,
            dpi_scale: 1.0,
            ticks: 0,
            _pad: [0.0; 2],
        }
    }

    pub fn with_cursor(mut self, cursor: Vec2, drag_start: Vec2) -> Self {
        self.mouse_pos = cursor.to_array();
        self.mouse_select_pos = drag_start.to_array();
        self
    }

    pub fn with_dispatch(mut self, dispatch: SelectDispatch) -> Self {
        self.select_dispatch = dispatch as u32;
        self
    }

    pub fn with_flags(mut self, flags: ViewFlags) -> Self {
        self.view_flags = flags.bits();
        self
    }

    pub fn with_layers(mut self, num_layers: usize) -> Self {
        self.num_layers = num_layers as u32;
        self
    }

    pub fn with_dpi_scale(mut self, dpi_scale: f32) -> Self {
        self.dpi_scale = dpi_scale;
        self
    }

    pub fn with_ticks(mut self, ticks: u32) -> Self {
        self.ticks = ticks;
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
