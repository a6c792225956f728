//! Layer records
//!
//! A layer is one oriented, textured quad. The struct is uploaded to the GPU
//! as-is, so its field order and size are part of the shader interface.

use crate::math::{Bbox, Mat2, U16Vec2, Vec2};
use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

/// Fixed-point value representing a texture coordinate of 1.0.
pub const UV_MAX_VALUE: u16 = u16::MAX;

/// Sentinel for "no texture / no mask" in the `texture` and `mask` fields.
pub const NO_RESOURCE: u16 = u16::MAX;

bitflags! {
    /// Capability tags carried by a layer. Bit positions are shared with the shaders.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LayerFlags: u32 {
        const SELECTED = 1 << 0;
        const HAS_COLOR_TEX = 1 << 1;
        const HAS_ALPHA_TEX = 1 << 2;
        const HAS_SDF_ALPHA_TEX = 1 << 3;
        const HAS_PILL_ALPHA_TEX = 1 << 4;
        const INVERT_ALPHA = 1 << 5;
    }
}

/// One positioned, textured quad.
///
/// Layout (64 bytes, 4-byte aligned, no padding):
///
/// | bytes  | field                     |
/// |--------|---------------------------|
/// | 0..24  | offset, basis_a, basis_b  |
/// | 24..32 | uv_top, uv_bottom         |
/// | 32..36 | texture, mask             |
/// | 36..40 | color                     |
/// | 40..44 | flags                     |
/// | 44..48 | mesh_start, mesh_len      |
/// | 48..64 | extra                     |
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Layer {
    /// Centre of the quad in canvas space.
    pub offset: Vec2,
    /// First edge vector (full edge length, not half).
    pub basis_a: Vec2,
    /// Second edge vector.
    pub basis_b: Vec2,
    pub uv_top: U16Vec2,
    pub uv_bottom: U16Vec2,
    /// Texture registry slot, or [`NO_RESOURCE`].
    pub texture: u16,
    /// Texture registry slot sampled as alpha, or [`NO_RESOURCE`].
    pub mask: u16,
    /// RGBA tint.
    pub color: [u8; 4],
    flags: u32,
    pub mesh_start: u16,
    pub mesh_len: u16,
    /// Kind-specific parameters: outline colour, outline width, font size, reserved.
    pub extra: [u32; 4],
}

const _: () = assert!(std::mem::size_of::<Layer>() == 64);

impl Layer {
    /// Untextured white quad showing the full UV range.
    pub fn quad(offset: Vec2, basis_a: Vec2, basis_b: Vec2) -> Self {
        Self {
            offset,
            basis_a,
            basis_b,
            uv_top: U16Vec2::ZERO,
            uv_bottom: U16Vec2::splat(UV_MAX_VALUE),
            texture: NO_RESOURCE,
            mask: NO_RESOURCE,
            color: [255; 4],
            flags: 0,
            mesh_start: 0,
            mesh_len: 0,
            extra: [0; 4],
        }
    }

    pub fn with_color(mut self, color: [u8; 4]) -> Self {
        self.color = color;
        self
    }

    pub fn with_uv(mut self, uv_top: U16Vec2, uv_bottom: U16Vec2) -> Self {
        self.uv_top = uv_top;
        self.uv_bottom = uv_bottom;
        self
    }

    pub fn with_flags(mut self, flags: LayerFlags) -> Self {
        self.flags = flags.bits();
        self
    }

    pub fn with_mesh(mut self, start: u16, len: u16) -> Self {
        self.mesh_start = start;
        self.mesh_len = len;
        self
    }

    #[inline]
    pub fn flags(&self) -> LayerFlags {
        LayerFlags::from_bits_retain(self.flags)
    }

    #[inline]
    pub fn is_selected(&self) -> bool {
        self.flags().contains(LayerFlags::SELECTED)
    }

    /// Only the layer store may touch the selection bit; it keeps the counter.
    #[inline]
    pub(crate) fn set_selected(&mut self, selected: bool) {
        let mut flags = self.flags();
        flags.set(LayerFlags::SELECTED, selected);
        self.flags = flags.bits();
    }

    #[inline]
    pub(crate) fn insert_flags(&mut self, flags: LayerFlags) {
        self.flags |= flags.bits();
    }

    #[inline]
    pub(crate) fn remove_flags(&mut self, flags: LayerFlags) {
        self.flags &= !flags.bits();
    }

    /// True when the layer samples an alpha mask from the `mask` slot.
    pub fn uses_mask(&self) -> bool {
        self.flags()
            .intersects(LayerFlags::HAS_ALPHA_TEX | LayerFlags::HAS_SDF_ALPHA_TEX)
    }

    /// Corners in order top-left, top-right, bottom-right, bottom-left
    /// (relative to the basis vectors).
    pub fn corners(&self) -> [Vec2; 4] {
        let a = self.basis_a * 0.5;
        let b = self.basis_b * 0.5;
        [
            self.offset - a - b,
            self.offset + a - b,
            self.offset + a + b,
            self.offset - a + b,
        ]
    }

    pub fn bbox(&self) -> Bbox {
        Bbox::from_points(&self.corners())
    }

    /// Point-in-quad test that also handles skewed bases.
    pub fn contains_point(&self, point: Vec2) -> bool {
        let basis = Mat2::from_cols(self.basis_a, self.basis_b);
        if basis.determinant().abs() <= f32::EPSILON {
            return false;
        }
        let local = basis.inverse() * (point - self.offset);
        local.x.abs() <= 0.5 && local.y.abs() <= 0.5
    }

    /// The quad this layer would cover if its UV crop were undone.
    pub fn uncropped(&self) -> Layer {
        let span = self.uv_bottom.as_vec2() - self.uv_top.as_vec2();
        if span.x == 0.0 || span.y == 0.0 {
            return *self;
        }

        let mut layer = *self;
        let scale = Vec2::splat(UV_MAX_VALUE as f32) / span;
        layer.basis_a *= scale.x;
        layer.basis_b *= scale.y;

        let uv_center = (self.uv_top.as_vec2() + self.uv_bottom.as_vec2()) / UV_MAX_VALUE as f32 * 0.5;
        layer.offset -= layer.basis_a * (uv_center.x - 0.5) + layer.basis_b * (uv_center.y - 0.5);

        layer.uv_top = U16Vec2::ZERO;
        layer.uv_bottom = U16Vec2::splat(UV_MAX_VALUE);
        layer
    }

    pub fn outline_color(&self) -> [u8; 4] {
        self.extra[0].to_le_bytes()
    }

    pub fn set_outline_color(&mut self, color: [u8; 4]) {
        self.extra[0] = u32::from_le_bytes(color);
    }

    pub fn outline_width(&self) -> f32 {
        f32::from_bits(self.extra[1])
    }

    pub fn set_outline_width(&mut self, width: f32) {
        self.extra[1] = width.to_bits();
    }

    pub fn font_size(&self) -> f32 {
        f32::from_bits(self.extra[2])
    }

    pub fn set_font_size(&mut self, size: f32) {
        self.extra[2] = size.to_bits();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{u16vec2, vec2};

    #[test]
    fn layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Layer>(), 64);
        assert_eq!(std::mem::align_of::<Layer>(), 4);

        let layer = Layer::quad(vec2(1.0, 2.0), vec2(3.0, 0.0), vec2(0.0, 4.0))
            .with_flags(LayerFlags::HAS_COLOR_TEX);
        let bytes = bytemuck::bytes_of(&layer);
        assert_eq!(&bytes[0..4], &1.0f32.to_ne_bytes());
        assert_eq!(&bytes[32..34], &NO_RESOURCE.to_ne_bytes());
        assert_eq!(&bytes[40..44], &LayerFlags::HAS_COLOR_TEX.bits().to_ne_bytes());
    }

    #[test]
    fn flag_bits_are_stable() {
        assert_eq!(LayerFlags::SELECTED.bits(), 1);
        assert_eq!(LayerFlags::HAS_COLOR_TEX.bits(), 2);
        assert_eq!(LayerFlags::HAS_ALPHA_TEX.bits(), 4);
        assert_eq!(LayerFlags::HAS_SDF_ALPHA_TEX.bits(), 8);
        assert_eq!(LayerFlags::HAS_PILL_ALPHA_TEX.bits(), 16);
    }

    #[test]
    fn selection_bit_round_trips() {
        let mut layer = Layer::quad(Vec2::ZERO, Vec2::X, Vec2::Y).with_flags(LayerFlags::HAS_PILL_ALPHA_TEX);
        layer.set_selected(true);
        assert!(layer.is_selected());
        assert!(layer.flags().contains(LayerFlags::HAS_PILL_ALPHA_TEX));
        layer.set_selected(false);
        assert_eq!(layer.flags(), LayerFlags::HAS_PILL_ALPHA_TEX);
    }

    #[test]
    fn contains_point_respects_rotation() {
        // 45 degree rotated 2x2 square: (0.9, 0.9) is inside the axis box but outside the diamond.
        let rot = Vec2::from_angle(std::f32::consts::FRAC_PI_4);
        let layer = Layer::quad(Vec2::ZERO, rot.rotate(vec2(2.0, 0.0)), rot.rotate(vec2(0.0, 2.0)));
        assert!(layer.contains_point(vec2(0.0, 1.3)));
        assert!(!layer.contains_point(vec2(0.9, 0.9)));
    }

    #[test]
    fn degenerate_quad_contains_nothing() {
        let layer = Layer::quad(Vec2::ZERO, vec2(1.0, 0.0), vec2(2.0, 0.0));
        assert!(!layer.contains_point(Vec2::ZERO));
    }

    #[test]
    fn bbox_covers_corners() {
        let layer = Layer::quad(vec2(10.0, 10.0), vec2(4.0, 0.0), vec2(0.0, 2.0));
        let bbox = layer.bbox();
        assert_eq!(bbox.min, vec2(8.0, 9.0));
        assert_eq!(bbox.max, vec2(12.0, 11.0));
    }

    #[test]
    fn uncropped_expands_right_half_crop() {
        // Right half of the texture, drawn 50 wide centred at the origin.
        let half = UV_MAX_VALUE / 2;
        let layer = Layer::quad(Vec2::ZERO, vec2(50.0, 0.0), vec2(0.0, 100.0))
            .with_uv(u16vec2(half, 0), u16vec2(UV_MAX_VALUE, UV_MAX_VALUE));
        let full = layer.uncropped();
        assert!((full.basis_a.x - 100.0).abs() < 0.01);
        assert!((full.offset.x + 25.0).abs() < 0.01);
        assert_eq!(full.uv_top, U16Vec2::ZERO);
        assert_eq!(full.uv_bottom, U16Vec2::splat(UV_MAX_VALUE));
    }

    #[test]
    fn extra_parameters() {
        let mut layer = Layer::quad(Vec2::ZERO, Vec2::X, Vec2::Y);
        layer.set_font_size(24.0);
        layer.set_outline_width(1.5);
        layer.set_outline_color([1, 2, 3, 4]);
        assert_eq!(layer.font_size(), 24.0);
        assert_eq!(layer.outline_width(), 1.5);
        assert_eq!(layer.outline_color(), [1, 2, 3, 4]);
    }
}
