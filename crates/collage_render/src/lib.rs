//! Collage Render
//!
//! wgpu-side glue: uniform and storage buffer layouts, texture payloads for
//! the texture manager, and selection readback from the GPU hit test.

pub mod layer_buffer;
pub mod readback;
pub mod texture;
pub mod uniforms;

pub use wgpu;

pub use layer_buffer::LayerBuffer;
pub use readback::{decode_hits, GpuSelection, SelectionReadback};
pub use texture::{upload_texture, GpuTexture};
pub use uniforms::{ViewFlags, ViewUniforms};

use collage_asset::AssetError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("pixel data is {got} bytes, expected {expected}")]
    PixelLength { expected: usize, got: usize },

    #[error("a selection readback is already in flight")]
    ReadbackBusy,

    #[error("{count} triangles exceed the readback capacity of {capacity}")]
    TooManyTriangles { count: usize, capacity: usize },

    #[error("readback buffer map failed: {0}")]
    Map(#[from] wgpu::BufferAsyncError),
}
