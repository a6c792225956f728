//! Collage Assets
//!
//! Texture and mesh managers feeding the layer store

mod error;
pub mod mesh;
pub mod texture;

pub use error::AssetError;
pub use mesh::{MeshInfo, MeshManager, Triangle, Vertex, UNIT_SQUARE_MESH};
pub use texture::{TextureBinding, TextureDesc, TextureManager};
