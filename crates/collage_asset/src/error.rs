use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetError {
    #[error("unsupported channel count {channels} (expected 1 or 4)")]
    UnsupportedChannels { channels: u32 },

    #[error("texture size {width}x{height} is empty")]
    EmptyTexture { width: u32, height: u32 },

    #[error("texture registry full ({capacity} slots)")]
    TexturesFull { capacity: usize },

    #[error("mesh is empty")]
    EmptyMesh,

    #[error("mesh of {requested} triangles does not fit ({available} left)")]
    MeshFull { requested: usize, available: usize },
}
