//! Mesh manager
//!
//! All meshes share one triangle array so the shaders can index them from a
//! single storage buffer. A layer points at its mesh with `mesh_start`/`mesh_len`.

use crate::AssetError;
use bytemuck::{Pod, Zeroable};

/// Index of the unit square registered by [`MeshManager::with_unit_square`].
pub const UNIT_SQUARE_MESH: usize = 0;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Position in layer space, the unit quad spans -0.5..0.5.
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Triangle {
    pub v1: Vertex,
    pub v2: Vertex,
    pub v3: Vertex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshInfo {
    pub start: u16,
    pub len: u16,
}

#[derive(Debug)]
pub struct MeshManager {
    triangles: Vec<Triangle>,
    meshes: Vec<MeshInfo>,
    max_triangles: usize,
}

impl MeshManager {
    /// Triangle indices are stored as `u16` in layers, so more than that is never addressable.
    pub fn new(max_triangles: usize) -> Self {
        Self {
            triangles: Vec::new(),
            meshes: Vec::new(),
            max_triangles: max_triangles.min(u16::MAX as usize),
        }
    }

    /// Manager with the unit square pre-registered as mesh [`UNIT_SQUARE_MESH`].
    pub fn with_unit_square(max_triangles: usize) -> Result<Self, AssetError> {
        let mut manager = Self::new(max_triangles);
        manager.add(&unit_square())?;
        Ok(manager)
    }

    /// Append a mesh and return where it landed.
    pub fn add(&mut self, triangles: &[Triangle]) -> Result<MeshInfo, AssetError> {
        if triangles.is_empty() {
            return Err(AssetError::EmptyMesh);
        }

        let available = self.max_triangles - self.triangles.len();
        if triangles.len() > available {
            tracing::warn!(requested = triangles.len(), available, "mesh arena full");
            return Err(AssetError::MeshFull {
                requested: triangles.len(),
                available,
            });
        }

        let info = MeshInfo {
            start: self.triangles.len() as u16,
            len: triangles.len() as u16,
        };
        self.triangles.extend_from_slice(triangles);
        self.meshes.push(info);
        Ok(info)
    }

    pub fn mesh_info(&self, index: usize) -> Option<MeshInfo> {
        self.meshes.get(index).copied()
    }

    pub fn num_meshes(&self) -> usize {
        self.meshes.len()
    }

    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    pub fn max_triangles(&self) -> usize {
        self.max_triangles
    }

    pub fn data(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.triangles)
    }

    pub fn size_bytes(&self) -> usize {
        self.triangles.len() * std::mem::size_of::<Triangle>()
    }
}

fn unit_square() -> [Triangle; 2] {
    let vertex = |x: f32, y: f32| Vertex {
        position: [x - 0.5, y - 0.5],
        uv: [x, y],
    };
    [
        Triangle {
            v1: vertex(0.0, 0.0),
            v2: vertex(1.0, 0.0),
            v3: vertex(1.0, 1.0),
        },
        Triangle {
            v1: vertex(0.0, 0.0),
            v2: vertex(1.0, 1.0),
            v3: vertex(0.0, 1.0),
        },
    ]
}
