//! Collage Core
//!
//! Scene-state engine for the composition canvas:
//! - Layer records and the fixed-capacity layer store
//! - Memento history ring for undo/redo
//! - Reference-counted resource registry
//! - Selection dispatch against an asynchronous hit test

pub mod history;
pub mod layer;
pub mod math;
pub mod resource;
pub mod scene;
pub mod selection;
pub mod settings;
pub mod store;
pub mod view;

pub use glam;

pub use history::{HistoryRing, LayerHistory};
pub use layer::{Layer, LayerFlags, NO_RESOURCE, UV_MAX_VALUE};
pub use resource::{ResourceHandle, ResourceRegistry};
pub use scene::{EditCommand, Scene};
pub use settings::CanvasSettings;
pub use store::{LayerError, LayerStore};

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
