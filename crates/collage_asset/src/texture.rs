//! Texture manager
//!
//! Textures live in a reference-counted registry. Layers only store the
//! registry slot; the returned handle (and any layer store holding it) keeps
//! the texture alive.

use crate::AssetError;
use collage_core::{ResourceHandle, ResourceRegistry, NO_RESOURCE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    /// 1 (alpha mask) or 4 (RGBA).
    pub channels: u32,
}

impl TextureDesc {
    pub fn rgba(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            channels: 4,
        }
    }

    pub fn mask(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            channels: 1,
        }
    }

    /// Size in bytes of tightly packed pixel data.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }

    /// Checks the channel count and that neither dimension is zero.
    pub fn validate(&self) -> Result<(), AssetError> {
        if self.channels != 1 && self.channels != 4 {
            return Err(AssetError::UnsupportedChannels {
                channels: self.channels,
            });
        }
        if self.width == 0 || self.height == 0 {
            return Err(AssetError::EmptyTexture {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

/// What a shader should sample for a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureBinding {
    Slot(u16),
    /// The 1x1 white fallback.
    Default,
}

struct Entry<T> {
    desc: TextureDesc,
    payload: T,
}

/// Registry of textures with backend payload `T` (e.g. a GPU texture).
pub struct TextureManager<T: 'static> {
    registry: ResourceRegistry<Entry<T>>,
}

impl<T: 'static> TextureManager<T> {
    pub fn new(max_textures: usize) -> Self {
        let registry = ResourceRegistry::with_release_hook(max_textures, |slot, entry: Entry<T>| {
            tracing::debug!(
                slot,
                width = entry.desc.width,
                height = entry.desc.height,
                "texture released"
            );
        });
        Self { registry }
    }

    /// Register a texture. Freed slots are reused.
    pub fn add(&self, desc: TextureDesc, payload: T) -> Result<ResourceHandle, AssetError> {
        desc.validate()?;
        if self.registry.is_full() {
            return Err(AssetError::TexturesFull {
                capacity: self.registry.max_length(),
            });
        }

        let handle = self.registry.insert(Entry { desc, payload });
        tracing::debug!(
            slot = handle.resource_index(),
            width = desc.width,
            height = desc.height,
            channels = desc.channels,
            "texture added"
        );
        Ok(handle)
    }

    pub fn resolve(&self, handle: &ResourceHandle) -> TextureBinding {
        if self.registry.owns(handle) {
            TextureBinding::Slot(handle.resource_index())
        } else {
            TextureBinding::Default
        }
    }

    /// Binding for a layer's `texture` or `mask` field.
    pub fn resolve_slot(&self, slot: u16) -> TextureBinding {
        if slot == NO_RESOURCE {
            return TextureBinding::Default;
        }
        match self.registry.ref_count(slot as usize) {
            Some(count) if count > 0 => TextureBinding::Slot(slot),
            _ => TextureBinding::Default,
        }
    }

    pub fn desc(&self, handle: &ResourceHandle) -> Option<TextureDesc> {
        self.registry.with(handle, |entry| entry.desc)
    }

    pub fn with<R>(&self, handle: &ResourceHandle, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.registry.with(handle, |entry| f(&entry.payload))
    }

    pub fn with_mut<R>(&self, handle: &ResourceHandle, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.registry.with_mut(handle, |entry| f(&mut entry.payload))
    }

    /// Another handle to a live slot, or an invalid handle.
    pub fn handle(&self, slot: u16) -> ResourceHandle {
        match self.resolve_slot(slot) {
            TextureBinding::Slot(slot) => self.registry.get_handle(slot as usize),
            TextureBinding::Default => ResourceHandle::invalid(),
        }
    }

    pub fn cur_length(&self) -> usize {
        self.registry.cur_length()
    }

    pub fn max_length(&self) -> usize {
        self.registry.max_length()
    }
}

impl<T: 'static> std::fmt::Debug for TextureManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureManager")
            .field("textures", &self.cur_length())
            .field("max", &self.max_length())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collage_core::LayerStore;
    use collage_core::{glam::vec2, Layer};

    #[test]
    fn rejects_invalid_descriptors() {
        let textures = TextureManager::new(4);
        assert_eq!(
            textures.add(TextureDesc { width: 2, height: 2, channels: 3 }, ()),
            Err(AssetError::UnsupportedChannels { channels: 3 })
        );
        assert_eq!(
            textures.add(TextureDesc::rgba(0, 8), ()),
            Err(AssetError::EmptyTexture { width: 0, height: 8 })
        );
        assert_eq!(textures.cur_length(), 0);
    }

    #[test]
    fn full_registry_is_an_error() {
        let textures = TextureManager::new(1);
        let _first = textures.add(TextureDesc::mask(1, 1), ()).unwrap();
        assert_eq!(
            textures.add(TextureDesc::mask(1, 1), ()),
            Err(AssetError::TexturesFull { capacity: 1 })
        );
    }

    #[test]
    fn slots_are_reused_after_release() {
        let textures = TextureManager::new(2);
        let a = textures.add(TextureDesc::rgba(4, 4), "a").unwrap();
        let b = textures.add(TextureDesc::rgba(4, 4), "b").unwrap();
        assert_eq!(a.resource_index(), 0);
        assert_eq!(b.resource_index(), 1);

        drop(a);
        assert_eq!(textures.cur_length(), 1);
        let c = textures.add(TextureDesc::rgba(8, 8), "c").unwrap();
        assert_eq!(c.resource_index(), 0);
        assert_eq!(textures.with(&c, |name| *name), Some("c"));
        assert_eq!(textures.desc(&c).map(|d| d.byte_len()), Some(256));
    }

    #[test]
    fn resolve_falls_back_to_default() {
        let textures = TextureManager::new(2);
        let handle = textures.add(TextureDesc::rgba(1, 1), ()).unwrap();
        assert_eq!(textures.resolve(&handle), TextureBinding::Slot(0));
        assert_eq!(textures.resolve(&ResourceHandle::invalid()), TextureBinding::Default);
        assert_eq!(textures.resolve_slot(NO_RESOURCE), TextureBinding::Default);
        assert_eq!(textures.resolve_slot(1), TextureBinding::Default);

        let other = TextureManager::new(2);
        let foreign = other.add(TextureDesc::rgba(1, 1), ()).unwrap();
        assert_eq!(textures.resolve(&foreign), TextureBinding::Default);
    }

    #[test]
    fn layer_store_keeps_texture_alive() {
        let textures = TextureManager::new(2);
        let mut store = LayerStore::new(4);
        {
            let handle = textures.add(TextureDesc::rgba(2, 2), 7u32).unwrap();
            let layer = Layer::quad(vec2(0.0, 0.0), vec2(1.0, 0.0), vec2(0.0, 1.0));
            store
                .add_with_resources(layer, &handle, &ResourceHandle::invalid())
                .unwrap();
        }
        assert_eq!(textures.cur_length(), 1);
        assert_eq!(textures.resolve_slot(store.data()[0].texture), TextureBinding::Slot(0));

        let again = textures.handle(store.data()[0].texture);
        assert_eq!(textures.with(&again, |v| *v), Some(7));
        drop(again);

        store.remove(0).unwrap();
        assert_eq!(textures.cur_length(), 0);
        assert_eq!(textures.resolve_slot(0), TextureBinding::Default);
    }
}
