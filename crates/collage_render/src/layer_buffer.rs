//! Layer storage buffer

use collage_core::{Layer, LayerStore};

/// GPU copy of the layer store, sized for the store's full capacity.
pub struct LayerBuffer {
    buffer: wgpu::Buffer,
    capacity: usize,
}

impl LayerBuffer {
    pub fn new(device: &wgpu::Device, capacity: usize) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Layer Buffer"),
            size: Self::byte_size(capacity),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self { buffer, capacity }
    }

    /// Buffer size for `capacity` layers; never zero so the binding stays valid.
    pub fn byte_size(capacity: usize) -> u64 {
        (capacity.max(1) * std::mem::size_of::<Layer>()) as u64
    }

    pub fn upload(&self, queue: &wgpu::Queue, store: &LayerStore) {
        let bytes = store.as_bytes();
        if bytes.is_empty() {
            return;
        }
        // Stores restored from history never exceed their own capacity.
        let len = bytes.len().min(self.buffer.size() as usize);
        queue.write_buffer(&self.buffer, 0, &bytes[..len]);
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_size_has_room_for_every_layer() {
        assert_eq!(LayerBuffer::byte_size(2048), 2048 * 64);
        assert_eq!(LayerBuffer::byte_size(0), 64);
    }
}
