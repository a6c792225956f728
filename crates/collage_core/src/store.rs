// store.rs - Fixed-capacity ordered layer store with selection bookkeeping

use crate::layer::{Layer, LayerFlags, NO_RESOURCE};
use crate::math::{Bbox, Vec2};
use crate::resource::ResourceHandle;
use std::collections::HashMap;
use thiserror::Error;

/// Errors from structural edits. An error always means nothing was mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayerError {
    #[error("layer store is full ({capacity} layers)")]
    CapacityExceeded { capacity: usize },

    #[error("layer index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("cannot move layer {index} onto itself")]
    SameIndex { index: usize },

    #[error("resource slot {slot} is already bound to a different registry")]
    ForeignResource { slot: u16 },
}

/// One kept handle per distinct resource slot, shared by every layer using it.
#[derive(Debug, Clone)]
struct Binding {
    handle: ResourceHandle,
    uses: usize,
}

/// Which layer field a slot index lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Texture,
    Mask,
}

/// Bindings per channel. A slot number in one channel always names the same
/// registry slot; texture and mask may come from different registries.
#[derive(Debug, Clone, Default)]
struct Bindings {
    textures: HashMap<u16, Binding>,
    masks: HashMap<u16, Binding>,
}

impl Bindings {
    fn table(&self, channel: Channel) -> &HashMap<u16, Binding> {
        match channel {
            Channel::Texture => &self.textures,
            Channel::Mask => &self.masks,
        }
    }

    fn table_mut(&mut self, channel: Channel) -> &mut HashMap<u16, Binding> {
        match channel {
            Channel::Texture => &mut self.textures,
            Channel::Mask => &mut self.masks,
        }
    }

    /// False when `handle`'s slot is already bound to another registry's handle.
    fn accepts(&self, channel: Channel, handle: &ResourceHandle) -> bool {
        self.table(channel)
            .get(&handle.resource_index())
            .map_or(true, |binding| binding.handle == *handle)
    }
}

/// Ordered layers, back-most first.
///
/// Layers only store resource slot indices. The store keeps one handle per
/// distinct slot in use, so a snapshot of the store keeps its textures alive
/// for as long as the snapshot exists.
#[derive(Debug, Clone)]
pub struct LayerStore {
    layers: Vec<Layer>,
    capacity: usize,
    num_selected: usize,
    triangle_count: usize,
    bindings: Bindings,
}

impl LayerStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            layers: Vec::with_capacity(capacity),
            capacity,
            num_selected: 0,
            triangle_count: 0,
            bindings: Bindings::default(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.layers.len() == self.capacity
    }

    /// Contiguous layer records, ready for GPU upload.
    #[inline]
    pub fn data(&self) -> &[Layer] {
        &self.layers
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.layers)
    }

    pub fn get(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    /// Sum of `mesh_len` over all layers.
    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    /// Append a layer on top.
    ///
    /// A pre-set selection bit is counted. Resource indices the store does not
    /// already hold a handle for are replaced with [`NO_RESOURCE`].
    pub fn add(&mut self, mut layer: Layer) -> Result<(), LayerError> {
        if self.is_full() {
            tracing::warn!(capacity = self.capacity, "layer store full");
            return Err(LayerError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        if !self.retain_slot(Channel::Texture, layer.texture) {
            layer.texture = NO_RESOURCE;
            layer.remove_flags(LayerFlags::HAS_COLOR_TEX);
        }
        if !self.retain_slot(Channel::Mask, layer.mask) {
            layer.mask = NO_RESOURCE;
        }

        if layer.is_selected() {
            self.num_selected += 1;
        }
        self.triangle_count += layer.mesh_len as usize;
        self.layers.push(layer);
        Ok(())
    }

    /// Append a layer sampling `texture` as colour and `mask` as alpha.
    ///
    /// Invalid handles leave the corresponding field at [`NO_RESOURCE`]. A
    /// valid texture handle also sets [`LayerFlags::HAS_COLOR_TEX`]; which
    /// alpha flag a mask uses is up to the caller.
    ///
    /// Every texture must come from one registry, and every mask from one
    /// registry. A handle whose slot number is already bound to a different
    /// registry is rejected with [`LayerError::ForeignResource`].
    pub fn add_with_resources(
        &mut self,
        mut layer: Layer,
        texture: &ResourceHandle,
        mask: &ResourceHandle,
    ) -> Result<(), LayerError> {
        if self.is_full() {
            tracing::warn!(capacity = self.capacity, "layer store full");
            return Err(LayerError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        for (channel, handle) in [(Channel::Texture, texture), (Channel::Mask, mask)] {
            if handle.valid() && !self.bindings.accepts(channel, handle) {
                let slot = handle.resource_index();
                tracing::warn!(slot, ?channel, "resource handle from a second registry");
                return Err(LayerError::ForeignResource { slot });
            }
        }

        layer.texture = NO_RESOURCE;
        layer.mask = NO_RESOURCE;

        if texture.valid() {
            self.bind(Channel::Texture, texture);
            layer.texture = texture.resource_index();
            layer.insert_flags(LayerFlags::HAS_COLOR_TEX);
        }
        if mask.valid() {
            self.bind(Channel::Mask, mask);
            layer.mask = mask.resource_index();
        }

        // `add` takes its own use of each bound slot, drop the extra one taken here.
        let result = self.add(layer);
        self.release_slot(Channel::Texture, layer.texture);
        self.release_slot(Channel::Mask, layer.mask);
        result
    }

    /// Move the layer at `from` to `to`, shifting the layers in between by one.
    pub fn move_layer(&mut self, to: usize, from: usize) -> Result<(), LayerError> {
        let len = self.layers.len();
        if to >= len {
            return Err(LayerError::IndexOutOfBounds { index: to, len });
        }
        if from >= len {
            return Err(LayerError::IndexOutOfBounds { index: from, len });
        }
        if to == from {
            return Err(LayerError::SameIndex { index: to });
        }

        if to < from {
            self.layers[to..=from].rotate_right(1);
        } else {
            self.layers[from..=to].rotate_left(1);
        }
        Ok(())
    }

    /// Delete the layer at `index`, shifting the layers above it down.
    pub fn remove(&mut self, index: usize) -> Result<(), LayerError> {
        if index >= self.layers.len() {
            return Err(LayerError::IndexOutOfBounds {
                index,
                len: self.layers.len(),
            });
        }

        let layer = self.layers.remove(index);
        self.forget(&layer);
        Ok(())
    }

    /// Truncate to `new_len` layers. No-op when already that short.
    pub fn remove_top(&mut self, new_len: usize) {
        if new_len >= self.layers.len() {
            return;
        }
        let removed: Vec<Layer> = self.layers.drain(new_len..).collect();
        for layer in &removed {
            self.forget(layer);
        }
    }

    /// Handle kept for the texture of the layer at `index`.
    pub fn texture(&self, index: usize) -> Option<&ResourceHandle> {
        let layer = self.layers.get(index)?;
        self.bindings.textures.get(&layer.texture).map(|b| &b.handle)
    }

    /// Handle kept for the mask of the layer at `index`.
    pub fn mask(&self, index: usize) -> Option<&ResourceHandle> {
        let layer = self.layers.get(index)?;
        self.bindings.masks.get(&layer.mask).map(|b| &b.handle)
    }

    /// Set or clear the selection bit. Returns whether the bit changed.
    pub fn change_selection(&mut self, index: usize, selected: bool) -> bool {
        let Some(layer) = self.layers.get_mut(index) else {
            return false;
        };
        if layer.is_selected() == selected {
            return false;
        }

        layer.set_selected(selected);
        if selected {
            self.num_selected += 1;
        } else {
            self.num_selected -= 1;
        }
        true
    }

    pub fn clear_selection(&mut self) {
        for layer in &mut self.layers {
            layer.set_selected(false);
        }
        self.num_selected = 0;
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.layers.get(index).is_some_and(Layer::is_selected)
    }

    #[inline]
    pub fn num_selected(&self) -> usize {
        self.num_selected
    }

    /// Index of the only selected layer, if exactly one is selected and it carries a colour texture.
    pub fn single_selected_image(&self) -> Option<usize> {
        if self.num_selected != 1 {
            return None;
        }
        self.layers.iter().position(|layer| {
            layer.is_selected() && layer.flags().contains(LayerFlags::HAS_COLOR_TEX)
        })
    }

    pub fn selected_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.layers
            .iter()
            .enumerate()
            .filter(|(_, layer)| layer.is_selected())
            .map(|(index, _)| index)
    }

    /// Union of the selected layers' bounds, empty when nothing is selected.
    pub fn selection_bbox(&self) -> Bbox {
        self.layers
            .iter()
            .filter(|layer| layer.is_selected())
            .fold(Bbox::EMPTY, |bbox, layer| bbox.union(layer.bbox()))
    }

    pub fn move_selection(&mut self, offset: Vec2) {
        for layer in self.layers.iter_mut().filter(|layer| layer.is_selected()) {
            layer.offset += offset;
        }
    }

    /// Rotate selected layers by `angle` radians around `center`.
    pub fn rotate_selection(&mut self, center: Vec2, angle: f32) {
        let rotation = Vec2::from_angle(angle);
        for layer in self.layers.iter_mut().filter(|layer| layer.is_selected()) {
            layer.basis_a = rotation.rotate(layer.basis_a);
            layer.basis_b = rotation.rotate(layer.basis_b);
            layer.offset = crate::math::rotate_about(layer.offset, center, rotation);
        }
    }

    /// Scale selected layers component-wise around `center`. Negative components mirror.
    pub fn scale_selection(&mut self, center: Vec2, amount: Vec2) {
        let font_scale = (amount.x.abs() + amount.y.abs()) * 0.5;
        for layer in self.layers.iter_mut().filter(|layer| layer.is_selected()) {
            layer.basis_a *= amount;
            layer.basis_b *= amount;
            layer.offset = (layer.offset - center) * amount + center;

            if layer.flags().contains(LayerFlags::HAS_SDF_ALPHA_TEX) {
                let size = layer.font_size();
                layer.set_font_size(size * font_scale);
            }
        }
    }

    /// Move the selected layers above (or, with `reverse`, below) all others,
    /// keeping relative order inside both groups.
    pub fn bring_front_selection(&mut self, reverse: bool) {
        if self.num_selected == 0 || self.num_selected == self.layers.len() {
            return;
        }

        let (selected, unselected): (Vec<Layer>, Vec<Layer>) =
            self.layers.iter().partition(|layer| layer.is_selected());

        self.layers.clear();
        if reverse {
            self.layers.extend(selected);
            self.layers.extend(unselected);
        } else {
            self.layers.extend(unselected);
            self.layers.extend(selected);
        }
    }

    /// Copy every selected layer on top, shifted by `offset`.
    ///
    /// Copies share their originals' resources and are not selected. Stops
    /// quietly when the store fills up and returns the number of copies made.
    pub fn duplicate_selection(&mut self, offset: Vec2) -> usize {
        let copies: Vec<Layer> = self
            .layers
            .iter()
            .filter(|layer| layer.is_selected())
            .map(|layer| {
                let mut copy = *layer;
                copy.offset += offset;
                copy.set_selected(false);
                copy
            })
            .collect();

        let mut added = 0;
        for copy in copies {
            if self.add(copy).is_err() {
                break;
            }
            added += 1;
        }
        added
    }

    /// Delete every selected layer, compacting the rest in order.
    pub fn remove_selection(&mut self) {
        if self.num_selected == 0 {
            return;
        }

        let (removed, kept): (Vec<Layer>, Vec<Layer>) =
            self.layers.drain(..).partition(|layer| layer.is_selected());
        self.layers = kept;
        for layer in &removed {
            self.forget(layer);
        }
    }

    /// Deep copy for the history ring, sized to the live layers.
    pub fn snapshot(&self) -> LayerStore {
        self.clone()
    }

    /// Replace the contents with `source`, keeping this store's capacity.
    ///
    /// Layers beyond the capacity are dropped along with their resource uses.
    pub fn restore_from(&mut self, source: &LayerStore) {
        let len = source.len().min(self.capacity);

        self.layers.clear();
        self.layers.extend_from_slice(&source.layers[..len]);
        self.bindings = source.bindings.clone();

        for layer in &source.layers[len..] {
            self.release_slot(Channel::Texture, layer.texture);
            self.release_slot(Channel::Mask, layer.mask);
        }

        self.num_selected = self.layers.iter().filter(|layer| layer.is_selected()).count();
        self.recalculate_triangle_count();
    }

    fn bind(&mut self, channel: Channel, handle: &ResourceHandle) {
        let slot = handle.resource_index();
        self.bindings
            .table_mut(channel)
            .entry(slot)
            .or_insert_with(|| Binding {
                handle: handle.clone(),
                uses: 0,
            })
            .uses += 1;
    }

    /// Take another use of a slot the store already holds. False for unknown slots.
    fn retain_slot(&mut self, channel: Channel, slot: u16) -> bool {
        if slot == NO_RESOURCE {
            return false;
        }
        match self.bindings.table_mut(channel).get_mut(&slot) {
            Some(binding) => {
                binding.uses += 1;
                true
            }
            None => false,
        }
    }

    fn release_slot(&mut self, channel: Channel, slot: u16) {
        if slot == NO_RESOURCE {
            return;
        }
        let table = self.bindings.table_mut(channel);
        if let Some(binding) = table.get_mut(&slot) {
            binding.uses -= 1;
            if binding.uses == 0 {
                table.remove(&slot);
            }
        }
    }

    /// Drop the bookkeeping of a layer that left the store.
    fn forget(&mut self, layer: &Layer) {
        if layer.is_selected() {
            self.num_selected -= 1;
        }
        self.triangle_count -= layer.mesh_len as usize;
        self.release_slot(Channel::Texture, layer.texture);
        self.release_slot(Channel::Mask, layer.mask);
    }

    fn recalculate_triangle_count(&mut self) {
        self.triangle_count = self.layers.iter().map(|layer| layer.mesh_len as usize).sum();
    }
}
