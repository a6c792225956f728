//! Reference-counted resource registry
//!
//! The registry owns a fixed table of slots. Each slot has a reference count
//! and an optional payload (a GPU texture, a mesh, a font...). A
//! [`ResourceHandle`] is a counted reference to one slot:
//!
//! - cloning a handle increments the count, moving it transfers the count
//! - dropping the last handle releases the payload and frees the slot
//! - handles only hold a weak reference to the registry, so once the
//!   registry is dropped every outstanding handle reads as invalid
//!
//! All of this runs on the main thread; handles are `!Send`.

use crate::layer::NO_RESOURCE;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Called with the slot index and the payload when a slot is released.
pub type ReleaseHook<T> = Box<dyn FnMut(usize, T)>;

struct Slots<T> {
    ref_counts: Vec<usize>,
    payloads: Vec<Option<T>>,
    live: usize,
}

struct Shared<T> {
    slots: RefCell<Slots<T>>,
    on_release: RefCell<Option<ReleaseHook<T>>>,
}

/// Type-erased view of a registry used by handles.
trait RefTarget {
    fn retain(&self, index: usize);
    fn release(&self, index: usize);
}

impl<T> RefTarget for Shared<T> {
    fn retain(&self, index: usize) {
        let mut slots = self.slots.borrow_mut();
        if slots.ref_counts[index] == 0 {
            slots.live += 1;
        }
        slots.ref_counts[index] += 1;
    }

    fn release(&self, index: usize) {
        let payload = {
            let mut slots = self.slots.borrow_mut();
            slots.ref_counts[index] -= 1;
            if slots.ref_counts[index] != 0 {
                return;
            }
            slots.live -= 1;
            slots.payloads[index].take()
        };

        tracing::debug!(slot = index, "resource slot released");

        // The slot borrow is gone: dropping the payload may drop handles into this registry.
        if let Some(payload) = payload {
            match self.on_release.try_borrow_mut() {
                Ok(mut hook) => match hook.as_mut() {
                    Some(hook) => hook(index, payload),
                    None => drop(payload),
                },
                Err(_) => drop(payload),
            }
        }
    }
}

/// Counted reference to a registry slot.
pub struct ResourceHandle {
    target: Option<Weak<dyn RefTarget>>,
    index: u16,
}

impl ResourceHandle {
    /// A handle that refers to nothing and never participates in counting.
    pub const fn invalid() -> Self {
        Self {
            target: None,
            index: NO_RESOURCE,
        }
    }

    /// True while the handle refers to a slot of a registry that is still alive.
    pub fn valid(&self) -> bool {
        self.target
            .as_ref()
            .is_some_and(|target| target.strong_count() > 0)
    }

    /// Slot index, or `None` for invalid handles.
    pub fn index(&self) -> Option<usize> {
        self.valid().then_some(self.index as usize)
    }

    /// Slot index as stored in a layer record: [`NO_RESOURCE`] when invalid.
    pub fn resource_index(&self) -> u16 {
        if self.valid() {
            self.index
        } else {
            NO_RESOURCE
        }
    }
}

impl Default for ResourceHandle {
    fn default() -> Self {
        Self::invalid()
    }
}

impl Clone for ResourceHandle {
    fn clone(&self) -> Self {
        match self.target.as_ref().and_then(Weak::upgrade) {
            Some(target) => {
                target.retain(self.index as usize);
                Self {
                    target: self.target.clone(),
                    index: self.index,
                }
            }
            None => Self::invalid(),
        }
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        if let Some(target) = self.target.take().and_then(|weak| weak.upgrade()) {
            target.release(self.index as usize);
        }
    }
}

impl PartialEq for ResourceHandle {
    fn eq(&self, other: &Self) -> bool {
        match (&self.target, &other.target) {
            (Some(a), Some(b)) => Weak::ptr_eq(a, b) && self.index == other.index,
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid() {
            f.debug_tuple("ResourceHandle").field(&self.index).finish()
        } else {
            f.write_str("ResourceHandle(invalid)")
        }
    }
}

/// Fixed-capacity table of reference-counted resource slots.
pub struct ResourceRegistry<T: 'static> {
    shared: Rc<Shared<T>>,
    capacity: usize,
}

impl<T: 'static> ResourceRegistry<T> {
    /// Capacity is capped below [`NO_RESOURCE`] so every slot fits a layer's `u16` field.
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity < NO_RESOURCE as usize,
            "registry capacity must be below the NO_RESOURCE sentinel"
        );
        Self {
            shared: Rc::new(Shared {
                slots: RefCell::new(Slots {
                    ref_counts: vec![0; capacity],
                    payloads: std::iter::repeat_with(|| None).take(capacity).collect(),
                    live: 0,
                }),
                on_release: RefCell::new(None),
            }),
            capacity,
        }
    }

    /// Registry that hands released payloads to `hook` instead of dropping them.
    pub fn with_release_hook(capacity: usize, hook: impl FnMut(usize, T) + 'static) -> Self {
        let registry = Self::new(capacity);
        *registry.shared.on_release.borrow_mut() = Some(Box::new(hook));
        registry
    }

    pub fn max_length(&self) -> usize {
        self.capacity
    }

    /// Number of slots with at least one live handle.
    pub fn cur_length(&self) -> usize {
        self.shared.slots.borrow().live
    }

    pub fn is_full(&self) -> bool {
        self.cur_length() == self.capacity
    }

    /// Counted handle to `index`, or an invalid handle when out of range.
    pub fn get_handle(&self, index: usize) -> ResourceHandle {
        if index >= self.capacity {
            return ResourceHandle::invalid();
        }

        self.shared.retain(index);
        let shared: Rc<dyn RefTarget> = self.shared.clone();
        ResourceHandle {
            target: Some(Rc::downgrade(&shared)),
            index: index as u16,
        }
    }

    /// Store `payload` in the first free slot and return its handle.
    ///
    /// Returns an invalid handle (dropping the payload) when every slot is taken.
    pub fn insert(&self, payload: T) -> ResourceHandle {
        let free = {
            let slots = self.shared.slots.borrow();
            slots.ref_counts.iter().position(|&count| count == 0)
        };

        let Some(index) = free else {
            tracing::warn!(capacity = self.capacity, "resource registry full");
            return ResourceHandle::invalid();
        };

        self.shared.slots.borrow_mut().payloads[index] = Some(payload);
        self.get_handle(index)
    }

    /// Reference count of a slot, `None` when out of range.
    pub fn ref_count(&self, index: usize) -> Option<usize> {
        self.shared.slots.borrow().ref_counts.get(index).copied()
    }

    /// True when `handle` is a live handle into this registry.
    pub fn owns(&self, handle: &ResourceHandle) -> bool {
        match handle.target.as_ref() {
            Some(target) => {
                handle.valid()
                    && std::ptr::eq(
                        target.as_ptr() as *const u8,
                        Rc::as_ptr(&self.shared) as *const u8,
                    )
            }
            None => false,
        }
    }

    /// Borrow the payload behind `handle`.
    pub fn with<R>(&self, handle: &ResourceHandle, f: impl FnOnce(&T) -> R) -> Option<R> {
        if !self.owns(handle) {
            return None;
        }
        let slots = self.shared.slots.borrow();
        slots.payloads[handle.index as usize].as_ref().map(f)
    }

    /// Mutably borrow the payload behind `handle`.
    pub fn with_mut<R>(&self, handle: &ResourceHandle, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        if !self.owns(handle) {
            return None;
        }
        let mut slots = self.shared.slots.borrow_mut();
        slots.payloads[handle.index as usize].as_mut().map(f)
    }
}

impl<T: 'static> Drop for ResourceRegistry<T> {
    fn drop(&mut self) {
        let outstanding = self.cur_length();
        if outstanding > 0 {
            tracing::debug!(outstanding, "resource registry dropped, outstanding handles invalidated");
        }
    }
}

impl<T: 'static> fmt::Debug for ResourceRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("capacity", &self.capacity)
            .field("live", &self.cur_length())
            .finish()
    }
}
