//! Fixed-capacity pool of render transforms
//!
//! The render layer owns what a slot looks like; the simulation only
//! acquires a slot, writes its transform every frame and releases it.
//! Slots are never allocated after construction.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::visuals::AssetId;

/// Index of an acquired slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisualHandle(u32);

impl VisualHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Transform written for the render layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

/// One pooled renderable
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualSlot {
    pub active: bool,
    pub asset: Option<AssetId>,
    pub transform: Transform,
}

/// Arena of slots with a free list
#[derive(Debug, Clone)]
pub struct VisualPool {
    slots: Vec<VisualSlot>,
    /// Free slot indices, popped from the back
    free: Vec<u32>,
}

impl VisualPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![VisualSlot::default(); capacity],
            free: (0..capacity as u32).rev().collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn in_use(&self) -> usize {
        self.capacity() - self.available()
    }

    /// Take a free slot, or None when the pool is exhausted
    pub fn acquire(&mut self, asset: Option<AssetId>) -> Option<VisualHandle> {
        let index = self.free.pop()?;
        let slot = &mut self.slots[index as usize];
        slot.active = true;
        slot.asset = asset;
        slot.transform = Transform::default();
        Some(VisualHandle(index))
    }

    /// Return a slot to the pool
    pub fn release(&mut self, handle: VisualHandle) {
        let slot = &mut self.slots[handle.index()];
        debug_assert!(slot.active, "double release of visual slot {}", handle.0);
        if slot.active {
            slot.active = false;
            slot.asset = None;
            self.free.push(handle.0);
        }
    }

    /// Release every slot at once
    pub fn reclaim_all(&mut self) {
        for slot in &mut self.slots {
            slot.active = false;
            slot.asset = None;
        }
        self.free = (0..self.slots.len() as u32).rev().collect();
    }

    pub fn set_transform(&mut self, handle: VisualHandle, transform: Transform) {
        self.slots[handle.index()].transform = transform;
    }

    pub fn get(&self, handle: VisualHandle) -> &VisualSlot {
        &self.slots[handle.index()]
    }

    /// All slots, for the render layer to draw the active ones
    pub fn slots(&self) -> &[VisualSlot] {
        &self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_until_exhausted() {
        let mut pool = VisualPool::new(3);
        let handles: Vec<_> = (0..3).filter_map(|_| pool.acquire(None)).collect();
        assert_eq!(handles.len(), 3);
        assert_eq!(handles[0].index(), 0);
        assert!(pool.acquire(None).is_none());
        assert_eq!(pool.in_use(), 3);
    }

    #[test]
    fn test_release_recycles_slot() {
        let mut pool = VisualPool::new(2);
        let a = pool.acquire(Some(AssetId(7))).unwrap();
        let _b = pool.acquire(None).unwrap();
        pool.release(a);
        assert!(!pool.get(a).active);
        assert_eq!(pool.get(a).asset, None);
        let c = pool.acquire(None).unwrap();
        assert_eq!(c, a);
    }

    #[test]
    fn test_reclaim_all() {
        let mut pool = VisualPool::new(4);
        for _ in 0..4 {
            pool.acquire(None);
        }
        pool.reclaim_all();
        assert_eq!(pool.available(), 4);
        assert!(pool.slots().iter().all(|s| !s.active));
    }
}
