//! Pool of offscreen layer textures.
//!
//! Layer textures are interchangeable: any idle handle can back any layer
//! once it is resized. The pool hands them out LIFO so the most recently
//! used (and most likely still allocated) handle is reused first.
//!
//! [`TexturePool::compact`] runs once per presented frame and drops the
//! backing storage of every idle handle while keeping the handle itself, so
//! idle memory stays bounded and reacquiring stays cheap.

/// Handle to a texture owned by a [`TextureStorage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) u32);

impl TextureId {
    /// Handle for storage implementations that number their own textures.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Owner of texture handles and their backing storage.
pub trait TextureStorage {
    /// Allocate a new handle with no backing storage.
    fn create_texture(&mut self) -> TextureId;

    /// Give `texture` backing storage of the given size. A zero size frees
    /// the storage and keeps the handle valid.
    fn resize_texture(&mut self, texture: TextureId, width: u32, height: u32);

    /// Destroy the handle and its storage.
    fn destroy_texture(&mut self, texture: TextureId);
}

/// Counters for pool activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Handles created over the pool's lifetime
    pub created: u32,
    /// Acquisitions served from the idle list
    pub reused: u32,
    /// Handles currently handed out
    pub outstanding: u32,
    /// Highest number of handles handed out at once
    pub peak_outstanding: u32,
}

#[derive(Debug, Default)]
pub struct TexturePool {
    idle: Vec<TextureId>,
    stats: PoolStats,
}

impl TexturePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pop an idle handle, or create one if none is idle.
    pub fn acquire(&mut self, storage: &mut impl TextureStorage) -> TextureId {
        let texture = match self.idle.pop() {
            Some(texture) => {
                self.stats.reused += 1;
                texture
            }
            None => {
                self.stats.created += 1;
                storage.create_texture()
            }
        };
        self.stats.outstanding += 1;
        self.stats.peak_outstanding = self.stats.peak_outstanding.max(self.stats.outstanding);
        texture
    }

    /// Return a handle for reuse.
    pub fn release(&mut self, texture: TextureId) {
        debug_assert!(
            !self.idle.contains(&texture),
            "texture {:?} released twice",
            texture
        );
        debug_assert!(self.stats.outstanding > 0);
        self.stats.outstanding = self.stats.outstanding.saturating_sub(1);
        self.idle.push(texture);
    }

    /// Free the storage of every idle handle. Call only after the GPU work
    /// of the frame has been submitted.
    pub fn compact(&mut self, storage: &mut impl TextureStorage) {
        for &texture in &self.idle {
            storage.resize_texture(texture, 0, 0);
        }
        log::trace!("Compacted {} idle layer textures", self.idle.len());
    }

    /// Destroy every idle handle. Outstanding handles stay with their holders.
    pub fn clear(&mut self, storage: &mut impl TextureStorage) {
        for texture in self.idle.drain(..) {
            storage.destroy_texture(texture);
        }
    }

    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Tracks live handles and their backing sizes.
    #[derive(Default)]
    struct FakeStorage {
        next: u32,
        live: HashMap<TextureId, (u32, u32)>,
        destroyed: u32,
    }

    impl TextureStorage for FakeStorage {
        fn create_texture(&mut self) -> TextureId {
            let id = TextureId(self.next);
            self.next += 1;
            self.live.insert(id, (0, 0));
            id
        }

        fn resize_texture(&mut self, texture: TextureId, width: u32, height: u32) {
            let size = self.live.get_mut(&texture).expect("resize of dead texture");
            *size = (width, height);
        }

        fn destroy_texture(&mut self, texture: TextureId) {
            assert!(self.live.remove(&texture).is_some());
            self.destroyed += 1;
        }
    }

    #[test]
    fn test_acquire_release_is_lifo() {
        let mut storage = FakeStorage::default();
        let mut pool = TexturePool::new();

        let a = pool.acquire(&mut storage);
        let b = pool.acquire(&mut storage);
        pool.release(a);
        pool.release(b);

        assert_eq!(pool.acquire(&mut storage), b);
        assert_eq!(pool.acquire(&mut storage), a);
        assert_eq!(storage.live.len(), 2);
    }

    #[test]
    fn test_live_handles_bounded_by_peak() {
        let mut storage = FakeStorage::default();
        let mut pool = TexturePool::new();

        for _ in 0..10 {
            let a = pool.acquire(&mut storage);
            let b = pool.acquire(&mut storage);
            let c = pool.acquire(&mut storage);
            pool.release(b);
            pool.release(c);
            pool.release(a);
        }

        let stats = pool.stats();
        assert_eq!(stats.peak_outstanding, 3);
        assert_eq!(stats.created, 3);
        assert_eq!(stats.outstanding, 0);
        assert!(storage.live.len() as u32 <= stats.peak_outstanding);
    }

    #[test]
    fn test_compact_frees_storage_keeps_handles() {
        let mut storage = FakeStorage::default();
        let mut pool = TexturePool::new();

        let a = pool.acquire(&mut storage);
        storage.resize_texture(a, 64, 32);
        let held = pool.acquire(&mut storage);
        storage.resize_texture(held, 16, 16);
        pool.release(a);

        pool.compact(&mut storage);

        assert_eq!(storage.live[&a], (0, 0));
        // Outstanding handles are untouched.
        assert_eq!(storage.live[&held], (16, 16));
        // The compacted handle is still valid and comes back first.
        assert_eq!(pool.acquire(&mut storage), a);
        storage.resize_texture(a, 8, 8);
        assert_eq!(storage.live[&a], (8, 8));
    }

    #[test]
    fn test_clear_destroys_idle_handles() {
        let mut storage = FakeStorage::default();
        let mut pool = TexturePool::new();

        let a = pool.acquire(&mut storage);
        let b = pool.acquire(&mut storage);
        pool.release(a);
        pool.release(b);
        pool.clear(&mut storage);

        assert_eq!(storage.destroyed, 2);
        assert!(storage.live.is_empty());
        assert_eq!(pool.idle_count(), 0);
    }
}
