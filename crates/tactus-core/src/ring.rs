//! Multi-slot buffer ring with fine-grained sub-block locking.
//!
//! Eight fixed-size slots form a depth-8 pipeline between upstream
//! producers and the hardware callback, so producers may run several
//! periods ahead of delivery. Callers address slots through opaque
//! [`SlotHandle`]s resolved by pointer identity; a handle that does not
//! belong to the ring fails every lock operation without being
//! dereferenced.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::lock_api::RawReentrantMutex;
use parking_lot::{RawMutex, RawThreadId};

use crate::config::Presets;

/// Slots in the ring.
pub const RING_SLOT_COUNT: usize = 8;

/// Sub-blocks per channel unless reconfigured.
pub const DEFAULT_SUB_BLOCK_COUNT: usize = 8;

type RawRecursiveLock = RawReentrantMutex<RawMutex, RawThreadId>;

/// Opaque identity of one ring slot.
///
/// Never dereferenced; only compared against the ring's own slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotHandle(*const u8);

// SAFETY: the pointer is used purely as an identity token; all data
// access goes through BufferRing under its locks.
unsafe impl Send for SlotHandle {}
unsafe impl Sync for SlotHandle {}

impl SlotHandle {
    /// A handle that matches no slot of any ring.
    pub fn invalid() -> Self {
        SlotHandle(core::ptr::null())
    }
}

struct Slot {
    data: UnsafeCell<Box<[u8]>>,
    lock: RawRecursiveLock,
    sub_locks: Box<[RawRecursiveLock]>,
}

/// The 8-slot ring plus its per (slot x channel x sub_block) lock matrix.
pub struct BufferRing {
    slots: Vec<Slot>,
    active: AtomicUsize,
    channels: usize,
    buffer_size: usize,
    word_size: usize,
    sub_block_count: usize,
}

// SAFETY: slot bytes are only reached through the whole-slot recursive
// lock (SlotGuard, clear_buffer) or the sub-block locks; the lock
// primitives themselves are Sync.
unsafe impl Send for BufferRing {}
unsafe impl Sync for BufferRing {}

impl BufferRing {
    pub fn new(presets: &Presets, sub_block_count: usize) -> Self {
        let slot_bytes = presets.slot_bytes();
        let lock_count = presets.channels * sub_block_count;

        let slots = (0..RING_SLOT_COUNT)
            .map(|_| Slot {
                data: UnsafeCell::new(vec![0u8; slot_bytes].into_boxed_slice()),
                lock: RawRecursiveLock::INIT,
                sub_locks: (0..lock_count)
                    .map(|_| RawRecursiveLock::INIT)
                    .collect(),
            })
            .collect();

        Self {
            slots,
            active: AtomicUsize::new(0),
            channels: presets.channels,
            buffer_size: presets.buffer_size,
            word_size: presets.format.word_size(),
            sub_block_count,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn word_size(&self) -> usize {
        self.word_size
    }

    pub fn sub_block_count(&self) -> usize {
        self.sub_block_count
    }

    /// Byte size of one slot.
    pub fn slot_bytes(&self) -> usize {
        self.channels * self.buffer_size * self.word_size
    }

    fn handle_at(&self, index: usize) -> SlotHandle {
        // pointer identity only, the cell is not read
        SlotHandle(unsafe { (*self.slots[index].data.get()).as_ptr() })
    }

    fn resolve(&self, handle: SlotHandle) -> Option<usize> {
        (0..RING_SLOT_COUNT).find(|&i| self.handle_at(i) == handle)
    }

    /// Current write slot.
    pub fn get_buffer(&self) -> SlotHandle {
        self.handle_at(self.active.load(Ordering::Acquire))
    }

    /// Slot following the write slot, modulo 8.
    pub fn get_next_buffer(&self) -> SlotHandle {
        let active = self.active.load(Ordering::Acquire);
        self.handle_at((active + 1) % RING_SLOT_COUNT)
    }

    /// Slot preceding the write slot, modulo 8.
    pub fn get_prev_buffer(&self) -> SlotHandle {
        let active = self.active.load(Ordering::Acquire);
        self.handle_at((active + RING_SLOT_COUNT - 1) % RING_SLOT_COUNT)
    }

    /// Advances the write slot by exactly one, wrapping modulo 8.
    pub fn switch_buffer(&self) {
        let _ = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                Some((active + 1) % RING_SLOT_COUNT)
            });
    }

    /// Zeroes a slot under its whole-slot lock. Foreign handles are
    /// ignored.
    pub fn clear_buffer(&self, handle: SlotHandle) {
        let Some(index) = self.resolve(handle) else {
            return;
        };
        let slot = &self.slots[index];
        slot.lock.lock();
        // SAFETY: exclusive access to the bytes is guaranteed by the
        // whole-slot lock held for the duration of the write.
        unsafe {
            (*slot.data.get()).fill(0);
            slot.lock.unlock();
        }
    }

    /// Takes the whole-slot recursive lock, returning a guard that
    /// releases on drop. `None` for foreign handles.
    pub fn lock_buffer(self: Arc<Self>, handle: SlotHandle) -> Option<SlotGuard> {
        let index = self.resolve(handle)?;
        self.slots[index].lock.lock();
        Some(SlotGuard { ring: self, index })
    }

    /// Takes one sub-block lock, blocking, and returns a guard over
    /// that sub-block's bytes. `None` for foreign handles or
    /// out-of-range indices.
    pub fn lock_sub_block(
        self: Arc<Self>,
        handle: SlotHandle,
        sub_block: usize,
    ) -> Option<SubBlockGuard> {
        let index = self.resolve(handle)?;
        if sub_block >= self.channels * self.sub_block_count {
            return None;
        }
        self.slots[index].sub_locks[sub_block].lock();
        Some(SubBlockGuard {
            ring: self,
            index,
            sub_block,
        })
    }

    // Byte range of one entry of the (channel x sub_block) matrix. The
    // last block of a channel absorbs the frames a non-dividing
    // buffer_size leaves over.
    fn sub_block_range(&self, sub_block: usize) -> core::ops::Range<usize> {
        let channel = sub_block / self.sub_block_count;
        let block = sub_block % self.sub_block_count;
        let frames_per_block = self.buffer_size / self.sub_block_count;

        let start_frame = block * frames_per_block;
        let end_frame = if block + 1 == self.sub_block_count {
            self.buffer_size
        } else {
            start_frame + frames_per_block
        };

        let base = channel * self.buffer_size;
        (base + start_frame) * self.word_size..(base + end_frame) * self.word_size
    }

    /// Attempts one sub-block lock. `sub_block` indexes the flattened
    /// (channel x sub_block) matrix of this slot. Returns `false` for
    /// foreign handles or out-of-range indices, without blocking.
    pub fn trylock_sub_block(&self, handle: SlotHandle, sub_block: usize) -> bool {
        let Some(index) = self.resolve(handle) else {
            return false;
        };
        let slot = &self.slots[index];
        match slot.sub_locks.get(sub_block) {
            Some(lock) => lock.try_lock(),
            None => false,
        }
    }

    /// Releases a sub-block lock previously taken by this thread.
    pub fn unlock_sub_block(&self, handle: SlotHandle, sub_block: usize) {
        let Some(index) = self.resolve(handle) else {
            return;
        };
        let slot = &self.slots[index];
        if let Some(lock) = slot.sub_locks.get(sub_block) {
            if lock.is_owned_by_current_thread() {
                // SAFETY: ownership by the current thread was just checked.
                unsafe { lock.unlock() };
            }
        }
    }
}

/// RAII guard over one locked slot.
///
/// Holds the whole-slot recursive lock; dropping releases it on every
/// exit path.
pub struct SlotGuard {
    ring: Arc<BufferRing>,
    index: usize,
}

impl SlotGuard {
    pub fn handle(&self) -> SlotHandle {
        self.ring.handle_at(self.index)
    }

    /// Raw slot bytes, channels x buffer_size x word_size.
    pub fn bytes(&self) -> &[u8] {
        // SAFETY: the whole-slot lock is held; concurrent writers are
        // excluded. Same-thread aliasing is governed by the bytes_mut
        // contract.
        unsafe { &*self.ring.slots[self.index].data.get() }
    }

    /// Mutable slot bytes.
    ///
    /// # Safety
    ///
    /// The whole-slot lock is recursive, so a thread can hold several
    /// guards for the same slot. The caller must ensure no other live
    /// slice obtained from this slot overlaps the returned one.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn bytes_mut(&self) -> &mut [u8] {
        &mut *self.ring.slots[self.index].data.get()
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        // SAFETY: the guard owns one level of the recursive lock taken
        // in lock_buffer.
        unsafe { self.ring.slots[self.index].lock.unlock() };
    }
}

/// RAII guard over one locked sub-block.
///
/// Holds one entry of the (channel x sub_block) lock matrix and exposes
/// only that byte range, so per-channel producers can fill disjoint
/// regions of a slot concurrently without taking the whole-slot lock.
pub struct SubBlockGuard {
    ring: Arc<BufferRing>,
    index: usize,
    sub_block: usize,
}

impl SubBlockGuard {
    pub fn handle(&self) -> SlotHandle {
        self.ring.handle_at(self.index)
    }

    /// The sub-block's bytes within the channel-major slot.
    pub fn bytes(&self) -> &[u8] {
        let range = self.ring.sub_block_range(self.sub_block);
        // SAFETY: the sub-block lock is held; writers of this range are
        // excluded. Same-thread aliasing is governed by the bytes_mut
        // contract.
        unsafe { &(&(*self.ring.slots[self.index].data.get()))[range] }
    }

    /// Mutable bytes of the sub-block.
    ///
    /// # Safety
    ///
    /// The sub-block lock is recursive and the whole-slot lock covers
    /// the same bytes, so a thread can reach this range through several
    /// guards. The caller must ensure no other live slice overlaps the
    /// returned one.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn bytes_mut(&self) -> &mut [u8] {
        let range = self.ring.sub_block_range(self.sub_block);
        &mut (&mut (*self.ring.slots[self.index].data.get()))[range]
    }
}

impl Drop for SubBlockGuard {
    fn drop(&mut self) {
        // SAFETY: the guard owns one level of the recursive lock taken
        // in lock_sub_block.
        unsafe { self.ring.slots[self.index].sub_locks[self.sub_block].unlock() };
    }
}
