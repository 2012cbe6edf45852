//! Shared test fixture: simulated physical memory behind [`PhysMapper`].
//!
//! Physical addresses are plain byte offsets — frame `i` lives at
//! `i * 4096` — backed by one contiguous, page-aligned buffer.

use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress};
use kernel_vmem::PhysMapper;

/// A 4 KiB-aligned frame of raw bytes.
#[derive(Debug)]
#[repr(align(4096))]
struct RawFrame(#[allow(dead_code)] [u8; PAGE_SIZE as usize]);

/// In-memory "physical RAM" for hosted tests.
#[derive(Debug)]
pub struct TestPhys {
    frames: Vec<RawFrame>,
}

impl TestPhys {
    pub fn with_frames(count: usize) -> Self {
        let mut frames = Vec::with_capacity(count);
        for _ in 0..count {
            frames.push(RawFrame([0u8; PAGE_SIZE as usize]));
        }
        Self { frames }
    }

    /// Scribble over the whole backing store, e.g. to prove frames come
    /// back zeroed.
    pub fn fill(&self, value: u8) {
        let len = self.frames.len() * PAGE_SIZE as usize;
        unsafe { core::slice::from_raw_parts_mut(self.base_ptr(), len) }.fill(value);
    }

    fn base_ptr(&self) -> *mut u8 {
        self.frames.as_ptr().cast::<u8>().cast_mut()
    }
}

impl PhysMapper for TestPhys {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        debug_assert!((pa.as_u64() as usize) < self.frames.len() * PAGE_SIZE as usize);
        unsafe { &mut *self.base_ptr().add(pa.as_u64() as usize).cast::<T>() }
    }
}
