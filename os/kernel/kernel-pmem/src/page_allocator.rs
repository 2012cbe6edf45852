//! Bitmap-based physical page-frame allocator.
//!
//! Owns one contiguous region of RAM — chosen as the largest usable region
//! of the boot memory map — and tracks every 4 KiB frame in it as free,
//! used, or reserved. The tracking bitmap itself lives in the first frames
//! of the region and is locked at construction so it can never be handed
//! out.

use crate::bitmap::Bitmap;
use kernel_info::boot::MemoryRegion;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalFrame};
use kernel_vmem::{FrameAlloc, PhysMapper};

/// Failure modes of allocator construction from a boot memory map.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum MemoryMapError {
    /// The firmware memory map contains no usable region at all.
    #[error("memory map reports no usable region")]
    NoUsableRegion,
}

/// Physical page-frame allocator over one contiguous region.
///
/// ### Invariants
/// - `pages_total == pages_free + pages_used + pages_reserved` before and
///   after every public operation.
/// - Bitmap bit `i` is set iff frame `i` is used or reserved.
/// - The frames backing the bitmap are used from construction onwards.
///
/// ### Failure model
/// Exhaustion and every state-machine misuse (double lock, double free,
/// misaligned or foreign address) panic; see the crate docs. The allocator
/// is constructed once and never torn down — frames recycle through
/// [`free_page`](Self::free_page) / [`release_page`](Self::release_page),
/// the allocator itself does not.
#[derive(Debug)]
pub struct PageAllocator<'m, M: PhysMapper> {
    mapper: &'m M,
    /// First frame of the managed region.
    base: PhysicalFrame,
    /// Length of the bitmap in bytes (one bit per managed frame).
    bitmap_len: u64,
    pages_total: u64,
    pages_free: u64,
    pages_used: u64,
    pages_reserved: u64,
}

impl<'m, M: PhysMapper> PageAllocator<'m, M> {
    /// Construct over the region `[start, start + size_bytes)`.
    ///
    /// All frames start free; the frames needed by the bitmap itself are
    /// then locked, so they are `used` from the first observable moment.
    ///
    /// # Panics
    /// If `start` is not frame-aligned or the region cannot hold its own
    /// bitmap (in particular, if it is empty).
    pub fn new(mapper: &'m M, start: PhysicalAddress, size_bytes: u64) -> Self {
        assert!(
            start.is_page_aligned(),
            "backing region must start on a frame boundary"
        );
        assert!(size_bytes > 0, "backing region is empty");

        let pages_total = size_bytes.div_ceil(PAGE_SIZE);
        let bitmap_len = pages_total.div_ceil(8);
        let bitmap_frames = bitmap_len.div_ceil(PAGE_SIZE);
        assert!(
            bitmap_frames <= pages_total,
            "backing region cannot hold its own frame bitmap"
        );

        // The bitmap lives at the front of the region it describes; clear
        // it before any bit is read.
        unsafe {
            mapper
                .phys_to_slice_mut(start, bitmap_len as usize)
                .fill(0);
        }

        let mut allocator = Self {
            mapper,
            base: PhysicalFrame::new_aligned(start),
            bitmap_len,
            pages_total,
            pages_free: pages_total,
            pages_used: 0,
            pages_reserved: 0,
        };
        allocator.lock_pages(start, bitmap_frames);

        log::info!(
            "page allocator: {pages_total} frames at {start}, {bitmap_frames} locked for the bitmap"
        );
        allocator
    }

    /// Construct from the boot memory map, backed by its largest usable
    /// region. The rest of the map is logged and discarded — this allocator
    /// deliberately manages a single region.
    ///
    /// # Errors
    /// [`MemoryMapError::NoUsableRegion`] if the map offers no usable
    /// region.
    ///
    /// # Panics
    /// As [`new`](Self::new), should the firmware report a misaligned or
    /// degenerate region.
    pub fn from_memory_map(
        mapper: &'m M,
        regions: &[MemoryRegion],
    ) -> Result<Self, MemoryMapError> {
        let mut total_bytes = 0u64;
        let mut usable_bytes = 0u64;
        let mut largest: Option<MemoryRegion> = None;

        for region in regions {
            log::debug!(
                "{:?} region at {} spanning {} frames",
                region.kind,
                region.start,
                region.page_count
            );
            total_bytes += region.byte_len();
            if region.is_usable() {
                usable_bytes += region.byte_len();
                if largest.is_none_or(|r| region.byte_len() > r.byte_len()) {
                    largest = Some(*region);
                }
            }
        }

        let region = largest.ok_or(MemoryMapError::NoUsableRegion)?;
        log::info!(
            "memory map: {} KiB total, {} KiB usable, {} KiB reserved; backing region at {}",
            total_bytes / 1024,
            usable_bytes / 1024,
            (total_bytes - usable_bytes) / 1024,
            region.start
        );
        Ok(Self::new(mapper, region.start, region.byte_len()))
    }

    /// Hand out the first free frame, zero-filled.
    ///
    /// Callers always receive all-zero memory: returned frames are
    /// routinely reinterpreted as page tables, where any stale bit would
    /// read as a valid entry.
    ///
    /// # Panics
    /// If no frame is free. There is no swap to fall back on, so
    /// exhaustion is unrecoverable by design.
    pub fn request_page(&mut self) -> PhysicalAddress {
        for index in 0..self.pages_total {
            if self.bitmap().is_set(index) {
                continue;
            }
            let address = self.frame_address(index);
            self.lock_page(address);
            unsafe {
                self.mapper
                    .phys_to_slice_mut(address, PAGE_SIZE as usize)
                    .fill(0);
            }
            return address;
        }
        panic!(
            "page allocator exhausted ({} frames, none free)",
            self.pages_total
        );
    }

    /// Mark the frame at `address` as used for conventional allocation.
    ///
    /// # Panics
    /// If the frame is not currently free, or `address` is misaligned or
    /// outside the managed region.
    pub fn lock_page(&mut self, address: PhysicalAddress) {
        let index = self.frame_index(address);
        let mut bitmap = self.bitmap();
        assert!(!bitmap.is_set(index), "frame {address} already occupied");
        bitmap.set(index);
        self.pages_free -= 1;
        self.pages_used += 1;
    }

    /// Return a used frame to the free state.
    ///
    /// # Panics
    /// If the frame is not currently occupied, or `address` is misaligned
    /// or outside the managed region.
    pub fn free_page(&mut self, address: PhysicalAddress) {
        let index = self.frame_index(address);
        let mut bitmap = self.bitmap();
        assert!(bitmap.is_set(index), "frame {address} already free");
        bitmap.unset(index);
        self.pages_free += 1;
        self.pages_used -= 1;
    }

    /// Mark the frame at `address` as reserved — owned by the loader or
    /// firmware, never to be handed out by [`request_page`](Self::request_page).
    ///
    /// # Panics
    /// As [`lock_page`](Self::lock_page).
    pub fn reserve_page(&mut self, address: PhysicalAddress) {
        let index = self.frame_index(address);
        let mut bitmap = self.bitmap();
        assert!(!bitmap.is_set(index), "frame {address} already occupied");
        bitmap.set(index);
        self.pages_free -= 1;
        self.pages_reserved += 1;
    }

    /// Return a reserved frame to the free state.
    ///
    /// # Panics
    /// As [`free_page`](Self::free_page).
    pub fn release_page(&mut self, address: PhysicalAddress) {
        let index = self.frame_index(address);
        let mut bitmap = self.bitmap();
        assert!(bitmap.is_set(index), "frame {address} already free");
        bitmap.unset(index);
        self.pages_free += 1;
        self.pages_reserved -= 1;
    }

    /// [`lock_page`](Self::lock_page) applied to `count` consecutive frames.
    pub fn lock_pages(&mut self, address: PhysicalAddress, count: u64) {
        for i in 0..count {
            self.lock_page(address + i * PAGE_SIZE);
        }
    }

    /// [`free_page`](Self::free_page) applied to `count` consecutive frames.
    pub fn free_pages(&mut self, address: PhysicalAddress, count: u64) {
        for i in 0..count {
            self.free_page(address + i * PAGE_SIZE);
        }
    }

    /// [`reserve_page`](Self::reserve_page) applied to `count` consecutive frames.
    pub fn reserve_pages(&mut self, address: PhysicalAddress, count: u64) {
        for i in 0..count {
            self.reserve_page(address + i * PAGE_SIZE);
        }
    }

    /// [`release_page`](Self::release_page) applied to `count` consecutive frames.
    pub fn release_pages(&mut self, address: PhysicalAddress, count: u64) {
        for i in 0..count {
            self.release_page(address + i * PAGE_SIZE);
        }
    }

    /// First frame of the managed region.
    #[inline]
    #[must_use]
    pub const fn base(&self) -> PhysicalFrame {
        self.base
    }

    /// Number of frames under management.
    #[inline]
    #[must_use]
    pub const fn pages_total(&self) -> u64 {
        self.pages_total
    }

    /// Frames currently free.
    #[inline]
    #[must_use]
    pub const fn pages_free(&self) -> u64 {
        self.pages_free
    }

    /// Frames currently used for conventional allocation.
    #[inline]
    #[must_use]
    pub const fn pages_used(&self) -> u64 {
        self.pages_used
    }

    /// Frames currently reserved for loader/firmware-owned memory.
    #[inline]
    #[must_use]
    pub const fn pages_reserved(&self) -> u64 {
        self.pages_reserved
    }

    /// The bitmap, viewed through the mapper.
    ///
    /// The backing bytes live inside the managed region; constructing the
    /// view is O(1) and repeated per operation.
    fn bitmap(&mut self) -> Bitmap<'_> {
        Bitmap::new(unsafe {
            self.mapper
                .phys_to_slice_mut(self.base.base(), self.bitmap_len as usize)
        })
    }

    /// Bitmap index of the frame at `address`.
    ///
    /// # Panics
    /// If `address` is misaligned or not a frame of the managed region.
    fn frame_index(&self, address: PhysicalAddress) -> u64 {
        assert!(
            address.is_page_aligned(),
            "address {address} is not frame-aligned"
        );
        let base = self.base.base().as_u64();
        assert!(
            address.as_u64() >= base,
            "address {address} below the managed region"
        );
        let index = (address.as_u64() - base) / PAGE_SIZE;
        assert!(
            index < self.pages_total,
            "address {address} beyond the managed region"
        );
        index
    }

    /// Physical address of frame `index`.
    fn frame_address(&self, index: u64) -> PhysicalAddress {
        self.base.base() + index * PAGE_SIZE
    }
}

impl<M: PhysMapper> FrameAlloc for PageAllocator<'_, M> {
    /// Never returns `None`: [`request_page`](PageAllocator::request_page)
    /// panics on exhaustion instead.
    fn alloc_frame(&mut self) -> Option<PhysicalFrame> {
        Some(PhysicalFrame::new_aligned(self.request_page()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestPhys;
    use kernel_info::boot::{MemoryRegion, RegionKind};
    use std::collections::HashSet;

    fn checked<M: PhysMapper>(allocator: &PageAllocator<'_, M>) {
        assert_eq!(
            allocator.pages_total(),
            allocator.pages_free() + allocator.pages_used() + allocator.pages_reserved(),
            "counter conservation violated"
        );
    }

    #[test]
    fn construction_over_128_pages() {
        let phys = TestPhys::with_frames(128);
        let allocator = PageAllocator::new(&phys, PhysicalAddress::zero(), 128 * PAGE_SIZE);

        // ceil(128 / 8) = 16 bitmap bytes fit in a single frame.
        assert_eq!(allocator.pages_total(), 128);
        assert_eq!(allocator.pages_used(), 1);
        assert_eq!(allocator.pages_free(), 127);
        assert_eq!(allocator.pages_reserved(), 0);
        checked(&allocator);
    }

    #[test]
    fn first_request_skips_the_bitmap_frame() {
        let phys = TestPhys::with_frames(128);
        let mut allocator = PageAllocator::new(&phys, PhysicalAddress::zero(), 128 * PAGE_SIZE);

        let address = allocator.request_page();
        assert_eq!(address.as_u64(), PAGE_SIZE);
        assert_eq!(allocator.pages_used(), 2);
        assert_eq!(allocator.pages_free(), 126);
        checked(&allocator);
    }

    #[test]
    fn requested_frames_are_zeroed() {
        let phys = TestPhys::with_frames(8);
        phys.fill(0xAA);
        let mut allocator = PageAllocator::new(&phys, PhysicalAddress::zero(), 8 * PAGE_SIZE);

        let address = allocator.request_page();
        let bytes = unsafe { phys.phys_to_slice_mut(address, PAGE_SIZE as usize) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn no_frame_is_handed_out_twice() {
        let phys = TestPhys::with_frames(32);
        let mut allocator = PageAllocator::new(&phys, PhysicalAddress::zero(), 32 * PAGE_SIZE);

        let mut seen = HashSet::new();
        for _ in 0..allocator.pages_free() {
            assert!(seen.insert(allocator.request_page().as_u64()));
            checked(&allocator);
        }
        assert_eq!(allocator.pages_free(), 0);
    }

    #[test]
    fn freed_frames_are_reused() {
        let phys = TestPhys::with_frames(8);
        let mut allocator = PageAllocator::new(&phys, PhysicalAddress::zero(), 8 * PAGE_SIZE);

        let first = allocator.request_page();
        allocator.free_page(first);
        assert_eq!(allocator.request_page(), first);
        checked(&allocator);
    }

    #[test]
    fn lock_then_free_restores_state_exactly() {
        let phys = TestPhys::with_frames(16);
        let mut allocator = PageAllocator::new(&phys, PhysicalAddress::zero(), 16 * PAGE_SIZE);
        let free_before = allocator.pages_free();
        let used_before = allocator.pages_used();

        let address = PhysicalAddress::new(5 * PAGE_SIZE);
        allocator.lock_page(address);
        checked(&allocator);
        allocator.free_page(address);

        assert_eq!(allocator.pages_free(), free_before);
        assert_eq!(allocator.pages_used(), used_before);
        // The next request must treat the frame as free again.
        assert_eq!(allocator.request_page().as_u64(), PAGE_SIZE);
        checked(&allocator);
    }

    #[test]
    fn reserve_and_release_move_the_reserved_counter() {
        let phys = TestPhys::with_frames(16);
        let mut allocator = PageAllocator::new(&phys, PhysicalAddress::zero(), 16 * PAGE_SIZE);

        let address = PhysicalAddress::new(3 * PAGE_SIZE);
        allocator.reserve_pages(address, 2);
        assert_eq!(allocator.pages_reserved(), 2);
        assert_eq!(allocator.pages_free(), 13);
        checked(&allocator);

        allocator.release_pages(address, 2);
        assert_eq!(allocator.pages_reserved(), 0);
        assert_eq!(allocator.pages_free(), 15);
        checked(&allocator);
    }

    #[test]
    fn reserved_frames_are_never_handed_out() {
        let phys = TestPhys::with_frames(4);
        let mut allocator = PageAllocator::new(&phys, PhysicalAddress::zero(), 4 * PAGE_SIZE);

        allocator.reserve_page(PhysicalAddress::new(PAGE_SIZE));
        assert_eq!(allocator.request_page().as_u64(), 2 * PAGE_SIZE);
    }

    #[test]
    fn from_memory_map_picks_the_largest_usable_region() {
        let phys = TestPhys::with_frames(64);
        let regions = [
            MemoryRegion {
                start: PhysicalAddress::zero(),
                page_count: 8,
                kind: RegionKind::Usable,
            },
            MemoryRegion {
                start: PhysicalAddress::new(8 * PAGE_SIZE),
                page_count: 16,
                kind: RegionKind::Reserved,
            },
            MemoryRegion {
                start: PhysicalAddress::new(24 * PAGE_SIZE),
                page_count: 40,
                kind: RegionKind::Usable,
            },
        ];

        let allocator = PageAllocator::from_memory_map(&phys, &regions).unwrap();
        assert_eq!(allocator.base().base().as_u64(), 24 * PAGE_SIZE);
        assert_eq!(allocator.pages_total(), 40);
        checked(&allocator);
    }

    #[test]
    fn from_memory_map_without_usable_region_fails() {
        let phys = TestPhys::with_frames(1);
        let regions = [MemoryRegion {
            start: PhysicalAddress::zero(),
            page_count: 4,
            kind: RegionKind::Reserved,
        }];
        assert_eq!(
            PageAllocator::from_memory_map(&phys, &regions).unwrap_err(),
            MemoryMapError::NoUsableRegion
        );
    }

    #[test]
    #[should_panic(expected = "already occupied")]
    fn double_lock_panics() {
        let phys = TestPhys::with_frames(4);
        let mut allocator = PageAllocator::new(&phys, PhysicalAddress::zero(), 4 * PAGE_SIZE);
        let address = PhysicalAddress::new(PAGE_SIZE);
        allocator.lock_page(address);
        allocator.lock_page(address);
    }

    #[test]
    #[should_panic(expected = "already free")]
    fn double_free_panics() {
        let phys = TestPhys::with_frames(4);
        let mut allocator = PageAllocator::new(&phys, PhysicalAddress::zero(), 4 * PAGE_SIZE);
        allocator.free_page(PhysicalAddress::new(PAGE_SIZE));
    }

    #[test]
    #[should_panic(expected = "not frame-aligned")]
    fn misaligned_address_panics() {
        let phys = TestPhys::with_frames(4);
        let mut allocator = PageAllocator::new(&phys, PhysicalAddress::zero(), 4 * PAGE_SIZE);
        allocator.lock_page(PhysicalAddress::new(PAGE_SIZE + 0x10));
    }

    #[test]
    #[should_panic(expected = "beyond the managed region")]
    fn foreign_address_panics() {
        let phys = TestPhys::with_frames(4);
        let mut allocator = PageAllocator::new(&phys, PhysicalAddress::zero(), 4 * PAGE_SIZE);
        allocator.lock_page(PhysicalAddress::new(64 * PAGE_SIZE));
    }

    #[test]
    #[should_panic(expected = "exhausted")]
    fn exhaustion_panics() {
        let phys = TestPhys::with_frames(4);
        let mut allocator = PageAllocator::new(&phys, PhysicalAddress::zero(), 4 * PAGE_SIZE);
        for _ in 0..4 {
            allocator.request_page();
        }
    }

    #[test]
    #[should_panic(expected = "region is empty")]
    fn empty_region_panics() {
        let phys = TestPhys::with_frames(1);
        let _ = PageAllocator::new(&phys, PhysicalAddress::zero(), 0);
    }
}
