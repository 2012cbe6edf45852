//! # Boot Memory Map
//!
//! The loader walks the firmware memory map right before `ExitBootServices`
//! and condenses it into an ordered array of [`MemoryRegion`] descriptors.
//! The kernel's physical allocator consumes that array exactly once, to pick
//! its backing region; the map is not retained afterwards.
//!
//! Keep these types `#[repr(C)]`: they cross the loader → kernel ABI
//! boundary as raw memory.

use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress};

/// Classification of one physical memory region.
///
/// Firmware memory maps distinguish a dozen region types; the allocator only
/// cares whether a region may be claimed as general-purpose RAM. Everything
/// else (MMIO, firmware-owned, ACPI tables, loader images) collapses into
/// [`Reserved`](Self::Reserved).
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RegionKind {
    /// Conventional memory, free for the kernel to claim.
    Usable = 0,
    /// Anything the firmware did not report as conventional memory.
    Reserved = 1,
}

/// One entry of the boot memory map.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct MemoryRegion {
    /// Physical address of the first byte of the region.
    pub start: PhysicalAddress,
    /// Length of the region in 4 KiB frames.
    pub page_count: u64,
    /// Usability classification.
    pub kind: RegionKind,
}

impl MemoryRegion {
    /// Length of the region in bytes.
    #[inline]
    #[must_use]
    pub const fn byte_len(&self) -> u64 {
        self.page_count * PAGE_SIZE
    }

    /// `true` if the region may back the physical allocator.
    #[inline]
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.kind == RegionKind::Usable
    }
}
