//! # Address Space (PML4-rooted)
//!
//! A single virtual address space: the tree of page tables hanging off one
//! PML4 frame, plus the operations that grow and inspect it.
//!
//! ## Design
//!
//! - Missing intermediate tables are allocated on demand and linked with
//!   `present + read_write` entries; each fresh table is exclusively owned
//!   by the entry that points at it.
//! - The leaf entry is written unconditionally. Re-mapping a page is
//!   idempotent (last writer wins), which the identity bootstrap relies on.
//! - Every mapping walks all four levels; no large-page shortcuts.
//! - `unsafe` stays confined to viewing a physical frame as a typed table
//!   through the [`PhysMapper`].
//!
//! ## Safety
//!
//! Mutating mappings that are live in CR3 requires TLB maintenance. This
//! code runs before its root is ever activated, so none is performed.

use crate::page_index::decompose;
use crate::{FrameAlloc, PageEntry, PhysMapper, get_table};
use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame, VirtualAddress};
use kernel_registers::cr3::Cr3;

/// Failure modes of growing an address space.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum MapError {
    /// The frame source declined to produce a page-table frame.
    #[error("out of physical frames while building page tables")]
    OutOfFrames,
}

/// Handle to one concrete address space.
pub struct AddressSpace<'m, M: PhysMapper> {
    /// The PML4 frame; becomes the CR3 payload on activation.
    root: PhysicalFrame,
    mapper: &'m M,
}

impl<'m, M: PhysMapper> AddressSpace<'m, M> {
    /// Build an empty address space, requesting one frame for the root.
    ///
    /// The frame arrives zeroed per the [`FrameAlloc`] contract, so every
    /// PML4 entry starts non-present.
    ///
    /// # Errors
    /// [`MapError::OutOfFrames`] if the allocator declines.
    pub fn create<A: FrameAlloc>(mapper: &'m M, alloc: &mut A) -> Result<Self, MapError> {
        let root = alloc.alloc_frame().ok_or(MapError::OutOfFrames)?;
        Ok(Self { root, mapper })
    }

    /// Wrap an existing PML4 frame.
    #[inline]
    pub const fn from_root(mapper: &'m M, root: PhysicalFrame) -> Self {
        Self { root, mapper }
    }

    /// The PML4 frame of this address space.
    #[inline]
    #[must_use]
    pub const fn root_frame(&self) -> PhysicalFrame {
        self.root
    }

    /// The CR3 value that activates this address space.
    ///
    /// Handing it to the page-table base register is the bootstrap code's
    /// job; this crate never executes the privileged store.
    #[inline]
    #[must_use]
    pub fn cr3(&self) -> Cr3 {
        Cr3::from_pml4(self.root)
    }

    /// Establish a present, read-write mapping from the page containing
    /// `va` to the frame at `pa`, allocating missing intermediate tables
    /// from `alloc`.
    ///
    /// The leaf is overwritten even if already present; mapping the same
    /// page twice is expected during the identity bootstrap and the later
    /// call silently wins.
    ///
    /// # Errors
    /// [`MapError::OutOfFrames`] if an intermediate table cannot be
    /// allocated. Already-installed tables are left in place.
    pub fn map_memory<A: FrameAlloc>(
        &self,
        alloc: &mut A,
        va: VirtualAddress,
        pa: PhysicalAddress,
    ) -> Result<(), MapError> {
        debug_assert!(pa.is_page_aligned(), "target frame not page-aligned");

        let index = decompose(va);
        let mut table = unsafe { get_table(self.mapper, self.root) };

        // PML4 → PDPT → PD: follow present links, create missing ones.
        for level in [index.level_3(), index.level_2(), index.level_1()] {
            let entry = table.get(level);
            let next = if entry.present() {
                entry.physical_frame()
            } else {
                let frame = alloc.alloc_frame().ok_or(MapError::OutOfFrames)?;
                log::trace!("new page table at {} for {va}", frame.base());
                table.set(level, PageEntry::new_present_rw().with_physical_frame(frame));
                frame
            };
            table = unsafe { get_table(self.mapper, next) };
        }

        // PT: install the leaf, unconditionally.
        table.set(
            index.level_0(),
            PageEntry::new_present_rw().with_physical_frame(PhysicalFrame::new_aligned(pa)),
        );
        Ok(())
    }

    /// Translate `va` to the physical address it maps to, or `None` if any
    /// level of the walk is non-present.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        let index = decompose(va);
        let mut table = unsafe { get_table(self.mapper, self.root) };

        for level in [index.level_3(), index.level_2(), index.level_1()] {
            let entry = table.get(level);
            if !entry.present() {
                return None;
            }
            table = unsafe { get_table(self.mapper, entry.physical_frame()) };
        }

        let leaf = table.get(index.level_0());
        if !leaf.present() {
            return None;
        }
        Some(leaf.physical_frame().base() + va.page_offset())
    }
}
