//! Identity-map bootstrap.
//!
//! Builds the page-table tree that carries the machine from
//! firmware-managed to kernel-managed paging: every frame the allocator
//! knows about is mapped with virtual address equal to physical address.
//! Once the returned root is loaded into CR3 (by the bootstrap code, not
//! here), the firmware's tables are never consulted again — the kernel's
//! own stacks, code, and these very page tables keep working because
//! nothing moves.

use crate::page_allocator::PageAllocator;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, VirtualAddress};
use kernel_vmem::{AddressSpace, MapError, PhysMapper};

/// Build a 1:1 virtual-to-physical mapping over every frame of the
/// allocator's managed region.
///
/// Requests one frame for the PML4 root, then installs one mapping per
/// managed frame. Intermediate tables are shared across consecutive
/// addresses, so the whole run costs O(`pages_total`) with a handful of
/// table frames. The allocator both supplies the table frames and defines
/// the range to cover; its counters reflect the consumed tables afterwards.
///
/// # Errors
/// [`MapError::OutOfFrames`] if table construction outpaces the region —
/// only possible through the [`FrameAlloc`](kernel_vmem::FrameAlloc) seam,
/// since [`PageAllocator`] itself halts on exhaustion.
pub fn build_identity_map<'m, M: PhysMapper>(
    mapper: &'m M,
    allocator: &mut PageAllocator<'m, M>,
) -> Result<AddressSpace<'m, M>, MapError> {
    let aspace = AddressSpace::create(mapper, allocator)?;

    let base = allocator.base().base().as_u64();
    let frames = allocator.pages_total();
    for index in 0..frames {
        let address = base + index * PAGE_SIZE;
        aspace.map_memory(
            allocator,
            VirtualAddress::new(address),
            PhysicalAddress::new(address),
        )?;
    }

    log::info!(
        "identity-mapped {frames} frames; PML4 at {}",
        aspace.root_frame().base()
    );
    Ok(aspace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestPhys;

    #[test]
    fn every_frame_translates_to_itself() {
        let phys = TestPhys::with_frames(128);
        let mut allocator = PageAllocator::new(&phys, PhysicalAddress::zero(), 128 * PAGE_SIZE);

        let aspace = build_identity_map(&phys, &mut allocator).unwrap();
        for frame in 0..128u64 {
            let address = frame * PAGE_SIZE;
            assert_eq!(
                aspace.translate(VirtualAddress::new(address)),
                Some(PhysicalAddress::new(address)),
                "frame {frame} lost its identity"
            );
        }
    }

    #[test]
    fn table_frames_come_out_of_the_allocator() {
        let phys = TestPhys::with_frames(128);
        let mut allocator = PageAllocator::new(&phys, PhysicalAddress::zero(), 128 * PAGE_SIZE);
        assert_eq!(allocator.pages_used(), 1);

        let aspace = build_identity_map(&phys, &mut allocator).unwrap();

        // 128 frames fit under one PT: root + PDPT + PD + PT = 4 tables.
        assert_eq!(allocator.pages_used(), 1 + 4);
        assert_eq!(allocator.pages_free(), 128 - 5);
        assert_eq!(
            allocator.pages_total(),
            allocator.pages_free() + allocator.pages_used() + allocator.pages_reserved()
        );

        // The root itself is one of the identity-mapped frames.
        let root = aspace.root_frame().base();
        assert_eq!(
            aspace.translate(VirtualAddress::new(root.as_u64())),
            Some(root)
        );
    }

    #[test]
    fn cr3_value_carries_the_root() {
        let phys = TestPhys::with_frames(64);
        let mut allocator = PageAllocator::new(&phys, PhysicalAddress::zero(), 64 * PAGE_SIZE);
        let aspace = build_identity_map(&phys, &mut allocator).unwrap();
        assert_eq!(aspace.cr3().pml4_phys(), aspace.root_frame().base());
    }
}
