//! Boot-time [`PhysMapper`] implementation.
//!
//! During boot services and while the kernel's own identity map is active,
//! every physical address of interest is mapped at the identical virtual
//! address, so "converting" a physical address is a plain cast. This is the
//! single place where that cast happens; everything above it works with
//! typed addresses.

use kernel_memory_addresses::PhysicalAddress;
use kernel_vmem::PhysMapper;

/// Identity-mapping [`PhysMapper`].
///
/// # Safety
/// Valid only while an identity mapping covers the referenced range: under
/// UEFI boot services, or after activating the PML4 produced by
/// [`build_identity_map`](crate::build_identity_map). A kernel that later
/// switches to a higher-half direct map must swap in a mapper that adds the
/// offset instead.
pub struct BootPhysMapper;

impl PhysMapper for BootPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        unsafe { &mut *(pa.as_u64() as *mut T) }
    }
}
