use crate::{PAGE_SIZE, PhysicalAddress};
use core::fmt;

/// Page-aligned base of one 4 KiB physical frame.
///
/// ### Invariants
/// - The low 12 bits of the base are always zero. Page-table entries store
///   exactly this value, shifted; nothing is lost when encoding.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalFrame(u64);

impl PhysicalFrame {
    /// Frame containing `addr` (aligns down to the page boundary).
    #[inline]
    #[must_use]
    pub const fn from_addr(addr: PhysicalAddress) -> Self {
        Self(addr.as_u64() & !(PAGE_SIZE - 1))
    }

    /// Create from an address that must already be page-aligned.
    ///
    /// Panics in debug builds if unaligned; no runtime cost in release.
    #[inline]
    #[must_use]
    pub fn new_aligned(addr: PhysicalAddress) -> Self {
        debug_assert!(addr.is_page_aligned(), "unaligned frame address");
        Self(addr.as_u64())
    }

    /// The frame base as a full physical address.
    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0)
    }
}

impl fmt::Debug for PhysicalFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalFrame(0x{:016X})", self.0)
    }
}

impl fmt::Display for PhysicalFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<PhysicalFrame> for PhysicalAddress {
    #[inline]
    fn from(frame: PhysicalFrame) -> Self {
        frame.base()
    }
}
