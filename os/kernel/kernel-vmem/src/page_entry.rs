use bitfield_struct::bitfield;
use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame};

/// One 64-bit x86-64 page-table entry in its raw bitfield form.
///
/// The same layout serves all four levels (PML4E, PDPTE, PDE, PTE); which
/// table an entry lives in is positional, not encoded. An entry either
/// points at the next-level table or, at the PT level, at the mapped frame.
///
/// ### Bit layout
///
/// | Bits  | Name            | Meaning |
/// |-------|-----------------|---------|
/// | 0     | `present`       | Valid entry if set |
/// | 1     | `read_write`    | Writable if set |
/// | 2     | `supervisor`    | US: user-mode access permitted if set |
/// | 3     | `write_through` | PWT: write-through caching |
/// | 4     | `cache_disabled`| PCD: bypass caches |
/// | 5     | `accessed`      | Set by the CPU on first access |
/// | 6     | `dirty`         | Set by the CPU on first write (leaf only) |
/// | 7     | `larger_pages`  | PS: 2 MiB/1 GiB leaf — never set here |
/// | 8     | `global_translation` | G: survive CR3 reload (leaf only) |
/// | 9–11  | `available`     | Software-defined, ignored by hardware |
/// | 12–51 | frame bits      | Physical frame address >> 12 |
/// | 52–63 | reserved        | Must be zero |
///
/// The stored frame address is page-aligned by construction
/// ([`PhysicalFrame`] carries no low bits), so encoding never truncates.
#[bitfield(u64)]
pub struct PageEntry {
    /// Present (P, bit 0). Clear means the walk faults here.
    pub present: bool,

    /// Writable (RW, bit 1). Clear makes the subtree read-only.
    pub read_write: bool,

    /// User/Supervisor (US, bit 2). Clear restricts the subtree to
    /// supervisor code; set permits user-mode access.
    pub supervisor: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4). Used for MMIO ranges.
    pub cache_disabled: bool,

    /// Accessed (A, bit 5). Hardware-set; software may clear it to track
    /// usage.
    pub accessed: bool,

    /// Dirty (D, bit 6). Hardware-set on leaf writes; never consulted here.
    pub dirty: bool,

    /// Page Size (PS, bit 7). Reserved for 2 MiB / 1 GiB leaves; this
    /// kernel always walks to the PT level and leaves it clear.
    pub larger_pages: bool,

    /// Global (G, bit 8). Leaf-only; keeps the TLB entry across CR3 loads.
    pub global_translation: bool,

    /// Software-defined bits 9–11.
    #[bits(3)]
    pub available: u8,

    /// Physical frame address bits [51:12].
    #[bits(40)]
    frame_bits_51_12: u64,

    /// Bits 52–63 — reserved, must be zero.
    #[bits(12)]
    pub reserved: u16,
}

impl PageEntry {
    /// Store the physical frame this entry points at.
    #[inline]
    pub const fn set_physical_frame(&mut self, frame: PhysicalFrame) {
        self.set_frame_bits_51_12(frame.base().as_u64() >> 12);
    }

    /// Builder form of [`set_physical_frame`](Self::set_physical_frame).
    #[inline]
    #[must_use]
    pub const fn with_physical_frame(self, frame: PhysicalFrame) -> Self {
        self.with_frame_bits_51_12(frame.base().as_u64() >> 12)
    }

    /// The physical frame this entry points at.
    #[inline]
    #[must_use]
    pub const fn physical_frame(&self) -> PhysicalFrame {
        PhysicalFrame::from_addr(PhysicalAddress::new(self.frame_bits_51_12() << 12))
    }

    /// A present, writable, supervisor-only entry — the shape of every
    /// non-leaf link and every leaf this kernel installs.
    #[inline]
    #[must_use]
    pub const fn new_present_rw() -> Self {
        Self::new().with_present(true).with_read_write(true)
    }
}
