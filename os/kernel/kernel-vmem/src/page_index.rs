use kernel_memory_addresses::{PAGE_SHIFT, VirtualAddress};

/// The four 9-bit table indices encoded in a canonical virtual address.
///
/// `level_0` selects the PT entry, `level_3` the PML4 entry. The 12-bit page
/// offset is discarded; bits 48–63 (the sign extension) are neither stored
/// nor validated. A pure value type, recomputed per translation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PageIndex {
    level_0: u16,
    level_1: u16,
    level_2: u16,
    level_3: u16,
}

/// Split a virtual address into its four table indices.
///
/// `level_0` = VA bits 12–20, `level_1` = bits 21–29, `level_2` = bits
/// 30–38, `level_3` = bits 39–47.
#[inline]
#[must_use]
pub const fn decompose(va: VirtualAddress) -> PageIndex {
    let frames = va.as_u64() >> PAGE_SHIFT;
    PageIndex {
        level_0: (frames & 0x1FF) as u16,
        level_1: ((frames >> 9) & 0x1FF) as u16,
        level_2: ((frames >> 18) & 0x1FF) as u16,
        level_3: ((frames >> 27) & 0x1FF) as u16,
    }
}

impl PageIndex {
    /// PT index (VA bits 12–20).
    #[inline]
    #[must_use]
    pub const fn level_0(self) -> u16 {
        self.level_0
    }

    /// PD index (VA bits 21–29).
    #[inline]
    #[must_use]
    pub const fn level_1(self) -> u16 {
        self.level_1
    }

    /// PDPT index (VA bits 30–38).
    #[inline]
    #[must_use]
    pub const fn level_2(self) -> u16 {
        self.level_2
    }

    /// PML4 index (VA bits 39–47).
    #[inline]
    #[must_use]
    pub const fn level_3(self) -> u16 {
        self.level_3
    }

    /// Reassemble the canonical page base these indices describe.
    ///
    /// The inverse of [`decompose`] modulo the cleared page offset; bit 47
    /// is sign-extended so higher-half indices yield canonical addresses.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub const fn compose(self) -> VirtualAddress {
        let raw = ((self.level_3 as u64) << 39)
            | ((self.level_2 as u64) << 30)
            | ((self.level_1 as u64) << 21)
            | ((self.level_0 as u64) << 12);
        VirtualAddress::new(((raw << 16) as i64 >> 16) as u64)
    }
}
