//! # Memory Layout
//!
//! The frame granularity is fixed by the paging hardware; everything in the
//! memory subsystem is expressed in multiples of it.

pub use kernel_memory_addresses::{PAGE_SHIFT, PAGE_SIZE};

/// Number of entries in one page table, at every level.
pub const TABLE_ENTRY_COUNT: usize = 512;

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(PAGE_SIZE == 1 << PAGE_SHIFT);
    assert!(TABLE_ENTRY_COUNT * size_of::<u64>() == PAGE_SIZE as usize);
};
