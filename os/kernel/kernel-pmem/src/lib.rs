//! # Physical Memory Management
//!
//! The physical side of the memory subsystem: a bitmap frame allocator over
//! one contiguous RAM region, and the bootstrap that identity-maps that
//! region so the kernel can take over paging from the firmware.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │        Identity-map bootstrap (`identity`)       │
//! │   one map_memory call per managed frame;         │
//! │   the resulting PML4 becomes the CR3 payload     │
//! └───────────────────────┬──────────────────────────┘
//!                         │ frames
//! ┌───────────────────────▼──────────────────────────┐
//! │        PageAllocator (`page_allocator`)          │
//! │   free/used/reserved bookkeeping, first-fit      │
//! │   frame handout, zeroed-frame contract           │
//! └───────────────────────┬──────────────────────────┘
//!                         │ bits
//! ┌───────────────────────▼──────────────────────────┐
//! │              Bitmap (`bitmap`)                   │
//! │   one bit per frame, carved out of the           │
//! │   managed region itself                          │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! Everything runs single-threaded during early boot; there is no locking
//! here, deliberately. If this code were ever reached after interrupts or
//! secondary cores come up, both the bitmap and in-flight table walks would
//! need a mutual-exclusion discipline first.
//!
//! ## Failure model
//!
//! The allocator treats every misuse as fatal: exhaustion, double lock,
//! double free, and foreign or misaligned addresses all panic. There is no
//! swap and no recovery path — continuing with inconsistent frame state
//! would corrupt the machine. The only recoverable conditions are the ones
//! a caller can act on before the allocator exists (an unusable memory
//! map) or a declined frame request during table construction.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod bitmap;
pub mod identity;
pub mod page_allocator;
pub mod phys_mapper;

#[cfg(test)]
mod test_support;

pub use crate::bitmap::Bitmap;
pub use crate::identity::build_identity_map;
pub use crate::page_allocator::{MemoryMapError, PageAllocator};
pub use crate::phys_mapper::BootPhysMapper;
