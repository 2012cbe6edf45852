//! # Kernel Boot Information
//!
//! Types and constants shared between the loader and the kernel proper.
//! Everything that crosses the handoff boundary lives here so neither side
//! has to depend on the other.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod boot;
pub mod memory;
