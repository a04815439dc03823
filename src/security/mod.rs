//! Security utilities for handling secret material
//!
//! This module provides:
//! - Zeroize-on-drop containers for key bytes and key strings
//! - Process hardening (core dump suppression)

pub mod hardening;
pub mod zeroize;

pub use hardening::{core_dump_limit, setup_memory_protection};
pub use zeroize::{SecureBytes, SecureString};
