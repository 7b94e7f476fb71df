//! Foundational low-level utilities shared across wxpay crates.
//!
//! Provides the request nonce generator, unix-time helpers used by signing and
//! certificate freshness checks, and atomic file writes for exported material.

pub mod atomic_io;
pub mod nonce;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use nonce::{generate_nonce, NonceError, DEFAULT_NONCE_LEN};
pub use time_utils::{current_unix_timestamp, seconds_since};
