//! Block arithmetic for resumable uploads.
//!
//! Graph upload sessions accept a payload as a sequence of byte ranges
//! ("blocks"). Every block except the last must be a multiple of
//! [`BLOCK_ALIGNMENT`] bytes.
//!
//! - [`plan`] computes how a payload splits into blocks.
//! - [`UploadState`] walks those blocks one at a time and renders the
//!   `Content-Range` header for each.

mod plan;
mod state;

pub use plan::{plan, BlockPlan};
pub use state::UploadState;

/// Block sizes must be a multiple of 320 KiB.
pub const BLOCK_ALIGNMENT: u64 = 320 * 1024;

/// Default block size (10 x 320 KiB, 3.125 MiB).
pub const DEFAULT_BLOCK_SIZE: u64 = 10 * BLOCK_ALIGNMENT;

/// Largest block Graph accepts in a single PUT (60 MiB).
pub const MAX_BLOCK_SIZE: u64 = 60 * 1024 * 1024;
