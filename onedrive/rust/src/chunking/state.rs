//! Cursor over the blocks of one upload.

use super::plan::{plan, BlockPlan};
use super::{BLOCK_ALIGNMENT, MAX_BLOCK_SIZE};
use crate::errors::UploadError;
use std::ops::Range;

/// Mutable cursor over the blocks of a single upload.
///
/// The cursor starts on the first block. [`UploadState::advance`] moves it to
/// the next block and returns `false` once the last block has been reached.
/// An empty payload is a single empty state with `start == end == 0`.
///
/// Invariants: `start <= end <= total_bytes` and
/// `end == min(start + block_size, total_bytes)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadState {
    total_bytes: u64,
    block_size: u64,
    start_offset: u64,
    end_offset: u64,
}

impl UploadState {
    /// Creates the state for a payload of `total_bytes`.
    ///
    /// With `validate_alignment` set, `block_size` must be a positive multiple
    /// of [`BLOCK_ALIGNMENT`] no larger than [`MAX_BLOCK_SIZE`]. A zero block
    /// size is always rejected.
    pub fn new(
        block_size: u64,
        total_bytes: u64,
        validate_alignment: bool,
    ) -> Result<Self, UploadError> {
        if block_size == 0 {
            return Err(UploadError::InvalidBlockSize(
                "Block size must be positive".to_string(),
            ));
        }

        if validate_alignment {
            if block_size % BLOCK_ALIGNMENT != 0 {
                return Err(UploadError::InvalidBlockSize(format!(
                    "Block size {} is not a multiple of {} bytes (320 KiB)",
                    block_size, BLOCK_ALIGNMENT
                )));
            }

            if block_size > MAX_BLOCK_SIZE {
                return Err(UploadError::InvalidBlockSize(format!(
                    "Block size {} exceeds maximum of {} bytes (60 MiB)",
                    block_size, MAX_BLOCK_SIZE
                )));
            }
        }

        Ok(Self {
            total_bytes,
            block_size,
            start_offset: 0,
            end_offset: block_size.min(total_bytes),
        })
    }

    /// Creates the state for an in-memory payload.
    pub fn for_data(
        block_size: u64,
        data: &[u8],
        validate_alignment: bool,
    ) -> Result<Self, UploadError> {
        Self::new(block_size, data.len() as u64, validate_alignment)
    }

    /// Total payload size.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Configured block size.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Start of the current block.
    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    /// End of the current block (exclusive).
    pub fn end_offset(&self) -> u64 {
        self.end_offset
    }

    /// Byte span of the current block, end exclusive.
    pub fn current_range(&self) -> Range<u64> {
        self.start_offset..self.end_offset
    }

    /// Length of the current block.
    pub fn current_len(&self) -> u64 {
        self.end_offset - self.start_offset
    }

    /// Block layout of the whole payload.
    pub fn plan(&self) -> BlockPlan {
        plan(self.total_bytes, self.block_size)
    }

    /// Whether blocks remain after the current one.
    pub fn has_more_blocks(&self) -> bool {
        self.end_offset < self.total_bytes
    }

    /// `Content-Range` value for the current block: `bytes {start}-{end-1}/{total}`.
    ///
    /// Fails with [`UploadError::EmptyRange`] for an empty block, which has
    /// no inclusive end.
    pub fn content_range_header(&self) -> Result<String, UploadError> {
        if self.end_offset == self.start_offset {
            return Err(UploadError::EmptyRange(format!(
                "No bytes to send at offset {} of {}",
                self.start_offset, self.total_bytes
            )));
        }

        Ok(format!(
            "bytes {}-{}/{}",
            self.start_offset,
            self.end_offset - 1,
            self.total_bytes
        ))
    }

    /// Moves to the next block.
    ///
    /// Returns `false`, leaving the state untouched, when the current block is
    /// the last one.
    pub fn advance(&mut self) -> bool {
        if self.end_offset == self.total_bytes {
            return false;
        }

        self.start_offset = self.end_offset;
        self.end_offset = self
            .start_offset
            .saturating_add(self.block_size)
            .min(self.total_bytes);
        true
    }
}
