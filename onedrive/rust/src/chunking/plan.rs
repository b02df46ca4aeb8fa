//! Pure block planning over `(total_bytes, block_size)`.

/// How a payload of `total_bytes` splits into blocks of `block_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPlan {
    /// Number of blocks that are exactly `block_size` long.
    pub number_full_blocks: u64,
    /// Whether a shorter trailing block follows the full ones.
    pub partial_last_block: bool,
    /// Length of the trailing block, 0 when there is none.
    pub partial_last_block_length: u64,
}

impl BlockPlan {
    /// Total number of blocks, the trailing partial one included.
    pub fn total_blocks(&self) -> u64 {
        self.number_full_blocks + u64::from(self.partial_last_block)
    }
}

/// Splits `total_bytes` into blocks of `block_size`.
///
/// `block_size` must be positive. An empty payload yields no blocks at all,
/// not one zero-length block.
pub fn plan(total_bytes: u64, block_size: u64) -> BlockPlan {
    debug_assert!(block_size > 0, "block size must be positive");

    let partial_last_block_length = total_bytes % block_size;

    BlockPlan {
        number_full_blocks: total_bytes / block_size,
        partial_last_block: partial_last_block_length != 0,
        partial_last_block_length,
    }
}
