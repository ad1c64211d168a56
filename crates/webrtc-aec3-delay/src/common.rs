//! Shared constants and buffer sizing for render delay estimation.

/// Number of native-rate blocks per second of audio.
pub const NUM_BLOCKS_PER_SECOND: usize = 250;

/// Samples per native-rate block (4 ms at 16 kHz).
pub const BLOCK_SIZE: usize = 64;
pub(crate) const BLOCK_SIZE_LOG2: usize = 6;

/// Interval between two metrics summaries, in capture blocks.
pub(crate) const METRICS_REPORTING_INTERVAL_BLOCKS: usize = 10 * NUM_BLOCKS_PER_SECOND;

/// Number of candidate lags kept by the lag histogram.
pub(crate) const LAG_HISTORY_SIZE: usize = 250;

/// Returns the number of decimated samples produced per native block.
pub const fn sub_block_size(down_sampling_factor: usize) -> usize {
    BLOCK_SIZE / down_sampling_factor
}

/// Returns the number of lags searched by the delay estimator.
pub(crate) const fn num_correlation_lags(
    down_sampling_factor: usize,
    max_delay_blocks: usize,
) -> usize {
    max_delay_blocks * sub_block_size(down_sampling_factor)
}

/// Returns the capacity of the downsampled render buffer required to cover
/// `max_delay_blocks` of delay plus the sub-block being correlated.
pub const fn downsampled_buffer_size(down_sampling_factor: usize, max_delay_blocks: usize) -> usize {
    (max_delay_blocks + 1) * sub_block_size(down_sampling_factor)
}
