//! Wire compression for synchronizer messages.
//!
//! All messages are LZ4-compressed before transmission. Vote lists and
//! round-state masks compress well, and the block-part path moves the bulk
//! of commit traffic, so the cheap pass pays for itself.
//!
//! # Wire Format
//!
//! ```text
//! [LZ4 compressed data with prepended size]
//! ```
//!
//! The size prefix is part of LZ4's framing - it stores the original
//! uncompressed size so decompression can pre-allocate the output buffer.

use thiserror::Error;

/// Errors from wire encoding/decoding.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("decompression failed: {0}")]
    DecompressionFailed(String),
}

/// Compress data for transmission over the network.
#[inline]
pub fn compress(data: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(data)
}

/// Decompress data received from the network.
///
/// Expects LZ4 block format with prepended size header.
#[inline]
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, WireError> {
    lz4_flex::decompress_size_prepended(data)
        .map_err(|e| WireError::DecompressionFailed(e.to_string()))
}
